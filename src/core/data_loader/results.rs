//! Helpers turning the raw output of a batch query into the map a
//! [Loader](super::Loader) returns.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Batch returned {values} values for {keys} keys")]
pub struct LengthMismatch {
    pub keys: usize,
    pub values: usize,
}

/// Pairs `values` with `keys` by position.
///
/// Use it when the source answers in the order the keys were asked, one
/// value per key. `None` marks a key without a value.
pub fn ordered<K, V>(
    keys: &[K],
    values: Vec<Option<V>>,
) -> Result<HashMap<K, V>, LengthMismatch>
where
    K: Hash + Eq + Clone,
{
    if keys.len() != values.len() {
        return Err(LengthMismatch { keys: keys.len(), values: values.len() });
    }

    Ok(keys
        .iter()
        .zip(values)
        .filter_map(|(key, value)| value.map(|value| (key.clone(), value)))
        .collect())
}

/// Indexes self-describing `values` by the key `key_of` reads from each one.
///
/// Order and length of `values` do not matter. When two values carry the same
/// key the first one wins.
pub fn keyed<K, V, F>(values: impl IntoIterator<Item = V>, key_of: F) -> HashMap<K, V>
where
    K: Hash + Eq,
    F: Fn(&V) -> K,
{
    let mut map = HashMap::new();
    for value in values {
        map.entry(key_of(&value)).or_insert(value);
    }
    map
}
