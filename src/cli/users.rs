use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::data_loader::{keyed, Loader};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

const NAMES: [&str; 20] = [
    "Ada", "Ben", "Cleo", "Dev", "Eli", "Fay", "Gus", "Hana", "Ivo", "Jun", "Kai", "Lena",
    "Milo", "Nia", "Otto", "Pia", "Quin", "Rosa", "Sam", "Tess",
];

/// In-memory stand-in for a `users` table. Every call to [Loader::load] is
/// one `SELECT ... WHERE id IN (...)` query.
pub struct UserStore {
    rows: Vec<User>,
    queries: AtomicUsize,
}

impl UserStore {
    pub fn new(rows: Vec<User>) -> Self {
        Self { rows, queries: AtomicUsize::new(0) }
    }

    /// Users `1..=20`.
    pub fn seeded() -> Self {
        Self::new(
            NAMES
                .iter()
                .zip(1..)
                .map(|(name, id)| User { id, name: name.to_string() })
                .collect(),
        )
    }

    /// Queries issued so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Loader<u64> for UserStore {
    type Value = User;
    type Error = Arc<anyhow::Error>;

    async fn load(&self, ids: &[u64]) -> Result<HashMap<u64, User>, Self::Error> {
        let query = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
        let list = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(", ");
        tracing::info!(query, "SELECT * FROM users WHERE id IN ({list})");

        // rows come back in table order, not in the order of `ids`
        let rows = self.rows.iter().filter(|user| ids.contains(&user.id)).cloned();
        Ok(keyed(rows, |user| user.id))
    }
}
