/// Failure delivered to a single `load` caller.
///
/// A failed batch hands the same `Batch` error to every key that joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError<E> {
    #[error("Batch Load Error: {0}")]
    Batch(E),

    #[error("Batch load returned no value for the requested key")]
    Missing,

    #[error("Batch load was aborted before producing a result")]
    Aborted,
}

impl<E> LoadError<E> {
    /// The loader's own error, if the whole batch failed.
    pub fn batch_error(&self) -> Option<&E> {
        match self {
            LoadError::Batch(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_display() {
        let error: LoadError<String> = LoadError::Batch("timeout".to_string());
        assert_eq!(error.to_string(), "Batch Load Error: timeout");
        assert_eq!(error.batch_error(), Some(&"timeout".to_string()));
        assert_eq!(LoadError::<String>::Aborted.batch_error(), None);
    }
}
