//! Short code generation
//!
//! Codes are 7 random base-62 characters. Allocation retries until it finds
//! a code with no entry in the store.

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::kv::{KvError, KvStore};

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of generated codes
pub const CODE_LEN: usize = 7;

/// Give up after this many taken codes in a row
pub const MAX_ATTEMPTS: usize = 16;

/// Allocation errors
#[derive(Debug, Error)]
pub enum ShortCodeError {
    #[error("no free short code after {0} attempts")]
    Exhausted(usize),

    #[error(transparent)]
    Store(#[from] KvError),
}

/// Generate a random code
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Find an unused random code
///
/// The check and the later write are not atomic; two uploads racing on the
/// same fresh code overwrite each other, which at 62^7 codes is accepted.
pub async fn allocate(store: &dyn KvStore) -> Result<String, ShortCodeError> {
    allocate_with(store, generate).await
}

/// Find an unused code drawn from `next`
pub async fn allocate_with<F>(store: &dyn KvStore, mut next: F) -> Result<String, ShortCodeError>
where
    F: FnMut() -> String,
{
    for _ in 0..MAX_ATTEMPTS {
        let code = next();
        if store.get(&code).await?.is_none() {
            return Ok(code);
        }
        debug!("Short code {} taken, retrying", code);
    }
    Err(ShortCodeError::Exhausted(MAX_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;

    #[test]
    fn test_generate_shape() {
        for _ in 0..100 {
            let code = generate();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[tokio::test]
    async fn test_allocate_skips_taken_codes() {
        let store = MemoryKvStore::new();
        store.put("aaaaaaa", "", None).await.unwrap();
        store.put("bbbbbbb", "", None).await.unwrap();

        let mut candidates = vec!["ccccccc", "bbbbbbb", "aaaaaaa"];
        let code = allocate_with(&store, || candidates.pop().unwrap().to_string())
            .await
            .unwrap();
        assert_eq!(code, "ccccccc");
    }

    #[tokio::test]
    async fn test_allocate_gives_up() {
        let store = MemoryKvStore::new();
        store.put("aaaaaaa", "", None).await.unwrap();

        let result = allocate_with(&store, || "aaaaaaa".to_string()).await;
        assert!(matches!(result, Err(ShortCodeError::Exhausted(MAX_ATTEMPTS))));
    }

    #[tokio::test]
    async fn test_allocate_random() {
        let store = MemoryKvStore::new();
        let code = allocate(&store).await.unwrap();
        assert_eq!(code.len(), CODE_LEN);
    }
}
