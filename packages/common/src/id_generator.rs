use crc32fast::Hasher;

/// Derive a short, stable seed from a page key (path, slug, database key) using CRC32
pub fn page_seed(key: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Source of fresh block identifiers
pub trait IdGenerator: Send {
    fn next_id(&mut self) -> String;
}

/// Random v4 UUIDs. Unique across sessions and reloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Sequential IDs of the form `<seed>-<n>`.
///
/// Deterministic, so only unique within one generator; callers that mix
/// these with persisted blocks must skip IDs that are already taken.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    seed: String,
    count: u32,
}

impl SequentialIds {
    pub fn new(page_key: &str) -> Self {
        Self::from_seed(page_seed(page_key))
    }

    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: 0,
        }
    }

    /// Get the seed shared by every generated ID
    pub fn seed(&self) -> &str {
        &self.seed
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        self.count += 1;
        format!("{}-{}", self.seed, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_seed_is_stable() {
        let a = page_seed("/pages/home");
        let b = page_seed("/pages/home");
        assert_eq!(a, b);
        assert_ne!(a, page_seed("/pages/about"));
    }

    #[test]
    fn test_sequential_ids() {
        let mut gen = SequentialIds::new("/pages/home");

        let id1 = gen.next_id();
        let id2 = gen.next_id();

        assert!(id1.ends_with("-1"));
        assert!(id2.ends_with("-2"));
        assert!(id1.starts_with(gen.seed()));
    }

    #[test]
    fn test_uuid_ids_are_distinct() {
        let mut gen = UuidGenerator;
        assert_ne!(gen.next_id(), gen.next_id());
    }
}
