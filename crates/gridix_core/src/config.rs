//! Indexing engine configuration.

use crate::index::TokenizerConfig;

/// What `register_type` does when a different descriptor is already
/// registered under the same type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaConflictPolicy {
    /// Replace the descriptor and re-project existing entries.
    Replace,
    /// Keep the existing descriptor; registration returns `false`.
    Reject,
}

/// What `store` does when a key is already indexed under another type of
/// the same space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMigrationPolicy {
    /// Move the key: drop it from the old type's indexes and index it under
    /// the new type.
    Migrate,
    /// Refuse the store with [`CoreError::TypeConflict`](crate::CoreError).
    Reject,
}

/// Configuration for the indexing engine.
#[derive(Debug, Clone)]
pub struct IndexingConfig {
    /// Descriptor replacement policy.
    pub schema_conflict: SchemaConflictPolicy,

    /// Cross-type key policy.
    pub type_migration: TypeMigrationPolicy,

    /// Entries a cursor materialises per read-lock acquisition.
    pub scan_batch_size: usize,

    /// Number of lock stripes in the version gate.
    pub gate_shards: usize,

    /// Expired entries are purged every this many mutations of a type (0 = never).
    pub expiry_sweep_interval: u64,

    /// Tokenizer used by the text index.
    pub tokenizer: TokenizerConfig,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            schema_conflict: SchemaConflictPolicy::Replace,
            type_migration: TypeMigrationPolicy::Migrate,
            scan_batch_size: 64,
            gate_shards: 64,
            expiry_sweep_interval: 1024,
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl IndexingConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the descriptor replacement policy.
    #[must_use]
    pub const fn schema_conflict(mut self, policy: SchemaConflictPolicy) -> Self {
        self.schema_conflict = policy;
        self
    }

    /// Sets the cross-type key policy.
    #[must_use]
    pub const fn type_migration(mut self, policy: TypeMigrationPolicy) -> Self {
        self.type_migration = policy;
        self
    }

    /// Sets the cursor batch size (minimum 1).
    #[must_use]
    pub fn scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = size.max(1);
        self
    }

    /// Sets the number of version gate stripes (minimum 1).
    #[must_use]
    pub fn gate_shards(mut self, shards: usize) -> Self {
        self.gate_shards = shards.max(1);
        self
    }

    /// Sets the expiry sweep interval.
    #[must_use]
    pub const fn expiry_sweep_interval(mut self, interval: u64) -> Self {
        self.expiry_sweep_interval = interval;
        self
    }

    /// Sets the text index tokenizer.
    #[must_use]
    pub fn tokenizer(mut self, tokenizer: TokenizerConfig) -> Self {
        self.tokenizer = tokenizer;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = IndexingConfig::default();
        assert_eq!(config.schema_conflict, SchemaConflictPolicy::Replace);
        assert_eq!(config.type_migration, TypeMigrationPolicy::Migrate);
        assert_eq!(config.scan_batch_size, 64);
    }

    #[test]
    fn builder_pattern() {
        let config = IndexingConfig::new()
            .schema_conflict(SchemaConflictPolicy::Reject)
            .type_migration(TypeMigrationPolicy::Reject)
            .scan_batch_size(0)
            .gate_shards(8);

        assert_eq!(config.schema_conflict, SchemaConflictPolicy::Reject);
        assert_eq!(config.type_migration, TypeMigrationPolicy::Reject);
        assert_eq!(config.scan_batch_size, 1);
        assert_eq!(config.gate_shards, 8);
    }
}
