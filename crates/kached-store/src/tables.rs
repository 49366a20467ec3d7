//! Redb table definitions for persistent storage.

use redb::TableDefinition;

// Key: codec-encoded key, Value: codec-encoded value
pub const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");
