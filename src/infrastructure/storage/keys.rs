//! Key construction for the ordered key-value layout and snapshot files
//!
//! Layout:
//! - `{prefix}{family}/{primary_key}` full record
//! - `{prefix}index_{family}_{index}/{index_key}` index entry

/// Keyspace shared by every entity family of one database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyspace {
    prefix: String,
}

impl Keyspace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefix of every primary record of a family
    pub fn records(&self, family: &str) -> String {
        format!("{}{}/", self.prefix, family)
    }

    pub fn record(&self, family: &str, key: &str) -> String {
        format!("{}{}/{}", self.prefix, family, key)
    }

    /// Prefix of every index entry of a family
    pub fn indexes(&self, family: &str) -> String {
        format!("{}index_{}_", self.prefix, family)
    }

    /// Prefix of one index of a family
    pub fn index_prefix(&self, family: &str, index: &str) -> String {
        format!("{}index_{}_{}/", self.prefix, family, index)
    }

    pub fn index(&self, family: &str, index: &str, key: &str) -> String {
        format!("{}index_{}_{}/{}", self.prefix, family, index, key)
    }

    /// File name of a family snapshot
    pub fn snapshot_file(&self, family: &str) -> String {
        format!("{}{}.json", self.prefix, family)
    }
}
