//! Storage key encoding
//!
//! The table is keyed by a partition key and a sort key:
//!
//! ```text
//! PK = escape(owner) "#" escape(id)
//! SK = id
//! ```
//!
//! `escape` prefixes `\` and `#` with a backslash, so the only bare `#` in a partition
//! key is the separator and two distinct identities never share a key. Identities
//! without either character encode as plain `owner#id`.
//!
//! The sort key is unused by the current point-lookup access pattern. It is reserved
//! because adding one to an existing table requires a full migration.

use std::fmt;

use medication_domain::Identity;

/// Separator between the owner and id segments of a partition key
pub const KEY_SEPARATOR: char = '#';

const ESCAPE: char = '\\';

/// Derived partition/sort key pair of a stored item
///
/// Never exposed outside the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    partition: String,
    sort: String,
}

impl StorageKey {
    /// Derive the key of the record addressed by `identity`
    pub fn for_identity(identity: &Identity) -> Self {
        let mut partition = String::with_capacity(identity.owner.len() + identity.id.len() + 1);
        escape_into(&identity.owner, &mut partition);
        partition.push(KEY_SEPARATOR);
        escape_into(&identity.id, &mut partition);

        Self {
            partition,
            sort: identity.id.clone(),
        }
    }

    /// Build a key from raw parts (audit entries use their own sort keys)
    pub fn from_parts(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn sort(&self) -> &str {
        &self.sort
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.sort)
    }
}

fn escape_into(segment: &str, out: &mut String) {
    for c in segment.chars() {
        if c == ESCAPE || c == KEY_SEPARATOR {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}
