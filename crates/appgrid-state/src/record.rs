//! Binding between a row type and the table it lives in.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::tables::RowTable;

/// A row type stored as JSON in one redb table.
///
/// Row keys start with the owner id, followed by `/` and the natural key
/// (or equal the owner id for one-row-per-owner tables), so the rows of an
/// owner form one contiguous key range.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: RowTable;

    /// Id of the entity that owns this row (component id or rule id).
    fn owner_id(&self) -> &str;

    /// Full table key of this row.
    fn row_key(&self) -> String;
}

/// Whether `key` belongs to `owner` under the `{owner}` / `{owner}/...` layout.
pub(crate) fn owned_by(key: &str, owner: &str) -> bool {
    match key.strip_prefix(owner) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
