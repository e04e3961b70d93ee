//! Existing-record resolution for an import run.

use crate::import::store::{ContactStore, KeyMap, StoreError};
use crate::models::Scope;
use std::collections::BTreeSet;

/// Look up which of `emails` already exist in `scope`.
///
/// Issues a single bulk query no matter how many emails are passed, and none
/// at all for an empty set. Emails must already be normalized. Absent entries
/// in the returned map are creations.
pub async fn resolve_existing(
    store: &dyn ContactStore,
    scope: Scope,
    emails: &BTreeSet<String>,
) -> Result<KeyMap, StoreError> {
    if emails.is_empty() {
        return Ok(KeyMap::new());
    }

    let keys: Vec<String> = emails.iter().cloned().collect();
    let key_map = store.find_ids_by_email(scope, &keys).await?;

    log::debug!(
        "org {}: {} of {} candidate emails already exist",
        scope,
        key_map.len(),
        keys.len()
    );
    Ok(key_map)
}
