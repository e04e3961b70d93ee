//! Read endpoints over a scope's contacts.

use crate::cache::ContactStatsCache;
use crate::error::ApiError;
use crate::import::ContactImporter;
use crate::models::{Contact, ContactStats, DataResponse};
use crate::routes::helpers::OrgScope;
use rocket::{State, get, serde::json::Json};
use rocket_okapi::openapi;

/// List every contact of the caller's organization, newest first.
#[openapi(tag = "Contacts")]
#[get("/contacts")]
pub async fn list_contacts(
    scope: OrgScope,
    importer: &State<ContactImporter>,
) -> Result<Json<DataResponse<Vec<Contact>>>, ApiError> {
    let contacts = importer.store().list_contacts(scope.0).await?;
    Ok(Json(DataResponse { data: contacts }))
}

/// Per-status contact counts, cached until the next import touches the scope.
#[openapi(tag = "Contacts")]
#[get("/contacts/stats")]
pub async fn contact_stats(
    scope: OrgScope,
    importer: &State<ContactImporter>,
    stats_cache: &State<ContactStatsCache>,
) -> Result<Json<DataResponse<ContactStats>>, ApiError> {
    let stats = stats_cache
        .get_or_load(scope.0, importer.store())
        .await?;
    Ok(Json(DataResponse { data: stats }))
}
