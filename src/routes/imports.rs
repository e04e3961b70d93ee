//! Contact import endpoints.

use crate::cache::ContactStatsCache;
use crate::error::ApiError;
use crate::import::{CandidateRecord, ContactImporter, ImportJob, ImportJobRegistry, ImportSummary};
use crate::models::DataResponse;
use crate::routes::helpers::{OrgScope, parse_job_id};
use rocket::{State, get, post, serde::json::Json};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Request body carrying the rows to import.
///
/// Rows are kept raw so that one malformed row is reported on its own
/// instead of rejecting the whole upload.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImportRequest {
    /// Candidate contacts, e.g. parsed spreadsheet rows.
    #[schemars(with = "Vec<CandidateRecord>")]
    pub contacts: Vec<Value>,
}

/// Acknowledgement for a background import.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobStarted {
    /// Identifier to poll for progress.
    pub job_id: Uuid,
    /// Number of candidates accepted.
    pub total: usize,
}

/// Import contacts and wait for the summary.
///
/// Partial success is the normal case: rows that failed are listed with their
/// original input and the error text.
#[openapi(tag = "Imports")]
#[post("/contacts/import", data = "<request>")]
pub async fn import_contacts(
    scope: OrgScope,
    request: Json<ImportRequest>,
    importer: &State<ContactImporter>,
    stats_cache: &State<ContactStatsCache>,
) -> Result<Json<DataResponse<ImportSummary>>, ApiError> {
    let OrgScope(scope) = scope;
    let request = request.into_inner();

    let summary = importer
        .import_rows(scope, &request.contacts, None)
        .await?;

    if summary.store_modified() {
        stats_cache.invalidate(scope);
    }

    Ok(Json(DataResponse { data: summary }))
}

/// Start a background import and return its job id immediately.
#[openapi(tag = "Imports")]
#[post("/contacts/imports", data = "<request>")]
pub async fn start_import_job(
    scope: OrgScope,
    request: Json<ImportRequest>,
    importer: &State<ContactImporter>,
    registry: &State<ImportJobRegistry>,
    stats_cache: &State<ContactStatsCache>,
) -> Result<Json<DataResponse<ImportJobStarted>>, ApiError> {
    let OrgScope(scope) = scope;
    let rows = request.into_inner().contacts;
    let total = rows.len();

    importer.validate(scope, total)?;

    let cache = stats_cache.inner().clone();
    let job_id = registry.spawn(importer.inner().clone(), scope, rows, move |summary| {
        if summary.store_modified() {
            cache.invalidate(scope);
        }
    });

    log::info!("org {}: queued import job {} ({} contacts)", scope, job_id, total);
    Ok(Json(DataResponse {
        data: ImportJobStarted { job_id, total },
    }))
}

/// Progress and, once finished, the summary of a background import.
#[openapi(tag = "Imports")]
#[get("/contacts/imports/<id>")]
pub async fn get_import_job(
    scope: OrgScope,
    id: String,
    registry: &State<ImportJobRegistry>,
) -> Result<Json<DataResponse<ImportJob>>, ApiError> {
    let job_id = parse_job_id(&id)?;
    let job = registry
        .get(scope.0, job_id)
        .ok_or_else(|| ApiError::NotFound(format!("Import job '{id}' not found")))?;

    Ok(Json(DataResponse { data: job }))
}
