//! Shared helpers for Rocket route handlers.

use crate::error::ApiError;
use crate::models::Scope;
use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;
use thiserror::Error;
use uuid::Uuid;

/// Header carrying the organization the request acts for.
pub const ORG_HEADER: &str = "X-Organization-Id";

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("missing X-Organization-Id header")]
    Missing,
    #[error("invalid organization id '{0}'")]
    Invalid(String),
}

impl ScopeError {
    pub fn status(&self) -> Status {
        match self {
            ScopeError::Missing => Status::Unauthorized,
            ScopeError::Invalid(_) => Status::BadRequest,
        }
    }
}

/// Request guard resolving the owning organization from [`ORG_HEADER`].
#[derive(Debug, Clone, Copy, OpenApiFromRequest)]
pub struct OrgScope(pub Scope);

pub fn parse_scope(value: Option<&str>) -> Result<Scope, ScopeError> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty()).ok_or(ScopeError::Missing)?;
    let org_id = Uuid::parse_str(raw).map_err(|_| ScopeError::Invalid(raw.to_string()))?;
    if org_id.is_nil() {
        return Err(ScopeError::Missing);
    }
    Ok(Scope::new(org_id))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OrgScope {
    type Error = ScopeError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match parse_scope(request.headers().get_one(ORG_HEADER)) {
            Ok(scope) => Outcome::Success(OrgScope(scope)),
            Err(err) => Outcome::Error((err.status(), err)),
        }
    }
}

/// Parse an import job id from a path segment.
pub fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid job id '{raw}'")))
}
