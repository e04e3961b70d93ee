//! HTTP route handlers grouped by resource domain.
//!
//! Each submodule exposes typed Rocket handlers annotated with `#[openapi]`
//! so `rocket_okapi` can derive an OpenAPI document automatically. Every
//! contact route is scoped to the organization named in the
//! `X-Organization-Id` header.

pub mod contacts;
pub mod health;
pub mod helpers;
pub mod imports;
