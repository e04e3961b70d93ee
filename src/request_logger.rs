use crate::routes::helpers::ORG_HEADER;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};
use std::time::Instant;

/// Fairing to log one line per HTTP request with timing and the acting organization.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let duration = request.local_cache(Instant::now).elapsed();
        let org = request.headers().get_one(ORG_HEADER).unwrap_or("-");

        log::info!(
            "{} {} org={} -> {} ({:.2}ms)",
            request.method(),
            request.uri(),
            org,
            response.status().code,
            duration.as_secs_f64() * 1000.0
        );
    }
}
