use crm_api::models::DataResponse;
use crm_api::routes::health::{HealthResponse, live_health};
use crm_api::test_support::TestRocketBuilder;
use rocket::http::Status;
use rocket::routes;

#[test]
fn health_endpoint_returns_ok() {
    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![live_health])
        .blocking_client();

    let response = client.get("/api/v1/health/live").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let payload: DataResponse<HealthResponse> =
        response.into_json().expect("valid JSON payload");
    assert_eq!(payload.data.status, "ok");
    assert_eq!(payload.data.version, env!("CARGO_PKG_VERSION"));
}
