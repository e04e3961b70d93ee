#[rocket::launch]
fn rocket() -> _ {
    crm_api::init_logger();
    log::info!("starting CRM API server");
    crm_api::rocket()
}
