// onboard-service/src/routes/mod.rs
use actix_web::{get, web, HttpResponse};
use serde_json::json;

pub mod event_routes;
pub mod invitation_routes;
pub mod roster_routes;

#[get("/")]
async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .configure(roster_routes::init_routes)
        .configure(invitation_routes::init_routes)
        .configure(event_routes::init_routes);
}
