// onboard-service/src/routes/event_routes.rs
use crate::models::{MemberJoin, ServiceError};
use crate::services::JoinDispatcher;
use actix_web::{post, web, HttpResponse};
use log::info;
use serde_json::json;

// Member arrivals relayed from the platform gateway. Processing happens after the
// settle delay, so the response only acknowledges the event.
#[post("/events/member-join")]
async fn member_join(
    dispatcher: web::Data<JoinDispatcher>,
    data: web::Json<MemberJoin>,
) -> Result<HttpResponse, ServiceError> {
    let join = data.into_inner();
    info!("👤 {} joined community {}", join.username, join.community_id);

    let (community_id, user_id) = (join.community_id, join.user_id);
    dispatcher.enqueue(join)?;

    Ok(HttpResponse::Accepted().json(json!({
        "status": "queued",
        "community_id": community_id,
        "user_id": user_id
    })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(member_join);
}
