// onboard-service/src/routes/invitation_routes.rs
use crate::models::{CommunityId, MintInvitationsRequest, ServiceError};
use crate::services::OnboardingService;
use actix_web::{get, post, web, HttpResponse};
use log::info;
use serde_json::json;

// Regenerate every invitation of a community from the loaded roster
#[post("/communities/{community_id}/invitations")]
async fn create_invitations(
    service: web::Data<OnboardingService>,
    path: web::Path<CommunityId>,
    data: Option<web::Json<MintInvitationsRequest>>,
) -> Result<HttpResponse, ServiceError> {
    let community_id = path.into_inner();
    let request = data.map(web::Json::into_inner).unwrap_or_default();

    info!("📧 Creating {:?}-scoped invitations in community {}", request.scope, community_id);

    let outcomes = service.mint_invitations(community_id, &request).await?;
    let created = outcomes.iter().filter(|o| o.url.is_some()).count();

    Ok(HttpResponse::Ok().json(json!({
        "community_id": community_id,
        "created": created,
        "failed": outcomes.len() - created,
        "invitations": outcomes
    })))
}

// Every invitation the service currently tracks
#[get("/invitations")]
async fn get_invitations(service: web::Data<OnboardingService>) -> Result<HttpResponse, ServiceError> {
    let invitations = service.invitation_summaries()?;
    info!("📋 Found {} tracked invitations", invitations.len());
    Ok(HttpResponse::Ok().json(invitations))
}

// Mail each rostered member their invitation link
#[post("/communities/{community_id}/invitations/send")]
async fn send_invitations(
    service: web::Data<OnboardingService>,
    path: web::Path<CommunityId>,
) -> Result<HttpResponse, ServiceError> {
    let community_id = path.into_inner();
    let report = service.send_invitation_emails(community_id).await?;
    Ok(HttpResponse::Ok().json(report))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_invitations)
        .service(get_invitations)
        .service(send_invitations);
}
