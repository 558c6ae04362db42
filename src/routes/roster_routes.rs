// onboard-service/src/routes/roster_routes.rs
use crate::models::{CommunityId, LoadRosterRequest, ServiceError};
use crate::services::OnboardingService;
use actix_web::{get, post, web, HttpResponse};
use log::info;
use serde_json::json;

// Load a roster and provision every team in it
#[post("/roster")]
async fn load_roster(
    service: web::Data<OnboardingService>,
    data: web::Json<LoadRosterRequest>,
) -> Result<HttpResponse, ServiceError> {
    info!("📥 Loading roster of {} rows for community {}", data.members.len(), data.community_id);

    let report = service.load_roster(data.into_inner()).await?;
    let failed = report.outcomes.iter().filter(|o| !o.success).count();

    info!("✅ Roster loaded: {} teams ({} failed to provision)", report.teams, failed);
    Ok(HttpResponse::Ok().json(report))
}

// Teams of the loaded roster with a short member preview
#[get("/teams")]
async fn get_teams(service: web::Data<OnboardingService>) -> Result<HttpResponse, ServiceError> {
    let teams = service.team_summaries()?;
    info!("📋 Listing {} loaded teams", teams.len());
    Ok(HttpResponse::Ok().json(teams))
}

// Re-run role and channel provisioning for the loaded teams
#[post("/communities/{community_id}/teams/provision")]
async fn provision_teams(
    service: web::Data<OnboardingService>,
    path: web::Path<CommunityId>,
) -> Result<HttpResponse, ServiceError> {
    let community_id = path.into_inner();
    info!("🏗️ Provisioning teams in community {}", community_id);

    let outcomes = service.provision_loaded_teams(community_id).await?;
    let succeeded = outcomes.iter().filter(|o| o.success).count();

    Ok(HttpResponse::Ok().json(json!({
        "community_id": community_id,
        "succeeded": succeeded,
        "failed": outcomes.len() - succeeded,
        "teams": outcomes
    })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(load_roster)
        .service(get_teams)
        .service(provision_teams);
}
