// onboard-service/src/main.rs
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{error, info, warn};
use onboard_service::platform::{CommunityPlatform, DiscordPlatform};
use onboard_service::routes;
use onboard_service::services::email::{EmailProvider, SmtpMailer};
use onboard_service::services::{JoinDispatcher, OnboardingService};
use onboard_service::utils::admin_guard::AdminGuard;
use onboard_service::utils::config::Settings;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let platform: Arc<dyn CommunityPlatform> = match DiscordPlatform::connect(&settings.discord_token).await {
        Ok(platform) => Arc::new(platform),
        Err(e) => {
            error!("❌ Could not connect to Discord: {}", e);
            std::process::exit(1);
        }
    };

    let mailer: Option<Arc<dyn EmailProvider>> = match &settings.email {
        Some(email) => match SmtpMailer::new(email) {
            Ok(mailer) => Some(Arc::new(mailer)),
            Err(e) => {
                warn!("⚠️ {} - email functionality will be disabled", e);
                None
            }
        },
        None => None,
    };

    let service = Arc::new(OnboardingService::new(platform, mailer, settings.onboarding.clone()));
    if let Err(e) = service.reconcile_startup().await {
        error!("❌ Startup reconciliation failed: {}", e);
    }
    let dispatcher = JoinDispatcher::spawn(service.clone());

    let admin_token = settings.admin_token.clone();
    info!("🚀 Server started at {}", settings.bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(AdminGuard::new(admin_token.clone()))
            .wrap(Logger::default())
            .app_data(web::Data::from(service.clone()))
            .app_data(web::Data::new(dispatcher.clone()))
            .configure(routes::init_routes)
    })
    .bind(&settings.bind_address)?
    .run()
    .await
}
