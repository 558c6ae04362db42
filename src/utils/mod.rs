// onboard-service/src/utils/mod.rs
use actix_web::http::header;
use actix_web::{dev::ServiceRequest, Error};
use std::env;

pub mod invitation_storage;
pub mod usage_tracker;

pub use invitation_storage::InvitationRegistry;
pub use usage_tracker::UsageTracker;

// Environment-driven configuration
pub mod config {
    use super::*;
    use derive_more::Display;
    use log::warn;
    use std::str::FromStr;
    use std::time::Duration;

    const DEFAULT_ADMIN_ROLES: [&str; 7] = [
        "Admin",
        "Moderator",
        "Organiser",
        "Formateur",
        "Supervisor",
        "Responsable",
        "President",
    ];

    #[derive(Debug, Display, PartialEq)]
    pub enum ConfigError {
        #[display(fmt = "Missing {} in environment or .env file", _0)]
        Missing(&'static str),
        #[display(fmt = "Invalid value for {}: {}", key, value)]
        Invalid { key: &'static str, value: String },
    }

    impl std::error::Error for ConfigError {}

    #[derive(Debug, Clone)]
    pub struct OnboardingSettings {
        // Wait after a join before reading invitation state
        pub settle_delay: Duration,
        pub welcome_channel: String,
        pub command_channel: String,
        pub admin_roles: Vec<String>,
        pub invite_max_uses: u64,
        pub invite_max_age_secs: u64,
        // Joins waiting for the dispatcher; intake answers 503 beyond this
        pub join_queue_capacity: usize,
    }

    impl Default for OnboardingSettings {
        fn default() -> Self {
            Self {
                settle_delay: Duration::from_secs(5),
                welcome_channel: "welcome".to_string(),
                command_channel: "teammanagerbot".to_string(),
                admin_roles: DEFAULT_ADMIN_ROLES.iter().map(|r| r.to_string()).collect(),
                invite_max_uses: 1,
                invite_max_age_secs: 0,
                join_queue_capacity: 1024,
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct EmailSettings {
        pub address: String,
        pub password: String,
        pub smtp_server: String,
        pub smtp_port: u16,
        pub subject: String,
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub discord_token: String,
        pub bind_address: String,
        pub admin_token: Option<String>,
        pub onboarding: OnboardingSettings,
        pub email: Option<EmailSettings>,
    }

    fn optional(key: &str) -> Option<String> {
        env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parsed_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
        match optional(key) {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }

    impl Settings {
        pub fn from_env() -> Result<Self, ConfigError> {
            let discord_token = optional("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;
            let defaults = OnboardingSettings::default();

            let admin_roles = match optional("ADMIN_ROLES") {
                Some(list) => list
                    .split(',')
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect(),
                None => defaults.admin_roles.clone(),
            };

            let onboarding = OnboardingSettings {
                settle_delay: Duration::from_secs(parsed_or("SETTLE_DELAY_SECS", 5u64)?),
                welcome_channel: optional("WELCOME_CHANNEL").unwrap_or(defaults.welcome_channel),
                command_channel: optional("COMMAND_CHANNEL").unwrap_or(defaults.command_channel),
                admin_roles,
                invite_max_uses: parsed_or("INVITE_MAX_USES", defaults.invite_max_uses)?,
                invite_max_age_secs: parsed_or("INVITE_MAX_AGE_SECS", defaults.invite_max_age_secs)?,
                join_queue_capacity: parsed_or("JOIN_QUEUE_CAPACITY", defaults.join_queue_capacity)?,
            };

            let email = match (optional("EMAIL_ADDRESS"), optional("EMAIL_PASSWORD"), optional("SMTP_SERVER")) {
                (Some(address), Some(password), Some(smtp_server)) => Some(EmailSettings {
                    address,
                    password,
                    smtp_server,
                    smtp_port: parsed_or("SMTP_PORT", 587u16)?,
                    subject: optional("EMAIL_SUBJECT").unwrap_or_else(|| "Your team invitation".to_string()),
                }),
                _ => {
                    warn!("Warning: Email functionality will be disabled");
                    None
                }
            };

            let admin_token = optional("ADMIN_TOKEN");
            if admin_token.is_none() {
                warn!("ADMIN_TOKEN is not set - admin routes will reject every request");
            }

            Ok(Self {
                discord_token,
                bind_address: optional("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:9090".to_string()),
                admin_token,
                onboarding,
                email,
            })
        }
    }
}

// Bearer token helpers
pub mod token {
    use crate::models::ServiceError;

    pub fn extract_token_from_header(auth_header: &str) -> Result<String, ServiceError> {
        if !auth_header.starts_with("Bearer ") {
            return Err(ServiceError::Unauthorized);
        }

        Ok(auth_header.trim_start_matches("Bearer ").trim().to_string())
    }
}

// Middleware gating admin routes behind ADMIN_TOKEN
pub mod admin_guard {
    use super::*;
    use actix_web::dev::{forward_ready, Service, Transform};
    use actix_web::error::ErrorUnauthorized;
    use futures::future::{ok, Ready};
    use log::warn;
    use std::future::Future;
    use std::pin::Pin;
    use std::rc::Rc;

    // Paths reachable without a token
    const OPEN_PATHS: [&str; 1] = ["/"];

    pub struct AdminGuard {
        token: Option<Rc<str>>,
    }

    impl AdminGuard {
        pub fn new(token: Option<String>) -> Self {
            Self {
                token: token.map(Rc::from),
            }
        }
    }

    impl<S, B> Transform<S, ServiceRequest> for AdminGuard
    where
        S: Service<ServiceRequest, Response = actix_web::dev::ServiceResponse<B>, Error = Error>,
        S::Future: 'static,
        B: 'static,
    {
        type Response = actix_web::dev::ServiceResponse<B>;
        type Error = Error;
        type Transform = AdminGuardMiddleware<S>;
        type InitError = ();
        type Future = Ready<Result<Self::Transform, Self::InitError>>;

        fn new_transform(&self, service: S) -> Self::Future {
            ok(AdminGuardMiddleware {
                service,
                token: self.token.clone(),
            })
        }
    }

    pub struct AdminGuardMiddleware<S> {
        service: S,
        token: Option<Rc<str>>,
    }

    impl<S> AdminGuardMiddleware<S> {
        fn is_authorized(&self, req: &ServiceRequest) -> bool {
            let expected = match &self.token {
                Some(token) => token,
                None => return false,
            };

            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| token::extract_token_from_header(value).ok())
                .map_or(false, |provided| provided.as_str() == &**expected)
        }
    }

    impl<S, B> Service<ServiceRequest> for AdminGuardMiddleware<S>
    where
        S: Service<ServiceRequest, Response = actix_web::dev::ServiceResponse<B>, Error = Error>,
        S::Future: 'static,
        B: 'static,
    {
        type Response = actix_web::dev::ServiceResponse<B>;
        type Error = Error;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

        forward_ready!(service);

        fn call(&self, req: ServiceRequest) -> Self::Future {
            if OPEN_PATHS.contains(&req.path()) || self.is_authorized(&req) {
                let fut = self.service.call(req);
                return Box::pin(async move { fut.await });
            }

            warn!("Rejected unauthorized request to {}", req.path());
            Box::pin(async move { Err(ErrorUnauthorized("Unauthorized")) })
        }
    }
}
