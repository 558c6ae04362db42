// onboard-service/src/models/mod.rs
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;

pub mod platform;
pub use platform::*;

pub mod invitations;
pub use invitations::*;

pub mod team;
pub use team::*;

pub mod roster;
pub use roster::*;

// Errors surfaced by the admin HTTP surface
#[derive(Debug, Display, PartialEq)]
pub enum ServiceError {
    #[display(fmt = "Internal Server Error")]
    InternalServerError,
    #[display(fmt = "BadRequest: {}", _0)]
    BadRequest(String),
    #[display(fmt = "Unauthorized")]
    Unauthorized,
    #[display(fmt = "Conflict: {}", _0)]
    Conflict(String),
    #[display(fmt = "Service Unavailable: {}", _0)]
    ServiceUnavailable(String),
}

impl std::error::Error for ServiceError {}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::InternalServerError =>
                HttpResponse::InternalServerError().json("Internal Server Error"),
            ServiceError::BadRequest(ref message) =>
                HttpResponse::BadRequest().json(message),
            ServiceError::Unauthorized =>
                HttpResponse::Unauthorized().json("Unauthorized"),
            ServiceError::Conflict(ref message) =>
                HttpResponse::Conflict().json(message),
            ServiceError::ServiceUnavailable(ref message) =>
                HttpResponse::ServiceUnavailable().json(message),
        }
    }
}

/// Failure of a single call against the community platform.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum PlatformError {
    #[display(fmt = "Forbidden: {}", _0)]
    Forbidden(String),
    #[display(fmt = "Not Found: {}", _0)]
    NotFound(String),
    #[display(fmt = "Rate limited, retry after {}s", retry_after_secs)]
    RateLimited { retry_after_secs: f64 },
    #[display(fmt = "Transport error: {}", _0)]
    Transport(String),
    #[display(fmt = "Unexpected response {}: {}", status, body)]
    Unexpected { status: u16, body: String },
}

impl std::error::Error for PlatformError {}

/// Failure of a role or channel provisioning attempt.
///
/// None of these are retried automatically. `Hierarchy` names the exact remediation.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum ProvisionError {
    #[display(fmt = "Missing permission: {}", _0)]
    Permission(String),
    #[display(fmt = "Not found: {}", _0)]
    NotFound(String),
    #[display(fmt = "Fix required: Drag @{} above @{} in community {}", bot_role, team_role, community)]
    Hierarchy {
        bot_role: String,
        team_role: String,
        community: CommunityId,
    },
    #[display(fmt = "Platform error: {}", _0)]
    Transient(String),
}

impl std::error::Error for ProvisionError {}

impl From<PlatformError> for ProvisionError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Forbidden(msg) => ProvisionError::Permission(msg),
            PlatformError::NotFound(msg) => ProvisionError::NotFound(msg),
            other => ProvisionError::Transient(other.to_string()),
        }
    }
}
