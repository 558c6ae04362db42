// onboard-service/src/services/mod.rs
pub mod attribution;
pub mod channel_provisioner;
pub mod dispatcher;
pub mod email;
pub mod onboarding;
pub mod role_provisioner;
pub mod startup;

pub use dispatcher::JoinDispatcher;
pub use onboarding::OnboardingService;
