// onboard-service/src/services/dispatcher.rs
//! Serialises join handling.
//!
//! Joins are queued as they arrive and processed one at a time in arrival order, each
//! no earlier than its settle deadline. Attribution diffs shared snapshots, so two
//! joins must never be evaluated concurrently.
//!
//! The queue is bounded. A full queue rejects the join with
//! [`ServiceError::ServiceUnavailable`] so the relay can retry it later.

use crate::models::{MemberJoin, ServiceError};
use crate::services::onboarding::{JoinOutcome, OnboardingService};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep_until, Instant};

struct QueuedJoin {
    join: MemberJoin,
    received_at: Instant,
}

#[derive(Clone)]
pub struct JoinDispatcher {
    sender: mpsc::Sender<QueuedJoin>,
}

impl JoinDispatcher {
    // Starts the worker on the current tokio runtime
    pub fn spawn(service: Arc<OnboardingService>) -> Self {
        let capacity = service.settings().join_queue_capacity;
        Self::spawn_with_capacity(service, capacity)
    }

    pub fn spawn_with_capacity(service: Arc<OnboardingService>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        tokio::spawn(run(service, receiver));
        Self { sender }
    }

    pub fn enqueue(&self, join: MemberJoin) -> Result<(), ServiceError> {
        debug!("Queued join of {} in community {}", join.username, join.community_id);
        self.sender
            .try_send(QueuedJoin {
                join,
                received_at: Instant::now(),
            })
            .map_err(|e| match e {
                TrySendError::Full(queued) => {
                    warn!(
                        "⚠️ Join queue full, rejecting join of {} in community {}",
                        queued.join.username, queued.join.community_id
                    );
                    ServiceError::ServiceUnavailable("join queue is full, retry later".to_string())
                }
                TrySendError::Closed(_) => {
                    error!("❌ Join dispatcher is no longer running");
                    ServiceError::InternalServerError
                }
            })
    }
}

async fn run(service: Arc<OnboardingService>, mut receiver: mpsc::Receiver<QueuedJoin>) {
    let settle_delay = service.settings().settle_delay;
    info!("👂 Join dispatcher started (settle delay {:?})", settle_delay);

    while let Some(queued) = receiver.recv().await {
        // Give the platform time to update invitation counts
        sleep_until(queued.received_at + settle_delay).await;

        match service.handle_member_join(&queued.join).await {
            JoinOutcome::Attributed(result) => info!(
                "✅ Onboarded {} into {} (role ok: {}, channels ok: {}, welcome: {:?})",
                queued.join.username,
                result.attribution.team,
                result.role.is_ok(),
                result.channels.is_ok(),
                result.welcome
            ),
            JoinOutcome::Unattributed => debug!("Join of {} left unattributed", queued.join.username),
            JoinOutcome::Skipped(reason) => info!("Skipped join of {}: {}", queued.join.username, reason),
        }
    }

    info!("Join dispatcher stopped");
}
