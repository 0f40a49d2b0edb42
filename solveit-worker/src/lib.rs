//! Background jobs: deadline enforcement, storage reconciliation and
//! draft media cleanup, driven by a single-flight [`Scheduler`].

pub mod deadline;
pub mod drafts;
pub mod enforcer;
pub mod reconcile;
pub mod scheduler;

use std::sync::Arc;

use solveit_core::config::WorkerConfig;
use solveit_core::repository::{DraftStore, FileRecordStore, TaskStore};
use solveit_core::storage::ObjectStorage;
use solveit_hub::relay::NotificationRelay;

pub use deadline::{parse_deadline, DeadlineError};
pub use drafts::{DraftCleanupReport, DraftMediaCleaner};
pub use enforcer::{DeadlineEnforcer, DeadlineReport};
pub use reconcile::{FileReconciler, ReconcileReport, SweepStats};
pub use scheduler::{Job, ScheduledJob, Scheduler, TickOutcome};

/// Collaborators shared by the standard jobs
#[derive(Clone)]
pub struct WorkerContext {
    pub tasks: Arc<dyn TaskStore>,
    pub files: Arc<dyn FileRecordStore>,
    pub drafts: Arc<dyn DraftStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub notifications: Arc<NotificationRelay>,
}

/// Register the deadline, reconciliation and draft cleanup jobs on their
/// configured intervals
#[must_use]
pub fn build_scheduler(config: &WorkerConfig, ctx: WorkerContext) -> Scheduler {
    let mut scheduler = Scheduler::new();

    scheduler.add(
        Arc::new(DeadlineEnforcer::new(
            ctx.tasks,
            ctx.notifications,
            config.deadline_concurrency,
        )),
        config.deadline_interval(),
    );
    scheduler.add(
        Arc::new(FileReconciler::new(ctx.files, Arc::clone(&ctx.storage))),
        config.gc_interval(),
    );
    scheduler.add(
        Arc::new(DraftMediaCleaner::new(
            ctx.drafts,
            ctx.storage,
            config.draft_retention(),
        )),
        config.draft_cleanup_interval(),
    );

    scheduler
}
