use std::time::Duration;

use tokio_util::task::TaskTracker;

use shared::types::{SolveRequest, SolveResponse};

use crate::config::ServiceConfig;
use crate::domain::solver::{SolveOptions, solve_schedule};
use crate::error::RosterServiceError;

/// Orchestrates solve requests: resolves the effective time budget and runs
/// the engine on the blocking pool, tracked so graceful shutdown can wait for
/// in-flight solves.
pub struct SolveService {
    config: ServiceConfig,
    task_tracker: TaskTracker,
}

impl SolveService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            task_tracker: TaskTracker::new(),
        }
    }

    pub fn task_tracker(&self) -> &TaskTracker {
        &self.task_tracker
    }

    /// Per-attempt budget: query override first, then the payload's own
    /// setting, then the service default.
    fn effective_time_limit(&self, request: &SolveRequest, override_sec: Option<u64>) -> Duration {
        let seconds = override_sec
            .or(request.schedule_input.settings.time_limit_sec)
            .unwrap_or(self.config.default_time_limit_sec);
        Duration::from_secs(seconds)
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn solve(
        &self,
        request: SolveRequest,
        time_limit_override: Option<u64>,
    ) -> Result<SolveResponse, RosterServiceError> {
        let time_limit = self.effective_time_limit(&request, time_limit_override);
        let options = SolveOptions { time_limit };

        let handle = self
            .task_tracker
            .spawn_blocking(move || solve_schedule(&request, &options));
        handle
            .await
            .map_err(|e| RosterServiceError::Internal(format!("Solver task failed: {e}")))
    }
}
