use std::sync::Arc;

use crate::domain::service::SolveService;

pub struct RosterAppState {
    pub solve_service: Arc<SolveService>,
}
