//! Application context shared by all route handlers via Axum state.

use std::sync::Arc;

use bf_av::{Engine, ToolRegistry};
use bf_core::config::Config;
use bf_pipeline::JobCoordinator;

/// Immutable infrastructure shared across requests. Jobs themselves share no
/// mutable state.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub tools: Arc<ToolRegistry>,
    pub coordinator: Arc<JobCoordinator>,
}

impl AppContext {
    pub fn new(config: Config, tools: ToolRegistry, engine: Arc<dyn Engine>) -> Self {
        let coordinator = JobCoordinator::new(engine, &config);
        Self {
            config: Arc::new(config),
            tools: Arc::new(tools),
            coordinator: Arc::new(coordinator),
        }
    }
}
