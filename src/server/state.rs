//! Shared request state

use std::sync::Arc;
use toon_core::{
    ActionExecutor, EventBus, InvocationPipeline, NormalizedSchema, SessionConfig,
    ShutdownController,
};

/// Everything a handler can reach, injected as an `Extension`.
#[derive(Clone)]
pub struct AppState {
    /// Loaded schema; immutable for the life of the process
    pub schema: Arc<NormalizedSchema>,
    /// Bus shared by the pipeline and every push session
    pub bus: Arc<EventBus>,
    /// Action lifecycle wrapper around the configured executor
    pub pipeline: InvocationPipeline,
    /// Settings applied to each push connection
    pub sessions: SessionConfig,
    /// Ends push streams on shutdown
    pub shutdown: Arc<ShutdownController>,
}

impl AppState {
    /// Wire a fresh bus between the pipeline and the push endpoints.
    pub fn new(
        schema: NormalizedSchema,
        executor: Arc<dyn ActionExecutor>,
        sessions: SessionConfig,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        Self {
            schema: Arc::new(schema),
            pipeline: InvocationPipeline::new(bus.clone(), executor),
            bus,
            sessions,
            shutdown: ShutdownController::new(),
        }
    }
}
