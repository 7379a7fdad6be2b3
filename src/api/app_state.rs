use std::sync::Arc;

use crate::config::config::ModelConfig;
use crate::controller::QueryController;
use crate::services::session::SessionService;

/// Shared application state behind the API
#[derive(Clone)]
pub struct AppState {
    /// Session service for lifecycle and history
    pub session_service: Arc<dyn SessionService>,
    /// The query construction controller
    pub controller: Arc<QueryController>,
    /// Default model selection and debug flag for new sessions
    pub model_config: ModelConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("session_service", &"Arc<dyn SessionService>")
            .field("controller", &"Arc<QueryController>")
            .field("model_config", &self.model_config)
            .finish()
    }
}

impl AppState {
    pub fn new(
        session_service: Arc<dyn SessionService>,
        controller: Arc<QueryController>,
        model_config: ModelConfig,
    ) -> Self {
        Self {
            session_service,
            controller,
            model_config,
        }
    }
}
