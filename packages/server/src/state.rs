use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::service::Service;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
    pub config: Arc<AppConfig>,
    /// Cancelled on shutdown; ends every open event stream.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: Service) -> Self {
        let config = service.config().clone();
        Self {
            service: Arc::new(service),
            config,
            shutdown: CancellationToken::new(),
        }
    }
}
