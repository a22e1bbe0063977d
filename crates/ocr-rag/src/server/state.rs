//! Application state for the HTTP server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::service::DocumentService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<DocumentService>,
}

impl AppState {
    /// Build the document service from configuration
    pub async fn new(config: RagConfig) -> Result<Self> {
        let service = DocumentService::build(config).await?;
        Ok(Self::from_service(Arc::new(service)))
    }

    pub fn from_service(service: Arc<DocumentService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &DocumentService {
        &self.service
    }
}
