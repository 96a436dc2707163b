//! Shared application state for all routes.

use crate::service::AdminService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AdminService>,
}

impl AppState {
    pub fn new(service: AdminService) -> Self {
        AppState {
            service: Arc::new(service),
        }
    }
}
