use std::sync::Arc;

use shared_config::AppConfig;

use crate::memory::MemoryStore;
use crate::store::DocumentStore;
use crate::supabase::SupabaseStore;

/// Shared axum state: configuration plus the document store collaborator.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn DocumentStore>) -> Self {
        Self { config, store }
    }

    pub fn from_env() -> Self {
        let config = Arc::new(AppConfig::from_env());
        let store = Arc::new(SupabaseStore::new(&config));
        Self { config, store }
    }

    /// In-process store, used by tests and local development.
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(MemoryStore::new()),
        }
    }
}
