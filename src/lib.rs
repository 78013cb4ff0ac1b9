use std::sync::Arc;

use config::Config;

pub mod config;
pub mod middleware;
pub mod utils;

pub mod routes;
pub mod store;
pub mod sync;

use store::RemoteStore;
use sync::SyncManager;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RemoteStore>,
    pub sync: Arc<SyncManager>,
    pub config: Config,
}
