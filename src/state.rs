use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::auth::AuthProvider;
use crate::bridge::{CorrelationStore, InProcessQueue, RegistrationError, RequestBridge, WorkerRuntime};
use crate::config::AppConfig;
use crate::rag::RagPipeline;
use crate::services::directory::Directory;
use crate::workers;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub bridge: RequestBridge,
    pub auth: Arc<dyn AuthProvider>,
    pub directory: Arc<Directory>,
}

impl AppState {
    /// Wire the bridge to an in-process queue and start the worker runtime.
    ///
    /// Must be called from inside a tokio runtime. The returned handle ends
    /// when the last bridge clone is dropped.
    pub fn start(
        config: AppConfig,
        store: Arc<dyn CorrelationStore>,
        auth: Arc<dyn AuthProvider>,
        rag: RagPipeline,
    ) -> Result<(Self, JoinHandle<()>), RegistrationError> {
        let directory = Arc::new(Directory::new());
        let (queue, receiver) = InProcessQueue::new();

        let mut runtime = WorkerRuntime::new(store.clone());
        workers::register_all(&mut runtime, directory.clone(), auth.clone(), Arc::new(rag))?;
        let handle = runtime.spawn(receiver);

        let bridge = RequestBridge::new(store, Arc::new(queue), config.bridge_options());
        let state = Self {
            config: Arc::new(config),
            bridge,
            auth,
            directory,
        };
        Ok((state, handle))
    }
}
