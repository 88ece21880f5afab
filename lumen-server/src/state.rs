use std::{fmt, sync::Arc};

use lumen_core::{IngestionPipeline, MetadataStore};

use crate::config::Config;

/// Shared state handed to every handler. Constructed once at startup;
/// nothing here is global.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pipeline: IngestionPipeline, config: Config) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &MetadataStore {
        self.pipeline.store()
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
