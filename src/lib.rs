pub mod admission;
pub mod api;
pub mod config;
pub mod error;
pub mod job;
pub mod parser;
pub mod pipeline;
pub mod scraper;
pub mod worker;

use std::sync::Arc;
use admission::AdmissionController;
use config::Config;
use error::Result;
use pipeline::LinkPipeline;
use worker::FetchWorker;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Process-wide gate on outgoing fetches, also read by the metrics endpoint.
    pub admission: Arc<AdmissionController>,
    pub pipeline: LinkPipeline,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let admission = Arc::new(AdmissionController::new(config.max_http_connections));
        let client = crate::scraper::build_client(&config)?;
        let pipeline = LinkPipeline::new(FetchWorker::new(client, Arc::clone(&admission)));

        Ok(AppState {
            config: Arc::new(config),
            admission,
            pipeline,
        })
    }
}
