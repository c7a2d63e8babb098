use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use tracing::{debug, warn};

use crate::admission::AdmissionController;
use crate::error::Result;
use crate::job::{FetchJob, FetchResult};
use crate::scraper::{extract_title, read_limited_body, MAX_BODY_BYTES};

/// Title used when a page was fetched but no title could be found in it.
pub const TITLE_NOT_FOUND: &str = "Failed to get HTML title";

/// Resolves a single job: admission, fetch, title extraction.
pub struct FetchWorker {
    client: Client,
    admission: Arc<AdmissionController>,
}

impl FetchWorker {
    pub fn new(client: Client, admission: Arc<AdmissionController>) -> Self {
        FetchWorker { client, admission }
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn process_job(&self, mut job: FetchJob) -> FetchResult {
        job.started_at = Some(Utc::now());

        let title = {
            let _permit = self.admission.admit(&job.url).await;
            match self.fetch_title(&job.url).await {
                Ok(title) => title,
                Err(err) => {
                    warn!(url = %job.url, error = %err, "link fetch failed");
                    err.to_string()
                }
            }
        };

        job.finished_at = Some(Utc::now());
        job.into_result(title)
    }

    // The response is owned here, so its body is released on every return path.
    async fn fetch_title(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, %status, "non-success status, still looking for a title");
        }

        let body = read_limited_body(response, MAX_BODY_BYTES).await?;
        let title = extract_title(body.as_slice()).unwrap_or_else(|| TITLE_NOT_FOUND.to_string());
        debug!(url, %title, "link fetched");
        Ok(title)
    }
}
