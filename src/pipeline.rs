use std::sync::Arc;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tracing::{error, info};

use crate::job::{FetchJob, FetchResult};
use crate::worker::FetchWorker;

/// Fans a batch of URLs out to one concurrent worker task per URL.
#[derive(Clone)]
pub struct LinkPipeline {
    worker: Arc<FetchWorker>,
}

impl LinkPipeline {
    pub fn new(worker: FetchWorker) -> Self {
        LinkPipeline {
            worker: Arc::new(worker),
        }
    }

    pub fn worker(&self) -> &FetchWorker {
        &self.worker
    }

    /// Fetches the title of every URL and returns one result per input, in
    /// completion order.
    ///
    /// Duplicates are fetched independently. Individual failures end up in the
    /// result titles, so this never fails as a whole.
    pub async fn fetch_all<I>(&self, urls: I) -> Vec<FetchResult>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut tasks: FuturesUnordered<_> = urls
            .into_iter()
            .map(|url| {
                let job = FetchJob::new(url);
                let fallback = job.clone();
                let worker = Arc::clone(&self.worker);

                tokio::spawn(async move { worker.process_job(job).await }).map(move |joined| {
                    joined.unwrap_or_else(|err| {
                        error!(url = %fallback.url, error = %err, "fetch task did not complete");
                        let mut job = fallback;
                        job.finished_at = Some(Utc::now());
                        job.into_result(format!("Fetch task failed: {}", err))
                    })
                })
            })
            .collect();

        if tasks.is_empty() {
            return Vec::new();
        }

        let batch = tasks.len();
        let mut results = Vec::with_capacity(batch);
        while let Some(result) = tasks.next().await {
            results.push(result);
        }

        info!(batch, "link batch complete");
        results
    }
}
