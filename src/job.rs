use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// One requested URL waiting to be resolved.
#[derive(Clone, Debug)]
pub struct FetchJob {
    pub url: String,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl FetchJob {
    pub fn new(url: impl Into<String>) -> Self {
        FetchJob {
            url: url.into(),
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Turns the job into its terminal result. Unset timestamps fall back to the
    /// previous stage so the ordering of the three stamps is preserved.
    pub fn into_result(self, title: String) -> FetchResult {
        let started_at = self.started_at.unwrap_or(self.queued_at);
        let finished_at = self.finished_at.unwrap_or(started_at);

        FetchResult {
            url: self.url,
            title,
            queued_at: self.queued_at,
            started_at,
            finished_at,
        }
    }
}

/// Outcome of one job. A failed fetch carries the failure description as its title.
#[derive(Clone, Debug, Serialize)]
pub struct FetchResult {
    pub url: String,
    pub title: String,
    pub queued_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FetchResult {
    /// Time from queueing until the result was produced.
    pub fn wait_time(&self) -> Duration {
        self.finished_at - self.queued_at
    }

    pub fn fetch_time(&self) -> Duration {
        self.finished_at - self.started_at
    }
}
