use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{watch, Semaphore, SemaphorePermit};
use tracing::trace;

const IN_PROGRESS: &str = "in progress";

/// Observability view of the admission gate, published on every admit and release.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AdmissionSnapshot {
    pub capacity: usize,
    pub requests_total: u64,
    pub requests_in_progress: BTreeMap<String, String>,
    pub peak_in_progress: usize,
}

#[derive(Default)]
struct InFlight {
    // url -> number of admitted fetches for it, duplicates are counted
    urls: HashMap<String, usize>,
    admitted: usize,
    peak: usize,
    total_started: u64,
}

/// Bounds the number of simultaneous outbound fetches across the whole process.
///
/// Capacity is enforced by a counting semaphore. The in-flight bookkeeping lives
/// behind a separate mutex and is only used for observability, never to decide
/// admission.
pub struct AdmissionController {
    capacity: usize,
    gate: Semaphore,
    state: Mutex<InFlight>,
    published: watch::Sender<AdmissionSnapshot>,
}

impl AdmissionController {
    pub fn new(capacity: usize) -> Self {
        let (published, _) = watch::channel(AdmissionSnapshot {
            capacity,
            ..AdmissionSnapshot::default()
        });

        AdmissionController {
            capacity,
            gate: Semaphore::new(capacity),
            state: Mutex::new(InFlight::default()),
            published,
        }
    }

    /// Waits for a free slot, then records `url` as in flight.
    ///
    /// The slot is held until the returned permit is dropped, which releases it
    /// exactly once on every exit path.
    pub async fn admit(&self, url: &str) -> AdmissionPermit<'_> {
        let slot = self
            .gate
            .acquire()
            .await
            .expect("admission gate is never closed");

        {
            let mut state = self.lock();
            *state.urls.entry(url.to_string()).or_insert(0) += 1;
            state.admitted += 1;
            state.peak = state.peak.max(state.admitted);
            state.total_started += 1;
            self.publish(&state);
        }
        trace!(url, "fetch admitted");

        AdmissionPermit {
            controller: self,
            url: url.to_string(),
            _slot: slot,
        }
    }

    fn release(&self, url: &str) {
        let mut state = self.lock();
        if let Some(count) = state.urls.get_mut(url) {
            *count -= 1;
            if *count == 0 {
                state.urls.remove(url);
            }
        }
        state.admitted = state.admitted.saturating_sub(1);
        self.publish(&state);
        trace!(url, "fetch released");
    }

    pub fn total_admitted_count(&self) -> u64 {
        self.lock().total_started
    }

    /// Number of fetches currently holding a slot.
    pub fn in_flight_count(&self) -> usize {
        self.lock().admitted
    }

    /// Highest number of simultaneously admitted fetches seen so far.
    pub fn peak_in_flight(&self) -> usize {
        self.lock().peak
    }

    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }

    /// Latest published snapshot. May trail a concurrent admit or release.
    pub fn snapshot(&self) -> AdmissionSnapshot {
        self.published.borrow().clone()
    }

    fn lock(&self) -> MutexGuard<'_, InFlight> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // must be called with the state lock held so counter and map move together
    fn publish(&self, state: &InFlight) {
        let requests_in_progress = state
            .urls
            .keys()
            .map(|url| (url.clone(), IN_PROGRESS.to_string()))
            .collect();

        self.published.send_replace(AdmissionSnapshot {
            capacity: self.capacity,
            requests_total: state.total_started,
            requests_in_progress,
            peak_in_progress: state.peak,
        });
    }
}

/// A claimed unit of fetch capacity. Dropping it releases the slot.
pub struct AdmissionPermit<'a> {
    controller: &'a AdmissionController,
    url: String,
    // dropped after `Drop::drop` runs, so bookkeeping is cleared before the slot frees
    _slot: SemaphorePermit<'a>,
}

impl AdmissionPermit<'_> {
    /// Explicit release, equivalent to dropping the permit.
    pub fn release(self) {}
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        self.controller.release(&self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn admit_and_release_update_bookkeeping() {
        let controller = AdmissionController::new(2);

        let permit = controller.admit("http://a.test").await;
        assert_eq!(controller.in_flight_count(), 1);
        assert_eq!(controller.available_slots(), 1);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.requests_total, 1);
        assert_eq!(
            snapshot.requests_in_progress.get("http://a.test").map(String::as_str),
            Some("in progress")
        );

        permit.release();
        assert_eq!(controller.in_flight_count(), 0);
        assert_eq!(controller.available_slots(), 2);
        assert!(controller.snapshot().requests_in_progress.is_empty());
        assert_eq!(controller.total_admitted_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_urls_stay_in_flight_until_last_release() {
        let controller = AdmissionController::new(4);

        let first = controller.admit("http://dup.test").await;
        let second = controller.admit("http://dup.test").await;
        drop(first);
        assert!(controller.snapshot().requests_in_progress.contains_key("http://dup.test"));
        drop(second);
        assert!(controller.snapshot().requests_in_progress.is_empty());
        assert_eq!(controller.total_admitted_count(), 2);
    }

    #[tokio::test]
    async fn admit_waits_for_a_free_slot() {
        let controller = Arc::new(AdmissionController::new(1));
        let held = controller.admit("http://first.test").await;

        let waiter = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                let _permit = controller.admit("http://second.test").await;
                controller.total_admitted_count()
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        assert_eq!(controller.total_admitted_count(), 1);

        drop(held);
        assert_eq!(waiter.await.unwrap(), 2);
        assert_eq!(controller.available_slots(), 1);
    }

    #[tokio::test]
    async fn concurrent_admissions_never_exceed_capacity() {
        let controller = Arc::new(AdmissionController::new(3));
        let mut handles = Vec::new();

        for i in 0..20 {
            let controller = Arc::clone(&controller);
            handles.push(tokio::spawn(async move {
                let _permit = controller.admit(&format!("http://{}.test", i)).await;
                assert!(controller.in_flight_count() <= 3);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(controller.peak_in_flight() <= 3);
        assert_eq!(controller.available_slots(), 3);
        assert_eq!(controller.total_admitted_count(), 20);
    }

    #[tokio::test]
    async fn panicking_holder_still_releases() {
        let controller = Arc::new(AdmissionController::new(1));

        let task = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                let _permit = controller.admit("http://boom.test").await;
                panic!("fetch blew up");
            })
        };
        assert!(task.await.is_err());

        assert_eq!(controller.available_slots(), 1);
        assert_eq!(controller.in_flight_count(), 0);
    }
}
