// src/crawl/frontier.rs
// =============================================================================
// The URL frontier: the shared work queue and the global dedup set.
//
// Every URL discovered during a run gets exactly one UrlRecord, keyed by its
// normalized form. Records move through a small state machine:
//
//     Pending ──claim──> InFlight ──success──> Done
//        ^                  │
//        └───retryable──────┤ (attempts < max_retries)
//                           └──otherwise──────> Failed
//
// A Pending record can also jump straight to Done through mark_seen(), when
// another URL redirected to it and its document is already in hand.
//
// Workers never touch records directly. They go through enqueue / claim /
// report_success / report_failure, all of which run under one mutex, so the
// operations are linearizable with respect to each other.
//
// Termination: claim() returns None only when nothing is Pending AND nothing
// is InFlight (quiescence), or after cancel(). While something is still in
// flight, an idle worker waits instead of exiting, because the in-flight page
// may yet enqueue new links.
// =============================================================================

use crate::site::normalize;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;
use tokio::sync::Notify;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlState {
    Pending,
    InFlight,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct UrlRecord {
    pub url: Url,
    pub state: UrlState,
    /// Failed attempts that were re-queued so far
    pub attempts: u32,
    pub discovered_from: Option<Url>,
}

/// What a worker gets back from claim()
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedUrl {
    pub url: Url,
    /// 0 on the first attempt, n on the n-th retry
    pub attempts: u32,
    pub discovered_from: Option<Url>,
}

/// Outcome of report_failure()
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Back in the queue; `attempts` retries have been granted so far
    Requeued { attempts: u32 },
    /// Terminal; `attempts` counts every fetch that was made
    Failed { attempts: u32 },
}

#[derive(Debug, Error, PartialEq)]
pub enum FrontierError {
    #[error("{0} was never enqueued")]
    Unknown(String),
    #[error("{url} is {state:?}, not in flight")]
    NotInFlight { url: String, state: UrlState },
}

#[derive(Debug, Default)]
struct FrontierState {
    records: HashMap<String, UrlRecord>,
    /// Redirect targets that own a dedup key without a record of their own
    aliases: HashSet<String>,
    pending: VecDeque<String>,
    in_flight: usize,
    /// Records in Done or Failed
    settled: usize,
    cancelled: bool,
}

impl FrontierState {
    fn is_seen(&self, key: &str) -> bool {
        self.records.contains_key(key) || self.aliases.contains(key)
    }

    fn is_quiescent(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }

    fn in_flight_record(&mut self, url: &Url) -> Result<&mut UrlRecord, FrontierError> {
        let key = normalize(url);
        let record = self
            .records
            .get_mut(key.as_str())
            .ok_or_else(|| FrontierError::Unknown(key.to_string()))?;
        if record.state != UrlState::InFlight {
            return Err(FrontierError::NotInFlight {
                url: key.to_string(),
                state: record.state,
            });
        }
        Ok(record)
    }
}

pub struct Frontier {
    state: Mutex<FrontierState>,
    // Wakes workers parked in claim() when work appears or the run ends
    wakeup: Notify,
    max_retries: u32,
}

impl Frontier {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            wakeup: Notify::new(),
            max_retries,
        }
    }

    // Adds a URL unless its normalized form has been seen before
    //
    // This is the only dedup gate in the crawler: the check and the insert
    // happen under the same lock, so two workers discovering the same link
    // at the same moment still create one record.
    pub fn enqueue(&self, url: &Url, parent: Option<&Url>) -> bool {
        let url = normalize(url);
        let key = url.as_str().to_string();

        {
            let mut state = self.state.lock();
            if state.is_seen(&key) {
                return false;
            }
            state.records.insert(
                key.clone(),
                UrlRecord {
                    url,
                    state: UrlState::Pending,
                    attempts: 0,
                    discovered_from: parent.cloned(),
                },
            );
            state.pending.push_back(key);
        }

        self.wakeup.notify_waiters();
        true
    }

    // Reserves a redirect target for the page that redirected to it
    //
    // Once /old redirected to /new, the document at /new has been fetched and
    // /new must not be fetched again on its own:
    // - unseen target: its key is reserved, later links to it are dropped
    // - Pending target: it leaves the queue and counts as Done
    //
    // Parameters:
    //   url - the final URL of the redirect chain
    //
    // Returns:
    //   true  - the caller owns the target and should record the page
    //   false - the target is in flight, settled, or already reserved; its
    //           own fetch produces (or produced) the page
    pub fn mark_seen(&self, url: &Url) -> bool {
        let key = normalize(url).to_string();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.aliases.contains(&key) {
            return false;
        }
        match state.records.get_mut(&key) {
            None => {
                state.aliases.insert(key);
                true
            }
            Some(record) if record.state == UrlState::Pending => {
                record.state = UrlState::Done;
                state.pending.retain(|pending| *pending != key);
                state.settled += 1;
                true
            }
            Some(_) => false,
        }
    }

    // Hands out the next Pending URL, waiting while peers are still busy
    //
    // Returns None on quiescence or cancellation.
    pub async fn claim(&self) -> Option<ClaimedUrl> {
        loop {
            // Register interest before checking, so a notify that lands
            // between the check and the await is not lost
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.cancelled {
                    return None;
                }
                if let Some(key) = state.pending.pop_front() {
                    state.in_flight += 1;
                    if let Some(record) = state.records.get_mut(&key) {
                        record.state = UrlState::InFlight;
                        return Some(ClaimedUrl {
                            url: record.url.clone(),
                            attempts: record.attempts,
                            discovered_from: record.discovered_from.clone(),
                        });
                    }
                    // Keys in `pending` always have a record
                    state.in_flight -= 1;
                    continue;
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    pub fn report_success(&self, url: &Url) -> Result<(), FrontierError> {
        let quiescent = {
            let mut state = self.state.lock();
            state.in_flight_record(url)?.state = UrlState::Done;
            state.in_flight -= 1;
            state.settled += 1;
            state.is_quiescent()
        };

        if quiescent {
            self.wakeup.notify_waiters();
        }
        Ok(())
    }

    // Re-queues a retryable failure while retries remain, otherwise marks the
    // URL Failed for good
    pub fn report_failure(&self, url: &Url, retryable: bool) -> Result<Settlement, FrontierError> {
        let max_retries = self.max_retries;
        let (settlement, wake) = {
            let mut state = self.state.lock();
            let record = state.in_flight_record(url)?;

            let settlement = if retryable && record.attempts < max_retries {
                record.attempts += 1;
                record.state = UrlState::Pending;
                Settlement::Requeued {
                    attempts: record.attempts,
                }
            } else {
                record.state = UrlState::Failed;
                Settlement::Failed {
                    attempts: record.attempts + 1,
                }
            };

            let key = record.url.as_str().to_string();
            state.in_flight -= 1;
            match settlement {
                Settlement::Requeued { .. } => state.pending.push_back(key),
                Settlement::Failed { .. } => state.settled += 1,
            }
            let wake = matches!(settlement, Settlement::Requeued { .. }) || state.is_quiescent();
            (settlement, wake)
        };

        if wake {
            self.wakeup.notify_waiters();
        }
        Ok(settlement)
    }

    // Stops handing out work. In-flight URLs may still report back.
    pub fn cancel(&self) {
        self.state.lock().cancelled = true;
        self.wakeup.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// (settled, known) for progress reporting
    pub fn progress(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.settled, state.records.len())
    }

    /// Snapshot of one record, looked up by any spelling of its URL
    pub fn record(&self, url: &Url) -> Option<UrlRecord> {
        let key = normalize(url);
        self.state.lock().records.get(key.as_str()).cloned()
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why one Mutex instead of lock-free structures?
//    - claim() must pop a pending key AND bump the in-flight count in one
//      step, otherwise another worker could observe "nothing pending, nothing
//      in flight" in between and exit early
//    - Critical sections are a few map operations long; the network is the
//      bottleneck, not this lock
//
// 2. Why parking_lot::Mutex?
//    - No poisoning: a panicking worker doesn't wedge every other worker
//    - The guard is never held across an .await (the block scopes above make
//      sure of that)
//
// 3. Notify::notified() + enable()
//    - notify_waiters() only wakes futures that are already registered
//    - enable() registers the future before we inspect the state, which
//      closes the gap between "checked, nothing to do" and "started waiting"
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_enqueue_deduplicates_normalized_urls() {
        let frontier = Frontier::new(3);
        assert!(frontier.enqueue(&url("https://example.com/a"), None));
        assert!(!frontier.enqueue(&url("https://example.com/a/"), None));
        assert!(!frontier.enqueue(&url("https://EXAMPLE.com/a#top"), None));
        assert!(frontier.enqueue(&url("https://example.com/b"), None));
        assert_eq!(frontier.progress(), (0, 2));
    }

    #[test]
    fn test_records_parent() {
        let frontier = Frontier::new(3);
        let parent = url("https://example.com/");
        frontier.enqueue(&url("https://example.com/child"), Some(&parent));
        let record = frontier.record(&url("https://example.com/child/")).unwrap();
        assert_eq!(record.discovered_from, Some(parent));
        assert_eq!(record.state, UrlState::Pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enqueue_creates_one_record() {
        let frontier = Arc::new(Frontier::new(3));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let frontier = frontier.clone();
            handles.push(tokio::spawn(async move {
                frontier.enqueue(&url("https://example.com/same"), None)
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(frontier.progress().1, 1);
    }

    #[tokio::test]
    async fn test_claim_transitions_and_never_repeats() {
        let frontier = Frontier::new(3);
        frontier.enqueue(&url("https://example.com/a"), None);
        frontier.enqueue(&url("https://example.com/b"), None);

        let first = frontier.claim().await.unwrap();
        let second = frontier.claim().await.unwrap();
        assert_ne!(first.url, second.url);
        assert_eq!(frontier.record(&first.url).unwrap().state, UrlState::InFlight);

        frontier.report_success(&first.url).unwrap();
        frontier.report_success(&second.url).unwrap();
        assert_eq!(frontier.record(&first.url).unwrap().state, UrlState::Done);
        assert_eq!(frontier.claim().await, None);
    }

    #[tokio::test]
    async fn test_empty_frontier_is_quiescent() {
        let frontier = Frontier::new(3);
        assert_eq!(frontier.claim().await, None);
    }

    #[tokio::test]
    async fn test_retry_cap() {
        let frontier = Frontier::new(2);
        let target = url("https://example.com/flaky");
        frontier.enqueue(&target, None);

        let mut settlements = Vec::new();
        while let Some(claimed) = frontier.claim().await {
            settlements.push(frontier.report_failure(&claimed.url, true).unwrap());
        }

        assert_eq!(
            settlements,
            vec![
                Settlement::Requeued { attempts: 1 },
                Settlement::Requeued { attempts: 2 },
                Settlement::Failed { attempts: 3 },
            ]
        );
        assert_eq!(frontier.record(&target).unwrap().state, UrlState::Failed);
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried() {
        let frontier = Frontier::new(5);
        frontier.enqueue(&url("https://example.com/404"), None);
        let claimed = frontier.claim().await.unwrap();
        assert_eq!(
            frontier.report_failure(&claimed.url, false).unwrap(),
            Settlement::Failed { attempts: 1 }
        );
        assert_eq!(frontier.claim().await, None);
    }

    #[tokio::test]
    async fn test_reporting_twice_is_an_error() {
        let frontier = Frontier::new(0);
        frontier.enqueue(&url("https://example.com/a"), None);
        let claimed = frontier.claim().await.unwrap();
        frontier.report_success(&claimed.url).unwrap();
        assert!(matches!(
            frontier.report_success(&claimed.url),
            Err(FrontierError::NotInFlight { state: UrlState::Done, .. })
        ));
        assert!(matches!(
            frontier.report_failure(&url("https://example.com/never"), true),
            Err(FrontierError::Unknown(_))
        ));
    }

    #[tokio::test]
    async fn test_idle_claim_waits_for_in_flight_work() {
        let frontier = Arc::new(Frontier::new(3));
        frontier.enqueue(&url("https://example.com/"), None);
        let parent = frontier.claim().await.unwrap();

        // A second worker finds nothing pending but must not exit yet
        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.claim().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        frontier.enqueue(&url("https://example.com/child"), Some(&parent.url));
        frontier.report_success(&parent.url).unwrap();

        let claimed = waiter.await.unwrap().unwrap();
        assert_eq!(claimed.url.as_str(), "https://example.com/child");
    }

    #[tokio::test]
    async fn test_quiescence_wakes_all_idle_workers() {
        let frontier = Arc::new(Frontier::new(3));
        frontier.enqueue(&url("https://example.com/"), None);
        let only = frontier.claim().await.unwrap();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let frontier = frontier.clone();
                tokio::spawn(async move { frontier.claim().await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;

        frontier.report_success(&only.url).unwrap();
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_cancel_stops_dispatch() {
        let frontier = Frontier::new(3);
        frontier.enqueue(&url("https://example.com/a"), None);
        frontier.cancel();
        assert!(frontier.is_cancelled());
        assert_eq!(frontier.claim().await, None);
    }

    #[test]
    fn test_mark_seen_blocks_later_enqueue() {
        let frontier = Frontier::new(3);
        assert!(frontier.mark_seen(&url("https://example.com/new/")));
        assert!(!frontier.enqueue(&url("https://example.com/new"), None));
        assert!(!frontier.mark_seen(&url("https://example.com/new")));
    }

    #[tokio::test]
    async fn test_mark_seen_takes_over_pending_target() {
        let frontier = Frontier::new(3);
        frontier.enqueue(&url("https://example.com/old"), None);
        frontier.enqueue(&url("https://example.com/new"), None);

        let old = frontier.claim().await.unwrap();
        assert_eq!(old.url.as_str(), "https://example.com/old");

        // /old redirected to /new while /new was still queued
        assert!(frontier.mark_seen(&url("https://example.com/new")));
        assert_eq!(
            frontier.record(&url("https://example.com/new")).unwrap().state,
            UrlState::Done
        );
        frontier.report_success(&old.url).unwrap();

        // Nothing left to hand out
        assert!(frontier.claim().await.is_none());
        assert_eq!(frontier.progress(), (2, 2));
    }

    #[tokio::test]
    async fn test_mark_seen_refuses_in_flight_target() {
        let frontier = Frontier::new(3);
        frontier.enqueue(&url("https://example.com/new"), None);
        frontier.enqueue(&url("https://example.com/old"), None);

        let new = frontier.claim().await.unwrap();
        let old = frontier.claim().await.unwrap();
        assert_eq!(old.url.as_str(), "https://example.com/old");

        assert!(!frontier.mark_seen(&new.url));
        assert_eq!(frontier.record(&new.url).unwrap().state, UrlState::InFlight);
    }
}
