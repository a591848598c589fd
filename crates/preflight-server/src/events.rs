//! In-process pub/sub of job snapshots and deltas.
//!
//! Every subscriber owns a small pending queue drained through
//! [`Subscription::next`]. Deltas are coalesced per job id keeping only the
//! latest, so a slow subscriber holds at most one snapshot plus one delta
//! per live job and never blocks the dispatcher or other subscribers. The
//! initial snapshot is never dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use preflight_core::Job;

/// One event on the job stream.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Full state of all known jobs; always the first event a subscriber sees.
    Snapshot(Vec<Job>),
    /// One job changed.
    Delta(Job),
}

#[derive(Default)]
struct SubscriberQueue {
    snapshot: Option<Vec<Job>>,
    /// Pending deltas in publication order, at most one per job id.
    deltas: Vec<Job>,
}

impl SubscriberQueue {
    fn push_delta(&mut self, job: &Job) {
        match self.deltas.iter_mut().find(|pending| pending.id == job.id) {
            Some(pending) => *pending = job.clone(),
            None => self.deltas.push(job.clone()),
        }
    }

    fn pop(&mut self) -> Option<JobEvent> {
        if let Some(jobs) = self.snapshot.take() {
            return Some(JobEvent::Snapshot(jobs));
        }
        if self.deltas.is_empty() {
            None
        } else {
            Some(JobEvent::Delta(self.deltas.remove(0)))
        }
    }
}

struct SubscriberShared {
    queue: Mutex<SubscriberQueue>,
    notify: Notify,
}

/// Broadcasts job-state changes to any number of subscribers.
#[derive(Default)]
pub struct JobEventBroker {
    subscribers: Mutex<HashMap<u64, Arc<SubscriberShared>>>,
    next_id: AtomicU64,
}

impl JobEventBroker {
    pub fn new() -> Self {
        JobEventBroker::default()
    }

    /// Registers a subscriber whose first event is a snapshot of `jobs`.
    pub fn subscribe(self: &Arc<Self>, jobs: Vec<Job>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::new(SubscriberShared {
            queue: Mutex::new(SubscriberQueue {
                snapshot: Some(jobs),
                deltas: Vec::new(),
            }),
            notify: Notify::new(),
        });
        self.subscribers
            .lock()
            .expect("subscriber set lock poisoned")
            .insert(id, Arc::clone(&shared));
        Subscription {
            id,
            shared,
            broker: Arc::clone(self),
        }
    }

    /// Replaces every subscriber's pending events with a fresh snapshot.
    pub fn publish_snapshot(&self, jobs: Vec<Job>) {
        let subscribers = self.current_subscribers();
        for shared in subscribers {
            {
                let mut queue = shared.queue.lock().expect("subscriber queue lock poisoned");
                queue.snapshot = Some(jobs.clone());
                queue.deltas.clear();
            }
            shared.notify.notify_one();
        }
    }

    /// Fans one job delta out to every subscriber.
    pub fn publish_delta(&self, job: &Job) {
        let subscribers = self.current_subscribers();
        for shared in subscribers {
            {
                let mut queue = shared.queue.lock().expect("subscriber queue lock poisoned");
                queue.push_delta(job);
            }
            shared.notify.notify_one();
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber set lock poisoned")
            .len()
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers
            .lock()
            .expect("subscriber set lock poisoned")
            .remove(&id);
    }

    fn current_subscribers(&self) -> Vec<Arc<SubscriberShared>> {
        self.subscribers
            .lock()
            .expect("subscriber set lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

/// One subscriber's handle onto the job stream.
///
/// Dropping the subscription unsubscribes; unsubscribing twice is harmless.
pub struct Subscription {
    id: u64,
    shared: Arc<SubscriberShared>,
    broker: Arc<JobEventBroker>,
}

impl Subscription {
    /// Waits for and returns the next pending event.
    pub async fn next(&mut self) -> JobEvent {
        loop {
            if let Some(event) = self
                .shared
                .queue
                .lock()
                .expect("subscriber queue lock poisoned")
                .pop()
            {
                return event;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Returns the next pending event without waiting.
    pub fn try_next(&mut self) -> Option<JobEvent> {
        self.shared
            .queue
            .lock()
            .expect("subscriber queue lock poisoned")
            .pop()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use preflight_core::{JobStatus, TestStatus};
    use uuid::Uuid;

    use super::*;

    fn job(id: Uuid, status: JobStatus) -> Job {
        let mut job = Job::queued(id, vec!["m::test_a".to_string()], 0);
        job.status = status;
        job
    }

    #[tokio::test]
    async fn subscriber_sees_snapshot_then_deltas_in_order() {
        let broker = Arc::new(JobEventBroker::new());
        let id = Uuid::new_v4();
        let mut subscription = broker.subscribe(vec![job(id, JobStatus::Queued)]);

        let other = Uuid::new_v4();
        broker.publish_delta(&job(id, JobStatus::Running));
        broker.publish_delta(&job(other, JobStatus::Queued));

        assert!(matches!(subscription.next().await, JobEvent::Snapshot(jobs) if jobs.len() == 1));
        assert!(
            matches!(subscription.next().await, JobEvent::Delta(j) if j.id == id && j.status == JobStatus::Running)
        );
        assert!(matches!(subscription.next().await, JobEvent::Delta(j) if j.id == other));
    }

    #[tokio::test]
    async fn deltas_for_one_job_coalesce_to_the_latest() {
        let broker = Arc::new(JobEventBroker::new());
        let mut subscription = broker.subscribe(Vec::new());
        let id = Uuid::new_v4();

        broker.publish_delta(&job(id, JobStatus::Queued));
        broker.publish_delta(&job(id, JobStatus::Running));
        let mut finished = job(id, JobStatus::Succeeded);
        finished.test_statuses.insert("m::test_a".to_string(), TestStatus::Passed);
        broker.publish_delta(&finished);

        assert!(matches!(subscription.next().await, JobEvent::Snapshot(_)));
        let JobEvent::Delta(seen) = subscription.next().await else {
            panic!("expected a delta");
        };
        assert_eq!(seen.status, JobStatus::Succeeded);
        assert!(subscription.try_next().is_none());
    }

    #[tokio::test]
    async fn coalescing_keeps_publication_order_across_jobs() {
        let broker = Arc::new(JobEventBroker::new());
        let mut subscription = broker.subscribe(Vec::new());
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        broker.publish_delta(&job(first, JobStatus::Queued));
        broker.publish_delta(&job(second, JobStatus::Queued));
        broker.publish_delta(&job(first, JobStatus::Running));

        assert!(matches!(subscription.next().await, JobEvent::Snapshot(_)));
        assert!(matches!(subscription.next().await, JobEvent::Delta(j) if j.id == first));
        assert!(matches!(subscription.next().await, JobEvent::Delta(j) if j.id == second));
    }

    #[tokio::test]
    async fn subscribers_are_independent() {
        let broker = Arc::new(JobEventBroker::new());
        let mut first = broker.subscribe(Vec::new());
        let mut second = broker.subscribe(Vec::new());
        let id = Uuid::new_v4();

        assert!(matches!(first.next().await, JobEvent::Snapshot(_)));
        broker.publish_delta(&job(id, JobStatus::Running));

        // Draining one subscriber leaves the other's queue untouched.
        assert!(matches!(first.next().await, JobEvent::Delta(_)));
        assert!(matches!(second.next().await, JobEvent::Snapshot(_)));
        assert!(matches!(second.next().await, JobEvent::Delta(_)));
    }

    #[tokio::test]
    async fn dropping_a_subscription_unsubscribes() {
        let broker = Arc::new(JobEventBroker::new());
        let subscription = broker.subscribe(Vec::new());
        assert_eq!(broker.subscriber_count(), 1);
        drop(subscription);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn published_snapshot_supersedes_pending_deltas() {
        let broker = Arc::new(JobEventBroker::new());
        let mut subscription = broker.subscribe(Vec::new());
        assert!(matches!(subscription.next().await, JobEvent::Snapshot(_)));

        let id = Uuid::new_v4();
        broker.publish_delta(&job(id, JobStatus::Queued));
        broker.publish_snapshot(vec![job(id, JobStatus::Running)]);

        let JobEvent::Snapshot(jobs) = subscription.next().await else {
            panic!("expected a snapshot");
        };
        assert_eq!(jobs[0].status, JobStatus::Running);
        assert!(subscription.try_next().is_none());
    }
}
