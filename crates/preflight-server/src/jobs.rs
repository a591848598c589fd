//! Job scheduling: a single dispatcher owning job state and a bounded pool
//! of workers consuming one FIFO task queue.
//!
//! All job mutations flow through the dispatcher's command channel, so
//! subscribers observe a consistent per-job sequence. Workers only run the
//! pipeline and report transitions back; they never touch the job table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use uuid::Uuid;

use preflight_core::{now_epoch_secs, Job, TestDescriptor, TestResult, TestStatus};

use crate::discovery::Discovery;
use crate::events::{JobEventBroker, Subscription};
use crate::pipeline::ExecutionPipeline;

/// Accepts run-requests, tracks jobs, and executes tests on the worker pool.
pub struct JobManager {
    table: Arc<RwLock<JobTable>>,
    commands: mpsc::UnboundedSender<Command>,
}

#[derive(Default)]
struct JobTable {
    jobs: HashMap<Uuid, Job>,
    /// Creation order; listings reverse this for newest-first.
    order: Vec<Uuid>,
}

impl JobTable {
    fn newest_first(&self) -> Vec<Job> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.jobs.get(id))
            .cloned()
            .collect()
    }
}

enum Command {
    Create {
        tests: Option<Vec<String>>,
        reply: oneshot::Sender<Job>,
    },
    Requeue {
        id: Uuid,
        reply: oneshot::Sender<Option<Job>>,
    },
    Subscribe {
        reply: oneshot::Sender<Subscription>,
    },
    TestStarted {
        job_id: Uuid,
        qualified_name: String,
    },
    TestFinished {
        job_id: Uuid,
        qualified_name: String,
        result: Box<TestResult>,
    },
}

struct TestTask {
    job_id: Uuid,
    descriptor: TestDescriptor,
    /// Set on the first task of each job; the dequeuing worker hot-reloads
    /// the project before running it.
    reload_first: bool,
}

impl JobManager {
    /// Spawns the dispatcher and `workers` executor tasks.
    pub fn new(
        discovery: Arc<Discovery>,
        pipeline: Arc<ExecutionPipeline>,
        broker: Arc<JobEventBroker>,
        workers: usize,
    ) -> Arc<Self> {
        let table = Arc::new(RwLock::new(JobTable::default()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (task_tx, task_rx) = mpsc::unbounded_channel::<TestTask>();
        let task_rx = Arc::new(Mutex::new(task_rx));

        let dispatcher = Dispatcher {
            table: Arc::clone(&table),
            discovery: Arc::clone(&discovery),
            broker,
            task_tx,
        };
        tokio::spawn(dispatcher.run(command_rx));

        for worker_id in 0..workers.max(1) {
            let task_rx = Arc::clone(&task_rx);
            let commands = command_tx.clone();
            let pipeline = Arc::clone(&pipeline);
            let discovery = Arc::clone(&discovery);
            tokio::spawn(async move {
                worker_loop(worker_id, task_rx, commands, pipeline, discovery).await;
            });
        }

        Arc::new(JobManager {
            table,
            commands: command_tx,
        })
    }

    /// Schedules a run for the given tests, or all discovered tests when
    /// `tests` is absent or empty.
    pub async fn create_job(&self, tests: Option<Vec<String>>) -> Job {
        let (reply, response) = oneshot::channel();
        let _ = self.commands.send(Command::Create { tests, reply });
        response.await.expect("dispatcher task gone")
    }

    /// Clones an existing job's target list into a fresh job.
    pub async fn requeue(&self, id: Uuid) -> Option<Job> {
        let (reply, response) = oneshot::channel();
        let _ = self.commands.send(Command::Requeue { id, reply });
        response.await.expect("dispatcher task gone")
    }

    /// All known jobs, most recent first.
    pub async fn list_jobs(&self) -> Vec<Job> {
        self.table.read().await.newest_first()
    }

    pub async fn get_job(&self, id: Uuid) -> Option<Job> {
        self.table.read().await.jobs.get(&id).cloned()
    }

    /// Subscribes to the job stream; the first event is a snapshot taken
    /// atomically with respect to job mutations.
    pub async fn subscribe(&self) -> Subscription {
        let (reply, response) = oneshot::channel();
        let _ = self.commands.send(Command::Subscribe { reply });
        response.await.expect("dispatcher task gone")
    }
}

struct Dispatcher {
    table: Arc<RwLock<JobTable>>,
    discovery: Arc<Discovery>,
    broker: Arc<JobEventBroker>,
    task_tx: mpsc::UnboundedSender<TestTask>,
}

impl Dispatcher {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Create { tests, reply } => {
                    let job = self.create(tests).await;
                    let _ = reply.send(job);
                }
                Command::Requeue { id, reply } => {
                    let tests = self.table.read().await.jobs.get(&id).map(|j| j.tests.clone());
                    let job = match tests {
                        Some(tests) => Some(self.create(Some(tests)).await),
                        None => None,
                    };
                    let _ = reply.send(job);
                }
                Command::Subscribe { reply } => {
                    let jobs = self.table.read().await.newest_first();
                    let _ = reply.send(self.broker.subscribe(jobs));
                }
                Command::TestStarted {
                    job_id,
                    qualified_name,
                } => {
                    self.transition(job_id, &qualified_name, TestStatus::Running, None)
                        .await;
                }
                Command::TestFinished {
                    job_id,
                    qualified_name,
                    result,
                } => {
                    let status = if result.passed {
                        TestStatus::Passed
                    } else {
                        TestStatus::Failed
                    };
                    self.transition(job_id, &qualified_name, status, Some(*result))
                        .await;
                }
            }
        }
    }

    async fn create(&self, tests: Option<Vec<String>>) -> Job {
        let id = Uuid::new_v4();
        let now = now_epoch_secs();
        let snapshot = self.discovery.snapshot().await;

        let requested = tests.filter(|list| !list.is_empty());
        let (mut job, targets) = match requested {
            None => {
                // Run everything. A project that failed to load fully cannot
                // promise the full set, so the job fails with that error.
                if let Some(error) = snapshot.error {
                    let names = snapshot
                        .tests
                        .iter()
                        .map(|t| t.qualified_name.clone())
                        .collect();
                    (Job::failed(id, names, error, now), Vec::new())
                } else {
                    let names = snapshot
                        .tests
                        .iter()
                        .map(|t| t.qualified_name.clone())
                        .collect();
                    (Job::queued(id, names, now), snapshot.tests)
                }
            }
            Some(list) => {
                let mut targets = Vec::with_capacity(list.len());
                let mut unknown = Vec::new();
                for qualified_name in &list {
                    match snapshot
                        .tests
                        .iter()
                        .find(|t| &t.qualified_name == qualified_name)
                    {
                        Some(descriptor) => targets.push(descriptor.clone()),
                        None => unknown.push(qualified_name.clone()),
                    }
                }
                if unknown.is_empty() {
                    (Job::queued(id, list, now), targets)
                } else {
                    let mut error = format!("Test not found: {}", unknown.join(", "));
                    if let Some(discovery_error) = &snapshot.error {
                        error.push_str(&format!(" (discovery error: {})", discovery_error));
                    }
                    (Job::failed(id, list, error, now), Vec::new())
                }
            }
        };

        // A job with no targets has nothing left to transition it; deriving
        // here settles the empty set to succeeded immediately.
        job.status = job.derive_status();

        {
            let mut table = self.table.write().await;
            table.jobs.insert(id, job.clone());
            table.order.push(id);
        }
        self.broker.publish_delta(&job);
        tracing::info!(job = %id, tests = job.tests.len(), status = ?job.status, "job created");

        for (index, descriptor) in targets.into_iter().enumerate() {
            let _ = self.task_tx.send(TestTask {
                job_id: id,
                descriptor,
                reload_first: index == 0,
            });
        }
        job
    }

    async fn transition(
        &self,
        job_id: Uuid,
        qualified_name: &str,
        status: TestStatus,
        result: Option<TestResult>,
    ) {
        let updated = {
            let mut table = self.table.write().await;
            let Some(job) = table.jobs.get_mut(&job_id) else {
                return;
            };
            job.test_statuses
                .insert(qualified_name.to_string(), status);
            if let Some(result) = result {
                job.results.push(result);
            }
            job.updated_at = now_epoch_secs();
            job.status = job.derive_status();
            job.clone()
        };
        self.broker.publish_delta(&updated);
    }
}

async fn worker_loop(
    worker_id: usize,
    task_rx: Arc<Mutex<mpsc::UnboundedReceiver<TestTask>>>,
    commands: mpsc::UnboundedSender<Command>,
    pipeline: Arc<ExecutionPipeline>,
    discovery: Arc<Discovery>,
) {
    loop {
        let task = {
            let mut rx = task_rx.lock().await;
            rx.recv().await
        };
        let Some(task) = task else {
            return;
        };
        let dequeued_at = Instant::now();

        if task.reload_first {
            if let Err(err) = discovery.reload().await {
                tracing::warn!(worker = worker_id, %err, "hot reload before job failed");
            }
        }

        let _ = commands.send(Command::TestStarted {
            job_id: task.job_id,
            qualified_name: task.descriptor.qualified_name.clone(),
        });

        let result = pipeline.run(&task.descriptor, dequeued_at).await;

        let _ = commands.send(Command::TestFinished {
            job_id: task.job_id,
            qualified_name: task.descriptor.qualified_name.clone(),
            result: Box::new(result),
        });
    }
}
