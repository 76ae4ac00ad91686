//! Distributed fitness evaluation.
//!
//! Genomes are wrapped in tasks and pushed onto a bounded queue served by a pool of
//! long-lived worker threads, each owning one worker handle (a [`Challenge`] that
//! may forward to a remote machine). Results travel back over a channel tagged with
//! the task id.
//!
//! No more tasks are in flight than there are workers, so a task only waits in the
//! queue while a worker is still busy with an attempt that already expired. A
//! worker announces each task it picks up, and the attempt's deadline restarts
//! from that moment. The coordinator waits on the result channel no longer than
//! the nearest deadline; a task that misses it is requeued with a higher priority
//! until it has been attempted `max_retries + 1` times, after which the genome is
//! scored with the failure fitness and a [`FitnessError::Timeout`] is reported.
//! Late results of an expired attempt are discarded, and workers skip tasks whose
//! deadline passed while queued. A single unresponsive worker therefore delays a
//! batch by at most the retry budget, never indefinitely.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use super::{score_guarded, EvaluationReport, FitnessEvaluator};
use crate::error::{FitnessError, GeneticError, Result};
use crate::evolution::Challenge;

/// Source of task ids, unique for the lifetime of the process.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Wait used when every task is pending because the queue is full.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub struct DistributedConfig {
    /// Deadline of one attempt, measured from the moment a worker starts it.
    pub timeout: Duration,
    /// Attempts after the first before a task is given up.
    pub max_retries: u32,
    /// Capacity of the task queue shared by the workers.
    pub queue_capacity: usize,
    /// Fitness of genomes whose evaluation failed or timed out.
    pub failure_fitness: f64,
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            queue_capacity: 64,
            failure_fitness: f64::MIN,
        }
    }
}

/// One attempt at evaluating one genome.
#[derive(Debug, Clone)]
pub struct EvaluationTask<G> {
    pub id: u64,
    /// Position of the genome in the evaluated batch.
    pub index: usize,
    pub priority: u32,
    pub created_at: Instant,
    pub deadline: Instant,
    pub timeout: Duration,
    pub attempt: u32,
    pub genome: G,
}

#[derive(Debug)]
struct TaskResult {
    task_id: u64,
    worker: usize,
    outcome: std::result::Result<f64, FitnessError>,
}

#[derive(Debug)]
enum WorkerMessage {
    Started { task_id: u64, at: Instant },
    Finished(TaskResult),
}

/// A task waiting to be (re)dispatched.
#[derive(Debug, PartialEq, Eq)]
struct PendingTask {
    index: usize,
    attempt: u32,
    priority: u32,
    created_at: Instant,
}

impl Ord for PendingTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority first, then lower index.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for PendingTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct Outstanding {
    index: usize,
    attempt: u32,
    created_at: Instant,
    deadline: Instant,
}

/// Evaluates genomes on a pool of worker threads with per-task timeouts.
///
/// Worker threads are detached: they stop once the evaluator is dropped and
/// their current task returns.
pub struct DistributedEvaluator<G> {
    config: DistributedConfig,
    task_tx: Sender<EvaluationTask<G>>,
    result_rx: Receiver<WorkerMessage>,
    workers: usize,
    // Result ids from concurrent batches would be indistinguishable from stale ones.
    batch_lock: Mutex<()>,
}

impl<G> std::fmt::Debug for DistributedEvaluator<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedEvaluator")
            .field("config", &self.config)
            .field("workers", &self.workers)
            .finish()
    }
}

impl<G> DistributedEvaluator<G>
where
    G: Clone + Send + 'static,
{
    /// Spawns one worker thread per handle.
    pub fn new(
        handles: Vec<Arc<dyn Challenge<G>>>,
        config: DistributedConfig,
    ) -> Result<Self> {
        if handles.is_empty() {
            return Err(GeneticError::Configuration(
                "Distributed evaluation needs at least one worker".to_string(),
            ));
        }
        if config.queue_capacity == 0 {
            return Err(GeneticError::Configuration(
                "Task queue capacity cannot be zero".to_string(),
            ));
        }
        if config.timeout.is_zero() {
            return Err(GeneticError::Configuration(
                "Task timeout cannot be zero".to_string(),
            ));
        }

        let (task_tx, task_rx) = bounded::<EvaluationTask<G>>(config.queue_capacity);
        let (result_tx, result_rx) = unbounded();
        let workers = handles.len();

        for (worker, handle) in handles.into_iter().enumerate() {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            thread::Builder::new()
                .name(format!("genopt-worker-{}", worker))
                .spawn(move || Self::worker_loop(worker, handle, task_rx, result_tx))?;
        }

        Ok(Self {
            config,
            task_tx,
            result_rx,
            workers,
            batch_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &DistributedConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    fn worker_loop(
        worker: usize,
        handle: Arc<dyn Challenge<G>>,
        tasks: Receiver<EvaluationTask<G>>,
        results: Sender<WorkerMessage>,
    ) {
        while let Ok(task) = tasks.recv() {
            let at = Instant::now();
            if at >= task.deadline {
                debug!("Worker {} skipping expired task {}", worker, task.id);
                continue;
            }
            if results
                .send(WorkerMessage::Started {
                    task_id: task.id,
                    at,
                })
                .is_err()
            {
                break;
            }
            let outcome = score_guarded(handle.as_ref(), &task.genome);
            if results
                .send(WorkerMessage::Finished(TaskResult {
                    task_id: task.id,
                    worker,
                    outcome,
                }))
                .is_err()
            {
                break;
            }
        }
    }

    fn run_batch(&self, genomes: &[G]) -> Vec<std::result::Result<f64, FitnessError>> {
        let n = genomes.len();
        let mut outcomes: Vec<Option<std::result::Result<f64, FitnessError>>> = vec![None; n];
        let mut remaining = n;
        let started = Instant::now();

        let mut pending: BinaryHeap<PendingTask> = (0..n)
            .map(|index| PendingTask {
                index,
                attempt: 0,
                priority: 0,
                created_at: started,
            })
            .collect();
        let mut outstanding: HashMap<u64, Outstanding> = HashMap::new();

        while remaining > 0 {
            // Dispatch up to one task per worker.
            while outstanding.len() < self.workers {
                let Some(next) = pending.pop() else {
                    break;
                };
                let now = Instant::now();
                let task = EvaluationTask {
                    id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
                    index: next.index,
                    priority: next.priority,
                    created_at: next.created_at,
                    deadline: now + self.config.timeout,
                    timeout: self.config.timeout,
                    attempt: next.attempt,
                    genome: genomes[next.index].clone(),
                };
                let (id, deadline) = (task.id, task.deadline);
                match self.task_tx.try_send(task) {
                    Ok(()) => {
                        outstanding.insert(
                            id,
                            Outstanding {
                                index: next.index,
                                attempt: next.attempt,
                                created_at: next.created_at,
                                deadline,
                            },
                        );
                    }
                    Err(TrySendError::Full(_)) => {
                        pending.push(next);
                        break;
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        pending.push(next);
                        for task in pending.drain() {
                            outcomes[task.index] = Some(Err(FitnessError::WorkerUnavailable(
                                "All workers have stopped".to_string(),
                            )));
                            remaining -= 1;
                        }
                        break;
                    }
                }
            }
            if remaining == 0 {
                break;
            }

            let wait = outstanding
                .values()
                .map(|o| o.deadline)
                .min()
                .map_or(QUEUE_FULL_BACKOFF, |d| {
                    d.saturating_duration_since(Instant::now())
                });

            match self.result_rx.recv_timeout(wait) {
                Ok(WorkerMessage::Started { task_id, at }) => {
                    if let Some(task) = outstanding.get_mut(&task_id) {
                        task.deadline = at + self.config.timeout;
                    }
                }
                Ok(WorkerMessage::Finished(result)) => {
                    match outstanding.remove(&result.task_id) {
                        Some(task) => {
                            outcomes[task.index] = Some(result.outcome);
                            remaining -= 1;
                        }
                        None => debug!(
                            "Ignoring stale result of task {} from worker {}",
                            result.task_id, result.worker
                        ),
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                // Every worker is gone; outstanding tasks can only expire.
                Err(RecvTimeoutError::Disconnected) => thread::sleep(wait),
            }

            let now = Instant::now();
            let expired: Vec<u64> = outstanding
                .iter()
                .filter(|(_, o)| o.deadline <= now)
                .map(|(&id, _)| id)
                .collect();
            for id in expired {
                let Some(task) = outstanding.remove(&id) else {
                    continue;
                };
                if task.attempt < self.config.max_retries {
                    warn!(
                        "Task {} for genome {} timed out, retrying (attempt {} of {})",
                        id,
                        task.index,
                        task.attempt + 2,
                        self.config.max_retries + 1
                    );
                    pending.push(PendingTask {
                        index: task.index,
                        attempt: task.attempt + 1,
                        priority: task.attempt + 1,
                        created_at: task.created_at,
                    });
                } else {
                    outcomes[task.index] = Some(Err(FitnessError::Timeout {
                        task_id: id,
                        attempts: task.attempt + 1,
                    }));
                    remaining -= 1;
                }
            }
        }

        outcomes
            .into_iter()
            .map(|o| {
                o.unwrap_or_else(|| {
                    Err(FitnessError::WorkerUnavailable("No result collected".to_string()))
                })
            })
            .collect()
    }
}

impl<G> FitnessEvaluator<G> for DistributedEvaluator<G>
where
    G: Clone + Send + Sync + 'static,
{
    fn evaluate(&self, genomes: &[G]) -> Result<EvaluationReport> {
        let _batch = self
            .batch_lock
            .lock()
            .map_err(|_| GeneticError::Evaluator("Evaluator lock poisoned".to_string()))?;
        let outcomes = self.run_batch(genomes);
        Ok(EvaluationReport::from_outcomes(
            outcomes,
            self.config.failure_fitness,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn config(timeout_ms: u64, max_retries: u32) -> DistributedConfig {
        DistributedConfig {
            timeout: Duration::from_millis(timeout_ms),
            max_retries,
            queue_capacity: 4,
            failure_fitness: -100.0,
        }
    }

    #[test]
    fn test_results_in_input_order() {
        let handle: Arc<dyn Challenge<u64>> =
            Arc::new(|x: &u64| -> std::result::Result<f64, FitnessError> {
                thread::sleep(Duration::from_millis(x % 3));
                Ok(*x as f64)
            });
        let evaluator =
            DistributedEvaluator::new(vec![handle.clone(), handle.clone(), handle], config(2_000, 1))
                .unwrap();
        let genomes: Vec<u64> = (0..20).collect();
        let report = evaluator.evaluate(&genomes).unwrap();
        assert_eq!(report.fitness, (0..20).map(|x| x as f64).collect::<Vec<_>>());
        assert_eq!(report.failed_count(), 0);
    }

    #[test]
    fn test_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle: Arc<dyn Challenge<u64>> =
            Arc::new(move |_: &u64| -> std::result::Result<f64, FitnessError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FitnessError::Evaluation("bad".to_string()))
            });
        let evaluator = DistributedEvaluator::new(vec![handle], config(2_000, 3)).unwrap();
        let report = evaluator.evaluate(&[1, 2]).unwrap();
        assert_eq!(report.fitness, vec![-100.0, -100.0]);
        assert!(report.all_failed());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_timeout_falls_back_to_penalty() {
        let handle: Arc<dyn Challenge<u64>> =
            Arc::new(|_: &u64| -> std::result::Result<f64, FitnessError> {
                thread::sleep(Duration::from_millis(200));
                Ok(1.0)
            });
        let evaluator = DistributedEvaluator::new(vec![handle], config(20, 2)).unwrap();

        let started = Instant::now();
        let report = evaluator.evaluate(&[7]).unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.fitness, vec![-100.0]);
        assert!(matches!(
            report.failures[0].1,
            FitnessError::Timeout { attempts: 3, .. }
        ));
    }

    #[test]
    fn test_panicking_worker_reports_failure() {
        let handle: Arc<dyn Challenge<u64>> =
            Arc::new(|x: &u64| -> std::result::Result<f64, FitnessError> {
                if *x == 3 {
                    panic!("worker crashed");
                }
                Ok(*x as f64)
            });
        let evaluator = DistributedEvaluator::new(vec![handle], config(2_000, 0)).unwrap();
        let report = evaluator.evaluate(&[1, 3, 5]).unwrap();
        assert_eq!(report.fitness, vec![1.0, -100.0, 5.0]);
        assert!(matches!(report.failures[0].1, FitnessError::Panicked(_)));
    }

    #[test]
    fn test_queue_wait_does_not_count_against_timeout() {
        let handle: Arc<dyn Challenge<u64>> =
            Arc::new(|x: &u64| -> std::result::Result<f64, FitnessError> {
                thread::sleep(Duration::from_millis(30));
                Ok(*x as f64)
            });
        let evaluator = DistributedEvaluator::new(vec![handle], config(100, 2)).unwrap();

        let genomes: Vec<u64> = (0..20).collect();
        let report = evaluator.evaluate(&genomes).unwrap();
        assert_eq!(report.failed_count(), 0);
        assert_eq!(report.fitness, (0..20).map(|x| x as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_pending_order_prefers_retries() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(PendingTask { index: 0, attempt: 0, priority: 0, created_at: now });
        heap.push(PendingTask { index: 5, attempt: 1, priority: 1, created_at: now });
        heap.push(PendingTask { index: 2, attempt: 0, priority: 0, created_at: now });
        assert_eq!(heap.pop().map(|t| t.index), Some(5));
        assert_eq!(heap.pop().map(|t| t.index), Some(0));
        assert_eq!(heap.pop().map(|t| t.index), Some(2));
    }

    #[test]
    fn test_requires_workers() {
        assert!(DistributedEvaluator::<u64>::new(Vec::new(), config(10, 0)).is_err());
    }
}
