//! Virtual users and the loop that drives them.
//!
//! Each [`VirtualUser`] runs as its own tokio task, performing one weighted [`Action`]
//! per iteration until the engine sends [`UserCommand::Exit`], the shared
//! [`IterationBudget`] runs out, or the load test is canceled.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{self, Duration};

use crate::action::{Action, ActionWeights};
use crate::classify::{classify, success, OutcomeBucket};
use crate::client::Transport;
use crate::logger::{GanderLog, GanderLoggerSender};
use crate::metrics::{Aggregator, RequestMetric};
use crate::payload::{generate_identifier, PayloadBuilder};
use crate::pool::ResourcePools;
use crate::CANCELED;

/// Commands sent from the engine to running users.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserCommand {
    /// Finish the current iteration and exit.
    Exit,
}

/// A cap on iterations shared by every user.
#[derive(Debug, Default)]
pub struct IterationBudget {
    limit: Option<usize>,
    claimed: AtomicUsize,
}
impl IterationBudget {
    /// A budget of `limit` iterations, or an unlimited one if `None`.
    pub fn new(limit: Option<usize>) -> Self {
        IterationBudget {
            limit,
            claimed: AtomicUsize::new(0),
        }
    }

    /// Reserve one iteration. Returns `false` once the budget is spent.
    pub fn try_claim(&self) -> bool {
        match self.limit {
            None => true,
            Some(limit) => self
                .claimed
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |claimed| {
                    if claimed < limit {
                        Some(claimed + 1)
                    } else {
                        None
                    }
                })
                .is_ok(),
        }
    }

    /// True once every iteration in the budget has been claimed.
    pub fn exhausted(&self) -> bool {
        match self.limit {
            None => false,
            Some(limit) => self.claimed.load(Ordering::SeqCst) >= limit,
        }
    }
}

/// What a single iteration did.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IterationOutcome {
    /// One request was made and classified.
    Recorded(OutcomeBucket),
    /// The pool the action needed was empty, no request was made.
    Skipped(Action),
    /// A create, update, delete chain, stopped early at the first failed step.
    Chain(Vec<OutcomeBucket>),
}

/// Everything users share during a load test.
#[derive(Clone)]
pub struct UserContext {
    pub weights: Arc<ActionWeights>,
    pub pools: Arc<ResourcePools>,
    pub builder: Arc<PayloadBuilder>,
    pub transport: Arc<dyn Transport>,
    pub aggregator: Arc<Aggregator>,
    /// When the load test started, used to timestamp requests.
    pub started: time::Instant,
    /// Base seed, each user adds its own index.
    pub seed: Option<u64>,
    pub chained: bool,
    pub logger: Option<GanderLoggerSender>,
}

/// A single simulated client.
pub struct VirtualUser {
    /// Which user this is, starting at 0.
    pub index: usize,
    context: UserContext,
    rng: StdRng,
}
impl VirtualUser {
    pub fn new(index: usize, context: &UserContext) -> Self {
        let rng = match context.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::seed_from_u64(rand::random()),
        };
        VirtualUser {
            index,
            context: context.clone(),
            rng,
        }
    }

    /// Perform one iteration.
    pub async fn run_iteration(&mut self) -> IterationOutcome {
        if self.context.chained {
            let buckets = self.run_chain().await;
            self.context.aggregator.record_iteration();
            return IterationOutcome::Chain(buckets);
        }

        let draw: f64 = self.rng.random();
        let action = self.context.weights.pick(draw);
        let identifier = match action.pool() {
            Some(kind) => match self.context.pools.get(kind).choose(&mut self.rng) {
                Some(identifier) => identifier.to_string(),
                None => {
                    debug!(
                        "[user {}]: skipping {}, {} pool is empty",
                        self.index, action, kind
                    );
                    self.context.aggregator.record_skipped(action);
                    self.context.aggregator.record_iteration();
                    return IterationOutcome::Skipped(action);
                }
            },
            None => generate_identifier("create"),
        };

        let bucket = self.perform(action, &identifier).await;
        self.context.aggregator.record_iteration();
        IterationOutcome::Recorded(bucket)
    }

    // Create, update then delete one fresh identifier, stopping at the first step that
    // doesn't succeed.
    async fn run_chain(&mut self) -> Vec<OutcomeBucket> {
        let identifier = generate_identifier("chain");
        let mut buckets = Vec::with_capacity(3);
        for action in [Action::Create, Action::Update, Action::Delete] {
            let bucket = self.perform(action, &identifier).await;
            buckets.push(bucket);
            if bucket != OutcomeBucket::new(action, success(action)) {
                debug!(
                    "[user {}]: chain for {} stopped at {}",
                    self.index, identifier, bucket
                );
                break;
            }
        }
        buckets
    }

    // Issue one request, then classify and record the result.
    async fn perform(&mut self, action: Action, identifier: &str) -> OutcomeBucket {
        let plan = self.context.builder.build(action, identifier);
        let started = time::Instant::now();
        let result = self.context.transport.send(&plan).await;
        let response_time = started.elapsed().as_millis() as u64;

        let (status_code, error) = match result {
            Ok(status_code) => (Some(status_code), None),
            Err(e) => {
                if e.is_connect() {
                    self.context.aggregator.record_connect_failure();
                }
                (None, Some(e.to_string()))
            }
        };
        let bucket = classify(action, status_code);
        if !bucket.is_expected() {
            debug!(
                "[user {}]: {} {} returned {:?} {:?}",
                self.index,
                plan.name(),
                identifier,
                status_code,
                error
            );
        }

        let request = RequestMetric {
            elapsed: self.context.started.elapsed().as_millis() as u64,
            user: self.index,
            action,
            name: plan.name(),
            identifier: identifier.to_string(),
            status_code,
            response_time,
            bucket,
            error,
        };
        self.context.aggregator.record(&request);

        // If the request log is enabled, send a copy of the request to the logger thread.
        if let Some(logger) = self.context.logger.as_ref() {
            if let Err(e) = logger.send(Some(GanderLog::Request(request))) {
                debug!("failed to send request to logger: {}", e);
            }
        }

        bucket
    }
}

/// Run iterations until told to stop.
pub(crate) async fn user_main(
    mut user: VirtualUser,
    receiver: flume::Receiver<UserCommand>,
    pacing: Duration,
    budget: Arc<IterationBudget>,
) {
    info!("launching user {}...", user.index);

    'iterations: loop {
        if received_exit(&receiver) || CANCELED.load(Ordering::SeqCst) {
            break;
        }
        if !budget.try_claim() {
            debug!("[user {}]: iteration budget exhausted", user.index);
            break;
        }

        user.run_iteration().await;

        if pacing.is_zero() {
            tokio::task::yield_now().await;
            continue;
        }

        // Total time left to wait before the next iteration.
        let mut wait_time = pacing.as_millis();
        // Never sleep more than 500 milliseconds, so exit is noticed quickly.
        let maximum_sleep_time = 500;
        while wait_time > 0 {
            if received_exit(&receiver) || CANCELED.load(Ordering::SeqCst) {
                break 'iterations;
            }

            let sleep_duration = if wait_time > maximum_sleep_time {
                wait_time -= maximum_sleep_time;
                Duration::from_millis(maximum_sleep_time as u64)
            } else {
                let sleep_duration = Duration::from_millis(wait_time as u64);
                wait_time = 0;
                sleep_duration
            };

            trace!("user {} sleeping {:?} ...", user.index, sleep_duration);
            tokio::time::sleep(sleep_duration).await;
        }
    }

    info!("exiting user {}...", user.index);
}

// Determine if the engine has sent UserCommand::Exit, or gone away.
fn received_exit(receiver: &flume::Receiver<UserCommand>) -> bool {
    match receiver.try_recv() {
        Ok(UserCommand::Exit) => true,
        Err(flume::TryRecvError::Disconnected) => true,
        Err(flume::TryRecvError::Empty) => false,
    }
}
