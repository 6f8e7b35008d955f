//! # Gander
//!
//! Gander generates ramping CRUD load against a user-management API.
//!
//! Before the load test starts Gander seeds two pools of users: a read pool that is
//! only ever looked up, and a write pool that is updated and deleted. Virtual users
//! are then spawned and retired to follow a ramp plan. Each iteration a virtual user
//! picks one weighted action (read, update, create or delete), issues exactly one
//! request, and classifies the response into an outcome bucket such as `READ_200`
//! or `DELETE_UNEXPECTED`.
//!
//! When the ramp has finished and every user has drained, Gander prints a summary,
//! optionally writes an html report and a json summary, and
//! [`GanderMetrics::check`](./metrics/struct.GanderMetrics.html#method.check) reports
//! whether any unexpected outcomes were seen or the 95th percentile response time
//! reached its threshold.
//!
//! Gander uses [`reqwest`](https://docs.rs/reqwest/) to talk to the target, behind
//! the [`Transport`](./client/trait.Transport.html) trait.
//!
//! ## Creating a load test
//!
//! ```rust,no_run
//! use gander::prelude::*;
//!
//! fn main() -> Result<(), GanderError> {
//!     let metrics = GanderAttack::initialize()?
//!         .set_default(GanderDefault::Host, "http://localhost:8080")?
//!         .set_default(GanderDefault::Ramp, "10,30s;50,1m;0,10s")?
//!         .execute()?;
//!
//!     metrics.check()
//! }
//! ```
//!
//! Run-time options are listed with `--help`. The host and bearer token can also be
//! set with the `USER_BASE_URL` and `USER_API_TOKEN` environment variables.
//!
//! ## License
//!
//! Copyright 2020-21 Jeremy Andrews
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! you may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//! <http://www.apache.org/licenses/LICENSE-2.0>
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

#[macro_use]
extern crate log;

pub mod action;
pub mod classify;
pub mod client;
pub mod config;
pub mod logger;
pub mod metrics;
pub mod payload;
pub mod pool;
pub mod prelude;
pub mod ramp;
mod report;
pub mod user;
pub mod util;

use chrono::prelude::*;
use gumdrop::Options;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{self, Duration};
use std::{fmt, io};
use tokio::runtime::Runtime;

use crate::action::Action;
use crate::client::{HttpTransport, Transport};
use crate::config::{GanderConfiguration, GanderDefaults};
use crate::logger::{GanderLog, GanderLogFormat};
use crate::metrics::{Aggregator, GanderMetrics};
use crate::payload::PayloadBuilder;
use crate::pool::{PoolKind, ResourcePool, ResourcePools};
use crate::ramp::{RampAction, RampHistory, RampState};
use crate::user::{IterationBudget, UserCommand, UserContext, VirtualUser};

/// Set when ctrl-c is caught, moving the load test into the draining phase.
pub(crate) static CANCELED: AtomicBool = AtomicBool::new(false);

/// How often the engine compares running users against the ramp target.
const RAMP_TICK: Duration = Duration::from_millis(100);

/// An enumeration of all errors a [`GanderAttack`](./struct.GanderAttack.html) can return.
#[derive(Debug)]
pub enum GanderError {
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`reqwest::Error`](https://docs.rs/reqwest/*/reqwest/struct.Error.html).
    Reqwest(reqwest::Error),
    /// Wraps a ['tokio::task::JoinError'](https://tokio-rs.github.io/tokio/doc/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
    /// Wraps a [`serde_json::Error`](https://docs.rs/serde_json/*/serde_json/struct.Error.html).
    Serde(serde_json::Error),
    /// Failed to parse a hostname.
    InvalidHost {
        /// The invalid hostname that caused this error.
        host: String,
        /// An optional explanation of the error.
        detail: String,
        /// Wraps a [`url::ParseError`](https://docs.rs/url/*/url/enum.ParseError.html).
        parse_error: url::ParseError,
    },
    /// Invalid option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error, may be only invalid in context.
        option: String,
        /// The invalid value that caused this error, may be only invalid in context.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Invalid action weight specified.
    InvalidWeight {
        /// The specified weight, or the sum of all weights.
        weight: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// A pool required by the configured weights is empty after setup.
    EmptyPool {
        /// Which pool is empty.
        kind: PoolKind,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Requests were classified into unexpected buckets.
    UnexpectedOutcomes {
        /// How many requests were unexpected.
        count: usize,
        /// The unexpected buckets and their counts.
        detail: String,
    },
    /// The 95th percentile response time reached the configured threshold.
    ThresholdExceeded {
        /// The measured 95th percentile, in milliseconds.
        p95: usize,
        /// The configured threshold, in milliseconds.
        threshold: usize,
    },
}
/// Implement a helper to provide a text description of all possible types of errors.
impl GanderError {
    fn describe(&self) -> &str {
        match *self {
            GanderError::Io(_) => "io::Error",
            GanderError::Reqwest(_) => "reqwest::Error",
            GanderError::TokioJoin(_) => "tokio::task::JoinError",
            GanderError::Serde(_) => "serde_json::Error",
            GanderError::InvalidHost { .. } => "failed to parse hostname",
            GanderError::InvalidOption { .. } => "invalid option or value specified",
            GanderError::InvalidWeight { .. } => "invalid weight specified",
            GanderError::EmptyPool { .. } => "required pool is empty",
            GanderError::UnexpectedOutcomes { .. } => "unexpected outcomes recorded",
            GanderError::ThresholdExceeded { .. } => "response time threshold exceeded",
        }
    }
}

/// Implement format trait to allow displaying errors.
impl fmt::Display for GanderError {
    // Implement display of error with `{}` marker.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            GanderError::Io(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::Reqwest(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::TokioJoin(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::Serde(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::InvalidHost {
                ref parse_error, ..
            } => write!(f, "GanderError: {} ({})", self.describe(), parse_error),
            GanderError::InvalidOption { ref detail, .. }
            | GanderError::InvalidWeight { ref detail, .. }
            | GanderError::EmptyPool { ref detail, .. } => {
                write!(f, "GanderError: {} ({})", self.describe(), detail)
            }
            GanderError::UnexpectedOutcomes {
                count, ref detail, ..
            } => write!(
                f,
                "GanderError: {} ({} requests: {})",
                self.describe(),
                count,
                detail
            ),
            GanderError::ThresholdExceeded { p95, threshold } => write!(
                f,
                "GanderError: {} (p95 {}ms >= {}ms)",
                self.describe(),
                p95,
                threshold
            ),
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for GanderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            GanderError::Io(ref source) => Some(source),
            GanderError::Reqwest(ref source) => Some(source),
            GanderError::TokioJoin(ref source) => Some(source),
            GanderError::Serde(ref source) => Some(source),
            GanderError::InvalidHost {
                ref parse_error, ..
            } => Some(parse_error),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for GanderError {
    fn from(err: reqwest::Error) -> GanderError {
        GanderError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for GanderError {
    fn from(err: io::Error) -> GanderError {
        GanderError::Io(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for GanderError {
    fn from(err: tokio::task::JoinError) -> GanderError {
        GanderError::TokioJoin(err)
    }
}

/// Auto-convert serde_json errors.
impl From<serde_json::Error> for GanderError {
    fn from(err: serde_json::Error) -> GanderError {
        GanderError::Serde(err)
    }
}

/// A [`GanderAttack`](./struct.GanderAttack.html) load test moves through each of the
/// following phases, in order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttackPhase {
    /// Configured but not yet started.
    Idle,
    /// Seeding the read and write pools.
    Setup,
    /// Spawning and retiring users to follow the ramp.
    Ramping,
    /// No new users are spawned, running users finish their iteration and exit.
    Draining,
    /// Optionally deleting seeded users.
    Teardown,
    /// Every user has exited and metrics are final.
    Stopped,
}

// A running user, and how to tell it to stop.
struct RunningUser {
    sender: flume::Sender<UserCommand>,
    handle: tokio::task::JoinHandle<()>,
}

/// Global internal state for the load test.
#[derive(Clone)]
pub struct GanderAttack {
    /// Optional default values for Gander run-time options.
    pub(crate) defaults: GanderDefaults,
    /// Configuration object holding options set when launching the load test.
    configuration: GanderConfiguration,
    /// An optional transport replacing the default [`HttpTransport`].
    transport: Option<Arc<dyn Transport>>,
    /// Which phase the load test is currently operating in.
    attack_phase: AttackPhase,
}
/// Gander's internal global state.
impl GanderAttack {
    /// Load configuration from the command line and initialize a
    /// [`GanderAttack`](./struct.GanderAttack.html).
    ///
    /// # Example
    /// ```rust,no_run
    /// use gander::prelude::*;
    ///
    /// let gander_attack = GanderAttack::initialize();
    /// ```
    pub fn initialize() -> Result<GanderAttack, GanderError> {
        Ok(GanderAttack::initialize_with_config(
            GanderConfiguration::parse_args_default_or_exit(),
        ))
    }

    /// Initialize a [`GanderAttack`](./struct.GanderAttack.html) with an already loaded
    /// configuration.
    ///
    /// This is generally used by tests.
    ///
    /// # Example
    /// ```rust
    /// use gander::GanderAttack;
    /// use gander::config::GanderConfiguration;
    /// use gumdrop::Options;
    ///
    /// let configuration = GanderConfiguration::parse_args_default(&["--host", "http://localhost"]).unwrap();
    /// let gander_attack = GanderAttack::initialize_with_config(configuration);
    /// ```
    pub fn initialize_with_config(configuration: GanderConfiguration) -> GanderAttack {
        GanderAttack {
            defaults: GanderDefaults::default(),
            configuration,
            transport: None,
            attack_phase: AttackPhase::Idle,
        }
    }

    /// Replace the default [`HttpTransport`] with another [`Transport`].
    pub fn set_transport(mut self, transport: Arc<dyn Transport>) -> Box<Self> {
        self.transport = Some(transport);
        Box::new(self)
    }

    /// Execute the [`GanderAttack`](./struct.GanderAttack.html) load test, returning
    /// the collected metrics once every user has drained.
    ///
    /// A load test that records unexpected outcomes still returns `Ok`, call
    /// [`GanderMetrics::check`] to confirm the results.
    pub fn execute(mut self) -> Result<GanderMetrics, GanderError> {
        // If version flag is set, display package name and version and exit.
        if self.configuration.version {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            std::process::exit(0);
        }

        // Configure GanderConfiguration.
        self.configuration.configure(&self.defaults);

        // Validate GanderConfiguration.
        self.configuration.validate()?;
        info!("global host configured: {}", self.configuration.host);

        let rt = Runtime::new()?;
        rt.block_on(self.start_attack())
    }

    // Change from one phase to the next.
    fn set_attack_phase(&mut self, phase: AttackPhase) {
        if self.attack_phase != phase {
            debug!("entering {:?} phase from {:?}", phase, self.attack_phase);
            self.attack_phase = phase;
        }
    }

    // Which pools the configured weights draw from.
    fn required_pools(&self) -> Vec<PoolKind> {
        if self.configuration.chained {
            return Vec::new();
        }
        let weights = self.configuration.action_weights();
        let mut required = Vec::new();
        if weights.weight(Action::Read) > 0.0 {
            required.push(PoolKind::Read);
        }
        if weights.weight(Action::Update) > 0.0 || weights.weight(Action::Delete) > 0.0 {
            required.push(PoolKind::Write);
        }
        required
    }

    // Seed both pools, then apply the empty-pool policy.
    async fn setup(
        &mut self,
        builder: &PayloadBuilder,
        transport: &dyn Transport,
    ) -> Result<ResourcePools, GanderError> {
        self.set_attack_phase(AttackPhase::Setup);
        // Chains create their own users and never draw from a pool.
        if self.configuration.chained {
            info!("chained mode, not seeding pools");
            return Ok(ResourcePools::empty());
        }

        let read_pool = self.configuration.read_pool.unwrap_or(config::DEFAULT_READ_POOL);
        let write_pool = self
            .configuration
            .write_pool
            .unwrap_or(config::DEFAULT_WRITE_POOL);

        let pools = ResourcePools::new(
            pool::seed(PoolKind::Read, read_pool, builder, transport).await,
            pool::seed(PoolKind::Write, write_pool, builder, transport).await,
        );

        for kind in self.required_pools() {
            if pools.get(kind).is_empty() {
                let detail = format!(
                    "the {} pool is empty, {} iterations that need it will be skipped",
                    kind, kind
                );
                if self.configuration.strict_pools {
                    error!("{}", detail);
                    return Err(GanderError::EmptyPool { kind, detail });
                }
                warn!("{}", detail);
            }
        }

        Ok(pools)
    }

    // Delete every seeded identifier. Teardown requests are not recorded.
    async fn teardown(
        &mut self,
        pools: &ResourcePools,
        builder: &PayloadBuilder,
        transport: &dyn Transport,
    ) {
        self.set_attack_phase(AttackPhase::Teardown);
        let seeded: [&ResourcePool; 2] = [&pools.read, &pools.write];
        let total: usize = seeded.iter().map(|pool| pool.len()).sum();
        info!("tearing down {} seeded users...", total);

        let mut deleted = 0;
        for pool in seeded {
            for identifier in pool.identifiers() {
                let plan = builder.build(Action::Delete, identifier);
                match transport.send(&plan).await {
                    Ok(200) | Ok(404) => deleted += 1,
                    Ok(status_code) => {
                        debug!("failed to delete {}: {}", identifier, status_code)
                    }
                    Err(e) => debug!("failed to delete {}: {}", identifier, e),
                }
            }
        }
        info!("deleted {} of {} seeded users", deleted, total);
    }

    // Called internally by execute().
    async fn start_attack(mut self) -> Result<GanderMetrics, GanderError> {
        util::setup_ctrlc_handler();

        let transport: Arc<dyn Transport> = match self.transport.clone() {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_configuration(&self.configuration)?),
        };
        let builder = Arc::new(PayloadBuilder::from_configuration(&self.configuration));

        // Launch the optional request log thread.
        let (logger_sender, logger_handle) = if self.configuration.request_log.is_empty() {
            (None, None)
        } else {
            // Open the log before seeding, so an unwritable path fails before any load.
            let file = logger::open_request_log(&self.configuration.request_log).await?;
            let (sender, receiver) = flume::unbounded::<Option<GanderLog>>();
            let handle = tokio::spawn(logger::logger_main(
                self.configuration.request_log.clone(),
                file,
                self.configuration
                    .request_format
                    .unwrap_or(GanderLogFormat::Json),
                receiver,
            ));
            (Some(sender), Some(handle))
        };

        let pools = Arc::new(self.setup(&builder, transport.as_ref()).await?);

        let aggregator = Arc::new(Aggregator::new());
        let budget = Arc::new(IterationBudget::new(self.configuration.iterations));
        let pacing = Duration::from_millis(
            self.configuration.pacing.unwrap_or(config::DEFAULT_PACING) as u64,
        );
        let context = UserContext {
            weights: Arc::new(self.configuration.action_weights()),
            pools: pools.clone(),
            builder: builder.clone(),
            transport: transport.clone(),
            aggregator: aggregator.clone(),
            started: time::Instant::now(),
            seed: self.configuration.seed,
            chained: self.configuration.chained,
            logger: logger_sender.clone(),
        };

        let plan = self.configuration.ramp_plan();
        info!(
            "ramping with {} policy: {} ({} seconds)",
            plan.policy(),
            plan,
            plan.total_duration().as_secs()
        );

        let started_at = Local::now();
        let started = time::Instant::now();
        let mut history: Vec<RampHistory> = Vec::new();
        let mut running: Vec<RunningUser> = Vec::new();
        let mut retired: Vec<tokio::task::JoinHandle<()>> = Vec::new();
        let mut next_index = 0;
        let mut max_users = 0;
        let mut stage = None;
        let mut drift_timer = tokio::time::Instant::now();

        self.set_attack_phase(AttackPhase::Ramping);
        loop {
            if CANCELED.load(Ordering::SeqCst) {
                info!("load test canceled, draining...");
                break;
            }
            if budget.exhausted() {
                info!("iteration budget exhausted, draining...");
                break;
            }

            let elapsed = started.elapsed();
            let index = match plan.state(elapsed) {
                RampState::Draining => break,
                RampState::Ramping(index) => index,
            };

            let target = plan.current_target(elapsed);
            while running.len() < target {
                let (sender, receiver) = flume::unbounded();
                let user = VirtualUser::new(next_index, &context);
                let handle = tokio::spawn(user::user_main(user, receiver, pacing, budget.clone()));
                running.push(RunningUser { sender, handle });
                next_index += 1;
            }
            while running.len() > target {
                if let Some(user) = running.pop() {
                    // A user that already exited has dropped its receiver.
                    let _ = user.sender.send(UserCommand::Exit);
                    retired.push(user.handle);
                }
            }
            max_users = max_users.max(running.len());

            if stage != Some(index) {
                stage = Some(index);
                let action = plan.stage_action(index);
                info!(
                    "stage {} {:?}: {} users",
                    index + 1,
                    action,
                    running.len()
                );
                history.push(RampHistory::step(action, running.len()));
            }

            drift_timer = util::sleep_minus_drift(RAMP_TICK, drift_timer).await;
        }

        // Tell every running user to exit, then wait for all of them.
        self.set_attack_phase(AttackPhase::Draining);
        history.push(RampHistory::step(RampAction::Draining, running.len()));
        info!("draining {} users...", running.len());
        for user in running {
            let _ = user.sender.send(UserCommand::Exit);
            retired.push(user.handle);
        }
        for result in futures::future::join_all(retired).await {
            if let Err(e) = result {
                warn!("user exited abnormally: {}", e);
            }
        }
        let duration = started.elapsed().as_secs() as usize;
        history.push(RampHistory::step(RampAction::Finished, 0));

        if self.configuration.teardown {
            self.teardown(&pools, &builder, transport.as_ref()).await;
        }

        // Flush and stop the request log thread.
        drop(context);
        if let Some(sender) = logger_sender {
            let _ = sender.send(None);
        }
        // A failing request log never discards the metrics of a finished load test.
        if let Some(handle) = logger_handle {
            match handle.await {
                Ok(Ok(())) => (),
                Ok(Err(e)) => error!("request log failed: {}", e),
                Err(e) => error!("request log thread failed: {}", e),
            }
        }
        self.set_attack_phase(AttackPhase::Stopped);

        let mut metrics = aggregator.snapshot();
        metrics.started = Some(started_at);
        metrics.duration = duration;
        metrics.users = max_users;
        metrics.history = history;
        metrics.read_pool = pools.read.len();
        metrics.write_pool = pools.write.len();
        metrics.p95_threshold = self
            .configuration
            .p95_threshold
            .unwrap_or(config::DEFAULT_P95_THRESHOLD);
        metrics.display_metrics = !self.configuration.no_print_metrics;
        let total_requests = metrics.total_requests();
        metrics.target_unreachable =
            total_requests > 0 && metrics.connect_failures == total_requests;
        if metrics.target_unreachable {
            error!(
                "target unreachable: all {} requests to {} failed",
                total_requests, self.configuration.host
            );
        }

        metrics.print();

        if !self.configuration.report_file.is_empty() {
            report::write_html_report(
                &self.configuration.report_file,
                &metrics,
                &self.configuration.host,
            )
            .await?;
        }
        if !self.configuration.summary_file.is_empty() {
            report::write_summary(&self.configuration.summary_file, &metrics).await?;
        }

        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let error = GanderError::EmptyPool {
            kind: PoolKind::Write,
            detail: "the write pool is empty".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "GanderError: required pool is empty (the write pool is empty)"
        );

        let error = GanderError::ThresholdExceeded {
            p95: 1_200,
            threshold: 1_000,
        };
        assert_eq!(
            error.to_string(),
            "GanderError: response time threshold exceeded (p95 1200ms >= 1000ms)"
        );

        let error: GanderError = io::Error::new(io::ErrorKind::Other, "disk full").into();
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn required_pools() {
        let configuration = GanderConfiguration::default();
        let gander_attack = GanderAttack::initialize_with_config(configuration.clone());
        assert_eq!(
            gander_attack.required_pools(),
            vec![PoolKind::Read, PoolKind::Write]
        );

        let mut read_only = configuration.clone();
        read_only.weights = Some(action::ActionWeights::new(1.0, 0.0, 0.0, 0.0).unwrap());
        assert_eq!(
            GanderAttack::initialize_with_config(read_only).required_pools(),
            vec![PoolKind::Read]
        );

        let mut chained = configuration;
        chained.chained = true;
        assert!(GanderAttack::initialize_with_config(chained)
            .required_pools()
            .is_empty());
    }
}
