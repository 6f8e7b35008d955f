//! Functions and structures related to configuring a Gander load test.
//!
//! Gander can be configured at run time by passing in the options and flags defined by
//! the [`GanderConfiguration`] structure. The target host and bearer token can also be
//! provided through the `USER_BASE_URL` and `USER_API_TOKEN` environment variables.
//!
//! Gander can be configured programmatically with [`GanderDefaultType::set_default`].
//!
//! Each option is resolved in the following order, the first value found wins:
//!  1. the command line
//!  2. the environment (`--host` and `--token` only)
//!  3. a [`GanderDefault`] set programmatically
//!  4. the built-in default

use gumdrop::Options;
use serde::Serialize;
use simplelog::*;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::action::ActionWeights;
use crate::client::DEFAULT_TIMEOUT;
use crate::logger::GanderLogFormat;
use crate::payload::DEFAULT_USERS_PATH;
use crate::ramp::{RampPlan, RampPolicy};
use crate::util;
use crate::{GanderAttack, GanderError};

/// Environment variable holding the base URL of the target.
pub const HOST_ENV: &str = "USER_BASE_URL";
/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "USER_API_TOKEN";

/// Default number of users seeded into the read pool.
pub const DEFAULT_READ_POOL: usize = 150;
/// Default number of users seeded into the write pool.
pub const DEFAULT_WRITE_POOL: usize = 50;
/// Default pause between iterations, in milliseconds.
pub const DEFAULT_PACING: usize = 300;
/// Default maximum 95th percentile response time, in milliseconds.
pub const DEFAULT_P95_THRESHOLD: usize = 1_000;

/// Runtime options available when launching a Gander load test.
///
/// Custom defaults can be programmatically set for most of these options using
/// [`GanderDefaultType::set_default`].
///
/// Gander leverages [`gumdrop`](https://docs.rs/gumdrop/) to derive help from the
/// below structure, displayed by passing a `-h` flag.
#[derive(Options, Debug, Clone, Default, Serialize)]
#[options(
    help = r#"Gander generates ramping CRUD load against a user-management API,
classifying every response and summarizing the results.

The following runtime options are available when launching a Gander load test:"#
)]
pub struct GanderConfiguration {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V", help = "Prints version information\n")]
    pub version: bool,

    /// Defines host to load test (ie http://10.21.32.33)
    #[options(short = "H")]
    pub host: String,
    /// Sets the bearer token sent with each request
    #[options(short = "k", meta = "TOKEN")]
    #[serde(skip)]
    pub token: String,
    /// Sets the path of the user API (default: /api/users)
    #[options(no_short, meta = "PATH")]
    pub users_path: String,
    /// Sets ramp stages (ie "10,10s;30,10s;0,5s")
    #[options(short = "r", meta = "\"USERS,TIME;...\"")]
    pub ramp: Option<RampPlan>,
    /// Moves between stage targets (step, linear)
    #[options(no_short, meta = "POLICY")]
    pub ramp_policy: Option<RampPolicy>,
    /// Sets action weights (default: 0.8,0.1,0.05,0.05)
    #[options(short = "w", meta = "\"R,U,C,D\"")]
    pub weights: Option<ActionWeights>,
    /// Sets how many users to seed for reads (default: 150)
    #[options(no_short, meta = "COUNT")]
    pub read_pool: Option<usize>,
    /// Sets how many users to seed for writes (default: 50)
    #[options(no_short, meta = "COUNT")]
    pub write_pool: Option<usize>,
    /// Sets pause between iterations in ms (default: 300)
    #[options(short = "p", meta = "MS")]
    pub pacing: Option<usize>,
    /// Stops after this many iterations in total
    #[options(short = "i", meta = "COUNT")]
    pub iterations: Option<usize>,
    /// Runs create, update, delete in order each iteration
    #[options(no_short)]
    pub chained: bool,
    /// Sends updates without the bearer token
    #[options(no_short)]
    pub update_without_auth: bool,
    /// Aborts if a required pool is empty after setup
    #[options(no_short)]
    pub strict_pools: bool,
    /// Deletes seeded users after the load test
    #[options(no_short)]
    pub teardown: bool,
    /// Seeds each user's random number generator
    #[options(no_short, meta = "VALUE")]
    pub seed: Option<u64>,
    /// Sets per-request timeout, in seconds (default: 60)
    #[options(no_short, meta = "VALUE")]
    pub timeout: Option<String>,
    /// Doesn't set the gzip Accept-Encoding header
    #[options(no_short, help = "Doesn't set the gzip Accept-Encoding header\n\nMetrics:")]
    pub no_gzip: bool,

    /// Fails when p95 response time reaches this, in ms (default: 1000, 0 disables)
    #[options(no_short, meta = "MS")]
    pub p95_threshold: Option<usize>,
    /// Doesn't display metrics at end of load test
    #[options(no_short)]
    pub no_print_metrics: bool,
    /// Creates an html-formatted report
    #[options(no_short, meta = "NAME")]
    pub report_file: String,
    /// Writes a json summary of the metrics
    #[options(no_short, meta = "NAME")]
    pub summary_file: String,
    /// Sets request log file name
    #[options(short = "R", meta = "NAME")]
    pub request_log: String,
    /// Sets request log format (csv, json, raw)
    #[options(no_short, meta = "FORMAT", help = "Sets request log format (csv, json, raw)\n\nLogging:")]
    pub request_format: Option<GanderLogFormat>,

    /// Enables Gander log file and sets name
    #[options(short = "G", meta = "NAME")]
    pub log_file: String,
    /// Increases Gander log level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases Gander verbosity (-q, -qq, etc)
    #[options(count, short = "q")]
    pub quiet: u8,
    /// Increases Gander verbosity (-v, -vv, etc)
    #[options(count, short = "v")]
    pub verbose: u8,
}

/// Optional default values for Gander run-time options.
#[derive(Clone, Debug, Default)]
pub(crate) struct GanderDefaults {
    pub host: Option<String>,
    pub token: Option<String>,
    pub users_path: Option<String>,
    pub ramp: Option<RampPlan>,
    pub ramp_policy: Option<RampPolicy>,
    pub weights: Option<ActionWeights>,
    pub read_pool: Option<usize>,
    pub write_pool: Option<usize>,
    pub pacing: Option<usize>,
    pub iterations: Option<usize>,
    pub chained: Option<bool>,
    pub update_without_auth: Option<bool>,
    pub strict_pools: Option<bool>,
    pub teardown: Option<bool>,
    pub seed: Option<u64>,
    pub timeout: Option<String>,
    pub no_gzip: Option<bool>,
    pub p95_threshold: Option<usize>,
    pub no_print_metrics: Option<bool>,
    pub report_file: Option<String>,
    pub summary_file: Option<String>,
    pub request_log: Option<String>,
    pub request_format: Option<GanderLogFormat>,
    pub log_file: Option<String>,
    pub log_level: Option<u8>,
    pub quiet: Option<u8>,
    pub verbose: Option<u8>,
}

/// Allows the optional configuration of Gander's defaults.
#[derive(Debug)]
pub enum GanderDefault {
    /// An optional default host to run this load test against.
    Host,
    /// An optional default bearer token.
    Token,
    /// An optional default path of the user API.
    UsersPath,
    /// An optional default ramp plan.
    Ramp,
    /// An optional default ramp policy.
    RampPolicy,
    /// An optional default set of action weights.
    Weights,
    /// An optional default read pool size.
    ReadPool,
    /// An optional default write pool size.
    WritePool,
    /// An optional default pause between iterations, in milliseconds.
    Pacing,
    /// An optional default iteration budget.
    Iterations,
    /// An optional default for running create, update and delete as a chain.
    Chained,
    /// An optional default for sending updates without the bearer token.
    UpdateWithoutAuth,
    /// An optional default for aborting when a required pool is empty.
    StrictPools,
    /// An optional default for deleting seeded users after the load test.
    Teardown,
    /// An optional default random seed.
    Seed,
    /// An optional default per-request timeout, in seconds.
    Timeout,
    /// An optional default for not setting the gzip Accept-Encoding header.
    NoGzip,
    /// An optional default 95th percentile threshold, in milliseconds.
    P95Threshold,
    /// An optional default for not displaying metrics at the end of the load test.
    NoPrintMetrics,
    /// An optional default html report file name.
    ReportFile,
    /// An optional default json summary file name.
    SummaryFile,
    /// An optional default request log file name.
    RequestLog,
    /// An optional default request log format.
    RequestFormat,
    /// An optional default Gander log file name.
    LogFile,
    /// An optional default log level.
    LogLevel,
    /// An optional default value for quiet level.
    Quiet,
    /// An optional default value for verbosity level.
    Verbose,
}

/// Most run-time options can be programmatically configured with custom defaults.
///
/// The following run-time options can be configured with a custom default using a
/// borrowed string slice ([`&str`]):
///  - [`GanderDefault::Host`]
///  - [`GanderDefault::Token`]
///  - [`GanderDefault::UsersPath`]
///  - [`GanderDefault::Ramp`]
///  - [`GanderDefault::Weights`]
///  - [`GanderDefault::Timeout`]
///  - [`GanderDefault::ReportFile`]
///  - [`GanderDefault::SummaryFile`]
///  - [`GanderDefault::RequestLog`]
///  - [`GanderDefault::LogFile`]
///
/// The following run-time options can be configured with a custom default using a
/// [`usize`] integer:
///  - [`GanderDefault::ReadPool`]
///  - [`GanderDefault::WritePool`]
///  - [`GanderDefault::Pacing`]
///  - [`GanderDefault::Iterations`]
///  - [`GanderDefault::Seed`]
///  - [`GanderDefault::P95Threshold`]
///  - [`GanderDefault::LogLevel`]
///  - [`GanderDefault::Quiet`]
///  - [`GanderDefault::Verbose`]
///
/// The following run-time flags can be configured with a custom default using a
/// [`bool`]:
///  - [`GanderDefault::Chained`]
///  - [`GanderDefault::UpdateWithoutAuth`]
///  - [`GanderDefault::StrictPools`]
///  - [`GanderDefault::Teardown`]
///  - [`GanderDefault::NoGzip`]
///  - [`GanderDefault::NoPrintMetrics`]
///
/// [`GanderDefault::RampPolicy`] takes a [`RampPolicy`] and
/// [`GanderDefault::RequestFormat`] takes a [`GanderLogFormat`].
pub trait GanderDefaultType<T> {
    /// Sets a [`GanderDefault`] to the provided value.
    ///
    /// # Example
    /// ```rust
    /// use gander::prelude::*;
    ///
    /// fn main() -> Result<(), GanderError> {
    ///     GanderAttack::initialize()?
    ///         .set_default(GanderDefault::Host, "http://localhost:8080")?
    ///         .set_default(GanderDefault::Ramp, "5,10s;10,20s")?
    ///         .set_default(GanderDefault::Pacing, 100)?
    ///         .set_default(GanderDefault::Teardown, true)?;
    ///
    ///     Ok(())
    /// }
    /// ```
    fn set_default(self, key: GanderDefault, value: T) -> Result<Box<Self>, GanderError>;
}
impl GanderDefaultType<&str> for GanderAttack {
    /// Sets [`GanderDefault`] to a [`&str`] value.
    fn set_default(mut self, key: GanderDefault, value: &str) -> Result<Box<Self>, GanderError> {
        match key {
            GanderDefault::Host => {
                self.defaults.host = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            GanderDefault::Token => self.defaults.token = Some(value.to_string()),
            GanderDefault::UsersPath => self.defaults.users_path = Some(value.to_string()),
            GanderDefault::Ramp => self.defaults.ramp = Some(value.parse::<RampPlan>()?),
            GanderDefault::Weights => {
                self.defaults.weights = Some(value.parse::<ActionWeights>()?)
            }
            GanderDefault::Timeout => self.defaults.timeout = Some(value.to_string()),
            GanderDefault::ReportFile => self.defaults.report_file = Some(value.to_string()),
            GanderDefault::SummaryFile => self.defaults.summary_file = Some(value.to_string()),
            GanderDefault::RequestLog => self.defaults.request_log = Some(value.to_string()),
            GanderDefault::LogFile => self.defaults.log_file = Some(value.to_string()),
            // Otherwise display a helpful and explicit error.
            GanderDefault::ReadPool
            | GanderDefault::WritePool
            | GanderDefault::Pacing
            | GanderDefault::Iterations
            | GanderDefault::Seed
            | GanderDefault::P95Threshold
            | GanderDefault::LogLevel
            | GanderDefault::Quiet
            | GanderDefault::Verbose => {
                return Err(wrong_type(&key, value, "usize", "&str"));
            }
            GanderDefault::Chained
            | GanderDefault::UpdateWithoutAuth
            | GanderDefault::StrictPools
            | GanderDefault::Teardown
            | GanderDefault::NoGzip
            | GanderDefault::NoPrintMetrics => {
                return Err(wrong_type(&key, value, "bool", "&str"));
            }
            GanderDefault::RampPolicy => {
                return Err(wrong_type(&key, value, "RampPolicy", "&str"));
            }
            GanderDefault::RequestFormat => {
                return Err(wrong_type(&key, value, "GanderLogFormat", "&str"));
            }
        }
        Ok(Box::new(self))
    }
}
impl GanderDefaultType<usize> for GanderAttack {
    /// Sets [`GanderDefault`] to a [`usize`] value.
    fn set_default(mut self, key: GanderDefault, value: usize) -> Result<Box<Self>, GanderError> {
        match key {
            GanderDefault::ReadPool => self.defaults.read_pool = Some(value),
            GanderDefault::WritePool => self.defaults.write_pool = Some(value),
            GanderDefault::Pacing => self.defaults.pacing = Some(value),
            GanderDefault::Iterations => self.defaults.iterations = Some(value),
            GanderDefault::Seed => self.defaults.seed = Some(value as u64),
            GanderDefault::P95Threshold => self.defaults.p95_threshold = Some(value),
            GanderDefault::LogLevel => self.defaults.log_level = Some(value as u8),
            GanderDefault::Quiet => self.defaults.quiet = Some(value as u8),
            GanderDefault::Verbose => self.defaults.verbose = Some(value as u8),
            GanderDefault::Host
            | GanderDefault::Token
            | GanderDefault::UsersPath
            | GanderDefault::Ramp
            | GanderDefault::Weights
            | GanderDefault::Timeout
            | GanderDefault::ReportFile
            | GanderDefault::SummaryFile
            | GanderDefault::RequestLog
            | GanderDefault::LogFile => {
                return Err(wrong_type(&key, value, "&str", "usize"));
            }
            GanderDefault::Chained
            | GanderDefault::UpdateWithoutAuth
            | GanderDefault::StrictPools
            | GanderDefault::Teardown
            | GanderDefault::NoGzip
            | GanderDefault::NoPrintMetrics => {
                return Err(wrong_type(&key, value, "bool", "usize"));
            }
            GanderDefault::RampPolicy => {
                return Err(wrong_type(&key, value, "RampPolicy", "usize"));
            }
            GanderDefault::RequestFormat => {
                return Err(wrong_type(&key, value, "GanderLogFormat", "usize"));
            }
        }
        Ok(Box::new(self))
    }
}
impl GanderDefaultType<bool> for GanderAttack {
    /// Sets [`GanderDefault`] to a [`bool`] value.
    fn set_default(mut self, key: GanderDefault, value: bool) -> Result<Box<Self>, GanderError> {
        match key {
            GanderDefault::Chained => self.defaults.chained = Some(value),
            GanderDefault::UpdateWithoutAuth => self.defaults.update_without_auth = Some(value),
            GanderDefault::StrictPools => self.defaults.strict_pools = Some(value),
            GanderDefault::Teardown => self.defaults.teardown = Some(value),
            GanderDefault::NoGzip => self.defaults.no_gzip = Some(value),
            GanderDefault::NoPrintMetrics => self.defaults.no_print_metrics = Some(value),
            GanderDefault::Host
            | GanderDefault::Token
            | GanderDefault::UsersPath
            | GanderDefault::Ramp
            | GanderDefault::Weights
            | GanderDefault::Timeout
            | GanderDefault::ReportFile
            | GanderDefault::SummaryFile
            | GanderDefault::RequestLog
            | GanderDefault::LogFile => {
                return Err(wrong_type(&key, value, "&str", "bool"));
            }
            GanderDefault::ReadPool
            | GanderDefault::WritePool
            | GanderDefault::Pacing
            | GanderDefault::Iterations
            | GanderDefault::Seed
            | GanderDefault::P95Threshold
            | GanderDefault::LogLevel
            | GanderDefault::Quiet
            | GanderDefault::Verbose => {
                return Err(wrong_type(&key, value, "usize", "bool"));
            }
            GanderDefault::RampPolicy => {
                return Err(wrong_type(&key, value, "RampPolicy", "bool"));
            }
            GanderDefault::RequestFormat => {
                return Err(wrong_type(&key, value, "GanderLogFormat", "bool"));
            }
        }
        Ok(Box::new(self))
    }
}
impl GanderDefaultType<RampPolicy> for GanderAttack {
    /// Sets [`GanderDefault`] to a [`RampPolicy`] value.
    fn set_default(
        mut self,
        key: GanderDefault,
        value: RampPolicy,
    ) -> Result<Box<Self>, GanderError> {
        match key {
            GanderDefault::RampPolicy => self.defaults.ramp_policy = Some(value),
            _ => return Err(wrong_type(&key, value, "another type", "RampPolicy")),
        }
        Ok(Box::new(self))
    }
}
impl GanderDefaultType<GanderLogFormat> for GanderAttack {
    /// Sets [`GanderDefault`] to a [`GanderLogFormat`] value.
    fn set_default(
        mut self,
        key: GanderDefault,
        value: GanderLogFormat,
    ) -> Result<Box<Self>, GanderError> {
        match key {
            GanderDefault::RequestFormat => self.defaults.request_format = Some(value),
            _ => return Err(wrong_type(&key, value, "another type", "GanderLogFormat")),
        }
        Ok(Box::new(self))
    }
}

// Explain which type a GanderDefault expected.
fn wrong_type<T: fmt::Display>(
    key: &GanderDefault,
    value: T,
    expected: &str,
    received: &str,
) -> GanderError {
    GanderError::InvalidOption {
        option: format!("GanderDefault::{:?}", key),
        value: value.to_string(),
        detail: format!(
            "set_default(GanderDefault::{:?}, {}) expected {} value, received {}",
            key, value, expected, received
        ),
    }
}

/// Used internally to configure [`GanderConfiguration`] values based on precedence rules.
#[derive(Debug, Clone)]
pub(crate) struct GanderValue<'a, T> {
    /// The optional value to set.
    pub(crate) value: Option<T>,
    /// Filter using this value if true.
    pub(crate) filter: bool,
    /// An optional INFO level log message.
    pub(crate) message: &'a str,
}

pub(crate) trait GanderConfigure<T> {
    /// Return the first unfiltered value.
    fn get_value(&self, values: Vec<GanderValue<T>>) -> Option<T>;
}
impl<T: fmt::Display> GanderConfigure<T> for GanderConfiguration {
    fn get_value(&self, values: Vec<GanderValue<T>>) -> Option<T> {
        for value in values {
            if value.filter {
                continue;
            }
            if let Some(v) = value.value {
                if !value.message.is_empty() {
                    info!("{} = {}", value.message, v)
                }
                return Some(v);
            }
        }
        None
    }
}

// Read an environment variable, ignoring it when empty.
fn from_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl GanderConfiguration {
    /// Implement precedence rules for all [`GanderConfiguration`] values.
    pub(crate) fn configure(&mut self, defaults: &GanderDefaults) {
        // Configure logging first, so everything else can be logged.
        self.quiet = self
            .get_value(vec![
                GanderValue {
                    value: Some(self.quiet),
                    filter: self.quiet == 0,
                    message: "",
                },
                GanderValue {
                    value: defaults.quiet,
                    filter: defaults.quiet.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);
        self.verbose = self
            .get_value(vec![
                GanderValue {
                    value: Some(self.verbose),
                    filter: self.verbose == 0,
                    message: "",
                },
                GanderValue {
                    value: defaults.verbose,
                    filter: defaults.verbose.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);
        self.log_level = self
            .get_value(vec![
                GanderValue {
                    value: Some(self.log_level),
                    filter: self.log_level == 0,
                    message: "",
                },
                GanderValue {
                    value: defaults.log_level,
                    filter: defaults.log_level.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);
        self.log_file = self.configure_string(&self.log_file, None, &defaults.log_file, "");

        self.initialize_logger();

        // Configure `host`, which can also be set with USER_BASE_URL.
        self.host = self.configure_string(&self.host, Some(HOST_ENV), &defaults.host, "host");
        // Configure `token`, which can also be set with USER_API_TOKEN. Never logged.
        self.token = self.configure_string(&self.token, Some(TOKEN_ENV), &defaults.token, "");
        if self.token.is_empty() {
            info!("no bearer token configured");
        }
        self.users_path = self.configure_string(
            &self.users_path,
            None,
            &defaults.users_path,
            "users_path",
        );
        if self.users_path.is_empty() {
            self.users_path = DEFAULT_USERS_PATH.to_string();
        }

        self.ramp = self
            .get_value(vec![
                GanderValue {
                    value: self.ramp.clone(),
                    filter: self.ramp.is_none(),
                    message: "ramp",
                },
                GanderValue {
                    value: defaults.ramp.clone(),
                    filter: defaults.ramp.is_none(),
                    message: "ramp",
                },
            ])
            .or_else(|| Some(RampPlan::default()));
        self.ramp_policy = self
            .get_value(vec![
                GanderValue {
                    value: self.ramp_policy,
                    filter: self.ramp_policy.is_none(),
                    message: "ramp_policy",
                },
                GanderValue {
                    value: defaults.ramp_policy,
                    filter: defaults.ramp_policy.is_none(),
                    message: "ramp_policy",
                },
            ])
            .or(Some(RampPolicy::Step));
        // The ramp carries its policy.
        if let Some(policy) = self.ramp_policy {
            self.ramp = self.ramp.take().map(|ramp| ramp.with_policy(policy));
        }

        self.weights = self
            .get_value(vec![
                GanderValue {
                    value: self.weights.clone(),
                    filter: self.weights.is_none(),
                    message: "weights",
                },
                GanderValue {
                    value: defaults.weights.clone(),
                    filter: defaults.weights.is_none(),
                    message: "weights",
                },
            ])
            .or_else(|| Some(ActionWeights::default()));

        self.read_pool = Some(self.configure_usize(
            self.read_pool,
            defaults.read_pool,
            DEFAULT_READ_POOL,
            "read_pool",
        ));
        self.write_pool = Some(self.configure_usize(
            self.write_pool,
            defaults.write_pool,
            DEFAULT_WRITE_POOL,
            "write_pool",
        ));
        self.pacing = Some(self.configure_usize(
            self.pacing,
            defaults.pacing,
            DEFAULT_PACING,
            "pacing",
        ));
        self.p95_threshold = Some(self.configure_usize(
            self.p95_threshold,
            defaults.p95_threshold,
            DEFAULT_P95_THRESHOLD,
            "p95_threshold",
        ));
        self.iterations = self.get_value(vec![
            GanderValue {
                value: self.iterations,
                filter: self.iterations.is_none(),
                message: "iterations",
            },
            GanderValue {
                value: defaults.iterations,
                filter: defaults.iterations.is_none(),
                message: "iterations",
            },
        ]);
        self.seed = self.get_value(vec![
            GanderValue {
                value: self.seed,
                filter: self.seed.is_none(),
                message: "seed",
            },
            GanderValue {
                value: defaults.seed,
                filter: defaults.seed.is_none(),
                message: "seed",
            },
        ]);
        self.timeout = self
            .get_value(vec![
                GanderValue {
                    value: self.timeout.clone(),
                    filter: self.timeout.is_none(),
                    message: "timeout",
                },
                GanderValue {
                    value: defaults.timeout.clone(),
                    filter: defaults.timeout.is_none(),
                    message: "timeout",
                },
            ])
            .or_else(|| Some(DEFAULT_TIMEOUT.to_string()));

        self.chained = self.configure_bool(self.chained, defaults.chained, "chained");
        self.update_without_auth = self.configure_bool(
            self.update_without_auth,
            defaults.update_without_auth,
            "update_without_auth",
        );
        self.strict_pools =
            self.configure_bool(self.strict_pools, defaults.strict_pools, "strict_pools");
        self.teardown = self.configure_bool(self.teardown, defaults.teardown, "teardown");
        self.no_gzip = self.configure_bool(self.no_gzip, defaults.no_gzip, "no_gzip");
        self.no_print_metrics = self.configure_bool(
            self.no_print_metrics,
            defaults.no_print_metrics,
            "no_print_metrics",
        );

        self.report_file =
            self.configure_string(&self.report_file, None, &defaults.report_file, "report_file");
        self.summary_file = self.configure_string(
            &self.summary_file,
            None,
            &defaults.summary_file,
            "summary_file",
        );
        self.request_log =
            self.configure_string(&self.request_log, None, &defaults.request_log, "request_log");
        self.request_format = self.get_value(vec![
            GanderValue {
                value: self.request_format,
                filter: self.request_format.is_none(),
                message: "request_format",
            },
            GanderValue {
                value: defaults.request_format,
                filter: defaults.request_format.is_none(),
                message: "request_format",
            },
        ]);
    }

    // Resolve a string option: command line, then environment, then default.
    fn configure_string(
        &self,
        current: &str,
        env: Option<&str>,
        default: &Option<String>,
        message: &str,
    ) -> String {
        let env_value = env.and_then(from_env);
        self.get_value(vec![
            GanderValue {
                value: Some(current.to_string()),
                filter: current.is_empty(),
                message,
            },
            GanderValue {
                filter: env_value.is_none(),
                value: env_value,
                message,
            },
            GanderValue {
                value: default.clone(),
                filter: default.is_none(),
                message,
            },
        ])
        .unwrap_or_default()
    }

    fn configure_usize(
        &self,
        current: Option<usize>,
        default: Option<usize>,
        built_in: usize,
        message: &str,
    ) -> usize {
        self.get_value(vec![
            GanderValue {
                value: current,
                filter: current.is_none(),
                message,
            },
            GanderValue {
                value: default,
                filter: default.is_none(),
                message,
            },
        ])
        .unwrap_or(built_in)
    }

    fn configure_bool(&self, current: bool, default: Option<bool>, message: &str) -> bool {
        self.get_value(vec![
            GanderValue {
                value: Some(current),
                filter: !current,
                message,
            },
            GanderValue {
                value: default,
                filter: default.is_none(),
                message,
            },
        ])
        .unwrap_or(false)
    }

    /// The configured ramp plan.
    pub fn ramp_plan(&self) -> RampPlan {
        self.ramp.clone().unwrap_or_default()
    }

    /// The configured action weights.
    pub fn action_weights(&self) -> ActionWeights {
        self.weights.clone().unwrap_or_default()
    }

    /// Validate configured [`GanderConfiguration`] values.
    pub(crate) fn validate(&self) -> Result<(), GanderError> {
        // Can't set both --verbose and --quiet.
        if self.verbose > 0 && self.quiet > 0 {
            return Err(GanderError::InvalidOption {
                option: "`configuration.verbose`".to_string(),
                value: self.verbose.to_string(),
                detail: "`configuration.verbose` can not be set with `configuration.quiet`."
                    .to_string(),
            });
        }

        // A host is required.
        if self.host.is_empty() {
            return Err(GanderError::InvalidOption {
                option: "`configuration.host`".to_string(),
                value: "".to_string(),
                detail: format!(
                    "A host must be defined via the --host option, the {} environment variable, or GanderDefault::Host.",
                    HOST_ENV
                ),
            });
        }
        util::is_valid_host(&self.host)?;

        // The users path is joined to the host.
        if !self.users_path.starts_with('/') {
            return Err(GanderError::InvalidOption {
                option: "`configuration.users_path`".to_string(),
                value: self.users_path.clone(),
                detail: "`configuration.users_path` must start with a /.".to_string(),
            });
        }

        // If set, timeout must be greater than zero and fit in a Duration.
        if let Some(timeout) = self.timeout.as_ref() {
            match f32::from_str(timeout) {
                Ok(t) if t > 0.0 && Duration::try_from_secs_f32(t).is_ok() => (),
                _ => {
                    return Err(GanderError::InvalidOption {
                        option: "`configuration.timeout`".to_string(),
                        value: timeout.to_string(),
                        detail: "`configuration.timeout` must be a number greater than 0."
                            .to_string(),
                    });
                }
            }
        }

        // The ramp must run for some time.
        if let Some(ramp) = self.ramp.as_ref() {
            if ramp.total_duration().is_zero() {
                return Err(GanderError::InvalidOption {
                    option: "`configuration.ramp`".to_string(),
                    value: ramp.to_string(),
                    detail: "`configuration.ramp` must include a stage longer than 0 seconds."
                        .to_string(),
                });
            }
        }

        if let Some(iterations) = self.iterations {
            if iterations == 0 {
                return Err(GanderError::InvalidOption {
                    option: "`configuration.iterations`".to_string(),
                    value: iterations.to_string(),
                    detail: "`configuration.iterations` must be set to at least 1.".to_string(),
                });
            }
        }

        // A format without a log is a mistake.
        if self.request_format.is_some() && self.request_log.is_empty() {
            return Err(GanderError::InvalidOption {
                option: "`configuration.request_format`".to_string(),
                value: format!("{:?}", self.request_format),
                detail: "`configuration.request_format` can not be set without setting `configuration.request_log`.".to_string(),
            });
        }

        if self.chained && self.weights.is_some() && self.weights != Some(ActionWeights::default())
        {
            warn!("`configuration.weights` are ignored in chained mode");
        }

        Ok(())
    }

    /// Optionally initialize the logger which writes to standard out and/or to
    /// a configurable log file.
    pub(crate) fn initialize_logger(&self) {
        // Configure debug output level.
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                _ => LevelFilter::Warn,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Configure log file level.
        let log_level = match self.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let mut loggers: Vec<Box<dyn SharedLogger>> =
            vec![SimpleLogger::new(debug_level, Config::default())];

        // Open the log file if configured.
        let log_file: Option<PathBuf> = if !self.log_file.is_empty() {
            Some(PathBuf::from(&self.log_file))
        } else {
            None
        };
        if let Some(log_to_file) = log_file.as_ref() {
            match std::fs::File::create(log_to_file) {
                Ok(file) => loggers.push(WriteLogger::new(log_level, Config::default(), file)),
                Err(e) => eprintln!(
                    "failed to create log file {}: {}",
                    log_to_file.display(),
                    e
                ),
            }
        }

        match CombinedLogger::init(loggers) {
            Ok(_) => (),
            Err(e) => {
                info!("failed to initialize CombinedLogger: {}", e);
            }
        }
        if let Some(log_to_file) = log_file {
            info!("Writing to log file: {}", log_to_file.display());
        }

        info!("Output verbosity level: {}", debug_level);
        info!("Logfile verbosity level: {}", log_level);
    }
}
