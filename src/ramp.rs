//! Ramp plan structures and functions.
//!
//! A load test is a series of stages, each holding a number of virtual users for a
//! period of time. The engine polls [`RampPlan::current_target`] and spawns or retires
//! users to match it.

use chrono::prelude::*;
use lazy_static::lazy_static;
use regex::{Regex, RegexSet};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::util;
use crate::GanderError;

/// The ramp used when none is configured.
pub const DEFAULT_RAMP: &str = "10,10s;30,10s;50,10s;100,10s;200,10s";

lazy_static! {
    // Each stage of a ramp plan must be in the format "{users},{timespan}", white space is ignored.
    static ref STAGE: Regex =
        Regex::new(r"^\s*(\d+)\s*,\s*(\d+|((\d+?)h)?((\d+?)m)?((\d+?)s)?)\s*$")
            .expect("failed to compile ramp stage regex");
    static ref POLICY: RegexSet = RegexSet::new([
        r"(?i)^(step|steps|stepped|hold)$",
        r"(?i)^(linear|lin|interpolate|smooth)$",
    ])
    .expect("failed to compile ramp policy RegexSet");
}

/// How the user target moves within a stage.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum RampPolicy {
    /// Jump straight to the stage target when the stage starts (default).
    #[default]
    Step,
    /// Interpolate from the previous stage target to this one over the stage.
    Linear,
}
/// Allow `--ramp-policy` from the command line using text variations on supported
/// `RampPolicy`s.
impl FromStr for RampPolicy {
    type Err = GanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let matches = POLICY.matches(s.trim());
        if matches.matched(0) {
            Ok(RampPolicy::Step)
        } else if matches.matched(1) {
            Ok(RampPolicy::Linear)
        } else {
            Err(GanderError::InvalidOption {
                option: "`configuration.ramp_policy`".to_string(),
                value: s.to_string(),
                detail: "Invalid ramp_policy, expected: step or linear".to_string(),
            })
        }
    }
}
impl fmt::Display for RampPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RampPolicy::Step => write!(f, "step"),
            RampPolicy::Linear => write!(f, "linear"),
        }
    }
}

/// A number of users held for a period of time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RampStage {
    pub target: usize,
    pub duration: Duration,
}
impl RampStage {
    pub fn new(target: usize, duration: Duration) -> Self {
        RampStage { target, duration }
    }
}
impl Serialize for RampStage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("RampStage", 2)?;
        s.serialize_field("target", &self.target)?;
        s.serialize_field("duration_ms", &(self.duration.as_millis() as u64))?;
        s.end()
    }
}

/// Where the scheduler is for a given elapsed time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RampState {
    /// The stage with this index is active.
    Ramping(usize),
    /// Every stage has elapsed, users should finish and exit.
    Draining,
}

/// An ordered sequence of [`RampStage`]s.
///
/// # Example
/// ```rust
/// use gander::ramp::{RampPlan, RampState};
/// use std::str::FromStr;
/// use std::time::Duration;
///
/// let plan = RampPlan::from_str("10,10s;30,10s").unwrap();
/// assert_eq!(plan.current_target(Duration::from_secs(5)), 10);
/// assert_eq!(plan.current_target(Duration::from_secs(15)), 30);
/// assert_eq!(plan.state(Duration::from_secs(20)), RampState::Draining);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RampPlan {
    stages: Vec<RampStage>,
    policy: RampPolicy,
}
impl RampPlan {
    pub fn new(stages: Vec<RampStage>, policy: RampPolicy) -> Self {
        RampPlan { stages, policy }
    }

    /// Return the same stages interpreted with another policy.
    pub fn with_policy(mut self, policy: RampPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn stages(&self) -> &[RampStage] {
        &self.stages
    }

    pub fn policy(&self) -> RampPolicy {
        self.policy
    }

    /// How long it takes for every stage to elapse.
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|stage| stage.duration).sum()
    }

    /// The most users any stage asks for.
    pub fn max_target(&self) -> usize {
        self.stages
            .iter()
            .map(|stage| stage.target)
            .max()
            .unwrap_or(0)
    }

    // Find the stage active at `elapsed`, along with the time it started.
    fn active_stage(&self, elapsed: Duration) -> Option<(usize, Duration)> {
        let mut start = Duration::ZERO;
        for (index, stage) in self.stages.iter().enumerate() {
            let end = start + stage.duration;
            // Zero length stages are never active.
            if elapsed >= start && elapsed < end {
                return Some((index, start));
            }
            start = end;
        }
        None
    }

    /// How many users should be running `elapsed` into the load test.
    ///
    /// Returns 0 once every stage has elapsed.
    pub fn current_target(&self, elapsed: Duration) -> usize {
        let (index, start) = match self.active_stage(elapsed) {
            Some(active) => active,
            None => return 0,
        };
        let stage = &self.stages[index];
        match self.policy {
            RampPolicy::Step => stage.target,
            RampPolicy::Linear => {
                let previous = if index == 0 {
                    0
                } else {
                    self.stages[index - 1].target
                };
                let progress =
                    (elapsed - start).as_secs_f64() / stage.duration.as_secs_f64();
                let delta = stage.target as f64 - previous as f64;
                (previous as f64 + delta * progress).round() as usize
            }
        }
    }

    /// Which stage is active `elapsed` into the load test.
    pub fn state(&self, elapsed: Duration) -> RampState {
        match self.active_stage(elapsed) {
            Some((index, _)) => RampState::Ramping(index),
            None => RampState::Draining,
        }
    }

    /// Whether stage `index` adds, holds or removes users compared to the stage before it.
    pub fn stage_action(&self, index: usize) -> RampAction {
        match self.stages.get(index) {
            Some(stage) => {
                let previous = index
                    .checked_sub(1)
                    .and_then(|previous| self.stages.get(previous))
                    .map_or(0, |previous| previous.target);
                match stage.target.cmp(&previous) {
                    Ordering::Greater => RampAction::Increasing,
                    Ordering::Less => RampAction::Decreasing,
                    Ordering::Equal => RampAction::Maintaining,
                }
            }
            None => RampAction::Draining,
        }
    }
}
impl Default for RampPlan {
    fn default() -> Self {
        RampPlan::new(
            [10, 30, 50, 100, 200]
                .iter()
                .map(|target| RampStage::new(*target, Duration::from_secs(10)))
                .collect(),
            RampPolicy::Step,
        )
    }
}

/// Convert `"users,timespan"` formatted ramps to a [`RampPlan`].
///
/// Users are represented simply as an integer.
///
/// Time span can be specified as an integer, indicating seconds. Or can use integers together
/// with one or more of "h", "m", and "s", in that order, indicating "hours", "minutes", and
/// "seconds". Valid formats include: 20, 20s, 3m, 2h, 1h20m, 3h30m10s, etc.
impl FromStr for RampPlan {
    type Err = GanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut stages = Vec::new();
        // A ramp plan can have multiple stages split by the semicolon ";".
        for line in s.split(';') {
            let captures = STAGE.captures(line);
            let target = captures
                .as_ref()
                .and_then(|cap| cap[1].parse::<usize>().ok());
            match (captures.as_ref(), target) {
                (Some(cap), Some(target)) => {
                    let seconds = util::parse_timespan(&cap[2]);
                    stages.push(RampStage::new(target, Duration::from_secs(seconds as u64)));
                }
                _ => {
                    // Logger isn't initialized yet, provide helpful debug output.
                    eprintln!("ERROR: invalid `configuration.ramp` value: '{}'", line);
                    eprintln!("  Expected format: --ramp \"{{users}},{{timespan}};{{users}},{{timespan}}\"");
                    eprintln!("    {{users}} must be an integer, ie \"100\"");
                    eprintln!("    {{timespan}} can be integer seconds or \"30s\", \"20m\", \"3h\", \"1h30m\", etc");
                    return Err(GanderError::InvalidOption {
                        option: "`configuration.ramp`".to_string(),
                        value: line.to_string(),
                        detail: "invalid `configuration.ramp` value.".to_string(),
                    });
                }
            }
        }
        Ok(RampPlan::new(stages, RampPolicy::Step))
    }
}
impl fmt::Display for RampPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<String> = self
            .stages
            .iter()
            .map(|stage| format!("{},{}s", stage.target, stage.duration.as_secs()))
            .collect();
        write!(f, "{}", stages.join(";"))
    }
}

/// What happened at a point in the ramp.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum RampAction {
    /// A stage that increases the number of users.
    Increasing,
    /// A stage that holds the number of users.
    Maintaining,
    /// A stage that decreases the number of users.
    Decreasing,
    /// Every stage has elapsed or the load test was canceled, users are exiting.
    Draining,
    /// The final entry indicating that the load test is finished.
    Finished,
}

/// A historical record of a single ramp transition, used to generate reports.
#[derive(Clone, Debug)]
pub struct RampHistory {
    /// What happened at this point.
    pub action: RampAction,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// The number of running users when it happened.
    pub users: usize,
}
impl RampHistory {
    /// A helper to record a new ramp transition in the historical record.
    pub(crate) fn step(action: RampAction, users: usize) -> RampHistory {
        RampHistory {
            action,
            timestamp: Utc::now(),
            users,
        }
    }
}
impl Serialize for RampHistory {
    // DateTime is serialized as a unix timestamp.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("RampHistory", 3)?;
        s.serialize_field("action", &self.action)?;
        s.serialize_field("timestamp", &self.timestamp.timestamp())?;
        s.serialize_field("users", &self.users)?;
        s.end()
    }
}
