//! Actions a virtual user can perform, and the weights used to choose between them.
//!
//! Every iteration a [`VirtualUser`](../user/struct.VirtualUser.html) performs exactly one
//! [`Action`], chosen by drawing a uniform random value in `[0, 1)` and mapping it onto the
//! cumulative thresholds of the configured [`ActionWeights`].

use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::pool::PoolKind;
use crate::GanderError;

/// Tolerance allowed when confirming that configured weights sum to 1.0.
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// The four operations performed against the user API.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Action {
    /// Look up a user by email, targeting the read pool.
    Read,
    /// Update a user, targeting the write pool.
    Update,
    /// Create a brand new user.
    Create,
    /// Delete a user, targeting the write pool.
    Delete,
}
impl Action {
    /// The HTTP method used to perform this action.
    pub fn method(&self) -> Method {
        match self {
            Action::Read => Method::GET,
            Action::Update => Method::PUT,
            Action::Create => Method::POST,
            Action::Delete => Method::DELETE,
        }
    }

    /// The pool this action draws its target from, `None` when it generates its own.
    pub fn pool(&self) -> Option<PoolKind> {
        match self {
            Action::Read => Some(PoolKind::Read),
            Action::Update | Action::Delete => Some(PoolKind::Write),
            Action::Create => None,
        }
    }

    /// Position of this action in [`Action::iter`] order.
    pub fn index(&self) -> usize {
        match self {
            Action::Read => 0,
            Action::Update => 1,
            Action::Create => 2,
            Action::Delete => 3,
        }
    }
}

/// A probability distribution over the four [`Action`]s.
///
/// Weights are stored in `READ, UPDATE, CREATE, DELETE` order together with their
/// cumulative thresholds, which partition `[0, 1)` into one contiguous range per
/// action.
///
/// # Example
/// ```rust
/// use gander::action::{Action, ActionWeights};
///
/// let weights = ActionWeights::default();
/// assert_eq!(weights.pick(0.0), Action::Read);
/// assert_eq!(weights.pick(0.85), Action::Update);
/// assert_eq!(weights.pick(0.92), Action::Create);
/// assert_eq!(weights.pick(0.99), Action::Delete);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionWeights {
    weights: [f64; 4],
    thresholds: [f64; 4],
}
impl ActionWeights {
    /// Build a validated set of weights. Weights must be finite, non-negative and
    /// sum to 1.0.
    pub fn new(read: f64, update: f64, create: f64, delete: f64) -> Result<Self, GanderError> {
        let weights = [read, update, create, delete];
        for (action, weight) in Action::iter().zip(weights.iter()) {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(GanderError::InvalidWeight {
                    weight: weight.to_string(),
                    detail: format!("weight for {} must be a non-negative number", action),
                });
            }
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(GanderError::InvalidWeight {
                weight: total.to_string(),
                detail: "action weights must sum to 1.0".to_string(),
            });
        }

        Ok(ActionWeights::from_validated(weights))
    }

    // Derive cumulative thresholds from weights already known to be valid.
    fn from_validated(weights: [f64; 4]) -> Self {
        let mut thresholds = [0.0; 4];
        let mut cumulative = 0.0;
        for (index, weight) in weights.iter().enumerate() {
            cumulative += weight;
            thresholds[index] = cumulative;
        }
        // Snap the last selectable action to 1.0 so rounding never leaves a gap.
        if let Some(last) = weights.iter().rposition(|w| *w > 0.0) {
            for threshold in thresholds.iter_mut().skip(last) {
                *threshold = 1.0;
            }
        }

        ActionWeights {
            weights,
            thresholds,
        }
    }

    /// Map a uniform draw from `[0, 1)` onto an action.
    ///
    /// Ranges are checked in ascending threshold order and the first match wins.
    /// Actions with a weight of zero are never returned.
    pub fn pick(&self, draw: f64) -> Action {
        let mut fallback = Action::Read;
        for action in Action::iter() {
            let index = action.index();
            if self.weights[index] <= 0.0 {
                continue;
            }
            fallback = action;
            if draw < self.thresholds[index] {
                return action;
            }
        }
        // Only reachable with a draw outside of [0, 1).
        fallback
    }

    /// The configured probability of `action`.
    pub fn weight(&self, action: Action) -> f64 {
        self.weights[action.index()]
    }

    /// The upper bound of the range mapped to `action`.
    pub fn threshold(&self, action: Action) -> f64 {
        self.thresholds[action.index()]
    }
}
impl Default for ActionWeights {
    fn default() -> Self {
        ActionWeights::from_validated([0.80, 0.10, 0.05, 0.05])
    }
}

/// Parse `"read,update,create,delete"` formatted weights, for example `"0.8,0.1,0.05,0.05"`.
impl FromStr for ActionWeights {
    type Err = GanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |detail: &str| GanderError::InvalidOption {
            option: "`configuration.weights`".to_string(),
            value: s.to_string(),
            detail: detail.to_string(),
        };

        let values = s
            .split(',')
            .map(|w| w.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| invalid("weights must be numbers, ie \"0.8,0.1,0.05,0.05\"."))?;
        if values.len() != 4 {
            return Err(invalid(
                "expected four weights in read,update,create,delete order.",
            ));
        }
        ActionWeights::new(values[0], values[1], values[2], values[3])
    }
}

impl fmt::Display for ActionWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.weights[0], self.weights[1], self.weights[2], self.weights[3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn thresholds_partition_unit_interval() {
        let weights = ActionWeights::new(0.8, 0.1, 0.05, 0.05).unwrap();
        let mut previous = 0.0;
        for action in Action::iter() {
            assert!(weights.threshold(action) >= previous);
            previous = weights.threshold(action);
        }
        assert_eq!(previous, 1.0);
    }

    #[test]
    fn first_match_wins() {
        let weights = ActionWeights::default();
        assert_eq!(weights.pick(0.0), Action::Read);
        assert_eq!(weights.pick(0.7999), Action::Read);
        assert_eq!(weights.pick(0.80), Action::Update);
        assert_eq!(weights.pick(0.8999), Action::Update);
        assert_eq!(weights.pick(0.9001), Action::Create);
        assert_eq!(weights.pick(0.9501), Action::Delete);
        assert_eq!(weights.pick(0.999_999), Action::Delete);
    }

    #[test]
    fn zero_weights_never_selected() {
        let weights = ActionWeights::new(0.0, 0.5, 0.5, 0.0).unwrap();
        assert_eq!(weights.pick(0.0), Action::Update);
        assert_eq!(weights.pick(0.49), Action::Update);
        assert_eq!(weights.pick(0.5), Action::Create);
        assert_eq!(weights.pick(0.999_999), Action::Create);
        // Out of range draws still map onto a selectable action.
        assert_eq!(weights.pick(-1.0), Action::Update);
        assert_eq!(weights.pick(1.0), Action::Create);

        let weights = ActionWeights::new(1.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(weights.pick(0.999_999), Action::Read);
    }

    #[test]
    fn rejects_invalid_weights() {
        assert!(ActionWeights::new(0.5, 0.5, 0.5, 0.0).is_err());
        assert!(ActionWeights::new(1.2, -0.2, 0.0, 0.0).is_err());
        assert!(ActionWeights::new(f64::NAN, 0.0, 0.0, 1.0).is_err());
        assert!(ActionWeights::new(0.1, 0.2, 0.3, 0.4).is_ok());
    }

    #[test]
    fn parse_weights() {
        let weights = ActionWeights::from_str("0.8,0.1,0.05,0.05").unwrap();
        assert_eq!(weights, ActionWeights::default());
        let weights = ActionWeights::from_str(" 0.25 , 0.25 , 0.25 , 0.25 ").unwrap();
        assert_eq!(weights.weight(Action::Delete), 0.25);
        assert!(ActionWeights::from_str("0.5,0.5").is_err());
        assert!(ActionWeights::from_str("a,b,c,d").is_err());
        assert!(ActionWeights::from_str("0.5,0.5,0.5,0.5").is_err());
        assert_eq!(ActionWeights::default().to_string(), "0.8,0.1,0.05,0.05");
    }

    fn configurations() -> Vec<ActionWeights> {
        vec![
            ActionWeights::default(),
            ActionWeights::new(0.25, 0.25, 0.25, 0.25).unwrap(),
            ActionWeights::new(0.5, 0.0, 0.3, 0.2).unwrap(),
        ]
    }

    fn assert_converges(weights: &ActionWeights, counts: [usize; 4], draws: usize) {
        for action in Action::iter() {
            let observed = counts[action.index()] as f64 / draws as f64;
            assert!(
                (observed - weights.weight(action)).abs() < 0.01,
                "{} observed {} expected {}",
                action,
                observed,
                weights.weight(action)
            );
        }
    }

    #[test]
    fn evenly_spaced_draws_match_weights() {
        let draws = 10_000;
        for weights in &configurations() {
            let mut counts = [0usize; 4];
            for i in 0..draws {
                let draw = (i as f64 + 0.5) / draws as f64;
                counts[weights.pick(draw).index()] += 1;
            }
            assert_converges(weights, counts, draws);
        }
    }

    #[test]
    fn random_draws_converge_to_weights() {
        let draws = 100_000;
        let mut rng = StdRng::seed_from_u64(42);
        for weights in &configurations() {
            let mut counts = [0usize; 4];
            for _ in 0..draws {
                counts[weights.pick(rng.random::<f64>()).index()] += 1;
            }
            assert_converges(weights, counts, draws);
        }
    }

    #[test]
    fn action_routing() {
        assert_eq!(Action::Read.method(), Method::GET);
        assert_eq!(Action::Update.method(), Method::PUT);
        assert_eq!(Action::Create.method(), Method::POST);
        assert_eq!(Action::Delete.method(), Method::DELETE);
        assert_eq!(Action::Read.pool(), Some(PoolKind::Read));
        assert_eq!(Action::Delete.pool(), Some(PoolKind::Write));
        assert_eq!(Action::Create.pool(), None);
        assert_eq!(Action::Create.to_string(), "CREATE");
        assert_eq!(Action::from_str("update").unwrap(), Action::Update);
    }
}
