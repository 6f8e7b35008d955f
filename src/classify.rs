//! Map responses onto outcome buckets.
//!
//! Each [`Action`] accepts a fixed set of statuses. Anything else, including a
//! request that never produced a status, lands in that action's
//! [`StatusClass::Unexpected`] bucket.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::action::Action;

/// The response classes tracked per action.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize, EnumIter,
)]
pub enum StatusClass {
    /// 200: found, updated or deleted.
    Ok,
    /// 201: created.
    Created,
    /// 403: forbidden.
    Forbidden,
    /// 404: not found.
    NotFound,
    /// 409: conflict, the user already exists.
    Conflict,
    /// Any status outside the accepted set, or no status at all.
    Unexpected,
}
impl StatusClass {
    /// The status code this class represents, `None` for [`StatusClass::Unexpected`].
    pub fn code(&self) -> Option<u16> {
        match self {
            StatusClass::Ok => Some(200),
            StatusClass::Created => Some(201),
            StatusClass::Forbidden => Some(403),
            StatusClass::NotFound => Some(404),
            StatusClass::Conflict => Some(409),
            StatusClass::Unexpected => None,
        }
    }

    /// Position of this class in [`StatusClass::iter`] order.
    pub fn index(&self) -> usize {
        match self {
            StatusClass::Ok => 0,
            StatusClass::Created => 1,
            StatusClass::Forbidden => 2,
            StatusClass::NotFound => 3,
            StatusClass::Conflict => 4,
            StatusClass::Unexpected => 5,
        }
    }
}

/// Number of [`StatusClass`] variants.
pub const STATUS_CLASSES: usize = 6;

/// The statuses accepted for each action, in the order they're reported.
pub fn accepted(action: Action) -> &'static [StatusClass] {
    match action {
        Action::Read | Action::Update | Action::Delete => &[
            StatusClass::Ok,
            StatusClass::NotFound,
            StatusClass::Forbidden,
        ],
        Action::Create => &[
            StatusClass::Created,
            StatusClass::Conflict,
            StatusClass::Forbidden,
        ],
    }
}

/// The status class that means the action did what it was asked to.
pub fn success(action: Action) -> StatusClass {
    match action {
        Action::Create => StatusClass::Created,
        Action::Read | Action::Update | Action::Delete => StatusClass::Ok,
    }
}

/// An `(action, status class)` pair, each with its own counter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OutcomeBucket {
    pub action: Action,
    pub class: StatusClass,
}
impl OutcomeBucket {
    pub fn new(action: Action, class: StatusClass) -> Self {
        OutcomeBucket { action, class }
    }

    /// True unless this is an unexpected outcome.
    pub fn is_expected(&self) -> bool {
        self.class != StatusClass::Unexpected
    }

    /// Dense index used by the aggregator's counter array.
    pub fn index(&self) -> usize {
        self.action.index() * STATUS_CLASSES + self.class.index()
    }

    /// Every bucket an action's accepted statuses map to.
    pub fn expected() -> Vec<OutcomeBucket> {
        Action::iter()
            .flat_map(|action| {
                accepted(action)
                    .iter()
                    .map(move |class| OutcomeBucket::new(action, *class))
            })
            .collect()
    }

    /// Every bucket that can be produced, expected and unexpected.
    pub fn all() -> Vec<OutcomeBucket> {
        Action::iter()
            .flat_map(|action| {
                accepted(action)
                    .iter()
                    .copied()
                    .chain(std::iter::once(StatusClass::Unexpected))
                    .map(move |class| OutcomeBucket::new(action, class))
            })
            .collect()
    }
}

/// Buckets are named after the counters they replace, ie `READ_200` or `CREATE_409`.
impl fmt::Display for OutcomeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class.code() {
            Some(code) => write!(f, "{}_{}", self.action, code),
            None => write!(f, "{}_UNEXPECTED", self.action),
        }
    }
}

/// Classify the outcome of a request.
///
/// `status` is `None` when the transport failed before a response was received.
///
/// # Example
/// ```rust
/// use gander::action::Action;
/// use gander::classify::{classify, StatusClass};
///
/// assert_eq!(classify(Action::Read, Some(404)).class, StatusClass::NotFound);
/// assert_eq!(classify(Action::Create, Some(200)).class, StatusClass::Unexpected);
/// assert_eq!(classify(Action::Delete, None).class, StatusClass::Unexpected);
/// ```
pub fn classify(action: Action, status: Option<u16>) -> OutcomeBucket {
    let class = status
        .and_then(|code| {
            accepted(action)
                .iter()
                .find(|class| class.code() == Some(code))
                .copied()
        })
        .unwrap_or(StatusClass::Unexpected);
    OutcomeBucket::new(action, class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_table() {
        let table = [
            (Action::Read, [200, 404, 403]),
            (Action::Update, [200, 404, 403]),
            (Action::Create, [201, 409, 403]),
            (Action::Delete, [200, 404, 403]),
        ];
        for (action, statuses) in table {
            for status in statuses {
                let bucket = classify(action, Some(status));
                assert!(bucket.is_expected(), "{} {}", action, status);
                assert_eq!(bucket.action, action);
                assert_eq!(bucket.class.code(), Some(status));
            }
        }
    }

    #[test]
    fn unaccepted_statuses_are_unexpected() {
        for action in Action::iter() {
            for status in [100, 204, 301, 400, 401, 500, 502, 503] {
                assert_eq!(
                    classify(action, Some(status)).class,
                    StatusClass::Unexpected
                );
            }
            assert_eq!(classify(action, None).class, StatusClass::Unexpected);
        }
        // 201 is only accepted for create, 200 and 404 never are.
        assert_eq!(classify(Action::Read, Some(201)).class, StatusClass::Unexpected);
        assert_eq!(classify(Action::Create, Some(200)).class, StatusClass::Unexpected);
        assert_eq!(classify(Action::Create, Some(404)).class, StatusClass::Unexpected);
        assert_eq!(classify(Action::Delete, Some(409)).class, StatusClass::Unexpected);
    }

    #[test]
    fn classification_is_pure() {
        for action in Action::iter() {
            for status in 100..600 {
                assert_eq!(classify(action, Some(status)), classify(action, Some(status)));
            }
        }
    }

    #[test]
    fn every_status_maps_to_one_bucket() {
        for action in Action::iter() {
            let expected: Vec<OutcomeBucket> = OutcomeBucket::expected()
                .into_iter()
                .filter(|b| b.action == action)
                .collect();
            assert_eq!(expected.len(), 3);
            // Each expected status produces a distinct bucket.
            for status in 100..600 {
                let matches = expected
                    .iter()
                    .filter(|b| b.class.code() == Some(status))
                    .count();
                assert!(matches <= 1);
            }
        }
    }

    #[test]
    fn bucket_names_and_indexes() {
        assert_eq!(classify(Action::Read, Some(200)).to_string(), "READ_200");
        assert_eq!(classify(Action::Create, Some(409)).to_string(), "CREATE_409");
        assert_eq!(classify(Action::Delete, Some(500)).to_string(), "DELETE_UNEXPECTED");
        assert_eq!(OutcomeBucket::expected().len(), 12);
        assert_eq!(OutcomeBucket::all().len(), 16);

        let mut indexes: Vec<usize> = OutcomeBucket::all().iter().map(|b| b.index()).collect();
        indexes.sort();
        indexes.dedup();
        assert_eq!(indexes.len(), 16);
        assert!(indexes.iter().all(|i| *i < 4 * STATUS_CLASSES));
    }

    #[test]
    fn success_classes() {
        assert_eq!(success(Action::Create), StatusClass::Created);
        assert_eq!(success(Action::Update), StatusClass::Ok);
        assert!(accepted(Action::Read).contains(&success(Action::Read)));
    }
}
