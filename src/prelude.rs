pub use crate::action::{Action, ActionWeights};
pub use crate::classify::{classify, OutcomeBucket, StatusClass};
pub use crate::client::{HttpTransport, Transport, TransportError};
pub use crate::config::{GanderConfiguration, GanderDefault, GanderDefaultType};
pub use crate::logger::GanderLogFormat;
pub use crate::metrics::{Aggregator, GanderMetrics};
pub use crate::payload::{PayloadBuilder, RequestPlan};
pub use crate::pool::{PoolKind, ResourcePool, ResourcePools};
pub use crate::ramp::{RampPlan, RampPolicy};
pub use crate::{AttackPhase, GanderAttack, GanderError};
