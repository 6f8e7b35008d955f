//! Pre-seeded identifiers targeted by read and write traffic.
//!
//! Pools are filled once during setup and never change afterwards. Users share them
//! behind an `Arc` and only ever read from them.

use rand::Rng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::action::Action;
use crate::client::Transport;
use crate::payload::{generate_identifier, PayloadBuilder};

/// Which traffic a pool serves.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum PoolKind {
    /// Users created only to be looked up.
    Read,
    /// Users created to be updated and deleted.
    Write,
}
impl PoolKind {
    /// Prefix given to every identifier seeded into this pool.
    pub fn prefix(&self) -> &'static str {
        match self {
            PoolKind::Read => "get",
            PoolKind::Write => "write",
        }
    }
}

/// Whether a creation response lets an identifier into a pool.
///
/// A `201 Created` means the user now exists. A `409 Conflict` means it already
/// did, which is just as good for later reads and writes.
///
/// # Example
/// ```rust
/// use gander::pool::admits;
///
/// assert!(admits(Some(201)));
/// assert!(admits(Some(409)));
/// assert!(!admits(Some(500)));
/// assert!(!admits(None));
/// ```
pub fn admits(status: Option<u16>) -> bool {
    matches!(status, Some(201) | Some(409))
}

/// An immutable list of identifiers known to exist on the target.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourcePool {
    kind: PoolKind,
    identifiers: Vec<String>,
}
impl ResourcePool {
    /// Build a pool from identifiers that are already known to exist.
    pub fn from_identifiers(kind: PoolKind, identifiers: Vec<String>) -> Self {
        ResourcePool { kind, identifiers }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Pick a uniformly random identifier, or `None` if the pool is empty.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        if self.identifiers.is_empty() {
            None
        } else {
            let index = rng.random_range(0..self.identifiers.len());
            Some(self.identifiers[index].as_str())
        }
    }
}

/// Create `count` users one after another, keeping the identifiers the target accepted.
///
/// Creation is not retried. Identifiers rejected by [`admits`], and requests that fail
/// at the transport level, are dropped.
pub async fn seed(
    kind: PoolKind,
    count: usize,
    builder: &PayloadBuilder,
    transport: &dyn Transport,
) -> ResourcePool {
    info!("seeding {} pool with {} users...", kind, count);
    let mut identifiers = Vec::with_capacity(count);
    for _ in 0..count {
        let identifier = generate_identifier(kind.prefix());
        let plan = builder.build(Action::Create, &identifier);
        let status = match transport.send(&plan).await {
            Ok(status) => Some(status),
            Err(e) => {
                debug!("failed to seed {}: {}", identifier, e);
                None
            }
        };
        if admits(status) {
            identifiers.push(identifier);
        } else {
            debug!("discarding {} from {} pool: {:?}", identifier, kind, status);
        }
    }
    info!("seeded {} of {} {} pool users", identifiers.len(), count, kind);

    ResourcePool::from_identifiers(kind, identifiers)
}

/// The read and write pools used during a load test.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourcePools {
    pub read: ResourcePool,
    pub write: ResourcePool,
}
impl ResourcePools {
    pub fn new(read: ResourcePool, write: ResourcePool) -> Self {
        ResourcePools { read, write }
    }

    /// Two empty pools.
    pub fn empty() -> Self {
        ResourcePools::new(
            ResourcePool::from_identifiers(PoolKind::Read, Vec::new()),
            ResourcePool::from_identifiers(PoolKind::Write, Vec::new()),
        )
    }

    pub fn get(&self, kind: PoolKind) -> &ResourcePool {
        match kind {
            PoolKind::Read => &self.read,
            PoolKind::Write => &self.write,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TransportError;
    use crate::payload::{RequestPlan, DEFAULT_USERS_PATH};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::sync::Mutex;

    // Replays a fixed list of responses, then answers 201.
    struct Scripted {
        responses: Mutex<Vec<Result<u16, TransportError>>>,
    }
    impl Scripted {
        fn new(mut responses: Vec<Result<u16, TransportError>>) -> Self {
            responses.reverse();
            Scripted {
                responses: Mutex::new(responses),
            }
        }
    }
    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, plan: &RequestPlan) -> Result<u16, TransportError> {
            assert_eq!(plan.action, Action::Create);
            self.responses.lock().unwrap().pop().unwrap_or(Ok(201))
        }
    }

    fn builder() -> PayloadBuilder {
        PayloadBuilder::new(DEFAULT_USERS_PATH, None)
    }

    #[tokio::test]
    async fn seed_all_created() {
        let transport = Scripted::new(Vec::new());
        let pool = seed(PoolKind::Read, 150, &builder(), &transport).await;
        assert_eq!(pool.len(), 150);
        assert_eq!(pool.kind(), PoolKind::Read);
        assert!(pool.identifiers().iter().all(|i| i.starts_with("get_")));
        let unique: HashSet<&String> = pool.identifiers().iter().collect();
        assert_eq!(unique.len(), 150);
    }

    #[tokio::test]
    async fn seed_admits_conflicts() {
        let transport = Scripted::new(vec![Ok(409); 10]);
        let pool = seed(PoolKind::Write, 150, &builder(), &transport).await;
        assert_eq!(pool.len(), 150);
        assert!(pool.identifiers().iter().all(|i| i.starts_with("write_")));
    }

    #[tokio::test]
    async fn seed_discards_failures() {
        let transport = Scripted::new(vec![Ok(500); 5]);
        let pool = seed(PoolKind::Read, 150, &builder(), &transport).await;
        assert_eq!(pool.len(), 145);

        let transport = Scripted::new(vec![
            Err(TransportError::Timeout("slow".to_string())),
            Ok(400),
            Err(TransportError::Connect("refused".to_string())),
        ]);
        let pool = seed(PoolKind::Write, 10, &builder(), &transport).await;
        assert_eq!(pool.len(), 7);
    }

    #[tokio::test]
    async fn seed_nothing() {
        let transport = Scripted::new(Vec::new());
        let pool = seed(PoolKind::Write, 0, &builder(), &transport).await;
        assert!(pool.is_empty());
    }

    #[test]
    fn choose_from_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        let empty = ResourcePool::from_identifiers(PoolKind::Write, Vec::new());
        assert!(empty.choose(&mut rng).is_none());

        let identifiers: Vec<String> = (0..5).map(|i| format!("write_{}@test.com", i)).collect();
        let pool = ResourcePool::from_identifiers(PoolKind::Write, identifiers.clone());
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            let chosen = pool.choose(&mut rng).unwrap();
            assert!(identifiers.iter().any(|i| i == chosen));
            seen.insert(chosen.to_string());
        }
        // Every identifier is reachable.
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn pool_kinds() {
        assert_eq!(PoolKind::Read.prefix(), "get");
        assert_eq!(PoolKind::Write.to_string(), "write");
        let pools = ResourcePools::empty();
        assert_eq!(pools.get(PoolKind::Write).kind(), PoolKind::Write);
        assert!(pools.get(PoolKind::Read).is_empty());
    }
}
