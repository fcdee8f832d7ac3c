use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use georpc_common::{GeoRpcError, Result};
use tracing::{debug, warn};

use crate::classifier::{MethodClassifier, OperationIntent};
use crate::topology::NodeAddress;

/// An established connection together with the node it was opened for.
#[derive(Debug, Clone)]
pub struct ReadyConnection<C> {
    pub conn: C,
    pub address: NodeAddress,
}

impl<C> ReadyConnection<C> {
    pub fn new(conn: C, address: NodeAddress) -> Self {
        Self { conn, address }
    }
}

/// Connection-selection plugin interface.
///
/// The connection manager calls [`build`](Self::build) whenever its set of
/// ready connections changes; the forwarding layer calls
/// [`pick`](Self::pick) once per outgoing call.
pub trait ConnectionPicker<C>: Send + Sync {
    fn build(&self, ready: &[ReadyConnection<C>]);

    /// Selects the connection for a call to `method`, or fails with
    /// [`GeoRpcError::NoConnectionAvailable`].
    fn pick(&self, method: &str) -> Result<C>;
}

/// What a read does when no follower is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFallback {
    /// Serve the read from the leader.
    #[default]
    Leader,
    /// Fail with `NoConnectionAvailable`.
    Fail,
}

struct PickerState<C> {
    leader: Option<C>,
    followers: Vec<C>,
    cursor: AtomicUsize,
}

/// Routes writes to the leader and round-robins reads over followers.
///
/// The state is replaced wholesale on every [`build`](ConnectionPicker::build)
/// and read through an [`ArcSwapOption`], so a pick sees either the old or the
/// new state and never blocks. The round-robin cursor lives inside the state
/// and is advanced with a relaxed atomic increment.
pub struct RoutingPicker<C> {
    state: ArcSwapOption<PickerState<C>>,
    classifier: MethodClassifier,
    read_fallback: ReadFallback,
}

impl<C: Clone> RoutingPicker<C> {
    pub fn new(classifier: MethodClassifier) -> Self {
        Self::with_read_fallback(classifier, ReadFallback::default())
    }

    pub fn with_read_fallback(classifier: MethodClassifier, read_fallback: ReadFallback) -> Self {
        Self {
            state: ArcSwapOption::empty(),
            classifier,
            read_fallback,
        }
    }

    fn build_state(ready: &[ReadyConnection<C>]) -> PickerState<C> {
        let mut leaders: Vec<&ReadyConnection<C>> = Vec::new();
        let mut followers: Vec<&ReadyConnection<C>> = Vec::new();
        for entry in ready {
            if entry.address.is_leader {
                leaders.push(entry);
            } else {
                followers.push(entry);
            }
        }

        leaders.sort_by(|a, b| a.address.addr.cmp(&b.address.addr));
        followers.sort_by(|a, b| a.address.addr.cmp(&b.address.addr));

        if leaders.len() > 1 {
            warn!(
                leaders = leaders.len(),
                chosen = %leaders[0].address.addr,
                "ready set carries more than one leader"
            );
        }

        PickerState {
            leader: leaders.first().map(|entry| entry.conn.clone()),
            followers: followers.into_iter().map(|entry| entry.conn.clone()).collect(),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl<C> ConnectionPicker<C> for RoutingPicker<C>
where
    C: Clone + Send + Sync,
{
    fn build(&self, ready: &[ReadyConnection<C>]) {
        let state = Self::build_state(ready);
        debug!(
            has_leader = state.leader.is_some(),
            followers = state.followers.len(),
            "picker rebuilt"
        );
        self.state.store(Some(Arc::new(state)));
    }

    fn pick(&self, method: &str) -> Result<C> {
        let guard = self.state.load();
        let state = match &*guard {
            Some(state) if state.leader.is_some() || !state.followers.is_empty() => state,
            _ => return Err(GeoRpcError::NoConnectionAvailable),
        };

        match self.classifier.classify(method) {
            // Writes never fall back to a follower
            OperationIntent::Write => state.leader.clone().ok_or(GeoRpcError::NoConnectionAvailable),
            OperationIntent::Read => {
                if !state.followers.is_empty() {
                    let n = state.cursor.fetch_add(1, Ordering::Relaxed);
                    return Ok(state.followers[n % state.followers.len()].clone());
                }
                match self.read_fallback {
                    ReadFallback::Leader => state.leader.clone().ok_or(GeoRpcError::NoConnectionAvailable),
                    ReadFallback::Fail => Err(GeoRpcError::NoConnectionAvailable),
                }
            }
        }
    }
}
