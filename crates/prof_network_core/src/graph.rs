//! crates/prof_network_core/src/graph.rs
//!
//! The accepted-connection graph and the bounded breadth-first search that
//! decides whether a user is close enough to receive a connection request.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::{ConnectionEdge, ConnectionStatus, UserId};
use crate::error::{NetworkError, NetworkResult};

/// Requests are invalid beyond the third connection degree.
pub const MAX_REQUEST_DEGREE: usize = 3;

/// Unordered pair of user ids, smallest first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PairKey(UserId, UserId);

impl PairKey {
    fn new(a: &str, b: &str) -> Self {
        if a <= b {
            PairKey(a.to_owned(), b.to_owned())
        } else {
            PairKey(b.to_owned(), a.to_owned())
        }
    }
}

/// The single active edge occupying a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairState {
    pub requester_id: UserId,
    pub target_id: UserId,
    pub status: ConnectionStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    active: HashMap<PairKey, PairState>,
    adjacency: HashMap<UserId, BTreeSet<UserId>>,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from persisted edges. Rejected edges carry no state.
    pub fn from_edges<'a, I>(edges: I) -> NetworkResult<Self>
    where
        I: IntoIterator<Item = &'a ConnectionEdge>,
    {
        let mut graph = Self::new();
        for edge in edges {
            graph.record_edge(&edge.requester_id, &edge.target_id, edge.status)?;
        }
        Ok(graph)
    }

    /// All users sharing an accepted edge with `user_id`.
    pub fn neighbors(&self, user_id: &str) -> BTreeSet<UserId> {
        self.adjacency.get(user_id).cloned().unwrap_or_default()
    }

    pub fn are_connected(&self, a: &str, b: &str) -> bool {
        self.adjacency
            .get(a)
            .map(|adjacent| adjacent.contains(b))
            .unwrap_or(false)
    }

    pub fn active_edge(&self, a: &str, b: &str) -> Option<&PairState> {
        self.active.get(&PairKey::new(a, b))
    }

    pub fn is_within_degree(&self, source: &str, target: &str, max_degree: usize) -> bool {
        self.degree_between(source, target, max_degree).is_some()
    }

    /// Shortest accepted-edge distance from `source` to `target`, if it is at
    /// most `max_degree`. A user is never within any degree of itself.
    pub fn degree_between(&self, source: &str, target: &str, max_degree: usize) -> Option<usize> {
        if source == target {
            return None;
        }

        let mut visited: HashSet<&str> = HashSet::from([source]);
        let mut ring: Vec<&str> = vec![source];

        for degree in 1..=max_degree {
            let mut next_ring = Vec::new();
            for node in &ring {
                let Some(adjacent) = self.adjacency.get(*node) else {
                    continue;
                };
                for neighbor in adjacent {
                    if !visited.insert(neighbor.as_str()) {
                        continue;
                    }
                    if neighbor == target {
                        return Some(degree);
                    }
                    next_ring.push(neighbor.as_str());
                }
            }
            if next_ring.is_empty() {
                break;
            }
            ring = next_ring;
        }
        None
    }

    /// Upserts the edge state for the unordered pair {requester, target}.
    ///
    /// Re-recording the current state is a no-op. A Pending edge needs a free
    /// pair; Accepted and Rejected only resolve a Pending edge running in the
    /// same direction (Accepted may also seed an empty pair). Accepted edges
    /// never change.
    pub fn record_edge(
        &mut self,
        requester_id: &str,
        target_id: &str,
        status: ConnectionStatus,
    ) -> NetworkResult<()> {
        if requester_id == target_id {
            return Err(NetworkError::SelfReference);
        }

        let key = PairKey::new(requester_id, target_id);
        let existing = self
            .active
            .get(&key)
            .map(|state| (state.requester_id == requester_id, state.status));

        match (existing, status) {
            (Some((true, current)), wanted) if current == wanted => Ok(()),
            (None, ConnectionStatus::Rejected) => Ok(()),
            (None, ConnectionStatus::Pending) => {
                self.active.insert(key, pair_state(requester_id, target_id, status));
                Ok(())
            }
            (None, ConnectionStatus::Accepted)
            | (Some((true, ConnectionStatus::Pending)), ConnectionStatus::Accepted) => {
                self.active.insert(key, pair_state(requester_id, target_id, status));
                self.link(requester_id, target_id);
                Ok(())
            }
            (Some((true, ConnectionStatus::Pending)), ConnectionStatus::Rejected) => {
                self.active.remove(&key);
                Ok(())
            }
            (Some((_, current)), wanted) => Err(NetworkError::Conflict(format!(
                "{requester_id} and {target_id} already share a {current} edge; cannot record {wanted}"
            ))),
        }
    }

    fn link(&mut self, a: &str, b: &str) {
        self.adjacency
            .entry(a.to_owned())
            .or_default()
            .insert(b.to_owned());
        self.adjacency
            .entry(b.to_owned())
            .or_default()
            .insert(a.to_owned());
    }
}

fn pair_state(requester_id: &str, target_id: &str, status: ConnectionStatus) -> PairState {
    PairState {
        requester_id: requester_id.to_owned(),
        target_id: target_id.to_owned(),
        status,
    }
}
