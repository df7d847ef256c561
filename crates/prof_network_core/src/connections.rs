//! crates/prof_network_core/src/connections.rs
//!
//! The connection request workflow: validation of new requests against the
//! accepted-connection graph, and the target's accept/reject transitions.
//! Every operation runs inside a single store transaction.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{ConnectionEdge, ConnectionStatus, Decision, UserId};
use crate::error::{NetworkError, NetworkResult};
use crate::graph::{ConnectionGraph, MAX_REQUEST_DEGREE};
use crate::ports::{Store, StoreTransaction};

/// Tunables for request validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPolicy {
    pub max_degree: usize,
    /// Lets a user with no accepted connections send a first request to anyone.
    pub allow_isolated_requesters: bool,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            max_degree: MAX_REQUEST_DEGREE,
            allow_isolated_requesters: false,
        }
    }
}

#[derive(Clone)]
pub struct ConnectionRequestService {
    store: Arc<dyn Store>,
    policy: ConnectionPolicy,
}

impl ConnectionRequestService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_policy(store, ConnectionPolicy::default())
    }

    pub fn with_policy(store: Arc<dyn Store>, policy: ConnectionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ConnectionPolicy {
        self.policy
    }

    /// Creates a Pending edge from `requester_id` to `target_id`.
    pub async fn send_request(
        &self,
        requester_id: &str,
        target_id: &str,
    ) -> NetworkResult<ConnectionEdge> {
        if requester_id == target_id {
            return Err(NetworkError::SelfReference);
        }

        let mut tx = self.store.begin().await?;
        if !tx.user_exists(target_id).await? {
            return Err(NetworkError::NotFound(format!("User {} not found", target_id)));
        }

        let mut graph = load_graph(tx.as_mut()).await?;
        if let Some(existing) = graph.active_edge(requester_id, target_id) {
            return Err(NetworkError::Conflict(format!(
                "{} edge from {} to {} already exists",
                existing.status, existing.requester_id, existing.target_id
            )));
        }

        let reachable = graph.is_within_degree(requester_id, target_id, self.policy.max_degree);
        let isolated = graph.neighbors(requester_id).is_empty();
        if !reachable && !(isolated && self.policy.allow_isolated_requesters) {
            debug!(requester_id, target_id, "request refused: beyond connection degree");
            return Err(NetworkError::OutOfDegree {
                target: target_id.to_owned(),
                max_degree: self.policy.max_degree,
            });
        }

        graph.record_edge(requester_id, target_id, ConnectionStatus::Pending)?;
        let edge = tx.insert_edge(requester_id, target_id).await?;
        tx.commit().await?;

        info!(edge_id = edge.id, requester_id, target_id, "connection request sent");
        Ok(edge)
    }

    /// Accepts or rejects the pending request `requester_id -> target_id`.
    /// Only the target may answer.
    pub async fn respond(
        &self,
        target_id: &str,
        requester_id: &str,
        decision: Decision,
    ) -> NetworkResult<ConnectionEdge> {
        let mut tx = self.store.begin().await?;

        let incoming = tx.pending_requests_for(target_id).await?;
        let Some(mut edge) = incoming
            .into_iter()
            .find(|edge| edge.requester_id == requester_id)
        else {
            let outgoing = tx.pending_requests_for(requester_id).await?;
            if outgoing.iter().any(|edge| edge.requester_id == target_id) {
                return Err(NetworkError::Forbidden(format!(
                    "only {} can answer this request",
                    requester_id
                )));
            }
            return Err(NetworkError::NotFound(format!(
                "No pending request from {} to {}",
                requester_id, target_id
            )));
        };

        let status = match decision {
            Decision::Accept => ConnectionStatus::Accepted,
            Decision::Reject => ConnectionStatus::Rejected,
        };

        let mut graph = load_graph(tx.as_mut()).await?;
        graph.record_edge(requester_id, target_id, status)?;
        tx.set_edge_status(edge.id, status).await?;
        tx.commit().await?;

        info!(edge_id = edge.id, requester_id, target_id, %status, "connection request answered");
        edge.status = status;
        Ok(edge)
    }

    /// Requesters with a pending request to `user_id`, oldest first.
    pub async fn list_incoming_requests(&self, user_id: &str) -> NetworkResult<Vec<UserId>> {
        let mut tx = self.store.begin().await?;
        let pending = tx.pending_requests_for(user_id).await?;
        Ok(pending.into_iter().map(|edge| edge.requester_id).collect())
    }

    /// Direct accepted connections of `user_id`, sorted by id.
    pub async fn list_connections(&self, user_id: &str) -> NetworkResult<Vec<UserId>> {
        let mut tx = self.store.begin().await?;
        if !tx.user_exists(user_id).await? {
            return Err(NetworkError::NotFound(format!("User {} not found", user_id)));
        }
        let graph = load_graph(tx.as_mut()).await?;
        Ok(graph.neighbors(user_id).into_iter().collect())
    }

    /// Whether an Accepted edge joins the two users, whatever the policy's degree.
    pub async fn are_connected(&self, a: &str, b: &str) -> NetworkResult<bool> {
        let mut tx = self.store.begin().await?;
        let graph = load_graph(tx.as_mut()).await?;
        Ok(graph.are_connected(a, b))
    }

    pub async fn is_within_degree(&self, source_id: &str, target_id: &str) -> NetworkResult<bool> {
        Ok(self.connection_degree(source_id, target_id).await?.is_some())
    }

    /// Distance between two users, if within the policy's maximum degree.
    pub async fn connection_degree(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> NetworkResult<Option<usize>> {
        let mut tx = self.store.begin().await?;
        let graph = load_graph(tx.as_mut()).await?;
        Ok(graph.degree_between(source_id, target_id, self.policy.max_degree))
    }
}

async fn load_graph(tx: &mut dyn StoreTransaction) -> NetworkResult<ConnectionGraph> {
    let edges = tx.active_edges().await?;
    ConnectionGraph::from_edges(&edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::ports::ProfileDirectory;

    async fn store_with_users(users: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for user in users {
            store
                .create_user(user, "hash", &format!("{user}@example.com"))
                .await
                .unwrap();
        }
        store
    }

    async fn connect(store: &MemoryStore, a: &str, b: &str) {
        let mut tx = store.begin().await.unwrap();
        let edge = tx.insert_edge(a, b).await.unwrap();
        tx.set_edge_status(edge.id, ConnectionStatus::Accepted)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    async fn chain() -> (Arc<MemoryStore>, ConnectionRequestService) {
        let store = store_with_users(&["a", "b", "c", "d", "e"]).await;
        for (x, y) in [("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")] {
            connect(&store, x, y).await;
        }
        let service = ConnectionRequestService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn request_within_third_degree_is_pending_for_target() {
        let (_store, service) = chain().await;

        let edge = service.send_request("a", "d").await.unwrap();

        assert_eq!(edge.status, ConnectionStatus::Pending);
        assert_eq!(edge.requester_id, "a");
        assert_eq!(service.list_incoming_requests("d").await.unwrap(), vec!["a"]);
        assert!(service.list_incoming_requests("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_beyond_third_degree_is_refused_without_side_effects() {
        let (store, service) = chain().await;

        let result = service.send_request("a", "e").await;

        assert!(matches!(result, Err(NetworkError::OutOfDegree { max_degree: 3, .. })));
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.active_edges().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn self_and_unknown_targets_are_rejected() {
        let (_store, service) = chain().await;

        assert!(matches!(
            service.send_request("a", "a").await,
            Err(NetworkError::SelfReference)
        ));
        assert!(matches!(
            service.send_request("a", "nobody").await,
            Err(NetworkError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_requests_conflict_in_either_direction() {
        let (_store, service) = chain().await;
        service.send_request("a", "c").await.unwrap();

        assert!(matches!(
            service.send_request("a", "c").await,
            Err(NetworkError::Conflict(_))
        ));
        assert!(matches!(
            service.send_request("c", "a").await,
            Err(NetworkError::Conflict(_))
        ));
        // already connected
        assert!(matches!(
            service.send_request("b", "a").await,
            Err(NetworkError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn accepting_makes_users_neighbours() {
        let (_store, service) = chain().await;
        service.send_request("a", "c").await.unwrap();

        let edge = service.respond("c", "a", Decision::Accept).await.unwrap();

        assert_eq!(edge.status, ConnectionStatus::Accepted);
        assert!(service.list_connections("a").await.unwrap().contains(&"c".to_owned()));
        assert_eq!(service.list_connections("c").await.unwrap(), vec!["a", "b", "d"]);
        assert_eq!(service.connection_degree("a", "e").await.unwrap(), Some(3));
        assert!(service.list_incoming_requests("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_pair_can_be_requested_again() {
        let (_store, service) = chain().await;
        let first = service.send_request("a", "c").await.unwrap();
        service.respond("c", "a", Decision::Reject).await.unwrap();

        let second = service.send_request("a", "c").await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(second.status, ConnectionStatus::Pending);
        assert!(!service.list_connections("a").await.unwrap().contains(&"c".to_owned()));
    }

    #[tokio::test]
    async fn only_the_target_can_answer() {
        let (_store, service) = chain().await;
        service.send_request("a", "c").await.unwrap();

        assert!(matches!(
            service.respond("a", "c", Decision::Accept).await,
            Err(NetworkError::Forbidden(_))
        ));
        assert!(matches!(
            service.respond("d", "a", Decision::Accept).await,
            Err(NetworkError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn incoming_requests_keep_insertion_order() {
        let (_store, service) = chain().await;
        service.send_request("e", "c").await.unwrap();
        service.send_request("a", "c").await.unwrap();

        assert_eq!(service.list_incoming_requests("c").await.unwrap(), vec!["e", "a"]);
    }

    #[tokio::test]
    async fn isolated_requesters_need_the_policy_switch() {
        let store = store_with_users(&["x", "y"]).await;

        let strict = ConnectionRequestService::new(store.clone());
        assert!(matches!(
            strict.send_request("x", "y").await,
            Err(NetworkError::OutOfDegree { .. })
        ));

        let open = ConnectionRequestService::with_policy(
            store.clone(),
            ConnectionPolicy {
                allow_isolated_requesters: true,
                ..ConnectionPolicy::default()
            },
        );
        open.send_request("x", "y").await.unwrap();
        assert_eq!(open.list_incoming_requests("y").await.unwrap(), vec!["x"]);
    }
}
