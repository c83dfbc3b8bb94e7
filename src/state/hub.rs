use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::coordinator::SessionCoordinator;

#[derive(Clone, Debug)]
/// Handle used to push messages to a connected scoreboard peer.
pub struct PeerConnection {
    pub id: Uuid,
    pub session_id: String,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Registry of WebSocket peers sharing one session code.
///
/// The first peer to connect allocates the code; when the last one leaves the code is cleared so
/// the next peer starts afresh.
#[derive(Debug)]
pub struct PushHub {
    coordinator: SessionCoordinator,
    peers: DashMap<Uuid, PeerConnection>,
    membership: Mutex<()>,
}

impl PushHub {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            coordinator: SessionCoordinator::new(idle_timeout),
            peers: DashMap::new(),
            membership: Mutex::new(()),
        }
    }

    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    pub fn peers(&self) -> &DashMap<Uuid, PeerConnection> {
        &self.peers
    }

    /// Register a peer and return the session code assigned to it. While other peers are
    /// connected the newcomer gets their code however long the hub was quiet.
    pub fn join(&self, tx: mpsc::UnboundedSender<Message>) -> PeerConnection {
        let _guard = self.membership.lock().unwrap_or_else(PoisonError::into_inner);
        if self.peers.is_empty() {
            self.coordinator.reset();
        }
        let session_id = self.coordinator.keep_or_allocate().id;
        let peer = PeerConnection {
            id: Uuid::new_v4(),
            session_id,
            tx,
        };
        self.peers.insert(peer.id, peer.clone());
        peer
    }

    /// Drop a peer. Returns `true` when it was the last one and the session code was cleared.
    pub fn leave(&self, peer_id: Uuid) -> bool {
        let _guard = self.membership.lock().unwrap_or_else(PoisonError::into_inner);
        self.peers.remove(&peer_id);
        if self.peers.is_empty() {
            self.coordinator.reset();
            return true;
        }
        false
    }

    /// Snapshot of every peer channel, optionally skipping one peer.
    pub fn senders(&self, except: Option<Uuid>) -> Vec<(Uuid, mpsc::UnboundedSender<Message>)> {
        self.peers
            .iter()
            .filter(|entry| Some(*entry.key()) != except)
            .map(|entry| (*entry.key(), entry.tx.clone()))
            .collect()
    }
}
