//! Shared types for the brokerage TCP server.
//!
//! This module defines:
//! - `ClientId`: a lightweight handle for connected clients
//! - the outbound reply channel for each client
//! - `ClientRegistry`: who is connected right now, bounded by
//!   `max_clients`

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use broker_protocol::Reply;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

/// Identifier for a connected client, unique for the lifetime of the
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replies queued for a given client's writer task.
pub type OutboundTx = mpsc::UnboundedSender<Reply>;
pub type OutboundRx = mpsc::UnboundedReceiver<Reply>;

#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub peer_addr: SocketAddr,
}

/// Registry of connected clients.
pub type ClientRegistry = Arc<RwLock<HashMap<ClientId, ClientHandle>>>;
