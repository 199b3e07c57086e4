//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Builds the shared `Brokerage` and registers the bootstrap ADMIN.
//! - Listens on the configured address/port.
//! - Accepts new TCP connections up to `max_clients`.
//! - Assigns each connection a `ClientId` and spawns its task.
//!
//! Per-connection I/O lives in the `client` module, request handling
//! in [`dispatch`](crate::dispatch).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use broker_core::{BrokerError, Brokerage, Role};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::client;
use crate::config::Config;
use crate::types::{ClientHandle, ClientId, ClientRegistry, OutboundRx, OutboundTx};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_client_id() -> ClientId {
    let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    ClientId(id)
}

/// Build the brokerage for `config`, with its ADMIN account in place.
pub fn build_brokerage(config: &Config) -> Result<Brokerage> {
    let brokerage = Brokerage::new(config.broker_config());
    match brokerage.register(&config.admin_user, &config.admin_password, Role::Admin) {
        Ok(id) => info!(admin = %config.admin_user, customer_id = %id, "admin registered"),
        Err(BrokerError::CustomerExists { .. }) => {}
        Err(e) => return Err(e).context("registering admin account"),
    }
    Ok(brokerage)
}

/// Run the TCP server with the given configuration.
pub async fn run(config: Config) -> Result<()> {
    let brokerage = Arc::new(build_brokerage(&config)?);

    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, cash_asset = %brokerage.cash_asset(), "listening");

    serve(listener, brokerage, config.max_clients).await
}

/// Accept loop over an already-bound listener.
pub async fn serve(listener: TcpListener, brokerage: Arc<Brokerage>, max_clients: usize) -> Result<()> {
    let clients: ClientRegistry = Arc::new(tokio::sync::RwLock::new(Default::default()));

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let current_clients = {
            let guard = clients.read().await;
            guard.len()
        };

        if current_clients >= max_clients {
            warn!(%peer_addr, max_clients, "rejecting connection: max_clients reached");
            // Dropping the stream closes it.
            continue;
        }

        let client_id = next_client_id();
        info!(client = %client_id, %peer_addr, "accepted connection");

        let (out_tx, out_rx): (OutboundTx, OutboundRx) = mpsc::unbounded_channel();

        {
            let mut guard = clients.write().await;
            guard.insert(client_id, ClientHandle { peer_addr });
        }

        let session = tokio::spawn(client::run_client(
            client_id,
            stream,
            brokerage.clone(),
            out_tx,
            out_rx,
        ));

        // The slot is freed however the session ends, panics included.
        let clients_clone = clients.clone();
        tokio::spawn(async move {
            let outcome = session.await;
            {
                let mut guard = clients_clone.write().await;
                guard.remove(&client_id);
            }
            match outcome {
                Ok(Ok(())) => info!(client = %client_id, "client disconnected"),
                Ok(Err(e)) => warn!(client = %client_id, error = %e, "client error"),
                Err(e) => error!(client = %client_id, error = %e, "client task aborted"),
            }
        });
    }
}
