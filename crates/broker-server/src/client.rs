// crates/broker-server/src/client.rs

use std::sync::Arc;

use anyhow::Result;
use broker_core::Brokerage;
use broker_protocol::{format_reply, Reply};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::dispatch;
use crate::types::{ClientId, OutboundRx, OutboundTx};

/// Run the I/O loop for a single connection.
///
/// Lines are dispatched one at a time, so a client always sees its
/// replies in request order. Other clients proceed concurrently.
pub async fn run_client(
    client_id: ClientId,
    stream: TcpStream,
    brokerage: Arc<Brokerage>,
    out_tx: OutboundTx,
    out_rx: OutboundRx,
) -> Result<()> {
    let (read_stream, write_stream) = stream.into_split();

    let writer = tokio::spawn(run_writer(client_id, write_stream, out_rx));

    let result = run_reader(client_id, read_stream, &brokerage, &out_tx).await;

    // Let the writer drain what is already queued.
    drop(out_tx);
    if let Err(e) = writer.await {
        warn!(client = %client_id, error = %e, "writer task failed");
    }

    result
}

async fn run_reader(
    client_id: ClientId,
    read_stream: tokio::net::tcp::OwnedReadHalf,
    brokerage: &Brokerage,
    out_tx: &OutboundTx,
) -> Result<()> {
    let mut lines = BufReader::new(read_stream).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(client = %client_id, line, "request");

        for reply in dispatch::handle_line(brokerage, line).await {
            if out_tx.send(reply).is_err() {
                // Writer is gone; the connection is dead.
                return Ok(());
            }
        }
    }

    Ok(())
}

async fn run_writer(client_id: ClientId, mut write_stream: OwnedWriteHalf, mut out_rx: OutboundRx) {
    while let Some(reply) = out_rx.recv().await {
        if let Err(e) = write_reply(&mut write_stream, &reply).await {
            warn!(client = %client_id, error = %e, "write failed");
            break;
        }
    }
}

async fn write_reply(stream: &mut OwnedWriteHalf, reply: &Reply) -> Result<()> {
    let line = format_reply(reply);
    let data = format!("{}\n", line);

    stream.write_all(data.as_bytes()).await?;
    stream.flush().await?;

    debug!(reply = %line, "sent");
    Ok(())
}
