//! JSON-lines bridge transport.
//!
//! Reads requests line by line and writes responses and events as they
//! become available. Each request runs on its own task so a slow query does
//! not hold back events or other requests; lifecycle calls still serialize on
//! the supervisor lock. When input reaches EOF the engine is stopped and any
//! remaining output is flushed before returning.

use std::io;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use super::dispatcher::Bridge;
use super::protocol::{BridgeEvent, BridgeResponse};

/// Serve the bridge protocol until `reader` reaches EOF.
pub async fn serve<R, W>(bridge: Arc<Bridge>, reader: R, mut writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut events = bridge.attach();
    let (response_tx, mut responses) = mpsc::unbounded_channel::<BridgeResponse>();
    let mut in_flight = JoinSet::new();
    let mut lines = reader.lines();
    info!("Bridge serving");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let bridge = bridge.clone();
                let tx = response_tx.clone();
                in_flight.spawn(async move {
                    let _ = tx.send(bridge.handle_line(&line).await);
                });
            }
            Some(response) = responses.recv() => write_line(&mut writer, &response).await?,
            Some(event) = events.recv() => {
                write_line(&mut writer, &BridgeEvent::from(&event)).await?;
            }
            Some(_) = in_flight.join_next() => {}
        }
    }

    debug!("Bridge input closed, waiting for {} requests", in_flight.len());
    while in_flight.join_next().await.is_some() {}

    bridge.shutdown().await;
    bridge.detach();
    drop(response_tx);

    while let Ok(response) = responses.try_recv() {
        write_line(&mut writer, &response).await?;
    }
    while let Ok(event) = events.try_recv() {
        write_line(&mut writer, &BridgeEvent::from(&event)).await?;
    }

    writer.flush().await?;
    info!("Bridge stopped");
    Ok(())
}

async fn write_line<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}
