//! Connection driver: the only task that touches a connection's raw socket.
//!
//! One loop per connection: obtain a socket (accepted or dialed), mark the
//! connection open, then alternate between draining the outbound queue and
//! reacting to one event (inbound frame, wake-up, ping tick, idle deadline).
//! When the socket is lost, a client with reconnect enabled dials a brand-new
//! socket after a backoff delay; everyone else closes.

use std::sync::Arc;

use bytes::Bytes;
use tokio::time::{interval_at, sleep, sleep_until, timeout, Duration, Instant, Interval, MissedTickBehavior};

use qws_core::protocol::decode;
use qws_core::{Payload, QwsError, Result};

use super::handle::{Link, Shared};
use super::state::{CloseReason, Role};
use crate::transport::{Dialer, RawFrame, RawSocket};

enum SessionEnd {
    /// `close()` was called; run the closing handshake.
    CloseRequested,
    /// `close()` was called but a write stayed stuck past the close grace.
    Abandoned,
    /// The socket went away on its own.
    Lost(CloseReason),
}

pub(crate) async fn run(shared: Arc<Shared>, link: Link) {
    let (mut next, dialer) = match link {
        Link::Accepted(socket) => (Some(socket), None),
        Link::Dial(dialer) => (None, Some(dialer)),
    };
    let mut reconnecting = false;

    loop {
        let mut socket = match next.take() {
            Some(socket) => socket,
            None => {
                let Some(dialer) = dialer.as_ref() else { break };
                match dial(&shared, &**dialer, reconnecting).await {
                    Some(socket) => socket,
                    None => break,
                }
            }
        };

        if !shared.mark_open() {
            close_socket(&shared, socket.as_mut()).await;
            break;
        }
        tracing::info!(reconnect = reconnecting, "connection open");
        shared.callbacks.fire_connect();

        match session(&shared, socket.as_mut()).await {
            SessionEnd::CloseRequested => {
                close_socket(&shared, socket.as_mut()).await;
                tracing::info!("connection closed");
                break;
            }
            SessionEnd::Abandoned => {
                tracing::warn!("write stalled past close grace; dropping socket");
                break;
            }
            SessionEnd::Lost(reason) => {
                drop(socket);
                if shared.role == Role::Client && shared.opts.reconnect.enabled {
                    if !shared.mark_reconnecting() {
                        break;
                    }
                    tracing::info!(%reason, "connection lost; reconnecting");
                    reconnecting = true;
                    continue;
                }
                tracing::info!(%reason, "connection closed");
                shared.mark_closed(reason);
                break;
            }
        }
    }

    shared.finish();
}

/// Dial until a socket opens or the connection is closed. The first attempt
/// of a reconnect cycle waits out one backoff delay as well.
async fn dial(shared: &Shared, dialer: &dyn Dialer, mut wait_first: bool) -> Option<Box<dyn RawSocket>> {
    let policy = &shared.opts.reconnect;
    let mut attempt: u32 = 0;

    loop {
        if wait_first {
            let delay = policy.delay(attempt);
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnect backoff");
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shared.wait_closed() => return None,
            }
            attempt = attempt.saturating_add(1);
        }
        wait_first = true;

        if shared.is_closed() {
            return None;
        }

        let res = tokio::select! {
            res = dialer.dial() => res,
            _ = shared.wait_closed() => return None,
        };

        match res {
            Ok(socket) => return Some(socket),
            Err(e) if shared.role == Role::Client && policy.enabled => {
                tracing::debug!(attempt, error = %e, "dial failed");
                if !shared.mark_reconnecting() {
                    return None;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "dial failed; reconnect disabled");
                shared.mark_closed(CloseReason::DialFailure(e.to_string()));
                return None;
            }
        }
    }
}

async fn session(shared: &Shared, socket: &mut dyn RawSocket) -> SessionEnd {
    let mut ping = shared.opts.ping_interval.map(|every| {
        let mut i = interval_at(Instant::now() + every, every);
        i.set_missed_tick_behavior(MissedTickBehavior::Delay);
        i
    });
    let idle = shared.opts.idle_timeout;
    let mut last_seen = Instant::now();

    loop {
        let flushed = tokio::select! {
            res = flush(shared, socket) => res,
            _ = closed_past_grace(shared) => return SessionEnd::Abandoned,
        };
        if let Err(e) = flushed {
            tracing::debug!(error = %e, "write failed");
            return SessionEnd::Lost(CloseReason::PeerClosed);
        }
        if shared.is_closed() {
            return SessionEnd::CloseRequested;
        }

        tokio::select! {
            _ = shared.wake.notified() => {}

            incoming = socket.recv() => {
                let frame = match incoming {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "read failed");
                        return SessionEnd::Lost(CloseReason::PeerClosed);
                    }
                    None => return SessionEnd::Lost(CloseReason::PeerClosed),
                };
                last_seen = Instant::now();

                match frame {
                    RawFrame::Binary(b) => dispatch(shared, b),
                    RawFrame::Text(s) => dispatch(shared, Bytes::from(s)),
                    RawFrame::Ping(_) | RawFrame::Pong(_) => {}
                    RawFrame::Close => {
                        // flush the transport's close reply
                        let _ = timeout(shared.opts.close_grace, socket.close()).await;
                        return SessionEnd::Lost(CloseReason::PeerClosed);
                    }
                }
            }

            _ = tick(ping.as_mut()) => {
                let sent = tokio::select! {
                    res = socket.send(RawFrame::Ping(Bytes::new())) => res,
                    _ = closed_past_grace(shared) => return SessionEnd::Abandoned,
                };
                if sent.is_err() {
                    return SessionEnd::Lost(CloseReason::PeerClosed);
                }
            }

            _ = idle_deadline(idle, last_seen) => {
                tracing::warn!("idle timeout");
                return SessionEnd::Lost(CloseReason::IdleTimeout);
            }
        }
    }
}

/// Write queued frames in order. A frame leaves the queue only after the
/// socket accepted it, so a failed write is retried on the next socket.
async fn flush(shared: &Shared, socket: &mut dyn RawSocket) -> Result<()> {
    while let Some((seq, frame)) = shared.front() {
        socket.send(RawFrame::Binary(frame)).await?;
        shared.pop_if(seq);
    }
    Ok(())
}

fn dispatch(shared: &Shared, frame: Bytes) {
    match decode(frame) {
        Ok(env) => match &env.payload {
            Payload::Structured(v) => shared.callbacks.fire_structured(v, &env.headers),
            Payload::Binary(b) => shared.callbacks.fire_binary(b, &env.headers),
        },
        Err(e) => {
            tracing::warn!(code = e.code().as_str(), error = %e, "dropping malformed frame");
            shared.callbacks.fire_error(&e);
        }
    }
}

/// Closing handshake: send our close frame, then read until the peer
/// confirms. Both halves share one `close_grace` budget.
async fn close_socket(shared: &Shared, socket: &mut dyn RawSocket) {
    let handshake = async {
        socket.close().await?;
        loop {
            match socket.recv().await {
                Some(Ok(RawFrame::Close)) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
        Ok::<(), QwsError>(())
    };

    match timeout(shared.opts.close_grace, handshake).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "close frame not sent"),
        Err(_) => tracing::warn!("peer did not confirm close; dropping socket"),
    }
}

/// Resolves once the connection has been closed for longer than
/// `close_grace`. Bounds writes that race a close request.
async fn closed_past_grace(shared: &Shared) {
    shared.wait_closed().await;
    sleep(shared.opts.close_grace).await;
}

async fn tick(ping: Option<&mut Interval>) {
    match ping {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn idle_deadline(idle: Option<Duration>, last_seen: Instant) {
    match idle {
        Some(t) => sleep_until(last_seen + t).await,
        None => std::future::pending().await,
    }
}
