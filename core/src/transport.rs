//! The seam between the execution engine and whatever moves bytes.
//!
//! # Design
//! A transport is an actor. The engine creates a channel pair with
//! [`channel`], keeps the [`Connection`] end and hands the [`Wire`] end to
//! [`Transport::open`]. From then on the two sides only talk through
//! messages:
//!
//! - transport → engine: [`TransportEvent`]s (`Connected`, `Response`,
//!   `Data`, `End`, `Error`)
//! - engine → transport: body writes, end-of-body, and an abort signal
//!
//! Nothing here is tied to TCP. The default implementation lives in
//! [`crate::tcp`]; tests drive the engine by scripting a `Wire` directly.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Cause;
use crate::http::{RequestHead, ResponseHead};

/// Something that can carry one request/response exchange.
pub trait Transport: Send + Sync + 'static {
    /// Start the exchange described by `head`, reporting progress on `wire`.
    ///
    /// Must not block: implementations spawn their work and return.
    fn open(&self, head: RequestHead, wire: Wire);
}

/// Progress reported by a transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// The connection is up; the engine may now write the body.
    Connected,
    /// Status line and headers arrived.
    Response(ResponseHead),
    /// A chunk of the (possibly compressed) response body.
    Data(Bytes),
    /// The response body is complete.
    End,
    /// The exchange failed.
    Error(Cause),
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Connected => "connected",
            TransportEvent::Response(_) => "response",
            TransportEvent::Data(_) => "data",
            TransportEvent::End => "end",
            TransportEvent::Error(_) => "error",
        }
    }
}

/// Request body traffic from the engine to the transport.
#[derive(Debug)]
pub enum Outbound {
    Write(Bytes),
    End,
}

/// Create a connected engine/transport pair.
pub fn channel() -> (Connection, Wire) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let abort = CancellationToken::new();
    (
        Connection {
            events: event_rx,
            outbound: outbound_tx,
            abort: abort.clone(),
        },
        Wire {
            events: event_tx,
            outbound: outbound_rx,
            abort,
        },
    )
}

/// Engine side of an exchange.
pub struct Connection {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<Outbound>,
    abort: CancellationToken,
}

impl Connection {
    /// Queue a body chunk. Delivery is not awaited; a transport that has
    /// gone away reports that through its events instead.
    pub fn write(&self, chunk: Bytes) {
        let _ = self.outbound.send(Outbound::Write(chunk));
    }

    /// Mark the request body complete.
    pub fn end(&self) {
        let _ = self.outbound.send(Outbound::End);
    }

    /// A handle that aborts this exchange from elsewhere.
    pub fn abort_signal(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Abort the exchange and stop accepting events.
    pub fn abort(&mut self) {
        self.abort.cancel();
        self.events.close();
    }

    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

/// Transport side of an exchange.
pub struct Wire {
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    abort: CancellationToken,
}

impl Wire {
    /// Report an event. Returns `false` once the engine has stopped
    /// listening.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub async fn next_outbound(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Gather body writes until the engine ends the body. Returns `None`
    /// if the engine went away first.
    pub async fn collect_body(&mut self) -> Option<Bytes> {
        let mut body = BytesMut::new();
        loop {
            match self.next_outbound().await? {
                Outbound::Write(chunk) => body.extend_from_slice(&chunk),
                Outbound::End => return Some(body.freeze()),
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Token that is cancelled when the engine aborts the exchange.
    pub fn abort_signal(&self) -> CancellationToken {
        self.abort.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn body_writes_are_collected_until_end() {
        let (conn, mut wire) = channel();
        conn.write(Bytes::from_static(b"hello "));
        conn.write(Bytes::from_static(b"world"));
        conn.end();
        assert_eq!(&wire.collect_body().await.unwrap()[..], b"hello world");
    }

    #[tokio::test]
    async fn collect_body_stops_when_engine_is_gone() {
        let (conn, mut wire) = channel();
        conn.write(Bytes::from_static(b"partial"));
        drop(conn);
        assert!(wire.collect_body().await.is_none());
    }

    #[tokio::test]
    async fn abort_cancels_and_closes_events() {
        let (mut conn, wire) = channel();
        assert!(wire.emit(TransportEvent::Connected));
        conn.abort();
        assert!(wire.is_aborted());
        assert!(!wire.emit(TransportEvent::End));
        // events queued before the abort are still drained
        assert!(matches!(conn.next_event().await, Some(TransportEvent::Connected)));
        assert!(conn.next_event().await.is_none());
    }
}
