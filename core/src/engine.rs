//! Request execution engine.
//!
//! # Design
//! One execution is one spawned task driving a [`Connection`] through
//!
//! ```text
//! Idle -> Connecting -> Sending -> AwaitingResponse -> Streaming -> Settled
//! ```
//!
//! plus, when a timeout is configured, one timer task. Both hold a
//! `Settler` for the same outcome. Whoever settles first wins; the timer
//! then aborts the connection, which also stops the pump. Every
//! event handler checks for settlement before acting, so events that
//! arrive late are ignored.
//!
//! Settlement always disarms the timer (see [`crate::outcome`]).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;
use tracing::{debug, debug_span, trace, Instrument};
use uuid::Uuid;

use crate::decode::BodyDecoder;
use crate::error::{Cause, RequestError};
use crate::http::ResponseHead;
use crate::outcome::{deferred, Outcome, Settler};
use crate::request::RequestSnapshot;
use crate::response::Response;
use crate::transport::{self, Connection, Transport, TransportEvent};

/// Message used when the transport goes away without finishing.
pub(crate) const HANG_UP: &str = "socket hang up";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Connecting,
    Sending,
    AwaitingResponse,
    Streaming,
    Settled,
}

/// Dispatch `snapshot` over `transport` on `runtime` and return its outcome.
pub(crate) fn dispatch(
    runtime: &Handle,
    transport: Arc<dyn Transport>,
    snapshot: Arc<RequestSnapshot>,
) -> Outcome {
    let (outcome, settler) = deferred();
    let (connection, wire) = transport::channel();
    let span = debug_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %snapshot.method(),
        url = %snapshot.display_url()
    );

    let execution = Execution {
        snapshot,
        settler,
        connection,
        phase: Phase::Idle,
        response: None,
    };
    runtime.spawn(execution.run(transport, wire).instrument(span));
    outcome
}

struct Execution {
    snapshot: Arc<RequestSnapshot>,
    settler: Settler,
    connection: Connection,
    phase: Phase,
    response: Option<(ResponseHead, BodyDecoder)>,
}

impl Execution {
    async fn run(mut self, transport: Arc<dyn Transport>, wire: transport::Wire) {
        self.enter(Phase::Connecting);
        self.arm_timeout();
        transport.open(self.snapshot.head(), wire);

        let abort = self.connection.abort_signal();
        loop {
            let event = tokio::select! {
                biased;
                _ = abort.cancelled() => None,
                event = self.connection.next_event() => event,
            };
            let Some(event) = event else {
                break;
            };
            if self.settler.is_settled() {
                trace!(event = event.name(), "ignoring event after settlement");
                break;
            }
            if self.handle(event) {
                break;
            }
        }

        if self.phase != Phase::Settled {
            self.fail(RequestError::transport(HANG_UP, None));
        }
        self.connection.abort();
    }

    fn enter(&mut self, phase: Phase) {
        trace!(from = ?self.phase, to = ?phase, "transition");
        self.phase = phase;
    }

    fn arm_timeout(&self) {
        let timeout_ms = self.snapshot.timeout_ms();
        if timeout_ms == 0 {
            return;
        }
        let settler = self.settler.clone();
        let abort = self.connection.abort_signal();
        let err = RequestError::timeout(
            self.snapshot.method().as_str(),
            &self.snapshot.display_url(),
            timeout_ms,
        )
        .with_request(Arc::clone(&self.snapshot));

        let timer = tokio::spawn(
            async move {
                tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                if settler.settle(Err(err)) {
                    debug!(timeout_ms, "timed out");
                    abort.cancel();
                }
            }
            .in_current_span(),
        );
        self.settler.arm_timer(timer.abort_handle());
    }

    /// Apply one event. Returns `true` once the execution is settled.
    fn handle(&mut self, event: TransportEvent) -> bool {
        match (self.phase, event) {
            (Phase::Connecting, TransportEvent::Connected) => {
                self.enter(Phase::Sending);
                if let Some(body) = self.snapshot.body() {
                    let (bytes, _) = body.encode();
                    self.connection.write(bytes);
                }
                self.connection.end();
                self.enter(Phase::AwaitingResponse);
                false
            }
            (Phase::AwaitingResponse, TransportEvent::Response(head)) => {
                let decoder = BodyDecoder::for_headers(&head.headers);
                trace!(status = ?head.status, gzip = decoder.is_gzip(), "response headers");
                self.response = Some((head, decoder));
                self.enter(Phase::Streaming);
                false
            }
            (Phase::Streaming, TransportEvent::Data(chunk)) => {
                let pushed = match self.response.as_mut() {
                    Some((_, decoder)) => decoder.push(&chunk),
                    None => Ok(()),
                };
                match pushed {
                    Ok(()) => false,
                    Err(err) => self.fail(decompression_failed(err)),
                }
            }
            (Phase::Streaming, TransportEvent::End) => self.complete(),
            (_, TransportEvent::Error(cause)) => self.fail(RequestError::transport(
                format!("request error: {cause}"),
                Some(cause),
            )),
            (phase, event) => self.fail(RequestError::response_processing(
                format!("unexpected {} event while {phase:?}", event.name()),
                None,
            )),
        }
    }

    /// Build the response from the drained stream and classify its status.
    fn complete(&mut self) -> bool {
        let Some((head, decoder)) = self.response.take() else {
            return self.fail(RequestError::response_processing(
                "response ended before its headers",
                None,
            ));
        };
        let raw = match decoder.finish() {
            Ok(raw) => raw,
            Err(err) => return self.fail(decompression_failed(err)),
        };

        let response = Response::assemble(head, raw, self.snapshot.is_binary());
        if response.is_success() {
            self.succeed(response)
        } else {
            self.fail(RequestError::http_status(response))
        }
    }

    fn succeed(&mut self, response: Response) -> bool {
        let status = response.status();
        if self.settler.settle(Ok(response)) {
            debug!(status, "request succeeded");
        }
        self.enter(Phase::Settled);
        true
    }

    fn fail(&mut self, err: RequestError) -> bool {
        // a failure mid-stream still reports the status and headers received
        let err = match self.response.as_ref() {
            Some((head, _)) if err.response().is_none() => {
                let binary = self.snapshot.is_binary();
                let partial = Response::assemble(head.clone(), Bytes::new(), binary);
                err.with_response(partial)
            }
            _ => err,
        };
        let message = err.message().to_string();
        if self.settler.settle(Err(err.with_request(Arc::clone(&self.snapshot)))) {
            debug!(error = %message, "request failed");
        }
        self.enter(Phase::Settled);
        true
    }
}

fn decompression_failed(err: std::io::Error) -> RequestError {
    RequestError::transport(
        format!("response decompression failed: {err}"),
        Some(Cause::from(err)),
    )
}
