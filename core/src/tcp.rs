//! Default HTTP/1.1 transport over a plain tokio `TcpStream`.
//!
//! Each `open` spawns one task that connects, performs a single hyper
//! HTTP/1 handshake, sends the request and streams the response back as
//! [`TransportEvent`]s. The task stops as soon as the engine aborts the
//! wire; dropping it closes the socket, so no further bytes are read.
//!
//! Only `http` targets are supported. TLS is left to custom transports.

use bytes::Bytes;
use http::header::HOST;
use http::HeaderValue;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, trace, Instrument};

use crate::error::Cause;
use crate::http::{RequestHead, ResponseHead};
use crate::transport::{Transport, TransportEvent, Wire};

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn open(&self, head: RequestHead, mut wire: Wire) {
        let abort = wire.abort_signal();
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = abort.cancelled() => trace!("exchange aborted"),
                    result = exchange(head, &mut wire) => {
                        if let Err(cause) = result {
                            debug!(%cause, "exchange failed");
                            wire.emit(TransportEvent::Error(cause));
                        }
                    }
                }
            }
            .in_current_span(),
        );
    }
}

/// Aborts the hyper connection task when the exchange is dropped.
struct ConnectionTask(JoinHandle<()>);

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn exchange(head: RequestHead, wire: &mut Wire) -> Result<(), Cause> {
    if head.target.scheme() != "http" {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("unsupported scheme {:?}", head.target.scheme()),
        )
        .into());
    }

    let stream = TcpStream::connect((head.target.connect_host(), head.target.port())).await?;
    stream.set_nodelay(true)?;
    let (mut sender, connection) = http1::handshake(TokioIo::new(stream)).await?;
    let _connection = ConnectionTask(tokio::spawn(
        async move {
            if let Err(err) = connection.await {
                debug!(%err, "connection closed with error");
            }
        }
        .in_current_span(),
    ));

    trace!("connected");
    if !wire.emit(TransportEvent::Connected) {
        return Ok(());
    }
    let Some(body) = wire.collect_body().await else {
        return Ok(());
    };

    let request = build_request(head, body)?;
    let response = sender.send_request(request).await?;
    let (parts, mut incoming) = response.into_parts();
    trace!(status = parts.status.as_u16(), "response head received");
    let head = ResponseHead {
        status: Some(parts.status.as_u16()),
        headers: parts.headers,
    };
    if !wire.emit(TransportEvent::Response(head)) {
        return Ok(());
    }

    while let Some(frame) = incoming.frame().await {
        if let Ok(data) = frame?.into_data() {
            if !wire.emit(TransportEvent::Data(data)) {
                return Ok(());
            }
        }
    }
    wire.emit(TransportEvent::End);
    Ok(())
}

fn build_request(head: RequestHead, body: Bytes) -> Result<http::Request<Full<Bytes>>, Cause> {
    let host = HeaderValue::from_str(&head.target.authority())
        .map_err(|_| Cause::HeaderValue(HOST.to_string()))?;
    let mut request = http::Request::builder()
        .method(http::Method::from(head.method))
        .uri(head.path_and_query)
        .body(Full::new(body))?;
    *request.headers_mut() = head.headers;
    request.headers_mut().entry(HOST).or_insert(host);
    Ok(request)
}
