//! Fluent, promise-style HTTP requests.
//!
//! # Overview
//! A [`Request`] is configured through chained setters, then awaited. The
//! first await dispatches it; later awaits observe the same execution. The
//! result settles exactly once, whichever of success, transport error,
//! malformed response or timeout happens first.
//!
//! ```no_run
//! # async fn demo() -> Result<(), fluent_request::RequestError> {
//! let mut req = fluent_request::post("http://localhost:3000/foo");
//! req.set("x-eggs", "spam")
//!     .query("q", "rust")
//!     .send(serde_json::json!({"hello": "world"}))
//!     .timeout(1000);
//! let response = (&req).await?;
//! println!("{} {:?}", response.status(), response.body());
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - [`Request`] builds an immutable [`RequestSnapshot`] at dispatch.
//! - The engine drives a [`transport::Connection`] and settles an
//!   [`Outcome`]; all racing sources share one single-assignment slot.
//! - Transports are actors behind the [`Transport`] trait. [`TcpTransport`]
//!   speaks HTTP/1.1 over plain TCP; tests script events directly.
//! - Gzip responses are inflated while streaming; JSON bodies are parsed
//!   opportunistically unless binary mode is on.

pub mod body;
pub mod client;
pub mod config;
pub mod decode;
mod engine;
pub mod error;
pub mod http;
pub mod outcome;
pub mod request;
pub mod response;
pub mod tcp;
pub mod transport;

pub use body::Body;
pub use client::{delete, get, patch, post, put, Client};
pub use config::ClientConfig;
pub use error::{Cause, ErrorKind, RequestError};
pub use self::http::{Method, RequestHead, ResponseHead, Target};
pub use outcome::{Inspection, Outcome};
pub use request::{QueryParams, QueryValue, Request, RequestSnapshot};
pub use response::{Response, ResponseBody};
pub use tcp::TcpTransport;
pub use transport::{Transport, TransportEvent, Wire};
