//! Entry point for building requests.
//!
//! # Design
//! `Client` holds only a transport and a `ClientConfig`, and carries no
//! mutable state between requests. Each builder method returns a fresh
//! `Request` pre-populated with the configured defaults; the request owns
//! its execution from there on.

use std::sync::Arc;

use http::header::USER_AGENT;

use crate::config::ClientConfig;
use crate::http::Method;
use crate::request::Request;
use crate::tcp::TcpTransport;
use crate::transport::Transport;

#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// A client over the default transport, configured from the
    /// environment (see [`ClientConfig::from_env`]).
    pub fn new() -> Self {
        Self::with_config(ClientConfig::from_env())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(TcpTransport))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn request(&self, method: Method, url: &str) -> Request {
        let mut request = Request::with_transport(Arc::clone(&self.transport));
        request.timeout(self.config.timeout_ms);
        if let Some(agent) = &self.config.user_agent {
            request.set(USER_AGENT.as_str(), agent);
        }
        for (name, value) in &self.config.headers {
            request.set(name, value);
        }
        request.method(method).url(url);
        request
    }

    pub fn get(&self, url: &str) -> Request {
        self.request(Method::Get, url)
    }

    pub fn post(&self, url: &str) -> Request {
        self.request(Method::Post, url)
    }

    pub fn put(&self, url: &str) -> Request {
        self.request(Method::Put, url)
    }

    pub fn patch(&self, url: &str) -> Request {
        self.request(Method::Patch, url)
    }

    pub fn delete(&self, url: &str) -> Request {
        self.request(Method::Delete, url)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish()
    }
}

/// `GET url` with a default client. The free functions read the
/// environment each time they are called, like [`Client::new`].
pub fn get(url: &str) -> Request {
    Client::new().get(url)
}

pub fn post(url: &str) -> Request {
    Client::new().post(url)
}

pub fn put(url: &str) -> Request {
    Client::new().put(url)
}

pub fn patch(url: &str) -> Request {
    Client::new().patch(url)
}

pub fn delete(url: &str) -> Request {
    Client::new().delete(url)
}
