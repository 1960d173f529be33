//! Thin wrapper on an HTTP client with the crate's transport defaults.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};

use crate::error::Error;

/// A simple wrapper on an HTTP client for making requests. Sets sensible
/// defaults such as a timeout and user-agent. Uploads carry document photos,
/// so the timeout is generous. Requests are never retried; every retry in
/// the workflow is an explicit user action.
pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
}

impl Request {
    /// Initializes a new `Request` instance.
    pub(crate) fn new() -> Self {
        let client = reqwest::Client::new();
        let timeout = Duration::from_secs(15);
        Self { client, timeout }
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("vendakit-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Creates a GET request builder with defaults applied.
    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.req(Method::GET, url)
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    /// Sends a request built by `req`/`get`/`post`. Transport failures (DNS,
    /// refused connections, timeouts) map to [`Error::Network`]; any HTTP
    /// response, including non-2xx, is returned for the caller to interpret.
    pub(crate) async fn send(
        &self,
        url: &str,
        request_builder: RequestBuilder,
    ) -> Result<Response, Error> {
        request_builder
            .send()
            .await
            .map_err(|err| Error::Network {
                url: url.to_string(),
                error: err.to_string(),
            })
    }
}
