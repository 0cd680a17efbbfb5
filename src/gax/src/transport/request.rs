// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::Result;
use crate::error::Error;
use bytes::Bytes;
use futures::Stream;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The body of a [Request].
///
/// Bodies backed by bytes can be replayed any number of times. A streaming
/// body can only be sent once, the retrying transports do not retry requests
/// with such bodies.
#[derive(Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Bytes),
    Stream(Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>),
}

impl Body {
    /// Creates a one-shot body from a stream of chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Returns a copy of the body, or `None` if the body is a stream.
    pub fn try_clone(&self) -> Option<Self> {
        match self {
            Self::Empty => Some(Self::Empty),
            Self::Bytes(b) => Some(Self::Bytes(b.clone())),
            Self::Stream(_) => None,
        }
    }

    /// The body contents, if they are known without consuming a stream.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Empty => Some(&[]),
            Self::Bytes(b) => Some(b.as_ref()),
            Self::Stream(_) => None,
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<&'static str> for Body {
    fn from(value: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(value.as_bytes()))
    }
}

/// An outbound call to the service.
///
/// A request carries the method, URL, headers and body of the call, plus two
/// controls used by the retrying transport: an optional cancellation token and
/// an optional deadline.
///
/// # Example
/// ```
/// # use stratus_gax::transport::Request;
/// # use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// let token = CancellationToken::new();
/// let request = Request::new(http::Method::POST, "/v1/servers/s-123/actions/power-on")
///     .with_body("{}")
///     .with_cancellation(token.clone())
///     .with_timeout(Duration::from_secs(60));
/// assert_eq!(request.method(), &http::Method::POST);
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Body,
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Request {
    /// Creates a request with an empty body.
    ///
    /// The URL may be absolute, or a path relative to the raw transport's
    /// endpoint.
    pub fn new<U: Into<String>>(method: Method, url: U) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Body::Empty,
            cancellation: None,
            deadline: None,
        }
    }

    /// Creates a request with a JSON body.
    pub fn json<U, T>(method: Method, url: U, body: &T) -> Result<Self>
    where
        U: Into<String>,
        T: serde::Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body).map_err(Error::ser)?;
        Ok(Self::new(method, url)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(payload))
    }

    /// Adds (or replaces) a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body.
    pub fn with_body<B: Into<Body>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Stops retrying this request once the token is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Stops retrying this request after `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stops retrying this request `timeout` from now.
    ///
    /// A timeout too large to represent leaves the request without a deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consumes the request, returning its body.
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Returns a copy of the request, or `None` if the body cannot be
    /// replayed.
    pub fn try_clone(&self) -> Option<Self> {
        let body = self.body.try_clone()?;
        Some(Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body,
            cancellation: self.cancellation.clone(),
            deadline: self.deadline,
        })
    }
}
