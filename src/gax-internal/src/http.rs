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

use gax::Result;
use gax::error::Error;
use gax::transport::{Body, Request, Response, Transport};
use http::HeaderMap;
use std::time::Duration;

/// The error type for [ReqwestTransport] creation.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum BuilderError {
    #[error("the endpoint ({0}) must be an absolute http:// or https:// URL")]
    InvalidEndpoint(String),
    #[error("cannot create the HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Clone, Debug)]
pub struct ReqwestTransportBuilder {
    endpoint: String,
    connect_timeout: Option<Duration>,
}

impl ReqwestTransportBuilder {
    pub fn new<E: Into<String>>(endpoint: E) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: None,
        }
    }

    pub fn with_connect_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.connect_timeout = Some(v.into());
        self
    }

    pub fn build(self) -> std::result::Result<ReqwestTransport, BuilderError> {
        let uri = self
            .endpoint
            .parse::<http::Uri>()
            .map_err(|_| BuilderError::InvalidEndpoint(self.endpoint.clone()))?;
        match uri.scheme_str() {
            Some("http") | Some("https") if uri.host().is_some() => {}
            _ => return Err(BuilderError::InvalidEndpoint(self.endpoint)),
        }
        let builder = self
            .connect_timeout
            .into_iter()
            .fold(reqwest::Client::builder(), |b, t| b.connect_timeout(t));
        let inner = builder.build().map_err(BuilderError::Client)?;
        Ok(ReqwestTransport {
            inner,
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

/// The raw call primitive, making HTTP requests with `reqwest`.
///
/// Relative request URLs are joined to the endpoint. Every response is returned
/// as `Ok(Response)`, regardless of its status code.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
    endpoint: String,
}

impl ReqwestTransport {
    pub fn new<E: Into<String>>(endpoint: E) -> std::result::Result<Self, BuilderError> {
        ReqwestTransportBuilder::new(endpoint).build()
    }

    pub fn builder<E: Into<String>>(endpoint: E) -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new(endpoint)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match url.strip_prefix('/') {
            Some(path) => format!("{}/{path}", self.endpoint),
            None => format!("{}/{url}", self.endpoint),
        }
    }

    fn map_send_error(err: reqwest::Error) -> Error {
        match err {
            e if e.is_timeout() => Error::timeout(e),
            e if e.is_connect() => Error::io(e),
            e => Error::transport(HeaderMap::new(), e),
        }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let url = self.url(request.url());
        let method = request.method().clone();
        let mut builder = self
            .inner
            .request(method.clone(), &url)
            .headers(request.headers().clone());
        if let Some(deadline) = request.deadline() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(Error::timeout("the request deadline expired before sending"));
            }
            builder = builder.timeout(remaining);
        }
        builder = match request.into_body() {
            Body::Empty => builder,
            Body::Bytes(b) => builder.body(b),
            Body::Stream(s) => builder.body(reqwest::Body::wrap_stream(s)),
        };
        let response = builder.send().await.map_err(Self::map_send_error)?;
        tracing::debug!(%method, url = %url, status = %response.status(), "received response");
        to_response(response).await
    }
}

async fn to_response(response: reqwest::Response) -> Result<Response> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            return Error::timeout(e);
        }
        Error::transport(headers.clone(), e)
    })?;
    Ok(Response::new(status).with_headers(headers).with_body(body))
}
