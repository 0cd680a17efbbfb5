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
use http::{HeaderMap, StatusCode};

/// Represents a response from the service.
///
/// A response consists of the status code, the headers, and the full body.
/// The transports return a response for every status code, use
/// [error_for_status][Response::error_for_status] to turn unsuccessful
/// responses into errors.
///
/// # Examples
/// Creating a response for mocks
///
/// ```
/// # use stratus_gax::transport::Response;
/// let response = Response::new(http::StatusCode::OK)
///     .with_body(r#"{"availability": "available"}"#);
/// assert!(response.status().is_success());
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Creates a response with empty headers and body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Replaces the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Replaces the body.
    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consumes the response returning the status, headers, and body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::deser)
    }

    /// Returns the response if the status is successful, or an HTTP error
    /// carrying the status, headers and body otherwise.
    ///
    /// ```
    /// # use stratus_gax::transport::Response;
    /// let error = Response::new(http::StatusCode::NOT_FOUND)
    ///     .error_for_status()
    ///     .unwrap_err();
    /// assert!(error.is_not_found());
    /// ```
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }
        Err(Error::from(self))
    }
}

impl From<Response> for Error {
    fn from(value: Response) -> Self {
        Error::http(value.status.as_u16(), value.headers, value.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Server {
        id: String,
        availability: String,
    }

    #[test]
    fn accessors() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", http::HeaderValue::from_static("abc"));
        let response = Response::new(StatusCode::ACCEPTED)
            .with_headers(headers.clone())
            .with_body("body");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers(), &headers);
        assert_eq!(response.body(), &Bytes::from_static(b"body"));
        let (status, h, body) = response.into_parts();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(h, headers);
        assert_eq!(body, Bytes::from_static(b"body"));
    }

    #[test]
    fn json() -> anyhow::Result<()> {
        let response = Response::new(StatusCode::OK)
            .with_body(r#"{"id": "s-123", "availability": "migrating"}"#);
        let got = response.json::<Server>()?;
        assert_eq!(
            got,
            Server {
                id: "s-123".into(),
                availability: "migrating".into()
            }
        );
        Ok(())
    }

    #[test]
    fn json_error() {
        let response = Response::new(StatusCode::OK).with_body("not json");
        let err = response.json::<Server>().unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
    }

    #[test]
    fn error_for_status() {
        let response = Response::new(StatusCode::NO_CONTENT);
        assert!(response.error_for_status().is_ok());

        let response = Response::new(StatusCode::NOT_FOUND).with_body("gone");
        let err = response.error_for_status().unwrap_err();
        assert!(err.is_not_found(), "{err:?}");
        assert_eq!(err.http_payload(), Some(&Bytes::from_static(b"gone")));

        let response = Response::new(StatusCode::SERVICE_UNAVAILABLE);
        let err = response.error_for_status().unwrap_err();
        assert_eq!(err.http_status_code(), Some(503), "{err:?}");
        assert!(!err.is_network(), "{err:?}");
    }
}
