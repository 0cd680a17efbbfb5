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

//! These tests verify the reqwest-based transport against a local HTTP
//! server, both on its own and decorated with the retrying and rate-limiting
//! transports.

#[cfg(test)]
mod tests {
    use gax::transport::*;
    use gaxi::http::ReqwestTransport;
    use http::{Method, StatusCode};
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use serde_json::json;
    use std::time::Duration;
    use stratus_gax_internal as gaxi;

    type Result<T> = anyhow::Result<T>;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn success() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/v1/servers/s-1"),
                request::headers(contains(("x-request-id", "abc"))),
            ])
            .respond_with(json_encoded(json!({"id": "s-1", "availability": "available"}))),
        );
        let transport = ReqwestTransport::new(format!("http://{}", server.addr()))?;
        let request = Request::new(Method::GET, "/v1/servers/s-1").with_header(
            http::header::HeaderName::from_static("x-request-id"),
            http::HeaderValue::from_static("abc"),
        );
        let response = transport.send(request).await?.error_for_status()?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.json::<serde_json::Value>()?;
        assert_eq!(body, json!({"id": "s-1", "availability": "available"}));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn json_body() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/v1/servers"),
                request::body(json_decoded(eq(json!({"name": "web-1"})))),
            ])
            .respond_with(status_code(202)),
        );
        let transport = ReqwestTransport::new(format!("http://{}", server.addr()))?;
        let request = Request::json(Method::POST, "/v1/servers", &json!({"name": "web-1"}))?;
        let response = transport.send(request).await?;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stream_body() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", "/v1/images/i-1"),
                request::body(matches("^chunk-1chunk-2$")),
            ])
            .respond_with(status_code(200)),
        );
        let transport = ReqwestTransport::new(format!("http://{}", server.addr()))?;
        let chunks = futures::stream::iter([
            Ok(bytes::Bytes::from_static(b"chunk-1")),
            Ok(bytes::Bytes::from_static(b"chunk-2")),
        ]);
        let request = Request::new(Method::PUT, "/v1/images/i-1").with_body(Body::from_stream(chunks));
        let response = transport.send(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn error_status_is_a_response() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/servers/missing"))
                .respond_with(status_code(404).body("not found")),
        );
        let transport = ReqwestTransport::new(format!("http://{}", server.addr()))?;
        let response = transport
            .send(Request::new(Method::GET, "/v1/servers/missing"))
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let err = response.error_for_status().unwrap_err();
        assert!(err.is_not_found(), "{err:?}");
        assert_eq!(
            err.http_payload(),
            Some(&bytes::Bytes::from_static(b"not found"))
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connection_refused() -> Result<()> {
        let endpoint = {
            let server = Server::run();
            format!("http://{}", server.addr())
        };
        let transport = ReqwestTransport::new(endpoint)?;
        let err = transport
            .send(Request::new(Method::GET, "/v1/servers"))
            .await
            .unwrap_err();
        assert!(err.is_network(), "{err:?}");
        assert!(err.is_io(), "{err:?}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn deadline() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/slow"))
                .respond_with(delay_and_then(Duration::from_secs(2), status_code(200))),
        );
        let transport = ReqwestTransport::new(format!("http://{}", server.addr()))?;
        let request =
            Request::new(Method::GET, "/v1/slow").with_timeout(Duration::from_millis(100));
        let err = transport.send(request).await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn retry_then_success() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/servers/s-1"))
                .times(3)
                .respond_with(cycle![
                    status_code(503).body("try-again"),
                    status_code(423).body("locked"),
                    json_encoded(json!({"id": "s-1"})),
                ]),
        );
        let transport = ReqwestTransport::new(format!("http://{}", server.addr()))?
            .with_backoff(
                BackoffTransport::builder()
                    .with_max_attempts(5)
                    .with_wait_min(Duration::from_millis(1))
                    .with_wait_max(Duration::from_millis(1)),
            )?
            .with_rate_limit(RateLimitSpec::new(100))?;
        let response = transport
            .send(Request::new(Method::GET, "/v1/servers/s-1"))
            .await?
            .error_for_status()?;
        assert_eq!(response.json::<serde_json::Value>()?, json!({"id": "s-1"}));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn retry_exhausted() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/servers/s-1"))
                .times(3)
                .respond_with(status_code(503).body("try-again")),
        );
        let transport = ReqwestTransport::new(format!("http://{}", server.addr()))?.with_backoff(
            BackoffTransport::builder()
                .with_max_attempts(2)
                .with_wait_min(Duration::from_millis(1))
                .with_wait_max(Duration::from_millis(1)),
        )?;
        let err = transport
            .send(Request::new(Method::GET, "/v1/servers/s-1"))
            .await
            .unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
        Ok(())
    }
}
