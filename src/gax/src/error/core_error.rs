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

use http::HeaderMap;
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by all client libraries.
///
/// The client libraries report errors from multiple sources. For example, the
/// service may return an error, the transport may be unable to create the
/// necessary connection to make a request, the retry loop may give up, or the
/// resource being waited on may enter a failed state.
///
/// Most applications will just return the error or log it, without any further
/// action. However, some applications may need to interrogate the error
/// details. This type offers a series of predicates to determine the error
/// kind. The type also offers accessors to query the most common error details.
/// Applications can query the error [source][std::error::Error::source] for
/// deeper information.
///
/// # Example
/// ```
/// use stratus_gax::error::Error;
/// match example_function() {
///     Err(e) if e.is_not_found() => { println!("no such thing {e}"); },
///     Err(e) if e.is_timeout() => { println!("not enough time {e}"); },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # Err(Error::http(404, http::HeaderMap::new(), bytes::Bytes::from_static(b"NOT FOUND")))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error representing a timeout.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use stratus_gax::error::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            source: Some(source.into()),
        }
    }

    /// The operation could not be completed before its deadline.
    ///
    /// This is always a client-side generated error. It is returned when a
    /// request deadline expires in the retry loop, and when a polling loop or
    /// a waiter does not observe the desired state in time. In the latter case
    /// the resource may still reach the desired state later, and it is often
    /// reasonable to wait again.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Creates an error representing an exhausted policy.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use stratus_gax::error::Error;
    /// let error = Error::exhausted("too many retry attempts");
    /// assert!(error.is_exhausted());
    /// assert!(error.source().is_some());
    /// ```
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            source: Some(source.into()),
        }
    }

    /// The request could not complete before the retry policy expired.
    ///
    /// This is always a client-side generated error, but it may be the result
    /// of multiple errors received from the service. The
    /// [source][std::error::Error::source] is the last error observed.
    ///
    /// # Troubleshooting
    ///
    /// The most common cause of this problem is a transient problem that lasts
    /// longer than your retry policy. Consider more attempts or a longer
    /// maximum backoff if your application can tolerate the latency.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing a cancelled request.
    ///
    /// # Example
    /// ```
    /// use stratus_gax::error::Error;
    /// let error = Error::cancelled("the caller gave up");
    /// assert!(error.is_cancelled());
    /// ```
    pub fn cancelled<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            source: Some(source.into()),
        }
    }

    /// The caller cancelled the request before it completed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Creates an error representing a resource in a failed state.
    ///
    /// # Example
    /// ```
    /// use stratus_gax::error::Error;
    /// let error = Error::resource_failed("availability is failed");
    /// assert!(error.is_resource_failed());
    /// ```
    pub fn resource_failed<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::ResourceFailed,
            source: Some(source.into()),
        }
    }

    /// The resource reported a terminal failure while waiting for it.
    ///
    /// The service will not recover the resource on its own, waiting longer
    /// does not help.
    pub fn is_resource_failed(&self) -> bool {
        matches!(self.kind, ErrorKind::ResourceFailed)
    }

    /// Creates an error representing an unexpected resource state.
    ///
    /// # Example
    /// ```
    /// use stratus_gax::error::Error;
    /// let error = Error::unrecognized_state("availability is discontinued");
    /// assert!(error.is_unrecognized_state());
    /// ```
    pub fn unrecognized_state<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::UnrecognizedState,
            source: Some(source.into()),
        }
    }

    /// The resource reported a state that is neither a target nor a pending
    /// state for the wait.
    ///
    /// # Troubleshooting
    ///
    /// Either the wait configuration is incomplete, or the service introduced
    /// a new state. Review the target and pending states in the waiter
    /// configuration.
    pub fn is_unrecognized_state(&self) -> bool {
        matches!(self.kind, ErrorKind::UnrecognizedState)
    }

    /// Creates an error representing a deserialization problem.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use stratus_gax::error::Error;
    /// let error = Error::deser("simulated problem");
    /// assert!(error.is_deserialization());
    /// assert!(error.source().is_some());
    /// ```
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Deserialization,
            source: Some(source.into()),
        }
    }

    /// The response could not be deserialized.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// Creates an error representing a serialization problem.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use stratus_gax::error::Error;
    /// let error = Error::ser("simulated problem");
    /// assert!(error.is_serialization());
    /// assert!(error.source().is_some());
    /// ```
    pub fn ser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Serialization,
            source: Some(source.into()),
        }
    }

    /// The request could not be serialized.
    ///
    /// This error is never transient: the serialization is deterministic and
    /// will fail on future attempts with the same input data.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }

    /// The HTTP status code, if any, associated with this error.
    ///
    /// # Example
    /// ```
    /// use stratus_gax::error::Error;
    /// let e = search_for_thing("the thing");
    /// if let Some(code) = e.http_status_code() {
    ///     if code == 404 {
    ///         println!("cannot find the thing, more details in {e}");
    ///     }
    /// }
    ///
    /// fn search_for_thing(name: &str) -> Error {
    ///     # Error::http(404, http::HeaderMap::new(), bytes::Bytes::from_static(b"NOT FOUND"))
    /// }
    /// ```
    pub fn http_status_code(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Transport(d) => d.as_ref().status_code,
            _ => None,
        }
    }

    /// The headers, if any, associated with this error.
    pub fn http_headers(&self) -> Option<&http::HeaderMap> {
        match &self.kind {
            ErrorKind::Transport(d) => d.as_ref().headers.as_ref(),
            _ => None,
        }
    }

    /// The payload, if any, associated with this error.
    pub fn http_payload(&self) -> Option<&bytes::Bytes> {
        match &self.kind {
            ErrorKind::Transport(d) => d.payload.as_ref(),
            _ => None,
        }
    }

    /// The service reports that the resource does not exist.
    ///
    /// Right after a resource is created the service may report it as missing
    /// for a short time. Waiters tolerate a bounded number of these errors.
    ///
    /// # Example
    /// ```
    /// use stratus_gax::error::Error;
    /// let e = Error::http(404, http::HeaderMap::new(), bytes::Bytes::from_static(b"NOT FOUND"));
    /// assert!(e.is_not_found());
    /// ```
    pub fn is_not_found(&self) -> bool {
        self.http_status_code() == Some(http::StatusCode::NOT_FOUND.as_u16())
    }

    /// A complete HTTP response with an error status.
    pub fn http(status_code: u16, headers: HeaderMap, payload: bytes::Bytes) -> Self {
        let details = TransportDetails {
            status_code: Some(status_code),
            headers: Some(headers),
            payload: Some(payload),
        };
        let kind = ErrorKind::Transport(Box::new(details));
        Self { kind, source: None }
    }

    /// A problem in the transport layer without any HTTP response.
    ///
    /// Examples include: failing to resolve the endpoint, or failing to open
    /// a connection.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        let details = TransportDetails {
            status_code: None,
            headers: None,
            payload: None,
        };
        Self {
            kind: ErrorKind::Transport(Box::new(details)),
            source: Some(source.into()),
        }
    }

    /// A problem in the transport layer without a full HTTP response.
    ///
    /// # Troubleshooting
    ///
    /// This indicates a problem completing the request, such as a broken
    /// connection or a restart in a proxy or load balancer. Most often these
    /// problems are transient and the retry loop handles them.
    pub fn is_io(&self) -> bool {
        matches!(
        &self.kind,
        ErrorKind::Transport(d) if matches!(**d, TransportDetails {
            status_code: None,
            headers: None,
            payload: None,
        }))
    }

    /// A problem reported by the transport layer after the response headers
    /// are received.
    pub fn transport<T: Into<BoxError>>(headers: HeaderMap, source: T) -> Self {
        let details = TransportDetails {
            headers: Some(headers),
            status_code: None,
            payload: None,
        };
        Self {
            kind: ErrorKind::Transport(Box::new(details)),
            source: Some(source.into()),
        }
    }

    /// A problem in the transport layer, including HTTP error responses.
    pub fn is_transport(&self) -> bool {
        matches!(&self.kind, ErrorKind::Transport { .. })
    }

    /// The request failed before any HTTP status was received.
    ///
    /// These are the connection-level failures the retry loop treats as
    /// transient.
    pub fn is_network(&self) -> bool {
        self.is_transport() && self.http_status_code().is_none()
    }

    /// An uncategorized problem.
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Other,
            source: Some(source.into()),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Serialization, Some(e)) => write!(f, "cannot serialize the request {e}"),
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response {e}")
            }
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the operation exceeded its deadline {e}")
            }
            (ErrorKind::Exhausted, Some(e)) => {
                write!(f, "the retry policy is exhausted, last error: {e}")
            }
            (ErrorKind::Cancelled, Some(e)) => write!(f, "the request was cancelled {e}"),
            (ErrorKind::ResourceFailed, Some(e)) => {
                write!(f, "the resource entered a failed state: {e}")
            }
            (ErrorKind::UnrecognizedState, Some(e)) => {
                write!(f, "the resource entered an unrecognized state: {e}")
            }
            (ErrorKind::Transport(details), _) => details.display(self.source(), f),
            (ErrorKind::Other, Some(e)) => {
                write!(f, "an unclassified problem making a request: {e}")
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error))
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Serialization,
    Deserialization,
    Timeout,
    Exhausted,
    Cancelled,
    ResourceFailed,
    UnrecognizedState,
    Transport(Box<TransportDetails>),
    /// A uncategorized error.
    Other,
}

#[derive(Debug)]
struct TransportDetails {
    status_code: Option<u16>,
    headers: Option<HeaderMap>,
    payload: Option<bytes::Bytes>,
}

impl TransportDetails {
    fn display(
        &self,
        source: Option<&(dyn StdError + 'static)>,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match (source, &self) {
            (
                _,
                TransportDetails {
                    status_code: Some(code),
                    payload: Some(p),
                    ..
                },
            ) => {
                if let Ok(message) = std::str::from_utf8(p.as_ref()) {
                    write!(f, "the HTTP transport reports a [{code}] error: {message}")
                } else {
                    write!(f, "the HTTP transport reports a [{code}] error: {p:?}")
                }
            }
            (Some(source), _) => {
                write!(f, "the transport reports an error: {source}")
            }
            (None, _) => unreachable!("no Error constructor allows this"),
        }
    }
}
