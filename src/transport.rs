//! Transport seam between the protocol state machines and a CoAP binding
//!
//! Every request method returns immediately with a [`RequestId`]. The outcome
//! arrives later, exactly once, as a [`Completion`] yielded by
//! [`Transport::poll`]. Handlers remember the id of the request they are
//! waiting for and ignore completions that do not match it.

use std::fmt;

use crate::converter::Format;
use crate::error::Result;

/// An open session to one server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

/// Correlates a request with its completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

/// Register parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterRequest {
    pub endpoint: String,
    /// Seconds
    pub lifetime: u32,
    pub version: String,
    pub binding: String,
    pub queue_mode: bool,
    /// CoRE link format object list
    pub object_list: String,
}

/// Update parameters; `None` means unchanged since the last send
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateRequest {
    pub lifetime: Option<u32>,
    pub binding: Option<String>,
    pub object_list: Option<String>,
}

impl UpdateRequest {
    pub fn is_empty(&self) -> bool {
        self.lifetime.is_none() && self.binding.is_none() && self.object_list.is_none()
    }
}

/// Bootstrap-Request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapRequest {
    pub endpoint: String,
    pub preferred_format: Option<Format>,
}

/// Successful response data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    /// Location path assigned by a Register response
    pub location: Option<String>,
    pub format: Option<Format>,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn with_location<S: Into<String>>(location: S) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }
}

/// The outcome of one request; timeouts are reported as `Error::Timeout`
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub request: RequestId,
    pub result: Result<Response>,
}

/// Client-side transport operations
pub trait Transport {
    fn create_session(&mut self, uri: &str) -> Result<SessionId>;

    fn delete_session(&mut self, session: SessionId);

    fn bootstrap_request(&mut self, session: SessionId, request: &BootstrapRequest) -> Result<RequestId>;

    fn registration_request(&mut self, session: SessionId, request: &RegisterRequest) -> Result<RequestId>;

    fn registration_update(
        &mut self,
        session: SessionId,
        location: &str,
        request: &UpdateRequest,
    ) -> Result<RequestId>;

    fn deregistration_request(&mut self, session: SessionId, location: &str) -> Result<RequestId>;

    /// LWM2M Send
    fn device_send(&mut self, session: SessionId, format: Format, payload: &[u8]) -> Result<RequestId>;

    /// Information Reporting notification
    fn reporting_notify(&mut self, session: SessionId, format: Format, payload: &[u8]) -> Result<RequestId>;

    /// Completions that arrived since the last poll
    fn poll(&mut self) -> Vec<Completion>;
}
