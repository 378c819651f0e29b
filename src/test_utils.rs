//! Test utilities: a scripted in-memory transport
//!
//! [`MockTransport`] records every request the client sends and completes
//! them only when a test says so, which makes the asynchronous flows of the
//! state machines deterministic.

use std::collections::VecDeque;

use crate::converter::Format;
use crate::error::{Error, Result};
use crate::transport::{
    BootstrapRequest, Completion, RegisterRequest, RequestId, Response, SessionId, Transport,
    UpdateRequest,
};

/// A request captured by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum SentRequest {
    Bootstrap {
        session: SessionId,
        request: BootstrapRequest,
    },
    Register {
        session: SessionId,
        request: RegisterRequest,
    },
    Update {
        session: SessionId,
        location: String,
        request: UpdateRequest,
    },
    Deregister {
        session: SessionId,
        location: String,
    },
    Send {
        session: SessionId,
        format: Format,
        payload: Vec<u8>,
    },
    Notify {
        session: SessionId,
        format: Format,
        payload: Vec<u8>,
    },
}

#[derive(Debug, Default)]
pub struct MockTransport {
    next_session: u32,
    next_request: u32,
    sessions: Vec<(SessionId, String)>,
    ids: Vec<RequestId>,
    sent: Vec<SentRequest>,
    completions: VecDeque<Completion>,
    refuse_sessions: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create_session` fail with `NoAccess`
    pub fn refuse_sessions(&mut self, refuse: bool) {
        self.refuse_sessions = refuse;
    }

    /// Every request sent so far, oldest first
    pub fn sent(&self) -> &[SentRequest] {
        &self.sent
    }

    pub fn last_request_id(&self) -> Option<RequestId> {
        self.ids.last().copied()
    }

    pub fn request_ids(&self) -> &[RequestId] {
        &self.ids
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn session_uri(&self, session: SessionId) -> Option<&str> {
        self.sessions
            .iter()
            .find(|(id, _)| *id == session)
            .map(|(_, uri)| uri.as_str())
    }

    /// Queues the outcome of `request` for the next `poll`
    pub fn complete(&mut self, request: RequestId, result: Result<Response>) {
        self.completions.push_back(Completion { request, result });
    }

    /// Queues the outcome of the most recent request
    pub fn complete_last(&mut self, result: Result<Response>) {
        if let Some(request) = self.last_request_id() {
            self.complete(request, result);
        }
    }

    fn record(&mut self, session: SessionId, request: SentRequest) -> Result<RequestId> {
        if !self.sessions.iter().any(|(id, _)| *id == session) {
            return Err(Error::NotFound);
        }
        self.next_request += 1;
        let id = RequestId(self.next_request);
        self.ids.push(id);
        self.sent.push(request);
        Ok(id)
    }
}

impl Transport for MockTransport {
    fn create_session(&mut self, uri: &str) -> Result<SessionId> {
        if self.refuse_sessions {
            return Err(Error::NoAccess);
        }
        self.next_session += 1;
        let session = SessionId(self.next_session);
        self.sessions.push((session, uri.to_string()));
        Ok(session)
    }

    fn delete_session(&mut self, session: SessionId) {
        self.sessions.retain(|(id, _)| *id != session);
    }

    fn bootstrap_request(&mut self, session: SessionId, request: &BootstrapRequest) -> Result<RequestId> {
        self.record(
            session,
            SentRequest::Bootstrap {
                session,
                request: request.clone(),
            },
        )
    }

    fn registration_request(&mut self, session: SessionId, request: &RegisterRequest) -> Result<RequestId> {
        self.record(
            session,
            SentRequest::Register {
                session,
                request: request.clone(),
            },
        )
    }

    fn registration_update(
        &mut self,
        session: SessionId,
        location: &str,
        request: &UpdateRequest,
    ) -> Result<RequestId> {
        self.record(
            session,
            SentRequest::Update {
                session,
                location: location.to_string(),
                request: request.clone(),
            },
        )
    }

    fn deregistration_request(&mut self, session: SessionId, location: &str) -> Result<RequestId> {
        self.record(
            session,
            SentRequest::Deregister {
                session,
                location: location.to_string(),
            },
        )
    }

    fn device_send(&mut self, session: SessionId, format: Format, payload: &[u8]) -> Result<RequestId> {
        self.record(
            session,
            SentRequest::Send {
                session,
                format,
                payload: payload.to_vec(),
            },
        )
    }

    fn reporting_notify(&mut self, session: SessionId, format: Format, payload: &[u8]) -> Result<RequestId> {
        self.record(
            session,
            SentRequest::Notify {
                session,
                format,
                payload: payload.to_vec(),
            },
        )
    }

    fn poll(&mut self) -> Vec<Completion> {
        self.completions.drain(..).collect()
    }
}
