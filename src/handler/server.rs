//! Registration interface state machine, one per LWM2M server

use tracing::{debug, info, warn};

use super::{notify, CompletionHandler, Context, TimerEvent};
use crate::error::{Error, Result};
use crate::manager::{security, server, ObjectManager};
use crate::model::ObjectInstance;
use crate::storage::Identified;
use crate::timer::Timer;
use crate::transport::{Completion, RegisterRequest, RequestId, Response, SessionId, UpdateRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Init,
    InitDelay,
    Registration,
    Registered,
    Deregistration,
    Deregistered,
}

/// Registration parameters last acknowledged by the server
#[derive(Debug, Clone, Default, PartialEq)]
struct SentParameters {
    lifetime: Option<u32>,
    binding: Option<String>,
    object_list: Option<String>,
}

#[derive(Debug)]
enum Pending {
    Register(RequestId, SentParameters),
    Update(RequestId, UpdateRequest),
    Deregister(RequestId),
}

impl Pending {
    fn id(&self) -> RequestId {
        match self {
            Pending::Register(id, _) | Pending::Update(id, _) | Pending::Deregister(id) => *id,
        }
    }
}

/// Drives Register, Update and Deregister against one server
///
/// The handler is keyed by the Short Server ID linking its Security and
/// Server object instances.
pub struct ServerHandler {
    ssid: u16,
    state: RegistrationState,
    session: Option<SessionId>,
    pending: Option<Pending>,
    timer: Timer,
    ordered: bool,
    handler: Option<CompletionHandler>,
    location: Option<String>,
    sent: SentParameters,
    retry_sequence: u32,
}

impl std::fmt::Debug for ServerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandler")
            .field("ssid", &self.ssid)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("location", &self.location)
            .field("retry_sequence", &self.retry_sequence)
            .finish()
    }
}

impl Identified for ServerHandler {
    fn id(&self) -> u16 {
        self.ssid
    }
}

impl ServerHandler {
    pub fn new(ssid: u16) -> Self {
        Self {
            ssid,
            state: RegistrationState::Init,
            session: None,
            pending: None,
            timer: Timer::new(),
            ordered: false,
            handler: None,
            location: None,
            sent: SentParameters::default(),
            retry_sequence: 0,
        }
    }

    pub fn ssid(&self) -> u16 {
        self.ssid
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Location path assigned by the server on registration
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn retry_sequence(&self) -> u32 {
        self.retry_sequence
    }

    fn server_instance<'m>(&self, manager: &'m ObjectManager) -> Option<&'m ObjectInstance> {
        manager.server_instance_for(self.ssid)
    }

    fn server_unsigned(&self, manager: &ObjectManager, resource_id: u16) -> Option<u64> {
        self.server_instance(manager)?.unsigned(resource_id)
    }

    /// Opens a session to the URI of this server's Security instance
    pub fn bind(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let uri = ctx
            .manager
            .security_instance_for(self.ssid)
            .ok_or(Error::NotFound)?
            .string(security::SERVER_URI)
            .unwrap_or_default()
            .to_string();

        if let Some(session) = self.session.take() {
            ctx.transport.delete_session(session);
        }
        let session = ctx.transport.create_session(&uri)?;
        debug!(ssid = self.ssid, %session, %uri, "Server bound");
        self.session = Some(session);
        Ok(())
    }

    /// Starts registering after the Initial Registration Delay
    ///
    /// With `ordered`, a failed registration is reported right away unless
    /// the Registration Failure Block resource is set.
    pub fn registration(
        &mut self,
        ctx: &mut Context<'_>,
        ordered: bool,
        handler: CompletionHandler,
    ) -> Result<()> {
        if !matches!(
            self.state,
            RegistrationState::Init | RegistrationState::Deregistered
        ) {
            return Err(Error::NotAllowed);
        }
        if self.session.is_none() {
            self.bind(ctx)?;
        }

        let delay = self
            .server_unsigned(ctx.manager, server::INITIAL_REGISTRATION_DELAY)
            .unwrap_or(ctx.config.initial_registration_delay);

        self.ordered = ordered;
        self.handler = Some(handler);
        self.retry_sequence = 0;
        self.arm_once(ctx, delay.saturating_mul(1000));
        self.set_state(RegistrationState::InitDelay);
        Ok(())
    }

    /// Sends an Update now; the periodic schedule is kept
    pub fn update(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if self.state != RegistrationState::Registered {
            return Err(Error::NotAllowed);
        }
        self.send_update(ctx);
        Ok(())
    }

    pub fn deregistration(&mut self, ctx: &mut Context<'_>, handler: CompletionHandler) -> Result<()> {
        if self.state != RegistrationState::Registered {
            return Err(Error::NotAllowed);
        }
        let (Some(session), Some(location)) = (self.session, self.location.clone()) else {
            return Err(Error::NotFound);
        };

        ctx.timers.stop(&mut self.timer);
        self.handler = Some(handler);
        self.set_state(RegistrationState::Deregistration);

        match ctx.transport.deregistration_request(session, &location) {
            Ok(id) => self.pending = Some(Pending::Deregister(id)),
            Err(err) => self.deregistered(Err(err)),
        }
        Ok(())
    }

    /// Stops the timer and closes the session
    pub fn release(&mut self, ctx: &mut Context<'_>) {
        ctx.timers.stop(&mut self.timer);
        if let Some(session) = self.session.take() {
            ctx.transport.delete_session(session);
        }
        self.pending = None;
        self.location = None;
        self.handler = None;
        self.set_state(RegistrationState::Init);
    }

    pub(crate) fn on_timer(&mut self, ctx: &mut Context<'_>) {
        match self.state {
            RegistrationState::InitDelay | RegistrationState::Registration => self.send_register(ctx),
            RegistrationState::Registered => self.send_update(ctx),
            state => debug!(ssid = self.ssid, ?state, "Ignoring registration timer"),
        }
    }

    /// Consumes `completion` if it answers this handler's pending request
    pub(crate) fn on_completion(&mut self, ctx: &mut Context<'_>, completion: &Completion) -> bool {
        if self.pending.as_ref().map(Pending::id) != Some(completion.request) {
            return false;
        }
        let Some(pending) = self.pending.take() else {
            return false;
        };

        match pending {
            Pending::Register(_, sent) => match &completion.result {
                Ok(response) => self.registered(ctx, response, sent),
                Err(err) => self.registration_failed(ctx, err.clone()),
            },
            Pending::Update(_, request) => match &completion.result {
                Ok(_) => self.updated(request),
                Err(err) => self.update_failed(ctx, err.clone()),
            },
            Pending::Deregister(_) => self.deregistered(completion.result.clone().map(|_| ())),
        }
        true
    }

    fn current_parameters(&self, ctx: &Context<'_>) -> SentParameters {
        let instance = self.server_instance(ctx.manager);
        SentParameters {
            lifetime: instance
                .and_then(|i| i.integer(server::LIFETIME))
                .and_then(|lifetime| u32::try_from(lifetime).ok()),
            binding: instance
                .and_then(|i| i.string(server::BINDING))
                .map(str::to_string),
            object_list: Some(
                ctx.manager
                    .registration_object_list(ctx.config.preferred_format),
            ),
        }
    }

    fn send_register(&mut self, ctx: &mut Context<'_>) {
        let Some(session) = self.session else {
            self.registration_failed(ctx, Error::NotFound);
            return;
        };

        let parameters = self.current_parameters(ctx);
        let request = RegisterRequest {
            endpoint: ctx.config.endpoint_name.clone(),
            lifetime: parameters.lifetime.unwrap_or_default(),
            version: ctx.config.lwm2m_version.clone(),
            binding: parameters.binding.clone().unwrap_or_default(),
            queue_mode: ctx.config.queue_mode,
            object_list: parameters.object_list.clone().unwrap_or_default(),
        };

        self.set_state(RegistrationState::Registration);
        match ctx.transport.registration_request(session, &request) {
            Ok(id) => {
                debug!(ssid = self.ssid, request = %id, "Register sent");
                self.pending = Some(Pending::Register(id, parameters));
            }
            Err(err) => self.registration_failed(ctx, err),
        }
    }

    fn registered(&mut self, ctx: &mut Context<'_>, response: &Response, sent: SentParameters) {
        self.location = Some(response.location.clone().unwrap_or_default());
        self.retry_sequence = 0;
        self.set_state(RegistrationState::Registered);
        info!(ssid = self.ssid, location = ?self.location, "Registered");

        let lifetime = sent.lifetime.unwrap_or_default();
        self.sent = sent;
        if lifetime > 0 {
            let period = (f64::from(lifetime) * ctx.config.lifetime_scale * 1000.0) as u64;
            ctx.timers.start(
                &mut self.timer,
                ctx.now,
                period,
                TimerEvent::Registration(self.ssid),
                false,
            );
        }

        notify(&mut self.handler, Ok(()));
    }

    fn registration_failed(&mut self, ctx: &mut Context<'_>, err: Error) {
        warn!(ssid = self.ssid, error = %err, "Registration failed");

        let failure_block = self
            .server_instance(ctx.manager)
            .and_then(|i| i.boolean(server::REGISTRATION_FAILURE_BLOCK))
            .unwrap_or(false);
        if self.ordered && !failure_block {
            self.registration_finished(ctx, err);
            return;
        }

        self.retry_sequence += 1;
        let retry_count = self
            .server_unsigned(ctx.manager, server::COMMUNICATION_SEQUENCE_RETRY_COUNT)
            .map(|count| u32::try_from(count).unwrap_or(u32::MAX))
            .unwrap_or(ctx.config.sequence_retry_count);
        if self.retry_sequence > retry_count {
            self.registration_finished(ctx, err);
            return;
        }

        let delay = self
            .server_unsigned(ctx.manager, server::COMMUNICATION_SEQUENCE_DELAY)
            .unwrap_or(ctx.config.sequence_delay);
        info!(
            ssid = self.ssid,
            attempt = self.retry_sequence,
            delay_s = delay,
            "Registration retry scheduled"
        );
        self.arm_once(ctx, delay.saturating_mul(1000));
        self.set_state(RegistrationState::Registration);
    }

    fn registration_finished(&mut self, ctx: &mut Context<'_>, err: Error) {
        ctx.timers.stop(&mut self.timer);
        self.set_state(RegistrationState::Deregistered);
        notify(&mut self.handler, Err(err));
    }

    fn send_update(&mut self, ctx: &mut Context<'_>) {
        let (Some(session), Some(location)) = (self.session, self.location.clone()) else {
            self.update_failed(ctx, Error::NotFound);
            return;
        };

        let current = self.current_parameters(ctx);
        let request = UpdateRequest {
            lifetime: current.lifetime.filter(|l| Some(*l) != self.sent.lifetime),
            binding: current.binding.filter(|b| Some(b) != self.sent.binding.as_ref()),
            object_list: current
                .object_list
                .filter(|o| Some(o) != self.sent.object_list.as_ref()),
        };

        match ctx.transport.registration_update(session, &location, &request) {
            Ok(id) => {
                debug!(ssid = self.ssid, request = %id, changed = !request.is_empty(), "Update sent");
                self.pending = Some(Pending::Update(id, request));
            }
            Err(err) => self.update_failed(ctx, err),
        }
    }

    fn updated(&mut self, request: UpdateRequest) {
        debug!(ssid = self.ssid, "Update acknowledged");
        if request.lifetime.is_some() {
            self.sent.lifetime = request.lifetime;
        }
        if request.binding.is_some() {
            self.sent.binding = request.binding;
        }
        if request.object_list.is_some() {
            self.sent.object_list = request.object_list;
        }
    }

    fn update_failed(&mut self, ctx: &mut Context<'_>, err: Error) {
        if err == Error::Timeout {
            warn!(ssid = self.ssid, "Update timed out, retrying on schedule");
            return;
        }

        warn!(ssid = self.ssid, error = %err, "Update failed, registering again");
        self.retry_sequence = 0;
        self.arm_once(ctx, 0);
        self.set_state(RegistrationState::Registration);
    }

    fn deregistered(&mut self, result: Result<()>) {
        info!(ssid = self.ssid, ok = result.is_ok(), "Deregistered");
        self.location = None;
        self.set_state(RegistrationState::Deregistered);
        notify(&mut self.handler, result);
    }

    fn arm_once(&mut self, ctx: &mut Context<'_>, delay_ms: u64) {
        ctx.timers.start(
            &mut self.timer,
            ctx.now,
            delay_ms,
            TimerEvent::Registration(self.ssid),
            true,
        );
    }

    fn set_state(&mut self, state: RegistrationState) {
        if self.state != state {
            debug!(ssid = self.ssid, from = ?self.state, to = ?state, "Registration state");
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::ClientConfig;
    use crate::converter::Format;
    use crate::model::{Path, Value};
    use crate::test_utils::{MockTransport, SentRequest};
    use crate::timer::TimerScheduler;

    struct Fixture {
        config: ClientConfig,
        manager: ObjectManager,
        transport: MockTransport,
        timers: TimerScheduler<TimerEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut manager = ObjectManager::new().unwrap();
            let security = br#"[{"bn":"/0/1/","n":"0","vs":"coap://lwm2mserver"},{"n":"1","vb":false},{"n":"10","v":5}]"#;
            let server = br#"[{"bn":"/1/0/","n":"0","v":5},{"n":"1","v":30},{"n":"7","vs":"U"}]"#;
            manager
                .bootstrap_write(Format::SenmlJson, security, &Path::object(0))
                .unwrap();
            manager
                .bootstrap_write(Format::SenmlJson, server, &Path::object(1))
                .unwrap();

            Self {
                config: ClientConfig::new("test-client"),
                manager,
                transport: MockTransport::new(),
                timers: TimerScheduler::new(),
            }
        }

        fn ctx(&mut self, now: u64) -> Context<'_> {
            Context {
                now,
                config: &self.config,
                manager: &mut self.manager,
                transport: &mut self.transport,
                timers: &mut self.timers,
            }
        }
    }

    fn recorder() -> (Rc<RefCell<Vec<Result<()>>>>, CompletionHandler) {
        let results = Rc::new(RefCell::new(Vec::new()));
        let sink = results.clone();
        (results, Box::new(move |result| sink.borrow_mut().push(result)))
    }

    fn fire(fixture: &mut Fixture, handler: &mut ServerHandler, now: u64) {
        for event in fixture.timers.poll(now) {
            assert_eq!(event, TimerEvent::Registration(5));
            handler.on_timer(&mut fixture.ctx(now));
        }
    }

    fn complete(fixture: &mut Fixture, handler: &mut ServerHandler, now: u64, result: Result<Response>) {
        let id = fixture.transport.last_request_id().unwrap();
        let completion = Completion { request: id, result };
        assert!(handler.on_completion(&mut fixture.ctx(now), &completion));
    }

    #[test]
    fn test_bind_requires_security_instance() {
        let mut fixture = Fixture::new();
        let mut handler = ServerHandler::new(9);
        assert_eq!(handler.bind(&mut fixture.ctx(0)).unwrap_err(), Error::NotFound);
    }

    #[test]
    fn test_register_then_update_at_half_lifetime() {
        let mut fixture = Fixture::new();
        let mut handler = ServerHandler::new(5);
        let (results, callback) = recorder();

        handler.registration(&mut fixture.ctx(0), false, callback).unwrap();
        assert_eq!(handler.state(), RegistrationState::InitDelay);

        fire(&mut fixture, &mut handler, 0);
        assert_eq!(handler.state(), RegistrationState::Registration);
        match fixture.transport.sent().last().unwrap() {
            SentRequest::Register { request, .. } => {
                assert_eq!(request.lifetime, 30);
                assert_eq!(request.binding, "U");
                assert_eq!(request.object_list, "</>;rt=\"oma.lwm2m\";ct=110,<1/0>,<3/0>");
                assert_eq!(request.endpoint, "test-client");
            }
            other => panic!("unexpected request {other:?}"),
        }

        complete(&mut fixture, &mut handler, 100, Ok(Response::with_location("/rd/5a3f")));
        assert_eq!(handler.state(), RegistrationState::Registered);
        assert_eq!(results.borrow().as_slice(), &[Ok(())]);

        fire(&mut fixture, &mut handler, 15_099);
        assert_eq!(fixture.transport.sent().len(), 1);

        fire(&mut fixture, &mut handler, 15_100);
        match fixture.transport.sent().last().unwrap() {
            SentRequest::Update { location, request, .. } => {
                assert_eq!(location, "/rd/5a3f");
                assert!(request.is_empty());
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_update_sends_only_changed_fields() {
        let mut fixture = Fixture::new();
        let mut handler = ServerHandler::new(5);
        let (_, callback) = recorder();
        handler.registration(&mut fixture.ctx(0), false, callback).unwrap();
        fire(&mut fixture, &mut handler, 0);
        complete(&mut fixture, &mut handler, 0, Ok(Response::with_location("/rd/1")));

        fixture
            .manager
            .instance_mut(1, 0)
            .unwrap()
            .set_value(server::LIFETIME, None, Value::Integer(60))
            .unwrap();
        handler.update(&mut fixture.ctx(10)).unwrap();

        match fixture.transport.sent().last().unwrap() {
            SentRequest::Update { request, .. } => {
                assert_eq!(request.lifetime, Some(60));
                assert_eq!(request.binding, None);
                assert_eq!(request.object_list, None);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_failure_retries_after_sequence_delay() {
        let mut fixture = Fixture::new();
        let mut handler = ServerHandler::new(5);
        let (results, callback) = recorder();
        handler.registration(&mut fixture.ctx(0), false, callback).unwrap();
        fire(&mut fixture, &mut handler, 0);

        complete(&mut fixture, &mut handler, 0, Err(Error::Timeout));
        assert_eq!(handler.state(), RegistrationState::Registration);
        assert_eq!(handler.retry_sequence(), 1);
        assert!(results.borrow().is_empty());

        fire(&mut fixture, &mut handler, 86_399_999);
        assert_eq!(fixture.transport.sent().len(), 1);
        fire(&mut fixture, &mut handler, 86_400_000);
        assert_eq!(fixture.transport.sent().len(), 2);

        complete(&mut fixture, &mut handler, 86_400_000, Err(Error::Timeout));
        assert_eq!(handler.state(), RegistrationState::Deregistered);
        assert_eq!(results.borrow().as_slice(), &[Err(Error::Timeout)]);
    }

    #[test]
    fn test_ordered_failure_is_final() {
        let mut fixture = Fixture::new();
        let mut handler = ServerHandler::new(5);
        let (results, callback) = recorder();
        handler.registration(&mut fixture.ctx(0), true, callback).unwrap();
        fire(&mut fixture, &mut handler, 0);

        complete(&mut fixture, &mut handler, 0, Err(Error::NoAccess));
        assert_eq!(handler.state(), RegistrationState::Deregistered);
        assert_eq!(results.borrow().as_slice(), &[Err(Error::NoAccess)]);
    }

    #[test]
    fn test_update_error_forces_registration() {
        let mut fixture = Fixture::new();
        let mut handler = ServerHandler::new(5);
        let (_, callback) = recorder();
        handler.registration(&mut fixture.ctx(0), false, callback).unwrap();
        fire(&mut fixture, &mut handler, 0);
        complete(&mut fixture, &mut handler, 0, Ok(Response::with_location("/rd/1")));

        handler.update(&mut fixture.ctx(1)).unwrap();
        complete(&mut fixture, &mut handler, 2, Err(Error::Timeout));
        assert_eq!(handler.state(), RegistrationState::Registered);

        handler.update(&mut fixture.ctx(3)).unwrap();
        complete(&mut fixture, &mut handler, 4, Err(Error::NotFound));
        assert_eq!(handler.state(), RegistrationState::Registration);

        fire(&mut fixture, &mut handler, 5);
        assert!(matches!(
            fixture.transport.sent().last().unwrap(),
            SentRequest::Register { .. }
        ));
    }

    #[test]
    fn test_deregistration() {
        let mut fixture = Fixture::new();
        let mut handler = ServerHandler::new(5);
        let (_, callback) = recorder();

        let (early, early_callback) = recorder();
        assert_eq!(
            handler.deregistration(&mut fixture.ctx(0), early_callback).unwrap_err(),
            Error::NotAllowed
        );
        assert!(early.borrow().is_empty());

        handler.registration(&mut fixture.ctx(0), false, callback).unwrap();
        fire(&mut fixture, &mut handler, 0);
        complete(&mut fixture, &mut handler, 0, Ok(Response::with_location("/rd/1")));

        let (results, callback) = recorder();
        handler.deregistration(&mut fixture.ctx(10), callback).unwrap();
        assert_eq!(handler.state(), RegistrationState::Deregistration);
        assert!(fixture.timers.is_empty());

        complete(&mut fixture, &mut handler, 20, Err(Error::Timeout));
        assert_eq!(handler.state(), RegistrationState::Deregistered);
        assert_eq!(results.borrow().as_slice(), &[Err(Error::Timeout)]);
    }

    #[test]
    fn test_stale_completion_ignored() {
        let mut fixture = Fixture::new();
        let mut handler = ServerHandler::new(5);
        let (_, callback) = recorder();
        handler.registration(&mut fixture.ctx(0), false, callback).unwrap();
        fire(&mut fixture, &mut handler, 0);

        let stale = Completion {
            request: RequestId(9999),
            result: Ok(Response::default()),
        };
        assert!(!handler.on_completion(&mut fixture.ctx(1), &stale));
        assert_eq!(handler.state(), RegistrationState::Registration);
    }

    #[test]
    fn test_release_closes_session() {
        let mut fixture = Fixture::new();
        let mut handler = ServerHandler::new(5);
        handler.bind(&mut fixture.ctx(0)).unwrap();
        assert_eq!(fixture.transport.open_sessions(), 1);

        handler.release(&mut fixture.ctx(0));
        assert_eq!(fixture.transport.open_sessions(), 0);
        assert_eq!(handler.state(), RegistrationState::Init);
    }
}
