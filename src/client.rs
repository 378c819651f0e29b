//! Client driver
//!
//! [`Client`] owns the object manager, the transport, the timer scheduler and
//! one [`ServerHandler`] per configured server. The application calls
//! [`Client::poll`] with the current time whenever the transport has news or
//! the returned delay has elapsed.

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::converter::Format;
use crate::error::{Error, Result};
use crate::handler::{
    BootstrapHandler, BootstrapState, CompletionHandler, Context, RegistrationState, ServerHandler,
    TimerEvent,
};
use crate::manager::{server, ObjectManager};
use crate::model::{Interfaces, Path};
use crate::storage::OrderedStorage;
use crate::timer::TimerScheduler;
use crate::transport::{Completion, RequestId, Transport};

/// Number of LWM2M servers a client can be registered with at once
pub const MAX_SERVERS: usize = 3;

pub struct Client<T: Transport> {
    config: ClientConfig,
    manager: ObjectManager,
    transport: T,
    timers: TimerScheduler<TimerEvent>,
    servers: OrderedStorage<ServerHandler>,
    bootstrap: BootstrapHandler,
    sends: Vec<RequestId>,
    now: u64,
}

impl<T: Transport> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.config.endpoint_name)
            .field("servers", &self.servers.len())
            .field("bootstrap", &self.bootstrap.state())
            .field("now", &self.now)
            .finish()
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client with the Security, Server and Device objects
    pub fn new(config: ClientConfig, transport: T) -> Result<Self> {
        Ok(Self::with_manager(config, ObjectManager::new()?, transport))
    }

    pub fn with_manager(config: ClientConfig, manager: ObjectManager, transport: T) -> Self {
        Self {
            config,
            manager,
            transport,
            timers: TimerScheduler::new(),
            servers: OrderedStorage::new(MAX_SERVERS),
            bootstrap: BootstrapHandler::new(),
            sends: Vec::new(),
            now: 0,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn manager(&self) -> &ObjectManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ObjectManager {
        &mut self.manager
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Time of the latest `poll`, in milliseconds
    pub fn now(&self) -> u64 {
        self.now
    }

    fn parts(&mut self) -> (Context<'_>, &mut OrderedStorage<ServerHandler>, &mut BootstrapHandler) {
        let Self {
            config,
            manager,
            transport,
            timers,
            servers,
            bootstrap,
            now,
            ..
        } = self;
        let ctx = Context {
            now: *now,
            config,
            manager,
            transport,
            timers,
        };
        (ctx, servers, bootstrap)
    }

    fn with_server<R>(
        &mut self,
        ssid: u16,
        f: impl FnOnce(&mut ServerHandler, &mut Context<'_>) -> Result<R>,
    ) -> Result<R> {
        let (mut ctx, servers, _) = self.parts();
        let handler = servers.get_mut(ssid).ok_or(Error::NotFound)?;
        f(handler, &mut ctx)
    }

    /// Drives the client to `now` and returns the delay until the next timer
    pub fn poll(&mut self, now: u64) -> Option<u64> {
        self.now = self.now.max(now);

        for completion in self.transport.poll() {
            self.dispatch(&completion);
        }

        let events = self.timers.poll(self.now);
        for event in events {
            let (mut ctx, servers, bootstrap) = self.parts();
            match event {
                TimerEvent::Registration(ssid) => match servers.get_mut(ssid) {
                    Some(handler) => handler.on_timer(&mut ctx),
                    None => debug!(ssid, "Timer for a removed server"),
                },
                TimerEvent::BootstrapTimeout => bootstrap.on_timeout(&mut ctx),
            }
        }

        self.timers.next_delay(self.now)
    }

    fn dispatch(&mut self, completion: &Completion) {
        let (mut ctx, servers, bootstrap) = self.parts();
        if bootstrap.on_completion(&mut ctx, completion) {
            return;
        }
        for handler in servers.iter_mut() {
            if handler.on_completion(&mut ctx, completion) {
                return;
            }
        }

        if let Some(pos) = self.sends.iter().position(|id| *id == completion.request) {
            self.sends.swap_remove(pos);
            match &completion.result {
                Ok(_) => debug!(request = %completion.request, "Send acknowledged"),
                Err(err) => warn!(request = %completion.request, error = %err, "Send failed"),
            }
            return;
        }

        warn!(request = %completion.request, "Discarding unmatched response");
    }

    /// Adds a server handler bound to the Security instance carrying `ssid`
    pub fn add_server(&mut self, ssid: u16) -> Result<()> {
        let (mut ctx, servers, _) = self.parts();
        let handler = servers.create_with(Some(ssid), ServerHandler::new)?;
        if let Err(err) = handler.bind(&mut ctx) {
            servers.delete(ssid)?;
            return Err(err);
        }
        info!(ssid, "Server added");
        Ok(())
    }

    pub fn remove_server(&mut self, ssid: u16) -> Result<()> {
        let (mut ctx, servers, _) = self.parts();
        let mut handler = servers.delete(ssid)?;
        handler.release(&mut ctx);
        info!(ssid, "Server removed");
        Ok(())
    }

    pub fn server(&self, ssid: u16) -> Option<&ServerHandler> {
        self.servers.get(ssid)
    }

    pub fn servers(&self) -> impl Iterator<Item = &ServerHandler> {
        self.servers.iter()
    }

    pub fn server_state(&self, ssid: u16) -> Option<RegistrationState> {
        self.servers.get(ssid).map(ServerHandler::state)
    }

    pub fn register(&mut self, ssid: u16, ordered: bool, handler: CompletionHandler) -> Result<()> {
        self.with_server(ssid, |server, ctx| server.registration(ctx, ordered, handler))
    }

    /// Registration Update Trigger
    pub fn update(&mut self, ssid: u16) -> Result<()> {
        self.with_server(ssid, |server, ctx| server.update(ctx))
    }

    pub fn deregister(&mut self, ssid: u16, handler: CompletionHandler) -> Result<()> {
        self.with_server(ssid, |server, ctx| server.deregistration(ctx, handler))
    }

    pub fn bootstrap_state(&self) -> BootstrapState {
        self.bootstrap.state()
    }

    pub fn bootstrap_request(&mut self, handler: CompletionHandler) -> Result<()> {
        let (mut ctx, _, bootstrap) = self.parts();
        bootstrap.bootstrap_request(&mut ctx, handler)
    }

    pub fn bootstrap_finish(&mut self) -> Result<()> {
        let (mut ctx, _, bootstrap) = self.parts();
        bootstrap.bootstrap_finish(&mut ctx)
    }

    pub fn bootstrap_discover(&mut self, object_id: Option<u16>) -> Result<String> {
        let (ctx, _, bootstrap) = self.parts();
        bootstrap.discover(&ctx, object_id)
    }

    pub fn bootstrap_read(&mut self, format: Format, target: &Path) -> Result<Vec<u8>> {
        let (mut ctx, _, bootstrap) = self.parts();
        bootstrap.read(&mut ctx, format, target)
    }

    pub fn bootstrap_write(&mut self, format: Format, data: &[u8], target: &Path) -> Result<()> {
        let (mut ctx, _, bootstrap) = self.parts();
        bootstrap.write(&mut ctx, format, data, target)
    }

    pub fn bootstrap_delete(&mut self, target: &Path) -> Result<()> {
        let (mut ctx, _, bootstrap) = self.parts();
        bootstrap.delete(&mut ctx, target)
    }

    /// Device Management Execute
    ///
    /// Executing the Registration Update Trigger of a Server instance also
    /// sends an Update to that server.
    pub fn execute(&mut self, target: &Path, arguments: &str) -> Result<()> {
        self.manager.device_execute(target, arguments)?;

        if target.object == Some(server::OBJECT_ID)
            && target.resource == Some(server::REGISTRATION_UPDATE_TRIGGER)
        {
            let ssid = target
                .instance
                .and_then(|id| self.manager.instance(server::OBJECT_ID, id))
                .and_then(|instance| instance.unsigned(server::SHORT_SERVER_ID))
                .and_then(|ssid| u16::try_from(ssid).ok())
                .ok_or(Error::NotFound)?;
            self.update(ssid)?;
        }
        Ok(())
    }

    /// LWM2M Send of the resources under `paths` to a registered server
    pub fn send(&mut self, ssid: u16, paths: &[Path]) -> Result<RequestId> {
        let handler = self.servers.get(ssid).ok_or(Error::NotFound)?;
        if handler.state() != RegistrationState::Registered {
            return Err(Error::NotAllowed);
        }
        let session = handler.session().ok_or(Error::NotFound)?;
        let muted = self
            .manager
            .server_instance_for(ssid)
            .and_then(|instance| instance.boolean(server::MUTE_SEND))
            .unwrap_or(false);
        if muted {
            return Err(Error::NotAllowed);
        }
        if paths.is_empty() {
            return Err(Error::InvalidValue);
        }

        let mut records = Vec::new();
        for path in paths {
            records.extend(self.manager.read_records(path, Interfaces::REPORT, true)?);
        }
        let format = self.config.preferred_format;
        let payload = self
            .manager
            .encode(format, &records, self.config.encode_capacity)?;

        let id = self.transport.device_send(session, format, &payload)?;
        debug!(ssid, request = %id, records = records.len(), "Send");
        self.sends.push(id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockTransport, SentRequest};
    use crate::transport::Response;
    use std::cell::RefCell;
    use std::rc::Rc;

    const SECURITY: &str = r#"[{"bn":"/0/0/","n":"0","vs":"coap://bootstrap"},{"n":"1","vb":true},
        {"bn":"/0/1/","n":"0","vs":"coap://server"},{"n":"1","vb":false},{"n":"10","v":7}]"#;
    const SERVER: &str = r#"[{"bn":"/1/0/","n":"0","v":7},{"n":"1","v":60},{"n":"7","vs":"U"}]"#;

    fn provisioned() -> Client<MockTransport> {
        let mut client = Client::new(ClientConfig::new("urn:test"), MockTransport::new()).unwrap();
        let manager = client.manager_mut();
        manager
            .bootstrap_write(Format::SenmlJson, SECURITY.as_bytes(), &Path::object(0))
            .unwrap();
        manager
            .bootstrap_write(Format::SenmlJson, SERVER.as_bytes(), &Path::object(1))
            .unwrap();
        client
    }

    fn registered() -> Client<MockTransport> {
        let mut client = provisioned();
        client.add_server(7).unwrap();
        client.register(7, false, Box::new(|_| {})).unwrap();
        client.poll(0);
        client
            .transport_mut()
            .complete_last(Ok(Response::with_location("/rd/7")));
        client.poll(1);
        client
    }

    #[test]
    fn test_add_server_requires_security_account() {
        let mut client = provisioned();
        assert_eq!(client.add_server(9), Err(Error::NotFound));
        assert!(client.server(9).is_none());

        client.add_server(7).unwrap();
        assert_eq!(client.add_server(7), Err(Error::AlreadyExists));
        assert_eq!(client.transport().open_sessions(), 1);

        client.remove_server(7).unwrap();
        assert_eq!(client.transport().open_sessions(), 0);
    }

    #[test]
    fn test_register_and_periodic_update() {
        let mut client = registered();
        assert_eq!(client.server_state(7), Some(RegistrationState::Registered));
        assert_eq!(client.server(7).unwrap().location(), Some("/rd/7"));

        // lifetime 60 s scaled by 0.5
        assert_eq!(client.poll(1), Some(30_000));
        client.poll(30_001);
        assert!(matches!(
            client.transport().sent().last(),
            Some(SentRequest::Update { location, .. }) if location == "/rd/7"
        ));
    }

    #[test]
    fn test_late_response_discarded() {
        let mut client = registered();
        let sent = client.transport().sent().len();
        client
            .transport_mut()
            .complete(RequestId(999), Err(Error::Timeout));
        client.poll(2);
        assert_eq!(client.server_state(7), Some(RegistrationState::Registered));
        assert_eq!(client.transport().sent().len(), sent);
    }

    #[test]
    fn test_execute_update_trigger() {
        let mut client = registered();
        client.execute(&Path::resource(1, 0, 8), "").unwrap();
        assert!(matches!(
            client.transport().sent().last(),
            Some(SentRequest::Update { .. })
        ));
    }

    #[test]
    fn test_send_requires_registration() {
        let mut client = provisioned();
        client.add_server(7).unwrap();
        assert_eq!(
            client.send(7, &[Path::resource(3, 0, 11)]),
            Err(Error::NotAllowed)
        );
        assert_eq!(client.send(8, &[]), Err(Error::NotFound));
    }

    #[test]
    fn test_send_device_resources() {
        let mut client = registered();
        let id = client.send(7, &[Path::resource(3, 0, 16)]).unwrap();
        match client.transport().sent().last() {
            Some(SentRequest::Send { format, payload, .. }) => {
                assert_eq!(*format, Format::SenmlJson);
                let text = String::from_utf8(payload.clone()).unwrap();
                assert!(text.contains(r#""vs":"U""#), "{text}");
            }
            other => panic!("unexpected request {other:?}"),
        }

        client.transport_mut().complete(id, Ok(Response::default()));
        client.poll(5);
        assert!(client.sends.is_empty());
    }

    #[test]
    fn test_mute_send() {
        let mut client = registered();
        client
            .manager_mut()
            .instance_mut(1, 0)
            .unwrap()
            .set_value(server::MUTE_SEND, None, crate::model::Value::Boolean(true))
            .unwrap();
        assert_eq!(
            client.send(7, &[Path::resource(3, 0, 16)]),
            Err(Error::NotAllowed)
        );
    }

    #[test]
    fn test_bootstrap_timeout() {
        let mut client = provisioned();
        let result = Rc::new(RefCell::new(None));
        let seen = result.clone();
        client
            .bootstrap_request(Box::new(move |r| *seen.borrow_mut() = Some(r)))
            .unwrap();
        assert_eq!(client.bootstrap_state(), BootstrapState::Bootstrapping);
        assert_eq!(client.poll(0), Some(60_000));

        client.poll(60_000);
        assert_eq!(*result.borrow(), Some(Err(Error::Timeout)));
        assert_eq!(client.bootstrap_state(), BootstrapState::Init);
        assert_eq!(client.transport().open_sessions(), 0);
    }
}
