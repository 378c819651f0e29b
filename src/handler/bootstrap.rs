//! Bootstrap interface state machine

use tracing::{debug, info, warn};

use super::{notify, CompletionHandler, Context, TimerEvent};
use crate::converter::Format;
use crate::error::{Error, Result};
use crate::manager::{security, server};
use crate::model::{Interfaces, Object, Path};
use crate::storage::Identified;
use crate::timer::Timer;
use crate::transport::{BootstrapRequest, Completion, RequestId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Init,
    Bootstrapping,
    Bootstrapped,
}

/// Client-initiated bootstrap against the Bootstrap-Server account
///
/// While bootstrapping, the bootstrap server may discover, read, write and
/// delete through this handler until it sends Bootstrap-Finish.
pub struct BootstrapHandler {
    state: BootstrapState,
    session: Option<SessionId>,
    pending: Option<RequestId>,
    timer: Timer,
    handler: Option<CompletionHandler>,
}

impl std::fmt::Debug for BootstrapHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapHandler")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("pending", &self.pending)
            .finish()
    }
}

impl Default for BootstrapHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapHandler {
    pub fn new() -> Self {
        Self {
            state: BootstrapState::Init,
            session: None,
            pending: None,
            timer: Timer::new(),
            handler: None,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Sends a Bootstrap-Request and starts the bootstrap timeout
    pub fn bootstrap_request(&mut self, ctx: &mut Context<'_>, handler: CompletionHandler) -> Result<()> {
        if self.state == BootstrapState::Bootstrapping {
            return Err(Error::NotAllowed);
        }

        let uri = ctx
            .manager
            .bootstrap_security_instance()
            .ok_or(Error::NotFound)?
            .string(security::SERVER_URI)
            .unwrap_or_default()
            .to_string();

        let session = ctx.transport.create_session(&uri)?;
        let request = BootstrapRequest {
            endpoint: ctx.config.endpoint_name.clone(),
            preferred_format: Some(ctx.config.preferred_format),
        };
        let id = match ctx.transport.bootstrap_request(session, &request) {
            Ok(id) => id,
            Err(err) => {
                ctx.transport.delete_session(session);
                return Err(err);
            }
        };

        ctx.timers.start(
            &mut self.timer,
            ctx.now,
            ctx.config.bootstrap_timeout.saturating_mul(1000),
            TimerEvent::BootstrapTimeout,
            true,
        );
        self.session = Some(session);
        self.pending = Some(id);
        self.handler = Some(handler);
        self.set_state(BootstrapState::Bootstrapping);
        info!(%uri, request = %id, "Bootstrap-Request sent");
        Ok(())
    }

    /// Ends bootstrapping successfully
    pub fn bootstrap_finish(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        self.ensure_bootstrapping()?;

        self.close(ctx);
        self.set_state(BootstrapState::Bootstrapped);
        info!("Bootstrap finished");
        notify(&mut self.handler, Ok(()));
        Ok(())
    }

    pub(crate) fn on_completion(&mut self, ctx: &mut Context<'_>, completion: &Completion) -> bool {
        if self.pending != Some(completion.request) {
            return false;
        }
        self.pending = None;

        match &completion.result {
            Ok(_) => debug!("Bootstrap-Request acknowledged"),
            Err(err) => {
                warn!(error = %err, "Bootstrap-Request failed");
                self.fail(ctx, err.clone());
            }
        }
        true
    }

    pub(crate) fn on_timeout(&mut self, ctx: &mut Context<'_>) {
        if self.state == BootstrapState::Bootstrapping {
            warn!("Bootstrap timed out");
            self.fail(ctx, Error::Timeout);
        }
    }

    /// Bootstrap-Discover in CoRE link format
    ///
    /// Security instances of regular servers carry `ssid` and `uri`, Server
    /// instances carry `ssid`. An object without instances is listed alone.
    pub fn discover(&self, ctx: &Context<'_>, object_id: Option<u16>) -> Result<String> {
        self.ensure_bootstrapping()?;

        let mut out = format!("lwm2m=\"{}\"", ctx.config.lwm2m_version);
        match object_id {
            Some(id) => {
                let object = ctx
                    .manager
                    .object(id)
                    .filter(|o| o.is_visible(Interfaces::BOOTSTRAP))
                    .ok_or(Error::NotFound)?;
                discover_object(&mut out, object);
            }
            None => {
                for object in ctx
                    .manager
                    .objects()
                    .filter(|o| o.is_visible(Interfaces::BOOTSTRAP))
                {
                    discover_object(&mut out, object);
                }
            }
        }
        Ok(out)
    }

    pub fn write(&mut self, ctx: &mut Context<'_>, format: Format, data: &[u8], target: &Path) -> Result<()> {
        self.ensure_bootstrapping()?;
        ctx.manager.bootstrap_write(format, data, target)
    }

    pub fn read(&mut self, ctx: &mut Context<'_>, format: Format, target: &Path) -> Result<Vec<u8>> {
        self.ensure_bootstrapping()?;
        ctx.manager
            .bootstrap_read(format, target, ctx.config.encode_capacity)
    }

    pub fn delete(&mut self, ctx: &mut Context<'_>, target: &Path) -> Result<()> {
        self.ensure_bootstrapping()?;
        ctx.manager.bootstrap_delete(target)
    }

    fn ensure_bootstrapping(&self) -> Result<()> {
        if self.state == BootstrapState::Bootstrapping {
            Ok(())
        } else {
            Err(Error::NotAllowed)
        }
    }

    fn fail(&mut self, ctx: &mut Context<'_>, err: Error) {
        self.close(ctx);
        self.set_state(BootstrapState::Init);
        notify(&mut self.handler, Err(err));
    }

    fn close(&mut self, ctx: &mut Context<'_>) {
        ctx.timers.stop(&mut self.timer);
        self.pending = None;
        if let Some(session) = self.session.take() {
            ctx.transport.delete_session(session);
        }
    }

    fn set_state(&mut self, state: BootstrapState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Bootstrap state");
            self.state = state;
        }
    }
}

fn discover_object(out: &mut String, object: &Object) {
    if object.is_empty() {
        out.push_str(&format!(",</{}>", object.id()));
        return;
    }

    for instance in object.instances() {
        out.push_str(&format!(",</{}/{}>", object.id(), instance.id()));

        match object.id() {
            security::OBJECT_ID if instance.boolean(security::BOOTSTRAP_SERVER) != Some(true) => {
                if let Some(ssid) = instance.integer(security::SHORT_SERVER_ID) {
                    out.push_str(&format!(";ssid={ssid}"));
                }
                if let Some(uri) = instance.string(security::SERVER_URI) {
                    out.push_str(&format!(";uri={uri}"));
                }
            }
            server::OBJECT_ID => {
                if let Some(ssid) = instance.integer(server::SHORT_SERVER_ID) {
                    out.push_str(&format!(";ssid={ssid}"));
                }
            }
            _ => {}
        }
    }
}
