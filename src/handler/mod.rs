//! Protocol state machines for the Registration and Bootstrap interfaces
//!
//! Handlers own no collaborators. Every entry point receives a [`Context`]
//! borrowing the configuration, the object manager, the transport and the
//! timer scheduler, so a handler can be driven in isolation by a test.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::manager::ObjectManager;
use crate::timer::TimerScheduler;
use crate::transport::Transport;

pub mod bootstrap;
pub mod server;

pub use bootstrap::{BootstrapHandler, BootstrapState};
pub use server::{RegistrationState, ServerHandler};

/// Events carried by the timers handlers arm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Registration timer of the server with this Short Server ID
    Registration(u16),
    BootstrapTimeout,
}

/// Called once when a registration, deregistration or bootstrap procedure ends
pub type CompletionHandler = Box<dyn FnMut(Result<()>)>;

/// Collaborators borrowed by a handler for one call
pub struct Context<'a> {
    /// Current time in milliseconds
    pub now: u64,
    pub config: &'a ClientConfig,
    pub manager: &'a mut ObjectManager,
    pub transport: &'a mut dyn Transport,
    pub timers: &'a mut TimerScheduler<TimerEvent>,
}

fn notify(handler: &mut Option<CompletionHandler>, result: Result<()>) {
    if let Some(mut handler) = handler.take() {
        handler(result);
    }
}
