//! An embedded-friendly LWM2M client
//!
//! The crate is sans-IO: a [`Transport`] implementation moves the bytes and
//! the application drives everything else through [`Client::poll`].

pub mod client;
pub mod config;
pub mod converter;
pub mod error;
pub mod handler;
pub mod manager;
pub mod model;
pub mod storage;
pub mod timer;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::Client;
pub use config::ClientConfig;
pub use converter::{DataConverter, Format};
pub use error::{Error, Result};
pub use handler::{BootstrapState, CompletionHandler, RegistrationState};
pub use manager::ObjectManager;
pub use model::{
    DataType, Interfaces, Object, ObjectInstance, ObjectLink, Operations, Path, ResourceData,
    ResourceDescriptor, Value,
};
pub use storage::{Identified, OrderedStorage};
pub use transport::{Completion, RequestId, Response, SessionId, Transport};

// Re-export the SenML crate for applications building packs directly
pub use lwm2m_senml as senml;
