//! # LWM2M SenML - Sensor Measurement Lists for LWM2M payloads
//!
//! A Rust implementation of [RFC 8428](https://tools.ietf.org/html/rfc8428) - Sensor Measurement Lists (SenML),
//! restricted to the fields the LWM2M 1.1 SenML-JSON and SenML-CBOR content formats use.
//!
//! ## Features
//!
//! - **LWM2M field set**: `bn`, `bt`, `n`, `t`, `v`, `vs`, `vb`, `vd` and the LWM2M `vlo` object link
//! - **Multiple Formats**: JSON and CBOR serialization
//! - **Resolution**: running base name / base time applied record by record
//! - **Builder Pattern**: emits `bn` only when the path prefix changes
//!
//! ## Quick Start
//!
//! ```rust
//! use lwm2m_senml::{SenMLBuilder, SenMLPack, SenMLValue, Result};
//!
//! fn example() -> Result<()> {
//!     let pack = SenMLBuilder::new()
//!         .add("/3/0/", "0", SenMLValue::String("Open Mobile Alliance".into()))
//!         .add("/3/0/", "9", SenMLValue::Number(95.0))
//!         .build();
//!
//!     let json = pack.to_json()?;
//!     assert_eq!(
//!         json,
//!         r#"[{"bn":"/3/0/","n":"0","vs":"Open Mobile Alliance"},{"n":"9","v":95.0}]"#
//!     );
//!
//!     let restored = SenMLPack::from_json(&json)?;
//!     let names: Vec<String> = restored
//!         .resolve()
//!         .map(|record| record.map(|r| r.name))
//!         .collect::<Result<_>>()?;
//!     assert_eq!(names, vec!["/3/0/0", "/3/0/9"]);
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

pub mod builder;
pub mod error;
pub mod normalize;
pub mod pack;
pub mod record;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "cbor")]
pub mod cbor;

// Re-export main types
pub use builder::SenMLBuilder;
pub use error::{Result, SenMLError};
pub use normalize::{NormalizedRecord, Resolver};
pub use pack::SenMLPack;
pub use record::{SenMLRecord, SenMLValue};

/// SenML Content-Format identifiers for CoAP
pub mod content_format {
    /// application/senml+json
    pub const SENML_JSON: u16 = 110;
    /// application/senml+cbor
    pub const SENML_CBOR: u16 = 112;
}
