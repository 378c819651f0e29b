//! The LWM2M object / resource data model
//!
//! Objects own their instances, instances own their resources and resources
//! own their resource instances. Every level lives in an
//! [`OrderedStorage`](crate::storage::OrderedStorage), so iteration is in
//! ascending id order throughout.

mod descriptor;
mod object;
mod path;
mod resource;
mod value;

pub use descriptor::{
    Bounds, ChangeCallback, ExecuteCallback, Interfaces, Operations, ResourceDescriptor,
};
pub use object::{InstanceCallback, Object, ObjectBuilder, ObjectInstance, WriteOptions};
pub use path::Path;
pub use resource::{Resource, ResourceInstance};
pub use value::{DataType, ObjectLink, ResourceData, Value};
