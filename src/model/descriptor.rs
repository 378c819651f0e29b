//! Resource schema shared by every instance of an object

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::model::{DataType, ObjectInstance, Value};

bitflags! {
    /// Operations a resource supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Operations: u8 {
        const READ = 0b001;
        const WRITE = 0b010;
        const EXECUTE = 0b100;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

bitflags! {
    /// Interfaces an object is visible on
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Interfaces: u8 {
        const BOOTSTRAP = 0b0001;
        const REGISTER = 0b0010;
        const DEVICE = 0b0100;
        const REPORT = 0b1000;
    }
}

/// Type-specific value bounds, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Bounds {
    #[default]
    None,
    Integer { min: i64, max: i64 },
    Unsigned { min: u64, max: u64 },
    Float { min: f64, max: f64 },
    /// Byte length of string, core-link and opaque values
    Length { min: usize, max: usize },
}

/// Invoked after a write changed a value: `(instance, resource_id, resource_instance_id)`
pub type ChangeCallback = Rc<dyn Fn(&mut ObjectInstance, u16, u16)>;

/// Invoked by Execute with the argument string
pub type ExecuteCallback = Rc<dyn Fn(&mut ObjectInstance, &str) -> Result<()>>;

/// Schema of one resource id within an object
#[derive(Clone)]
pub struct ResourceDescriptor {
    pub id: u16,
    pub data_type: DataType,
    pub operations: Operations,
    pub multiple: bool,
    /// Upper bound on instances of a multiple resource, 0 for unbounded
    pub max_instances: usize,
    pub mandatory: bool,
    pub bounds: Bounds,
    on_change: Option<ChangeCallback>,
    on_execute: Option<ExecuteCallback>,
}

impl ResourceDescriptor {
    /// An optional single-instance resource
    pub fn new(id: u16, data_type: DataType, operations: Operations) -> Self {
        Self {
            id,
            data_type,
            operations,
            multiple: false,
            max_instances: 1,
            mandatory: false,
            bounds: Bounds::None,
            on_change: None,
            on_execute: None,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Multiple-instance resource holding up to `max_instances` values
    pub fn multiple(mut self, max_instances: usize) -> Self {
        self.multiple = true;
        self.max_instances = max_instances;
        self
    }

    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut ObjectInstance, u16, u16) + 'static,
    {
        self.on_change = Some(Rc::new(callback));
        self
    }

    pub fn on_execute<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut ObjectInstance, &str) -> Result<()> + 'static,
    {
        self.on_execute = Some(Rc::new(callback));
        self
    }

    pub fn change_callback(&self) -> Option<ChangeCallback> {
        self.on_change.clone()
    }

    pub fn execute_callback(&self) -> Option<ExecuteCallback> {
        self.on_execute.clone()
    }

    pub fn is_executable(&self) -> bool {
        self.operations.contains(Operations::EXECUTE)
    }

    /// Type default moved into the bounds when the type default falls outside them
    pub fn default_value(&self) -> Value {
        match (Value::default_for(self.data_type), self.bounds) {
            (Value::Integer(v), Bounds::Integer { min, max }) => Value::Integer(v.clamp(min, max)),
            (Value::Time(v), Bounds::Integer { min, max }) => Value::Time(v.clamp(min, max)),
            (Value::UnsignedInteger(v), Bounds::Unsigned { min, max }) => {
                Value::UnsignedInteger(v.clamp(min, max))
            }
            (Value::Float(v), Bounds::Float { min, max }) => Value::Float(v.clamp(min, max)),
            (value, _) => value,
        }
    }

    /// Coerces `value` to the declared type and checks it against the bounds
    pub fn validate(&self, value: &Value) -> Result<Value> {
        let value = value.coerce(self.data_type)?;
        self.check_bounds(&value)?;
        Ok(value)
    }

    fn check_bounds(&self, value: &Value) -> Result<()> {
        let within = match (value, self.bounds) {
            (_, Bounds::None) => true,
            (Value::Integer(v) | Value::Time(v), Bounds::Integer { min, max }) => {
                (min..=max).contains(v)
            }
            (Value::UnsignedInteger(v), Bounds::Unsigned { min, max }) => (min..=max).contains(v),
            (Value::Float(v), Bounds::Float { min, max }) => (min..=max).contains(v),
            (Value::String(s) | Value::CoreLink(s), Bounds::Length { min, max }) => {
                (min..=max).contains(&s.len())
            }
            (Value::Opaque(data), Bounds::Length { min, max }) => (min..=max).contains(&data.len()),
            _ => true,
        };

        if within {
            Ok(())
        } else {
            Err(Error::InvalidValue)
        }
    }
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("id", &self.id)
            .field("data_type", &self.data_type)
            .field("operations", &self.operations)
            .field("multiple", &self.multiple)
            .field("max_instances", &self.max_instances)
            .field("mandatory", &self.mandatory)
            .field("bounds", &self.bounds)
            .field("on_change", &self.on_change.is_some())
            .field("on_execute", &self.on_execute.is_some())
            .finish()
    }
}
