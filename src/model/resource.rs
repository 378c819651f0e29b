//! Resources and resource instances

use std::rc::Rc;

use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{DataType, Path, ResourceData, ResourceDescriptor, Value};
use crate::storage::{Identified, OrderedStorage};

/// One concrete value of a resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInstance {
    id: u16,
    value: Value,
}

impl ResourceInstance {
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Stores an already validated value, returning whether it changed
    fn replace(&mut self, value: Value) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }
}

impl Identified for ResourceInstance {
    fn id(&self) -> u16 {
        self.id
    }
}

/// A typed collection of resource instances governed by a shared descriptor
///
/// A single-instance resource holds at most one instance with id 0. Mandatory
/// single-instance resources always hold it.
#[derive(Debug, Clone)]
pub struct Resource {
    descriptor: Rc<ResourceDescriptor>,
    instances: OrderedStorage<ResourceInstance>,
}

impl Identified for Resource {
    fn id(&self) -> u16 {
        self.descriptor.id
    }
}

impl Resource {
    pub fn new(descriptor: Rc<ResourceDescriptor>) -> Self {
        let capacity = if descriptor.multiple {
            descriptor.max_instances
        } else {
            1
        };
        let mut resource = Self {
            descriptor,
            instances: OrderedStorage::new(capacity),
        };
        resource.reset();
        resource
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn is_multiple(&self) -> bool {
        self.descriptor.multiple
    }

    pub fn instances(&self) -> impl Iterator<Item = &ResourceInstance> {
        self.instances.iter()
    }

    pub fn instance(&self, id: u16) -> Option<&ResourceInstance> {
        self.instances.get(id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Value of the single instance, or of instance 0 of a multiple resource
    pub fn value(&self) -> Option<&Value> {
        self.instances.get(0).map(ResourceInstance::value)
    }

    /// Back to the state right after construction
    pub fn reset(&mut self) {
        self.instances.clear();
        if self.descriptor.mandatory
            && !self.descriptor.multiple
            && self.descriptor.data_type != DataType::None
        {
            let value = self.descriptor.default_value();
            if let Err(err) = self
                .instances
                .create_with(Some(0), |id| ResourceInstance { id, value })
            {
                warn!(resource = self.descriptor.id, error = %err, "Failed to restore default value");
            }
        }
    }

    fn instance_id(&self, requested: Option<u16>) -> Result<Option<u16>> {
        match (self.descriptor.multiple, requested) {
            (false, None | Some(0)) => Ok(Some(0)),
            (false, Some(_)) => Err(Error::NotFound),
            (true, requested) => Ok(requested),
        }
    }

    /// Creates an instance holding `value` or the descriptor default
    pub fn create_instance(&mut self, id: Option<u16>, value: Option<&Value>) -> Result<u16> {
        let id = self.instance_id(id)?;
        let value = match value {
            Some(value) => self.descriptor.validate(value)?,
            None => self.descriptor.default_value(),
        };
        let instance = self
            .instances
            .create_with(id, |id| ResourceInstance { id, value })?;
        Ok(instance.id)
    }

    pub fn delete_instance(&mut self, id: u16) -> Result<()> {
        if !self.descriptor.multiple && self.descriptor.mandatory {
            return Err(Error::NotAllowed);
        }
        self.instances.delete(id).map(|_| ())
    }

    /// Writes `value` into instance `id`, creating the instance when absent
    ///
    /// Returns the instance id and whether the stored value changed. A
    /// rejected value leaves the previous one in place.
    pub(crate) fn write(&mut self, id: Option<u16>, value: &Value) -> Result<(u16, bool)> {
        let id = self.instance_id(id)?.ok_or(Error::InvalidValue)?;
        let value = self.descriptor.validate(value)?;

        match self.instances.get_mut(id) {
            Some(instance) => Ok((id, instance.replace(value))),
            None => {
                self.instances
                    .create_with(Some(id), |id| ResourceInstance { id, value })?;
                Ok((id, true))
            }
        }
    }

    /// Appends every instance as a path-tagged record
    pub fn read_into(&self, object: u16, instance: u16, out: &mut Vec<ResourceData>) {
        for resource_instance in &self.instances {
            let path = if self.descriptor.multiple {
                Path::resource_instance(object, instance, self.descriptor.id, resource_instance.id)
            } else {
                Path::resource(object, instance, self.descriptor.id)
            };
            out.push(ResourceData::new(path, resource_instance.value.clone()));
        }
    }
}
