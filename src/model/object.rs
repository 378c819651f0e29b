//! Objects and object instances
//!
//! An [`Object`] is the schema plus its instances. Writes decode records from
//! a converter and apply them all or not at all.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::converter::DataConverter;
use crate::error::{Error, Result};
use crate::model::{
    DataType, Interfaces, Operations, Path, Resource, ResourceData, ResourceDescriptor, Value,
};
use crate::storage::{Identified, OrderedStorage};

/// Flags steering how decoded records are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Enforce the WRITE operation on every touched resource
    pub check_operation: bool,
    /// Skip records for resource ids the object does not define
    pub ignore_missing: bool,
    /// Reset each touched instance (or the targeted resource) before applying records
    pub replace: bool,
}

/// One instantiation of an object's resource set
#[derive(Debug, Clone)]
pub struct ObjectInstance {
    object_id: u16,
    id: u16,
    resources: OrderedStorage<Resource>,
}

impl Identified for ObjectInstance {
    fn id(&self) -> u16 {
        self.id
    }
}

impl ObjectInstance {
    fn new(object_id: u16, id: u16, descriptors: &[Rc<ResourceDescriptor>]) -> Result<Self> {
        let mut resources = OrderedStorage::new(descriptors.len());
        for descriptor in descriptors {
            resources.create_with(Some(descriptor.id), |_| Resource::new(descriptor.clone()))?;
        }
        Ok(Self {
            object_id,
            id,
            resources,
        })
    }

    pub fn object_id(&self) -> u16 {
        self.object_id
    }

    pub fn path(&self) -> Path {
        Path::instance(self.object_id, self.id)
    }

    pub fn resource(&self, id: u16) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Value of a single-instance resource
    pub fn value(&self, resource_id: u16) -> Option<&Value> {
        self.resources.get(resource_id).and_then(Resource::value)
    }

    pub fn string(&self, resource_id: u16) -> Option<&str> {
        self.value(resource_id).and_then(Value::as_str)
    }

    pub fn integer(&self, resource_id: u16) -> Option<i64> {
        self.value(resource_id).and_then(Value::as_i64)
    }

    pub fn unsigned(&self, resource_id: u16) -> Option<u64> {
        self.value(resource_id).and_then(Value::as_u64)
    }

    pub fn boolean(&self, resource_id: u16) -> Option<bool> {
        self.value(resource_id).and_then(Value::as_bool)
    }

    /// Sets a value from local code; no operation check
    pub fn set_value(
        &mut self,
        resource_id: u16,
        resource_instance_id: Option<u16>,
        value: Value,
    ) -> Result<()> {
        let resource = self.resources.get_mut(resource_id).ok_or(Error::NotFound)?;
        let (instance_id, changed) = resource.write(resource_instance_id, &value)?;
        if changed {
            self.notify(resource_id, instance_id);
        }
        Ok(())
    }

    pub fn create_resource_instance(
        &mut self,
        resource_id: u16,
        resource_instance_id: Option<u16>,
        value: Option<&Value>,
    ) -> Result<u16> {
        self.resources
            .get_mut(resource_id)
            .ok_or(Error::NotFound)?
            .create_instance(resource_instance_id, value)
    }

    pub fn delete_resource_instance(&mut self, resource_id: u16, resource_instance_id: u16) -> Result<()> {
        self.resources
            .get_mut(resource_id)
            .ok_or(Error::NotFound)?
            .delete_instance(resource_instance_id)
    }

    /// Runs the execute callback of `resource_id`
    pub fn execute(&mut self, resource_id: u16, arguments: &str) -> Result<()> {
        let descriptor = self.resources.get(resource_id).ok_or(Error::NotFound)?.descriptor();
        if !descriptor.is_executable() {
            return Err(Error::NotAllowed);
        }
        match descriptor.execute_callback() {
            Some(callback) => callback(self, arguments),
            None => Ok(()),
        }
    }

    fn notify(&mut self, resource_id: u16, resource_instance_id: u16) {
        let callback = self
            .resources
            .get(resource_id)
            .and_then(|resource| resource.descriptor().change_callback());
        if let Some(callback) = callback {
            callback(self, resource_id, resource_instance_id);
        }
    }

    /// Every resource back to its initialization default
    pub fn reset(&mut self) {
        for resource in self.resources.iter_mut() {
            resource.reset();
        }
    }

    /// Resets only the resources a management server may write
    pub fn reset_writable(&mut self) {
        for resource in self.resources.iter_mut() {
            if resource.descriptor().operations.contains(Operations::WRITE) {
                resource.reset();
            }
        }
    }

    pub fn reset_resource(&mut self, resource_id: u16) -> Result<()> {
        self.resources
            .get_mut(resource_id)
            .ok_or(Error::NotFound)
            .map(Resource::reset)
    }

    pub(crate) fn write_record(&mut self, record: &ResourceData, options: &WriteOptions) -> Result<()> {
        let resource_id = record.path.resource.ok_or(Error::InvalidValue)?;
        let Some(resource) = self.resources.get_mut(resource_id) else {
            if options.ignore_missing {
                debug!(path = %record.path, "Skipping unknown resource");
                return Ok(());
            }
            return Err(Error::NotFound);
        };

        if options.check_operation && !resource.descriptor().operations.contains(Operations::WRITE) {
            return Err(Error::NotAllowed);
        }

        let (instance_id, changed) = resource.write(record.path.resource_instance, &record.value)?;
        if changed {
            self.notify(resource_id, instance_id);
        }
        Ok(())
    }

    /// Appends the readable resources under `target` to `out`
    ///
    /// With `check_operation`, a resource lacking READ is skipped, or is an
    /// error when it is the target itself.
    pub fn read_into(&self, target: &Path, check_operation: bool, out: &mut Vec<ResourceData>) -> Result<()> {
        let readable = |resource: &Resource| -> bool {
            resource.descriptor().data_type != DataType::None
                && (!check_operation || resource.descriptor().operations.contains(Operations::READ))
        };

        match target.resource {
            Some(resource_id) => {
                let resource = self.resources.get(resource_id).ok_or(Error::NotFound)?;
                if !readable(resource) {
                    return Err(Error::NotAllowed);
                }
                match target.resource_instance {
                    Some(instance_id) => {
                        let instance = resource.instance(instance_id).ok_or(Error::NotFound)?;
                        out.push(ResourceData::new(*target, instance.value().clone()));
                    }
                    None => resource.read_into(self.object_id, self.id, out),
                }
            }
            None => {
                for resource in self.resources.iter() {
                    if readable(resource) {
                        resource.read_into(self.object_id, self.id, out);
                    }
                }
            }
        }
        Ok(())
    }
}

/// An object: schema plus its instances
/// Invoked on a new or fully reset instance once its defaults are in place
pub type InstanceCallback = Rc<dyn Fn(&mut ObjectInstance)>;

pub struct Object {
    id: u16,
    interfaces: Interfaces,
    multiple: bool,
    mandatory: bool,
    descriptors: Vec<Rc<ResourceDescriptor>>,
    instances: OrderedStorage<ObjectInstance>,
    on_create: Option<InstanceCallback>,
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("interfaces", &self.interfaces)
            .field("multiple", &self.multiple)
            .field("mandatory", &self.mandatory)
            .field("descriptors", &self.descriptors)
            .field("instances", &self.instances.len())
            .field("on_create", &self.on_create.is_some())
            .finish()
    }
}

impl Identified for Object {
    fn id(&self) -> u16 {
        self.id
    }
}

impl Object {
    pub fn builder(id: u16) -> ObjectBuilder {
        ObjectBuilder::new(id)
    }

    pub fn interfaces(&self) -> Interfaces {
        self.interfaces
    }

    pub fn is_visible(&self, interface: Interfaces) -> bool {
        self.interfaces.contains(interface)
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn max_instances(&self) -> usize {
        self.instances.capacity()
    }

    pub fn descriptor(&self, resource_id: u16) -> Option<&ResourceDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.id == resource_id)
            .map(|d| d.as_ref())
    }

    pub fn instances(&self) -> impl Iterator<Item = &ObjectInstance> {
        self.instances.iter()
    }

    pub fn instance(&self, id: u16) -> Option<&ObjectInstance> {
        self.instances.get(id)
    }

    pub fn instance_mut(&mut self, id: u16) -> Option<&mut ObjectInstance> {
        self.instances.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Creates a fully built instance; `None` picks the smallest free id
    pub fn create_instance(&mut self, id: Option<u16>) -> Result<&mut ObjectInstance> {
        let object_id = self.id;
        let instance_id = match id {
            Some(id) => id,
            None => self.instances.next_free_id().ok_or(Error::OutOfCapacity)?,
        };
        let instance = ObjectInstance::new(object_id, instance_id, &self.descriptors)?;
        let on_create = self.on_create.clone();
        let created = self.instances.create_with(Some(instance_id), |_| instance)?;
        if let Some(callback) = on_create {
            callback(created);
        }
        debug!(object = object_id, instance = instance_id, "Created object instance");
        Ok(created)
    }

    pub fn delete_instance(&mut self, id: u16) -> Result<()> {
        self.instances.delete(id)?;
        debug!(object = self.id, instance = id, "Deleted object instance");
        Ok(())
    }

    /// Deletes every instance `keep` rejects
    pub fn retain_instances<F: FnMut(&ObjectInstance) -> bool>(&mut self, keep: F) {
        self.instances.retain(keep);
    }

    /// Drains `converter` into the instances under `target`
    ///
    /// The instance set is snapshotted first and restored when any record
    /// fails, so the object is never left partially written. Change callbacks
    /// already delivered are not revoked.
    pub fn write(
        &mut self,
        converter: &mut dyn DataConverter,
        target: &Path,
        options: WriteOptions,
    ) -> Result<()> {
        let snapshot = self.instances.clone();
        let result = self.apply(converter, target, &options);
        if let Err(ref err) = result {
            warn!(object = self.id, target = %target, error = %err, "Write failed, restoring object");
            self.instances = snapshot;
        }
        result
    }

    fn apply(
        &mut self,
        converter: &mut dyn DataConverter,
        target: &Path,
        options: &WriteOptions,
    ) -> Result<()> {
        let mut prepared: Vec<u16> = Vec::new();
        let on_create = self.on_create.clone();

        if let Some(instance_id) = target.instance {
            if target.object != Some(self.id) {
                return Err(Error::InvalidValue);
            }
            if !self.instances.contains(instance_id) {
                self.create_instance(Some(instance_id))?;
                prepared.push(instance_id);
            }
        }

        while let Some(record) = converter.next_decoding()? {
            if record.path.object != Some(self.id) || !target.contains(&record.path) {
                return Err(Error::InvalidValue);
            }
            let instance_id = record.path.instance.ok_or(Error::InvalidValue)?;

            if !self.instances.contains(instance_id) {
                self.create_instance(Some(instance_id))?;
                prepared.push(instance_id);
            }
            let instance = self.instances.get_mut(instance_id).ok_or(Error::NotFound)?;

            if options.replace && !prepared.contains(&instance_id) {
                match target.resource {
                    Some(resource_id) => instance.reset_resource(resource_id)?,
                    None if options.check_operation => instance.reset_writable(),
                    None => {
                        instance.reset();
                        if let Some(callback) = &on_create {
                            callback(instance);
                        }
                    }
                }
                prepared.push(instance_id);
            }

            instance.write_record(&record, options)?;
        }
        Ok(())
    }

    /// Appends the readable resources under `target` to `out`
    pub fn read_into(&self, target: &Path, check_operation: bool, out: &mut Vec<ResourceData>) -> Result<()> {
        match target.instance {
            Some(instance_id) => self
                .instances
                .get(instance_id)
                .ok_or(Error::NotFound)?
                .read_into(target, check_operation, out),
            None => {
                for instance in &self.instances {
                    instance.read_into(&instance.path(), check_operation, out)?;
                }
                Ok(())
            }
        }
    }
}

/// Builder for [`Object`] schemas
pub struct ObjectBuilder {
    id: u16,
    interfaces: Interfaces,
    multiple: bool,
    mandatory: bool,
    max_instances: usize,
    descriptors: Vec<ResourceDescriptor>,
    on_create: Option<InstanceCallback>,
}

impl std::fmt::Debug for ObjectBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBuilder")
            .field("id", &self.id)
            .field("interfaces", &self.interfaces)
            .field("multiple", &self.multiple)
            .field("max_instances", &self.max_instances)
            .field("descriptors", &self.descriptors)
            .finish_non_exhaustive()
    }
}

impl ObjectBuilder {
    /// A single-instance object visible on every interface
    pub fn new(id: u16) -> Self {
        Self {
            id,
            interfaces: Interfaces::all(),
            multiple: false,
            mandatory: false,
            max_instances: 1,
            descriptors: Vec::new(),
            on_create: None,
        }
    }

    pub fn interfaces(mut self, interfaces: Interfaces) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Allows up to `max_instances` instances, 0 for unbounded
    pub fn multiple(mut self, max_instances: usize) -> Self {
        self.multiple = true;
        self.max_instances = max_instances;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn resource(mut self, descriptor: ResourceDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Runs `callback` on every new instance, and after a full Write-Replace reset
    pub fn on_create<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut ObjectInstance) + 'static,
    {
        self.on_create = Some(Rc::new(callback));
        self
    }

    /// Fails with `AlreadyExists` when two descriptors share an id
    pub fn build(mut self) -> Result<Object> {
        self.descriptors.sort_by_key(|d| d.id);
        if self.descriptors.windows(2).any(|pair| pair[0].id == pair[1].id) {
            return Err(Error::AlreadyExists);
        }

        Ok(Object {
            id: self.id,
            interfaces: self.interfaces,
            multiple: self.multiple,
            mandatory: self.mandatory,
            descriptors: self.descriptors.into_iter().map(Rc::new).collect(),
            instances: OrderedStorage::new(self.max_instances),
            on_create: self.on_create,
        })
    }
}
