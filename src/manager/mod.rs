//! The object registry and path-addressed operations over it
//!
//! [`ObjectManager`] owns every [`Object`] and the converter registry. It
//! resolves Bootstrap and Device Management interface operations down to the
//! object that serves them, with the visibility and permission rules of each
//! interface applied.

use tracing::{debug, info};

use crate::converter::{self, DataConverter, Format};
use crate::error::{Error, Result};
use crate::model::{Interfaces, Object, ObjectInstance, Path, ResourceData, Value, WriteOptions};
use crate::storage::{Identified, OrderedStorage};

pub mod objects;

pub use objects::{device, security, server};

/// Supported binding reported by the Device object
const SUPPORTED_BINDING: &str = "U";

pub struct ObjectManager {
    objects: OrderedStorage<Object>,
    converters: Vec<Box<dyn DataConverter>>,
}

impl std::fmt::Debug for ObjectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectManager")
            .field("objects", &self.objects.ids().collect::<Vec<_>>())
            .field(
                "converters",
                &self.converters.iter().map(|c| c.format()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for ObjectManager {
    fn default() -> Self {
        Self {
            objects: OrderedStorage::new(0),
            converters: converter::default_converters(),
        }
    }
}

impl ObjectManager {
    /// A manager holding the Security, Server and Device objects
    ///
    /// The Device object gets its single instance 0 right away.
    pub fn new() -> Result<Self> {
        let mut manager = Self::default();
        manager.add_object(objects::security_object()?)?;
        manager.add_object(objects::server_object()?)?;

        let mut device_object = objects::device_object()?;
        let instance = device_object.create_instance(Some(0))?;
        instance.set_value(device::ERROR_CODE, Some(0), Value::Integer(0))?;
        instance.set_value(
            device::SUPPORTED_BINDING_AND_MODES,
            None,
            Value::String(SUPPORTED_BINDING.to_string()),
        )?;
        manager.add_object(device_object)?;

        Ok(manager)
    }

    /// Registers `converter`, replacing one registered for the same format
    pub fn register_converter(&mut self, converter: Box<dyn DataConverter>) {
        let format = converter.format();
        self.converters.retain(|c| c.format() != format);
        self.converters.push(converter);
    }

    pub fn supports(&self, format: Format) -> bool {
        self.converters.iter().any(|c| c.format() == format)
    }

    /// Adds an application object; fails with `AlreadyExists` on an id clash
    pub fn add_object(&mut self, object: Object) -> Result<()> {
        let id = object.id();
        self.objects.create_with(Some(id), |_| object)?;
        debug!(object = id, "Object added");
        Ok(())
    }

    pub fn remove_object(&mut self, id: u16) -> Result<Object> {
        self.objects.delete(id)
    }

    pub fn object(&self, id: u16) -> Option<&Object> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: u16) -> Option<&mut Object> {
        self.objects.get_mut(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }

    pub fn instance(&self, object_id: u16, instance_id: u16) -> Option<&ObjectInstance> {
        self.object(object_id)?.instance(instance_id)
    }

    pub fn instance_mut(&mut self, object_id: u16, instance_id: u16) -> Option<&mut ObjectInstance> {
        self.object_mut(object_id)?.instance_mut(instance_id)
    }

    fn visible_object(&self, id: Option<u16>, interface: Interfaces) -> Result<&Object> {
        let id = id.ok_or(Error::InvalidValue)?;
        self.objects
            .get(id)
            .filter(|object| object.is_visible(interface))
            .ok_or(Error::NotFound)
    }

    /// Decodes `data` in `format` and writes it through one object
    fn write(
        &mut self,
        format: Format,
        data: &[u8],
        target: &Path,
        interface: Interfaces,
        options: WriteOptions,
    ) -> Result<()> {
        self.visible_object(target.object, interface)?;

        let converter = self
            .converters
            .iter_mut()
            .find(|c| c.format() == format)
            .ok_or(Error::UnsupportedFormat)?;
        let object = target
            .object
            .and_then(|id| self.objects.get_mut(id))
            .ok_or(Error::NotFound)?;

        converter.start_decoding(target, data)?;
        object.write(converter.as_mut(), target, options)
    }

    /// Reads the records under `target` that `interface` can see
    pub fn read_records(
        &self,
        target: &Path,
        interface: Interfaces,
        check_operation: bool,
    ) -> Result<Vec<ResourceData>> {
        let object = self.visible_object(target.object, interface)?;
        let mut records = Vec::new();
        object.read_into(target, check_operation, &mut records)?;
        Ok(records)
    }

    /// Encodes `records` in `format`
    pub fn encode(&mut self, format: Format, records: &[ResourceData], capacity: usize) -> Result<Vec<u8>> {
        let converter = self
            .converters
            .iter_mut()
            .find(|c| c.format() == format)
            .ok_or(Error::UnsupportedFormat)?;
        converter::encode_all(converter.as_mut(), records, capacity)
    }

    /// Bootstrap-Write: no operation checks, missing instances are created
    pub fn bootstrap_write(&mut self, format: Format, data: &[u8], target: &Path) -> Result<()> {
        let options = WriteOptions {
            check_operation: false,
            ignore_missing: true,
            replace: false,
        };
        self.write(format, data, target, Interfaces::BOOTSTRAP, options)?;
        info!(target = %target, "Bootstrap write applied");
        Ok(())
    }

    pub fn bootstrap_read(&mut self, format: Format, target: &Path, capacity: usize) -> Result<Vec<u8>> {
        let records = self.read_records(target, Interfaces::BOOTSTRAP, false)?;
        self.encode(format, &records, capacity)
    }

    /// Bootstrap-Delete
    ///
    /// The root and the Security object keep the Bootstrap-Server account.
    /// Deleting that account or the Device object fails with `NotAllowed`.
    pub fn bootstrap_delete(&mut self, target: &Path) -> Result<()> {
        if target.resource.is_some() {
            return Err(Error::NotAllowed);
        }

        let Some(object_id) = target.object else {
            for object in self.objects.iter_mut() {
                if object.is_visible(Interfaces::BOOTSTRAP) && object.id() != device::OBJECT_ID {
                    retain_bootstrap_account(object);
                }
            }
            info!("Bootstrap delete of all instances");
            return Ok(());
        };

        if object_id == device::OBJECT_ID {
            return Err(Error::NotAllowed);
        }
        let object = self
            .objects
            .get_mut(object_id)
            .filter(|object| object.is_visible(Interfaces::BOOTSTRAP))
            .ok_or(Error::NotFound)?;

        match target.instance {
            None => retain_bootstrap_account(object),
            Some(instance_id) => {
                let instance = object.instance(instance_id).ok_or(Error::NotFound)?;
                if is_bootstrap_account(instance) {
                    return Err(Error::NotAllowed);
                }
                object.delete_instance(instance_id)?;
            }
        }
        info!(target = %target, "Bootstrap delete applied");
        Ok(())
    }

    /// Device Management Read
    pub fn device_read(&mut self, format: Format, target: &Path, capacity: usize) -> Result<Vec<u8>> {
        let records = self.read_records(target, Interfaces::DEVICE, true)?;
        self.encode(format, &records, capacity)
    }

    /// Device Management Write: Write-Replace when `replace`, Write-Partial-Update otherwise
    pub fn device_write(&mut self, format: Format, data: &[u8], target: &Path, replace: bool) -> Result<()> {
        let instance_id = target.instance.ok_or(Error::InvalidValue)?;
        let object = self.visible_object(target.object, Interfaces::DEVICE)?;
        if object.instance(instance_id).is_none() {
            return Err(Error::NotFound);
        }

        let options = WriteOptions {
            check_operation: true,
            ignore_missing: false,
            replace,
        };
        self.write(format, data, target, Interfaces::DEVICE, options)
    }

    /// Device Management Execute on a resource path
    pub fn device_execute(&mut self, target: &Path, arguments: &str) -> Result<()> {
        if target.depth() != 3 {
            return Err(Error::InvalidValue);
        }
        self.visible_object(target.object, Interfaces::DEVICE)?;

        let (Some(object_id), Some(instance_id), Some(resource_id)) =
            (target.object, target.instance, target.resource)
        else {
            return Err(Error::InvalidValue);
        };
        let instance = self
            .instance_mut(object_id, instance_id)
            .ok_or(Error::NotFound)?;
        debug!(target = %target, "Execute");
        instance.execute(resource_id, arguments)
    }

    /// Device Management Create; returns the new instance id
    pub fn device_create(
        &mut self,
        format: Format,
        data: &[u8],
        object_id: u16,
        instance_id: Option<u16>,
    ) -> Result<u16> {
        let object = self.visible_object(Some(object_id), Interfaces::DEVICE)?;
        let instance_id = match instance_id {
            Some(id) if object.instance(id).is_some() => return Err(Error::AlreadyExists),
            Some(id) => id,
            None => (0..u16::MAX)
                .find(|id| object.instance(*id).is_none())
                .ok_or(Error::OutOfCapacity)?,
        };
        if object.max_instances() > 0 && object.len() >= object.max_instances() {
            return Err(Error::OutOfCapacity);
        }

        let options = WriteOptions {
            check_operation: true,
            ignore_missing: false,
            replace: false,
        };
        let target = Path::instance(object_id, instance_id);
        self.write(format, data, &target, Interfaces::DEVICE, options)?;
        info!(target = %target, "Instance created");
        Ok(instance_id)
    }

    /// Device Management Delete of an object instance
    pub fn device_delete(&mut self, target: &Path) -> Result<()> {
        let (Some(object_id), Some(instance_id), None) = (target.object, target.instance, target.resource)
        else {
            return Err(Error::InvalidValue);
        };
        let object = self.visible_object(Some(object_id), Interfaces::DEVICE)?;
        if object.is_mandatory() && !object.is_multiple() {
            return Err(Error::NotAllowed);
        }

        self.objects
            .get_mut(object_id)
            .ok_or(Error::NotFound)?
            .delete_instance(instance_id)
    }

    /// The CoRE link format object list sent in Register and Update
    ///
    /// `</>;rt="oma.lwm2m";ct=110,<1/0>,<3/0>`; an object without instances
    /// is listed as `<oid>`.
    pub fn registration_object_list(&self, format: Format) -> String {
        let mut list = format!("</>;rt=\"oma.lwm2m\";ct={}", format.id());

        for object in self.objects.iter().filter(|o| o.is_visible(Interfaces::REGISTER)) {
            if object.is_empty() {
                list.push_str(&format!(",<{}>", object.id()));
            }
            for instance in object.instances() {
                list.push_str(&format!(",<{}/{}>", object.id(), instance.id()));
            }
        }
        list
    }

    /// The Security instance of the regular server `ssid`
    pub fn security_instance_for(&self, ssid: u16) -> Option<&ObjectInstance> {
        self.object(security::OBJECT_ID)?.instances().find(|instance| {
            !is_bootstrap_account(instance)
                && instance.integer(security::SHORT_SERVER_ID) == Some(i64::from(ssid))
        })
    }

    /// The Security instance flagged as Bootstrap-Server
    pub fn bootstrap_security_instance(&self) -> Option<&ObjectInstance> {
        self.object(security::OBJECT_ID)?
            .instances()
            .find(|instance| is_bootstrap_account(instance))
    }

    /// The Server instance with Short Server ID `ssid`
    pub fn server_instance_for(&self, ssid: u16) -> Option<&ObjectInstance> {
        self.object(server::OBJECT_ID)?
            .instances()
            .find(|instance| instance.integer(server::SHORT_SERVER_ID) == Some(i64::from(ssid)))
    }
}

fn is_bootstrap_account(instance: &ObjectInstance) -> bool {
    instance.object_id() == security::OBJECT_ID
        && instance.boolean(security::BOOTSTRAP_SERVER) == Some(true)
}

fn retain_bootstrap_account(object: &mut Object) {
    object.retain_instances(is_bootstrap_account);
}
