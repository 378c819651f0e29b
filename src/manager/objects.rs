//! Schemas of the mandatory LWM2M 1.1 objects: Security, Server and Device

use crate::error::Result;
use crate::model::{
    Bounds, DataType, Interfaces, Object, ObjectInstance, Operations, ResourceDescriptor,
};

/// LWM2M Security object (id 0)
pub mod security {
    pub const OBJECT_ID: u16 = 0;

    pub const SERVER_URI: u16 = 0;
    pub const BOOTSTRAP_SERVER: u16 = 1;
    pub const SECURITY_MODE: u16 = 2;
    pub const PUBLIC_KEY_OR_IDENTITY: u16 = 3;
    pub const SERVER_PUBLIC_KEY: u16 = 4;
    pub const SECRET_KEY: u16 = 5;
    pub const SMS_SECURITY_MODE: u16 = 6;
    pub const SMS_BINDING_KEY_PARAMETERS: u16 = 7;
    pub const SMS_BINDING_SECRET_KEYS: u16 = 8;
    pub const SERVER_SMS_NUMBER: u16 = 9;
    pub const SHORT_SERVER_ID: u16 = 10;
    pub const CLIENT_HOLD_OFF_TIME: u16 = 11;
    pub const BOOTSTRAP_SERVER_ACCOUNT_TIMEOUT: u16 = 12;
    pub const MATCHING_TYPE: u16 = 13;
    pub const SNI: u16 = 14;
    pub const CERTIFICATE_USAGE: u16 = 15;
}

/// LWM2M Server object (id 1)
pub mod server {
    pub const OBJECT_ID: u16 = 1;

    pub const SHORT_SERVER_ID: u16 = 0;
    pub const LIFETIME: u16 = 1;
    pub const DEFAULT_MIN_PERIOD: u16 = 2;
    pub const DEFAULT_MAX_PERIOD: u16 = 3;
    pub const DISABLE: u16 = 4;
    pub const DISABLE_TIMEOUT: u16 = 5;
    pub const NOTIFICATION_STORING: u16 = 6;
    pub const BINDING: u16 = 7;
    pub const REGISTRATION_UPDATE_TRIGGER: u16 = 8;
    pub const BOOTSTRAP_REQUEST_TRIGGER: u16 = 9;
    pub const APN_LINK: u16 = 10;
    pub const TLS_DTLS_ALERT_CODE: u16 = 11;
    pub const LAST_BOOTSTRAPPED: u16 = 12;
    pub const REGISTRATION_PRIORITY_ORDER: u16 = 13;
    pub const INITIAL_REGISTRATION_DELAY: u16 = 14;
    pub const REGISTRATION_FAILURE_BLOCK: u16 = 15;
    pub const BOOTSTRAP_ON_REGISTRATION_FAILURE: u16 = 16;
    pub const COMMUNICATION_RETRY_COUNT: u16 = 17;
    pub const COMMUNICATION_RETRY_TIMER: u16 = 18;
    pub const COMMUNICATION_SEQUENCE_DELAY: u16 = 19;
    pub const COMMUNICATION_SEQUENCE_RETRY_COUNT: u16 = 20;
    pub const TRIGGER: u16 = 21;
    pub const PREFERRED_TRANSPORT: u16 = 22;
    pub const MUTE_SEND: u16 = 23;
}

/// LWM2M Device object (id 3)
pub mod device {
    pub const OBJECT_ID: u16 = 3;

    pub const MANUFACTURER: u16 = 0;
    pub const MODEL_NUMBER: u16 = 1;
    pub const SERIAL_NUMBER: u16 = 2;
    pub const FIRMWARE_VERSION: u16 = 3;
    pub const REBOOT: u16 = 4;
    pub const FACTORY_RESET: u16 = 5;
    pub const AVAILABLE_POWER_SOURCES: u16 = 6;
    pub const POWER_SOURCE_VOLTAGE: u16 = 7;
    pub const POWER_SOURCE_CURRENT: u16 = 8;
    pub const BATTERY_LEVEL: u16 = 9;
    pub const MEMORY_FREE: u16 = 10;
    pub const ERROR_CODE: u16 = 11;
    pub const RESET_ERROR_CODE: u16 = 12;
    pub const CURRENT_TIME: u16 = 13;
    pub const UTC_OFFSET: u16 = 14;
    pub const TIMEZONE: u16 = 15;
    pub const SUPPORTED_BINDING_AND_MODES: u16 = 16;
    pub const DEVICE_TYPE: u16 = 17;
    pub const HARDWARE_VERSION: u16 = 18;
    pub const SOFTWARE_VERSION: u16 = 19;
    pub const BATTERY_STATUS: u16 = 20;
    pub const MEMORY_TOTAL: u16 = 21;
    pub const EXT_DEV_INFO: u16 = 22;
}

const SECURITY_MAX_INSTANCES: usize = 4;
const SERVER_MAX_INSTANCES: usize = 3;
const MULTI_RESOURCE_MAX_INSTANCES: usize = 8;

const SSID_BOUNDS: Bounds = Bounds::Integer { min: 1, max: 65534 };
const URI_BOUNDS: Bounds = Bounds::Length { min: 0, max: 255 };

fn res(id: u16, data_type: DataType, operations: Operations) -> ResourceDescriptor {
    ResourceDescriptor::new(id, data_type, operations)
}

/// Keeps the Short Server ID in step with the Bootstrap-Server flag
///
/// A regular server account needs a Short Server ID; the bootstrap account
/// has none.
fn bootstrap_flag_changed(instance: &mut ObjectInstance, resource_id: u16, _: u16) {
    let Some(is_bootstrap) = instance.boolean(resource_id) else {
        return;
    };
    let has_ssid = instance
        .resource(security::SHORT_SERVER_ID)
        .is_some_and(|resource| !resource.is_empty());

    let result = match (is_bootstrap, has_ssid) {
        (false, false) => instance
            .create_resource_instance(security::SHORT_SERVER_ID, None, None)
            .map(|_| ()),
        (true, true) => instance.delete_resource_instance(security::SHORT_SERVER_ID, 0),
        _ => Ok(()),
    };
    if let Err(err) = result {
        tracing::warn!(instance = %instance.path(), error = %err, "Failed to update Short Server ID");
    }
}

pub fn security_object() -> Result<Object> {
    use security::*;
    use Operations as Op;

    Object::builder(OBJECT_ID)
        .interfaces(Interfaces::BOOTSTRAP)
        .multiple(SECURITY_MAX_INSTANCES)
        .mandatory()
        .resource(res(SERVER_URI, DataType::String, Op::empty()).mandatory().bounds(URI_BOUNDS))
        .resource(
            res(BOOTSTRAP_SERVER, DataType::Boolean, Op::empty())
                .mandatory()
                .on_change(bootstrap_flag_changed),
        )
        .on_create(|instance| bootstrap_flag_changed(instance, BOOTSTRAP_SERVER, 0))
        .resource(
            res(SECURITY_MODE, DataType::Integer, Op::empty())
                .mandatory()
                .bounds(Bounds::Integer { min: 0, max: 4 }),
        )
        .resource(res(PUBLIC_KEY_OR_IDENTITY, DataType::Opaque, Op::empty()).mandatory())
        .resource(res(SERVER_PUBLIC_KEY, DataType::Opaque, Op::empty()).mandatory())
        .resource(res(SECRET_KEY, DataType::Opaque, Op::empty()).mandatory())
        .resource(
            res(SMS_SECURITY_MODE, DataType::Integer, Op::empty())
                .bounds(Bounds::Integer { min: 0, max: 255 }),
        )
        .resource(
            res(SMS_BINDING_KEY_PARAMETERS, DataType::Opaque, Op::empty())
                .bounds(Bounds::Length { min: 6, max: 6 }),
        )
        .resource(
            res(SMS_BINDING_SECRET_KEYS, DataType::Opaque, Op::empty())
                .bounds(Bounds::Length { min: 16, max: 32 }),
        )
        .resource(res(SERVER_SMS_NUMBER, DataType::String, Op::empty()))
        .resource(res(SHORT_SERVER_ID, DataType::Integer, Op::empty()).bounds(SSID_BOUNDS))
        .resource(res(CLIENT_HOLD_OFF_TIME, DataType::Integer, Op::empty()))
        .resource(res(BOOTSTRAP_SERVER_ACCOUNT_TIMEOUT, DataType::Integer, Op::empty()))
        .resource(
            res(MATCHING_TYPE, DataType::UnsignedInteger, Op::empty())
                .bounds(Bounds::Unsigned { min: 0, max: 3 }),
        )
        .resource(res(SNI, DataType::String, Op::empty()))
        .resource(
            res(CERTIFICATE_USAGE, DataType::UnsignedInteger, Op::empty())
                .bounds(Bounds::Unsigned { min: 0, max: 3 }),
        )
        .build()
}

pub fn server_object() -> Result<Object> {
    use server::*;
    use Operations as Op;

    Object::builder(OBJECT_ID)
        .interfaces(Interfaces::BOOTSTRAP | Interfaces::REGISTER | Interfaces::DEVICE)
        .multiple(SERVER_MAX_INSTANCES)
        .mandatory()
        .resource(res(SHORT_SERVER_ID, DataType::Integer, Op::READ).mandatory().bounds(SSID_BOUNDS))
        .resource(res(LIFETIME, DataType::Integer, Op::READ_WRITE).mandatory())
        .resource(res(DEFAULT_MIN_PERIOD, DataType::Integer, Op::READ_WRITE))
        .resource(res(DEFAULT_MAX_PERIOD, DataType::Integer, Op::READ_WRITE))
        .resource(res(DISABLE, DataType::None, Op::EXECUTE))
        .resource(res(DISABLE_TIMEOUT, DataType::Integer, Op::READ_WRITE))
        .resource(res(NOTIFICATION_STORING, DataType::Boolean, Op::READ_WRITE).mandatory())
        .resource(res(BINDING, DataType::String, Op::READ_WRITE).mandatory())
        .resource(res(REGISTRATION_UPDATE_TRIGGER, DataType::None, Op::EXECUTE).mandatory())
        .resource(res(BOOTSTRAP_REQUEST_TRIGGER, DataType::None, Op::EXECUTE))
        .resource(res(APN_LINK, DataType::ObjectLink, Op::READ_WRITE))
        .resource(
            res(TLS_DTLS_ALERT_CODE, DataType::UnsignedInteger, Op::READ)
                .bounds(Bounds::Unsigned { min: 0, max: 255 }),
        )
        .resource(res(LAST_BOOTSTRAPPED, DataType::Time, Op::READ))
        .resource(res(REGISTRATION_PRIORITY_ORDER, DataType::UnsignedInteger, Op::READ_WRITE))
        .resource(res(INITIAL_REGISTRATION_DELAY, DataType::UnsignedInteger, Op::READ_WRITE))
        .resource(res(REGISTRATION_FAILURE_BLOCK, DataType::Boolean, Op::READ_WRITE))
        .resource(res(BOOTSTRAP_ON_REGISTRATION_FAILURE, DataType::Boolean, Op::READ_WRITE))
        .resource(res(COMMUNICATION_RETRY_COUNT, DataType::UnsignedInteger, Op::READ_WRITE))
        .resource(res(COMMUNICATION_RETRY_TIMER, DataType::UnsignedInteger, Op::READ_WRITE))
        .resource(res(COMMUNICATION_SEQUENCE_DELAY, DataType::UnsignedInteger, Op::READ_WRITE))
        .resource(res(
            COMMUNICATION_SEQUENCE_RETRY_COUNT,
            DataType::UnsignedInteger,
            Op::READ_WRITE,
        ))
        .resource(res(TRIGGER, DataType::Boolean, Op::READ_WRITE))
        .resource(res(PREFERRED_TRANSPORT, DataType::String, Op::READ_WRITE))
        .resource(res(MUTE_SEND, DataType::Boolean, Op::READ_WRITE))
        .build()
}

pub fn device_object() -> Result<Object> {
    use device::*;
    use Operations as Op;

    let multi = MULTI_RESOURCE_MAX_INSTANCES;

    Object::builder(OBJECT_ID)
        .mandatory()
        .resource(res(MANUFACTURER, DataType::String, Op::READ))
        .resource(res(MODEL_NUMBER, DataType::String, Op::READ))
        .resource(res(SERIAL_NUMBER, DataType::String, Op::READ))
        .resource(res(FIRMWARE_VERSION, DataType::String, Op::READ))
        .resource(res(REBOOT, DataType::None, Op::EXECUTE).mandatory())
        .resource(res(FACTORY_RESET, DataType::None, Op::EXECUTE))
        .resource(
            res(AVAILABLE_POWER_SOURCES, DataType::Integer, Op::READ)
                .multiple(multi)
                .bounds(Bounds::Integer { min: 0, max: 7 }),
        )
        .resource(res(POWER_SOURCE_VOLTAGE, DataType::Integer, Op::READ).multiple(multi))
        .resource(res(POWER_SOURCE_CURRENT, DataType::Integer, Op::READ).multiple(multi))
        .resource(
            res(BATTERY_LEVEL, DataType::Integer, Op::READ)
                .bounds(Bounds::Integer { min: 0, max: 100 }),
        )
        .resource(res(MEMORY_FREE, DataType::Integer, Op::READ))
        .resource(
            res(ERROR_CODE, DataType::Integer, Op::READ)
                .mandatory()
                .multiple(multi)
                .bounds(Bounds::Integer { min: 0, max: 32 }),
        )
        .resource(res(RESET_ERROR_CODE, DataType::None, Op::EXECUTE))
        .resource(res(CURRENT_TIME, DataType::Time, Op::READ_WRITE))
        .resource(res(UTC_OFFSET, DataType::String, Op::READ_WRITE))
        .resource(res(TIMEZONE, DataType::String, Op::READ_WRITE))
        .resource(res(SUPPORTED_BINDING_AND_MODES, DataType::String, Op::READ).mandatory())
        .resource(res(DEVICE_TYPE, DataType::String, Op::READ))
        .resource(res(HARDWARE_VERSION, DataType::String, Op::READ))
        .resource(res(SOFTWARE_VERSION, DataType::String, Op::READ))
        .resource(
            res(BATTERY_STATUS, DataType::Integer, Op::READ)
                .bounds(Bounds::Integer { min: 0, max: 6 }),
        )
        .resource(res(MEMORY_TOTAL, DataType::Integer, Op::READ))
        .resource(res(EXT_DEV_INFO, DataType::ObjectLink, Op::READ).multiple(multi))
        .build()
}
