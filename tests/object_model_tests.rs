//! Application objects registered with the object manager and driven through
//! the Device Management operations

use std::cell::Cell;
use std::rc::Rc;

use lwm2m_client::model::Bounds;
use lwm2m_client::{
    DataType, Error, Format, Identified, Interfaces, Object, ObjectManager, Operations, Path,
    ResourceDescriptor, Value,
};

const SENSOR: u16 = 32769;

const VALUE: u16 = 0;
const PERIOD: u16 = 1;
const LABEL: u16 = 2;
const RESET: u16 = 3;
const THRESHOLDS: u16 = 4;

fn sensor_object(changes: Rc<Cell<u32>>) -> Object {
    Object::builder(SENSOR)
        .multiple(2)
        .resource(ResourceDescriptor::new(VALUE, DataType::Float, Operations::READ).mandatory())
        .resource(
            ResourceDescriptor::new(PERIOD, DataType::Integer, Operations::READ_WRITE)
                .mandatory()
                .bounds(Bounds::Integer { min: 1, max: 3600 })
                .on_change(move |_, _, _| changes.set(changes.get() + 1)),
        )
        .resource(
            ResourceDescriptor::new(LABEL, DataType::String, Operations::READ_WRITE)
                .bounds(Bounds::Length { min: 0, max: 8 }),
        )
        .resource(
            ResourceDescriptor::new(RESET, DataType::None, Operations::EXECUTE).on_execute(
                |instance, _| instance.set_value(VALUE, None, Value::Float(0.0)),
            ),
        )
        .resource(
            ResourceDescriptor::new(THRESHOLDS, DataType::Integer, Operations::READ_WRITE)
                .multiple(4),
        )
        .build()
        .unwrap()
}

fn manager() -> (ObjectManager, Rc<Cell<u32>>) {
    let changes = Rc::new(Cell::new(0));
    let mut manager = ObjectManager::new().unwrap();
    manager.add_object(sensor_object(changes.clone())).unwrap();
    (manager, changes)
}

fn create_sensor(manager: &mut ObjectManager) -> u16 {
    let payload = br#"[{"bn":"/32769/0/","n":"1","v":60},{"n":"2","vs":"kitchen"}]"#;
    manager
        .device_create(Format::SenmlJson, payload, SENSOR, Some(0))
        .unwrap()
}

#[test]
fn test_mandatory_single_resources_get_defaults() {
    let (mut manager, _) = manager();
    let object = manager.object_mut(SENSOR).unwrap();
    let instance = object.create_instance(None).unwrap();

    assert_eq!(instance.id(), 0);
    assert_eq!(instance.value(VALUE), Some(&Value::Float(0.0)));
    assert_eq!(instance.value(PERIOD), Some(&Value::Integer(1)));
    assert_eq!(instance.value(LABEL), None);
    assert!(instance.resource(THRESHOLDS).unwrap().is_empty());
}

#[test]
fn test_duplicate_object_rejected() {
    let (mut manager, changes) = manager();
    assert_eq!(
        manager.add_object(sensor_object(changes)),
        Err(Error::AlreadyExists)
    );
}

#[test]
fn test_create_then_read_back() {
    let (mut manager, changes) = manager();
    assert_eq!(create_sensor(&mut manager), 0);
    assert_eq!(changes.get(), 1);

    let text = manager
        .device_read(Format::Text, &Path::resource(SENSOR, 0, LABEL), 64)
        .unwrap();
    assert_eq!(text, b"kitchen");

    let json = manager
        .device_read(Format::SenmlJson, &Path::instance(SENSOR, 0), 256)
        .unwrap();
    let json = String::from_utf8(json).unwrap();
    assert!(json.contains(r#""vs":"kitchen""#), "{json}");
    assert!(json.contains(r#""n":"1","v":60"#), "{json}");
}

#[test]
fn test_create_out_of_capacity() {
    let (mut manager, _) = manager();
    create_sensor(&mut manager);
    let second = br#"[{"bn":"/32769/1/","n":"1","v":5}]"#;
    assert_eq!(
        manager.device_create(Format::SenmlJson, second, SENSOR, None),
        Ok(1)
    );
    let third = br#"[{"bn":"/32769/2/","n":"1","v":5}]"#;
    assert_eq!(
        manager.device_create(Format::SenmlJson, third, SENSOR, None),
        Err(Error::OutOfCapacity)
    );
    assert_eq!(
        manager.device_create(Format::SenmlJson, second, SENSOR, Some(1)),
        Err(Error::AlreadyExists)
    );
}

#[test]
fn test_out_of_bounds_write_leaves_value() {
    let (mut manager, changes) = manager();
    create_sensor(&mut manager);
    let fired = changes.get();

    let payload = br#"[{"bn":"/32769/0/","n":"1","v":7200}]"#;
    assert_eq!(
        manager.device_write(Format::SenmlJson, payload, &Path::instance(SENSOR, 0), false),
        Err(Error::InvalidValue)
    );
    assert_eq!(
        manager.instance(SENSOR, 0).unwrap().integer(PERIOD),
        Some(60)
    );
    assert_eq!(changes.get(), fired);
}

#[test]
fn test_failed_write_restores_instance() {
    let (mut manager, _) = manager();
    create_sensor(&mut manager);

    // the second record overflows the label length
    let payload = br#"[{"bn":"/32769/0/","n":"1","v":30},{"n":"2","vs":"living room"}]"#;
    assert_eq!(
        manager.device_write(Format::SenmlJson, payload, &Path::instance(SENSOR, 0), false),
        Err(Error::InvalidValue)
    );
    let instance = manager.instance(SENSOR, 0).unwrap();
    assert_eq!(instance.integer(PERIOD), Some(60));
    assert_eq!(instance.string(LABEL), Some("kitchen"));
}

#[test]
fn test_write_read_only_resource_not_allowed() {
    let (mut manager, _) = manager();
    create_sensor(&mut manager);

    let payload = br#"[{"bn":"/32769/0/","n":"0","v":21.5}]"#;
    assert_eq!(
        manager.device_write(Format::SenmlJson, payload, &Path::instance(SENSOR, 0), false),
        Err(Error::NotAllowed)
    );
}

#[test]
fn test_replace_clears_unlisted_resources() {
    let (mut manager, _) = manager();
    create_sensor(&mut manager);

    let payload = br#"[{"bn":"/32769/0/","n":"4/0","v":10},{"n":"4/1","v":20}]"#;
    manager
        .device_write(Format::SenmlJson, payload, &Path::instance(SENSOR, 0), true)
        .unwrap();

    let instance = manager.instance(SENSOR, 0).unwrap();
    assert_eq!(instance.string(LABEL), None);
    assert_eq!(instance.integer(PERIOD), Some(1));
    assert_eq!(instance.resource(THRESHOLDS).unwrap().len(), 2);
}

#[test]
fn test_replace_keeps_read_only_resources() {
    let (mut manager, _) = manager();
    create_sensor(&mut manager);
    manager
        .instance_mut(SENSOR, 0)
        .unwrap()
        .set_value(VALUE, None, Value::Float(21.5))
        .unwrap();

    let payload = br#"[{"bn":"/32769/0/","n":"1","v":90}]"#;
    manager
        .device_write(Format::SenmlJson, payload, &Path::instance(SENSOR, 0), true)
        .unwrap();

    let instance = manager.instance(SENSOR, 0).unwrap();
    assert_eq!(instance.value(VALUE), Some(&Value::Float(21.5)));
    assert_eq!(instance.integer(PERIOD), Some(90));
    assert_eq!(instance.string(LABEL), None);
}

#[test]
fn test_replace_server_keeps_short_server_id() {
    let mut manager = ObjectManager::new().unwrap();
    let server = br#"[{"bn":"/1/0/","n":"0","v":101},{"n":"1","v":30},{"n":"7","vs":"U"}]"#;
    manager
        .bootstrap_write(Format::SenmlJson, server, &Path::instance(1, 0))
        .unwrap();

    let payload = br#"[{"bn":"/1/0/","n":"1","v":60}]"#;
    manager
        .device_write(Format::SenmlJson, payload, &Path::instance(1, 0), true)
        .unwrap();

    let instance = manager.server_instance_for(101).unwrap();
    assert_eq!(instance.id(), 0);
    assert_eq!(instance.integer(0), Some(101));
    assert_eq!(instance.integer(1), Some(60));
    assert!(manager.server_instance_for(1).is_none());
}

#[test]
fn test_execute_callback() {
    let (mut manager, _) = manager();
    create_sensor(&mut manager);
    manager
        .instance_mut(SENSOR, 0)
        .unwrap()
        .set_value(VALUE, None, Value::Float(21.5))
        .unwrap();

    manager
        .device_execute(&Path::resource(SENSOR, 0, RESET), "")
        .unwrap();
    assert_eq!(
        manager.instance(SENSOR, 0).unwrap().value(VALUE),
        Some(&Value::Float(0.0))
    );
    assert_eq!(
        manager.device_execute(&Path::resource(SENSOR, 0, PERIOD), ""),
        Err(Error::NotAllowed)
    );
    assert_eq!(
        manager.device_execute(&Path::instance(SENSOR, 0), ""),
        Err(Error::InvalidValue)
    );
}

#[test]
fn test_delete_instance() {
    let (mut manager, _) = manager();
    create_sensor(&mut manager);

    manager.device_delete(&Path::instance(SENSOR, 0)).unwrap();
    assert!(manager.instance(SENSOR, 0).is_none());
    assert_eq!(
        manager.device_delete(&Path::instance(SENSOR, 0)),
        Err(Error::NotFound)
    );
    assert_eq!(
        manager.device_delete(&Path::instance(3, 0)),
        Err(Error::NotAllowed)
    );
}

#[test]
fn test_registration_object_list_includes_application_objects() {
    let (mut manager, _) = manager();
    assert_eq!(
        manager.registration_object_list(Format::SenmlJson),
        r#"</>;rt="oma.lwm2m";ct=110,<1>,<3/0>,<32769>"#
    );

    create_sensor(&mut manager);
    assert!(manager
        .registration_object_list(Format::SenmlJson)
        .ends_with(",<32769/0>"));
}

#[test]
fn test_hidden_object_not_reachable() {
    let mut manager = ObjectManager::new().unwrap();
    let object = Object::builder(SENSOR)
        .interfaces(Interfaces::BOOTSTRAP)
        .resource(ResourceDescriptor::new(VALUE, DataType::Float, Operations::READ))
        .build()
        .unwrap();
    manager.add_object(object).unwrap();

    assert_eq!(
        manager.device_read(Format::SenmlJson, &Path::object(SENSOR), 64),
        Err(Error::NotFound)
    );
}
