//! Bootstrap interface flows driven through the client

use std::cell::RefCell;
use std::rc::Rc;

use lwm2m_client::test_utils::{MockTransport, SentRequest};
use lwm2m_client::{BootstrapState, Client, ClientConfig, Error, Format, Path, Response, Result};

const BOOTSTRAP_ACCOUNT: &str =
    r#"[{"bn":"/0/0/","n":"0","vs":"coap://bootstrap"},{"n":"1","vb":true}]"#;

fn client() -> Client<MockTransport> {
    let mut client = Client::new(ClientConfig::new("bs-client"), MockTransport::new()).unwrap();
    client
        .manager_mut()
        .bootstrap_write(Format::SenmlJson, BOOTSTRAP_ACCOUNT.as_bytes(), &Path::object(0))
        .unwrap();
    client
}

fn bootstrapping() -> (Client<MockTransport>, Rc<RefCell<Vec<Result<()>>>>) {
    let mut client = client();
    let results = Rc::new(RefCell::new(Vec::new()));
    let sink = results.clone();
    client
        .bootstrap_request(Box::new(move |result| sink.borrow_mut().push(result)))
        .unwrap();
    client.transport_mut().complete_last(Ok(Response::default()));
    client.poll(1);
    (client, results)
}

#[test]
fn test_request_targets_bootstrap_account() {
    let (client, _) = bootstrapping();
    assert_eq!(client.bootstrap_state(), BootstrapState::Bootstrapping);
    match client.transport().sent() {
        [SentRequest::Bootstrap { session, request }] => {
            assert_eq!(request.endpoint, "bs-client");
            assert_eq!(client.transport().session_uri(*session), Some("coap://bootstrap"));
        }
        other => panic!("unexpected requests {other:?}"),
    }
}

#[test]
fn test_discover_after_provisioning() {
    let (mut client, _) = bootstrapping();
    let security = br#"[{"bn":"/0/1/","n":"0","vs":"coap://lwm2mserver"},{"n":"1","vb":false},{"n":"10","v":5}]"#;
    client
        .bootstrap_write(Format::SenmlJson, security, &Path::instance(0, 1))
        .unwrap();

    assert_eq!(
        client.bootstrap_discover(None).unwrap(),
        r#"lwm2m="1.1",</0/0>,</0/1>;ssid=5;uri=coap://lwm2mserver,</1>,</3/0>"#
    );
    assert_eq!(
        client.bootstrap_discover(Some(1)).unwrap(),
        r#"lwm2m="1.1",</1>"#
    );
}

#[test]
fn test_delete_bootstrap_account_not_allowed() {
    let (mut client, _) = bootstrapping();
    assert_eq!(
        client.bootstrap_delete(&Path::instance(0, 0)),
        Err(Error::NotAllowed)
    );
    assert_eq!(client.bootstrap_delete(&Path::object(3)), Err(Error::NotAllowed));
    assert!(client.manager().instance(0, 0).is_some());
}

#[test]
fn test_delete_all_keeps_bootstrap_account() {
    let (mut client, _) = bootstrapping();
    let server = br#"[{"bn":"/1/0/","n":"0","v":5},{"n":"1","v":30},{"n":"7","vs":"U"}]"#;
    client
        .bootstrap_write(Format::SenmlJson, server, &Path::object(1))
        .unwrap();
    assert!(client.manager().instance(1, 0).is_some());

    client.bootstrap_delete(&Path::root()).unwrap();
    assert!(client.manager().instance(0, 0).is_some());
    assert!(client.manager().instance(1, 0).is_none());
    assert!(client.manager().instance(3, 0).is_some());
}

#[test]
fn test_read_written_server() {
    let (mut client, _) = bootstrapping();
    let server = br#"[{"bn":"/1/0/","n":"0","v":5},{"n":"1","v":30},{"n":"7","vs":"U"}]"#;
    client
        .bootstrap_write(Format::SenmlJson, server, &Path::object(1))
        .unwrap();

    let text = client
        .bootstrap_read(Format::Text, &Path::resource(1, 0, 7))
        .unwrap();
    assert_eq!(text, b"U");
}

#[test]
fn test_finish_closes_session() {
    let (mut client, results) = bootstrapping();
    client.bootstrap_finish().unwrap();

    assert_eq!(client.bootstrap_state(), BootstrapState::Bootstrapped);
    assert_eq!(*results.borrow(), vec![Ok(())]);
    assert_eq!(client.transport().open_sessions(), 0);
    assert_eq!(client.poll(2), None);

    assert_eq!(client.bootstrap_discover(None), Err(Error::NotAllowed));
    assert_eq!(client.bootstrap_finish(), Err(Error::NotAllowed));
}

#[test]
fn test_operations_outside_bootstrap() {
    let mut client = client();
    assert_eq!(client.bootstrap_discover(None), Err(Error::NotAllowed));
    assert_eq!(
        client.bootstrap_write(Format::SenmlJson, b"[]", &Path::object(1)),
        Err(Error::NotAllowed)
    );
    assert_eq!(client.bootstrap_delete(&Path::root()), Err(Error::NotAllowed));
}

#[test]
fn test_timeout_reported() {
    let (mut client, results) = bootstrapping();
    assert_eq!(client.poll(30_000), Some(30_000));
    client.poll(60_000);

    assert_eq!(client.bootstrap_state(), BootstrapState::Init);
    assert_eq!(*results.borrow(), vec![Err(Error::Timeout)]);
}
