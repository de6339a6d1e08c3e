use futures_util::FutureExt;
use loopback_service::{LoopbackTransport, spawn_echo};
use std::time::Duration;
use xpc_bridge_core::codec::ConversionError;
use xpc_bridge_core::connection::{Connection, ConnectionOptions, ConnectionState, SendOutcome};
use xpc_bridge_core::dispatch::{Dispatcher, ErrorClass, Notification};
use xpc_bridge_core::uuid::Uuid;
use xpc_bridge_core::value::{Buffer, Dictionary, DynamicMap, DynamicValue, TypedValue};

const SERVICE: &str = "com.example.bridge";

fn identifier_bytes() -> Vec<u8> {
    (100u8..116).collect()
}

fn example_message() -> DynamicValue {
    [
        ("id", DynamicValue::from(Buffer::identifier(identifier_bytes()))),
        ("name", DynamicValue::from("svc")),
        ("tags", DynamicValue::List(vec!["a".into(), "b".into()])),
    ]
    .into_iter()
    .collect()
}

async fn next(dispatcher: &mut Dispatcher) -> Option<Notification> {
    tokio::time::timeout(Duration::from_secs(5), dispatcher.next_notification())
        .await
        .expect("timed out waiting for a notification")
}

fn event_payload(notification: Option<Notification>) -> DynamicMap {
    match notification {
        Some(Notification::Event { payload, .. }) => payload,
        other => panic!("expected an event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_send_delivers_typed_dictionary_to_service() {
    let transport = LoopbackTransport::new();
    let mut service = transport.register(SERVICE);

    let (connection, _dispatcher) = Connection::new(SERVICE, transport).setup();
    let mut peer = service.accept().await.expect("client should connect");

    let outcome = connection.send(&example_message());
    assert_eq!(outcome, SendOutcome::Sent { dropped: vec![] });

    let received = peer.recv_message().await.unwrap().unwrap();
    let dictionary = received.as_dictionary().expect("expected a dictionary");

    assert_eq!(
        dictionary["id"],
        TypedValue::Identifier(Uuid::from_slice(&identifier_bytes()).unwrap())
    );
    assert_eq!(dictionary["name"], TypedValue::from("svc"));
    assert_eq!(
        dictionary["tags"],
        TypedValue::Array(vec![TypedValue::from("a"), TypedValue::from("b")])
    );
}

#[tokio::test]
async fn test_echoed_messages_come_back_as_events_in_order() {
    let transport = LoopbackTransport::new();
    let _echo = spawn_echo(transport.register(SERVICE));

    let (connection, mut dispatcher) = Connection::new(SERVICE, transport).setup();

    for seq in 1..=3 {
        let message: DynamicValue = [("seq", DynamicValue::Integer(seq))].into_iter().collect();
        connection.send(&message);
    }

    for seq in 1..=3 {
        let payload = event_payload(next(&mut dispatcher).await);
        assert_eq!(payload["seq"], DynamicValue::Integer(seq));
    }
}

#[tokio::test]
async fn test_example_message_round_trips_through_the_service() {
    let transport = LoopbackTransport::new();
    let _echo = spawn_echo(transport.register(SERVICE));

    let (connection, mut dispatcher) = Connection::new(SERVICE, transport).setup();
    connection.send(&example_message());

    let payload = event_payload(next(&mut dispatcher).await);

    // The identifier marker is not propagated back, only the 16 bytes are.
    assert_eq!(
        payload["id"],
        DynamicValue::Buffer(Buffer::data(identifier_bytes()))
    );
    assert_eq!(payload["name"], DynamicValue::from("svc"));
    assert_eq!(
        payload["tags"],
        DynamicValue::List(vec!["a".into(), "b".into()])
    );
    assert_eq!(payload.len(), 3);
}

#[tokio::test]
async fn test_sending_a_non_map_is_a_no_op() {
    let transport = LoopbackTransport::new();
    let mut service = transport.register(SERVICE);

    let (connection, _dispatcher) = Connection::new(SERVICE, transport).setup();
    let mut peer = service.accept().await.unwrap();

    assert_eq!(connection.send(&DynamicValue::Integer(42)), SendOutcome::Ignored);
    assert_eq!(connection.send(&DynamicValue::from("x")), SendOutcome::Ignored);
    assert_eq!(connection.send(&DynamicValue::Null), SendOutcome::Ignored);
    assert_eq!(
        connection.send(&DynamicValue::List(vec![1.into()])),
        SendOutcome::Ignored
    );
    assert_eq!(
        connection.send(&DynamicValue::from(Buffer::data(vec![1u8, 2, 3]))),
        SendOutcome::Ignored
    );

    let marker: DynamicValue = [("marker", DynamicValue::Integer(1))].into_iter().collect();
    connection.send(&marker);

    let first = peer.recv_message().await.unwrap().unwrap();
    assert_eq!(first.as_dictionary().unwrap()["marker"], TypedValue::Int64(1));
    assert!(peer.try_recv_message().is_none());
}

#[tokio::test]
async fn test_unrepresentable_entries_are_sent_as_null_and_reported() {
    let transport = LoopbackTransport::new();
    let mut service = transport.register(SERVICE);

    let (connection, _dispatcher) = Connection::new(SERVICE, transport).setup();
    let mut peer = service.accept().await.unwrap();

    let message: DynamicValue = [
        ("flag", DynamicValue::Bool(true)),
        ("name", DynamicValue::from("svc")),
    ]
    .into_iter()
    .collect();

    let SendOutcome::Sent { dropped } = connection.send(&message) else {
        panic!("a map should be sent");
    };
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].path.to_string(), "$.flag");
    assert_eq!(
        dropped[0].error,
        ConversionError::UnrepresentableValue("boolean")
    );

    let received = peer.recv_message().await.unwrap().unwrap();
    let dictionary = received.as_dictionary().unwrap();
    assert_eq!(dictionary["flag"], TypedValue::Null);
    assert_eq!(dictionary["name"], TypedValue::from("svc"));
}

#[tokio::test]
async fn test_unknown_service_reports_connection_invalid() {
    let transport = LoopbackTransport::new();

    let (_connection, mut dispatcher) = Connection::new("com.example.missing", transport).setup();

    let notification = next(&mut dispatcher).await.unwrap();
    assert_eq!(notification, Notification::Error(ErrorClass::ConnectionInvalid));
    assert_eq!(
        notification.payload(),
        serde_json::json!({ "message": "connection invalid" })
    );
    assert_eq!(next(&mut dispatcher).await, None);
}

#[tokio::test]
async fn test_empty_service_name_fails_asynchronously() {
    let transport = LoopbackTransport::new();

    let (connection, mut dispatcher) = Connection::new("", transport).setup();
    assert_eq!(connection.state(), ConnectionState::Active);

    assert_eq!(
        next(&mut dispatcher).await,
        Some(Notification::Error(ErrorClass::ConnectionInvalid))
    );
}

#[tokio::test]
async fn test_lifecycle_signals_are_delivered_in_order() {
    let transport = LoopbackTransport::new();
    let mut service = transport.register(SERVICE);

    let (connection, mut dispatcher) = Connection::new(SERVICE, transport).setup();
    let peer = service.accept().await.unwrap();

    let dictionary: Dictionary = [("status".to_string(), TypedValue::from("up"))]
        .into_iter()
        .collect();

    assert!(peer.interrupt());
    assert!(peer.push_event(&TypedValue::Dictionary(dictionary)));
    assert!(peer.push_event(&TypedValue::Int64(5)));
    peer.invalidate();

    assert_eq!(
        next(&mut dispatcher).await,
        Some(Notification::Error(ErrorClass::ConnectionInterrupted))
    );
    let payload = event_payload(next(&mut dispatcher).await);
    assert_eq!(payload["status"], DynamicValue::from("up"));
    assert_eq!(
        next(&mut dispatcher).await,
        Some(Notification::Error(ErrorClass::ConnectionInvalid))
    );
    assert_eq!(next(&mut dispatcher).await, None);

    // Errors do not change the connection's own state
    assert_eq!(connection.state(), ConnectionState::Active);
}

#[tokio::test]
async fn test_unsupported_nodes_in_events_degrade_to_null() {
    let transport = LoopbackTransport::new();
    let mut service = transport.register(SERVICE);

    let (_connection, mut dispatcher) = Connection::new(SERVICE, transport).setup();
    let peer = service.accept().await.unwrap();

    let dictionary: Dictionary = [
        ("count".to_string(), TypedValue::Int64(2)),
        ("when".to_string(), TypedValue::Unsupported("date".into())),
    ]
    .into_iter()
    .collect();
    peer.push_event(&TypedValue::Dictionary(dictionary));

    match next(&mut dispatcher).await {
        Some(Notification::Event { payload, dropped }) => {
            assert_eq!(payload["count"], DynamicValue::Integer(2));
            assert_eq!(payload["when"], DynamicValue::Null);
            assert_eq!(dropped.len(), 1);
            assert_eq!(
                dropped[0].error,
                ConversionError::UnsupportedType("date".into())
            );
        }
        other => panic!("expected an event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_close_releases_transport_and_ends_dispatcher() {
    let transport = LoopbackTransport::new();
    let mut service = transport.register(SERVICE);

    let (connection, mut dispatcher) = Connection::new(SERVICE, transport).setup();
    let mut peer = service.accept().await.unwrap();

    let closed = connection.close();
    assert_eq!(closed.state(), ConnectionState::Closed);
    assert_eq!(closed.service_name(), SERVICE);

    assert_eq!(next(&mut dispatcher).await, None);
    assert!(peer.recv_message().await.is_none());
}

#[tokio::test]
async fn test_events_pushed_before_close_are_still_delivered() {
    let transport = LoopbackTransport::new();
    let mut service = transport.register(SERVICE);

    let (connection, mut dispatcher) = Connection::new(SERVICE, transport).setup();
    let peer = service.accept().await.unwrap();

    let dictionary: Dictionary = [("status".to_string(), TypedValue::from("up"))]
        .into_iter()
        .collect();
    assert!(peer.push_event(&TypedValue::Dictionary(dictionary)));

    // Closed before the background context had a chance to run.
    let _closed = connection.close();

    let payload = event_payload(next(&mut dispatcher).await);
    assert_eq!(payload["status"], DynamicValue::from("up"));
    assert_eq!(next(&mut dispatcher).await, None);

    drop(peer);
}

#[tokio::test]
async fn test_options_reach_the_transport() {
    let transport = LoopbackTransport::new();
    let mut service = transport.register(SERVICE);

    let options = ConnectionOptions::from_json(r#"{ "privileged": false }"#).unwrap();
    let (connection, _dispatcher) = Connection::new(SERVICE, transport)
        .with_options(options)
        .setup();
    let peer = service.accept().await.unwrap();

    assert!(!peer.is_privileged());
    assert!(!connection.options().privileged);
}

#[test]
fn test_setup_without_runtime_reports_connection_invalid() {
    let transport = LoopbackTransport::new();
    let _service = transport.register(SERVICE);

    let (_connection, mut dispatcher) = Connection::new(SERVICE, transport).setup();

    assert_eq!(
        dispatcher.next_notification().now_or_never(),
        Some(Some(Notification::Error(ErrorClass::ConnectionInvalid)))
    );
    assert_eq!(dispatcher.next_notification().now_or_never(), Some(None));
}
