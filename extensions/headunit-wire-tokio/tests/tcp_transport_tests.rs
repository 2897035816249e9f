use headunit_wire::{
    engine::{ProtocolConfig, ProtocolEvent},
    frame::ServiceType,
    message::{LogicalMessage, RpcType},
};
use headunit_wire_tokio::{TcpTransport, TransportState};
use std::sync::{Arc, Mutex};
use tokio::{
    net::TcpListener,
    sync::mpsc::UnboundedReceiver,
    time::{Duration, sleep, timeout},
};

async fn next_event(rx: &mut UnboundedReceiver<ProtocolEvent>) -> ProtocolEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

async fn connected_pair() -> (
    (TcpTransport, UnboundedReceiver<ProtocolEvent>),
    (TcpTransport, UnboundedReceiver<ProtocolEvent>),
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let head_unit = tokio::spawn(async move {
        TcpTransport::accept(&listener, ProtocolConfig::default())
            .await
            .unwrap()
    });

    let module = TcpTransport::connect("127.0.0.1", port, ProtocolConfig::default())
        .await
        .unwrap();

    (module, head_unit.await.unwrap())
}

#[tokio::test]
async fn test_connect_errors_on_connection_failure() {
    // Use a port that's almost certainly unused.
    let result = TcpTransport::connect("127.0.0.1", 1, ProtocolConfig::default()).await;

    let err = result.err().expect("connection should fail");
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
}

#[tokio::test]
async fn test_session_and_message_over_tcp() {
    let ((module, mut module_events), (head_unit, mut head_unit_events)) = connected_pair().await;

    module.engine().start(ServiceType::Rpc).unwrap();

    let ProtocolEvent::SessionStarted { session_id, .. } = next_event(&mut head_unit_events).await
    else {
        panic!("head unit did not open the session");
    };

    let event = next_event(&mut module_events).await;
    assert_eq!(
        event,
        ProtocolEvent::SessionStarted {
            service_type: ServiceType::Rpc,
            session_id,
            version: 5,
        }
    );

    let request = LogicalMessage::rpc(
        session_id,
        RpcType::Request,
        42,
        1,
        br#"{"method":"Show"}"#.repeat(200),
    );
    module.engine().send(&request).unwrap();

    let ProtocolEvent::Message(received) = next_event(&mut head_unit_events).await else {
        panic!("expected a message");
    };
    assert_eq!(received.function_id, 42);
    assert_eq!(received.json_payload, request.json_payload);

    // And back the other way
    let response = LogicalMessage::rpc(session_id, RpcType::Response, 42, 1, b"{}".to_vec());
    head_unit.engine().send(&response).unwrap();

    let ProtocolEvent::Message(received) = next_event(&mut module_events).await else {
        panic!("expected a response");
    };
    assert_eq!(received.rpc_type, RpcType::Response);

    module.engine().end(session_id).unwrap();
    assert!(matches!(
        next_event(&mut head_unit_events).await,
        ProtocolEvent::SessionEnded { .. }
    ));
    assert!(matches!(
        next_event(&mut module_events).await,
        ProtocolEvent::SessionEnded { .. }
    ));
}

#[tokio::test]
async fn test_transport_state_change_handler() {
    let ((module, _module_events), (head_unit, mut head_unit_events)) = connected_pair().await;

    module.engine().start(ServiceType::Audio).unwrap();
    assert!(matches!(
        next_event(&mut head_unit_events).await,
        ProtocolEvent::SessionStarted { .. }
    ));

    let received_states = Arc::new(Mutex::new(Vec::new()));
    let states_clone = received_states.clone();
    head_unit.set_state_change_handler(move |state| {
        states_clone.lock().unwrap().push(state);
    });

    // Dropping the module aborts its tasks and closes the socket.
    drop(module);

    // Connection loss closes the head unit's sessions.
    assert!(matches!(
        next_event(&mut head_unit_events).await,
        ProtocolEvent::SessionEnded {
            service_type: ServiceType::Audio,
            ..
        }
    ));

    sleep(Duration::from_millis(50)).await;

    assert!(!head_unit.is_connected());
    assert!(head_unit.engine().active_sessions().is_empty());
    assert_eq!(
        *received_states.lock().unwrap(),
        vec![TransportState::Connected, TransportState::Disconnected]
    );
}
