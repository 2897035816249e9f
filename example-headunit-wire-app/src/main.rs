use headunit_wire::{
    engine::{ProtocolConfig, ProtocolEvent},
    frame::ServiceType,
    message::{LogicalMessage, RpcType},
};
use headunit_wire_tokio::TcpTransport;
use std::error::Error;
use tokio::net::TcpListener;

const FUNCTION_ID_SHOW: u32 = 12;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Bind to a random available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    // Head unit: answers every request with an empty JSON object
    let head_unit_task = tokio::spawn(async move {
        let (head_unit, mut events) =
            TcpTransport::accept(&listener, ProtocolConfig::default()).await?;

        while let Some(event) = events.recv().await {
            match event {
                ProtocolEvent::Message(msg) if msg.rpc_type == RpcType::Request => {
                    tracing::info!(
                        "Head unit received function {} ({} JSON bytes)",
                        msg.function_id,
                        msg.json_payload.len()
                    );
                    let response = LogicalMessage::rpc(
                        msg.session_id,
                        RpcType::Response,
                        msg.function_id,
                        msg.correlation_id,
                        b"{\"success\":true}".to_vec(),
                    );
                    if let Err(err) = head_unit.engine().send(&response) {
                        tracing::warn!("Could not respond: {}", err);
                    }
                }
                ProtocolEvent::SessionEnded { .. } => break,
                other => tracing::info!("Head unit event: {:?}", other),
            }
        }

        Ok::<_, std::io::Error>(())
    });

    let (module, mut events) =
        TcpTransport::connect("127.0.0.1", port, ProtocolConfig::default()).await?;

    module.engine().start(ServiceType::Rpc)?;

    let session_id = loop {
        match events.recv().await {
            Some(ProtocolEvent::SessionStarted {
                session_id,
                version,
                ..
            }) => {
                println!("RPC session {session_id} started at protocol version {version}");
                break session_id;
            }
            Some(other) => println!("Module event: {other:?}"),
            None => return Err("connection closed during handshake".into()),
        }
    };

    let small = LogicalMessage::rpc(session_id, RpcType::Request, FUNCTION_ID_SHOW, 1, b"{}".to_vec());
    let large = LogicalMessage::rpc(
        session_id,
        RpcType::Request,
        FUNCTION_ID_SHOW,
        2,
        vec![b' '; 3000],
    );

    println!("Sent {} bytes", module.engine().send(&small)?);
    println!("Sent {} bytes", module.engine().send(&large)?);

    let mut responses = 0;
    while responses < 2 {
        match events.recv().await {
            Some(ProtocolEvent::Message(msg)) => {
                responses += 1;
                println!(
                    "Response to correlation id {}: {}",
                    msg.correlation_id,
                    String::from_utf8_lossy(&msg.json_payload)
                );
            }
            Some(other) => println!("Module event: {other:?}"),
            None => return Err("connection closed before responses arrived".into()),
        }
    }

    module.engine().end(session_id)?;

    while let Some(event) = events.recv().await {
        if let ProtocolEvent::SessionEnded { session_id, .. } = event {
            println!("RPC session {session_id} ended");
            break;
        }
    }

    head_unit_task.await??;

    Ok(())
}
