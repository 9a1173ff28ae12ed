//! FIX 4.4 session demo: an acceptor and an initiator in one process.
//!
//! The acceptor binds a local port, the initiator connects, both complete
//! the logon handshake, the initiator sends one order, and the session is
//! shut down gracefully.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fixwire::prelude::*;
use tracing::info;

struct Trader;

#[async_trait]
impl Application for Trader {
    async fn on_create(&self, session_id: &SessionId, _handle: SessionHandle) {
        info!("session created: {session_id}");
    }

    async fn on_logon(&self, session_id: &SessionId) {
        info!("logged on: {session_id}");
    }

    async fn on_logout(&self, session_id: &SessionId) {
        info!("logged out: {session_id}");
    }

    async fn on_logon_request(
        &self,
        session_id: &SessionId,
        _message: &OwnedMessage,
    ) -> std::result::Result<(), LogonReject> {
        info!("logon request on {session_id}, accepting");
        Ok(())
    }

    async fn from_admin(&self, message: &OwnedMessage, _session_id: &SessionId) {
        info!("admin message: {:?}", message.msg_type());
    }

    async fn from_app(&self, message: &OwnedMessage, _session_id: &SessionId) {
        info!(
            "application message {:?}, ClOrdID={:?}",
            message.msg_type(),
            message.get_field_str(11)
        );
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let heartbeat = Duration::from_secs(5);

    let acceptor = EngineBuilder::new()
        .with_application(Trader)
        .with_session(
            SessionConfig::new(
                CompId::new("EXCHANGE").unwrap(),
                CompId::new("TRADER").unwrap(),
                "FIX.4.4",
            )
            .with_heartbeat_interval(heartbeat),
        )
        .bind("127.0.0.1:0", Arc::new(MemoryStore::new()))
        .await?;
    let addr = acceptor.local_addr()?;
    let stop = acceptor.shutdown_token();
    let acceptor_task = tokio::spawn(acceptor.run());

    let initiator = EngineBuilder::new()
        .with_application(Trader)
        .with_session(
            SessionConfig::new(
                CompId::new("TRADER").unwrap(),
                CompId::new("EXCHANGE").unwrap(),
                "FIX.4.4",
            )
            .with_heartbeat_interval(heartbeat),
        )
        .connect(addr, Arc::new(MemoryStore::new()))
        .await?;

    // Give the logon handshake a moment, then trade.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let order = OutboundMessage::new(MsgType::NewOrderSingle)
        .field(11, "ORDER-1")
        .field(55, "EURUSD")
        .field(54, "1")
        .field(38, "100000");
    initiator.handle().send(order).await?;

    tokio::time::sleep(Duration::from_millis(200)).await;

    initiator.shutdown();
    initiator.join().await?;

    stop.cancel();
    acceptor_task.await??;

    Ok(())
}
