/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Initiator endpoint: actively opens a TCP connection and runs one
//! session over it.

use crate::application::Application;
use crate::runner::{SessionHandle, run_session};
use fixwire_core::error::{FixError, SessionError};
use fixwire_dictionary::Dictionary;
use fixwire_session::config::SessionConfig;
use fixwire_session::session::Session;
use fixwire_session::state::SessionRole;
use fixwire_store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;
use tracing::info;

/// A connected initiator session.
pub struct Initiator {
    handle: SessionHandle,
    task: JoinHandle<Result<(), FixError>>,
}

impl Initiator {
    /// Connects to the acceptor and spawns the session task; the logon
    /// handshake starts immediately.
    ///
    /// # Errors
    /// Returns `SessionError::Connection` if the connect times out and
    /// `FixError::Io` if it fails outright.
    pub async fn connect<A>(
        addr: impl ToSocketAddrs,
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        dictionary: Option<Arc<Dictionary>>,
        application: Arc<A>,
        connect_timeout: Duration,
    ) -> Result<Self, FixError>
    where
        A: Application + 'static,
    {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| SessionError::Connection("connect timed out".to_string()))??;
        stream.set_nodelay(true)?;

        info!(session = %config.session_id(), peer = ?stream.peer_addr().ok(), "connected");

        let mut session = Session::new(config, SessionRole::Initiator, store);
        if let Some(dictionary) = dictionary {
            session = session.with_dictionary(dictionary);
        }

        let (handle, outbound) = SessionHandle::new();
        let task = tokio::spawn(run_session(
            stream,
            session,
            application,
            handle.clone(),
            outbound,
        ));

        Ok(Self { handle, task })
    }

    /// Returns a handle for sending and shutdown.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Requests a graceful logout.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Waits for the session task to finish.
    ///
    /// # Errors
    /// Returns the session's terminal error, if any.
    pub async fn join(self) -> Result<(), FixError> {
        self.task
            .await
            .map_err(|err| FixError::Io(std::io::Error::other(err)))?
    }
}
