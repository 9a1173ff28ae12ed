/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Acceptor endpoint: binds a TCP listener and runs one session per
//! inbound connection.

use crate::application::Application;
use crate::runner::{SessionHandle, run_session};
use fixwire_core::error::FixError;
use fixwire_dictionary::Dictionary;
use fixwire_session::config::SessionConfig;
use fixwire_session::session::Session;
use fixwire_session::state::SessionRole;
use fixwire_store::SessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A bound acceptor endpoint.
pub struct Acceptor<A: Application + 'static> {
    listener: TcpListener,
    config: SessionConfig,
    store: Arc<dyn SessionStore>,
    dictionary: Option<Arc<Dictionary>>,
    application: Arc<A>,
    token: CancellationToken,
}

impl<A: Application + 'static> Acceptor<A> {
    /// Binds the listener.
    ///
    /// # Errors
    /// Returns `FixError::Io` if the address cannot be bound.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        dictionary: Option<Arc<Dictionary>>,
        application: Arc<A>,
    ) -> Result<Self, FixError> {
        let listener = TcpListener::bind(addr).await?;
        info!(session = %config.session_id(), addr = %listener.local_addr()?, "acceptor listening");
        Ok(Self {
            listener,
            config,
            store,
            dictionary,
            application,
            token: CancellationToken::new(),
        })
    }

    /// Returns the bound address.
    ///
    /// # Errors
    /// Returns `FixError::Io` if the socket is gone.
    pub fn local_addr(&self) -> Result<SocketAddr, FixError> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns the token that stops the accept loop and shuts down the
    /// running sessions.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Accepts connections until the shutdown token fires, spawning one
    /// session task per connection.
    ///
    /// # Errors
    /// Returns `FixError::Io` if the listener fails.
    pub async fn run(self) -> Result<(), FixError> {
        loop {
            tokio::select! {
                () = self.token.cancelled() => {
                    info!(session = %self.config.session_id(), "acceptor stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    info!(session = %self.config.session_id(), %peer, "connection accepted");
                    if let Err(err) = stream.set_nodelay(true) {
                        error!(%peer, %err, "failed to configure socket");
                        continue;
                    }

                    let mut session = Session::new(
                        self.config.clone(),
                        SessionRole::Acceptor,
                        Arc::clone(&self.store),
                    );
                    if let Some(dictionary) = &self.dictionary {
                        session = session.with_dictionary(Arc::clone(dictionary));
                    }

                    let (handle, outbound) = SessionHandle::new();
                    let application = Arc::clone(&self.application);
                    let token = self.token.clone();
                    let session_handle = handle.clone();
                    tokio::spawn(async move {
                        // Acceptor-wide shutdown reaches into each session.
                        let watcher = {
                            let session_handle = session_handle.clone();
                            tokio::spawn(async move {
                                token.cancelled().await;
                                session_handle.shutdown();
                            })
                        };
                        if let Err(err) =
                            run_session(stream, session, application, session_handle, outbound)
                                .await
                        {
                            error!(%peer, %err, "session task failed");
                        }
                        watcher.abort();
                    });
                }
            }
        }
    }
}
