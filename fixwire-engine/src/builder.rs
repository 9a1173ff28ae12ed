/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Engine builder for fluent endpoint configuration.

use crate::acceptor::Acceptor;
use crate::application::{Application, NoOpApplication};
use crate::initiator::Initiator;
use fixwire_core::error::{FixError, SessionError};
use fixwire_dictionary::Dictionary;
use fixwire_session::config::SessionConfig;
use fixwire_store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::ToSocketAddrs;

/// Builder assembling an initiator or acceptor endpoint from its parts.
pub struct EngineBuilder<A: Application = NoOpApplication> {
    application: Arc<A>,
    config: Option<SessionConfig>,
    dictionary: Option<Arc<Dictionary>>,
    connect_timeout: Duration,
}

impl Default for EngineBuilder<NoOpApplication> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<NoOpApplication> {
    /// Creates a builder with a no-op application.
    #[must_use]
    pub fn new() -> Self {
        Self {
            application: Arc::new(NoOpApplication),
            config: None,
            dictionary: None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl<A: Application + 'static> EngineBuilder<A> {
    /// Sets the application callback handler.
    #[must_use]
    pub fn with_application<B: Application>(self, application: B) -> EngineBuilder<B> {
        EngineBuilder {
            application: Arc::new(application),
            config: self.config,
            dictionary: self.dictionary,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Sets the session configuration.
    #[must_use]
    pub fn with_session(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the protocol dictionary used for inbound validation.
    #[must_use]
    pub fn with_dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Sets the TCP connect timeout for the initiator.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connects an initiator endpoint.
    ///
    /// # Errors
    /// Returns `SessionError::Configuration` without a session config, or
    /// a connection error.
    pub async fn connect(
        self,
        addr: impl ToSocketAddrs,
        store: Arc<dyn SessionStore>,
    ) -> Result<Initiator, FixError> {
        let config = self.config.ok_or_else(|| {
            SessionError::Configuration("session configuration is required".to_string())
        })?;
        Initiator::connect(
            addr,
            config,
            store,
            self.dictionary,
            self.application,
            self.connect_timeout,
        )
        .await
    }

    /// Binds an acceptor endpoint.
    ///
    /// # Errors
    /// Returns `SessionError::Configuration` without a session config, or
    /// a bind error.
    pub async fn bind(
        self,
        addr: impl ToSocketAddrs,
        store: Arc<dyn SessionStore>,
    ) -> Result<Acceptor<A>, FixError> {
        let config = self.config.ok_or_else(|| {
            SessionError::Configuration("session configuration is required".to_string())
        })?;
        Acceptor::bind(addr, config, store, self.dictionary, self.application).await
    }
}
