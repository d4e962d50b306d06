//! `DropfourServer` builder and server loop.
//!
//! This is the entry point for running a Dropfour server. It ties
//! together all the layers: transport → handler → protocol loop →
//! sessions and matchmaking.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use dropfour_engine::Strategy;
use dropfour_protocol::JsonCodec;
use dropfour_transport::{Transport, WebSocketTransport};
use tokio::sync::mpsc;

use crate::analytics::AnalyticsSink;
use crate::config::ProtocolConfig;
use crate::event::{Event, EventSender};
use crate::handler::handle_connection;
use crate::protocol::ConnectionProtocol;
use crate::store::ResultStore;
use crate::DropfourError;

/// Builder for configuring and starting a Dropfour server.
///
/// # Example
///
/// ```rust,ignore
/// use dropfour::prelude::*;
///
/// let server = DropfourServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(MemoryStore::new(), TracingAnalytics)
///     .await?;
/// server.run().await
/// ```
pub struct DropfourServerBuilder {
    bind_addr: String,
    config: ProtocolConfig,
    strategy: Option<Box<dyn Strategy>>,
}

impl DropfourServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: ProtocolConfig::default(),
            strategy: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets timers, bot name and bot strategy.
    pub fn protocol_config(mut self, config: ProtocolConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the bot with a custom strategy, ignoring
    /// `ProtocolConfig::strategy`.
    pub fn strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Binds the listener and wires up the protocol loop.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<S: ResultStore, A: AnalyticsSink>(
        self,
        store: S,
        analytics: A,
    ) -> Result<DropfourServer<S, A>, DropfourError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let (events, event_rx) = mpsc::unbounded_channel();
        let store = Arc::new(store);
        let mut protocol = ConnectionProtocol::new(
            self.config,
            events.clone(),
            Arc::clone(&store),
            Arc::new(analytics),
        );
        if let Some(strategy) = self.strategy {
            protocol = protocol.with_strategy(strategy);
        }

        Ok(DropfourServer {
            transport,
            protocol,
            events,
            event_rx,
            store,
            codec: Arc::new(JsonCodec),
        })
    }
}

impl Default for DropfourServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Dropfour server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct DropfourServer<S, A> {
    transport: WebSocketTransport,
    protocol: ConnectionProtocol<S, A>,
    events: EventSender,
    event_rx: mpsc::UnboundedReceiver<Event>,
    store: Arc<S>,
    codec: Arc<JsonCodec>,
}

impl DropfourServer<(), ()> {
    /// Creates a new builder.
    pub fn builder() -> DropfourServerBuilder {
        DropfourServerBuilder::new()
    }
}

impl<S: ResultStore, A: AnalyticsSink> DropfourServer<S, A> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, DropfourError> {
        Ok(self.transport.local_addr()?)
    }

    /// The result store, shared with the running server.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Runs until the process is terminated.
    pub async fn run(self) -> Result<(), DropfourError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops the
    /// protocol loop, which closes every open connection.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), DropfourError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            mut transport,
            protocol,
            events,
            event_rx,
            codec,
            ..
        } = self;

        let protocol_task = tokio::spawn(protocol.run(event_rx));
        tracing::info!(addr = ?transport.local_addr().ok(), "Dropfour server running");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = transport.accept() => match accepted {
                    Ok(conn) => {
                        let events = events.clone();
                        let codec = Arc::clone(&codec);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, events, codec).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        let _ = events.send(Event::Shutdown);
        if let Err(e) = protocol_task.await {
            tracing::error!(error = %e, "protocol loop panicked");
        }
        Ok(())
    }
}
