//! In-memory transport implementation for local testing and development.
//!
//! Nodes sharing a [`LocalNetwork`] reach each other by address without any
//! network I/O. Connections are `tokio::io::duplex` pipes, so peers still go
//! through the same framing and read loop as TCP connections.

use crate::info;
use crate::network::peer::serve_connection;
use crate::network::transport::{ConnectionSink, Transport, TransportError};
use crate::types::wrapper_types::BoxFuture;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{duplex, split};

/// Buffer size of each in-memory pipe direction.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Registry of listening in-memory transports, keyed by address.
#[derive(Default)]
pub struct LocalNetwork {
    listeners: DashMap<String, ConnectionSink>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns `true` if some transport currently listens on `addr`.
    pub fn is_listening(&self, addr: &str) -> bool {
        self.listeners.contains_key(addr)
    }
}

/// In-memory [`Transport`] attached to a [`LocalNetwork`].
pub struct LocalTransport {
    network: Arc<LocalNetwork>,
    listening: Mutex<Option<(String, ConnectionSink)>>,
}

impl LocalTransport {
    pub fn new(network: &Arc<LocalNetwork>) -> Arc<Self> {
        Arc::new(LocalTransport {
            network: network.clone(),
            listening: Mutex::new(None),
        })
    }

    fn listening(&self) -> MutexGuard<'_, Option<(String, ConnectionSink)>> {
        self.listening.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for LocalTransport {
    fn listen(
        self: Arc<Self>,
        addr: String,
        sink: ConnectionSink,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async move {
            let mut listening = self.listening();
            if listening.is_some() {
                return Err(TransportError::AlreadyListening);
            }

            match self.network.listeners.entry(addr.clone()) {
                Entry::Occupied(_) => {
                    return Err(TransportError::Bind {
                        addr,
                        reason: "address in use".into(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(sink.clone());
                }
            }

            info!("server.local accepting new connections on {addr}");
            *listening = Some((addr, sink));
            Ok(())
        })
    }

    fn dial(
        self: Arc<Self>,
        addr: String,
        _timeout: Duration,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async move {
            let Some((local_addr, local_sink)) = self.listening().clone() else {
                return Err(TransportError::NotListening);
            };

            let remote_sink = match self.network.listeners.get(&addr) {
                Some(entry) => entry.value().clone(),
                None => {
                    return Err(TransportError::Dial {
                        addr,
                        reason: "connection refused".into(),
                    });
                }
            };

            let (near, far) = duplex(PIPE_CAPACITY);

            let (reader, writer) = split(near);
            tokio::spawn(serve_connection(reader, writer, addr, local_sink));

            let (reader, writer) = split(far);
            tokio::spawn(serve_connection(reader, writer, local_addr, remote_sink));

            Ok(())
        })
    }

    fn close(&self) {
        if let Some((addr, _)) = self.listening().take() {
            self.network.listeners.remove(&addr);
            info!("server.local listener on {addr} closed");
        }
    }
}
