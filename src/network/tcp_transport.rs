//! TCP-based transport implementation for real network communication.
//!
//! # Connection model
//!
//! - `listen` binds a [`TcpListener`] and spawns an accept loop.
//! - Accepted and dialed streams are treated identically: each is split into
//!   read and write halves, the write half backs a [`StreamPeer`] and the
//!   read half is driven by [`serve_connection`] on its own task.
//! - `close` aborts the accept loop, which drops the listener. Established
//!   connections are not affected; the server disconnects those itself.

use crate::network::peer::serve_connection;
#[cfg(doc)]
use crate::network::peer::StreamPeer;
use crate::network::transport::{ConnectionSink, Transport, TransportError};
use crate::types::wrapper_types::BoxFuture;
use crate::{info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Pause after a failed accept, so persistent errors such as fd exhaustion do not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Default)]
struct ListenState {
    sink: Option<ConnectionSink>,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
}

/// Transport over plain TCP.
#[derive(Default)]
pub struct TcpTransport {
    state: Mutex<ListenState>,
}

impl TcpTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Address the listener is bound to, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state().local_addr
    }

    fn state(&self) -> MutexGuard<'_, ListenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn accept_loop(listener: TcpListener, sink: ConnectionSink) {
        Self::serve_accepts(|| listener.accept(), sink).await
    }

    async fn serve_accepts<A, F>(mut accept: A, sink: ConnectionSink)
    where
        A: FnMut() -> F,
        F: Future<Output = io::Result<(TcpStream, SocketAddr)>>,
    {
        loop {
            match accept().await {
                Ok((stream, _)) => Self::handle_conn(stream, sink.clone()),
                Err(e) => {
                    if sink.is_closed() {
                        return;
                    }
                    warn!("server.tcp accept error: {e}");
                    sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    fn handle_conn(stream: TcpStream, sink: ConnectionSink) {
        let endpoint = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let (reader, writer) = stream.into_split();
        tokio::spawn(serve_connection(reader, writer, endpoint, sink));
    }
}

impl Transport for TcpTransport {
    fn listen(
        self: Arc<Self>,
        addr: String,
        sink: ConnectionSink,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async move {
            if self.state().sink.is_some() {
                return Err(TransportError::AlreadyListening);
            }

            let listener = TcpListener::bind(&addr)
                .await
                .map_err(|e| TransportError::Bind {
                    addr: addr.clone(),
                    reason: e.to_string(),
                })?;
            let local_addr = listener.local_addr().ok();

            let mut state = self.state();
            if state.sink.is_some() {
                return Err(TransportError::AlreadyListening);
            }
            state.accept_task = Some(tokio::spawn(Self::accept_loop(listener, sink.clone())));
            state.sink = Some(sink);
            state.local_addr = local_addr;
            drop(state);

            info!(
                "server.tcp accepting new connections on {}",
                local_addr.map_or(addr, |a| a.to_string())
            );
            Ok(())
        })
    }

    fn dial(
        self: Arc<Self>,
        addr: String,
        dial_timeout: Duration,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async move {
            let sink = self
                .state()
                .sink
                .clone()
                .ok_or(TransportError::NotListening)?;

            let stream = match timeout(dial_timeout, TcpStream::connect(&addr)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    return Err(TransportError::Dial {
                        addr,
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    return Err(TransportError::DialTimeout {
                        addr,
                        timeout: dial_timeout,
                    });
                }
            };

            Self::handle_conn(stream, sink);
            Ok(())
        })
    }

    fn close(&self) {
        let mut state = self.state();
        state.sink = None;
        if let Some(task) = state.accept_task.take() {
            task.abort();
            info!("server.tcp listener closed");
        }
    }
}
