//! The accept loop.

use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::observability::Logger;

use super::connection::{Connection, LiveSet};

/// A running socket server.
///
/// One task owns the accept loop; each accepted connection is registered in
/// the live set and handed to its own spawned handler task. A shutdown
/// signal during `accept` is the expected way the loop ends, not a failure.
pub struct Server {
    local_addr: SocketAddr,
    live: LiveSet,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Binds `addr` and starts accepting connections.
    ///
    /// `handler` runs once per inbound connection, on its own task; a slow
    /// or stuck conversation never blocks the accept loop.
    pub async fn start<A, H, Fut>(addr: A, handler: H) -> io::Result<Self>
    where
        A: ToSocketAddrs,
        H: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let live: LiveSet = Arc::new(Mutex::new(HashSet::new()));
        let (shutdown, shutdown_rx) = watch::channel(false);

        Logger::info("WEB_SERVER_STARTED", &[("addr", &local_addr.to_string())]);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            live.clone(),
            Arc::new(handler),
            shutdown_rx,
        ));

        Ok(Self {
            local_addr,
            live,
            shutdown,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// The address the server actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of server-side connections currently live.
    pub fn connection_count(&self) -> usize {
        self.live.lock().map(|set| set.len()).unwrap_or(0)
    }

    /// Stops accepting connections and waits for the accept loop to exit.
    ///
    /// Conversations already handed to handler tasks keep running; only the
    /// listener goes away.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let task = match self.accept_task.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(task) = task {
            let _ = task.await;
        }
        Logger::info(
            "WEB_SERVER_STOPPED",
            &[("addr", &self.local_addr.to_string())],
        );
    }
}

async fn accept_loop<H, Fut>(
    listener: TcpListener,
    live: LiveSet,
    handler: Arc<H>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    H: Fn(Connection) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                // The one expected way out of accept
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let registered = match live.lock() {
                            Ok(mut set) => {
                                set.insert(peer);
                                set.len()
                            }
                            Err(_) => continue,
                        };
                        Logger::trace(
                            "WEB_CONNECTION_ACCEPTED",
                            &[("peer", &peer.to_string()), ("live", &registered.to_string())],
                        );
                        let connection = Connection::new(stream, peer, Some(live.clone()));
                        let handler = handler.clone();
                        tokio::spawn(async move { handler(connection).await });
                    }
                    Err(e) => {
                        // One bad handshake should not take the server down
                        Logger::warn("WEB_ACCEPT_FAILED", &[("error", &e.to_string())]);
                    }
                }
            }
        }
    }
}
