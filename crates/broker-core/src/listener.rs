//! The accept loop (C7): binds a TCP or Unix listener per `Config::bind`
//! and feeds every accepted connection through the admission gate (C5)
//! before handing it to the client registry.

use crate::config::Bind;
use crate::server::Core;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to bind TCP listener on {host}:{port}: {source}")]
    Tcp {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind Unix socket at {path}: {source}")]
    Unix {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    /// Binding is fatal on failure: the process should exit rather than
    /// retry or fall back, since an unreachable bind target is a
    /// configuration error the operator needs to see (§4.7, §4.8).
    pub async fn bind(bind: &Bind) -> Result<Self, BindError> {
        match bind {
            Bind::Tcp { host, port } => TcpListener::bind((host.as_str(), *port))
                .await
                .map(Listener::Tcp)
                .map_err(|source| BindError::Tcp {
                    host: host.clone(),
                    port: *port,
                    source,
                }),
            Bind::UnixSocket { path } => {
                if std::path::Path::new(path).exists() {
                    let _ = std::fs::remove_file(path);
                }
                UnixListener::bind(path).map(Listener::Unix).map_err(|source| BindError::Unix {
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    /// Runs forever. Each iteration first acquires an admission permit --
    /// blocking here, not inside the session -- so a full registry holds
    /// connection attempts at the TCP/Unix backlog rather than accepting
    /// and immediately rejecting them (§4.5).
    pub async fn serve(self, core: Arc<Core>) {
        info!(bind = ?core.config.bind, "listening for clients");
        loop {
            let permit = match core.clients.admission().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("admission semaphore closed; stopping accept loop");
                    return;
                }
            };

            match &self {
                Listener::Tcp(listener) => match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!(peer = %addr, "accepted connection");
                        core.clients.add(stream, permit, Arc::clone(&core));
                    }
                    Err(err) => {
                        error!(error = %err, "failed to accept TCP connection");
                        drop(permit);
                    }
                },
                Listener::Unix(listener) => match listener.accept().await {
                    Ok((stream, _addr)) => {
                        info!("accepted Unix socket connection");
                        core.clients.add(stream, permit, Arc::clone(&core));
                    }
                    Err(err) => {
                        error!(error = %err, "failed to accept Unix socket connection");
                        drop(permit);
                    }
                },
            }
        }
    }
}
