use log::{error, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::protocol::responses::{TOO_MANY_CLIENTS, default_text};
use crate::protocol::write_reply;
use crate::server::registry::SessionRegistry;
use crate::session::{SessionContext, handle_session};

pub struct Server {
    listener: TcpListener,
    registry: Arc<Mutex<SessionRegistry>>,
    ctx: Arc<SessionContext>,
}

impl Server {
    /// Prepares the session root and binds the control listener.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let root_error = |source: io::Error| ServerError::Root {
            path: config.server_root.clone(),
            source,
        };

        tokio::fs::create_dir_all(&config.server_root)
            .await
            .map_err(root_error)?;
        let root = tokio::fs::canonicalize(&config.server_root)
            .await
            .map_err(root_error)?;
        info!("Server root directory: {}", root.display());

        let addr = config.control_socket();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server bound to {}", addr);

        Ok(Self {
            listener,
            registry: Arc::new(Mutex::new(SessionRegistry::new(config.max_clients))),
            ctx: Arc::new(SessionContext::from_config(config, root)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves. Sessions already running
    /// are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        match self.local_addr() {
            Ok(addr) => info!("Accepting control connections on {}", addr),
            Err(e) => warn!("Accepting control connections on unknown address: {}", e),
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested; no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let registry = Arc::clone(&self.registry);
                        let ctx = Arc::clone(&self.ctx);

                        // One task per client so the accept loop never waits on a session
                        tokio::spawn(handle_new_client(stream, addr, registry, ctx));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                },
            }
        }
    }
}

/// Registers the client, runs its session and unregisters it afterwards.
async fn handle_new_client(
    mut stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<Mutex<SessionRegistry>>,
    ctx: Arc<SessionContext>,
) {
    {
        let mut sessions = registry.lock().await;
        if !sessions.try_register(addr) {
            warn!(
                "Rejecting {}: {} sessions already active",
                addr,
                sessions.max_sessions()
            );
            drop(sessions);
            let code = TOO_MANY_CLIENTS;
            if let Err(e) = write_reply(&mut stream, code, default_text(code)).await {
                warn!("Failed to send 421 to {}: {}", addr, e);
            }
            return;
        }
        info!(
            "Client connected from {} ({}/{} clients)",
            addr,
            sessions.active_sessions(),
            sessions.max_sessions()
        );
    }

    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
    }

    handle_session(stream, addr, ctx).await;

    let lasted = registry.lock().await.remove(&addr);
    match lasted {
        Some(duration) => info!("Client {} disconnected after {:.1?}", addr, duration),
        None => info!("Client {} disconnected", addr),
    }
}
