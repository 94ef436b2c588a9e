//! Session handler
//!
//! Drives one control connection: greets the peer, reads commands one at a
//! time, dispatches them against the [`Session`] state and writes exactly one
//! terminal reply per command. Transfers add a preliminary 150 before their
//! terminal reply.

use log::{error, info, warn};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::auth::CredentialStore;
use crate::config::ServerConfig;
use crate::error::{CodecError, TransferError, reply_code};
use crate::protocol::responses::{self, default_text};
use crate::protocol::{Command, ControlChannel};
use crate::session::state::{Session, SessionState};
use crate::storage::{list_directory, prepare_retrieval, prepare_storage};
use crate::transfer::{
    connect_data_channel, parse_port_argument, receive_file, send_file, send_listing,
};

/// Everything a session needs from the server, fixed at startup.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Canonical session root
    pub root: PathBuf,
    pub credentials: CredentialStore,
    pub buffer_size: usize,
    pub data_connect_timeout: Duration,
    pub max_command_length: usize,
}

impl SessionContext {
    pub fn from_config(config: &ServerConfig, root: PathBuf) -> Self {
        Self {
            root,
            credentials: CredentialStore::from_entries(&config.users),
            buffer_size: config.buffer_size,
            data_connect_timeout: config.data_connect_timeout(),
            max_command_length: config.max_command_length,
        }
    }
}

/// What the loop does after a command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Transfer requests after login gating.
enum TransferRequest {
    List(Option<String>),
    Retr(String),
    Stor(String),
}

/// Result of a transfer preflight.
enum Prepared {
    Listing(Vec<String>),
    Download(PathBuf),
    Upload(PathBuf),
}

/// Handles one control connection until QUIT, EOF or a stream error.
pub async fn handle_session<S>(stream: S, peer: SocketAddr, ctx: Arc<SessionContext>)
where
    S: AsyncRead + AsyncWrite,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut control = ControlChannel::new(read_half, write_half, ctx.max_command_length);
    let mut session = Session::new(peer, ctx.root.clone());

    if let Err(e) = run(&mut control, &mut session, &ctx).await {
        match e {
            CodecError::ConnectionClosed => info!("Client {} went away mid-command", peer),
            other => warn!("Session with {} ended on control error: {}", peer, other),
        }
    }

    session.close();
}

async fn run<R, W>(
    control: &mut ControlChannel<R, W>,
    session: &mut Session,
    ctx: &SessionContext,
) -> Result<(), CodecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    control
        .write_reply(responses::READY, default_text(responses::READY))
        .await?;

    loop {
        let command = match control.read_command().await {
            Ok(Some(command)) => command,
            Ok(None) => {
                info!("Connection closed by client {}", session.peer());
                return Ok(());
            }
            Err(e) if e.is_recoverable() => {
                warn!("Rejected command line from {}: {}", session.peer(), e);
                let code = reply_code(&e);
                control.write_reply(code, default_text(code)).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        info!("Received from {}: {}", session.peer(), command);

        if dispatch(control, session, ctx, command).await? == Flow::Close {
            return Ok(());
        }
    }
}

async fn dispatch<R, W>(
    control: &mut ControlChannel<R, W>,
    session: &mut Session,
    ctx: &SessionContext,
    command: Command,
) -> Result<Flow, CodecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match command {
        Command::User(username) => handle_cmd_user(control, session, &username).await,
        Command::Pass(password) => handle_cmd_pass(control, session, ctx, &password).await,
        Command::Port(arg) => handle_cmd_port(control, session, &arg).await,
        Command::List(path) => {
            handle_transfer(control, session, ctx, TransferRequest::List(path)).await
        }
        Command::Retr(path) => {
            handle_transfer(control, session, ctx, TransferRequest::Retr(path)).await
        }
        Command::Stor(path) => {
            handle_transfer(control, session, ctx, TransferRequest::Stor(path)).await
        }
        Command::Quit => handle_cmd_quit(control, session).await,
        Command::Unknown(verb) => {
            warn!("Unknown command {:?} from {}", verb, session.peer());
            reply(control, responses::UNRECOGNIZED).await
        }
    }
}

async fn reply<R, W>(control: &mut ControlChannel<R, W>, code: u16) -> Result<Flow, CodecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    control.write_reply(code, default_text(code)).await?;
    Ok(Flow::Continue)
}

async fn handle_cmd_user<R, W>(
    control: &mut ControlChannel<R, W>,
    session: &mut Session,
    username: &str,
) -> Result<Flow, CodecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if username.is_empty() {
        return reply(control, responses::SYNTAX_ERROR).await;
    }
    session.begin_login(username);
    reply(control, responses::PASSWORD_REQUIRED).await
}

async fn handle_cmd_pass<R, W>(
    control: &mut ControlChannel<R, W>,
    session: &mut Session,
    ctx: &SessionContext,
    password: &str,
) -> Result<Flow, CodecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if password.is_empty() && matches!(session.state(), SessionState::AwaitingPassword { .. }) {
        return reply(control, responses::SYNTAX_ERROR).await;
    }

    let peer = session.peer();
    match session.complete_login(password, &ctx.credentials) {
        Ok(user) => {
            info!("User {} logged in from {}", user, peer);
            reply(control, responses::LOGIN_SUCCESS).await
        }
        Err(e) => {
            warn!("Login failed for {}: {}", peer, e);
            reply(control, reply_code(&e)).await
        }
    }
}

async fn handle_cmd_port<R, W>(
    control: &mut ControlChannel<R, W>,
    session: &mut Session,
    arg: &str,
) -> Result<Flow, CodecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Err(e) = session.require_login() {
        return reply(control, reply_code(&e)).await;
    }

    match parse_port_argument(arg) {
        Ok(endpoint) => {
            if let Some(previous) = session.set_data_endpoint(endpoint) {
                info!(
                    "Client {} replaced unused data endpoint {} with {}",
                    session.peer(),
                    previous,
                    endpoint
                );
            } else {
                info!("Client {} announced data endpoint {}", session.peer(), endpoint);
            }
            reply(control, responses::OK).await
        }
        Err(e) => {
            warn!("Client {}: {}", session.peer(), e);
            reply(control, reply_code(&e)).await
        }
    }
}

async fn handle_cmd_quit<R, W>(
    control: &mut ControlChannel<R, W>,
    session: &mut Session,
) -> Result<Flow, CodecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Client {} requested to quit", session.peer());
    control
        .write_reply(responses::CLOSING, default_text(responses::CLOSING))
        .await?;
    if let Err(e) = control.shutdown().await {
        warn!("Failed to shut down control stream for {}: {}", session.peer(), e);
    }
    session.close();
    Ok(Flow::Close)
}

async fn handle_transfer<R, W>(
    control: &mut ControlChannel<R, W>,
    session: &mut Session,
    ctx: &SessionContext,
    request: TransferRequest,
) -> Result<Flow, CodecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Err(e) = session.require_login() {
        return reply(control, reply_code(&e)).await;
    }

    match run_transfer(control, session, ctx, request).await {
        Ok(bytes) => {
            info!("Transfer for {} complete ({} bytes)", session.peer(), bytes);
            reply(control, responses::TRANSFER_COMPLETE).await
        }
        Err(TransferError::ControlClosed) => {
            warn!(
                "Control connection from {} closed during transfer; aborted",
                session.peer()
            );
            Ok(Flow::Close)
        }
        Err(e) => {
            error!("Transfer for {} failed: {}", session.peer(), e);
            reply(control, reply_code(&e)).await
        }
    }
}

/// Preflight, 150, dial, exchange. The data connection lives only inside
/// this function.
async fn run_transfer<R, W>(
    control: &mut ControlChannel<R, W>,
    session: &mut Session,
    ctx: &SessionContext,
    request: TransferRequest,
) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let prepared = match request {
        TransferRequest::List(path) => {
            Prepared::Listing(list_directory(session.root(), path.as_deref()).await?)
        }
        TransferRequest::Retr(path) if path.is_empty() => {
            return Err(TransferError::MissingArgument("RETR"));
        }
        TransferRequest::Retr(path) => {
            Prepared::Download(prepare_retrieval(session.root(), &path).await?)
        }
        TransferRequest::Stor(path) if path.is_empty() => {
            return Err(TransferError::MissingArgument("STOR"));
        }
        TransferRequest::Stor(path) => {
            Prepared::Upload(prepare_storage(session.root(), &path).await?)
        }
    };

    let endpoint = session
        .take_data_endpoint()
        .ok_or(TransferError::NoDataEndpoint)?;

    control
        .write_reply(responses::OPENING_DATA, default_text(responses::OPENING_DATA))
        .await
        .map_err(|_| TransferError::ControlClosed)?;

    let mut data = tokio::select! {
        dialed = connect_data_channel(endpoint, ctx.data_connect_timeout) => dialed?,
        _ = control.peer_closed() => return Err(TransferError::ControlClosed),
    };

    let buffer_size = ctx.buffer_size;
    let exchange = async move {
        match prepared {
            Prepared::Listing(names) => send_listing(&mut data, &names).await,
            Prepared::Download(path) => send_file(&path, &mut data, buffer_size).await,
            Prepared::Upload(path) => receive_file(&mut data, &path, buffer_size).await,
        }
    };

    tokio::select! {
        result = exchange => result,
        _ = control.peer_closed() => Err(TransferError::ControlClosed),
    }
}
