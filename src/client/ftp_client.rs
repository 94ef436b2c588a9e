//! Active-mode FTP client
//!
//! Drives the server over one control connection. For every data-bearing
//! command the client binds a fresh listener on the control connection's
//! local IPv4 address, announces it with PORT, and waits for the server to
//! dial in after the 150 reply.

use log::{debug, info};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::error::ClientError;
use crate::protocol::responses::{
    CLOSING, LOGIN_SUCCESS, OK, PASSWORD_REQUIRED, READY, TRANSFER_COMPLETE,
};
use crate::protocol::{Command, ControlChannel, Reply};
use crate::transfer::format_port_argument;

/// How long to wait for the server to open a data connection.
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_REPLY_LINE: usize = 8192;

pub struct FtpClient {
    control: ControlChannel<OwnedReadHalf, OwnedWriteHalf>,
    local_ip: Ipv4Addr,
    accept_timeout: Duration,
}

impl FtpClient {
    /// Connects and waits for the 220 greeting.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let local = stream.local_addr()?;
        let local_ip = match local.ip() {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(_) => return Err(ClientError::UnsupportedAddress(local)),
        };
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let mut client = Self {
            control: ControlChannel::new(read_half, write_half, MAX_REPLY_LINE),
            local_ip,
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
        };

        let greeting = expect(client.control.read_reply().await?, READY)?;
        info!("Connected: {}", greeting);
        Ok(client)
    }

    /// Bounds how long data operations wait for the server to dial in.
    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    /// Sends one command and reads its reply.
    pub async fn command(&mut self, command: &Command) -> Result<Reply, ClientError> {
        debug!("-> {}", command);
        self.control.write_command(command).await?;
        let reply = self.control.read_reply().await?;
        debug!("<- {}", reply);
        Ok(reply)
    }

    /// USER then PASS.
    pub async fn login(&mut self, user: &str, password: &str) -> Result<(), ClientError> {
        let reply = self.command(&Command::User(user.to_string())).await?;
        expect(reply, PASSWORD_REQUIRED)?;
        let reply = self.command(&Command::Pass(password.to_string())).await?;
        expect(reply, LOGIN_SUCCESS)?;
        info!("Logged in as {}", user);
        Ok(())
    }

    /// Entry names of `path`, or of the session root.
    pub async fn list(&mut self, path: Option<&str>) -> Result<Vec<String>, ClientError> {
        let mut data = self
            .open_data(Command::List(path.map(str::to_string)))
            .await?;

        let mut raw = Vec::new();
        let received = data.read_to_end(&mut raw).await;
        drop(data);
        self.finish_transfer().await?;
        received?;

        Ok(String::from_utf8_lossy(&raw)
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Downloads `remote` into `writer`, returning the byte count.
    pub async fn retrieve<W>(&mut self, remote: &str, writer: &mut W) -> Result<u64, ClientError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut data = self.open_data(Command::Retr(remote.to_string())).await?;
        let copied = copy_and_flush(&mut data, writer).await;
        drop(data);
        self.finish_transfer().await?;
        Ok(copied?)
    }

    /// Downloads `remote` to a local file. The file is only created once the
    /// server has opened the data connection.
    pub async fn download(&mut self, remote: &str, local: &Path) -> Result<u64, ClientError> {
        let mut data = self.open_data(Command::Retr(remote.to_string())).await?;
        let copied = match File::create(local).await {
            Ok(mut file) => copy_and_flush(&mut data, &mut file).await,
            Err(e) => Err(e),
        };
        drop(data);
        self.finish_transfer().await?;
        let bytes = copied?;
        info!("Downloaded {} -> {} ({} bytes)", remote, local.display(), bytes);
        Ok(bytes)
    }

    /// Uploads everything `reader` yields as `remote`.
    pub async fn store<R>(&mut self, remote: &str, reader: &mut R) -> Result<u64, ClientError>
    where
        R: AsyncRead + Unpin,
    {
        let mut data = self.open_data(Command::Stor(remote.to_string())).await?;
        let copied = copy_and_flush(reader, &mut data).await;
        // End of data is signalled by closing the data connection.
        let closed = data.shutdown().await;
        drop(data);
        self.finish_transfer().await?;
        closed?;
        Ok(copied?)
    }

    /// Uploads a local file as `remote`.
    pub async fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, ClientError> {
        let mut file = File::open(local).await?;
        let bytes = self.store(remote, &mut file).await?;
        info!("Uploaded {} -> {} ({} bytes)", local.display(), remote, bytes);
        Ok(bytes)
    }

    /// QUIT and close the control connection.
    pub async fn quit(mut self) -> Result<(), ClientError> {
        let reply = self.command(&Command::Quit).await?;
        expect(reply, CLOSING)?;
        self.control.shutdown().await?;
        Ok(())
    }

    /// PORT, the data command, the 150, then the server's inbound dial.
    async fn open_data(&mut self, command: Command) -> Result<TcpStream, ClientError> {
        let listener = TcpListener::bind(SocketAddrV4::new(self.local_ip, 0)).await?;
        let endpoint = match listener.local_addr()? {
            SocketAddr::V4(endpoint) => endpoint,
            other => return Err(ClientError::UnsupportedAddress(other)),
        };

        let reply = self
            .command(&Command::Port(format_port_argument(endpoint)))
            .await?;
        expect(reply, OK)?;

        let reply = self.command(&command).await?;
        if !reply.is_preliminary() {
            return Err(unexpected(reply));
        }

        let timeout = self.accept_timeout;
        tokio::select! {
            biased;
            accepted = tokio::time::timeout(timeout, listener.accept()) => match accepted {
                Ok(Ok((stream, peer))) => {
                    debug!("Data connection from {}", peer);
                    Ok(stream)
                }
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(ClientError::AcceptTimeout(timeout)),
            },
            // The server gave up (e.g. 425) before dialing in.
            _ = self.control.readable() => {
                let reply = self.control.read_reply().await?;
                Err(unexpected(reply))
            }
        }
    }

    async fn finish_transfer(&mut self) -> Result<Reply, ClientError> {
        let reply = self.control.read_reply().await?;
        debug!("<- {}", reply);
        expect(reply, TRANSFER_COMPLETE)
    }
}

async fn copy_and_flush<R, W>(reader: &mut R, writer: &mut W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let bytes = tokio::io::copy(reader, writer).await?;
    writer.flush().await?;
    Ok(bytes)
}

fn unexpected(reply: Reply) -> ClientError {
    ClientError::UnexpectedReply {
        code: reply.code,
        text: reply.text,
    }
}

fn expect(reply: Reply, code: u16) -> Result<Reply, ClientError> {
    if reply.code == code {
        Ok(reply)
    } else {
        Err(unexpected(reply))
    }
}
