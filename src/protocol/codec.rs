//! Control channel codec
//!
//! Line framing for the control connection. Commands and replies are single
//! text lines terminated by CRLF; a bare LF is accepted from peers. Reading is
//! bounded: an oversized line is discarded up to its terminator without being
//! buffered.

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use crate::error::CodecError;
use crate::protocol::commands::{Command, parse_command};
use crate::protocol::responses::{Reply, format_response};

/// Lines a peer may pipeline while a transfer watches for it closing.
const PIPELINE_LINES: usize = 8;

/// Reads one line, without its terminator.
///
/// Returns `Ok(None)` on a clean end of stream (nothing buffered), and
/// `ConnectionClosed` when the peer goes away in the middle of a line.
/// `max_len` counts the terminator.
pub async fn read_line<R>(reader: &mut R, max_len: usize) -> Result<Option<String>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let mut started = false;
    let mut overflow = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if !started {
                return Ok(None);
            }
            return Err(CodecError::ConnectionClosed);
        }
        started = true;

        let (chunk_len, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(idx) => (idx + 1, true),
            None => (available.len(), false),
        };

        if !overflow {
            if line.len() + chunk_len > max_len {
                overflow = true;
                line = Vec::new();
            } else {
                line.extend_from_slice(&available[..chunk_len]);
            }
        }
        reader.consume(chunk_len);

        if complete {
            break;
        }
    }

    if overflow {
        return Err(CodecError::LineTooLong { limit: max_len });
    }

    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }

    String::from_utf8(line)
        .map(Some)
        .map_err(|_| CodecError::InvalidEncoding)
}

/// Reads and parses the next command line.
pub async fn read_command<R>(reader: &mut R, max_len: usize) -> Result<Option<Command>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    Ok(read_line(reader, max_len).await?.map(|line| parse_command(&line)))
}

/// Writes exactly `"<code> <text>\r\n"` and flushes.
pub async fn write_reply<W>(writer: &mut W, code: u16, text: &str) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format_response(code, text).as_bytes())
        .await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one reply, following RFC 959 multi-line replies (`ddd-` ... `ddd `).
pub async fn read_reply<R>(reader: &mut R, max_len: usize) -> Result<Reply, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let first = read_line(reader, max_len)
        .await?
        .ok_or(CodecError::ConnectionClosed)?;
    let (code, multiline, text) = split_reply_line(&first)?;
    if !multiline {
        return Ok(Reply::new(code, text));
    }

    let mut lines = vec![text.to_string()];
    let terminator = format!("{} ", code);
    loop {
        let next = read_line(reader, max_len)
            .await?
            .ok_or(CodecError::ConnectionClosed)?;
        if let Some(rest) = next.strip_prefix(&terminator) {
            lines.push(rest.to_string());
            return Ok(Reply::new(code, lines.join("\n")));
        }
        lines.push(next);
    }
}

fn split_reply_line(line: &str) -> Result<(u16, bool, &str), CodecError> {
    let malformed = || CodecError::MalformedReply(line.to_string());

    let digits = line.get(..3).ok_or_else(malformed)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let code: u16 = digits.parse().map_err(|_| malformed())?;

    match line.as_bytes().get(3) {
        None => Ok((code, false, "")),
        Some(b' ') => Ok((code, false, &line[4..])),
        Some(b'-') => Ok((code, true, &line[4..])),
        Some(_) => Err(malformed()),
    }
}

/// Both halves of a control connection plus the line limit.
///
/// Bytes drained by [`ControlChannel::peer_closed`] are kept in `pipelined`
/// and read back before anything else on the stream.
pub struct ControlChannel<R, W> {
    reader: BufReader<R>,
    writer: W,
    max_line: usize,
    pipelined: Vec<u8>,
}

impl<R, W> ControlChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, max_line: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            max_line,
            pipelined: Vec::new(),
        }
    }

    pub async fn read_command(&mut self) -> Result<Option<Command>, CodecError> {
        if self.pipelined.is_empty() {
            return read_command(&mut self.reader, self.max_line).await;
        }
        let pipelined = std::mem::take(&mut self.pipelined);
        let mut input = pipelined.as_slice().chain(&mut self.reader);
        let result = read_command(&mut input, self.max_line).await;
        let (rest, _) = input.into_inner();
        self.pipelined = rest.to_vec();
        result
    }

    pub async fn read_reply(&mut self) -> Result<Reply, CodecError> {
        if self.pipelined.is_empty() {
            return read_reply(&mut self.reader, self.max_line).await;
        }
        let pipelined = std::mem::take(&mut self.pipelined);
        let mut input = pipelined.as_slice().chain(&mut self.reader);
        let result = read_reply(&mut input, self.max_line).await;
        let (rest, _) = input.into_inner();
        self.pipelined = rest.to_vec();
        result
    }

    pub async fn write_reply(&mut self, code: u16, text: &str) -> Result<(), CodecError> {
        write_reply(&mut self.writer, code, text).await
    }

    pub async fn send(&mut self, reply: &Reply) -> Result<(), CodecError> {
        self.write_reply(reply.code, &reply.text).await
    }

    pub async fn write_command(&mut self, command: &Command) -> Result<(), CodecError> {
        let line = format!("{}\r\n", command.wire_line());
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Resolves once the peer has closed its side of the stream (or the
    /// stream failed).
    ///
    /// Anything the peer sends meanwhile is moved aside and later returned by
    /// `read_command`/`read_reply`. Up to `PIPELINE_LINES` full lines are
    /// held; past that the stream is no longer drained and this future stays
    /// pending. Cancel safe: bytes are moved without an await in between.
    pub async fn peer_closed(&mut self) {
        let limit = self.max_line * PIPELINE_LINES;
        loop {
            if self.pipelined.len() >= limit {
                std::future::pending::<()>().await;
            }
            let available = match self.reader.fill_buf().await {
                Ok(buf) if !buf.is_empty() => buf,
                _ => return,
            };
            let take = available.len().min(limit - self.pipelined.len());
            self.pipelined.extend_from_slice(&available[..take]);
            self.reader.consume(take);
        }
    }

    /// Resolves when the next read would not block (data or end of stream).
    /// Nothing is consumed; a read error is left for the next read to report.
    pub async fn readable(&mut self) {
        if self.pipelined.is_empty() {
            let _ = self.reader.fill_buf().await;
        }
    }

    /// Flushes and shuts down the write half.
    pub async fn shutdown(&mut self) -> Result<(), CodecError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
