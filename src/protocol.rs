//! Message codes and length-prefixed framing shared by server and client.
//!
//! Each frame is `[len: u32 BE][code: i32 BE][payload: len bytes]`.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted on the wire.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Codes the server accepts from a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageCode {
    Arguments,
    ReadInputReply,
}

impl MessageCode {
    pub fn code(self) -> i32 {
        match self {
            MessageCode::Arguments => 6,
            MessageCode::ReadInputReply => 8,
        }
    }

    pub fn from_code(code: i32) -> Option<MessageCode> {
        match code {
            6 => Some(MessageCode::Arguments),
            8 => Some(MessageCode::ReadInputReply),
            _ => None,
        }
    }
}

/// Codes the server sends back to a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusCode {
    Finished,
    Error,
    BadSyntax,
    Exception,
    /// Request for the client's standard input; always sent with an empty payload.
    ReadInput,
}

impl StatusCode {
    pub fn code(self) -> i32 {
        match self {
            StatusCode::Finished => 0,
            StatusCode::Error => 1,
            StatusCode::BadSyntax => 2,
            StatusCode::Exception => 4,
            StatusCode::ReadInput => 7,
        }
    }

    pub fn from_code(code: i32) -> Option<StatusCode> {
        match code {
            0 => Some(StatusCode::Finished),
            1 => Some(StatusCode::Error),
            2 => Some(StatusCode::BadSyntax),
            4 => Some(StatusCode::Exception),
            7 => Some(StatusCode::ReadInput),
            _ => None,
        }
    }
}

/// Human-readable name for log lines.
pub fn code_name(code: i32) -> String {
    if let Some(message) = MessageCode::from_code(code) {
        return format!("{message:?}");
    }
    match StatusCode::from_code(code) {
        Some(status) => format!("{status:?}"),
        None => format!("Unknown({code})"),
    }
}

/// One message on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub code: i32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(code: i32, payload: Vec<u8>) -> Self {
        Self { code, payload }
    }

    pub fn status(status: StatusCode, payload: Vec<u8>) -> Self {
        Self::new(status.code(), payload)
    }

    pub fn message(code: MessageCode, payload: Vec<u8>) -> Self {
        Self::new(code.code(), payload)
    }
}

/// Read the next frame; `Ok(None)` means the peer closed the stream between frames.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 8];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed inside frame header",
            ));
        }
        filled += n;
    }

    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let code = i32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {len} exceeds limit {MAX_FRAME_LEN}"),
        ));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Frame { code, payload }))
}

pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(frame.payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame payload of {} bytes is too large", frame.payload.len()),
            )
        })?;
    let mut buf = Vec::with_capacity(8 + frame.payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&frame.code.to_be_bytes());
    buf.extend_from_slice(&frame.payload);
    writer.write_all(&buf).await?;
    writer.flush().await
}
