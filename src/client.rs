//! Client side of the socket protocol.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};

use crate::exec::Response;
use crate::message::Message;
use crate::protocol::{Frame, MessageCode, StatusCode, code_name, read_frame, write_frame};

/// Send `message` to the server at `socket` and wait for the final status.
///
/// Input requests are answered with everything left on `stdin`; once it is exhausted later
/// requests get an empty reply.
pub async fn run_command<R>(socket: &Path, message: &Message, stdin: &mut R) -> Result<Response>
where
    R: AsyncRead + Unpin,
{
    let stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("failed to connect to {}", socket.display()))?;
    let (mut reader, mut writer) = stream.into_split();

    write_frame(
        &mut writer,
        &Frame::message(MessageCode::Arguments, message.encode()),
    )
    .await
    .context("failed to send arguments")?;

    loop {
        let frame = read_frame(&mut reader)
            .await
            .context("failed to read from server")?
            .ok_or_else(|| anyhow!("server closed the connection"))?;
        debug!(code = %code_name(frame.code), bytes = frame.payload.len(), "Message received");

        match StatusCode::from_code(frame.code) {
            Some(StatusCode::ReadInput) => {
                let mut input = Vec::new();
                stdin
                    .read_to_end(&mut input)
                    .await
                    .context("failed to read standard input")?;
                let reply = Frame::message(MessageCode::ReadInputReply, input);
                write_frame(&mut writer, &reply)
                    .await
                    .context("failed to send standard input")?;
            }
            Some(status) => return Ok(Response::new(status, frame.payload)),
            None => warn!(code = frame.code, "Unexpected message code from server"),
        }
    }
}
