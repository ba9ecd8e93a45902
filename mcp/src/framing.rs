//! Message framing on the stdio stream.
//!
//! Two framings are accepted on the same stream, decided per message by its
//! first line:
//!
//! - `Content-Length: <n>` followed by a blank line and exactly `n` body bytes
//! - anything else is a complete newline-delimited JSON message
//!
//! Responses go back in the framing the request arrived in. Lines that are
//! empty after trimming are keep-alives and are skipped, not answered.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CONTENT_LENGTH: &str = "content-length:";

/// How a message was delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Line,
    ContentLength,
}

/// One message body plus the framing it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Vec<u8>,
    pub kind: FrameKind,
}

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("invalid Content-Length value: {0:?}")]
    InvalidLength(String),
    #[error("expected blank line after Content-Length header, got {0:?}")]
    MissingSeparator(String),
    #[error("truncated message body: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },
    #[error("stream read/write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Read the next message.
///
/// `Ok(None)` means the stream ended cleanly between messages. End of stream
/// anywhere inside a `Content-Length` message is an error. Blank lines
/// between messages are skipped.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Frame>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_ascii();
        if !trimmed.is_empty() {
            break;
        }
    }

    let trimmed = line.trim_ascii();
    let Some(length) = header_value(trimmed) else {
        return Ok(Some(Frame {
            payload: trimmed.to_vec(),
            kind: FrameKind::Line,
        }));
    };

    // Digits only; `usize::from_str` would also take a leading `+`.
    if length.is_empty() || !length.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FramingError::InvalidLength(length.to_string()));
    }
    let expected: usize = length
        .parse()
        .map_err(|_| FramingError::InvalidLength(length.to_string()))?;

    let mut separator = Vec::new();
    reader.read_until(b'\n', &mut separator).await?;
    if separator.is_empty() {
        return Err(FramingError::Truncated {
            expected,
            received: 0,
        });
    }
    if !separator.trim_ascii().is_empty() {
        return Err(FramingError::MissingSeparator(
            String::from_utf8_lossy(separator.trim_ascii()).into_owned(),
        ));
    }

    let mut payload = Vec::new();
    (&mut *reader)
        .take(expected as u64)
        .read_to_end(&mut payload)
        .await?;
    if payload.len() < expected {
        return Err(FramingError::Truncated {
            expected,
            received: payload.len(),
        });
    }

    Ok(Some(Frame {
        payload,
        kind: FrameKind::ContentLength,
    }))
}

/// The trimmed value of a `Content-Length:` header line, if `line` is one.
fn header_value(line: &[u8]) -> Option<&str> {
    let prefix = line.get(..CONTENT_LENGTH.len())?;
    if !prefix.eq_ignore_ascii_case(CONTENT_LENGTH.as_bytes()) {
        return None;
    }
    // Invalid UTF-8 in the value can never be a valid length.
    Some(
        std::str::from_utf8(&line[CONTENT_LENGTH.len()..])
            .unwrap_or("\u{fffd}")
            .trim(),
    )
}

/// Write one message in the given framing and flush.
pub async fn write_message<W>(writer: &mut W, payload: &[u8], kind: FrameKind) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match kind {
        FrameKind::Line => {
            writer.write_all(payload).await?;
            writer.write_all(b"\n").await?;
        }
        FrameKind::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", payload.len());
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(payload).await?;
        }
    }
    writer.flush().await
}
