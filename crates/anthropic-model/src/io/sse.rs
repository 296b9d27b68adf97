use std::fmt::{self, Display, Formatter};

use futures_util::StreamExt;

use super::Body;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Reading the body failed.
    Body(String),
    /// The body is not UTF-8, or has a line that isn't a known field.
    InvalidPayload,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Body(message) => write!(f, "broken event stream: {message}"),
            Error::InvalidPayload => f.write_str("malformed event stream"),
        }
    }
}

/// A single server-sent event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event` field, if present.
    pub event: Option<String>,
    /// Value of the `data` fields, joined by line feeds.
    pub data: String,
}

impl Display for SseEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.event {
            Some(event) => write!(f, "[{event}] {}", self.data),
            None => f.write_str(&self.data),
        }
    }
}

/// Splits a response body into server-sent events.
///
/// Only the fields the Messages API sends are understood. A trailing
/// event without its blank line is dropped.
pub struct Sse {
    body: Body,
    pending: Vec<u8>,
}

impl Sse {
    #[inline]
    pub fn new(body: Body) -> Self {
        Self {
            body,
            pending: Vec::new(),
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, Error> {
        loop {
            while let Some(end) = block_end(&self.pending) {
                let block: Vec<u8> = self.pending.drain(..end).collect();
                let block =
                    str::from_utf8(&block).map_err(|_| Error::InvalidPayload)?;
                if let Some(event) = parse_block(block)? {
                    return Ok(Some(event));
                }
            }

            match self.body.next().await {
                Some(Ok(bytes)) => self.pending.extend_from_slice(&bytes),
                Some(Err(err)) => return Err(Error::Body(err.to_string())),
                None => return Ok(None),
            }
        }
    }
}

/// Finds the end of the first block, just past the blank line (`\n` or
/// `\r\n`) that terminates it.
fn block_end(buf: &[u8]) -> Option<usize> {
    let mut line_start = 0;
    while let Some(offset) = buf[line_start..].iter().position(|b| *b == b'\n') {
        let eol = line_start + offset;
        if matches!(&buf[line_start..eol], b"" | b"\r") {
            return Some(eol + 1);
        }
        line_start = eol + 1;
    }
    None
}

/// Parses one blank-line terminated block. Blocks without `data` (e.g.
/// keep-alive comments) yield nothing.
fn parse_block(block: &str) -> Result<Option<SseEvent>, Error> {
    let mut event = SseEvent::default();
    let mut data_lines = 0;
    for line in block.lines().filter(|line| !line.starts_with(':')) {
        if line.is_empty() {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "data" => {
                if data_lines > 0 {
                    event.data.push('\n');
                }
                event.data.push_str(value);
                data_lines += 1;
            }
            "event" => event.event = Some(value.to_owned()),
            "id" | "retry" => {}
            _ => return Err(Error::InvalidPayload),
        }
    }
    Ok((data_lines > 0).then_some(event))
}
