//! Line-based framing of the streamed reply.
//!
//! Every part is one line, `<code>:<json>\n`:
//!
//! | code | part                                   |
//! |------|----------------------------------------|
//! | `f`  | step start, `{"messageId": string}`    |
//! | `0`  | text delta, a JSON string              |
//! | `3`  | error message, a JSON string           |
//! | `d`  | finish, `{"finishReason": string}`     |
//!
//! Decoders skip codes they don't know, so the endpoint may add parts
//! without breaking older clients.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::DecodeError;

/// Why the endpoint stopped streaming.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// The model finished its reply.
    Stop,
    /// The reply was cut off by the token budget.
    Length,
    /// The reply was aborted by an error part.
    Error,
    /// Anything else.
    #[serde(other)]
    Other,
}

/// One part of a streamed reply.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamPart {
    /// A new reply begins.
    StartStep {
        /// Identifier of the reply.
        message_id: String,
    },
    /// A piece of reply text, to be appended to what has arrived so far.
    Text(String),
    /// The reply failed; the message is meant for display.
    Error(String),
    /// The reply is over.
    Finish {
        /// Why it is over.
        finish_reason: FinishReason,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartStepBody {
    message_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishBody {
    finish_reason: FinishReason,
}

impl StreamPart {
    /// Encodes the part as one line, including the trailing line feed.
    pub fn encode(&self) -> String {
        let (code, value) = match self {
            StreamPart::StartStep { message_id } => {
                ('f', json!({ "messageId": message_id }))
            }
            StreamPart::Text(text) => ('0', Value::String(text.clone())),
            StreamPart::Error(message) => ('3', Value::String(message.clone())),
            StreamPart::Finish { finish_reason } => {
                ('d', json!({ "finishReason": finish_reason }))
            }
        };
        format!("{code}:{value}\n")
    }

    /// Decodes one line (without its line feed). Returns `None` for parts
    /// this decoder doesn't know.
    pub fn decode(line: &str) -> Result<Option<Self>, DecodeError> {
        let malformed = || DecodeError::MalformedLine(line.to_owned());
        let Some((code, payload)) = line.split_once(':') else {
            return Err(malformed());
        };
        let part = match code {
            "f" => {
                let body: StartStepBody =
                    serde_json::from_str(payload).map_err(|_| malformed())?;
                StreamPart::StartStep {
                    message_id: body.message_id,
                }
            }
            "0" => StreamPart::Text(
                serde_json::from_str(payload).map_err(|_| malformed())?,
            ),
            "3" => StreamPart::Error(
                serde_json::from_str(payload).map_err(|_| malformed())?,
            ),
            "d" => {
                let body: FinishBody =
                    serde_json::from_str(payload).map_err(|_| malformed())?;
                StreamPart::Finish {
                    finish_reason: body.finish_reason,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(part))
    }
}

/// Incrementally decodes parts from the raw bytes of a reply.
///
/// Network chunks may split lines (and UTF-8 sequences) anywhere, so bytes
/// are buffered until a full line is available.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buf: Vec<u8>,
}

impl StreamDecoder {
    /// Creates an empty decoder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every part completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamPart>, DecodeError> {
        self.buf.extend_from_slice(chunk);

        let mut parts = vec![];
        while let Some(eol_idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(0..=eol_idx).collect();
            if let Some(part) = decode_line(&line[..eol_idx])? {
                parts.push(part);
            }
        }
        Ok(parts)
    }

    /// Decodes whatever is left after the last chunk.
    pub fn finish(self) -> Result<Option<StreamPart>, DecodeError> {
        decode_line(&self.buf)
    }
}

fn decode_line(line: &[u8]) -> Result<Option<StreamPart>, DecodeError> {
    let Ok(line) = std::str::from_utf8(line) else {
        return Err(DecodeError::InvalidUtf8);
    };
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return Ok(None);
    }
    StreamPart::decode(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(
            StreamPart::Text("AGI is \"big\"\n".to_owned()).encode(),
            "0:\"AGI is \\\"big\\\"\\n\"\n"
        );
        assert_eq!(
            StreamPart::Finish {
                finish_reason: FinishReason::Length
            }
            .encode(),
            "d:{\"finishReason\":\"length\"}\n"
        );
        assert_eq!(
            StreamPart::StartStep {
                message_id: "msg-1".to_owned()
            }
            .encode(),
            "f:{\"messageId\":\"msg-1\"}\n"
        );
    }

    #[test]
    fn test_decode_split_chunks() {
        let mut body = String::new();
        body.push_str(
            &StreamPart::StartStep {
                message_id: "msg-1".to_owned(),
            }
            .encode(),
        );
        body.push_str(&StreamPart::Text("Très ".to_owned()).encode());
        body.push_str(&StreamPart::Text("bien".to_owned()).encode());
        body.push_str(
            &StreamPart::Finish {
                finish_reason: FinishReason::Stop,
            }
            .encode(),
        );

        // Feed one byte at a time, splitting the multi-byte `è`.
        let mut decoder = StreamDecoder::new();
        let mut parts = vec![];
        for byte in body.as_bytes() {
            parts.extend(decoder.push(&[*byte]).unwrap());
        }
        assert_eq!(decoder.finish().unwrap(), None);
        assert_eq!(
            parts,
            vec![
                StreamPart::StartStep {
                    message_id: "msg-1".to_owned()
                },
                StreamPart::Text("Très ".to_owned()),
                StreamPart::Text("bien".to_owned()),
                StreamPart::Finish {
                    finish_reason: FinishReason::Stop
                },
            ]
        );
    }

    #[test]
    fn test_decode_unknown_and_extra_fields() {
        let mut decoder = StreamDecoder::new();
        let parts = decoder
            .push(
                b"e:{\"finishReason\":\"stop\",\"isContinued\":false}\n\
                  d:{\"finishReason\":\"content-filter\",\"usage\":{\"promptTokens\":1}}\n\
                  3:\"Error generating tutor reply: boom\"",
            )
            .unwrap();
        assert_eq!(
            parts,
            vec![StreamPart::Finish {
                finish_reason: FinishReason::Other
            }]
        );
        assert_eq!(
            decoder.finish().unwrap(),
            Some(StreamPart::Error(
                "Error generating tutor reply: boom".to_owned()
            ))
        );
    }

    #[test]
    fn test_decode_malformed() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(
            decoder.push(b"hello\n").unwrap_err(),
            DecodeError::MalformedLine("hello".to_owned())
        );

        let mut decoder = StreamDecoder::new();
        assert!(matches!(
            decoder.push(b"0:not json\n"),
            Err(DecodeError::MalformedLine(_))
        ));

        let mut decoder = StreamDecoder::new();
        assert_eq!(
            decoder.push(&[b'0', b':', 0xff, b'\n']).unwrap_err(),
            DecodeError::InvalidUtf8
        );
    }
}
