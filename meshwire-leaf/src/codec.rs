//! Sans-IO decoder/encoder for the leaf wire protocol.
//!
//! Commands are ASCII lines terminated by `\n`; `PUB` and `RESP` carry a
//! decimal length on the header line followed by exactly that many raw
//! payload bytes. `RESP` frames additionally end with one extra `\n` that
//! `PUB` does not — an asymmetry preserved by contract to avoid breaking
//! federated peers that already depend on it.

use crate::error::LeafError;
use bytes::{Bytes, BytesMut};
use meshwire_core::buffer::SegmentedBuffer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafCommand {
    Info(InfoPayload),
    AuthBearer(String),
    Sub { subject: Box<[u8]> },
    Unsub { subject: Box<[u8]> },
    Pub { subject: Box<[u8]>, payload: Bytes },
    Resp { subject: Box<[u8]>, payload: Bytes },
    Ping,
    Pong,
    Ok,
    Ack,
    Err(String),
}

impl LeafCommand {
    /// Encode this command as the bytes to write to the wire.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        match self {
            Self::Info(info) => {
                out.extend_from_slice(b"INFO ");
                out.extend_from_slice(&serde_json::to_vec(info).unwrap_or_default());
                out.extend_from_slice(b"\n");
            }
            Self::AuthBearer(jwt) => {
                out.extend_from_slice(b"AUTH BEARER ");
                out.extend_from_slice(jwt.as_bytes());
                out.extend_from_slice(b"\n");
            }
            Self::Sub { subject } => {
                out.extend_from_slice(b"SUB ");
                out.extend_from_slice(subject);
                out.extend_from_slice(b"\n");
            }
            Self::Unsub { subject } => {
                out.extend_from_slice(b"UNSUB ");
                out.extend_from_slice(subject);
                out.extend_from_slice(b"\n");
            }
            Self::Pub { subject, payload } => {
                out.extend_from_slice(b"PUB ");
                out.extend_from_slice(subject);
                out.extend_from_slice(format!(" {}\n", payload.len()).as_bytes());
                out.extend_from_slice(payload);
            }
            Self::Resp { subject, payload } => {
                out.extend_from_slice(b"RESP ");
                out.extend_from_slice(subject);
                out.extend_from_slice(format!(" {}\n", payload.len()).as_bytes());
                out.extend_from_slice(payload);
                out.extend_from_slice(b"\n");
            }
            Self::Ping => out.extend_from_slice(b"PING\n"),
            Self::Pong => out.extend_from_slice(b"PONG\n"),
            Self::Ok => out.extend_from_slice(b"+OK\n"),
            Self::Ack => out.extend_from_slice(b"+ACK\n"),
            Self::Err(msg) => {
                out.extend_from_slice(b"-ERR ");
                out.extend_from_slice(msg.as_bytes());
                out.extend_from_slice(b"\n");
            }
        }
        out.freeze()
    }
}

enum PayloadKind {
    Pub,
    Resp,
}

enum State {
    Line,
    Payload { subject: Box<[u8]>, kind: PayloadKind, len: usize },
}

enum ParsedLine {
    Immediate(LeafCommand),
    AwaitPayload { subject: Box<[u8]>, kind: PayloadKind, len: usize },
}

fn parse_line(line: &[u8]) -> Result<ParsedLine, LeafError> {
    let line = std::str::from_utf8(line).map_err(|_| LeafError::protocol("non-utf8 command line"))?;
    let mut parts = line.splitn(2, ' ');
    let cmd = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();
    match cmd {
        "INFO" => {
            let info: InfoPayload =
                serde_json::from_str(rest.trim()).map_err(|e| LeafError::protocol(format!("bad INFO payload: {e}")))?;
            Ok(ParsedLine::Immediate(LeafCommand::Info(info)))
        }
        "AUTH" => {
            let jwt = rest
                .strip_prefix("BEARER ")
                .ok_or_else(|| LeafError::protocol("AUTH requires BEARER <jwt>"))?;
            Ok(ParsedLine::Immediate(LeafCommand::AuthBearer(jwt.trim().to_string())))
        }
        "SUB" => Ok(ParsedLine::Immediate(LeafCommand::Sub { subject: rest.trim().as_bytes().into() })),
        "UNSUB" => Ok(ParsedLine::Immediate(LeafCommand::Unsub { subject: rest.trim().as_bytes().into() })),
        "PUB" | "RESP" => {
            let mut fields = rest.rsplitn(2, ' ');
            let len_str = fields.next().ok_or_else(|| LeafError::protocol("missing length"))?;
            let subject = fields.next().ok_or_else(|| LeafError::protocol("missing subject"))?;
            let len: usize = len_str.trim().parse().map_err(|_| LeafError::protocol("invalid length"))?;
            let kind = if cmd == "PUB" { PayloadKind::Pub } else { PayloadKind::Resp };
            Ok(ParsedLine::AwaitPayload { subject: subject.as_bytes().into(), kind, len })
        }
        "PING" => Ok(ParsedLine::Immediate(LeafCommand::Ping)),
        "PONG" => Ok(ParsedLine::Immediate(LeafCommand::Pong)),
        "+OK" => Ok(ParsedLine::Immediate(LeafCommand::Ok)),
        "+ACK" => Ok(ParsedLine::Immediate(LeafCommand::Ack)),
        "-ERR" => Ok(ParsedLine::Immediate(LeafCommand::Err(rest.trim().to_string()))),
        other => Err(LeafError::protocol(format!("unknown command: {other}"))),
    }
}

/// Stateful decoder over a [`SegmentedBuffer`]. Feed raw bytes with
/// [`LeafCodec::feed`] and pull complete commands with [`LeafCodec::next`].
pub struct LeafCodec {
    buf: SegmentedBuffer,
    state: State,
}

impl Default for LeafCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LeafCodec {
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: SegmentedBuffer::new(), state: State::Line }
    }

    pub fn feed(&mut self, bytes: Bytes) {
        self.buf.push(bytes);
    }

    /// Pull the next fully-buffered command, if any.
    pub fn next(&mut self) -> Result<Option<LeafCommand>, LeafError> {
        loop {
            match std::mem::replace(&mut self.state, State::Line) {
                State::Line => {
                    let Some(pos) = self.buf.find_byte(b'\n') else {
                        self.state = State::Line;
                        return Ok(None);
                    };
                    let line = self.buf.take_bytes(pos).expect("pos within buffered length");
                    self.buf.advance(1);
                    match parse_line(&line) {
                        Ok(ParsedLine::Immediate(cmd)) => return Ok(Some(cmd)),
                        Ok(ParsedLine::AwaitPayload { subject, kind, len }) => {
                            self.state = State::Payload { subject, kind, len };
                        }
                        Err(e) => return Err(e),
                    }
                }
                State::Payload { subject, kind, len } => {
                    let extra = if matches!(kind, PayloadKind::Resp) { 1 } else { 0 };
                    if self.buf.len() < len + extra {
                        self.state = State::Payload { subject, kind, len };
                        return Ok(None);
                    }
                    let payload = self.buf.take_bytes(len).expect("len within buffered length");
                    if extra == 1 {
                        self.buf.advance(1);
                    }
                    let cmd = match kind {
                        PayloadKind::Pub => LeafCommand::Pub { subject, payload },
                        PayloadKind::Resp => LeafCommand::Resp { subject, payload },
                    };
                    return Ok(Some(cmd));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_sub_and_pub() {
        let mut codec = LeafCodec::new();
        codec.feed(Bytes::from_static(b"SUB foo.bar\nPUB foo.bar 5\nhello"));
        assert_eq!(codec.next().unwrap(), Some(LeafCommand::Sub { subject: (*b"foo.bar").into() }));
        assert_eq!(
            codec.next().unwrap(),
            Some(LeafCommand::Pub { subject: (*b"foo.bar").into(), payload: Bytes::from_static(b"hello") })
        );
        assert_eq!(codec.next().unwrap(), None);
    }

    #[test]
    fn decodes_resp_trailing_newline() {
        let mut codec = LeafCodec::new();
        codec.feed(Bytes::from_static(b"RESP reply.42 2\nhi\n"));
        assert_eq!(
            codec.next().unwrap(),
            Some(LeafCommand::Resp { subject: (*b"reply.42").into(), payload: Bytes::from_static(b"hi") })
        );
    }

    #[test]
    fn handles_split_feeds() {
        let mut codec = LeafCodec::new();
        codec.feed(Bytes::from_static(b"PUB a 3\n"));
        assert_eq!(codec.next().unwrap(), None);
        codec.feed(Bytes::from_static(b"ab"));
        assert_eq!(codec.next().unwrap(), None);
        codec.feed(Bytes::from_static(b"c"));
        assert_eq!(
            codec.next().unwrap(),
            Some(LeafCommand::Pub { subject: (*b"a").into(), payload: Bytes::from_static(b"abc") })
        );
    }

    #[test]
    fn round_trips_info_and_ping() {
        let mut codec = LeafCodec::new();
        let info = InfoPayload { id: "leaf-1".into(), kind: "leaf".into(), version: "1.0".into() };
        codec.feed(LeafCommand::Info(info.clone()).encode());
        assert_eq!(codec.next().unwrap(), Some(LeafCommand::Info(info)));

        codec.feed(LeafCommand::Ping.encode());
        assert_eq!(codec.next().unwrap(), Some(LeafCommand::Ping));
    }
}
