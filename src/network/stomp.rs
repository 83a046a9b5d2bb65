//! STOMP 1.2 framing for text WebSocket messages.
//!
//! A frame is `COMMAND\nname:value\n...\n\nbody\0`. Bare end-of-line
//! sequences between frames are heart-beats and decode to nothing.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Client heart-beat payload.
pub const HEARTBEAT: &str = "\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    // CONNECT and CONNECTED headers are sent verbatim.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("header line without a colon: `{0}`")]
    BadHeader(String),
    #[error("invalid escape sequence in `{0}`")]
    BadEscape(String),
    #[error("invalid content-length `{0}`")]
    BadContentLength(String),
    #[error("frame is missing its NUL terminator")]
    Unterminated,
    #[error("frame ended inside the header block")]
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First occurrence wins when a header is repeated.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');

        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }

        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }

        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decodes every frame in one WebSocket text message.
    pub fn decode_all(input: &str) -> Result<Vec<Frame>, FrameError> {
        let mut frames = Vec::new();
        let mut rest = input;

        loop {
            rest = skip_heartbeats(rest);
            if rest.is_empty() {
                break;
            }
            let (frame, remaining) = decode_one(rest)?;
            frames.push(frame);
            rest = remaining;
        }

        Ok(frames)
    }
}

fn skip_heartbeats(mut input: &str) -> &str {
    loop {
        if let Some(stripped) = input.strip_prefix("\r\n") {
            input = stripped;
        } else if let Some(stripped) = input.strip_prefix('\n') {
            input = stripped;
        } else {
            return input;
        }
    }
}

fn next_line(input: &str) -> Result<(&str, &str), FrameError> {
    let end = input.find('\n').ok_or(FrameError::Truncated)?;
    let line = &input[..end];
    let line = line.strip_suffix('\r').unwrap_or(line);
    Ok((line, &input[end + 1..]))
}

fn decode_one(input: &str) -> Result<(Frame, &str), FrameError> {
    let (command_line, mut rest) = next_line(input)?;
    let command: Command = command_line.parse()?;
    let mut frame = Frame::new(command);

    loop {
        let (line, remaining) = next_line(rest)?;
        rest = remaining;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::BadHeader(line.to_string()))?;
        if command.escapes_headers() {
            frame
                .headers
                .push((unescape_header(name)?, unescape_header(value)?));
        } else {
            frame.headers.push((name.to_string(), value.to_string()));
        }
    }

    match frame.get("content-length") {
        Some(raw) => {
            let len: usize = raw
                .trim()
                .parse()
                .map_err(|_| FrameError::BadContentLength(raw.to_string()))?;
            let body = rest
                .get(..len)
                .ok_or_else(|| FrameError::BadContentLength(raw.to_string()))?;
            let after = rest[len..]
                .strip_prefix('\0')
                .ok_or(FrameError::Unterminated)?;
            frame.body = body.to_string();
            Ok((frame, after))
        }
        None => {
            let end = rest.find('\0').ok_or(FrameError::Unterminated)?;
            frame.body = rest[..end].to_string();
            Ok((frame, &rest[end + 1..]))
        }
    }
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::BadEscape(raw.to_string())),
        }
    }
    Ok(out)
}
