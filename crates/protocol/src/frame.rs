//! Text frame codec
//!
//! Request frame:
//!
//! ```text
//! <method>&<method>...\r\n
//! [<controller>#<stack>#0,0,0,0,0,0]<index>,<line count>\r\n
//! <attribute lines>
//! ...
//! ```
//!
//! Response frame: `[s,s,s,s,s,s]i` opens an object, `key=value` lines fill
//! it, `[error]<code>` ends the frame. Anything else is ignored.

use crate::command::{Attributes, Command, Stack};
use crate::value::{NEWLINE_ESCAPE, Record, ResponsePayload, Value};
use thiserror::Error;
use tracing::trace;

const LINE_SEPARATOR: &str = "\r\n";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid stack: {0:?}")]
    InvalidStack(String),

    #[error("Invalid error code: {0:?}")]
    InvalidErrorCode(String),
}

/// Encode a batch of commands into one request frame
pub fn encode(commands: &[Command]) -> String {
    let header = commands
        .iter()
        .map(|c| c.method.code().to_string())
        .collect::<Vec<_>>()
        .join("&");

    let mut frame = header;
    frame.push_str(LINE_SEPARATOR);

    for (index, command) in commands.iter().enumerate() {
        let attrs = encode_attributes(&command.attributes);
        let line_count = attrs.matches(LINE_SEPARATOR).count();
        frame.push_str(&format!(
            "[{}#{}#{}]{},{}{}",
            command.controller,
            command.stack,
            Stack::ZERO,
            index,
            line_count,
            LINE_SEPARATOR
        ));
        frame.push_str(&attrs);
    }

    frame
}

/// Render attributes as `\r\n`-terminated lines
pub fn encode_attributes(attributes: &Attributes) -> String {
    match attributes {
        Attributes::None => String::new(),
        Attributes::Raw(raw) => raw.clone(),
        Attributes::Names(names) => {
            let mut out = names.join(LINE_SEPARATOR);
            out.push_str(LINE_SEPARATOR);
            out
        }
        Attributes::Pairs(pairs) => {
            let mut out = String::new();
            for (key, value) in pairs {
                out.push_str(key);
                if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                    out.push('=');
                    out.push_str(&escape_newlines(value));
                }
                out.push_str(LINE_SEPARATOR);
            }
            out
        }
    }
}

/// Replace `\r\n`, `\n` and `\r` with the single escape character
pub fn escape_newlines(value: &str) -> String {
    let escape = NEWLINE_ESCAPE.to_string();
    value
        .replace("\r\n", &escape)
        .replace('\n', &escape)
        .replace('\r', &escape)
}

/// Line kinds a response frame is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line<'a> {
    ObjectHeader,
    Error(&'a str),
    Attribute(&'a str, &'a str),
    Other,
}

fn classify(line: &str) -> Line<'_> {
    if is_object_header(line) {
        return Line::ObjectHeader;
    }

    if let Some(code) = line.strip_prefix("[error]") {
        if !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()) {
            return Line::Error(code);
        }
        return Line::Other;
    }

    if let Some((key, value)) = line.split_once('=') {
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Line::Attribute(key, value);
        }
    }

    Line::Other
}

/// `[d,d,d,d,d,d]d` at the start of the line, one digit per slot
fn is_object_header(line: &str) -> bool {
    let b = line.as_bytes();
    if b.len() < 14 || b[0] != b'[' || b[12] != b']' || !b[13].is_ascii_digit() {
        return false;
    }
    (0..6).all(|i| {
        let digit = b[1 + 2 * i];
        let sep = b[2 + 2 * i];
        digit.is_ascii_digit() && (sep == if i < 5 { b',' } else { b']' })
    })
}

/// Decode a decrypted response frame.
///
/// Attribute values are kept as text; see `coerce_types`.
pub fn decode(frame: &str) -> Result<ResponsePayload, FrameError> {
    let mut error_code = 0i64;
    let mut current: Option<Record> = None;
    let mut records = Vec::new();

    for raw in frame.trim().split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        match classify(line) {
            Line::ObjectHeader => {
                records.extend(current.take());
                current = Some(Record::new());
            }
            Line::Error(code) => {
                error_code = code
                    .parse()
                    .map_err(|_| FrameError::InvalidErrorCode(code.to_string()))?;
                records.extend(current.take());
            }
            Line::Attribute(key, value) => match current.as_mut() {
                Some(record) => record.insert(key, Value::Text(value.to_string())),
                None => trace!("Attribute outside of an object: {:?}", line),
            },
            Line::Other => {
                if !line.is_empty() {
                    trace!("Ignoring frame line: {:?}", line);
                }
            }
        }
    }
    records.extend(current.take());

    Ok(ResponsePayload {
        error_code,
        records,
    })
}
