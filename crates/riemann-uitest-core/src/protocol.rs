//! Binary wire protocol spoken with the on-device accessibility agent.
//!
//! # Packet Structure (Little Endian)
//!
//! ```text
//! [Header: 4 bytes LE u32 len] [OpCode: 1 byte] [Payload: variable]
//! ```
//!
//! `len` covers the opcode and payload, not the header itself. Strings are a
//! `u32` LE byte count followed by UTF-8 bytes.
//!
//! Only the operations the test script needs are modelled: heartbeat, taps,
//! keyboard input, tree dumps and target selection.
//!
//! # Example
//!
//! ```
//! use riemann_uitest_core::protocol::{Request, encode_request, decode_request};
//!
//! let req = Request::TypeText { text: "-2\n".to_string() };
//! let wire = encode_request(&req);
//! let decoded = decode_request(&wire[4..]).unwrap();
//! assert_eq!(decoded, req);
//! ```

use thiserror::Error;

/// Errors that can occur while encoding or decoding frames.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpCode(u8),

    #[error("insufficient data in buffer")]
    InsufficientData,

    #[error("invalid UTF-8 in string field")]
    Utf8Error,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("frame of {0} bytes exceeds the {max} byte limit", max = MAX_FRAME_LEN)]
    FrameTooLarge(u32),
}

/// Largest frame body (opcode plus payload) accepted from the agent.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// On-the-wire operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Keep-alive ping (no payload).
    Heartbeat = 0x01,
    /// Tap at absolute coordinates (i32 x, i32 y).
    TapCoord = 0x02,
    /// Tap element by accessibility identifier.
    TapElement = 0x03,
    /// Tap element by accessibility label.
    TapByLabel = 0x04,
    /// Tap with element type filter (selector + by_label bool + type).
    TapWithType = 0x05,
    /// Type text into the focused element.
    TypeText = 0x06,
    /// Full accessibility tree dump (no payload).
    DumpTree = 0x10,
    /// Select the application whose tree is queried (bundle id).
    SetTarget = 0x12,
    /// Bare error message from the agent.
    Error = 0x99,
    /// Generic response (response-type byte + variable data).
    Response = 0xA0,
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0x01 => Ok(OpCode::Heartbeat),
            0x02 => Ok(OpCode::TapCoord),
            0x03 => Ok(OpCode::TapElement),
            0x04 => Ok(OpCode::TapByLabel),
            0x05 => Ok(OpCode::TapWithType),
            0x06 => Ok(OpCode::TypeText),
            0x10 => Ok(OpCode::DumpTree),
            0x12 => Ok(OpCode::SetTarget),
            0x99 => Ok(OpCode::Error),
            0xA0 => Ok(OpCode::Response),
            other => Err(ProtocolError::InvalidOpCode(other)),
        }
    }
}

/// A typed request from the host to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Heartbeat,
    TapCoord { x: i32, y: i32 },
    TapElement { selector: String },
    TapByLabel { label: String },
    TapWithType {
        selector: String,
        by_label: bool,
        element_type: String,
    },
    TypeText { text: String },
    DumpTree,
    SetTarget { bundle_id: String },
}

impl Request {
    /// Short static name for span metadata.
    pub fn opcode_name(&self) -> &'static str {
        match self {
            Request::Heartbeat => "heartbeat",
            Request::TapCoord { .. } => "tap_coord",
            Request::TapElement { .. } => "tap_element",
            Request::TapByLabel { .. } => "tap_by_label",
            Request::TapWithType { .. } => "tap_with_type",
            Request::TypeText { .. } => "type_text",
            Request::DumpTree => "dump_tree",
            Request::SetTarget { .. } => "set_target",
        }
    }
}

/// Response sub-type byte inside the `Response` opcode payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ResponseType {
    Ok = 0x00,
    Error = 0x01,
    Tree = 0x02,
}

impl ResponseType {
    fn from_u8(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0x00 => Ok(ResponseType::Ok),
            0x01 => Ok(ResponseType::Error),
            0x02 => Ok(ResponseType::Tree),
            other => Err(ProtocolError::InvalidPayload(format!(
                "unknown response type: 0x{other:02X}"
            ))),
        }
    }
}

/// A typed response from the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Error { message: String },
    /// JSON-encoded accessibility tree (array of root elements).
    Tree { json: String },
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn write_bool(buf: &mut Vec<u8>, v: bool) {
    buf.push(u8::from(v));
}

/// Sequential reader over a payload slice.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::InsufficientData);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| ProtocolError::InsufficientData)?;
        Ok(i32::from_le_bytes(bytes))
    }

    fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| ProtocolError::InsufficientData)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::Utf8Error)
    }
}

/// Wraps a payload (opcode + data) with the 4-byte LE length header.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Reads the payload length from a 4-byte LE header.
pub fn read_frame_length(header: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*header)
}

/// Encodes a [`Request`] into a complete frame, header included.
pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut payload = Vec::new();

    match req {
        Request::Heartbeat => payload.push(OpCode::Heartbeat as u8),
        Request::TapCoord { x, y } => {
            payload.push(OpCode::TapCoord as u8);
            payload.extend_from_slice(&x.to_le_bytes());
            payload.extend_from_slice(&y.to_le_bytes());
        }
        Request::TapElement { selector } => {
            payload.push(OpCode::TapElement as u8);
            write_string(&mut payload, selector);
        }
        Request::TapByLabel { label } => {
            payload.push(OpCode::TapByLabel as u8);
            write_string(&mut payload, label);
        }
        Request::TapWithType {
            selector,
            by_label,
            element_type,
        } => {
            payload.push(OpCode::TapWithType as u8);
            write_string(&mut payload, selector);
            write_bool(&mut payload, *by_label);
            write_string(&mut payload, element_type);
        }
        Request::TypeText { text } => {
            payload.push(OpCode::TypeText as u8);
            write_string(&mut payload, text);
        }
        Request::DumpTree => payload.push(OpCode::DumpTree as u8),
        Request::SetTarget { bundle_id } => {
            payload.push(OpCode::SetTarget as u8);
            write_string(&mut payload, bundle_id);
        }
    }

    encode_frame(&payload)
}

/// Decodes a request from the bytes following the length header.
pub fn decode_request(data: &[u8]) -> Result<Request, ProtocolError> {
    let mut cur = Cursor::new(data);
    let opcode = OpCode::from_u8(cur.read_u8()?)?;

    match opcode {
        OpCode::Heartbeat => Ok(Request::Heartbeat),
        OpCode::TapCoord => {
            let x = cur.read_i32()?;
            let y = cur.read_i32()?;
            Ok(Request::TapCoord { x, y })
        }
        OpCode::TapElement => Ok(Request::TapElement {
            selector: cur.read_string()?,
        }),
        OpCode::TapByLabel => Ok(Request::TapByLabel {
            label: cur.read_string()?,
        }),
        OpCode::TapWithType => {
            let selector = cur.read_string()?;
            let by_label = cur.read_bool()?;
            let element_type = cur.read_string()?;
            Ok(Request::TapWithType {
                selector,
                by_label,
                element_type,
            })
        }
        OpCode::TypeText => Ok(Request::TypeText {
            text: cur.read_string()?,
        }),
        OpCode::DumpTree => Ok(Request::DumpTree),
        OpCode::SetTarget => Ok(Request::SetTarget {
            bundle_id: cur.read_string()?,
        }),
        OpCode::Error | OpCode::Response => Err(ProtocolError::InvalidPayload(format!(
            "opcode 0x{:02X} is not a valid request opcode",
            opcode as u8
        ))),
    }
}

/// Encodes a [`Response`] into a complete frame, header included.
pub fn encode_response(resp: &Response) -> Vec<u8> {
    let mut payload = vec![OpCode::Response as u8];

    match resp {
        Response::Ok => payload.push(ResponseType::Ok as u8),
        Response::Error { message } => {
            payload.push(ResponseType::Error as u8);
            write_string(&mut payload, message);
        }
        Response::Tree { json } => {
            payload.push(ResponseType::Tree as u8);
            write_string(&mut payload, json);
        }
    }

    encode_frame(&payload)
}

/// Decodes a response from the bytes following the length header.
///
/// Accepts both the `Response` opcode and a bare `Error` opcode.
pub fn decode_response(data: &[u8]) -> Result<Response, ProtocolError> {
    let mut cur = Cursor::new(data);
    let opcode = OpCode::from_u8(cur.read_u8()?)?;

    match opcode {
        OpCode::Response => match ResponseType::from_u8(cur.read_u8()?)? {
            ResponseType::Ok => Ok(Response::Ok),
            ResponseType::Error => Ok(Response::Error {
                message: cur.read_string()?,
            }),
            ResponseType::Tree => Ok(Response::Tree {
                json: cur.read_string()?,
            }),
        },
        OpCode::Error => Ok(Response::Error {
            message: cur.read_string()?,
        }),
        _ => Err(ProtocolError::InvalidPayload(format!(
            "opcode 0x{:02X} is not a valid response opcode",
            opcode as u8
        ))),
    }
}
