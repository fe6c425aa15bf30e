//! Binary key/value protocol client for the system management controller.
//!
//! The controller exposes sensors behind 4-character keys (`FNum`, `F0Ac`).
//! Reads are two-phase: a describe command reports the key's payload size
//! and type code, then a read command returns up to [`MAX_PAYLOAD`] raw
//! bytes the caller decodes according to that size. Requests and responses
//! share one fixed-size exchange structure addressed by the key packed
//! big-endian into a 32-bit integer.

pub mod fake;
pub mod fan;

use std::fmt;

use thiserror::Error;
use tracing::debug;

/// Payload capacity of the exchange structure.
pub const MAX_PAYLOAD: usize = 32;

/// Describe command: fills `data_size` and `data_type` for a key.
pub const CMD_READ_KEY_INFO: u8 = 9;
/// Read command: fills `bytes` with `data_size` bytes of payload.
pub const CMD_READ_BYTES: u8 = 5;

/// Controller result code for success.
pub const RESULT_OK: u8 = 0;
/// Controller result code for a key it does not carry.
pub const RESULT_KEY_NOT_FOUND: u8 = 132;

/// FourCC type code for an 8-bit unsigned payload.
pub const TYPE_UI8: u32 = u32::from_be_bytes(*b"ui8 ");
/// FourCC type code for a 16-bit unsigned payload.
pub const TYPE_UI16: u32 = u32::from_be_bytes(*b"ui16");
/// FourCC type code for a 32-bit unsigned payload.
pub const TYPE_UI32: u32 = u32::from_be_bytes(*b"ui32");
/// FourCC type code for a packed IEEE-754 payload.
pub const TYPE_FLT: u32 = u32::from_be_bytes(*b"flt ");

/// A 4-character controller key packed big-endian into 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SmcKey(u32);

impl SmcKey {
    /// Pack a 4-character name. Fails on any other length.
    pub fn new(name: &str) -> Result<Self, SmcError> {
        let bytes = name.as_bytes();
        match bytes.try_into() {
            Ok(packed) => Ok(Self::from_bytes(packed)),
            Err(_) => Err(SmcError::BadKeyName {
                name: name.to_string(),
            }),
        }
    }

    /// Pack a known-good 4-byte name.
    pub const fn from_bytes(name: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(name))
    }

    /// The packed wire representation.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The 4-character name with unprintable bytes shown as `.`, for logs.
    pub fn name(self) -> String {
        self.0
            .to_be_bytes()
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect()
    }
}

impl fmt::Display for SmcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Protocol-level failures.
///
/// Everything except [`SmcError::ChannelUnavailable`] is key-scoped: the key
/// has no usable data right now, and other keys are unaffected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SmcError {
    /// The channel to the controller never opened or has died.
    #[error("controller channel unavailable")]
    ChannelUnavailable,
    /// Key name was not exactly 4 bytes.
    #[error("bad controller key name {name:?}")]
    BadKeyName { name: String },
    /// The controller does not carry this key.
    #[error("controller key {key} not found")]
    KeyNotFound { key: String },
    /// The controller answered with a non-success result code.
    #[error("controller rejected {key} (result {code})")]
    CommandRejected { key: String, code: u8 },
    /// Payload size does not match any decodable encoding.
    #[error("cannot decode {key}: {size}-byte payload")]
    Decode { key: String, size: u32 },
}

impl SmcError {
    /// True for failures scoped to a single key, as opposed to a dead
    /// channel that fails every key.
    pub fn is_key_scoped(&self) -> bool {
        !matches!(self, Self::ChannelUnavailable)
    }
}

/// One request/response exchange.
///
/// The client fills `key`, `command` and (for reads) `data_size`; the
/// transport fills `result`, the descriptor fields and `bytes`.
#[derive(Debug, Clone, Copy)]
pub struct SmcExchange {
    pub key: u32,
    pub command: u8,
    pub data_size: u32,
    pub data_type: u32,
    pub result: u8,
    pub bytes: [u8; MAX_PAYLOAD],
}

impl SmcExchange {
    pub fn request(key: SmcKey, command: u8) -> Self {
        Self {
            key: key.raw(),
            command,
            data_size: 0,
            data_type: 0,
            result: 0,
            bytes: [0; MAX_PAYLOAD],
        }
    }
}

/// Channel to the controller.
///
/// One long-lived handle, used from one thread. An exchange error means the
/// channel itself failed; per-key problems travel back in
/// [`SmcExchange::result`].
pub trait SmcTransport {
    fn exchange(&mut self, frame: &mut SmcExchange) -> Result<(), SmcError>;
}

/// Two-phase typed reads over an [`SmcTransport`].
///
/// A client whose channel never opened stays constructed: every read returns
/// [`SmcError::ChannelUnavailable`] immediately, so polling callers degrade
/// to cheap no-ops instead of re-attempting the connection.
pub struct SmcClient {
    transport: Option<Box<dyn SmcTransport>>,
}

impl SmcClient {
    /// Wrap an open transport.
    pub fn new(transport: Box<dyn SmcTransport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// A permanently-closed client; every read short-circuits.
    pub fn closed() -> Self {
        Self { transport: None }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Describe a key: its payload size and FourCC type code.
    pub fn read_key_info(&mut self, key: SmcKey) -> Result<(u32, u32), SmcError> {
        let frame = self.exchange(key, CMD_READ_KEY_INFO, 0)?;
        Ok((frame.data_size, frame.data_type))
    }

    /// Read a key's raw payload using the size learned from
    /// [`read_key_info`](Self::read_key_info).
    pub fn read_key_value(&mut self, key: SmcKey, data_size: u32) -> Result<Vec<u8>, SmcError> {
        if data_size as usize > MAX_PAYLOAD {
            return Err(SmcError::Decode {
                key: key.name(),
                size: data_size,
            });
        }
        let frame = self.exchange(key, CMD_READ_BYTES, data_size)?;
        Ok(frame.bytes[..data_size as usize].to_vec())
    }

    /// Two-step read decoding a 1-, 2- or 4-byte big-endian unsigned payload.
    pub fn read_unsigned(&mut self, name: &str) -> Result<u32, SmcError> {
        self.read_unsigned_key(SmcKey::new(name)?)
    }

    pub fn read_unsigned_key(&mut self, key: SmcKey) -> Result<u32, SmcError> {
        let (size, _data_type) = self.read_key_info(key)?;
        let payload = self.read_key_value(key, size)?;
        decode_unsigned(key, &payload)
    }

    /// Two-step read decoding a packed IEEE-754 payload.
    pub fn read_float(&mut self, name: &str) -> Result<f32, SmcError> {
        self.read_float_key(SmcKey::new(name)?)
    }

    pub fn read_float_key(&mut self, key: SmcKey) -> Result<f32, SmcError> {
        let (size, _data_type) = self.read_key_info(key)?;
        let payload = self.read_key_value(key, size)?;
        decode_float(key, &payload)
    }

    fn exchange(
        &mut self,
        key: SmcKey,
        command: u8,
        data_size: u32,
    ) -> Result<SmcExchange, SmcError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(SmcError::ChannelUnavailable);
        };
        let mut frame = SmcExchange::request(key, command);
        frame.data_size = data_size;
        transport.exchange(&mut frame)?;
        match frame.result {
            RESULT_OK => Ok(frame),
            RESULT_KEY_NOT_FOUND => Err(SmcError::KeyNotFound { key: key.name() }),
            code => {
                debug!(key = %key, code, "Controller rejected command");
                Err(SmcError::CommandRejected {
                    key: key.name(),
                    code,
                })
            }
        }
    }
}

/// Decode a big-endian unsigned payload of 1, 2 or 4 bytes.
pub fn decode_unsigned(key: SmcKey, payload: &[u8]) -> Result<u32, SmcError> {
    match *payload {
        [b0] => Ok(u32::from(b0)),
        [b0, b1] => Ok(u32::from(u16::from_be_bytes([b0, b1]))),
        [b0, b1, b2, b3] => Ok(u32::from_be_bytes([b0, b1, b2, b3])),
        _ => Err(SmcError::Decode {
            key: key.name(),
            size: payload.len() as u32,
        }),
    }
}

/// Decode a 4-byte packed float, least-significant byte first.
///
/// The byte order is a property of the controller firmware, pinned here and
/// validated against known-good readings. This is not a general IEEE-754
/// reader; swapping the order yields plausible-looking but wrong magnitudes.
pub fn decode_float(key: SmcKey, payload: &[u8]) -> Result<f32, SmcError> {
    match *payload {
        [b0, b1, b2, b3] => Ok(f32::from_bits(u32::from_le_bytes([b0, b1, b2, b3]))),
        _ => Err(SmcError::Decode {
            key: key.name(),
            size: payload.len() as u32,
        }),
    }
}
