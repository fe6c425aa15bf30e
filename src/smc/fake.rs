//! Scripted in-memory controller.
//!
//! Backs protocol and fan tests with the same two-phase exchanges real
//! hardware answers, without any hardware: keys are registered with a type
//! code and payload, and failure modes (missing keys, forced result codes, a
//! channel that dies after N exchanges) are scriptable.

use std::collections::HashMap;

use super::{
    CMD_READ_BYTES, CMD_READ_KEY_INFO, MAX_PAYLOAD, RESULT_KEY_NOT_FOUND, RESULT_OK, SmcError,
    SmcExchange, SmcKey, SmcTransport,
};

#[derive(Debug, Clone)]
struct FakeKey {
    data_type: u32,
    payload: Vec<u8>,
    result: u8,
}

/// In-memory [`SmcTransport`] with scripted keys and failures.
#[derive(Debug, Default)]
pub struct FakeSmcDevice {
    keys: HashMap<u32, FakeKey>,
    exchanges: u32,
    dead_after: Option<u32>,
}

impl FakeSmcDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a readable key.
    #[must_use]
    pub fn with_key(mut self, key: SmcKey, data_type: u32, payload: &[u8]) -> Self {
        self.keys.insert(
            key.raw(),
            FakeKey {
                data_type,
                payload: payload.to_vec(),
                result: RESULT_OK,
            },
        );
        self
    }

    /// Register a key the controller answers with a failure result code.
    #[must_use]
    pub fn with_failing_key(mut self, key: SmcKey, result: u8) -> Self {
        self.keys.insert(
            key.raw(),
            FakeKey {
                data_type: 0,
                payload: Vec::new(),
                result,
            },
        );
        self
    }

    /// Kill the channel after `n` successful exchanges.
    #[must_use]
    pub fn with_channel_death_after(mut self, n: u32) -> Self {
        self.dead_after = Some(n);
        self
    }

    /// Number of exchanges issued so far, for cheapness assertions.
    pub fn exchanges(&self) -> u32 {
        self.exchanges
    }
}

impl SmcTransport for FakeSmcDevice {
    fn exchange(&mut self, frame: &mut SmcExchange) -> Result<(), SmcError> {
        if let Some(limit) = self.dead_after {
            if self.exchanges >= limit {
                return Err(SmcError::ChannelUnavailable);
            }
        }
        self.exchanges += 1;

        let Some(entry) = self.keys.get(&frame.key) else {
            frame.result = RESULT_KEY_NOT_FOUND;
            return Ok(());
        };
        if entry.result != RESULT_OK {
            frame.result = entry.result;
            return Ok(());
        }

        match frame.command {
            CMD_READ_KEY_INFO => {
                frame.data_size = entry.payload.len() as u32;
                frame.data_type = entry.data_type;
                frame.result = RESULT_OK;
            }
            CMD_READ_BYTES => {
                let len = (frame.data_size as usize).min(entry.payload.len()).min(MAX_PAYLOAD);
                frame.bytes[..len].copy_from_slice(&entry.payload[..len]);
                frame.result = RESULT_OK;
            }
            _ => {
                frame.result = RESULT_KEY_NOT_FOUND;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{SmcClient, TYPE_UI16};
    use super::*;

    #[test]
    fn scripted_channel_death_fails_later_exchanges() {
        let device = FakeSmcDevice::new()
            .with_key(SmcKey::from_bytes(*b"FNum"), TYPE_UI16, &[0, 2])
            .with_channel_death_after(2);
        let mut client = SmcClient::new(Box::new(device));

        // First read consumes both allowed exchanges (describe + read).
        assert_eq!(client.read_unsigned("FNum").unwrap(), 2);
        assert_eq!(
            client.read_unsigned("FNum"),
            Err(SmcError::ChannelUnavailable)
        );
    }

    #[test]
    fn forced_result_codes_surface_as_rejections() {
        let device =
            FakeSmcDevice::new().with_failing_key(SmcKey::from_bytes(*b"F0Ac"), 0x40);
        let mut client = SmcClient::new(Box::new(device));
        assert!(matches!(
            client.read_float("F0Ac"),
            Err(SmcError::CommandRejected { code: 0x40, .. })
        ));
    }
}
