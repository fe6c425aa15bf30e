//! Fan telemetry over the controller key namespace.

use tracing::debug;

use super::{SmcClient, SmcKey};
use crate::snapshot::FanSample;

/// Count key: number of fans the controller manages.
const FAN_COUNT_KEY: [u8; 4] = *b"FNum";

/// Upper bound on fans read even if the controller reports more. Per-fan
/// keys carry the index as one hex digit, so 16 is also the addressing
/// limit.
pub const MAX_FANS: usize = 16;

/// Reads the controller fan count and per-fan speed keys.
///
/// Fans are an optional capability: a missing or zero count yields an empty
/// list, never an error. Key derivation embeds the fan index as an uppercase
/// hexadecimal digit in a fixed 4-character pattern (`F0Ac`, `F1Mn`,
/// `FFMx`).
#[derive(Debug, Clone)]
pub struct FanReader {
    max_fans: usize,
}

impl FanReader {
    pub fn new() -> Self {
        Self { max_fans: MAX_FANS }
    }

    /// Lower the per-read fan bound. Values above [`MAX_FANS`] are clamped.
    #[must_use]
    pub fn with_max_fans(mut self, max: usize) -> Self {
        self.max_fans = max.min(MAX_FANS);
        self
    }

    /// Read every discoverable fan.
    ///
    /// Individual key failures degrade the single fan; only the count read
    /// gates the whole list, and its failure means "no fans", not an error.
    pub fn read_fans(&self, client: &mut SmcClient) -> Vec<FanSample> {
        let reported = match client.read_unsigned_key(SmcKey::from_bytes(FAN_COUNT_KEY)) {
            Ok(count) => count as usize,
            Err(err) => {
                debug!(error = %err, "Fan count unavailable");
                return Vec::new();
            }
        };
        if reported == 0 {
            return Vec::new();
        }
        if reported > self.max_fans {
            debug!(
                reported,
                clamp = self.max_fans,
                "Clamping implausible fan count"
            );
        }
        let count = reported.min(self.max_fans);
        (0..count).map(|index| read_fan(client, index)).collect()
    }
}

impl Default for FanReader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_fan(client: &mut SmcClient, index: usize) -> FanSample {
    let actual = client.read_float_key(fan_key(index, *b"Ac"));
    let min_rpm = client.read_float_key(fan_key(index, *b"Mn")).unwrap_or(0.0);
    let max_rpm = client.read_float_key(fan_key(index, *b"Mx")).unwrap_or(0.0);
    match actual {
        Ok(rpm) => FanSample {
            rpm,
            min_rpm,
            max_rpm,
            valid: true,
        },
        Err(err) => {
            debug!(fan = index, error = %err, "Fan speed read failed");
            FanSample {
                rpm: 0.0,
                min_rpm,
                max_rpm,
                valid: false,
            }
        }
    }
}

/// Derive a per-fan key: `F`, the index as an uppercase hex digit, suffix.
fn fan_key(index: usize, suffix: [u8; 2]) -> SmcKey {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    SmcKey::from_bytes([b'F', HEX[index & 0xF], suffix[0], suffix[1]])
}
