use derive_more::Display;
use serde::Serialize;

/// Bytes carried by one AIS data datagram
pub const AIS_DATA_LEN: usize = 8;

/// Bytes of AIS seed data trailing the mission byte in a nominal-mode command
pub const AIS_SEED_LEN: usize = 7;

/// Partial or complete ship-identification payload, accumulated while
/// Mission 2 is running.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Display, Serialize)]
#[display(
    fmt = "{{mmsi: {}, packet_index: {}, data: {:02X?}}}",
    "mmsi",
    "packet_index",
    "data"
)]
pub struct AisBuffer {
    /// Maritime Mobile Service Identity, taken from the seed bytes
    pub mmsi: u32,
    /// Raw bytes of the most recent AIS packet
    pub data: [u8; AIS_DATA_LEN],
    /// Number of AIS packets received since the seed
    pub packet_index: u8,
}

impl AisBuffer {
    /// Replace the buffer with the seed that arrives with the nominal-mode
    /// command. The first four seed bytes are the big-endian MMSI.
    pub fn seed(&mut self, seed: &[u8; AIS_SEED_LEN]) {
        self.data = [0; AIS_DATA_LEN];
        self.data[..AIS_SEED_LEN].copy_from_slice(seed);
        self.mmsi = u32::from_be_bytes([seed[0], seed[1], seed[2], seed[3]]);
        self.packet_index = 0;
    }

    pub fn push(&mut self, data: &[u8; AIS_DATA_LEN]) {
        self.data = *data;
        self.packet_index = self.packet_index.wrapping_add(1);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_then_push() {
        let mut ais = AisBuffer::default();
        ais.seed(&[0x0E, 0x1B, 0x7C, 0x2A, 0xEE, 0xFF, 0x11]);
        assert_eq!(ais.mmsi, 0x0E1B_7C2A);
        assert_eq!(ais.packet_index, 0);
        assert_eq!(ais.data, [0x0E, 0x1B, 0x7C, 0x2A, 0xEE, 0xFF, 0x11, 0x00]);

        ais.push(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ais.packet_index, 1);
        assert_eq!(ais.data, [1, 2, 3, 4, 5, 6, 7, 8]);
        // MMSI sticks with the seed
        assert_eq!(ais.mmsi, 0x0E1B_7C2A);
    }
}
