// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! FIT CRC-16
//!
//! Nibble-wise, table-driven update: the low nibble of each byte is folded in
//! first, then the high nibble. Device firmware checks this exact sequence,
//! so the table and update order must not change.

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

/// Fold a single byte into `crc`
pub fn crc16_update(crc: u16, byte: u8) -> u16 {
    // Lower nibble
    let mut tmp = CRC_TABLE[(crc & 0xF) as usize];
    let mut crc = (crc >> 4) & 0x0FFF;
    crc = crc ^ tmp ^ CRC_TABLE[(byte & 0xF) as usize];

    // Upper nibble
    tmp = CRC_TABLE[(crc & 0xF) as usize];
    crc = (crc >> 4) & 0x0FFF;
    crc ^ tmp ^ CRC_TABLE[((byte >> 4) & 0xF) as usize]
}

/// CRC of `data` starting from zero
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0, |crc, &byte| crc16_update(crc, byte))
}

/// Running CRC for streamed input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.value = data
            .iter()
            .fold(self.value, |crc, &byte| crc16_update(crc, byte));
    }

    pub fn value(&self) -> u16 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(crc16(b"123456789"), 0xBB3D);
    }

    #[test]
    fn test_empty_and_zero_byte() {
        assert_eq!(crc16(&[]), 0);
        assert_eq!(crc16(&[0x00]), 0);
    }

    #[test]
    fn test_known_fit_header() {
        let header = [0x0E, 0x10, 0x6C, 0x00, 0x00, 0x00, 0x00, 0x00, b'.', b'F', b'I', b'T'];
        assert_eq!(crc16(&header), 0x04A0);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

        let mut running = Crc16::new();
        for chunk in data.chunks(7) {
            running.update(chunk);
        }

        assert_eq!(running.value(), crc16(&data));
    }

    #[test]
    fn test_appending_crc_zeroes_register() {
        let mut data = b".FIT header bytes".to_vec();
        let crc = crc16(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(crc16(&data), 0);
    }
}
