// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! FIT file header encoding and container validation

use super::crc::crc16;
use super::{
    FitError, Result, CRC_SIZE, DATA_TYPE, HEADER_SIZE, LEGACY_HEADER_SIZE, PROFILE_VERSION,
    PROTOCOL_VERSION,
};

/// FIT file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitHeader {
    /// Header size (14, or 12 for legacy files without a header CRC)
    pub header_size: u8,
    /// Protocol version (0x10 for 1.0, 0x20 for 2.0)
    pub protocol_version: u8,
    /// Profile version (108 for 1.08)
    pub profile_version: u16,
    /// Bytes between the header and the file CRC
    pub data_size: u32,
    /// Header CRC, `None` for 12-byte headers
    pub crc: Option<u16>,
}

impl FitHeader {
    pub fn new(data_size: u32) -> Self {
        Self {
            header_size: HEADER_SIZE as u8,
            protocol_version: PROTOCOL_VERSION,
            profile_version: PROFILE_VERSION,
            data_size,
            crc: None,
        }
    }

    /// The first 12 bytes, which the header CRC covers
    pub fn prefix(&self) -> [u8; LEGACY_HEADER_SIZE] {
        let mut buf = [0u8; LEGACY_HEADER_SIZE];
        buf[0] = self.header_size;
        buf[1] = self.protocol_version;
        buf[2..4].copy_from_slice(&self.profile_version.to_le_bytes());
        buf[4..8].copy_from_slice(&self.data_size.to_le_bytes());
        buf[8..12].copy_from_slice(&DATA_TYPE);
        buf
    }

    /// Encode as a 14-byte header with a freshly computed CRC
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let prefix = self.prefix();
        let mut buf = [0u8; HEADER_SIZE];
        buf[..LEGACY_HEADER_SIZE].copy_from_slice(&prefix);
        buf[LEGACY_HEADER_SIZE..].copy_from_slice(&crc16(&prefix).to_le_bytes());
        buf
    }

    /// Parse and check a header from the start of `bytes`.
    ///
    /// A zero header CRC is accepted: the FIT format uses it to mean
    /// "not computed".
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LEGACY_HEADER_SIZE {
            return Err(FitError::Truncated {
                needed: LEGACY_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let header_size = bytes[0];
        if header_size as usize != HEADER_SIZE && header_size as usize != LEGACY_HEADER_SIZE {
            return Err(FitError::InvalidHeader(format!(
                "unsupported header size {header_size}"
            )));
        }
        if bytes.len() < header_size as usize {
            return Err(FitError::Truncated {
                needed: header_size as usize,
                actual: bytes.len(),
            });
        }
        if bytes[8..12] != DATA_TYPE {
            return Err(FitError::InvalidHeader("missing .FIT signature".to_string()));
        }

        let crc = if header_size as usize == HEADER_SIZE {
            let stored = u16::from_le_bytes([bytes[12], bytes[13]]);
            let computed = crc16(&bytes[..LEGACY_HEADER_SIZE]);
            if stored != 0 && stored != computed {
                return Err(FitError::CrcMismatch {
                    field: "header",
                    stored,
                    computed,
                });
            }
            Some(stored)
        } else {
            None
        };

        Ok(Self {
            header_size,
            protocol_version: bytes[1],
            profile_version: u16::from_le_bytes([bytes[2], bytes[3]]),
            data_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            crc,
        })
    }
}

/// Result of validating a complete container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitSummary {
    pub header: FitHeader,
    pub file_crc: u16,
}

impl FitSummary {
    pub fn data_size(&self) -> u32 {
        self.header.data_size
    }
}

/// Validate a complete FIT container held in memory
pub fn validate(bytes: &[u8]) -> Result<FitSummary> {
    let header = FitHeader::parse(bytes)?;
    let header_size = header.header_size as usize;

    let needed = header_size + CRC_SIZE;
    if bytes.len() < needed {
        return Err(FitError::Truncated {
            needed,
            actual: bytes.len(),
        });
    }

    let actual = bytes.len() - needed;
    if header.data_size as usize != actual {
        return Err(FitError::SizeMismatch {
            declared: header.data_size,
            actual,
        });
    }

    let crc_offset = bytes.len() - CRC_SIZE;
    let stored = u16::from_le_bytes([bytes[crc_offset], bytes[crc_offset + 1]]);
    let computed = crc16(&bytes[..crc_offset]);
    if stored != computed {
        return Err(FitError::CrcMismatch {
            field: "file",
            stored,
            computed,
        });
    }

    Ok(FitSummary {
        header,
        file_crc: stored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_FILE: [u8; 16] = [
        0x0E, 0x10, 0x6C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2E, 0x46, 0x49, 0x54, 0xA0, 0x04, 0x00,
        0x00,
    ];

    #[test]
    fn test_header_encoding() {
        let encoded = FitHeader::new(0).encode();
        assert_eq!(encoded, EMPTY_FILE[..14]);
    }

    #[test]
    fn test_header_encoding_with_data_size() {
        let encoded = FitHeader::new(11).encode();
        assert_eq!(&encoded[4..8], &[0x0B, 0, 0, 0]);
        assert_eq!(&encoded[12..], &[0xE1, 0xB7]);
    }

    #[test]
    fn test_parse_roundtrip_fields() {
        let encoded = FitHeader::new(4242).encode();
        let parsed = FitHeader::parse(&encoded).unwrap();
        assert_eq!(parsed.header_size, 14);
        assert_eq!(parsed.protocol_version, PROTOCOL_VERSION);
        assert_eq!(parsed.profile_version, PROFILE_VERSION);
        assert_eq!(parsed.data_size, 4242);
    }

    #[test]
    fn test_validate_empty_container() {
        let summary = validate(&EMPTY_FILE).unwrap();
        assert_eq!(summary.data_size(), 0);
        assert_eq!(summary.file_crc, 0);
    }

    #[test]
    fn test_validate_rejects_bad_signature() {
        let mut bytes = EMPTY_FILE;
        bytes[9] = b'X';
        assert!(matches!(validate(&bytes), Err(FitError::InvalidHeader(_))));
    }

    #[test]
    fn test_validate_rejects_corrupt_header_crc() {
        let mut bytes = EMPTY_FILE;
        bytes[12] ^= 0xFF;
        assert!(matches!(
            validate(&bytes),
            Err(FitError::CrcMismatch { field: "header", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_size_mismatch() {
        let mut bytes = EMPTY_FILE.to_vec();
        bytes.insert(14, 0x40);
        assert!(matches!(
            validate(&bytes),
            Err(FitError::SizeMismatch { declared: 0, actual: 1 })
        ));
    }

    #[test]
    fn test_validate_rejects_truncated() {
        assert!(matches!(
            validate(&EMPTY_FILE[..10]),
            Err(FitError::Truncated { .. })
        ));
        assert!(matches!(
            validate(&EMPTY_FILE[..14]),
            Err(FitError::Truncated { needed: 16, actual: 14 })
        ));
    }
}
