// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! FIT (Flexible and Interoperable Data Transfer) container support
//!
//! Only the container framing is implemented here:
//! - File header (14 bytes, with its own CRC)
//! - Data records (opaque bytes supplied by the caller)
//! - File CRC (2 bytes, over every preceding byte)
//!
//! The encoder streams into any `Write + Seek` sink and patches the header
//! once the payload size is known, so activity exports never have to be
//! buffered in memory.

pub mod crc;
pub mod encoder;
pub mod header;

use thiserror::Error;

pub use crc::{crc16, crc16_update, Crc16};
pub use encoder::FitEncoder;
pub use header::{validate, FitHeader, FitSummary};

/// Size of the header written by the encoder
pub const HEADER_SIZE: usize = 14;

/// Size of the legacy header without a header CRC
pub const LEGACY_HEADER_SIZE: usize = 12;

/// Size of the trailing file CRC
pub const CRC_SIZE: usize = 2;

/// Protocol version 1.0
pub const PROTOCOL_VERSION: u8 = 0x10;

/// Profile version 1.08
pub const PROFILE_VERSION: u16 = 108;

/// ASCII ".FIT"
pub const DATA_TYPE: [u8; 4] = *b".FIT";

#[derive(Error, Debug)]
pub enum FitError {
    #[error("FIT encoder already closed")]
    Closed,

    #[error("FIT payload exceeds the 4 GiB data size limit")]
    DataTooLarge,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid FIT header: {0}")]
    InvalidHeader(String),

    #[error("{field} CRC mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    CrcMismatch {
        field: &'static str,
        stored: u16,
        computed: u16,
    },

    #[error("FIT file truncated: need at least {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("FIT data size mismatch: header says {declared} bytes, file holds {actual}")]
    SizeMismatch { declared: u32, actual: usize },
}

pub type Result<T> = std::result::Result<T, FitError>;
