// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Streaming FIT container writer

use std::io::{self, Seek, SeekFrom, Write};

use tracing::debug;

use super::crc::Crc16;
use super::header::FitHeader;
use super::{FitError, Result, HEADER_SIZE, LEGACY_HEADER_SIZE};

const DATA_SIZE_OFFSET: u64 = 4;
const HEADER_CRC_OFFSET: u64 = LEGACY_HEADER_SIZE as u64;

/// Writes a FIT container into a seekable sink without buffering the payload.
///
/// The header goes out immediately with a zero data size and zero header
/// CRC. [`FitEncoder::close`] seeks back to patch both, then appends the
/// file CRC. Dropping an encoder without closing it leaves the placeholder
/// header in the sink.
pub struct FitEncoder<W: Write + Seek> {
    sink: W,
    /// Stream position of the first header byte
    start: u64,
    data_size: u64,
    crc: Crc16,
    closed: bool,
}

impl<W: Write + Seek> FitEncoder<W> {
    /// Write the placeholder header at the sink's current position
    pub fn open(mut sink: W) -> Result<Self> {
        let start = sink.stream_position()?;

        let mut placeholder = FitHeader::new(0).prefix().to_vec();
        placeholder.extend_from_slice(&[0, 0]);
        sink.write_all(&placeholder)?;

        debug!(offset = start, "FIT header placeholder written");

        Ok(Self {
            sink,
            start,
            data_size: 0,
            crc: Crc16::new(),
            closed: false,
        })
    }

    /// Append data record bytes
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(FitError::Closed);
        }

        let data_size = self.data_size + bytes.len() as u64;
        if data_size > u64::from(u32::MAX) {
            return Err(FitError::DataTooLarge);
        }

        self.sink.write_all(bytes)?;
        self.crc.update(bytes);
        self.data_size = data_size;
        Ok(())
    }

    /// Backfill the header and append the file CRC.
    ///
    /// Only the first call succeeds; later calls return [`FitError::Closed`].
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(FitError::Closed);
        }
        self.closed = true;

        // Checked on every write
        let data_size = self.data_size as u32;
        let header = FitHeader::new(data_size).encode();

        self.sink
            .seek(SeekFrom::Start(self.start + DATA_SIZE_OFFSET))?;
        self.sink.write_all(&header[4..8])?;

        self.sink
            .seek(SeekFrom::Start(self.start + HEADER_CRC_OFFSET))?;
        self.sink.write_all(&header[LEGACY_HEADER_SIZE..])?;

        // A header ending in its own little-endian CRC leaves the register at
        // zero, so the CRC of the data alone is the CRC of header plus data.
        debug_assert_eq!(super::crc16(&header), 0);
        let file_crc = self.crc.value();

        self.sink.seek(SeekFrom::Start(
            self.start + HEADER_SIZE as u64 + self.data_size,
        ))?;
        self.sink.write_all(&file_crc.to_le_bytes())?;
        self.sink.flush()?;

        debug!(
            data_size,
            header_crc = format!("{:#06x}", u16::from_le_bytes([header[12], header[13]])),
            file_crc = format!("{file_crc:#06x}"),
            "FIT container finalized"
        );

        Ok(())
    }

    /// Close the container and hand back the sink
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        Ok(self.sink)
    }

    /// Bytes written since the header
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Return the sink as-is, closed or not
    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write + Seek> Write for FitEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        FitEncoder::write(self, buf).map_err(into_io_error)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

fn into_io_error(err: FitError) -> io::Error {
    match err {
        FitError::Io(e) => e,
        other => io::Error::other(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_empty_container_bytes() {
        let encoder = FitEncoder::open(Cursor::new(Vec::new())).unwrap();
        let bytes = encoder.finish().unwrap().into_inner();

        assert_eq!(
            bytes,
            vec![
                0x0E, 0x10, 0x6C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2E, 0x46, 0x49, 0x54, 0xA0,
                0x04, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn test_known_payload_vector() {
        let payload = [0x40, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x04];
        let mut encoder = FitEncoder::open(Cursor::new(Vec::new())).unwrap();
        encoder.write(&payload).unwrap();
        let bytes = encoder.finish().unwrap().into_inner();

        assert_eq!(bytes.len(), 14 + payload.len() + 2);
        assert_eq!(&bytes[4..8], &[0x0B, 0, 0, 0]);
        assert_eq!(&bytes[12..14], &[0xE1, 0xB7]);
        assert_eq!(&bytes[bytes.len() - 2..], &0x2F54u16.to_le_bytes());
    }

    #[test]
    fn test_placeholder_header_before_close() {
        let mut encoder = FitEncoder::open(Cursor::new(Vec::new())).unwrap();
        encoder.write(&[1, 2, 3]).unwrap();
        let bytes = encoder.into_inner().into_inner();

        assert_eq!(bytes.len(), 17);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(&bytes[12..14], &[0, 0]);
    }

    #[test]
    fn test_double_close_and_write_after_close() {
        let mut encoder = FitEncoder::open(Cursor::new(Vec::new())).unwrap();
        encoder.close().unwrap();

        assert!(matches!(encoder.close(), Err(FitError::Closed)));
        assert!(matches!(encoder.close(), Err(FitError::Closed)));
        assert!(matches!(encoder.write(&[0x01]), Err(FitError::Closed)));
        assert!(encoder.is_closed());
    }

    #[test]
    fn test_io_write_after_close_is_error() {
        let mut encoder = FitEncoder::open(Cursor::new(Vec::new())).unwrap();
        encoder.close().unwrap();
        assert!(Write::write_all(&mut encoder, b"late").is_err());
    }

    #[test]
    fn test_open_at_non_zero_offset() {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(b"prefix").unwrap();

        let mut encoder = FitEncoder::open(cursor).unwrap();
        encoder.write(b"data").unwrap();
        let bytes = encoder.finish().unwrap().into_inner();

        assert_eq!(&bytes[..6], b"prefix");
        let summary = crate::fit::validate(&bytes[6..]).unwrap();
        assert_eq!(summary.data_size(), 4);
    }
}
