//! Big-endian XDR primitives as written by the EPICS `saveData` record.
use std::io::{self, prelude::*, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use super::MDAError;

pub(crate) struct XdrReader<R: Read + Seek> {
    stream: R,
    length: u64,
}

impl<R: Read + Seek> XdrReader<R> {
    pub(crate) fn new(mut stream: R) -> io::Result<Self> {
        let length = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;
        Ok(Self { stream, length })
    }

    pub(crate) fn len(&self) -> u64 {
        self.length
    }

    pub(crate) fn position(&mut self) -> io::Result<u64> {
        self.stream.stream_position()
    }

    fn remaining(&mut self) -> io::Result<u64> {
        Ok(self.length.saturating_sub(self.position()?))
    }

    pub(crate) fn seek_to(&mut self, offset: i64) -> Result<(), MDAError> {
        if offset < 0 || offset as u64 >= self.length {
            return Err(MDAError::InvalidOffset {
                offset,
                length: self.length,
            });
        }
        self.stream.seek(SeekFrom::Start(offset as u64))?;
        Ok(())
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, MDAError> {
        Ok(self.stream.read_i32::<BigEndian>()?)
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32, MDAError> {
        Ok(self.stream.read_f32::<BigEndian>()?)
    }

    /// Read a non-negative count, checking that `element_size * count` bytes could
    /// still follow in the stream.
    pub(crate) fn read_count(&mut self, what: &str, element_size: u64) -> Result<usize, MDAError> {
        let count = self.read_i32()?;
        self.check_count(count, what, element_size)
    }

    pub(crate) fn check_count(
        &mut self,
        count: i32,
        what: &str,
        element_size: u64,
    ) -> Result<usize, MDAError> {
        if count < 0 {
            return Err(MDAError::InvalidStructure(format!(
                "negative {what} count {count}"
            )));
        }
        self.require((count as u64).saturating_mul(element_size), what)?;
        Ok(count as usize)
    }

    /// Fail unless at least `bytes` bytes remain in the stream
    pub(crate) fn require(&mut self, bytes: u64, what: &str) -> Result<(), MDAError> {
        let remaining = self.remaining()?;
        if bytes > remaining {
            return Err(MDAError::InvalidStructure(format!(
                "{what} needs {bytes} bytes but only {remaining} remain"
            )));
        }
        Ok(())
    }

    fn skip_padding(&mut self, n: usize) -> Result<(), MDAError> {
        let pad = (4 - n % 4) % 4;
        if pad > 0 {
            let mut buf = [0u8; 3];
            self.stream.read_exact(&mut buf[..pad])?;
        }
        Ok(())
    }

    /// Fixed-length opaque data, padded to a multiple of four bytes
    pub(crate) fn read_opaque(&mut self, n: usize) -> Result<Vec<u8>, MDAError> {
        let mut buf = vec![0u8; n];
        self.stream.read_exact(&mut buf)?;
        self.skip_padding(n)?;
        Ok(buf)
    }

    /// An XDR string: `u32` length, bytes, padding
    pub(crate) fn read_string(&mut self) -> Result<String, MDAError> {
        let n = self.read_count("string byte", 1)?;
        let buf = self.read_opaque(n)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// A `saveData` counted string: an `i32` length, then an XDR string only when
    /// that length is non-zero.
    pub(crate) fn read_counted_string(&mut self) -> Result<String, MDAError> {
        let n = self.read_count("string byte", 1)?;
        if n == 0 {
            Ok(String::new())
        } else {
            self.read_string()
        }
    }

    pub(crate) fn read_i32_array(&mut self, n: usize) -> Result<Vec<i32>, MDAError> {
        let mut out = vec![0i32; n];
        self.stream.read_i32_into::<BigEndian>(&mut out)?;
        Ok(out)
    }

    pub(crate) fn read_f32_array(&mut self, n: usize) -> Result<Vec<f32>, MDAError> {
        let mut out = vec![0f32; n];
        self.stream.read_f32_into::<BigEndian>(&mut out)?;
        Ok(out)
    }

    pub(crate) fn read_f32_array_as_f64(&mut self, n: usize) -> Result<Vec<f64>, MDAError> {
        Ok(self.read_f32_array(n)?.into_iter().map(f64::from).collect())
    }

    pub(crate) fn read_f64_array(&mut self, n: usize) -> Result<Vec<f64>, MDAError> {
        let mut out = vec![0f64; n];
        self.stream.read_f64_into::<BigEndian>(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_strings_and_padding() -> Result<(), MDAError> {
        let mut buf: Vec<u8> = Vec::new();
        // counted string "abcde"
        buf.extend(5i32.to_be_bytes());
        buf.extend(5u32.to_be_bytes());
        buf.extend(b"abcde\0\0\0");
        // empty counted string
        buf.extend(0i32.to_be_bytes());
        buf.extend(1.5f64.to_be_bytes());

        let mut reader = XdrReader::new(Cursor::new(buf))?;
        assert_eq!(reader.read_counted_string()?, "abcde");
        assert_eq!(reader.read_counted_string()?, "");
        assert_eq!(reader.read_f64_array(1)?, vec![1.5]);
        Ok(())
    }

    #[test]
    fn test_count_guard() -> Result<(), MDAError> {
        let mut buf: Vec<u8> = Vec::new();
        buf.extend(1_000_000i32.to_be_bytes());
        buf.extend((-3i32).to_be_bytes());
        let mut reader = XdrReader::new(Cursor::new(buf))?;
        assert!(matches!(
            reader.read_count("sample", 8),
            Err(MDAError::InvalidStructure(_))
        ));
        assert!(matches!(
            reader.read_count("sample", 8),
            Err(MDAError::InvalidStructure(_))
        ));
        assert!(matches!(
            reader.seek_to(64),
            Err(MDAError::InvalidOffset { offset: 64, .. })
        ));
        Ok(())
    }
}
