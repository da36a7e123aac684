use std::fmt::Display;
use std::fs;
use std::io::{self, prelude::*, BufReader};
use std::path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::io::maps::is_hdf5;
use crate::io::mda::is_mda;

/// Beamline file formats that [`xrfdata`](crate) reads
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum XrfFileFormat {
    /// A MAPS analyzed-data HDF5 container
    AnalyzedContainer,
    /// An EPICS `saveData` MDA scan file
    ScanFile,
    Unknown,
}

impl Display for XrfFileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

lazy_static! {
    /// MAPS numbers the containers of each detector element `h50`, `h51`, ...
    static ref HDF5_EXTENSION: Regex = Regex::new(r"^(h5\d*|hdf5)$").unwrap();
}

/// Given a path, infer the file format from its extension
pub fn infer_from_path<P: Into<path::PathBuf>>(path: P) -> XrfFileFormat {
    let path: path::PathBuf = path.into();
    if let Some(ext) = path.extension() {
        if let Some(ext) = ext.to_ascii_lowercase().to_str() {
            match ext {
                "mda" => XrfFileFormat::ScanFile,
                _ if HDF5_EXTENSION.is_match(ext) => XrfFileFormat::AnalyzedContainer,
                _ => XrfFileFormat::Unknown,
            }
        } else {
            XrfFileFormat::Unknown
        }
    } else {
        XrfFileFormat::Unknown
    }
}

/// Given a stream of bytes, infer the file format from its leading bytes.
/// This assumes the stream is seekable, and leaves it where it started.
pub fn infer_from_stream<R: Read + Seek>(stream: &mut R) -> io::Result<XrfFileFormat> {
    let mut buf = vec![0u8; 16];
    let current_pos = stream.stream_position()?;
    let mut bytes_read = 0;
    while bytes_read < buf.len() {
        let n = stream.read(&mut buf[bytes_read..])?;
        if n == 0 {
            break;
        }
        bytes_read += n;
    }
    buf.truncate(bytes_read);
    stream.seek(io::SeekFrom::Start(current_pos))?;

    match &buf {
        _ if is_hdf5(&buf) => Ok(XrfFileFormat::AnalyzedContainer),
        _ if is_mda(&buf) => Ok(XrfFileFormat::ScanFile),
        _ => Ok(XrfFileFormat::Unknown),
    }
}

/// Given a path, infer the file format using both the file name and, when that
/// is inconclusive, the file's leading bytes
pub fn infer_format<P: Into<path::PathBuf>>(path: P) -> io::Result<XrfFileFormat> {
    let path: path::PathBuf = path.into();

    match infer_from_path(&path) {
        XrfFileFormat::Unknown => {
            let handle = fs::File::open(path)?;
            let mut stream = BufReader::new(handle);
            infer_from_stream(&mut stream)
        }
        format => Ok(format),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_fixtures::{MapsFixture, MdaFixture};
    use std::io::Cursor;

    #[test]
    fn infer_by_extension() {
        assert_eq!(infer_from_path("img.dat/2xfm_0123.mda.h5"), XrfFileFormat::AnalyzedContainer);
        assert_eq!(infer_from_path("img.dat/2xfm_0123.mda.h50"), XrfFileFormat::AnalyzedContainer);
        assert_eq!(infer_from_path("scan.HDF5"), XrfFileFormat::AnalyzedContainer);
        assert_eq!(infer_from_path("mda/2xfm_0123.mda"), XrfFileFormat::ScanFile);
        assert_eq!(infer_from_path("notes.txt"), XrfFileFormat::Unknown);
        assert_eq!(infer_from_path("h5"), XrfFileFormat::Unknown);
    }

    #[test]
    fn infer_by_content() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let container = dir.path().join("container.bin");
        MapsFixture::grouped(&["ROI"]).write(&container)?;
        let scan = dir.path().join("scan.bin");
        MdaFixture::default().write(&scan)?;
        let other = dir.path().join("other.bin");
        fs::write(&other, b"BEGIN IONS\n")?;

        assert_eq!(infer_format(&container)?, XrfFileFormat::AnalyzedContainer);
        assert_eq!(infer_format(&scan)?, XrfFileFormat::ScanFile);
        assert_eq!(infer_format(&other)?, XrfFileFormat::Unknown);

        let mut stream = Cursor::new(fs::read(&scan)?);
        stream.set_position(4);
        assert_eq!(infer_from_stream(&mut stream)?, XrfFileFormat::Unknown);
        assert_eq!(stream.position(), 4);
        Ok(())
    }
}
