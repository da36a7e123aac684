//! Read EPICS `saveData` MDA scan files.
//!
//! An MDA file stores one multi-dimensional motor scan as a tree of nested scan
//! blocks. [`ScanRecord`] flattens that tree into one [`ScanLevel`] per nesting
//! depth, and [`ScanFileReader`] pulls stage positions and region-of-interest
//! traces out of the two outermost levels.
use byteorder::{BigEndian, ByteOrder};

mod parser;
mod reader;
mod record;
mod xdr;

pub use parser::{read_scan_file, MDAError, MAX_RANK, SUPPORTED_VERSIONS};
pub use reader::{
    read_positioners, read_roi, ScanFileError, ScanFileOptions, ScanFileReader,
    DEFAULT_ROI_NUMBER, DEFAULT_THETA_IDENTIFIER, DEFAULT_Z_IDENTIFIER,
};
pub use record::{
    ExtraPV, ExtraPVValue, PositionerInfo, ScanChannel, ScanLevel, ScanRecord, Trigger,
    MDA_TIME_FORMAT,
};

/// Check whether `buf` starts like an MDA file header: a version number
/// [`SUPPORTED_VERSIONS`] accepts, a scan number, then a rank of at most [`MAX_RANK`].
pub fn is_mda(buf: &[u8]) -> bool {
    if buf.len() < 12 {
        return false;
    }
    let version = BigEndian::read_f32(&buf[0..4]);
    let rank = BigEndian::read_i32(&buf[8..12]);
    (SUPPORTED_VERSIONS.0..=SUPPORTED_VERSIONS.1).contains(&version)
        && (1..=MAX_RANK).contains(&rank)
}
