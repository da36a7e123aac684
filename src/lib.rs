//! `xrfdata` reads X-ray fluorescence maps out of MAPS analyzed-data HDF5
//! containers and stage positions out of EPICS MDA scan files.
//!
//! The analyzed-data container has gone through several internal layouts, so
//! [`SchemaResolver`] tries each known [`LayoutDescriptor`] in turn and returns
//! the first complete [`ExtractionResult`]. Scan files are read with a
//! [`ScanFileReader`].
//!
//! ```no_run
//! use xrfdata::io::{load_xrf, read_positioners, ScanFileOptions};
//!
//! let maps = load_xrf("img.dat/2xfm_0123.mda.h5", "ROI").unwrap();
//! let positions = read_positioners("mda/2xfm_0123.mda", &ScanFileOptions::default()).unwrap();
//! let maps = maps.with_positioners(positions);
//! println!("{} channels over {} points", maps.n_channels(), maps.n_points());
//! ```
pub mod array;
pub mod diagnostics;
pub mod io;
pub mod xrf;

#[cfg(test)]
mod test_fixtures;

pub use crate::array::{ArrayDataType, NumericArray};
pub use crate::diagnostics::Diagnostics;
pub use crate::io::{
    infer_format, load_xrf, read_positioners, read_roi, AnalyzedContainerReader,
    ContainerError, LayoutDescriptor, ResolveError, ScanFileError, ScanFileOptions,
    ScanFileReader, SchemaResolver, XrfFileFormat,
};
pub use crate::xrf::{
    ChannelMap, ExtractionResult, FitBatch, FitMaps, IonChamberNames, PositionerResult, RoiResult,
};
