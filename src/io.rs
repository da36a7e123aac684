//! Readers for the file formats an XRF microprobe beamline writes
pub mod maps;
pub mod mda;
mod infer_format;

pub use crate::io::infer_format::{infer_format, infer_from_path, infer_from_stream, XrfFileFormat};
pub use crate::io::maps::{
    load_xrf, AnalyzedContainerReader, ContainerError, LayoutCandidate, LayoutDescriptor,
    ResolveError, SchemaResolver, SizeGatedLayout,
};
pub use crate::io::mda::{
    read_positioners, read_roi, MDAError, ScanFileError, ScanFileOptions, ScanFileReader,
    ScanRecord,
};
