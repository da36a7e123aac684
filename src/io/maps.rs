//! Read fitted XRF maps from MAPS analyzed-data HDF5 containers.
//!
//! The container has been written with several different internal layouts over
//! time and a file does not say which one it uses. A [`LayoutDescriptor`]
//! names where one layout keeps each dataset, an [`AnalyzedContainerReader`]
//! reads a file with a single layout, and a [`SchemaResolver`] tries a list of
//! candidate layouts in order until one of them fits.
//!
//! ```no_run
//! use xrfdata::io::maps::load_xrf;
//!
//! let result = load_xrf("img.dat/2xfm_0123.mda.h5", "ROI").unwrap();
//! let iron = result.channel("Fe").unwrap();
//! println!("{} channels, Fe map shape {:?}", result.n_channels(), iron.shape());
//! ```
mod batch;
mod datasets;
mod layout;
mod reader;
mod resolver;

pub use batch::{extraction_from_batch, SizeGatedLayout, DEFAULT_MINIMUM_SIZE};
pub use layout::{
    LayoutDescriptor, RequiredField, DEFAULT_LAYOUTS, FIT_TYPE_TOKEN, MAPS_V10, MAPS_V9,
    MAPS_V9_SPECTRA,
};
pub use reader::{AnalyzedContainerReader, ContainerError};
pub use resolver::{
    load_xrf, resolve, LayoutCandidate, LayoutFailure, ResolveError, SchemaResolver,
};

/// The fit type read when a caller reads a single layout directly
pub const DEFAULT_FIT_TYPE: &str = "NNLS";

/// The fit type read when a caller resolves against every known layout
pub const DEFAULT_RESOLVE_FIT_TYPE: &str = "ROI";

/// The eight byte signature at the start of every HDF5 file
pub const HDF5_SIGNATURE: &[u8] = b"\x89HDF\r\n\x1a\n";

pub fn is_hdf5(buf: &[u8]) -> bool {
    buf.starts_with(HDF5_SIGNATURE)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_fixtures::MapsFixture;
    use std::fs;

    #[test]
    fn test_is_hdf5() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scan.h5");
        MapsFixture::flat(&["ROI"]).write(&path)?;
        let buf = fs::read(&path)?;
        assert!(is_hdf5(&buf));
        assert!(!is_hdf5(b"BEGIN IONS"));
        Ok(())
    }
}
