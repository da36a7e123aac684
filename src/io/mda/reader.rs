use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::parser::MDAError;
use super::record::{ScanLevel, ScanRecord};
use crate::diagnostics::Diagnostics;
use crate::xrf::{PositionerResult, RoiResult};

/// The region-of-interest index read when a caller does not name one
pub const DEFAULT_ROI_NUMBER: u32 = 16;

/// The inner-scan detector recording the sample z stage
pub const DEFAULT_Z_IDENTIFIER: &str = "21:D3:SM:SZ:ActPos";

/// The outer-scan detector recording the rotation stage
pub const DEFAULT_THETA_IDENTIFIER: &str = "9idbTAU:SM:CT:RqsPos";

#[derive(Debug, Error)]
pub enum ScanFileError {
    #[error("Scan file {} does not exist", .0.display())]
    PathNotFound(PathBuf),
    #[error("Invalid scan file {}: {reason}", .path.display())]
    InvalidScanFile {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<MDAError>,
    },
}

impl ScanFileError {
    fn invalid(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidScanFile {
            path: path.to_path_buf(),
            reason: reason.into(),
            source: None,
        }
    }
}

impl From<ScanFileError> for io::Error {
    fn from(value: ScanFileError) -> Self {
        match value {
            ScanFileError::PathNotFound(_) => io::Error::new(io::ErrorKind::NotFound, value),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// Which optional positioners to look up, and under what names.
///
/// `None` skips that positioner entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanFileOptions {
    pub z_identifier: Option<String>,
    pub theta_identifier: Option<String>,
}

impl Default for ScanFileOptions {
    fn default() -> Self {
        Self {
            z_identifier: Some(DEFAULT_Z_IDENTIFIER.to_string()),
            theta_identifier: Some(DEFAULT_THETA_IDENTIFIER.to_string()),
        }
    }
}

impl ScanFileOptions {
    pub fn with_z_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.z_identifier = Some(identifier.into());
        self
    }

    pub fn with_theta_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.theta_identifier = Some(identifier.into());
        self
    }

    pub fn without_z(mut self) -> Self {
        self.z_identifier = None;
        self
    }

    pub fn without_theta(mut self) -> Self {
        self.theta_identifier = None;
        self
    }
}

/// Reads positioners and region-of-interest traces from MDA scan files.
///
/// The outer scan level is the slow axis, the inner level the fast axis.
#[derive(Debug, Clone, Default)]
pub struct ScanFileReader {
    options: ScanFileOptions,
    diagnostics: Diagnostics,
}

impl ScanFileReader {
    pub fn new(options: ScanFileOptions) -> Self {
        Self {
            options,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn options(&self) -> &ScanFileOptions {
        &self.options
    }

    fn open(&self, path: &Path) -> Result<ScanRecord, ScanFileError> {
        if !path.exists() {
            return Err(ScanFileError::PathNotFound(path.to_path_buf()));
        }
        let record = ScanRecord::open_path(path).map_err(|e| ScanFileError::InvalidScanFile {
            path: path.to_path_buf(),
            reason: "could not be parsed".to_string(),
            source: Some(e),
        })?;
        self.diagnostics.debug(
            module_path!(),
            format_args!(
                "Read scan file {} of rank {} with {} levels",
                path.display(),
                record.rank,
                record.levels.len()
            ),
        );
        Ok(record)
    }

    fn optional_sample(
        &self,
        path: &Path,
        level: &ScanLevel,
        label: &str,
        identifier: Option<&str>,
    ) -> Option<f64> {
        let identifier = identifier?;
        let value = level
            .detector_named(identifier)
            .and_then(|channel| channel.first_sample());
        if value.is_none() {
            self.diagnostics.soft_miss(
                module_path!(),
                format_args!(
                    "No {label} positioner {identifier} in {}",
                    path.display()
                ),
            );
        }
        value
    }

    /// Read the stage positions of a two dimensional scan.
    ///
    /// `y_pos` and `x_pos` are mandatory. `z_pos` and `theta_pos` are taken from the
    /// first sample of the detector whose name matches the configured identifier, and
    /// are left unset when no detector does.
    pub fn read_positioners<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<PositionerResult, ScanFileError> {
        let path = path.as_ref();
        let record = self.open(path)?;

        let outer = record
            .outer()
            .ok_or_else(|| ScanFileError::invalid(path, "no outer scan"))?;
        let y_pos = outer
            .positioners
            .first()
            .and_then(|p| p.first_row())
            .ok_or_else(|| ScanFileError::invalid(path, "the outer scan has no positioner"))?;

        let inner = record
            .inner()
            .ok_or_else(|| ScanFileError::invalid(path, "no inner scan"))?;
        let x_pos = inner
            .positioners
            .first()
            .and_then(|p| p.first_row())
            .ok_or_else(|| ScanFileError::invalid(path, "the inner scan has no positioner"))?;

        let z_pos = self.optional_sample(path, inner, "z", self.options.z_identifier.as_deref());
        let theta_pos = self.optional_sample(
            path,
            outer,
            "theta",
            self.options.theta_identifier.as_deref(),
        );

        Ok(PositionerResult {
            y_pos,
            x_pos,
            z_pos,
            theta_pos,
        })
    }

    /// Read the outer-scan detector whose name contains `R{roi_number}`.
    ///
    /// When `return_position` is set, the outer scan's first positioner is returned
    /// alongside it. Failures never propagate: an unreadable file is logged and
    /// yields an empty [`RoiResult`].
    pub fn read_roi<P: AsRef<Path>>(
        &self,
        path: P,
        roi_number: u32,
        return_position: bool,
    ) -> RoiResult {
        let path = path.as_ref();
        let record = match self.open(path) {
            Ok(record) => record,
            Err(e) => {
                self.diagnostics.warn(
                    module_path!(),
                    format_args!("Failed to read ROI {roi_number} from {}: {e}", path.display()),
                );
                return RoiResult::default();
            }
        };
        let Some(outer) = record.outer() else {
            self.diagnostics.warn(
                module_path!(),
                format_args!("{} has no outer scan", path.display()),
            );
            return RoiResult::default();
        };

        let token = format!("R{roi_number}");
        let roi = outer
            .detector_containing(&token)
            .and_then(|channel| channel.first_row());
        if roi.is_none() {
            self.diagnostics.soft_miss(
                module_path!(),
                format_args!("No detector matching {token} in {}", path.display()),
            );
        }

        let position = if return_position {
            let position = outer.positioners.first().and_then(|p| p.first_row());
            if position.is_none() {
                self.diagnostics.soft_miss(
                    module_path!(),
                    format_args!("No outer positioner in {}", path.display()),
                );
            }
            position
        } else {
            None
        };

        RoiResult { roi, position }
    }
}

/// Read the stage positions of `path` with `options`, logging through the global logger.
pub fn read_positioners<P: AsRef<Path>>(
    path: P,
    options: &ScanFileOptions,
) -> Result<PositionerResult, ScanFileError> {
    ScanFileReader::new(options.clone()).read_positioners(path)
}

pub fn read_roi<P: AsRef<Path>>(path: P, roi_number: u32, return_position: bool) -> RoiResult {
    ScanFileReader::default().read_roi(path, roi_number, return_position)
}
