//! The uniform in-memory representation of extracted XRF data.
//!
//! Every reader in [`crate::io`] produces one of these value types, no matter
//! which on-disk layout the file used. They are only ever constructed after
//! the data they hold has been validated, so a value that exists is complete.
use std::path::Path;

use indexmap::IndexMap;
use ndarray::Array1;

use crate::array::NumericArray;

/// Names of the ion chamber scalers every analyzed-data read must locate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IonChamberNames {
    pub upstream: String,
    pub downstream: String,
}

impl Default for IonChamberNames {
    fn default() -> Self {
        Self {
            upstream: "US_IC".to_string(),
            downstream: "DS_IC".to_string(),
        }
    }
}

impl IonChamberNames {
    pub fn new(upstream: impl Into<String>, downstream: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into(),
            downstream: downstream.into(),
        }
    }
}

/// Find the first position of `name` in `names`.
pub fn name_index(names: &[String], name: &str) -> Option<usize> {
    names.iter().position(|n| n == name)
}

/// Look up `name` in `names` and pull the matching entry out of `values`.
///
/// `values` must be parallel-indexed with `names` along its first axis.
pub(crate) fn lookup_entry(
    names: &[String],
    values: &NumericArray,
    name: &str,
) -> Option<NumericArray> {
    name_index(names, name).and_then(|i| values.entry(i))
}

/// The stage positions recorded in a scan file
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionerResult {
    /// The outer scan positioner's samples
    pub y_pos: Array1<f64>,
    /// The inner scan positioner's samples recorded during the first outer point
    pub x_pos: Array1<f64>,
    pub z_pos: Option<f64>,
    pub theta_pos: Option<f64>,
}

/// A region-of-interest trace and, optionally, the positions it was sampled at.
///
/// Both halves are independently optional.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoiResult {
    pub roi: Option<Array1<f64>>,
    pub position: Option<Array1<f64>>,
}

impl RoiResult {
    pub fn into_parts(self) -> (Option<Array1<f64>>, Option<Array1<f64>>) {
        (self.roi, self.position)
    }
}

/// A fully validated read of one fit type from an analyzed-data container.
///
/// `channel_names[i]` labels `channel_data.entry(i)` and `scaler_names[i]`
/// labels `scaler_values.entry(i)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractionResult {
    /// The file name of the source, used to label derived outputs
    pub scan_name: String,
    pub fit_type: String,
    /// Counts per second, channel axis first
    pub channel_data: NumericArray,
    pub channel_names: Vec<String>,
    pub scaler_values: NumericArray,
    pub scaler_names: Vec<String>,
    pub x_axis: NumericArray,
    pub y_axis: NumericArray,
    pub energy_axis: Option<NumericArray>,
    pub integrated_spectrum: Option<NumericArray>,
    pub upstream_ion_chamber: Option<NumericArray>,
    pub downstream_ion_chamber: Option<NumericArray>,
    pub positioners: Option<PositionerResult>,
}

/// One channel of an [`ExtractionResult`] together with the scan grid it was
/// measured on, borrowed read-only.
#[derive(Debug, Clone, Copy)]
pub struct ChannelMap<'a> {
    pub scan_name: &'a str,
    pub channel_name: &'a str,
    pub index: usize,
    pub channel_data: &'a NumericArray,
    pub x_axis: &'a NumericArray,
    pub y_axis: &'a NumericArray,
}

impl<'a> ChannelMap<'a> {
    /// Copy out this channel's map
    pub fn data(&self) -> Option<NumericArray> {
        self.channel_data.entry(self.index)
    }
}

impl ExtractionResult {
    pub fn n_channels(&self) -> usize {
        self.channel_names.len()
    }

    /// The number of scan points per channel
    pub fn n_points(&self) -> usize {
        self.channel_data.shape().iter().skip(1).product()
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        name_index(&self.channel_names, name)
    }

    pub fn channel(&self, name: &str) -> Option<NumericArray> {
        lookup_entry(&self.channel_names, &self.channel_data, name)
    }

    pub fn scaler(&self, name: &str) -> Option<NumericArray> {
        lookup_entry(&self.scaler_names, &self.scaler_values, name)
    }

    pub fn channel_map(&self, name: &str) -> Option<ChannelMap<'_>> {
        let index = self.channel_index(name)?;
        Some(ChannelMap {
            scan_name: &self.scan_name,
            channel_name: &self.channel_names[index],
            index,
            channel_data: &self.channel_data,
            x_axis: &self.x_axis,
            y_axis: &self.y_axis,
        })
    }

    /// Attach stage positions read from the matching scan file
    pub fn with_positioners(mut self, positioners: PositionerResult) -> Self {
        self.positioners = Some(positioners);
        self
    }

    pub fn x_pos(&self) -> Option<&Array1<f64>> {
        self.positioners.as_ref().map(|p| &p.x_pos)
    }

    pub fn y_pos(&self) -> Option<&Array1<f64>> {
        self.positioners.as_ref().map(|p| &p.y_pos)
    }

    pub fn z_pos(&self) -> Option<f64> {
        self.positioners.as_ref().and_then(|p| p.z_pos)
    }

    pub fn theta_pos(&self) -> Option<f64> {
        self.positioners.as_ref().and_then(|p| p.theta_pos)
    }
}

/// The channel and scaler maps of a single fit type within a [`FitBatch`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitMaps {
    pub channel_data: NumericArray,
    pub channel_names: Vec<String>,
    pub scaler_values: NumericArray,
    pub scaler_names: Vec<String>,
}

/// Several fit types read from one container in a single pass
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitBatch {
    pub scan_name: String,
    pub x_axis: NumericArray,
    pub y_axis: NumericArray,
    /// Keyed by fit type, in the order they were requested
    pub fits: IndexMap<String, FitMaps>,
}

impl FitBatch {
    pub fn fit(&self, fit_type: &str) -> Option<&FitMaps> {
        self.fits.get(fit_type)
    }

    pub fn fit_types(&self) -> impl Iterator<Item = &str> {
        self.fits.keys().map(|k| k.as_str())
    }
}

pub(crate) fn scan_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
