use std::io;
use std::path::{Path, PathBuf};

use hdf5::Group;
use thiserror::Error;

use crate::array::NumericArray;
use crate::diagnostics::Diagnostics;
use crate::xrf::{lookup_entry, name_index, scan_name_of, ExtractionResult, IonChamberNames};

use super::datasets::{member_names, path_exists, read_names, read_numeric};
use super::layout::{LayoutDescriptor, RequiredField};
use super::resolver::LayoutCandidate;

/// The ways reading an analyzed-data container can fail
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("File not found: {}", .0.display())]
    PathNotFound(PathBuf),
    #[error("Failed to open {} as an HDF5 file: {source}", .path.display())]
    OpenFailed { path: PathBuf, source: hdf5::Error },
    #[error("Required group or dataset '{path}' not found for layout {layout}")]
    SchemaMismatch { layout: String, path: String },
    #[error("Fit type '{fit_type}' not found. Available types: {available:?}")]
    FitTypeNotFound {
        fit_type: String,
        available: Vec<String>,
    },
    #[error("Fit type '{0}' is not a valid group name")]
    InvalidFitType(String),
    #[error("Required scaler '{0}' not found in scaler_names")]
    MissingScaler(String),
    #[error("Required field {0} was not populated")]
    MissingField(RequiredField),
    #[error("Dataset '{dataset}' has an invalid shape: {reason}")]
    InvalidShape { dataset: String, reason: String },
    #[error("Dataset '{dataset}' has an unsupported data type {dtype}")]
    UnsupportedDataType { dataset: String, dtype: String },
    #[error("Entry {index} of '{dataset}' is not valid UTF-8 text")]
    InvalidName { dataset: String, index: usize },
    #[error("File {} is {size} bytes, not larger than the {minimum} byte minimum", .path.display())]
    FileTooSmall {
        path: PathBuf,
        size: u64,
        minimum: u64,
    },
    #[error("Failed to read '{dataset}': {source}")]
    DatasetRead { dataset: String, source: hdf5::Error },
    #[error("An IO error occurred: {0}")]
    IOError(#[from] io::Error),
}

impl ContainerError {
    /// Whether this failure means the file does not follow the layout that was tried,
    /// so another layout may still succeed.
    pub fn is_layout_mismatch(&self) -> bool {
        matches!(
            self,
            Self::SchemaMismatch { .. }
                | Self::MissingScaler(_)
                | Self::MissingField(_)
                | Self::InvalidShape { .. }
                | Self::UnsupportedDataType { .. }
                | Self::InvalidName { .. }
                | Self::FileTooSmall { .. }
        )
    }
}

impl From<ContainerError> for io::Error {
    fn from(value: ContainerError) -> Self {
        match value {
            ContainerError::PathNotFound(_) => io::Error::new(io::ErrorKind::NotFound, value),
            ContainerError::IOError(e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub(crate) fn open_container(path: &Path) -> Result<hdf5::File, ContainerError> {
    if !path.exists() {
        return Err(ContainerError::PathNotFound(path.to_path_buf()));
    }
    hdf5::File::open(path).map_err(|source| ContainerError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn require_group(
    root: &Group,
    group: &str,
    layout: &str,
) -> Result<(), ContainerError> {
    if path_exists(root, group) {
        Ok(())
    } else {
        Err(ContainerError::SchemaMismatch {
            layout: layout.to_string(),
            path: group.to_string(),
        })
    }
}

pub(crate) fn require_fit_type(
    root: &Group,
    analyzed_group: &str,
    fit_type: &str,
) -> Result<(), ContainerError> {
    if fit_type.is_empty() || fit_type.contains(['/', '{', '}']) {
        return Err(ContainerError::InvalidFitType(fit_type.to_string()));
    }
    let available = member_names(root, analyzed_group)?;
    if available.iter().any(|k| k == fit_type) {
        Ok(())
    } else {
        Err(ContainerError::FitTypeNotFound {
            fit_type: fit_type.to_string(),
            available,
        })
    }
}

pub(crate) fn require_paths<'a>(
    root: &Group,
    paths: impl IntoIterator<Item = &'a str>,
    layout: &str,
) -> Result<(), ContainerError> {
    for path in paths {
        if !path_exists(root, path) {
            return Err(ContainerError::SchemaMismatch {
                layout: layout.to_string(),
                path: path.to_string(),
            });
        }
    }
    Ok(())
}

/// Check that `values` has one entry along its first axis per name
pub(crate) fn require_parallel(
    values: &NumericArray,
    names: &[String],
    dataset: &str,
    min_ndim: usize,
) -> Result<(), ContainerError> {
    if values.ndim() < min_ndim {
        return Err(ContainerError::InvalidShape {
            dataset: dataset.to_string(),
            reason: format!(
                "expected at least {min_ndim} dimensions, found shape {:?}",
                values.shape()
            ),
        });
    }
    if values.entries() != Some(names.len()) {
        return Err(ContainerError::InvalidShape {
            dataset: dataset.to_string(),
            reason: format!(
                "first axis of shape {:?} does not match {} names",
                values.shape(),
                names.len()
            ),
        });
    }
    Ok(())
}

pub(crate) fn require_vector(values: &NumericArray, dataset: &str) -> Result<(), ContainerError> {
    if values.ndim() != 1 {
        return Err(ContainerError::InvalidShape {
            dataset: dataset.to_string(),
            reason: format!("expected a 1-D array, found shape {:?}", values.shape()),
        });
    }
    Ok(())
}

/// Locate a required scaler by exact name and copy out its map
pub(crate) fn require_scaler(
    scaler_names: &[String],
    scaler_values: &NumericArray,
    name: &str,
) -> Result<NumericArray, ContainerError> {
    if name_index(scaler_names, name).is_none() {
        return Err(ContainerError::MissingScaler(name.to_string()));
    }
    lookup_entry(scaler_names, scaler_values, name)
        .ok_or_else(|| ContainerError::MissingScaler(name.to_string()))
}

/// Datasets read so far for one layout attempt. Never escapes this module
/// un-validated.
#[derive(Debug, Default)]
struct PartialExtraction {
    channel_data: Option<(String, NumericArray)>,
    channel_names: Option<Vec<String>>,
    scaler_values: Option<(String, NumericArray)>,
    scaler_names: Option<Vec<String>>,
    x_axis: Option<(String, NumericArray)>,
    y_axis: Option<(String, NumericArray)>,
    energy_axis: Option<(String, NumericArray)>,
    integrated_spectrum: Option<(String, NumericArray)>,
}

impl PartialExtraction {
    fn populate(
        &mut self,
        root: &Group,
        field: RequiredField,
        path: &str,
    ) -> Result<(), ContainerError> {
        let numeric = |root: &Group| read_numeric(root, path).map(|v| Some((path.to_string(), v)));
        match field {
            RequiredField::ChannelData => self.channel_data = numeric(root)?,
            RequiredField::ChannelNames => self.channel_names = Some(read_names(root, path)?),
            RequiredField::ScalerValues => self.scaler_values = numeric(root)?,
            RequiredField::ScalerNames => self.scaler_names = Some(read_names(root, path)?),
            RequiredField::XAxis => self.x_axis = numeric(root)?,
            RequiredField::YAxis => self.y_axis = numeric(root)?,
            RequiredField::EnergyAxis => self.energy_axis = numeric(root)?,
            RequiredField::IntegratedSpectrum => self.integrated_spectrum = numeric(root)?,
        }
        Ok(())
    }

    fn is_populated(&self, field: RequiredField) -> bool {
        match field {
            RequiredField::ChannelData => self.channel_data.is_some(),
            RequiredField::ChannelNames => self.channel_names.is_some(),
            RequiredField::ScalerValues => self.scaler_values.is_some(),
            RequiredField::ScalerNames => self.scaler_names.is_some(),
            RequiredField::XAxis => self.x_axis.is_some(),
            RequiredField::YAxis => self.y_axis.is_some(),
            RequiredField::EnergyAxis => self.energy_axis.is_some(),
            RequiredField::IntegratedSpectrum => self.integrated_spectrum.is_some(),
        }
    }

    fn finish(
        self,
        required: &[RequiredField],
        scan_name: String,
        fit_type: &str,
        ion_chambers: &IonChamberNames,
    ) -> Result<ExtractionResult, ContainerError> {
        if let Some(field) = required.iter().find(|f| !self.is_populated(**f)) {
            return Err(ContainerError::MissingField(*field));
        }
        let missing = |field| ContainerError::MissingField(field);
        let (channel_path, channel_data) =
            self.channel_data.ok_or_else(|| missing(RequiredField::ChannelData))?;
        let channel_names = self
            .channel_names
            .ok_or_else(|| missing(RequiredField::ChannelNames))?;
        let (scaler_path, scaler_values) = self
            .scaler_values
            .ok_or_else(|| missing(RequiredField::ScalerValues))?;
        let scaler_names = self
            .scaler_names
            .ok_or_else(|| missing(RequiredField::ScalerNames))?;
        let (x_path, x_axis) = self.x_axis.ok_or_else(|| missing(RequiredField::XAxis))?;
        let (y_path, y_axis) = self.y_axis.ok_or_else(|| missing(RequiredField::YAxis))?;

        require_parallel(&channel_data, &channel_names, &channel_path, 2)?;
        require_parallel(&scaler_values, &scaler_names, &scaler_path, 1)?;
        require_vector(&x_axis, &x_path)?;
        require_vector(&y_axis, &y_path)?;
        if let Some((path, energy)) = &self.energy_axis {
            require_vector(energy, path)?;
        }
        if let Some((path, spectrum)) = &self.integrated_spectrum {
            require_vector(spectrum, path)?;
        }

        let upstream = require_scaler(&scaler_names, &scaler_values, &ion_chambers.upstream)?;
        let downstream = require_scaler(&scaler_names, &scaler_values, &ion_chambers.downstream)?;

        Ok(ExtractionResult {
            scan_name,
            fit_type: fit_type.to_string(),
            channel_data,
            channel_names,
            scaler_values,
            scaler_names,
            x_axis,
            y_axis,
            energy_axis: self.energy_axis.map(|(_, v)| v),
            integrated_spectrum: self.integrated_spectrum.map(|(_, v)| v),
            upstream_ion_chamber: Some(upstream),
            downstream_ion_chamber: Some(downstream),
            positioners: None,
        })
    }
}

/// Reads a single fit type from an analyzed-data container that follows one
/// known [`LayoutDescriptor`].
///
/// Checks run cheapest first: the file exists and opens, the root and
/// analyzed-data groups exist, the fit type is present, every dataset the
/// layout declares exists, and finally the decoded datasets have consistent
/// shapes and contain the required ion chamber scalers. Nothing is returned
/// unless every check passes.
#[derive(Debug, Clone)]
pub struct AnalyzedContainerReader {
    layout: LayoutDescriptor,
    ion_chambers: IonChamberNames,
    diagnostics: Diagnostics,
}

impl AnalyzedContainerReader {
    pub fn new(layout: LayoutDescriptor) -> Self {
        Self {
            layout,
            ion_chambers: IonChamberNames::default(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn with_ion_chambers(mut self, ion_chambers: IonChamberNames) -> Self {
        self.ion_chambers = ion_chambers;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn layout(&self) -> &LayoutDescriptor {
        &self.layout
    }

    pub fn read<P: AsRef<Path>>(
        &self,
        path: P,
        fit_type: &str,
    ) -> Result<ExtractionResult, ContainerError> {
        let path = path.as_ref();
        let handle = open_container(path)?;
        self.diagnostics.debug(
            module_path!(),
            format_args!("Reading {} with layout {}", path.display(), self.layout),
        );
        self.read_from(&handle, scan_name_of(path), fit_type)
    }

    fn read_from(
        &self,
        root: &Group,
        scan_name: String,
        fit_type: &str,
    ) -> Result<ExtractionResult, ContainerError> {
        let layout = &self.layout;
        require_group(root, layout.root_group, layout.name)?;
        require_group(root, layout.analyzed_group, layout.name)?;
        require_fit_type(root, layout.analyzed_group, fit_type)?;

        let paths = layout.required_paths(fit_type);
        require_paths(root, paths.iter().map(|(_, p)| p.as_str()), layout.name)?;

        let mut partial = PartialExtraction::default();
        for (field, path) in paths.iter() {
            partial.populate(root, *field, path)?;
        }
        let required: Vec<RequiredField> = paths.iter().map(|(f, _)| *f).collect();
        partial.finish(&required, scan_name, fit_type, &self.ion_chambers)
    }
}

impl LayoutCandidate for LayoutDescriptor {
    fn name(&self) -> &str {
        self.name
    }

    fn extract(
        &self,
        path: &Path,
        fit_type: &str,
        ion_chambers: &IonChamberNames,
        diagnostics: &Diagnostics,
    ) -> Result<ExtractionResult, ContainerError> {
        AnalyzedContainerReader::new(*self)
            .with_ion_chambers(ion_chambers.clone())
            .with_diagnostics(diagnostics.clone())
            .read(path, fit_type)
    }
}
