use std::fs;
use std::path::Path;

use hdf5::Group;
use indexmap::IndexMap;

use crate::diagnostics::Diagnostics;
use crate::xrf::{scan_name_of, ExtractionResult, FitBatch, FitMaps, IonChamberNames};

use super::datasets::{read_names, read_numeric};
use super::layout::expand;
use super::reader::{
    open_container, require_fit_type, require_group, require_parallel, require_paths,
    require_scaler, require_vector, ContainerError,
};
use super::resolver::LayoutCandidate;

/// The smallest file size, in bytes, that is not rejected by [`SizeGatedLayout`]'s default gate
pub const DEFAULT_MINIMUM_SIZE: u64 = 1000;

/// Reads several fit types from a grouped-scaler container in one pass, but
/// only once the file has grown past a minimum size.
///
/// Containers written while an acquisition is still running can exist on disk
/// before their datasets do. The size gate rejects those before HDF5 is asked
/// to open them. Apart from the gate the checks run in the same order as
/// [`AnalyzedContainerReader`](super::AnalyzedContainerReader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeGatedLayout {
    pub name: &'static str,
    /// Files must be strictly larger than this many bytes
    pub minimum_size: u64,
    pub fit_types: Vec<String>,
    pub root_group: &'static str,
    pub analyzed_group: &'static str,
    pub channel_data: &'static str,
    pub channel_names: &'static str,
    pub scaler_values: &'static str,
    pub scaler_names: &'static str,
    pub x_axis: &'static str,
    pub y_axis: &'static str,
}

impl Default for SizeGatedLayout {
    fn default() -> Self {
        Self {
            name: "fit-batch",
            minimum_size: DEFAULT_MINIMUM_SIZE,
            fit_types: vec!["NNLS".to_string(), "ROI".to_string()],
            root_group: "MAPS",
            analyzed_group: "MAPS/XRF_Analyzed",
            channel_data: "MAPS/XRF_Analyzed/{fit_type}/Counts_Per_Sec",
            channel_names: "MAPS/XRF_Analyzed/{fit_type}/Channel_Names",
            scaler_values: "MAPS/Scalers/Values",
            scaler_names: "MAPS/Scalers/Names",
            x_axis: "MAPS/Scan/x_axis",
            y_axis: "MAPS/Scan/y_axis",
        }
    }
}

impl SizeGatedLayout {
    pub fn with_minimum_size(mut self, minimum_size: u64) -> Self {
        self.minimum_size = minimum_size;
        self
    }

    pub fn with_fit_types<S: Into<String>>(mut self, fit_types: impl IntoIterator<Item = S>) -> Self {
        self.fit_types = fit_types.into_iter().map(|s| s.into()).collect();
        self
    }

    fn check_size(&self, path: &Path) -> Result<(), ContainerError> {
        if !path.exists() {
            return Err(ContainerError::PathNotFound(path.to_path_buf()));
        }
        let size = fs::metadata(path)?.len();
        if size > self.minimum_size {
            Ok(())
        } else {
            Err(ContainerError::FileTooSmall {
                path: path.to_path_buf(),
                size,
                minimum: self.minimum_size,
            })
        }
    }

    /// Read every configured fit type, failing on the first problem.
    pub fn read_batch<P: AsRef<Path>>(&self, path: P) -> Result<FitBatch, ContainerError> {
        self.read_fit_types(path.as_ref(), &self.fit_types)
    }

    /// Read every configured fit type, or log why the file could not be read and
    /// return `None`.
    pub fn load_batch<P: AsRef<Path>>(&self, path: P, diagnostics: &Diagnostics) -> Option<FitBatch> {
        let path = path.as_ref();
        match self.read_batch(path) {
            Ok(batch) => Some(batch),
            Err(e) => {
                diagnostics.soft_miss(
                    module_path!(),
                    format_args!("The XRF h5 file {} could not be loaded: {e}", path.display()),
                );
                None
            }
        }
    }

    fn read_fit_types(&self, path: &Path, fit_types: &[String]) -> Result<FitBatch, ContainerError> {
        self.check_size(path)?;
        let handle = open_container(path)?;
        self.read_from(&handle, scan_name_of(path), fit_types)
    }

    fn read_from(
        &self,
        root: &Group,
        scan_name: String,
        fit_types: &[String],
    ) -> Result<FitBatch, ContainerError> {
        require_group(root, self.root_group, self.name)?;
        require_group(root, self.analyzed_group, self.name)?;
        for fit_type in fit_types {
            require_fit_type(root, self.analyzed_group, fit_type)?;
        }

        let mut paths = vec![
            self.scaler_values.to_string(),
            self.scaler_names.to_string(),
            self.x_axis.to_string(),
            self.y_axis.to_string(),
        ];
        for fit_type in fit_types {
            paths.push(expand(self.channel_data, fit_type));
            paths.push(expand(self.channel_names, fit_type));
        }
        require_paths(root, paths.iter().map(|p| p.as_str()), self.name)?;

        let x_axis = read_numeric(root, self.x_axis)?;
        let y_axis = read_numeric(root, self.y_axis)?;
        require_vector(&x_axis, self.x_axis)?;
        require_vector(&y_axis, self.y_axis)?;

        let scaler_values = read_numeric(root, self.scaler_values)?;
        let scaler_names = read_names(root, self.scaler_names)?;
        require_parallel(&scaler_values, &scaler_names, self.scaler_values, 1)?;

        let mut fits = IndexMap::with_capacity(fit_types.len());
        for fit_type in fit_types {
            let data_path = expand(self.channel_data, fit_type);
            let channel_data = read_numeric(root, &data_path)?;
            let channel_names = read_names(root, &expand(self.channel_names, fit_type))?;
            require_parallel(&channel_data, &channel_names, &data_path, 2)?;
            fits.insert(
                fit_type.clone(),
                FitMaps {
                    channel_data,
                    channel_names,
                    scaler_values: scaler_values.clone(),
                    scaler_names: scaler_names.clone(),
                },
            );
        }

        Ok(FitBatch {
            scan_name,
            x_axis,
            y_axis,
            fits,
        })
    }
}

/// Pull one fit type out of a batch as a complete [`ExtractionResult`]
pub fn extraction_from_batch(
    mut batch: FitBatch,
    fit_type: &str,
    ion_chambers: &IonChamberNames,
) -> Result<ExtractionResult, ContainerError> {
    let available: Vec<String> = batch.fits.keys().cloned().collect();
    let fit = batch
        .fits
        .shift_remove(fit_type)
        .ok_or_else(|| ContainerError::FitTypeNotFound {
            fit_type: fit_type.to_string(),
            available,
        })?;
    let upstream = require_scaler(&fit.scaler_names, &fit.scaler_values, &ion_chambers.upstream)?;
    let downstream =
        require_scaler(&fit.scaler_names, &fit.scaler_values, &ion_chambers.downstream)?;
    Ok(ExtractionResult {
        scan_name: batch.scan_name,
        fit_type: fit_type.to_string(),
        channel_data: fit.channel_data,
        channel_names: fit.channel_names,
        scaler_values: fit.scaler_values,
        scaler_names: fit.scaler_names,
        x_axis: batch.x_axis,
        y_axis: batch.y_axis,
        energy_axis: None,
        integrated_spectrum: None,
        upstream_ion_chamber: Some(upstream),
        downstream_ion_chamber: Some(downstream),
        positioners: None,
    })
}

impl LayoutCandidate for SizeGatedLayout {
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
        let mut fit_types = self.fit_types.clone();
        if !fit_types.iter().any(|t| t == fit_type) {
            fit_types.push(fit_type.to_string());
        }
        // Only the requested fit type is the caller's problem, any other absent one
        // means this is not a batch container.
        let batch = self
            .read_fit_types(path, &fit_types)
            .map_err(|e| match e {
                ContainerError::FitTypeNotFound {
                    fit_type: missing, ..
                } if missing != fit_type => ContainerError::SchemaMismatch {
                    layout: self.name.to_string(),
                    path: format!("{}/{}", self.analyzed_group, missing),
                },
                other => other,
            })?;
        diagnostics.debug(
            module_path!(),
            format_args!(
                "Read {} fit types from {}",
                batch.fits.len(),
                path.display()
            ),
        );
        extraction_from_batch(batch, fit_type, ion_chambers)
    }
}
