use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::xrf::{ExtractionResult, IonChamberNames};

use super::batch::SizeGatedLayout;
use super::layout::{LayoutDescriptor, DEFAULT_LAYOUTS};
use super::reader::ContainerError;

/// A way of reading a container that the [`SchemaResolver`] can try.
///
/// Implementations must open the file themselves on every call and must not
/// keep state between calls.
pub trait LayoutCandidate: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn extract(
        &self,
        path: &Path,
        fit_type: &str,
        ion_chambers: &IonChamberNames,
        diagnostics: &Diagnostics,
    ) -> Result<ExtractionResult, ContainerError>;
}

/// Why one candidate layout was rejected
#[derive(Debug)]
pub struct LayoutFailure {
    pub index: usize,
    pub layout: String,
    pub error: ContainerError,
}

impl fmt::Display for LayoutFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.index, self.layout, self.error)
    }
}

fn describe_failures(failures: &[LayoutFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("File not found: {}", .0.display())]
    PathNotFound(PathBuf),
    #[error("No candidate layouts were provided")]
    NoCandidates,
    #[error("No valid layout found for file {}: {}", .path.display(), describe_failures(.failures))]
    NoMatchingLayout {
        path: PathBuf,
        failures: Vec<LayoutFailure>,
    },
    #[error("Candidate {index} ({layout}) failed in a way no other layout can fix: {source}")]
    Fatal {
        index: usize,
        layout: String,
        source: ContainerError,
    },
}

impl From<ResolveError> for std::io::Error {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::PathNotFound(_) => Self::new(std::io::ErrorKind::NotFound, value),
            _ => Self::new(std::io::ErrorKind::InvalidData, value),
        }
    }
}

/// Tries an ordered list of candidate layouts against a container until one
/// of them reads it completely.
///
/// Candidates are tried in the order given. A candidate that rejects the file
/// because its datasets are not where the layout expects them is recorded and
/// the next one is tried. Any other failure, like a fit type the file does not
/// contain, stops the search immediately.
#[derive(Debug)]
pub struct SchemaResolver {
    candidates: Vec<Box<dyn LayoutCandidate>>,
    ion_chambers: IonChamberNames,
    diagnostics: Diagnostics,
}

impl Default for SchemaResolver {
    /// The built-in [`DEFAULT_LAYOUTS`] followed by the size-gated batch layout
    fn default() -> Self {
        Self::from_layouts(DEFAULT_LAYOUTS).with_candidate(SizeGatedLayout::default())
    }
}

impl SchemaResolver {
    pub fn new(candidates: Vec<Box<dyn LayoutCandidate>>) -> Self {
        Self {
            candidates,
            ion_chambers: IonChamberNames::default(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn from_layouts(layouts: &[LayoutDescriptor]) -> Self {
        Self::new(
            layouts
                .iter()
                .map(|layout| Box::new(*layout) as Box<dyn LayoutCandidate>)
                .collect(),
        )
    }

    /// Append a candidate, tried after every candidate already present
    pub fn with_candidate<L: LayoutCandidate + 'static>(mut self, candidate: L) -> Self {
        self.candidates.push(Box::new(candidate));
        self
    }

    pub fn with_ion_chambers(mut self, ion_chambers: IonChamberNames) -> Self {
        self.ion_chambers = ion_chambers;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn candidates(&self) -> impl Iterator<Item = &dyn LayoutCandidate> {
        self.candidates.iter().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn resolve<P: AsRef<Path>>(
        &self,
        path: P,
        fit_type: &str,
    ) -> Result<ExtractionResult, ResolveError> {
        let path = path.as_ref();
        if self.candidates.is_empty() {
            return Err(ResolveError::NoCandidates);
        }
        if !path.exists() {
            return Err(ResolveError::PathNotFound(path.to_path_buf()));
        }

        let mut failures = Vec::new();
        for (index, candidate) in self.candidates.iter().enumerate() {
            match candidate.extract(path, fit_type, &self.ion_chambers, &self.diagnostics) {
                Ok(result) => {
                    self.diagnostics.debug(
                        module_path!(),
                        format_args!(
                            "Loaded XRF data from {} with {} layout",
                            path.display(),
                            candidate.name()
                        ),
                    );
                    return Ok(result);
                }
                Err(error) if error.is_layout_mismatch() => {
                    self.diagnostics.warn(
                        module_path!(),
                        format_args!(
                            "Failed to load XRF data from {} with {} layout: {error}",
                            path.display(),
                            candidate.name()
                        ),
                    );
                    failures.push(LayoutFailure {
                        index,
                        layout: candidate.name().to_string(),
                        error,
                    });
                }
                Err(error) => {
                    return Err(ResolveError::Fatal {
                        index,
                        layout: candidate.name().to_string(),
                        source: error,
                    })
                }
            }
        }
        Err(ResolveError::NoMatchingLayout {
            path: path.to_path_buf(),
            failures,
        })
    }
}

/// Read `fit_type` from `path` with the first of `layouts` that matches the file.
pub fn resolve<P: AsRef<Path>>(
    path: P,
    layouts: &[LayoutDescriptor],
    fit_type: &str,
) -> Result<ExtractionResult, ResolveError> {
    SchemaResolver::from_layouts(layouts).resolve(path, fit_type)
}

/// Read `fit_type` from `path` using every built-in layout.
pub fn load_xrf<P: AsRef<Path>>(path: P, fit_type: &str) -> Result<ExtractionResult, ResolveError> {
    SchemaResolver::default().resolve(path, fit_type)
}
