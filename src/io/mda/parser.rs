use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::{self, prelude::*, BufReader};
use std::path::Path;

use indexmap::IndexMap;
use ndarray::Array2;
use thiserror::Error;

use super::record::{
    ExtraPV, ExtraPVValue, PositionerInfo, ScanChannel, ScanLevel, ScanRecord, Trigger,
};
use super::xdr::XdrReader;

/// The lowest and highest MDA format versions this parser understands
pub const SUPPORTED_VERSIONS: (f32, f32) = (1.0, 2.0);

/// The deepest scan nesting `saveData` writes
pub const MAX_RANK: i32 = 4;

const DBR_STRING: i32 = 0;
const DBR_CTRL_SHORT: i32 = 29;
const DBR_CTRL_FLOAT: i32 = 30;
const DBR_CTRL_CHAR: i32 = 32;
const DBR_CTRL_LONG: i32 = 33;
const DBR_CTRL_DOUBLE: i32 = 34;

#[derive(Debug, Error)]
pub enum MDAError {
    #[error("An I/O error occurred while reading the scan file: {0}")]
    IOError(#[from] io::Error),
    #[error("Unsupported MDA version {0}")]
    UnsupportedVersion(f32),
    #[error("Malformed scan file: {0}")]
    InvalidStructure(String),
    #[error("Offset {offset} lies outside the {length} byte scan file")]
    InvalidOffset { offset: i64, length: u64 },
    #[error("Extra PV {name} has unknown type {dtype}")]
    UnknownExtraPVType { name: String, dtype: i32 },
}

impl From<MDAError> for io::Error {
    fn from(value: MDAError) -> Self {
        match value {
            MDAError::IOError(e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// One scan block as written, before scans at the same depth are merged
struct RawScan {
    rank: i32,
    npts: usize,
    curr_pt: usize,
    lower_offsets: Vec<i32>,
    name: String,
    time: String,
    positioners: Vec<(i32, String, String, String, PositionerInfo)>,
    detectors: Vec<(i32, String, String, String)>,
    triggers: Vec<Trigger>,
    positioner_data: Vec<Vec<f64>>,
    detector_data: Vec<Vec<f64>>,
}

fn positioner_field(number: i32) -> String {
    format!("P{}", number + 1)
}

fn detector_field(number: i32) -> String {
    format!("D{:02}", number + 1)
}

fn trigger_field(number: i32) -> String {
    format!("T{}", number + 1)
}

struct MDAParser<R: Read + Seek> {
    xdr: XdrReader<R>,
}

impl<R: Read + Seek> MDAParser<R> {
    fn read_scan(&mut self) -> Result<RawScan, MDAError> {
        let rank = self.xdr.read_i32()?;
        if !(1..=MAX_RANK).contains(&rank) {
            return Err(MDAError::InvalidStructure(format!("scan rank {rank}")));
        }
        let npts = self.xdr.read_count("point", 4)?;
        let curr_pt = self.xdr.read_count("completed point", 0)?;
        if curr_pt > npts {
            return Err(MDAError::InvalidStructure(format!(
                "{curr_pt} completed points of a {npts} point scan"
            )));
        }
        let lower_offsets = if rank > 1 {
            self.xdr.read_i32_array(npts)?
        } else {
            Vec::new()
        };
        let name = self.xdr.read_counted_string()?;
        let time = self.xdr.read_counted_string()?;
        let np = self.xdr.read_count("positioner", 4)?;
        let nd = self.xdr.read_count("detector", 4)?;
        let nt = self.xdr.read_count("trigger", 4)?;

        let mut positioners = Vec::with_capacity(np);
        for _ in 0..np {
            let number = self.xdr.read_i32()?;
            let name = self.xdr.read_counted_string()?;
            let description = self.xdr.read_counted_string()?;
            let step_mode = self.xdr.read_counted_string()?;
            let unit = self.xdr.read_counted_string()?;
            let info = PositionerInfo {
                step_mode,
                readback_name: self.xdr.read_counted_string()?,
                readback_description: self.xdr.read_counted_string()?,
                readback_unit: self.xdr.read_counted_string()?,
            };
            positioners.push((number, name, description, unit, info));
        }

        let mut triggers = Vec::with_capacity(nt);
        for _ in 0..nt {
            let number = self.xdr.read_i32()?;
            let name = self.xdr.read_counted_string()?;
            let command = self.xdr.read_f32()?;
            triggers.push(Trigger {
                number,
                field: trigger_field(number),
                name,
                command,
            });
        }

        let mut detectors = Vec::with_capacity(nd);
        for _ in 0..nd {
            let number = self.xdr.read_i32()?;
            let name = self.xdr.read_counted_string()?;
            let description = self.xdr.read_counted_string()?;
            let unit = self.xdr.read_counted_string()?;
            detectors.push((number, name, description, unit));
        }

        let samples = (np as u64 * 8 + nd as u64 * 4).saturating_mul(npts as u64);
        self.xdr.require(samples, "scan data")?;
        let positioner_data = (0..np)
            .map(|_| self.xdr.read_f64_array(npts))
            .collect::<Result<Vec<_>, _>>()?;
        let detector_data = (0..nd)
            .map(|_| self.xdr.read_f32_array_as_f64(npts))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RawScan {
            rank,
            npts,
            curr_pt,
            lower_offsets,
            name,
            time,
            positioners,
            detectors,
            triggers,
            positioner_data,
            detector_data,
        })
    }

    fn read_extra_pvs(&mut self, offset: i32) -> Result<IndexMap<String, ExtraPV>, MDAError> {
        self.xdr.seek_to(offset as i64)?;
        let count = self.xdr.read_count("extra PV", 12)?;
        let mut pvs = IndexMap::with_capacity(count);
        for _ in 0..count {
            let name = self.xdr.read_counted_string()?;
            let description = self.xdr.read_counted_string()?;
            let dtype = self.xdr.read_i32()?;
            let (unit, value) = if dtype == DBR_STRING {
                (None, ExtraPVValue::Text(self.xdr.read_counted_string()?))
            } else {
                let n = self.xdr.read_count("extra PV value", 1)?;
                let unit = self.xdr.read_counted_string()?;
                let value = match dtype {
                    DBR_CTRL_CHAR => ExtraPVValue::Bytes(self.xdr.read_opaque(n)?),
                    DBR_CTRL_SHORT | DBR_CTRL_LONG => {
                        self.xdr.require(n as u64 * 4, "extra PV value")?;
                        ExtraPVValue::Int(self.xdr.read_i32_array(n)?)
                    }
                    DBR_CTRL_FLOAT => {
                        self.xdr.require(n as u64 * 4, "extra PV value")?;
                        ExtraPVValue::Float(self.xdr.read_f32_array(n)?)
                    }
                    DBR_CTRL_DOUBLE => {
                        self.xdr.require(n as u64 * 8, "extra PV value")?;
                        ExtraPVValue::Double(self.xdr.read_f64_array(n)?)
                    }
                    _ => return Err(MDAError::UnknownExtraPVType { name, dtype }),
                };
                (Some(unit), value)
            };
            pvs.insert(
                name.clone(),
                ExtraPV {
                    name,
                    description,
                    unit,
                    value,
                },
            );
        }
        Ok(pvs)
    }

    fn parse(&mut self) -> Result<ScanRecord, MDAError> {
        let version = self.xdr.read_f32()?;
        if !(SUPPORTED_VERSIONS.0..=SUPPORTED_VERSIONS.1).contains(&version) {
            return Err(MDAError::UnsupportedVersion(version));
        }
        let scan_number = self.xdr.read_i32()?;
        let rank = self.xdr.read_i32()?;
        if !(1..=MAX_RANK).contains(&rank) {
            return Err(MDAError::InvalidStructure(format!("file rank {rank}")));
        }
        let dimensions = self.xdr.read_i32_array(rank as usize)?;
        let is_regular = self.xdr.read_i32()? != 0;
        let extra_pvs_offset = self.xdr.read_i32()?;

        let main_offset = self.xdr.position()?;
        let main = self.read_scan()?;
        if main.rank != rank {
            return Err(MDAError::InvalidStructure(format!(
                "main scan rank {} differs from file rank {rank}",
                main.rank
            )));
        }

        // Each scan block belongs to exactly one parent point
        let mut visited: HashSet<u64> = HashSet::from([main_offset]);
        let mut depths: Vec<Vec<RawScan>> = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back((0usize, main));
        while let Some((depth, scan)) = queue.pop_front() {
            for offset in scan.lower_offsets.iter().take(scan.curr_pt) {
                if *offset == 0 {
                    continue;
                }
                self.xdr.seek_to(*offset as i64)?;
                if !visited.insert(*offset as u64) {
                    return Err(MDAError::InvalidStructure(format!(
                        "scan block at offset {offset} is referenced more than once"
                    )));
                }
                let lower = self.read_scan()?;
                if lower.rank != scan.rank - 1 {
                    return Err(MDAError::InvalidStructure(format!(
                        "scan of rank {} nested in a scan of rank {}",
                        lower.rank, scan.rank
                    )));
                }
                queue.push_back((depth + 1, lower));
            }
            if depths.len() <= depth {
                depths.push(Vec::new());
            }
            depths[depth].push(scan);
        }

        let levels = depths
            .into_iter()
            .map(merge_level)
            .collect::<Result<Vec<_>, _>>()?;

        let extra_pvs = if extra_pvs_offset != 0 {
            self.read_extra_pvs(extra_pvs_offset)?
        } else {
            IndexMap::new()
        };

        Ok(ScanRecord {
            version,
            scan_number,
            rank,
            dimensions,
            is_regular,
            levels,
            extra_pvs,
        })
    }
}

fn stack_rows(rows: Vec<&Vec<f64>>, npts: usize) -> Result<Array2<f64>, MDAError> {
    let n = rows.len();
    let flat: Vec<f64> = rows.into_iter().flatten().copied().collect();
    Array2::from_shape_vec((n, npts), flat)
        .map_err(|e| MDAError::InvalidStructure(format!("ragged scan level: {e}")))
}

/// Merge every scan recorded at one depth into a single level, one row per scan
fn merge_level(scans: Vec<RawScan>) -> Result<ScanLevel, MDAError> {
    let first = scans
        .first()
        .ok_or_else(|| MDAError::InvalidStructure("empty scan level".to_string()))?;
    let npts = first.npts;
    let np = first.positioners.len();
    let nd = first.detectors.len();
    if let Some(odd) = scans
        .iter()
        .find(|s| s.npts != npts || s.positioners.len() != np || s.detectors.len() != nd)
    {
        return Err(MDAError::InvalidStructure(format!(
            "scan {} does not match the other scans at its depth",
            odd.name
        )));
    }

    let mut positioners = Vec::with_capacity(np);
    for (i, (number, name, description, unit, info)) in first.positioners.iter().enumerate() {
        positioners.push(ScanChannel {
            number: *number,
            field: positioner_field(*number),
            name: name.clone(),
            description: description.clone(),
            unit: unit.clone(),
            positioner: Some(info.clone()),
            data: stack_rows(scans.iter().map(|s| &s.positioner_data[i]).collect(), npts)?,
        });
    }

    let mut detectors = Vec::with_capacity(nd);
    for (i, (number, name, description, unit)) in first.detectors.iter().enumerate() {
        detectors.push(ScanChannel {
            number: *number,
            field: detector_field(*number),
            name: name.clone(),
            description: description.clone(),
            unit: unit.clone(),
            positioner: None,
            data: stack_rows(scans.iter().map(|s| &s.detector_data[i]).collect(), npts)?,
        });
    }

    Ok(ScanLevel {
        rank: first.rank,
        npts,
        curr_pt: first.curr_pt,
        name: first.name.clone(),
        time: first.time.clone(),
        positioners,
        detectors,
        triggers: first.triggers.clone(),
    })
}

/// Parse a complete MDA file from `stream`
pub fn read_scan_file<R: Read + Seek>(stream: R) -> Result<ScanRecord, MDAError> {
    let mut parser = MDAParser {
        xdr: XdrReader::new(stream)?,
    };
    if parser.xdr.len() == 0 {
        return Err(MDAError::InvalidStructure("empty file".to_string()));
    }
    parser.parse()
}

impl ScanRecord {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, MDAError> {
        let handle = fs::File::open(path.as_ref())?;
        read_scan_file(BufReader::new(handle))
    }
}
