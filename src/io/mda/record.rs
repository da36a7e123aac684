use chrono::NaiveDateTime;
use indexmap::IndexMap;
use ndarray::{Array1, Array2};

/// The format `saveData` writes scan start times in
pub const MDA_TIME_FORMAT: &str = "%b %d, %Y %H:%M:%S%.f";

/// The step mode and readback of a positioner channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionerInfo {
    pub step_mode: String,
    pub readback_name: String,
    pub readback_description: String,
    pub readback_unit: String,
}

/// One positioner or detector of a scan level.
///
/// `data` holds one row per scan recorded at this level, each row `npts` long.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanChannel {
    pub number: i32,
    /// The `saveData` field name, `P1` or `D01`
    pub field: String,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub positioner: Option<PositionerInfo>,
    pub data: Array2<f64>,
}

impl ScanChannel {
    pub fn first_row(&self) -> Option<Array1<f64>> {
        if self.data.nrows() == 0 {
            None
        } else {
            Some(self.data.row(0).to_owned())
        }
    }

    pub fn first_sample(&self) -> Option<f64> {
        self.data.get((0, 0)).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trigger {
    pub number: i32,
    pub field: String,
    pub name: String,
    pub command: f32,
}

/// Every scan recorded at one nesting depth, merged row by row.
///
/// Depth 0 is the outermost scan.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanLevel {
    pub rank: i32,
    pub npts: usize,
    /// The number of points the first scan at this depth completed
    pub curr_pt: usize,
    pub name: String,
    pub time: String,
    pub positioners: Vec<ScanChannel>,
    pub detectors: Vec<ScanChannel>,
    pub triggers: Vec<Trigger>,
}

impl ScanLevel {
    pub fn rows(&self) -> usize {
        self.positioners
            .first()
            .or(self.detectors.first())
            .map(|c| c.data.nrows())
            .unwrap_or_default()
    }

    /// The first detector whose name is exactly `name`
    pub fn detector_named(&self, name: &str) -> Option<&ScanChannel> {
        self.detectors.iter().find(|d| d.name == name)
    }

    /// The first detector whose name contains `token`
    pub fn detector_containing(&self, token: &str) -> Option<&ScanChannel> {
        self.detectors.iter().find(|d| d.name.contains(token))
    }

    pub fn positioner_named(&self, name: &str) -> Option<&ScanChannel> {
        self.positioners.iter().find(|p| p.name == name)
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(self.time.trim(), MDA_TIME_FORMAT).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExtraPVValue {
    Text(String),
    Bytes(Vec<u8>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl ExtraPVValue {
    /// The value as text when it was stored as a string or character array
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Bytes(b) => {
                let end = b.iter().position(|c| *c == 0).unwrap_or(b.len());
                Some(String::from_utf8_lossy(&b[..end]).into_owned())
            }
            _ => None,
        }
    }

    pub fn first_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => v.first().map(|x| *x as f64),
            Self::Float(v) => v.first().map(|x| *x as f64),
            Self::Double(v) => v.first().copied(),
            _ => None,
        }
    }
}

/// A process variable snapshot stored alongside the scan
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtraPV {
    pub name: String,
    pub description: String,
    pub unit: Option<String>,
    pub value: ExtraPVValue,
}

/// A parsed MDA file
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanRecord {
    pub version: f32,
    pub scan_number: i32,
    pub rank: i32,
    pub dimensions: Vec<i32>,
    pub is_regular: bool,
    pub levels: Vec<ScanLevel>,
    pub extra_pvs: IndexMap<String, ExtraPV>,
}

impl ScanRecord {
    pub fn level(&self, depth: usize) -> Option<&ScanLevel> {
        self.levels.get(depth)
    }

    pub fn outer(&self) -> Option<&ScanLevel> {
        self.level(0)
    }

    pub fn inner(&self) -> Option<&ScanLevel> {
        self.level(1)
    }

    pub fn extra_pv(&self, name: &str) -> Option<&ExtraPV> {
        self.extra_pvs.get(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Datelike, Timelike};
    use ndarray::array;

    fn channel(name: &str, data: Array2<f64>) -> ScanChannel {
        ScanChannel {
            number: 0,
            field: "D01".into(),
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            positioner: None,
            data,
        }
    }

    #[test]
    fn test_level_lookup() {
        let level = ScanLevel {
            rank: 1,
            npts: 2,
            curr_pt: 2,
            name: "2xfm:scan1".into(),
            time: "Mar 04, 2021 15:02:11.5".into(),
            positioners: vec![channel("2xfm:m24.VAL", array![[0.5, 0.75]])],
            detectors: vec![
                channel("Det1_R160", array![[1.0, 2.0]]),
                channel("Det1_R16", array![[3.0, 4.0]]),
            ],
            triggers: vec![],
        };
        assert_eq!(level.rows(), 1);
        assert_eq!(level.detector_named("Det1_R16").unwrap().first_sample(), Some(3.0));
        assert_eq!(level.detector_containing("R16").unwrap().name, "Det1_R160");
        assert!(level.detector_named("R16").is_none());
        assert_eq!(
            level.positioner_named("2xfm:m24.VAL").unwrap().first_row().unwrap().to_vec(),
            vec![0.5, 0.75]
        );
        assert!(level.positioner_named("Det1_R16").is_none());

        let ts = level.timestamp().unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2021, 3, 4));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (15, 2, 11));
        assert_eq!(ts.nanosecond(), 500_000_000);
    }

    #[test]
    fn test_extra_pv_values() {
        let bytes = ExtraPVValue::Bytes(b"gold\0\0".to_vec());
        assert_eq!(bytes.as_text().as_deref(), Some("gold"));
        assert_eq!(ExtraPVValue::Int(vec![7, -7]).first_f64(), Some(7.0));
        assert!(ExtraPVValue::Text("a".into()).first_f64().is_none());
    }
}
