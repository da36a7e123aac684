//! Writers for the small synthetic files the unit tests read.
use std::fs;
use std::io;
use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};
use hdf5::types::{FixedAscii, FixedUnicode, VarLenAscii, VarLenUnicode};
use ndarray::{Array1, Array3};

const N_ROWS: usize = 4;
const N_COLS: usize = 5;
const N_CHANNELS: usize = 3;
const N_ENERGY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalerLayout {
    Flat,
    Grouped,
}

/// How [`MapsFixture`] stores its channel names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NameEncoding {
    FixedAscii,
    /// Fixed-width ASCII with each name followed by spaces
    SpacePadded,
    FixedUnicode,
    VarLenAscii,
    VarLenUnicode,
    /// Fixed-width ASCII holding a `0xB5` byte after each name, as NumPy `S` arrays allow
    Latin1,
}

/// An analyzed-data container with three channel maps of `4 x 5` pixels per fit type.
///
/// Channel data for the `i`th fit type holds `(i + 1) * (c * 100 + y * 10 + x)`,
/// so fit types are always distinguishable.
#[derive(Debug, Clone)]
pub(crate) struct MapsFixture {
    layout: ScalerLayout,
    fit_types: Vec<String>,
    channel_names: Vec<String>,
    scaler_names: Vec<String>,
    name_encoding: NameEncoding,
    spectra: bool,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn fixed_names(names: &[String]) -> hdf5::Result<Vec<FixedAscii<24>>> {
    names
        .iter()
        .map(|n| FixedAscii::<24>::from_ascii(n).map_err(|e| hdf5::Error::from(e.to_string())))
        .collect()
}

fn parsed_names<T>(names: &[String]) -> hdf5::Result<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    names
        .iter()
        .map(|n| n.parse::<T>().map_err(|e| hdf5::Error::from(e.to_string())))
        .collect()
}

fn write_names(
    group: &hdf5::Group,
    dataset: &str,
    names: &[String],
    encoding: NameEncoding,
) -> hdf5::Result<()> {
    let builder = group.new_dataset_builder();
    match encoding {
        NameEncoding::FixedAscii => {
            builder.with_data(fixed_names(names)?.as_slice()).create(dataset)?;
        }
        NameEncoding::SpacePadded => {
            let padded: Vec<String> = names.iter().map(|n| format!("{n:<12}")).collect();
            builder.with_data(fixed_names(&padded)?.as_slice()).create(dataset)?;
        }
        NameEncoding::FixedUnicode => {
            let values = parsed_names::<FixedUnicode<24>>(names)?;
            builder.with_data(values.as_slice()).create(dataset)?;
        }
        NameEncoding::VarLenAscii => {
            let values: Vec<VarLenAscii> = names
                .iter()
                .map(|n| VarLenAscii::from_ascii(n).map_err(|e| hdf5::Error::from(e.to_string())))
                .collect::<hdf5::Result<_>>()?;
            builder.with_data(values.as_slice()).create(dataset)?;
        }
        NameEncoding::VarLenUnicode => {
            let values = parsed_names::<VarLenUnicode>(names)?;
            builder.with_data(values.as_slice()).create(dataset)?;
        }
        NameEncoding::Latin1 => {
            let values: Vec<FixedAscii<24>> = names
                .iter()
                .map(|n| {
                    let mut bytes = n.as_bytes().to_vec();
                    bytes.push(0xB5);
                    // Deliberately not ASCII, HDF5 stores the bytes unchecked
                    unsafe { FixedAscii::<24>::from_ascii_unchecked(&bytes) }
                })
                .collect();
            builder.with_data(values.as_slice()).create(dataset)?;
        }
    }
    Ok(())
}

impl MapsFixture {
    fn new(layout: ScalerLayout, fit_types: &[&str]) -> Self {
        Self {
            layout,
            fit_types: owned(fit_types),
            channel_names: owned(&["Fe", "Cu", "Zn"]),
            scaler_names: owned(&["US_IC", "DS_IC", "SRcurrent"]),
            name_encoding: NameEncoding::FixedAscii,
            spectra: layout == ScalerLayout::Flat,
        }
    }

    /// `MAPS/scalers`, `MAPS/scaler_names`, `MAPS/x_axis`, ... with spectra
    pub(crate) fn flat(fit_types: &[&str]) -> Self {
        Self::new(ScalerLayout::Flat, fit_types)
    }

    /// `MAPS/Scalers/Values`, `MAPS/Scan/x_axis`, ... without spectra
    pub(crate) fn grouped(fit_types: &[&str]) -> Self {
        Self::new(ScalerLayout::Grouped, fit_types)
    }

    /// Rename the scalers. The scaler array always has one entry per name.
    pub(crate) fn with_scaler_names(mut self, names: &[&str]) -> Self {
        self.scaler_names = owned(names);
        self
    }

    /// Rename the channels. The channel array keeps its three entries.
    pub(crate) fn with_channel_names(mut self, names: &[&str]) -> Self {
        self.channel_names = owned(names);
        self
    }

    /// Store the channel names with `encoding` instead of 24 byte ASCII
    pub(crate) fn with_name_encoding(mut self, encoding: NameEncoding) -> Self {
        self.name_encoding = encoding;
        self
    }

    pub(crate) fn without_spectra(mut self) -> Self {
        self.spectra = false;
        self
    }

    pub(crate) fn write(&self, path: &Path) -> hdf5::Result<()> {
        let file = hdf5::File::create(path)?;
        let maps = file.create_group("MAPS")?;

        let x_axis = Array1::from_shape_fn(N_COLS, |i| 10.0 + i as f64 * 0.5);
        let y_axis = Array1::from_shape_fn(N_ROWS, |i| -2.0 + i as f64 * 0.25);
        let scalers = Array3::from_shape_fn(
            (self.scaler_names.len(), N_ROWS, N_COLS),
            |(s, y, x)| (s * 100 + y * 10 + x) as f64,
        );
        let scaler_names = fixed_names(&self.scaler_names)?;

        match self.layout {
            ScalerLayout::Flat => {
                maps.new_dataset_builder().with_data(&scalers).create("scalers")?;
                maps.new_dataset_builder()
                    .with_data(scaler_names.as_slice())
                    .create("scaler_names")?;
                maps.new_dataset_builder().with_data(&x_axis).create("x_axis")?;
                maps.new_dataset_builder().with_data(&y_axis).create("y_axis")?;
            }
            ScalerLayout::Grouped => {
                let group = maps.create_group("Scalers")?;
                group.new_dataset_builder().with_data(&scalers).create("Values")?;
                group.new_dataset_builder()
                    .with_data(scaler_names.as_slice())
                    .create("Names")?;
                let scan = maps.create_group("Scan")?;
                scan.new_dataset_builder().with_data(&x_axis).create("x_axis")?;
                scan.new_dataset_builder().with_data(&y_axis).create("y_axis")?;
            }
        }

        if self.spectra {
            let energy = Array1::from_shape_fn(N_ENERGY, |i| i as f64 * 0.01);
            let int_spec = Array1::from_shape_fn(N_ENERGY, |i| (i * i) as f32);
            maps.new_dataset_builder().with_data(&energy).create("energy")?;
            maps.new_dataset_builder().with_data(&int_spec).create("int_spec")?;
        }

        let analyzed = maps.create_group("XRF_Analyzed")?;
        for (i, fit_type) in self.fit_types.iter().enumerate() {
            let scale = (i + 1) as f32;
            let counts = Array3::from_shape_fn((N_CHANNELS, N_ROWS, N_COLS), |(c, y, x)| {
                (c * 100 + y * 10 + x) as f32 * scale
            });
            let group = analyzed.create_group(fit_type)?;
            group.new_dataset_builder()
                .with_data(&counts)
                .create("Counts_Per_Sec")?;
            write_names(&group, "Channel_Names", &self.channel_names, self.name_encoding)?;
        }
        file.flush()?;
        Ok(())
    }
}

/// A two dimensional MDA scan of `3` outer points by `4` inner points.
///
/// Sample values follow fixed formulas so tests can predict them:
/// - outer positioner `p`, point `j`: `p * 10 + j * 0.5`
/// - outer detector `d`, point `j`: `(d + 1) * 100 + j`
/// - inner positioner `p`, row `r`, point `j`: `p * 10 + j * 0.25`
/// - inner detector `d`, row `r`, point `j`: `(d + 1) * 1000 + r * 10 + j`
#[derive(Debug, Clone)]
pub(crate) struct MdaFixture {
    outer_positioners: Vec<String>,
    outer_detectors: Vec<String>,
    inner_positioners: Vec<String>,
    inner_detectors: Vec<String>,
    two_dimensional: bool,
    shared_inner_scan: bool,
}

pub(crate) const MDA_OUTER_POINTS: usize = 3;
pub(crate) const MDA_INNER_POINTS: usize = 4;

impl Default for MdaFixture {
    fn default() -> Self {
        Self {
            outer_positioners: owned(&["2xfm:m12.VAL"]),
            outer_detectors: owned(&["2xfm:mca1.R3", "Det1_R16_elementX", "9idbTAU:SM:CT:RqsPos"]),
            inner_positioners: owned(&["2xfm:m24.VAL"]),
            inner_detectors: owned(&["2xfm:scaler1_cts1.B", "21:D3:SM:SZ:ActPos"]),
            two_dimensional: true,
            shared_inner_scan: false,
        }
    }
}

struct ScanBlock<'a> {
    rank: i32,
    npts: usize,
    name: &'a str,
    positioners: &'a [String],
    detectors: &'a [String],
    positioner_value: &'a dyn Fn(usize, usize) -> f64,
    detector_value: &'a dyn Fn(usize, usize) -> f64,
}

struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    fn i32(&mut self, value: i32) -> io::Result<()> {
        self.buf.write_i32::<BigEndian>(value)
    }

    fn counted_string(&mut self, value: &str) -> io::Result<()> {
        self.i32(value.len() as i32)?;
        if !value.is_empty() {
            self.buf.write_u32::<BigEndian>(value.len() as u32)?;
            self.opaque(value.as_bytes());
        }
        Ok(())
    }

    fn opaque(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        let pad = (4 - bytes.len() % 4) % 4;
        self.buf.extend(std::iter::repeat(0u8).take(pad));
    }

    fn patch_i32(&mut self, at: usize, value: i32) {
        self.buf[at..at + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Write one scan block, returning the positions of its lower-scan offset slots
    fn scan(&mut self, block: &ScanBlock) -> io::Result<Vec<usize>> {
        self.i32(block.rank)?;
        self.i32(block.npts as i32)?;
        self.i32(block.npts as i32)?;
        let mut slots = Vec::new();
        if block.rank > 1 {
            for _ in 0..block.npts {
                slots.push(self.buf.len());
                self.i32(0)?;
            }
        }
        self.counted_string(block.name)?;
        self.counted_string("Mar 04, 2021 15:02:11.123456789")?;
        self.i32(block.positioners.len() as i32)?;
        self.i32(block.detectors.len() as i32)?;
        self.i32(1)?;
        for (i, name) in block.positioners.iter().enumerate() {
            self.i32(i as i32)?;
            self.counted_string(name)?;
            self.counted_string("stage motor")?;
            self.counted_string("TABLE")?;
            self.counted_string("mm")?;
            self.counted_string(&name.replace(".VAL", ".RBV"))?;
            self.counted_string("")?;
            self.counted_string("mm")?;
        }
        self.i32(0)?;
        self.counted_string("2xfm:scaler1.CNT")?;
        self.buf.write_f32::<BigEndian>(1.0)?;
        for (i, name) in block.detectors.iter().enumerate() {
            self.i32(i as i32)?;
            self.counted_string(name)?;
            self.counted_string("")?;
            self.counted_string("cts")?;
        }
        for p in 0..block.positioners.len() {
            for j in 0..block.npts {
                self.buf.write_f64::<BigEndian>((block.positioner_value)(p, j))?;
            }
        }
        for d in 0..block.detectors.len() {
            for j in 0..block.npts {
                self.buf.write_f32::<BigEndian>((block.detector_value)(d, j) as f32)?;
            }
        }
        Ok(slots)
    }

    fn extra_pvs(&mut self) -> io::Result<()> {
        self.i32(4)?;

        self.counted_string("2xfm:userStringCalc1")?;
        self.counted_string("operator")?;
        self.i32(0)?;
        self.counted_string("beamline staff")?;

        self.counted_string("2xfm:mono:energy")?;
        self.counted_string("Mono energy")?;
        self.i32(34)?;
        self.i32(1)?;
        self.counted_string("keV")?;
        self.buf.write_f64::<BigEndian>(10.1)?;

        self.counted_string("2xfm:scaler1.PR1")?;
        self.counted_string("")?;
        self.i32(33)?;
        self.i32(2)?;
        self.counted_string("")?;
        self.i32(7)?;
        self.i32(-7)?;

        self.counted_string("2xfm:sample_name")?;
        self.counted_string("")?;
        self.i32(32)?;
        self.i32(6)?;
        self.counted_string("")?;
        self.opaque(b"gold\0\0");
        Ok(())
    }
}

impl MdaFixture {
    pub(crate) fn with_outer_positioners(mut self, names: &[&str]) -> Self {
        self.outer_positioners = owned(names);
        self
    }

    pub(crate) fn with_outer_detectors(mut self, names: &[&str]) -> Self {
        self.outer_detectors = owned(names);
        self
    }

    pub(crate) fn with_inner_detectors(mut self, names: &[&str]) -> Self {
        self.inner_detectors = owned(names);
        self
    }

    /// Only write the outer scan
    pub(crate) fn one_dimensional(mut self) -> Self {
        self.two_dimensional = false;
        self
    }

    /// Point every outer point at the first inner scan block instead of its own
    pub(crate) fn with_shared_inner_scan(mut self) -> Self {
        self.shared_inner_scan = true;
        self
    }

    pub(crate) fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = XdrWriter { buf: Vec::new() };
        let rank: i32 = if self.two_dimensional { 2 } else { 1 };

        out.buf.write_f32::<BigEndian>(1.4)?;
        out.i32(123)?;
        out.i32(rank)?;
        out.i32(MDA_OUTER_POINTS as i32)?;
        if self.two_dimensional {
            out.i32(MDA_INNER_POINTS as i32)?;
        }
        out.i32(1)?;
        let extra_slot = out.buf.len();
        out.i32(0)?;

        let outer_positioner = |p: usize, j: usize| p as f64 * 10.0 + j as f64 * 0.5;
        let outer_detector = |d: usize, j: usize| ((d + 1) * 100 + j) as f64;
        let slots = out.scan(&ScanBlock {
            rank,
            npts: MDA_OUTER_POINTS,
            name: "2xfm:scan2",
            positioners: &self.outer_positioners,
            detectors: &self.outer_detectors,
            positioner_value: &outer_positioner,
            detector_value: &outer_detector,
        })?;

        let mut first_inner = None;
        for (row, slot) in slots.into_iter().enumerate() {
            if let (true, Some(shared)) = (self.shared_inner_scan, first_inner) {
                out.patch_i32(slot, shared);
                continue;
            }
            let offset = out.buf.len() as i32;
            if first_inner.is_none() {
                first_inner = Some(offset);
            }
            out.patch_i32(slot, offset);
            let inner_positioner = |p: usize, j: usize| p as f64 * 10.0 + j as f64 * 0.25;
            let inner_detector = move |d: usize, j: usize| ((d + 1) * 1000 + row * 10 + j) as f64;
            out.scan(&ScanBlock {
                rank: 1,
                npts: MDA_INNER_POINTS,
                name: "2xfm:scan1",
                positioners: &self.inner_positioners,
                detectors: &self.inner_detectors,
                positioner_value: &inner_positioner,
                detector_value: &inner_detector,
            })?;
        }

        let offset = out.buf.len() as i32;
        out.patch_i32(extra_slot, offset);
        out.extra_pvs()?;
        Ok(out.buf)
    }

    pub(crate) fn write(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_bytes()?)
    }
}
