//! Numeric arrays that keep the element type they were stored with.
//!
//! Container datasets are read without implicit casting, so a map stored as
//! `f32` stays `f32`. [`NumericArray`] carries that choice through the rest of
//! the crate and only converts when a caller asks for it.
use std::fmt::Display;

use hdf5::types::{FloatSize, IntSize, TypeDescriptor};
use ndarray::{ArrayD, Axis};
use num_traits::AsPrimitive;

/// The element type of a [`NumericArray`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrayDataType {
    #[default]
    Unknown,
    Float64,
    Float32,
    Int64,
    Int32,
    UInt64,
    UInt32,
    Int16,
    UInt16,
    Int8,
    UInt8,
}

impl ArrayDataType {
    pub const fn size_of(&self) -> usize {
        match self {
            ArrayDataType::Unknown => 0,
            ArrayDataType::Float64 | ArrayDataType::Int64 | ArrayDataType::UInt64 => 8,
            ArrayDataType::Float32 | ArrayDataType::Int32 | ArrayDataType::UInt32 => 4,
            ArrayDataType::Int16 | ArrayDataType::UInt16 => 2,
            ArrayDataType::Int8 | ArrayDataType::UInt8 => 1,
        }
    }
}

impl Display for ArrayDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<&TypeDescriptor> for ArrayDataType {
    fn from(value: &TypeDescriptor) -> Self {
        match value {
            TypeDescriptor::Integer(z) => match z {
                IntSize::U1 => ArrayDataType::Int8,
                IntSize::U2 => ArrayDataType::Int16,
                IntSize::U4 => ArrayDataType::Int32,
                IntSize::U8 => ArrayDataType::Int64,
            },
            TypeDescriptor::Unsigned(z) => match z {
                IntSize::U1 => ArrayDataType::UInt8,
                IntSize::U2 => ArrayDataType::UInt16,
                IntSize::U4 => ArrayDataType::UInt32,
                IntSize::U8 => ArrayDataType::UInt64,
            },
            TypeDescriptor::Float(z) => match z {
                FloatSize::U4 => ArrayDataType::Float32,
                FloatSize::U8 => ArrayDataType::Float64,
                #[allow(unreachable_patterns)]
                _ => ArrayDataType::Unknown,
            },
            _ => ArrayDataType::Unknown,
        }
    }
}

/// An n-dimensional numeric array tagged with its on-disk element type.
///
/// The first axis is the "entry" axis: channel index for channel maps, scaler
/// index for scaler maps, sample index for one-dimensional axes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumericArray {
    Float64(ArrayD<f64>),
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
    Int32(ArrayD<i32>),
    UInt64(ArrayD<u64>),
    UInt32(ArrayD<u32>),
    Int16(ArrayD<i16>),
    UInt16(ArrayD<u16>),
    Int8(ArrayD<i8>),
    UInt8(ArrayD<u8>),
}

macro_rules! dispatch {
    ($self:expr, $arr:ident => $body:expr) => {
        match $self {
            NumericArray::Float64($arr) => $body,
            NumericArray::Float32($arr) => $body,
            NumericArray::Int64($arr) => $body,
            NumericArray::Int32($arr) => $body,
            NumericArray::UInt64($arr) => $body,
            NumericArray::UInt32($arr) => $body,
            NumericArray::Int16($arr) => $body,
            NumericArray::UInt16($arr) => $body,
            NumericArray::Int8($arr) => $body,
            NumericArray::UInt8($arr) => $body,
        }
    };
}

macro_rules! map_variant {
    ($self:expr, $arr:ident => $body:expr) => {
        match $self {
            NumericArray::Float64($arr) => NumericArray::Float64($body),
            NumericArray::Float32($arr) => NumericArray::Float32($body),
            NumericArray::Int64($arr) => NumericArray::Int64($body),
            NumericArray::Int32($arr) => NumericArray::Int32($body),
            NumericArray::UInt64($arr) => NumericArray::UInt64($body),
            NumericArray::UInt32($arr) => NumericArray::UInt32($body),
            NumericArray::Int16($arr) => NumericArray::Int16($body),
            NumericArray::UInt16($arr) => NumericArray::UInt16($body),
            NumericArray::Int8($arr) => NumericArray::Int8($body),
            NumericArray::UInt8($arr) => NumericArray::UInt8($body),
        }
    };
}

impl NumericArray {
    pub fn dtype(&self) -> ArrayDataType {
        match self {
            NumericArray::Float64(_) => ArrayDataType::Float64,
            NumericArray::Float32(_) => ArrayDataType::Float32,
            NumericArray::Int64(_) => ArrayDataType::Int64,
            NumericArray::Int32(_) => ArrayDataType::Int32,
            NumericArray::UInt64(_) => ArrayDataType::UInt64,
            NumericArray::UInt32(_) => ArrayDataType::UInt32,
            NumericArray::Int16(_) => ArrayDataType::Int16,
            NumericArray::UInt16(_) => ArrayDataType::UInt16,
            NumericArray::Int8(_) => ArrayDataType::Int8,
            NumericArray::UInt8(_) => ArrayDataType::UInt8,
        }
    }

    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        dispatch!(self, a => a.ndim())
    }

    /// The total number of elements
    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The length of the first axis, or `None` for a zero-dimensional array
    pub fn entries(&self) -> Option<usize> {
        self.shape().first().copied()
    }

    /// Take the sub-array at `index` along the first axis, preserving the element type.
    ///
    /// Returns `None` when the array is zero-dimensional or `index` is out of bounds.
    pub fn entry(&self, index: usize) -> Option<NumericArray> {
        match self.entries() {
            Some(n) if index < n => {
                Some(map_variant!(self, a => a.index_axis(Axis(0), index).to_owned()))
            }
            _ => None,
        }
    }

    /// Copy the array into `f64`, converting each element
    pub fn to_f64(&self) -> ArrayD<f64> {
        match self {
            NumericArray::Float64(a) => a.clone(),
            NumericArray::Float32(a) => convert(a),
            NumericArray::Int64(a) => convert(a),
            NumericArray::Int32(a) => convert(a),
            NumericArray::UInt64(a) => convert(a),
            NumericArray::UInt32(a) => convert(a),
            NumericArray::Int16(a) => convert(a),
            NumericArray::UInt16(a) => convert(a),
            NumericArray::Int8(a) => convert(a),
            NumericArray::UInt8(a) => convert(a),
        }
    }

    /// Read the element at `index` as `f64`, if the index is valid for this array's shape
    pub fn get_f64(&self, index: &[usize]) -> Option<f64> {
        dispatch!(self, a => a.get(index).map(|v| (*v).as_()))
    }
}

fn convert<T: AsPrimitive<f64>>(array: &ArrayD<T>) -> ArrayD<f64> {
    array.mapv(|v| v.as_())
}

macro_rules! impl_from_array {
    ($t:ty, $variant:ident) => {
        impl From<ArrayD<$t>> for NumericArray {
            fn from(value: ArrayD<$t>) -> Self {
                NumericArray::$variant(value)
            }
        }
    };
}

impl_from_array!(f64, Float64);
impl_from_array!(f32, Float32);
impl_from_array!(i64, Int64);
impl_from_array!(i32, Int32);
impl_from_array!(u64, UInt64);
impl_from_array!(u32, UInt32);
impl_from_array!(i16, Int16);
impl_from_array!(u16, UInt16);
impl_from_array!(i8, Int8);
impl_from_array!(u8, UInt8);
