//! Typed access to individual HDF5 objects inside a MAPS container.
use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Dataset, Group};

use crate::array::{ArrayDataType, NumericArray};

use super::reader::ContainerError;

/// Longest fixed-width name the decoder keeps; longer names are truncated by HDF5.
const MAX_NAME_WIDTH: usize = 256;

/// Check that every component of a `/`-separated path exists under `root`.
///
/// `link_exists` on a nested path fails on some HDF5 versions when an
/// intermediate group is missing, so components are checked one prefix at a time.
pub(crate) fn path_exists(root: &Group, path: &str) -> bool {
    let mut prefix = String::with_capacity(path.len());
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(component);
        if !root.link_exists(&prefix) {
            return false;
        }
    }
    !prefix.is_empty()
}

pub(crate) fn open_dataset(root: &Group, path: &str) -> Result<Dataset, ContainerError> {
    root.dataset(path).map_err(|source| ContainerError::DatasetRead {
        dataset: path.to_string(),
        source,
    })
}

fn descriptor_of(dataset: &Dataset, path: &str) -> Result<TypeDescriptor, ContainerError> {
    dataset
        .dtype()
        .and_then(|dtype| dtype.to_descriptor())
        .map_err(|source| ContainerError::DatasetRead {
            dataset: path.to_string(),
            source,
        })
}

/// Read a numeric dataset in full, keeping its stored element type.
pub(crate) fn read_numeric(root: &Group, path: &str) -> Result<NumericArray, ContainerError> {
    let dataset = open_dataset(root, path)?;
    let descriptor = descriptor_of(&dataset, path)?;
    let wrap = |source: hdf5::Error| ContainerError::DatasetRead {
        dataset: path.to_string(),
        source,
    };
    let array = match ArrayDataType::from(&descriptor) {
        ArrayDataType::Float64 => dataset.read_dyn::<f64>().map_err(wrap)?.into(),
        ArrayDataType::Float32 => dataset.read_dyn::<f32>().map_err(wrap)?.into(),
        ArrayDataType::Int64 => dataset.read_dyn::<i64>().map_err(wrap)?.into(),
        ArrayDataType::Int32 => dataset.read_dyn::<i32>().map_err(wrap)?.into(),
        ArrayDataType::UInt64 => dataset.read_dyn::<u64>().map_err(wrap)?.into(),
        ArrayDataType::UInt32 => dataset.read_dyn::<u32>().map_err(wrap)?.into(),
        ArrayDataType::Int16 => dataset.read_dyn::<i16>().map_err(wrap)?.into(),
        ArrayDataType::UInt16 => dataset.read_dyn::<u16>().map_err(wrap)?.into(),
        ArrayDataType::Int8 => dataset.read_dyn::<i8>().map_err(wrap)?.into(),
        ArrayDataType::UInt8 => dataset.read_dyn::<u8>().map_err(wrap)?.into(),
        ArrayDataType::Unknown => {
            return Err(ContainerError::UnsupportedDataType {
                dataset: path.to_string(),
                dtype: format!("{descriptor:?}"),
            })
        }
    };
    Ok(array)
}

/// Decode stored name bytes in order, dropping trailing NUL and space padding.
///
/// String datatypes in HDF5 do not guarantee valid UTF-8 content, so every
/// entry is checked before it becomes text.
pub(crate) fn decode_names<'a>(
    entries: impl IntoIterator<Item = &'a [u8]>,
    path: &str,
) -> Result<Vec<String>, ContainerError> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            std::str::from_utf8(raw)
                .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
                .map_err(|_| ContainerError::InvalidName {
                    dataset: path.to_string(),
                    index,
                })
        })
        .collect()
}

/// Read a one-dimensional string dataset and decode every entry to owned text,
/// in stored order.
pub(crate) fn read_names(root: &Group, path: &str) -> Result<Vec<String>, ContainerError> {
    let dataset = open_dataset(root, path)?;
    let descriptor = descriptor_of(&dataset, path)?;
    let wrap = |source: hdf5::Error| ContainerError::DatasetRead {
        dataset: path.to_string(),
        source,
    };
    if dataset.ndim() != 1 {
        return Err(ContainerError::InvalidShape {
            dataset: path.to_string(),
            reason: format!("expected a 1-D name list, found shape {:?}", dataset.shape()),
        });
    }
    match descriptor {
        TypeDescriptor::FixedAscii(_) => {
            let raw = dataset
                .read_raw::<FixedAscii<MAX_NAME_WIDTH>>()
                .map_err(wrap)?;
            decode_names(raw.iter().map(|s| s.as_bytes()), path)
        }
        TypeDescriptor::FixedUnicode(_) => {
            let raw = dataset
                .read_raw::<FixedUnicode<MAX_NAME_WIDTH>>()
                .map_err(wrap)?;
            decode_names(raw.iter().map(|s| s.as_bytes()), path)
        }
        TypeDescriptor::VarLenAscii => {
            let raw = dataset.read_raw::<VarLenAscii>().map_err(wrap)?;
            decode_names(raw.iter().map(|s| s.as_bytes()), path)
        }
        TypeDescriptor::VarLenUnicode => {
            let raw = dataset.read_raw::<VarLenUnicode>().map_err(wrap)?;
            decode_names(raw.iter().map(|s| s.as_bytes()), path)
        }
        other => Err(ContainerError::UnsupportedDataType {
            dataset: path.to_string(),
            dtype: format!("{other:?}"),
        }),
    }
}

/// List the members of the group at `path`, in the order HDF5 reports them.
pub(crate) fn member_names(root: &Group, path: &str) -> Result<Vec<String>, ContainerError> {
    root.group(path)
        .and_then(|group| group.member_names())
        .map_err(|source| ContainerError::DatasetRead {
            dataset: path.to_string(),
            source,
        })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_names_trims_padding() -> Result<(), ContainerError> {
        let raw: [&[u8]; 3] = [b"Fe\0\0", b"Cu   ", b"Zn \0 "];
        let names = decode_names(raw, "MAPS/channel_names")?;
        assert_eq!(names, vec!["Fe", "Cu", "Zn"]);
        Ok(())
    }

    #[test]
    fn test_decode_names_rejects_invalid_utf8() {
        let raw: [&[u8]; 2] = [b"Fe", b"\xb5m"];
        let err = decode_names(raw, "MAPS/channel_names").unwrap_err();
        assert!(matches!(
            &err,
            ContainerError::InvalidName { dataset, index: 1 } if dataset == "MAPS/channel_names"
        ));
        assert!(err.is_layout_mismatch());
    }
}
