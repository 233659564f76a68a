//! Reads the physical data behind a frozen column into an Arrow array.

use std::{ffi::c_void, sync::Arc};

use arrow::array::{
    new_empty_array, Array, ArrayRef, BooleanArray, FixedSizeListArray, Float32Array, Float64Array,
    Int16Array, Int32Array, Int64Array, Int8Array, UInt16Array, UInt32Array, UInt64Array,
    UInt8Array,
};
use hdf5::{
    types::{CompoundField, CompoundType, TypeDescriptor},
    Dataset, Datatype, File, H5Type,
};
use hdf5_sys::{
    h5::hsize_t,
    h5d::{H5Dget_space, H5Dread},
    h5i::hid_t,
    h5p::H5P_DEFAULT,
    h5s::{H5S_seloper_t, H5Sclose, H5Screate_simple, H5Sselect_hyperslab},
};
use ndarray::{IxDyn, SliceInfo, SliceInfoElem};

use crate::{
    data_types::{compound_members, list_item_field, ElementType, PrimitiveType},
    error::ArrowHdf5Error,
    schema::{ColumnLocation, FrozenColumn},
    slice::RowSlice,
    Hdf5Result,
};

macro_rules! read_typed {
    ($read:ident, $primitive:expr, $($args:expr),+) => {{
        match $primitive {
            PrimitiveType::Bool => Arc::new(BooleanArray::from($read::<bool>($($args),+)?)) as ArrayRef,
            PrimitiveType::Int8 => Arc::new(Int8Array::from($read::<i8>($($args),+)?)),
            PrimitiveType::Int16 => Arc::new(Int16Array::from($read::<i16>($($args),+)?)),
            PrimitiveType::Int32 => Arc::new(Int32Array::from($read::<i32>($($args),+)?)),
            PrimitiveType::Int64 => Arc::new(Int64Array::from($read::<i64>($($args),+)?)),
            PrimitiveType::UInt8 => Arc::new(UInt8Array::from($read::<u8>($($args),+)?)),
            PrimitiveType::UInt16 => Arc::new(UInt16Array::from($read::<u16>($($args),+)?)),
            PrimitiveType::UInt32 => Arc::new(UInt32Array::from($read::<u32>($($args),+)?)),
            PrimitiveType::UInt64 => Arc::new(UInt64Array::from($read::<u64>($($args),+)?)),
            PrimitiveType::Float32 => Arc::new(Float32Array::from($read::<f32>($($args),+)?)),
            PrimitiveType::Float64 => Arc::new(Float64Array::from($read::<f64>($($args),+)?)),
        }
    }};
}

/// Reads `slice` rows of `column` from an open file.
pub fn read_column(file: &File, column: &FrozenColumn, slice: &RowSlice) -> Hdf5Result<ArrayRef> {
    let element_type = &column.element_type;
    if slice.is_empty() {
        return Ok(new_empty_array(&element_type.arrow_data_type()));
    }

    let invalid_column = || ArrowHdf5Error::InvalidColumn {
        column: column.name.clone(),
        location: column.location.to_string(),
    };

    let dataset = open_dataset(file, column.location.dataset()).ok_or_else(invalid_column)?;

    tracing::debug!(
        "Reading column {} from {} rows {}..{} step {}",
        column.name,
        column.location,
        slice.start,
        slice.stop,
        slice.step
    );

    let values = match &column.location {
        ColumnLocation::DirectDataset(_) => {
            let selection = row_selection(slice, dataset.ndim())?;
            read_typed!(read_dataset_slice, element_type.primitive, &dataset, &selection)
        }
        ColumnLocation::CompositeField { field, .. } => {
            if !has_compound_field(&dataset, field)? {
                return Err(invalid_column());
            }
            read_typed!(
                read_compound_field,
                element_type.primitive,
                &dataset,
                field,
                element_type,
                slice
            )
        }
    };

    nest_sub_shape(values, &element_type.sub_shape)
}

fn open_dataset(file: &File, path: &str) -> Option<Dataset> {
    if !file.link_exists(path) {
        return None;
    }
    file.dataset(path).ok()
}

fn has_compound_field(dataset: &Dataset, field: &str) -> Hdf5Result<bool> {
    let members = compound_members(&dataset.dtype()?, &dataset.name())?.unwrap_or_default();
    Ok(members
        .iter()
        .any(|(name, element_type)| name == field && element_type.is_some()))
}

/// Selects the strided rows along the leading axis and every trailing axis in full.
fn row_selection(
    slice: &RowSlice,
    ndim: usize,
) -> Hdf5Result<SliceInfo<Vec<SliceInfoElem>, IxDyn, IxDyn>> {
    let mut elems = Vec::with_capacity(ndim.max(1));
    elems.push(SliceInfoElem::Slice {
        start: slice.start as isize,
        end: Some(slice.tight_stop() as isize),
        step: slice.step as isize,
    });
    elems.extend((1..ndim).map(|_| SliceInfoElem::Slice {
        start: 0,
        end: None,
        step: 1,
    }));
    Ok(SliceInfo::try_from(elems)?)
}

fn read_dataset_slice<T: H5Type + Clone>(
    dataset: &Dataset,
    selection: &SliceInfo<Vec<SliceInfoElem>, IxDyn, IxDyn>,
) -> Hdf5Result<Vec<T>> {
    let array = dataset.read_slice::<T, _, IxDyn>(selection.clone())?;
    if array.is_standard_layout() {
        Ok(array.into_raw_vec_and_offset().0)
    } else {
        Ok(array.iter().cloned().collect())
    }
}

/// Releases a dataspace on every exit path. Must be dropped while the library lock is held.
struct DataspaceGuard(hid_t);

impl DataspaceGuard {
    fn new(id: hid_t, path: &str, call: &'static str) -> Hdf5Result<Self> {
        if id < 0 {
            return Err(ArrowHdf5Error::RawRead {
                path: path.to_string(),
                call,
            });
        }
        Ok(Self(id))
    }
}

impl Drop for DataspaceGuard {
    fn drop(&mut self) {
        unsafe {
            H5Sclose(self.0);
        }
    }
}

/// Reads one field of a compound dataset over a strided row range.
///
/// The memory type is a compound holding only `field`, so HDF5 converts each
/// record by field name and skips the remaining members. The raw calls run under
/// the same global lock the `hdf5` crate takes for its own calls.
fn read_compound_field<T: H5Type + Default + Clone>(
    dataset: &Dataset,
    field: &str,
    element_type: &ElementType,
    slice: &RowSlice,
) -> Hdf5Result<Vec<T>> {
    let member = element_type
        .sub_shape
        .iter()
        .rev()
        .fold(T::type_descriptor(), |inner, len| {
            TypeDescriptor::FixedArray(Box::new(inner), *len)
        });
    let member_size = member.size();
    let memory_type = Datatype::from_descriptor(&TypeDescriptor::Compound(CompoundType {
        fields: vec![CompoundField::new(field, member, 0, 0)],
        size: member_size,
    }))?;

    let rows = slice.len();
    let mut values = vec![T::default(); rows * element_type.values_per_row()];
    let path = dataset.name();

    let start = [slice.start as hsize_t];
    let stride = [slice.step as hsize_t];
    let count = [rows as hsize_t];

    hdf5::sync::sync(|| {
        let file_space =
            DataspaceGuard::new(unsafe { H5Dget_space(dataset.id()) }, &path, "H5Dget_space")?;
        let selected = unsafe {
            H5Sselect_hyperslab(
                file_space.0,
                H5S_seloper_t::H5S_SELECT_SET,
                start.as_ptr(),
                stride.as_ptr(),
                count.as_ptr(),
                std::ptr::null(),
            )
        };
        if selected < 0 {
            return Err(ArrowHdf5Error::RawRead {
                path: path.clone(),
                call: "H5Sselect_hyperslab",
            });
        }

        let memory_space = DataspaceGuard::new(
            unsafe { H5Screate_simple(1, count.as_ptr(), std::ptr::null()) },
            &path,
            "H5Screate_simple",
        )?;

        let status = unsafe {
            H5Dread(
                dataset.id(),
                memory_type.id(),
                memory_space.0,
                file_space.0,
                H5P_DEFAULT,
                values.as_mut_ptr() as *mut c_void,
            )
        };
        if status < 0 {
            return Err(ArrowHdf5Error::RawRead {
                path: path.clone(),
                call: "H5Dread",
            });
        }
        Ok(())
    })?;

    Ok(values)
}

/// Wraps flat values into nested fixed-size lists, innermost dimension first.
fn nest_sub_shape(values: ArrayRef, sub_shape: &[usize]) -> Hdf5Result<ArrayRef> {
    sub_shape.iter().rev().try_fold(values, |inner, len| {
        let list = FixedSizeListArray::try_new(
            list_item_field(inner.data_type().clone()),
            *len as i32,
            inner,
            None,
        )?;
        Ok(Arc::new(list) as ArrayRef)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::AsArray;
    use arrow::datatypes::Float64Type;

    #[test]
    fn test_nest_sub_shape() {
        let values: ArrayRef = Arc::new(Float64Array::from((0..12).map(f64::from).collect::<Vec<_>>()));
        let nested = nest_sub_shape(values, &[2, 3]).unwrap();
        let element_type = ElementType::with_sub_shape(PrimitiveType::Float64, vec![2, 3]);

        assert_eq!(nested.len(), 2);
        assert_eq!(nested.data_type(), &element_type.arrow_data_type());

        let outer = nested.as_fixed_size_list();
        let second_row = outer.value(1);
        let inner = second_row.as_fixed_size_list();
        let last = inner.value(1);
        assert_eq!(last.as_primitive::<Float64Type>().values().to_vec(), vec![9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_nest_scalar_is_identity() {
        let values: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 3]));
        let nested = nest_sub_shape(values.clone(), &[]).unwrap();
        assert_eq!(nested.as_ref(), values.as_ref());
    }

    #[test]
    fn test_row_selection_covers_trailing_axes() {
        let slice = RowSlice::new(0, 100, 2).unwrap();
        let selection = row_selection(&slice, 3).unwrap();
        assert_eq!(selection.as_ref().len(), 3);
        assert_eq!(
            selection.as_ref()[0],
            SliceInfoElem::Slice {
                start: 0,
                end: Some(99),
                step: 2
            }
        );
    }
}
