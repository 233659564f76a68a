use std::{
    ffi::{c_uint, CStr},
    fmt,
    sync::Arc,
};

use arrow::datatypes::{DataType, Field, FieldRef};
use hdf5::{
    types::{FloatSize, IntSize, TypeDescriptor},
    Datatype,
};
use hdf5_sys::{
    h5::H5free_memory,
    h5t::{H5T_class_t, H5Tget_class, H5Tget_member_name, H5Tget_member_type, H5Tget_nmembers},
};

use crate::{error::ArrowHdf5Error, Hdf5Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl PrimitiveType {
    pub fn arrow_data_type(&self) -> DataType {
        match self {
            PrimitiveType::Bool => DataType::Boolean,
            PrimitiveType::Int8 => DataType::Int8,
            PrimitiveType::Int16 => DataType::Int16,
            PrimitiveType::Int32 => DataType::Int32,
            PrimitiveType::Int64 => DataType::Int64,
            PrimitiveType::UInt8 => DataType::UInt8,
            PrimitiveType::UInt16 => DataType::UInt16,
            PrimitiveType::UInt32 => DataType::UInt32,
            PrimitiveType::UInt64 => DataType::UInt64,
            PrimitiveType::Float32 => DataType::Float32,
            PrimitiveType::Float64 => DataType::Float64,
        }
    }

    #[allow(unreachable_patterns)]
    fn from_hdf5(descriptor: &TypeDescriptor) -> Option<Self> {
        match descriptor {
            TypeDescriptor::Boolean => Some(PrimitiveType::Bool),
            TypeDescriptor::Integer(IntSize::U1) => Some(PrimitiveType::Int8),
            TypeDescriptor::Integer(IntSize::U2) => Some(PrimitiveType::Int16),
            TypeDescriptor::Integer(IntSize::U4) => Some(PrimitiveType::Int32),
            TypeDescriptor::Integer(IntSize::U8) => Some(PrimitiveType::Int64),
            TypeDescriptor::Unsigned(IntSize::U1) => Some(PrimitiveType::UInt8),
            TypeDescriptor::Unsigned(IntSize::U2) => Some(PrimitiveType::UInt16),
            TypeDescriptor::Unsigned(IntSize::U4) => Some(PrimitiveType::UInt32),
            TypeDescriptor::Unsigned(IntSize::U8) => Some(PrimitiveType::UInt64),
            TypeDescriptor::Float(FloatSize::U4) => Some(PrimitiveType::Float32),
            TypeDescriptor::Float(FloatSize::U8) => Some(PrimitiveType::Float64),
            _ => None,
        }
    }
}

/// Type of a single row of a column: a primitive plus a fixed sub-shape.
///
/// A dataset of shape `(N, 3)` holding `f64` has element type
/// `Float64` with sub-shape `[3]`; scalar columns have an empty sub-shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementType {
    pub primitive: PrimitiveType,
    pub sub_shape: Vec<usize>,
}

impl ElementType {
    pub fn scalar(primitive: PrimitiveType) -> Self {
        Self {
            primitive,
            sub_shape: vec![],
        }
    }

    pub fn with_sub_shape(primitive: PrimitiveType, sub_shape: Vec<usize>) -> Self {
        Self {
            primitive,
            sub_shape,
        }
    }

    /// Element type of a homogeneous dataset: the trailing dimensions become the sub-shape.
    pub fn try_from_dataset(descriptor: &TypeDescriptor, shape: &[usize]) -> Option<Self> {
        let mut element_type = Self::try_from_descriptor(descriptor)?;
        let mut sub_shape = shape.get(1..).unwrap_or_default().to_vec();
        sub_shape.append(&mut element_type.sub_shape);
        element_type.sub_shape = sub_shape;
        Some(element_type)
    }

    /// Element type of a single value, unwrapping fixed-size array types into the sub-shape.
    pub fn try_from_descriptor(descriptor: &TypeDescriptor) -> Option<Self> {
        match descriptor {
            TypeDescriptor::FixedArray(inner, len) => {
                let mut element_type = Self::try_from_descriptor(inner)?;
                element_type.sub_shape.insert(0, *len);
                Some(element_type)
            }
            descriptor => PrimitiveType::from_hdf5(descriptor).map(Self::scalar),
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.sub_shape.is_empty()
    }

    /// Number of primitive values making up a single row.
    pub fn values_per_row(&self) -> usize {
        self.sub_shape.iter().product()
    }

    pub fn arrow_data_type(&self) -> DataType {
        self.sub_shape
            .iter()
            .rev()
            .fold(self.primitive.arrow_data_type(), |inner, len| {
                DataType::FixedSizeList(list_item_field(inner), *len as i32)
            })
    }
}

/// A compound member and its element type, `None` when it has no Arrow representation.
pub type CompoundMember = (String, Option<ElementType>);

/// Lists the members of a compound datatype, or returns `None` for any other class.
///
/// Members are described one at a time, so a member without a type descriptor
/// (e.g. a multi-dimensional array) only hides itself.
pub(crate) fn compound_members(dtype: &Datatype, path: &str) -> Hdf5Result<Option<Vec<CompoundMember>>> {
    let raw_error = |call: &'static str| ArrowHdf5Error::RawRead {
        path: path.to_string(),
        call,
    };

    hdf5::sync::sync(|| {
        let id = dtype.id();
        if unsafe { H5Tget_class(id) } != H5T_class_t::H5T_COMPOUND {
            return Ok(None);
        }

        let count = unsafe { H5Tget_nmembers(id) };
        if count < 0 {
            return Err(raw_error("H5Tget_nmembers"));
        }

        let mut members = Vec::with_capacity(count as usize);
        for index in 0..count as c_uint {
            let name_ptr = unsafe { H5Tget_member_name(id, index) };
            if name_ptr.is_null() {
                return Err(raw_error("H5Tget_member_name"));
            }
            let name = unsafe { CStr::from_ptr(name_ptr) }
                .to_string_lossy()
                .into_owned();
            unsafe {
                H5free_memory(name_ptr.cast());
            }

            let member_id = unsafe { H5Tget_member_type(id, index) };
            if member_id < 0 {
                return Err(raw_error("H5Tget_member_type"));
            }
            let member = unsafe { hdf5::from_id::<Datatype>(member_id) }?;
            let element_type = member
                .to_descriptor()
                .ok()
                .and_then(|descriptor| ElementType::try_from_descriptor(&descriptor));
            members.push((name, element_type));
        }
        Ok(Some(members))
    })
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.primitive)?;
        if !self.sub_shape.is_empty() {
            write!(f, "{:?}", self.sub_shape)?;
        }
        Ok(())
    }
}

/// Item field shared by the schema and the arrays built for sub-shaped columns.
pub(crate) fn list_item_field(data_type: DataType) -> FieldRef {
    Arc::new(Field::new("item", data_type, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_mapping() {
        let cases = [
            (TypeDescriptor::Integer(IntSize::U1), DataType::Int8),
            (TypeDescriptor::Integer(IntSize::U8), DataType::Int64),
            (TypeDescriptor::Unsigned(IntSize::U2), DataType::UInt16),
            (TypeDescriptor::Float(FloatSize::U4), DataType::Float32),
            (TypeDescriptor::Float(FloatSize::U8), DataType::Float64),
            (TypeDescriptor::Boolean, DataType::Boolean),
        ];
        for (descriptor, expected) in cases {
            let element_type = ElementType::try_from_descriptor(&descriptor).unwrap();
            assert!(element_type.is_scalar());
            assert_eq!(element_type.arrow_data_type(), expected);
        }
    }

    #[test]
    fn test_unsupported_descriptors() {
        assert!(ElementType::try_from_descriptor(&TypeDescriptor::VarLenUnicode).is_none());
        assert!(ElementType::try_from_descriptor(&TypeDescriptor::FixedAscii(8)).is_none());
    }

    #[test]
    fn test_dataset_trailing_dims_become_sub_shape() {
        let element_type =
            ElementType::try_from_dataset(&TypeDescriptor::Float(FloatSize::U8), &[1000, 2, 3])
                .unwrap();
        assert_eq!(element_type.sub_shape, vec![2, 3]);
        assert_eq!(element_type.values_per_row(), 6);
        assert_eq!(
            element_type.arrow_data_type(),
            DataType::FixedSizeList(
                list_item_field(DataType::FixedSizeList(
                    list_item_field(DataType::Float64),
                    3
                )),
                2
            )
        );
    }

    #[test]
    fn test_fixed_array_field() {
        let descriptor =
            TypeDescriptor::FixedArray(Box::new(TypeDescriptor::Integer(IntSize::U4)), 3);
        let element_type = ElementType::try_from_descriptor(&descriptor).unwrap();
        assert_eq!(
            element_type,
            ElementType::with_sub_shape(PrimitiveType::Int32, vec![3])
        );
        assert_eq!(element_type.to_string(), "Int32[3]");
    }
}
