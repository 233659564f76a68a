use hdf5::{
    types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode},
    Attribute, Location,
};
use indexmap::IndexMap;
use serde::Serialize;

use crate::Hdf5Result;

/// Capacity used when reading fixed-length string attributes.
const FIXED_STRING_CAPACITY: usize = 1024;

/// Attributes of a single dataset, in file order.
pub type Attributes = IndexMap<String, AttributeValue>;

/// Attributes of every visited dataset, keyed by the dataset path relative to the root.
pub type AttributeMap = IndexMap<String, Attributes>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Bool(bool),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    StringList(Vec<String>),
    Int64List(Vec<i64>),
    UInt64List(Vec<u64>),
    Float64List(Vec<f64>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Reads an attribute, returning `None` when its type has no representation.
    pub fn read(attribute: &Attribute) -> Hdf5Result<Option<Self>> {
        let Ok(descriptor) = attribute.dtype()?.to_descriptor() else {
            return Ok(None);
        };
        let scalar = attribute.is_scalar();

        if let TypeDescriptor::FixedAscii(len) | TypeDescriptor::FixedUnicode(len) = descriptor {
            if len > FIXED_STRING_CAPACITY {
                tracing::warn!(
                    "Attribute {} holds strings of {} bytes; only the first {} are read",
                    attribute.name(),
                    len,
                    FIXED_STRING_CAPACITY
                );
            }
        }

        let value = match descriptor {
            TypeDescriptor::Integer(_) if scalar => {
                Some(AttributeValue::Int64(attribute.read_scalar::<i64>()?))
            }
            TypeDescriptor::Integer(_) => {
                Some(AttributeValue::Int64List(attribute.read_raw::<i64>()?))
            }
            TypeDescriptor::Unsigned(_) if scalar => {
                Some(AttributeValue::UInt64(attribute.read_scalar::<u64>()?))
            }
            TypeDescriptor::Unsigned(_) => {
                Some(AttributeValue::UInt64List(attribute.read_raw::<u64>()?))
            }
            TypeDescriptor::Float(_) if scalar => {
                Some(AttributeValue::Float64(attribute.read_scalar::<f64>()?))
            }
            TypeDescriptor::Float(_) => {
                Some(AttributeValue::Float64List(attribute.read_raw::<f64>()?))
            }
            TypeDescriptor::Boolean if scalar => {
                Some(AttributeValue::Bool(attribute.read_scalar::<bool>()?))
            }
            TypeDescriptor::VarLenUnicode => {
                read_strings(attribute, scalar, |s: VarLenUnicode| s.as_str().to_string())?
            }
            TypeDescriptor::VarLenAscii => {
                read_strings(attribute, scalar, |s: VarLenAscii| s.as_str().to_string())?
            }
            // Encoded byte strings are stored as fixed-length strings.
            TypeDescriptor::FixedAscii(_) => read_strings(
                attribute,
                scalar,
                |s: FixedAscii<FIXED_STRING_CAPACITY>| decode_bytes(s.as_bytes()),
            )?,
            TypeDescriptor::FixedUnicode(_) => read_strings(
                attribute,
                scalar,
                |s: FixedUnicode<FIXED_STRING_CAPACITY>| decode_bytes(s.as_bytes()),
            )?,
            _ => None,
        };

        Ok(value)
    }
}

fn read_strings<T, F>(attribute: &Attribute, scalar: bool, decode: F) -> Hdf5Result<Option<AttributeValue>>
where
    T: hdf5::H5Type,
    F: Fn(T) -> String,
{
    if scalar {
        let value = attribute.read_scalar::<T>()?;
        Ok(Some(AttributeValue::String(decode(value))))
    } else {
        let values = attribute.read_raw::<T>()?;
        Ok(Some(AttributeValue::StringList(
            values.into_iter().map(decode).collect(),
        )))
    }
}

fn decode_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}

/// Reads all attributes attached to a dataset or group.
pub fn read_attributes(location: &Location) -> Hdf5Result<Attributes> {
    let mut attributes = Attributes::new();
    for name in location.attr_names()? {
        let attribute = location.attr(&name)?;
        match AttributeValue::read(&attribute)? {
            Some(value) => {
                attributes.insert(name, value);
            }
            None => {
                tracing::warn!(
                    "Skipping attribute {} of {} with unsupported data type",
                    name,
                    location.name()
                );
            }
        }
    }
    Ok(attributes)
}
