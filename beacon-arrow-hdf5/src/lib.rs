pub mod attributes;
pub mod data_types;
pub mod decoder;
pub mod discovery;
pub mod error;
pub mod path;
pub mod reader;
pub mod schema;
pub mod slice;
pub mod stream;

pub use attributes::{AttributeMap, AttributeValue, Attributes};
pub use data_types::{ElementType, PrimitiveType};
pub use error::ArrowHdf5Error;
pub use reader::{Hdf5ArrowReader, ReaderOptions};
pub use schema::{ColumnLocation, FrozenColumn, FrozenSchema};
pub use slice::RowSlice;
pub use stream::BatchStream;

pub type Hdf5Result<T> = std::result::Result<T, error::ArrowHdf5Error>;
