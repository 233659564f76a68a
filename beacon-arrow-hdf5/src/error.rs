use arrow::error::ArrowError;
use ndarray::ShapeError;

#[derive(Debug, thiserror::Error)]
pub enum ArrowHdf5Error {
    #[error("Internal HDF5 error: {0}")]
    Hdf5Error(#[from] hdf5::Error),
    #[error("Arrow error: {0}")]
    ArrowError(#[from] ArrowError),
    #[error("Unable to build hyperslab selection: {0}")]
    SelectionShapeError(#[from] ShapeError),
    #[error("'{0}' is not a valid path in HDF file")]
    InvalidPath(String),
    #[error("'{0}' is not a valid path name; cannot be excluded")]
    InvalidExclusion(String),
    #[error(
        "size mismatch in datasets of file; please use `exclude` to remove datasets of the wrong size\n{}",
        format_sizes(.0)
    )]
    SizeMismatch(Vec<(String, usize)>),
    #[error("HDF file appears to contain no datasets below root '{0}'")]
    EmptySchema(String),
    #[error("Column '{0}' is not part of the schema")]
    UnknownColumn(String),
    #[error("Error trying to access column '{column}' in HDF file at '{location}'")]
    InvalidColumn { column: String, location: String },
    #[error("Invalid row slice: {0}")]
    InvalidSlice(String),
    #[error("HDF5 call {call} failed while reading '{path}'")]
    RawRead { path: String, call: &'static str },
}

fn format_sizes(sizes: &[(String, usize)]) -> String {
    sizes
        .iter()
        .map(|(column, size)| format!("size of '{}': {}", column, size))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_lists_every_column() {
        let err = ArrowHdf5Error::SizeMismatch(vec![("X".to_string(), 10), ("Y/a".to_string(), 12)]);
        let message = err.to_string();
        assert!(message.contains("size of 'X': 10"));
        assert!(message.contains("size of 'Y/a': 12"));
    }
}
