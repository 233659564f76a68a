use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{RecordBatch, RecordBatchOptions},
    datatypes::SchemaRef,
};

use crate::{
    attributes::AttributeMap,
    decoder,
    discovery::{self, build_catalog},
    error::ArrowHdf5Error,
    path,
    schema::{self, FrozenColumn, FrozenSchema},
    slice::RowSlice,
    stream::BatchStream,
    Hdf5Result,
};

#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Path inside the file below which datasets are collected.
    pub root: String,
    /// Paths to leave out, absolute or relative to `root`.
    pub exclude: Vec<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            root: beacon_config::CONFIG.hdf5_default_root.clone(),
            exclude: vec![],
        }
    }
}

impl ReaderOptions {
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        self
    }
}

/// Exposes the datasets below a root of an HDF5 file as a single Arrow table.
///
/// The schema is discovered and validated once in [`Hdf5ArrowReader::try_new`];
/// afterwards the reader only opens the file for the duration of each read.
#[derive(Debug, Clone)]
pub struct Hdf5ArrowReader {
    path: PathBuf,
    root: String,
    schema: FrozenSchema,
    arrow_schema: SchemaRef,
    attributes: AttributeMap,
    row_count: usize,
}

impl Hdf5ArrowReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Hdf5Result<Self> {
        Self::try_new(path, ReaderOptions::default())
    }

    pub fn try_new<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Hdf5Result<Self> {
        let path = path.as_ref().to_path_buf();
        let root = path::normalize_root(&options.root);

        let (catalog, attributes, exclusions) = {
            let file = hdf5::File::open(&path)?;

            if !path_exists(&file, &root) {
                return Err(ArrowHdf5Error::InvalidPath(options.root.clone()));
            }
            let exclusions =
                schema::resolve_exclusions(&root, &options.exclude, |p| path_exists(&file, p))?;

            let leaves = discovery::discover(&file, &root)?;
            let (catalog, attributes) = build_catalog(leaves);
            (catalog, attributes, exclusions)
        };

        let state = schema::freeze(&root, catalog, attributes, &exclusions)?;
        let arrow_schema = state.schema.arrow_schema();

        tracing::debug!(
            "Opened {} at root {} with {} columns and {} rows",
            path.display(),
            state.effective_root,
            state.schema.len(),
            state.row_count
        );

        Ok(Self {
            path,
            root: state.effective_root,
            schema: state.schema,
            arrow_schema,
            attributes: state.attributes,
            row_count: state.row_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Effective root, rewritten to the dataset when the table is a single structured array.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn schema(&self) -> SchemaRef {
        self.arrow_schema.clone()
    }

    pub fn frozen_schema(&self) -> &FrozenSchema {
        &self.schema
    }

    pub fn columns(&self) -> Vec<&str> {
        self.schema.names().collect()
    }

    pub fn ncol(&self) -> usize {
        self.schema.len()
    }

    pub fn column(&self, name: &str) -> Option<&FrozenColumn> {
        self.schema.get(name)
    }

    /// Attributes keyed by dataset path relative to the effective root.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Reads `columns` over the rows `start..stop` taking every `step`-th row.
    ///
    /// `columns` is any iterable of names; a single column is passed as `["X"]`.
    /// The bounds are clamped to the row count, so a range past the end yields
    /// fewer (or zero) rows.
    pub fn read<I, S>(&self, columns: I, start: usize, stop: usize, step: usize) -> Hdf5Result<RecordBatch>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let slice = RowSlice::new(start, stop, step)?;
        self.read_slice(columns, slice)
    }

    pub fn read_all<I, S>(&self, columns: I) -> Hdf5Result<RecordBatch>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.read_slice(columns, RowSlice::full(self.row_count))
    }

    pub fn read_slice<I, S>(&self, columns: I, slice: RowSlice) -> Hdf5Result<RecordBatch>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = self.lookup_columns(columns)?;
        let slice = slice.clamp(self.row_count);

        let file = hdf5::File::open(&self.path)?;
        let arrays = columns
            .iter()
            .map(|column| decoder::read_column(&file, column, &slice))
            .collect::<Hdf5Result<Vec<_>>>()?;
        drop(file);

        let indices = columns
            .iter()
            .map(|column| self.arrow_schema.index_of(&column.name))
            .collect::<Result<Vec<_>, _>>()?;
        let projected = self.arrow_schema.project(&indices)?;

        let options = RecordBatchOptions::new().with_row_count(Some(slice.len()));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(projected),
            arrays,
            &options,
        )?)
    }

    /// Iterates over all rows in chunks of `batch_size`, or the configured default.
    pub fn batches<I, S>(&self, columns: I, batch_size: Option<usize>) -> Hdf5Result<BatchStream<'_>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = self
            .lookup_columns(columns)?
            .into_iter()
            .map(|column| column.name.clone())
            .collect();
        let batch_size = batch_size.unwrap_or(beacon_config::CONFIG.hdf5_batch_size);
        BatchStream::new(self, columns, batch_size)
    }

    fn lookup_columns<I, S>(&self, columns: I) -> Hdf5Result<Vec<&FrozenColumn>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        columns
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                self.schema
                    .get(name)
                    .ok_or_else(|| ArrowHdf5Error::UnknownColumn(name.to_string()))
            })
            .collect()
    }
}

fn path_exists(file: &hdf5::File, path: &str) -> bool {
    path::is_file_root(path) || file.link_exists(path::trim_trailing(path))
}
