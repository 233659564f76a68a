use arrow::array::RecordBatch;

use crate::{error::ArrowHdf5Error, reader::Hdf5ArrowReader, slice::RowSlice, Hdf5Result};

/// Reads all rows of a set of columns as consecutive record batches.
pub struct BatchStream<'a> {
    reader: &'a Hdf5ArrowReader,
    columns: Vec<String>,
    batch_size: usize,
    offset: usize,
}

impl<'a> BatchStream<'a> {
    pub fn new(
        reader: &'a Hdf5ArrowReader,
        columns: Vec<String>,
        batch_size: usize,
    ) -> Hdf5Result<Self> {
        if batch_size == 0 {
            return Err(ArrowHdf5Error::InvalidSlice(
                "batch size cannot be zero".to_string(),
            ));
        }
        Ok(Self {
            reader,
            columns,
            batch_size,
            offset: 0,
        })
    }

    fn is_done(&self) -> bool {
        self.offset >= self.reader.row_count()
    }

    fn read_next(&mut self) -> Hdf5Result<RecordBatch> {
        let stop = (self.offset + self.batch_size).min(self.reader.row_count());
        let slice = RowSlice::new(self.offset, stop, 1)?;
        self.offset = stop;
        self.reader.read_slice(&self.columns, slice)
    }
}

impl Iterator for BatchStream<'_> {
    type Item = Hdf5Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_done() {
            return None;
        }
        Some(self.read_next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .reader
            .row_count()
            .saturating_sub(self.offset)
            .div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}
