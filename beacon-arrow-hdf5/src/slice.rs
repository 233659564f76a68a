use crate::{error::ArrowHdf5Error, Hdf5Result};

/// Forward strided selection of rows, `start..stop` taking every `step`-th row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSlice {
    pub start: usize,
    pub stop: usize,
    pub step: usize,
}

impl RowSlice {
    pub fn new(start: usize, stop: usize, step: usize) -> Hdf5Result<Self> {
        if step == 0 {
            return Err(ArrowHdf5Error::InvalidSlice(
                "slice step cannot be zero".to_string(),
            ));
        }
        Ok(Self { start, stop, step })
    }

    pub fn full(row_count: usize) -> Self {
        Self {
            start: 0,
            stop: row_count,
            step: 1,
        }
    }

    /// Clamp `start` and `stop` into `[0, row_count]`.
    pub fn clamp(self, row_count: usize) -> Self {
        let stop = self.stop.min(row_count);
        Self {
            start: self.start.min(stop),
            stop,
            step: self.step,
        }
    }

    /// Number of rows selected by the slice.
    pub fn len(&self) -> usize {
        if self.stop <= self.start {
            0
        } else {
            (self.stop - self.start).div_ceil(self.step)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exclusive end that covers exactly `len()` rows.
    pub(crate) fn tight_stop(&self) -> usize {
        match self.len() {
            0 => self.start,
            len => self.start + (len - 1) * self.step + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_len() {
        assert_eq!(RowSlice::new(10, 20, 1).unwrap().len(), 10);
        assert_eq!(RowSlice::new(0, 100, 2).unwrap().len(), 50);
        assert_eq!(RowSlice::new(0, 101, 2).unwrap().len(), 51);
        assert_eq!(RowSlice::new(5, 6, 10).unwrap().len(), 1);
        assert_eq!(RowSlice::new(20, 10, 1).unwrap().len(), 0);
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(matches!(
            RowSlice::new(0, 10, 0),
            Err(ArrowHdf5Error::InvalidSlice(_))
        ));
    }

    #[test]
    fn test_clamp() {
        let slice = RowSlice::new(990, 2000, 3).unwrap().clamp(1000);
        assert_eq!(slice.stop, 1000);
        assert_eq!(slice.len(), 4);

        let past_end = RowSlice::new(1500, 2000, 1).unwrap().clamp(1000);
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_tight_stop() {
        let slice = RowSlice::new(0, 100, 3).unwrap();
        assert_eq!(slice.len(), 34);
        assert_eq!(slice.tight_stop(), 100);
        let slice = RowSlice::new(2, 10, 4).unwrap();
        assert_eq!(slice.tight_stop(), 7);
        assert_eq!(RowSlice::new(4, 4, 1).unwrap().tight_stop(), 4);
    }
}
