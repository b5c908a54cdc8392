//! Buffered writes.
//!
//! Download workers produce rows far faster than one-row transactions can
//! absorb them, so rows are staged in memory and written in batches of
//! `db_buf_size`. A batch is all-or-nothing from the first integrity
//! rejection on: the offending row and every row staged after it are
//! discarded and counted, never silently retried.

use tracing::warn;

use super::StoreError;

/// Destination of buffered rows. The store implements this per record type.
pub trait RecordWriter<R>: Send + Sync {
    fn write(&self, record: &R) -> Result<(), StoreError>;
}

/// What one flush did.
#[derive(Debug, Default, PartialEq)]
pub struct FlushReport {
    pub written: usize,
    /// Rows dropped after the first integrity rejection, including it.
    pub discarded: usize,
}

/// Fixed-capacity staging buffer in front of a [`RecordWriter`].
pub struct WriteBuffer<R> {
    capacity: usize,
    staged: Vec<R>,
}

impl<R> WriteBuffer<R> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            staged: Vec::new(),
        }
    }

    /// Stage one row, flushing when the buffer reaches capacity.
    pub fn push(
        &mut self,
        writer: &dyn RecordWriter<R>,
        record: R,
    ) -> Result<FlushReport, StoreError> {
        self.staged.push(record);
        if self.staged.len() >= self.capacity {
            self.flush(writer)
        } else {
            Ok(FlushReport::default())
        }
    }

    /// Write all staged rows. An integrity rejection discards the rest of
    /// the batch; any other store error aborts the run.
    pub fn flush(&mut self, writer: &dyn RecordWriter<R>) -> Result<FlushReport, StoreError> {
        let staged = std::mem::take(&mut self.staged);
        let total = staged.len();
        let mut written = 0usize;
        for record in &staged {
            match writer.write(record) {
                Ok(()) => written += 1,
                Err(StoreError::Integrity(reason)) => {
                    let discarded = total - written;
                    warn!(written, discarded, reason = %reason, "integrity rejection, discarding rest of batch");
                    return Ok(FlushReport { written, discarded });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(FlushReport {
            written,
            discarded: 0,
        })
    }

    pub fn staged(&self) -> usize {
        self.staged.len()
    }
}
