// Progress module: a `Read` adapter that reports how far a stream has got.

use std::io::{self, Read};

/// Wraps a reader and calls `on_progress` with the cumulative byte count
/// after every non-empty read.
pub struct ProgressReader<R, F> {
    inner: R,
    on_progress: F,
    transferred: u64,
}

impl<R, F> ProgressReader<R, F>
where
    R: Read,
    F: FnMut(u64),
{
    pub fn new(inner: R, on_progress: F) -> Self {
        Self {
            inner,
            on_progress,
            transferred: 0,
        }
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }
}

impl<R, F> Read for ProgressReader<R, F>
where
    R: Read,
    F: FnMut(u64),
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.transferred += n as u64;
            (self.on_progress)(self.transferred);
        }
        Ok(n)
    }
}
