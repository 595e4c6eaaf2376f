//! Long read reassembly.

use crate::{config::MAX_RECEIVE_STATE_VALUE_LEN, Error};
use heapless::Vec;

/// Accumulates the parts of a long read of one Receive State.
///
/// The first part is read at offset 0, every following part at the number of bytes received so
/// far. An empty part ends the read.
#[derive(Debug)]
pub struct LongRead {
    index: usize,
    buf: Vec<u8, MAX_RECEIVE_STATE_VALUE_LEN>,
}

impl LongRead {
    /// Starts reading Receive State `index`.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            buf: Vec::new(),
        }
    }

    /// Index of the Receive State being read.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Offset to read the next part at.
    pub fn offset(&self) -> u16 {
        self.buf.len() as u16
    }

    /// Appends a response.
    ///
    /// Returns `Ok(true)` once the value is complete. A value that would not fit the buffer is
    /// `InsufficientResources`, and the buffer is cleared.
    pub fn push(&mut self, part: &[u8]) -> Result<bool, Error> {
        if part.is_empty() {
            return Ok(true);
        }
        if self.buf.extend_from_slice(part).is_err() {
            self.buf.clear();
            return Err(Error::InsufficientResources);
        }
        Ok(false)
    }

    /// The bytes received so far.
    pub fn value(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles() {
        let mut read = LongRead::new(1);
        assert_eq!(read.offset(), 0);
        assert_eq!(read.push(&[1; 20]), Ok(false));
        assert_eq!(read.offset(), 20);
        assert_eq!(read.push(&[2; 7]), Ok(false));
        assert_eq!(read.push(&[]), Ok(true));
        assert_eq!(read.value().len(), 27);
        assert_eq!(read.value()[19..21], [1, 2]);
        assert_eq!(read.index(), 1);
    }

    #[test]
    fn overflow_clears() {
        let mut read = LongRead::new(0);
        assert_eq!(read.push(&[0; MAX_RECEIVE_STATE_VALUE_LEN - 1]), Ok(false));
        assert_eq!(read.push(&[0; 2]), Err(Error::InsufficientResources));
        assert!(read.value().is_empty());
    }
}
