//! Fixed-size payload chunking.

use crate::{Error, Result};

/// Split `data` into pieces of `chunk_size` bytes.
///
/// Every piece has exactly `chunk_size` bytes except the last, which holds the
/// remainder. Empty input yields a single empty piece so that every prepared
/// file owns at least one chunk file.
///
/// The returned iterator is lazy and cheap to clone; cloning restarts the
/// sequence from wherever the clone was taken.
pub fn chunk(data: &[u8], chunk_size: usize) -> Result<Chunks<'_>> {
    if chunk_size == 0 {
        return Err(Error::InvalidArgument(
            "chunk size must be a positive integer".to_string(),
        ));
    }
    Ok(Chunks {
        rest: data,
        chunk_size,
        pending_empty: data.is_empty(),
    })
}

/// Number of pieces `chunk` produces for an input of `len` bytes.
pub fn chunk_count(len: usize, chunk_size: usize) -> Result<usize> {
    if chunk_size == 0 {
        return Err(Error::InvalidArgument(
            "chunk size must be a positive integer".to_string(),
        ));
    }
    Ok(if len == 0 { 1 } else { len.div_ceil(chunk_size) })
}

/// Lazy iterator over the pieces of a payload.
#[derive(Clone, Debug)]
pub struct Chunks<'a> {
    rest: &'a [u8],
    chunk_size: usize,
    pending_empty: bool,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending_empty {
            self.pending_empty = false;
            return Some(self.rest);
        }
        if self.rest.is_empty() {
            return None;
        }
        let take = self.chunk_size.min(self.rest.len());
        let (piece, rest) = self.rest.split_at(take);
        self.rest = rest;
        Some(piece)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = if self.pending_empty {
            1
        } else {
            self.rest.len().div_ceil(self.chunk_size)
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

impl std::iter::FusedIterator for Chunks<'_> {}
