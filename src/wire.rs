//! Typed byte-stream packing for transaction payloads.
//!
//! [`MessageBuffer`] is the boundary between this crate and whatever carries
//! bytes between processes: transactions pack into it on the sending side and
//! unpack from it on the receiving side, and the transport (MPI, sockets, a
//! test loopback) moves the raw bytes. Values are `bytemuck::Pod` and travel
//! in native byte order; peers are assumed to share one ABI, which holds for
//! the single-program-multiple-data codes this crate serves. Framing and
//! versioning, if needed, belong to the transport layer so that packed sizes
//! stay exactly the sizes the transactions advertise.

use bytemuck::Pod;
use bytes::BytesMut;

use crate::decomp_error::DecompError;

/// Append-only pack buffer with a sequential read cursor.
///
/// Packing never fails; unpacking past the end reports
/// [`DecompError::BufferUnderrun`] instead of panicking, since a short buffer
/// usually means a truncated receive rather than a caller bug.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    data: BytesMut,
    read_pos: usize,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(bytes),
            read_pos: 0,
        }
    }

    /// Wrap received bytes for unpacking.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
            read_pos: 0,
        }
    }

    /// Total packed length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed by `unpack*`.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// The full packed payload, independent of the read cursor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Drop all contents and reset the read cursor.
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    /// Append one value.
    pub fn pack<T: Pod>(&mut self, value: &T) {
        self.data.extend_from_slice(bytemuck::bytes_of(value));
    }

    /// Append a slice of values.
    pub fn pack_slice<T: Pod>(&mut self, values: &[T]) {
        self.data.extend_from_slice(bytemuck::cast_slice(values));
    }

    /// Read the next value.
    ///
    /// # Errors
    /// [`DecompError::BufferUnderrun`] if fewer than `size_of::<T>()` bytes
    /// remain.
    pub fn unpack<T: Pod>(&mut self) -> Result<T, DecompError> {
        let needed = size_of::<T>();
        self.check_remaining(needed)?;
        // copy through bytes_of_mut; the read cursor is not aligned for T
        let mut out = T::zeroed();
        bytemuck::bytes_of_mut(&mut out)
            .copy_from_slice(&self.data[self.read_pos..self.read_pos + needed]);
        self.read_pos += needed;
        Ok(out)
    }

    /// Read exactly `out.len()` values into `out`.
    ///
    /// # Errors
    /// [`DecompError::BufferUnderrun`] if the buffer holds fewer bytes; `out`
    /// is untouched in that case.
    pub fn unpack_slice_into<T: Pod>(&mut self, out: &mut [T]) -> Result<(), DecompError> {
        let needed = size_of::<T>() * out.len();
        self.check_remaining(needed)?;
        bytemuck::cast_slice_mut::<T, u8>(out)
            .copy_from_slice(&self.data[self.read_pos..self.read_pos + needed]);
        self.read_pos += needed;
        Ok(())
    }

    /// Read the next `n` values into a fresh vector.
    pub fn unpack_vec<T: Pod>(&mut self, n: usize) -> Result<Vec<T>, DecompError> {
        let mut out = vec![T::zeroed(); n];
        self.unpack_slice_into(&mut out)?;
        Ok(out)
    }

    fn check_remaining(&self, needed: usize) -> Result<(), DecompError> {
        let available = self.remaining();
        if needed > available {
            return Err(DecompError::BufferUnderrun { needed, available });
        }
        Ok(())
    }
}
