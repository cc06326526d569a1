//! Buffer Pool
//!
//! Reusable read buffers shared by the read path, recovery and compaction.
//! The pool is owned by the engine and handed to each component explicitly.

use std::ops::{Deref, DerefMut};

use crossbeam::queue::ArrayQueue;

/// Buffers that grew past this multiple of the default size are not kept
const RETAIN_FACTOR: usize = 16;

/// Bounded pool of `Vec<u8>` read buffers
pub struct BufferPool {
    buffers: ArrayQueue<Vec<u8>>,
    buffer_size: usize,
}

impl BufferPool {
    /// Create a pool holding up to `slots` idle buffers of `buffer_size` bytes
    pub fn new(slots: usize, buffer_size: usize) -> Self {
        Self {
            buffers: ArrayQueue::new(slots.max(1)),
            buffer_size,
        }
    }

    /// Take a cleared buffer, allocating if the pool is empty
    pub fn get(&self) -> PooledBuffer<'_> {
        let buf = self
            .buffers
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_size));
        PooledBuffer { buf, pool: self }
    }

    /// Number of idle buffers currently held
    pub fn idle(&self) -> usize {
        self.buffers.len()
    }

    fn give_back(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.buffer_size.saturating_mul(RETAIN_FACTOR) {
            return;
        }
        buf.clear();
        // Full pool: drop the buffer
        let _ = self.buffers.push(buf);
    }
}

/// A buffer on loan from a [`BufferPool`]; returned on drop
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}
