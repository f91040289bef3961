//! A growable byte buffer with a read cursor, used by codecs to assemble
//! and parse wire bytes.

use crate::error::Error;

const INITIAL_CAPACITY: usize = 32;

/// Single-threaded append/consume byte buffer.
///
/// Bytes already consumed are periodically compacted out of the front of
/// the backing `Vec` so a buffer reused across many `parse`/`assemble`
/// cycles does not grow without bound.
#[derive(Debug, Default, Clone)]
pub struct ByteBuffer {
    data: Vec<u8>,
    read_pos: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        ByteBuffer {
            data: Vec::with_capacity(INITIAL_CAPACITY),
            read_pos: 0,
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        ByteBuffer { data, read_pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data[self.read_pos..].to_vec()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    fn grow_for(&mut self, additional: usize) {
        self.compact();
        let required = self.data.len() + additional;
        if required > self.data.capacity() {
            let mut capacity = self.data.capacity().max(INITIAL_CAPACITY);
            while capacity < required {
                capacity *= 2;
            }
            self.data.reserve(capacity - self.data.len());
        }
    }

    fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        if self.read_pos == self.data.len() {
            self.data.clear();
        } else {
            self.data.drain(0..self.read_pos);
        }
        self.read_pos = 0;
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.grow_for(bytes.len());
        self.data.extend_from_slice(bytes);
    }

    pub fn append_u8(&mut self, value: u8) {
        self.append(&[value]);
    }

    pub fn append_be<const N: usize>(&mut self, bytes: [u8; N]) {
        self.append(&bytes);
    }

    pub fn consume(&mut self, n: usize) -> Result<&[u8], Error> {
        let available = self.len();
        if n > available {
            return Err(Error::BufferOverflow {
                requested: n,
                available,
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.data[start..self.read_pos])
    }

    pub fn consume_u8(&mut self) -> Result<u8, Error> {
        Ok(self.consume(1)?[0])
    }

    pub fn consume_be<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let bytes = self.consume(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn peek_u8(&self) -> Result<u8, Error> {
        self.as_slice()
            .first()
            .copied()
            .ok_or(Error::BufferOverflow {
                requested: 1,
                available: 0,
            })
    }
}
