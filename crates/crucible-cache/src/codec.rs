//! Length-prefixed field framing plus a trailing keyed-MAC for the
//! `actions.bin` on-disk format (spec.md §4.4, §6.1).

use crate::error::{CacheError, Result};
use std::path::Path;

pub fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

pub fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_bytes(buf, s.as_bytes());
}

pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    path: &'a Path,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], path: &'a Path) -> Self {
        Self { data, pos: 0, path }
    }

    fn corrupt(&self, reason: impl Into<String>) -> CacheError {
        CacheError::Corrupt {
            path: self.path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_str(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| self.corrupt("field is not valid utf-8"))
    }

    pub fn read_digest(&mut self) -> Result<crucible_types::Digest> {
        let bytes = self.take(32)?;
        Ok(crucible_types::Digest::from_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_fixed(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(self.corrupt(format!(
                "expected {n} more bytes at offset {}, found {}",
                self.pos,
                self.data.len() - self.pos
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns the raw slice `[start, end)` of the underlying buffer,
    /// independent of the cursor's current position.
    pub fn full_slice(&self, start: usize, end: usize) -> &'a [u8] {
        &self.data[start..end]
    }
}
