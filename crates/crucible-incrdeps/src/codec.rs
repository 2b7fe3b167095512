//! Length-prefixed field framing for the `dependencies.bin` on-disk format
//! (spec.md §6.1). Each field is a 4-byte little-endian length followed by
//! its bytes, mirroring the header-plus-length-prefixed-payload shape used
//! throughout the core's persistent stores.

use crate::error::{IncrDepsError, Result};
use std::path::{Path, PathBuf};

pub fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

pub fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_bytes(buf, s.as_bytes());
}

pub fn write_path(buf: &mut Vec<u8>, path: &Path) {
    write_str(buf, &path.to_string_lossy());
}

pub fn write_digest(buf: &mut Vec<u8>, digest: &crucible_types::Digest) {
    buf.extend_from_slice(digest.as_bytes());
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

    fn corrupt(&self, reason: impl Into<String>) -> IncrDepsError {
        IncrDepsError::Corrupt {
            path: self.path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_str(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| self.corrupt("field is not valid utf-8"))
    }

    pub fn read_path(&mut self) -> Result<PathBuf> {
        Ok(PathBuf::from(self.read_str()?))
    }

    pub fn read_digest(&mut self) -> Result<crucible_types::Digest> {
        let bytes = self.take(32)?;
        let array: [u8; 32] = bytes.try_into().unwrap();
        Ok(crucible_types::Digest::from_bytes(array))
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
}
