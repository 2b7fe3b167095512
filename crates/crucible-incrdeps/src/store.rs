//! The on-disk `dependencies.bin` store (spec.md §4.3, §6.1).

use crate::codec::{write_digest, Cursor};
use crate::error::{IncrDepsError, Result};
use crate::record::FileDependency;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MAGIC: &[u8; 4] = b"FDPC";
const FORMAT_VERSION: u16 = 1;

/// In-memory view of every tracked source file's import set, backed by a
/// single binary file per cache root.
#[derive(Debug, Default)]
pub struct IncrDepsStore {
    records: HashMap<PathBuf, FileDependency>,
}

impl IncrDepsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: &Path) -> Option<&FileDependency> {
        self.records.get(source)
    }

    pub fn upsert(&mut self, record: FileDependency) {
        self.records.insert(record.source.clone(), record);
    }

    pub fn remove(&mut self, source: &Path) {
        self.records.remove(source);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &FileDependency> {
        self.records.values()
    }

    /// Loads the store at `path`. A missing file is an empty store. A
    /// schema-version mismatch also yields an empty store, logged as a
    /// warning, not a fatal error (spec.md §4.3).
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no incremental-dependency store yet");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(IncrDepsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if bytes.len() < 10 {
            warn!(path = %path.display(), "dependency store too small, treating as empty");
            return Ok(Self::new());
        }
        if &bytes[0..4] != MAGIC {
            return Err(IncrDepsError::Corrupt {
                path: path.to_path_buf(),
                reason: "bad magic".to_string(),
            });
        }
        let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        if version > FORMAT_VERSION {
            warn!(
                path = %path.display(),
                found = version,
                supported = FORMAT_VERSION,
                "dependency store schema is newer than supported, treating as empty"
            );
            return Ok(Self::new());
        }

        let record_count = u32::from_le_bytes(bytes[6..10].try_into().unwrap());
        let mut cursor = Cursor::new(&bytes[10..], path);
        let mut records = HashMap::with_capacity(record_count as usize);
        for _ in 0..record_count {
            let record = read_record(&mut cursor)?;
            records.insert(record.source.clone(), record);
        }
        if cursor.remaining() > 0 {
            debug!(
                path = %path.display(),
                trailing = cursor.remaining(),
                "ignoring trailing bytes in dependency store (forward compatibility)"
            );
        }
        Ok(Self { records })
    }

    /// Writes the store to `path` via a temp-file-then-rename, matching the
    /// crash-safety protocol used by every other persistent store in the
    /// core.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| IncrDepsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        for record in self.records.values() {
            write_record(&mut buf, record);
        }

        let tmp_path = path.with_extension("bin.tmp");
        std::fs::write(&tmp_path, &buf).map_err(|source| IncrDepsError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| IncrDepsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

fn write_record(buf: &mut Vec<u8>, record: &FileDependency) {
    use crate::codec::write_path;
    write_path(buf, &record.source);
    buf.extend_from_slice(&(record.imports.len() as u32).to_le_bytes());
    for import in &record.imports {
        write_path(buf, import);
    }
    write_digest(buf, &record.source_digest);
    buf.extend_from_slice(&(record.import_digests.len() as u32).to_le_bytes());
    for digest in &record.import_digests {
        write_digest(buf, digest);
    }
    buf.extend_from_slice(&record.analyzed_at.to_le_bytes());
}

fn read_record(cursor: &mut Cursor<'_>) -> Result<FileDependency> {
    let source = cursor.read_path()?;
    let import_count = cursor.read_u32()?;
    let mut imports = Vec::with_capacity(import_count as usize);
    for _ in 0..import_count {
        imports.push(cursor.read_path()?);
    }
    let source_digest = cursor.read_digest()?;
    let digest_count = cursor.read_u32()?;
    let mut import_digests = Vec::with_capacity(digest_count as usize);
    for _ in 0..digest_count {
        import_digests.push(cursor.read_digest()?);
    }
    let analyzed_at = cursor.read_u64()?;
    Ok(FileDependency {
        source,
        imports,
        source_digest,
        import_digests,
        analyzed_at,
    })
}
