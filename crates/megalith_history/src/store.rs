//! # Object Stores
//!
//! Where commits and branch references live.
//!
//! [`MemoryStore`] keeps everything in process. [`DiskStore`] lays the same
//! data out like a git object database:
//!
//! ```text
//! <root>/HEAD                      "ref: refs/heads/<name>" or "<commit hex>"
//! <root>/refs/heads/<name>         "<commit hex>"
//! <root>/objects/<2 hex>/<62 hex>  framed object bytes
//! <root>/snapshots/<commit hex>    "<snapshot object hex>"
//! ```
//!
//! Objects are verified by re-hashing on read, so a damaged file surfaces as
//! [`HistoryError::HistoryCorruption`] rather than as a wrong World.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use megalith_core::Digest;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{HistoryError, HistoryResult};
use crate::object::{frame, object_id, unframe, ObjectKind};

/// Where HEAD points.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Head {
    /// Attached to a branch; commits move the branch.
    Branch(String),
    /// Detached at a commit.
    Detached(Digest),
}

impl fmt::Display for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch(name) => write!(f, "ref: refs/heads/{name}"),
            Self::Detached(id) => write!(f, "{id}"),
        }
    }
}

impl Head {
    /// Parses the [`fmt::Display`] form.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text.strip_prefix("ref: refs/heads/") {
            Some(name) if !name.is_empty() => Some(Self::Branch(name.to_string())),
            Some(_) => None,
            None => Digest::from_hex(text).map(Self::Detached),
        }
    }
}

/// Persistent home of a history.
///
/// Implementations must be safe to share between threads.
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Stores an object and returns its id. Storing an existing object is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Io`] if the object cannot be written.
    fn put(&self, kind: ObjectKind, payload: &[u8]) -> HistoryResult<Digest>;

    /// Loads an object's payload, or `None` if absent.
    ///
    /// # Errors
    ///
    /// [`HistoryError::HistoryCorruption`] if the stored bytes do not hash to
    /// `id`, [`HistoryError::Io`] on read failure.
    fn get(&self, id: &Digest) -> HistoryResult<Option<(ObjectKind, Vec<u8>)>>;

    /// Points branch `name` at `id`.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Io`] if the reference cannot be written.
    fn set_ref(&self, name: &str, id: Digest) -> HistoryResult<()>;

    /// Reads branch `name`.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Io`] on read failure.
    fn get_ref(&self, name: &str) -> HistoryResult<Option<Digest>>;

    /// Every branch, sorted by name.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Io`] on read failure.
    fn refs(&self) -> HistoryResult<Vec<(String, Digest)>>;

    /// Stores HEAD.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Io`] if HEAD cannot be written.
    fn set_head(&self, head: &Head) -> HistoryResult<()>;

    /// Reads HEAD, or `None` for a fresh store.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Io`] on read failure.
    fn head(&self) -> HistoryResult<Option<Head>>;

    /// Records that `snapshot` holds the World of `commit`.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Io`] if the index entry cannot be written.
    fn set_snapshot(&self, commit: Digest, snapshot: Digest) -> HistoryResult<()>;

    /// The snapshot object recorded for `commit`, if any.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Io`] on read failure.
    fn snapshot(&self, commit: &Digest) -> HistoryResult<Option<Digest>>;
}

// ============================================================================
// MEMORY STORE
// ============================================================================

#[derive(Debug, Default)]
struct MemoryInner {
    objects: HashMap<Digest, (ObjectKind, Vec<u8>)>,
    refs: BTreeMap<String, Digest>,
    snapshots: HashMap<Digest, Digest>,
    head: Option<Head>,
}

/// In-process store. Lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.inner.lock().objects.len()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, kind: ObjectKind, payload: &[u8]) -> HistoryResult<Digest> {
        let id = object_id(kind, payload);
        self.inner
            .lock()
            .objects
            .entry(id)
            .or_insert_with(|| (kind, payload.to_vec()));
        Ok(id)
    }

    fn get(&self, id: &Digest) -> HistoryResult<Option<(ObjectKind, Vec<u8>)>> {
        Ok(self.inner.lock().objects.get(id).cloned())
    }

    fn set_ref(&self, name: &str, id: Digest) -> HistoryResult<()> {
        self.inner.lock().refs.insert(name.to_string(), id);
        Ok(())
    }

    fn get_ref(&self, name: &str) -> HistoryResult<Option<Digest>> {
        Ok(self.inner.lock().refs.get(name).copied())
    }

    fn refs(&self) -> HistoryResult<Vec<(String, Digest)>> {
        Ok(self
            .inner
            .lock()
            .refs
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect())
    }

    fn set_head(&self, head: &Head) -> HistoryResult<()> {
        self.inner.lock().head = Some(head.clone());
        Ok(())
    }

    fn head(&self) -> HistoryResult<Option<Head>> {
        Ok(self.inner.lock().head.clone())
    }

    fn set_snapshot(&self, commit: Digest, snapshot: Digest) -> HistoryResult<()> {
        self.inner.lock().snapshots.insert(commit, snapshot);
        Ok(())
    }

    fn snapshot(&self, commit: &Digest) -> HistoryResult<Option<Digest>> {
        Ok(self.inner.lock().snapshots.get(commit).copied())
    }
}

// ============================================================================
// DISK STORE
// ============================================================================

fn io_error(action: &str, path: &Path, err: &std::io::Error) -> HistoryError {
    HistoryError::Io(format!("failed to {action} {}: {err}", path.display()))
}

/// Loose-object directory store.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    /// Serializes writers within this process.
    lock: Mutex<()>,
}

impl DiskStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Io`] if the directory layout cannot be created.
    pub fn open(root: impl AsRef<Path>) -> HistoryResult<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [
            root.join("objects"),
            root.join("refs").join("heads"),
            root.join("snapshots"),
        ] {
            fs::create_dir_all(&dir).map_err(|e| io_error("create", &dir, &e))?;
        }
        debug!(root = %root.display(), "disk store opened");
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    /// The store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &Digest) -> PathBuf {
        let hex = id.to_hex();
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.root.join("refs").join("heads").join(name)
    }

    fn snapshot_path(&self, commit: &Digest) -> PathBuf {
        self.root.join("snapshots").join(commit.to_hex())
    }

    fn read_digest(path: &Path) -> HistoryResult<Option<Digest>> {
        Self::read_text(path)?
            .map(|text| {
                Digest::from_hex(&text)
                    .ok_or_else(|| HistoryError::Io(format!("{} is not an object id", path.display())))
            })
            .transpose()
    }

    /// Writes via a temporary file and a rename so readers never see a
    /// partial file.
    fn write_atomic(path: &Path, bytes: &[u8]) -> HistoryResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_error("create", dir, &e))?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| io_error("write", &tmp, &e))?;
        fs::rename(&tmp, path).map_err(|e| io_error("rename", &tmp, &e))
    }

    fn read_optional(path: &Path) -> HistoryResult<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", path, &e)),
        }
    }

    fn read_text(path: &Path) -> HistoryResult<Option<String>> {
        Self::read_optional(path)?
            .map(|bytes| {
                String::from_utf8(bytes).map_err(|_| {
                    HistoryError::Io(format!("{} is not valid UTF-8", path.display()))
                })
            })
            .transpose()
    }
}

impl ObjectStore for DiskStore {
    fn put(&self, kind: ObjectKind, payload: &[u8]) -> HistoryResult<Digest> {
        let id = object_id(kind, payload);
        let path = self.object_path(&id);
        let _guard = self.lock.lock();
        if !path.exists() {
            Self::write_atomic(&path, &frame(kind, payload))?;
        }
        Ok(id)
    }

    fn get(&self, id: &Digest) -> HistoryResult<Option<(ObjectKind, Vec<u8>)>> {
        let Some(framed) = Self::read_optional(&self.object_path(id))? else {
            return Ok(None);
        };
        if Digest::of(&framed) != *id {
            warn!(object = %id, "stored object does not match its id");
            return Err(HistoryError::corruption(*id, "object bytes do not match id"));
        }
        let (kind, payload) =
            unframe(&framed).map_err(|e| HistoryError::corruption(*id, e.to_string()))?;
        Ok(Some((kind, payload.to_vec())))
    }

    fn set_ref(&self, name: &str, id: Digest) -> HistoryResult<()> {
        let _guard = self.lock.lock();
        Self::write_atomic(&self.ref_path(name), format!("{id}\n").as_bytes())
    }

    fn get_ref(&self, name: &str) -> HistoryResult<Option<Digest>> {
        Self::read_digest(&self.ref_path(name))
    }

    fn refs(&self) -> HistoryResult<Vec<(String, Digest)>> {
        let dir = self.root.join("refs").join("heads");
        let entries = fs::read_dir(&dir).map_err(|e| io_error("list", &dir, &e))?;
        let mut refs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error("list", &dir, &e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if Path::new(&name).extension().is_some_and(|ext| ext == "tmp") {
                continue;
            }
            if let Some(id) = self.get_ref(&name)? {
                refs.push((name, id));
            }
        }
        refs.sort();
        Ok(refs)
    }

    fn set_head(&self, head: &Head) -> HistoryResult<()> {
        let _guard = self.lock.lock();
        Self::write_atomic(&self.root.join("HEAD"), format!("{head}\n").as_bytes())
    }

    fn head(&self) -> HistoryResult<Option<Head>> {
        let path = self.root.join("HEAD");
        Self::read_text(&path)?
            .map(|text| {
                Head::parse(&text)
                    .ok_or_else(|| HistoryError::Io(format!("{} is malformed", path.display())))
            })
            .transpose()
    }

    fn set_snapshot(&self, commit: Digest, snapshot: Digest) -> HistoryResult<()> {
        let _guard = self.lock.lock();
        Self::write_atomic(&self.snapshot_path(&commit), format!("{snapshot}\n").as_bytes())
    }

    fn snapshot(&self, commit: &Digest) -> HistoryResult<Option<Digest>> {
        Self::read_digest(&self.snapshot_path(commit))
    }
}
