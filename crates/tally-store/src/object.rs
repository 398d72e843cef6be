use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

use crate::{LoadOutcome, StoreFailure};

/// Whole-object key/value storage.
///
/// Reads report a missing key as [`LoadOutcome::NotFound`], never as a
/// failure. Writes replace the whole object; a reader never observes a
/// half-written one.
pub trait ObjectStore: Send + Sync {
    /// Short human-readable location, used in logs and reports.
    fn describe(&self) -> String;

    fn load(&self, key: &str) -> LoadOutcome;

    fn save(&self, key: &str, body: &[u8]) -> Result<(), StoreFailure>;
}

/// Keys are relative, `/`-separated, and may not climb out of the root.
fn check_key(key: &str) -> Result<(), StoreFailure> {
    if key.is_empty() {
        return Err(StoreFailure::fatal("empty object key"));
    }
    let path = Path::new(key);
    let ok = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !ok {
        return Err(StoreFailure::fatal(format!("invalid object key: {key}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// A directory treated as a bucket: key `a/b.json` lives at `<root>/a/b.json`.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreFailure> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

impl ObjectStore for FsObjectStore {
    fn describe(&self) -> String {
        format!("fs:{}", self.root.display())
    }

    fn load(&self, key: &str) -> LoadOutcome {
        let path = match self.path_for(key) {
            Ok(p) => p,
            Err(f) => return LoadOutcome::Failed(f),
        };
        match fs::read(&path) {
            Ok(bytes) => LoadOutcome::Found(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => LoadOutcome::NotFound,
            Err(e) => LoadOutcome::Failed(StoreFailure::from_io(
                &e,
                format_args!("read failed: {}", path.display()),
            )),
        }
    }

    fn save(&self, key: &str, body: &[u8]) -> Result<(), StoreFailure> {
        let path = self.path_for(key)?;
        let dir = path
            .parent()
            .ok_or_else(|| StoreFailure::fatal(format!("object key has no parent: {key}")))?;
        fs::create_dir_all(dir).map_err(|e| {
            StoreFailure::from_io(&e, format_args!("create dir failed: {}", dir.display()))
        })?;

        // Same directory as the target so the rename stays on one filesystem.
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        if let Err(e) = fs::write(&tmp, body) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreFailure::from_io(
                &e,
                format_args!("write failed: {}", tmp.display()),
            ));
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreFailure::from_io(
                &e,
                format_args!("rename failed: {}", path.display()),
            ));
        }

        debug!(key, bytes = body.len(), root = %self.root.display(), "object saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-process store for tests and dry runs.
///
/// Failures can be injected for reads (all keys) and for writes whose key
/// starts with a given prefix.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    name: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    load_failure: Mutex<Option<StoreFailure>>,
    save_failures: Mutex<Vec<(String, StoreFailure)>>,
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Seed an object without going through `save`.
    pub fn put(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        locked(&self.objects).insert(key.into(), body.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        locked(&self.objects).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        locked(&self.objects).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        locked(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every subsequent `load` returns `Failed(failure)`.
    pub fn fail_loads(&self, failure: StoreFailure) {
        *locked(&self.load_failure) = Some(failure);
    }

    /// Every subsequent `save` to a key starting with `prefix` fails.
    pub fn fail_saves_under(&self, prefix: impl Into<String>, failure: StoreFailure) {
        locked(&self.save_failures).push((prefix.into(), failure));
    }

    pub fn clear_failures(&self) {
        *locked(&self.load_failure) = None;
        locked(&self.save_failures).clear();
    }
}

impl ObjectStore for MemoryObjectStore {
    fn describe(&self) -> String {
        format!("mem:{}", self.name)
    }

    fn load(&self, key: &str) -> LoadOutcome {
        if let Err(f) = check_key(key) {
            return LoadOutcome::Failed(f);
        }
        if let Some(f) = locked(&self.load_failure).clone() {
            return LoadOutcome::Failed(f);
        }
        match self.get(key) {
            Some(bytes) => LoadOutcome::Found(bytes),
            None => LoadOutcome::NotFound,
        }
    }

    fn save(&self, key: &str, body: &[u8]) -> Result<(), StoreFailure> {
        check_key(key)?;
        let injected = locked(&self.save_failures)
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix.as_str()))
            .map(|(_, f)| f.clone());
        if let Some(f) = injected {
            return Err(f);
        }
        self.put(key, body);
        Ok(())
    }
}
