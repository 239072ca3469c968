use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::repository::LocalCache;

/// Local cache persisted as a single JSON object of slots.
///
/// The whole file is rewritten on every change. IO failures are logged and
/// otherwise ignored: an unreadable file opens as an empty cache and a failed
/// write keeps the in-memory value for the rest of the process.
pub struct FileCache {
    path: PathBuf,
    slots: Mutex<BTreeMap<String, String>>,
}

impl FileCache {
    /// Open (or lazily create) the cache file at `path`.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let slots = read_slots(&path);
        Self {
            path,
            slots: Mutex::new(slots),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) {
        let mut guard = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut guard);
        write_slots(&self.path, &guard);
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        match self.slots.lock() {
            Ok(guard) => guard.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    fn set(&self, key: &str, value: String) {
        self.update(|slots| {
            slots.insert(key.to_owned(), value);
        });
    }

    fn remove(&self, key: &str) {
        self.update(|slots| {
            slots.remove(key);
        });
    }
}

fn read_slots(path: &Path) -> BTreeMap<String, String> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cache file unreadable, starting empty");
            return BTreeMap::new();
        }
    };

    serde_json::from_str(&text).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "cache file is not valid JSON, starting empty");
        BTreeMap::new()
    })
}

fn write_slots(path: &Path, slots: &BTreeMap<String, String>) {
    let text = match serde_json::to_string_pretty(slots) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "could not serialize cache slots");
            return;
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(path = %parent.display(), error = %e, "could not create cache directory");
            return;
        }
    }

    // Write next to the target and rename so a crash never leaves half a file.
    let tmp = path.with_extension("tmp");
    let result = std::fs::write(&tmp, text).and_then(|()| std::fs::rename(&tmp, path));
    match result {
        Ok(()) => tracing::debug!(path = %path.display(), slots = slots.len(), "cache written"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cache write failed"),
    }
}
