//! File-backed annotation store.
//!
//! One JSON file per image identity holds that image's whole collection as
//! an array in append order. Storage: `{root}/{collection_file_name(identity)}`.
//!
//! Appends are a read-modify-write over the whole file, so they are
//! serialized per identity with an async mutex, and the new contents are
//! written to a temp file and renamed over the old one.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::annotation::Annotation;
use crate::identity::collection_file_name;

/// Entity name used in not-found errors.
pub const COLLECTION_ENTITY: &str = "AnnotationCollection";

/// Errors raised by [`AnnotationStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage medium could not be read or written.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A collection already on disk could not be decoded. Appending to it
    /// would silently drop its contents, so the append is refused.
    #[error("Stored annotations for '{identity}' at {} are corrupt: {source}", path.display())]
    CorruptExisting {
        identity: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A collection could not be serialized.
    #[error("Failed to encode annotations: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Durable append-only store of annotation collections keyed by identity.
pub struct AnnotationStore {
    root: PathBuf,
    /// Per-identity write locks. Entries are pruned once no appender holds them.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AnnotationStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// Failing to create the root is a startup condition, not a request-time
    /// one, so callers are expected to treat this error as fatal.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| StoreError::Io {
                path: root.clone(),
                source,
            })?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path for an identity's collection.
    pub fn collection_path(&self, identity: &str) -> PathBuf {
        self.root.join(collection_file_name(identity))
    }

    /// Load the full collection for `identity`.
    ///
    /// Returns `Ok(None)` when nothing was ever saved for it. An existing
    /// but empty collection is `Ok(Some(vec![]))`.
    pub async fn load(&self, identity: &str) -> Result<Option<Vec<Annotation>>, StoreError> {
        let path = self.collection_path(identity);
        read_collection(identity, &path).await
    }

    /// Append `annotation` to the collection for `identity`.
    ///
    /// Returns the collection length after the append. When this returns
    /// `Ok`, the new collection has been renamed into place.
    pub async fn append(
        &self,
        identity: &str,
        annotation: Annotation,
    ) -> Result<usize, StoreError> {
        let lock = self.lock_for(identity);
        let result = {
            let _guard = lock.lock().await;
            self.append_locked(identity, annotation).await
        };
        self.release_lock(identity, lock);
        result
    }

    async fn append_locked(
        &self,
        identity: &str,
        annotation: Annotation,
    ) -> Result<usize, StoreError> {
        let path = self.collection_path(identity);
        let mut collection = read_collection(identity, &path).await?.unwrap_or_default();
        collection.push(annotation);

        let content = serde_json::to_vec_pretty(&collection).map_err(StoreError::Encode)?;
        write_atomic(&self.root, &path, &content).await?;

        tracing::debug!(
            identity,
            count = collection.len(),
            "Annotation appended"
        );
        Ok(collection.len())
    }

    /// Returns true when the root accepts writes. Used by the health check.
    pub async fn is_writable(&self) -> bool {
        let probe = self.root.join(format!(".probe-{}", uuid::Uuid::now_v7()));
        match fs::write(&probe, b"").await {
            Ok(()) => {
                let _ = fs::remove_file(&probe).await;
                true
            }
            Err(_) => false,
        }
    }

    fn lock_for(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(identity.to_string()).or_default())
    }

    fn release_lock(&self, identity: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Two references left means only the map and this caller hold it;
        // new appenders must take the map lock first, so removal is safe.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(identity);
        }
    }
}

async fn read_collection(
    identity: &str,
    path: &Path,
) -> Result<Option<Vec<Annotation>>, StoreError> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|source| StoreError::CorruptExisting {
            identity: identity.to_string(),
            path: path.to_path_buf(),
            source,
        })
}

/// Write `content` to a temp file in `dir`, sync it, then rename it over
/// `path`. The rename only happens once the bytes are on disk, so a crash
/// leaves either the old collection or the new one.
async fn write_atomic(dir: &Path, path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let temp_path = dir.join(format!(".tmp-{}", uuid::Uuid::now_v7()));

    if let Err(source) = write_synced(&temp_path, content).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(StoreError::Io {
            path: temp_path,
            source,
        });
    }

    if let Err(source) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(())
}

async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(content).await?;
    file.flush().await?;
    file.sync_all().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::annotation::AnnotationRecord;

    fn rect(image: &str, class: &str, x: i64) -> Annotation {
        Annotation::try_from(AnnotationRecord {
            image_name: image.to_string(),
            class: class.to_string(),
            description: None,
            shape: "rect".to_string(),
            data: json!({"x": x, "y": 0, "width": 10, "height": 10}),
        })
        .expect("valid rect")
    }

    async fn open_temp() -> (tempfile::TempDir, AnnotationStore) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = AnnotationStore::open(dir.path().join("data"))
            .await
            .expect("open store");
        (dir, store)
    }

    #[tokio::test]
    async fn open_creates_root() {
        let (dir, store) = open_temp().await;
        assert!(dir.path().join("data").is_dir());
        assert!(store.is_writable().await);
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let (_dir, store) = open_temp().await;
        assert!(store.load("never-saved.png").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn empty_existing_collection_is_distinct_from_missing() {
        let (_dir, store) = open_temp().await;
        std::fs::write(store.collection_path("blank.png"), b"[]").expect("seed");
        assert_eq!(store.load("blank.png").await.expect("load"), Some(vec![]));
    }

    #[tokio::test]
    async fn appends_preserve_call_order() {
        let (_dir, store) = open_temp().await;
        let expected: Vec<Annotation> = (0..5).map(|i| rect("page.png", "char", i)).collect();
        for (i, ann) in expected.iter().enumerate() {
            let count = store.append("page.png", ann.clone()).await.expect("append");
            assert_eq!(count, i + 1);
        }
        assert_eq!(store.load("page.png").await.expect("load"), Some(expected));
    }

    #[tokio::test]
    async fn collections_are_isolated_by_identity() {
        let (_dir, store) = open_temp().await;
        store.append("a.png", rect("a.png", "x", 1)).await.expect("append a");
        store.append("b.png", rect("b.png", "y", 2)).await.expect("append b");

        let a = store.load("a.png").await.expect("load a").expect("a exists");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].class, "x");
    }

    #[tokio::test]
    async fn file_on_disk_is_a_json_array_of_records() {
        let (_dir, store) = open_temp().await;
        store.append("p.png", rect("p.png", "char", 7)).await.expect("append");

        let raw = std::fs::read_to_string(store.collection_path("p.png")).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(
            value,
            json!([{
                "image_name": "p.png",
                "class": "char",
                "description": "",
                "shape": "rect",
                "data": {"x": 7, "y": 0, "width": 10, "height": 10},
            }])
        );
    }

    #[tokio::test]
    async fn corrupt_existing_refuses_append_and_keeps_file() {
        let (_dir, store) = open_temp().await;
        let path = store.collection_path("bad.png");
        std::fs::write(&path, b"{not json").expect("seed");

        let err = store.append("bad.png", rect("bad.png", "c", 0)).await;
        assert_matches!(err, Err(StoreError::CorruptExisting { ref identity, .. }) if identity == "bad.png");

        assert_eq!(std::fs::read(&path).expect("read"), b"{not json");
        assert_matches!(
            store.load("bad.png").await,
            Err(StoreError::CorruptExisting { .. })
        );
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let (_dir, store) = open_temp().await;
        for i in 0..3 {
            store.append("t.png", rect("t.png", "c", i)).await.expect("append");
        }
        let names: Vec<String> = std::fs::read_dir(store.root())
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["t.png.json".to_string()]);
    }

    #[tokio::test]
    async fn write_atomic_replaces_contents_completely() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("c.json");
        std::fs::write(&path, b"[\"old\", \"longer previous contents\"]").expect("seed");

        write_atomic(dir.path(), &path, b"[]").await.expect("write");

        assert_eq!(std::fs::read(&path).expect("read"), b"[]");
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 1);
    }

    #[tokio::test]
    async fn write_atomic_failure_keeps_old_contents() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("c.json");
        std::fs::write(&path, b"[1]").expect("seed");

        let missing = dir.path().join("gone");
        assert_matches!(
            write_atomic(&missing, &path, b"[2]").await,
            Err(StoreError::Io { .. })
        );
        assert_eq!(std::fs::read(&path).expect("read"), b"[1]");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_lose_nothing() {
        let (_dir, store) = open_temp().await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .append("busy.png", rect("busy.png", "char", i))
                        .await
                        .expect("append");
                })
            })
            .collect();
        for handle in handles {
            handle.await.expect("join");
        }

        let collection = store.load("busy.png").await.expect("load").expect("exists");
        assert_eq!(collection.len(), 50);

        let mut xs: Vec<i64> = collection
            .iter()
            .map(|a| match a.shape {
                crate::annotation::Shape::Rect(r) => r.x,
                _ => panic!("expected rect"),
            })
            .collect();
        xs.sort_unstable();
        assert_eq!(xs, (0..50).collect::<Vec<_>>());

        assert!(store.locks.lock().expect("locks").is_empty());
    }
}
