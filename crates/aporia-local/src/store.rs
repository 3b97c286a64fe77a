use aporia_core::{AnnotationStore, CachedAnalysis, Error, Result, SavedAnnotation};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Longest annotation snippet persisted. The full document text is never stored.
pub const MAX_SNIPPET_CHARS: usize = 200;

pub fn now_epoch_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Hex SHA-256 of extracted document text; the analysis cache key component.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

pub fn snippet(text: &str) -> String {
    crate::textprep::truncate_chars(text, MAX_SNIPPET_CHARS).0
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}

/// JSON files under a root directory.
///
/// ```text
/// <root>/config.json
/// <root>/annotations/ab/cd/<sha256(url)>.json   Vec<SavedAnnotation>
/// <root>/analysis/ab/cd/<sha256(url)>.json      CachedAnalysis
/// ```
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_for_url(url: &str) -> String {
        let mut h = Sha256::new();
        h.update(b"url:");
        h.update(url.as_bytes());
        hex::encode(h.finalize())
    }

    fn path_for(&self, space: &str, url: &str) -> PathBuf {
        let key = Self::key_for_url(url);
        self.root
            .join(space)
            .join(&key[0..2])
            .join(&key[2..4])
            .join(format!("{key}.json"))
    }

    fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path).map_err(store_err)?;
        let v = serde_json::from_slice(&bytes).map_err(store_err)?;
        Ok(Some(v))
    }

    fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(store_err)?;
        }
        let bytes = serde_json::to_vec_pretty(value).map_err(store_err)?;
        fs::write(path, bytes).map_err(store_err)
    }

    pub fn load_config_sync(&self) -> Result<Option<serde_json::Value>> {
        Self::read_json(&self.config_path())
    }

    pub fn save_config_sync(&self, config: &serde_json::Value) -> Result<()> {
        Self::write_json(&self.config_path(), config)
    }

    pub fn annotations_sync(&self, url: &str) -> Result<Vec<SavedAnnotation>> {
        Ok(Self::read_json(&self.path_for("annotations", url))?.unwrap_or_default())
    }

    pub fn save_annotation_sync(&self, annotation: &SavedAnnotation) -> Result<()> {
        let mut list = self.annotations_sync(&annotation.url)?;
        let mut a = annotation.clone();
        a.text = snippet(&a.text);
        match list.iter_mut().find(|x| x.highlight_id == a.highlight_id) {
            Some(existing) => *existing = a,
            None => list.push(a),
        }
        Self::write_json(&self.path_for("annotations", &annotation.url), &list)
    }

    pub fn delete_annotation_sync(&self, url: &str, highlight_id: &str) -> Result<bool> {
        let mut list = self.annotations_sync(url)?;
        let before = list.len();
        list.retain(|a| a.highlight_id != highlight_id);
        if list.len() == before {
            return Ok(false);
        }
        Self::write_json(&self.path_for("annotations", url), &list)?;
        Ok(true)
    }

    pub fn cached_analysis_sync(
        &self,
        url: &str,
        content_hash: &str,
        ttl_s: u64,
    ) -> Result<Option<CachedAnalysis>> {
        let entry: Option<CachedAnalysis> = Self::read_json(&self.path_for("analysis", url))?;
        Ok(entry.filter(|e| e.is_fresh(content_hash, now_epoch_s(), ttl_s)))
    }

    pub fn cache_analysis_sync(&self, entry: &CachedAnalysis) -> Result<()> {
        Self::write_json(&self.path_for("analysis", &entry.url), entry)
    }

    async fn blocking<T, F>(&self, what: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(FsStore) -> Result<T> + Send + 'static,
    {
        let me = self.clone();
        tokio::task::spawn_blocking(move || f(me))
            .await
            .map_err(|e| Error::Store(format!("{what} join failed: {e}")))?
    }
}

#[async_trait::async_trait]
impl AnnotationStore for FsStore {
    async fn load_config(&self) -> Result<Option<serde_json::Value>> {
        self.blocking("load_config", |s| s.load_config_sync()).await
    }

    async fn save_config(&self, config: &serde_json::Value) -> Result<()> {
        let config = config.clone();
        self.blocking("save_config", move |s| s.save_config_sync(&config))
            .await
    }

    async fn annotations(&self, url: &str) -> Result<Vec<SavedAnnotation>> {
        let url = url.to_string();
        self.blocking("annotations", move |s| s.annotations_sync(&url))
            .await
    }

    async fn save_annotation(&self, annotation: &SavedAnnotation) -> Result<()> {
        let a = annotation.clone();
        self.blocking("save_annotation", move |s| s.save_annotation_sync(&a))
            .await
    }

    async fn delete_annotation(&self, url: &str, highlight_id: &str) -> Result<bool> {
        let (url, id) = (url.to_string(), highlight_id.to_string());
        self.blocking("delete_annotation", move |s| s.delete_annotation_sync(&url, &id))
            .await
    }

    async fn cached_analysis(
        &self,
        url: &str,
        content_hash: &str,
        ttl_s: u64,
    ) -> Result<Option<CachedAnalysis>> {
        let (url, hash) = (url.to_string(), content_hash.to_string());
        self.blocking("cached_analysis", move |s| {
            s.cached_analysis_sync(&url, &hash, ttl_s)
        })
        .await
    }

    async fn cache_analysis(&self, entry: &CachedAnalysis) -> Result<()> {
        let e = entry.clone();
        self.blocking("cache_analysis", move |s| s.cache_analysis_sync(&e))
            .await
    }
}

/// In-process store, for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    config: Option<serde_json::Value>,
    annotations: HashMap<String, Vec<SavedAnnotation>>,
    analysis: HashMap<String, CachedAnalysis>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut MemoryInner) -> T) -> Result<T> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))?;
        Ok(f(&mut g))
    }
}

#[async_trait::async_trait]
impl AnnotationStore for MemoryStore {
    async fn load_config(&self) -> Result<Option<serde_json::Value>> {
        self.with(|m| m.config.clone())
    }

    async fn save_config(&self, config: &serde_json::Value) -> Result<()> {
        self.with(|m| m.config = Some(config.clone()))
    }

    async fn annotations(&self, url: &str) -> Result<Vec<SavedAnnotation>> {
        self.with(|m| m.annotations.get(url).cloned().unwrap_or_default())
    }

    async fn save_annotation(&self, annotation: &SavedAnnotation) -> Result<()> {
        let mut a = annotation.clone();
        a.text = snippet(&a.text);
        self.with(|m| {
            let list = m.annotations.entry(a.url.clone()).or_default();
            match list.iter_mut().find(|x| x.highlight_id == a.highlight_id) {
                Some(existing) => *existing = a,
                None => list.push(a),
            }
        })
    }

    async fn delete_annotation(&self, url: &str, highlight_id: &str) -> Result<bool> {
        self.with(|m| {
            let Some(list) = m.annotations.get_mut(url) else {
                return false;
            };
            let before = list.len();
            list.retain(|a| a.highlight_id != highlight_id);
            list.len() != before
        })
    }

    async fn cached_analysis(
        &self,
        url: &str,
        content_hash: &str,
        ttl_s: u64,
    ) -> Result<Option<CachedAnalysis>> {
        let now = now_epoch_s();
        self.with(|m| {
            m.analysis
                .get(url)
                .filter(|e| e.is_fresh(content_hash, now, ttl_s))
                .cloned()
        })
    }

    async fn cache_analysis(&self, entry: &CachedAnalysis) -> Result<()> {
        self.with(|m| {
            m.analysis.insert(entry.url.clone(), entry.clone());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aporia_core::{Highlight, TextAnchor};

    fn annotation(id: &str, text: &str) -> SavedAnnotation {
        SavedAnnotation {
            highlight_id: id.to_string(),
            url: "https://example.com/post".to_string(),
            start: 10,
            end: 10 + text.chars().count(),
            text: text.to_string(),
            note: None,
            created_at_epoch_s: now_epoch_s(),
            anchor: TextAnchor {
                exact: text.to_string(),
                prefix: "before ".to_string(),
                suffix: " after".to_string(),
                start: 10,
                end: 10 + text.chars().count(),
            },
        }
    }

    fn cached(hash: &str, created: u64) -> CachedAnalysis {
        CachedAnalysis {
            url: "https://example.com/post".to_string(),
            content_hash: hash.to_string(),
            created_at_epoch_s: created,
            highlights: vec![Highlight {
                start: 120,
                end: 180,
                reason: "r".to_string(),
                question: "q".to_string(),
                explanation: "e".to_string(),
            }],
        }
    }

    async fn exercise(store: &dyn AnnotationStore) {
        let url = "https://example.com/post";
        assert!(store.load_config().await.unwrap().is_none());
        store
            .save_config(&serde_json::json!({"model": "m"}))
            .await
            .unwrap();
        assert_eq!(store.load_config().await.unwrap().unwrap()["model"], "m");

        assert!(store.annotations(url).await.unwrap().is_empty());
        store.save_annotation(&annotation("a", "first")).await.unwrap();
        store.save_annotation(&annotation("b", "second")).await.unwrap();
        let mut edited = annotation("a", "first");
        edited.note = Some("my note".to_string());
        store.save_annotation(&edited).await.unwrap();
        let list = store.annotations(url).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].note.as_deref(), Some("my note"));

        assert!(store.delete_annotation(url, "b").await.unwrap());
        assert!(!store.delete_annotation(url, "b").await.unwrap());
        assert_eq!(store.annotations(url).await.unwrap().len(), 1);

        let long = "x".repeat(1_000);
        store.save_annotation(&annotation("long", &long)).await.unwrap();
        let list = store.annotations(url).await.unwrap();
        let saved = list.iter().find(|a| a.highlight_id == "long").unwrap();
        assert_eq!(saved.text.chars().count(), MAX_SNIPPET_CHARS);

        let now = now_epoch_s();
        store.cache_analysis(&cached("h1", now)).await.unwrap();
        assert!(store.cached_analysis(url, "h1", 86_400).await.unwrap().is_some());
        assert!(store.cached_analysis(url, "h2", 86_400).await.unwrap().is_none());
        store.cache_analysis(&cached("h1", now - 90_000)).await.unwrap();
        assert!(store.cached_analysis(url, "h1", 86_400).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fs_store_round_trips_and_expires() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsStore::new(tmp.path().to_path_buf());
        exercise(&store).await;

        let key = FsStore::key_for_url("https://example.com/post");
        let p = tmp
            .path()
            .join("annotations")
            .join(&key[0..2])
            .join(&key[2..4])
            .join(format!("{key}.json"));
        assert!(p.exists());
    }

    #[tokio::test]
    async fn memory_store_matches_fs_semantics() {
        exercise(&MemoryStore::new()).await;
    }

    #[test]
    fn content_hash_is_stable_hex() {
        let h = content_hash("hello");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash("hello"));
        assert_ne!(h, content_hash("hello "));
    }

    #[test]
    fn corrupt_files_surface_store_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsStore::new(tmp.path().to_path_buf());
        std::fs::write(tmp.path().join("config.json"), b"{not json").unwrap();
        assert!(matches!(store.load_config_sync(), Err(Error::Store(_))));
    }
}
