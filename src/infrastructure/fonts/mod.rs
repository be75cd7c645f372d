//! Font store - shared cache of loaded typefaces
//!
//! Fonts are keyed by `(family, size)`. Concurrent resolves of a key that is
//! not cached yet share a single load, success or failure: every caller
//! waits on the same pending result instead of reading the font file again.
//! Only successful loads stay cached.

pub mod face;
pub mod loader;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use crate::application::errors::RenderError;

pub use face::{BlockFace, OutlineFace, TextMetrics, Typeface};
pub use loader::DiskFontLoader;

/// Cache key: normalized family name plus size in points
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey {
    family: String,
    size: u32,
}

impl FontKey {
    pub fn new(family: &str, size: u32) -> Result<Self, RenderError> {
        let family = normalize_family(family);
        if family.is_empty() {
            return Err(RenderError::InvalidRequest("font family is empty".to_string()));
        }
        if size == 0 {
            return Err(RenderError::InvalidRequest("font size must be positive".to_string()));
        }
        Ok(Self { family, size })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

impl fmt::Display for FontKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}pt", self.family, self.size)
    }
}

/// Lowercase, trimmed, single-spaced
pub(crate) fn normalize_family(family: &str) -> String {
    family
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

struct LoadedFont {
    family: String,
    size: u32,
    source: Option<PathBuf>,
    face: Box<dyn Typeface>,
}

/// Shared, read-only reference to a loaded typeface
#[derive(Clone)]
pub struct FontHandle {
    inner: Arc<LoadedFont>,
}

impl FontHandle {
    pub fn new(family: impl Into<String>, size: u32, source: Option<PathBuf>, face: impl Typeface + 'static) -> Self {
        Self {
            inner: Arc::new(LoadedFont {
                family: family.into(),
                size,
                source,
                face: Box::new(face),
            }),
        }
    }

    pub fn family(&self) -> &str {
        &self.inner.family
    }

    pub fn size(&self) -> u32 {
        self.inner.size
    }

    /// Font file the face was read from; `None` for the built-in face
    pub fn source(&self) -> Option<&Path> {
        self.inner.source.as_deref()
    }

    /// Whether both handles point at the same cached font
    pub fn same_instance(&self, other: &FontHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontHandle")
            .field("family", &self.inner.family)
            .field("size", &self.inner.size)
            .field("source", &self.inner.source)
            .finish()
    }
}

impl TextMetrics for FontHandle {
    fn advance(&self, text: &str) -> f32 {
        self.inner.face.advance(text)
    }

    fn ascent(&self) -> f32 {
        self.inner.face.ascent()
    }

    fn line_height(&self) -> f32 {
        self.inner.face.line_height()
    }
}

impl Typeface for FontHandle {
    fn draw_line(&self, canvas: &mut image::RgbaImage, origin_x: f32, baseline_y: f32, text: &str, color: image::Rgba<u8>) {
        self.inner.face.draw_line(canvas, origin_x, baseline_y, text, color)
    }
}

/// A configured family and the file it resolves to, if installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyStatus {
    pub family: String,
    pub path: Option<PathBuf>,
}

/// Loads a font for a cache miss
#[async_trait]
pub trait FontLoader: Send + Sync {
    async fn load(&self, key: &FontKey) -> Result<FontHandle, RenderError>;

    /// Families this loader knows about
    fn catalog(&self) -> Vec<FamilyStatus> {
        Vec::new()
    }
}

type LoadResult = Result<FontHandle, RenderError>;

enum Slot {
    Ready(FontHandle),
    /// A load is running; the result is published once
    Loading(watch::Receiver<Option<LoadResult>>),
}

type Cache = Arc<Mutex<HashMap<FontKey, Slot>>>;

/// Process-wide font cache
pub struct FontStore {
    loader: Arc<dyn FontLoader>,
    cache: Cache,
}

impl FontStore {
    pub fn new(loader: impl FontLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached font for `(family, size)`, loading it on first use.
    ///
    /// Callers that arrive while a load is running get that load's result,
    /// failures included. A failed key is forgotten so the next call retries.
    pub async fn resolve(&self, family: &str, size: u32) -> Result<FontHandle, RenderError> {
        let key = FontKey::new(family, size)?;

        let mut pending = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            match cache.get(&key) {
                Some(Slot::Ready(handle)) => return Ok(handle.clone()),
                Some(Slot::Loading(pending)) => pending.clone(),
                None => {
                    let pending = self.start_load(key.clone());
                    cache.insert(key.clone(), Slot::Loading(pending.clone()));
                    pending
                }
            }
        };

        let published = pending.wait_for(Option::is_some).await;
        match published.as_deref() {
            Ok(Some(result)) => result.clone(),
            _ => Err(RenderError::Worker(format!("loading font {} was aborted", key))),
        }
    }

    /// Run the load on its own task so it finishes even if every caller goes away
    fn start_load(&self, key: FontKey) -> watch::Receiver<Option<LoadResult>> {
        let (publish, pending) = watch::channel(None);
        let loader = self.loader.clone();
        let cache = self.cache.clone();

        tokio::spawn(async move {
            tracing::debug!("Loading font {}", key);
            let load = {
                let key = key.clone();
                tokio::spawn(async move { loader.load(&key).await })
            };
            let result = match load.await {
                Ok(result) => result,
                Err(e) => Err(RenderError::Worker(format!("font loader failed: {}", e))),
            };

            {
                let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
                match &result {
                    Ok(handle) => {
                        tracing::info!(
                            "Loaded font {} from {}",
                            key,
                            handle
                                .source()
                                .map(|p| p.display().to_string())
                                .unwrap_or_else(|| "built-in face".to_string())
                        );
                        cache.insert(key, Slot::Ready(handle.clone()));
                    }
                    Err(e) => {
                        tracing::debug!("Font {} failed to load: {}", key, e);
                        cache.remove(&key);
                    }
                }
            }

            let _ = publish.send(Some(result));
        });

        pending
    }

    /// Fonts loaded so far, ordered by key
    pub fn cached(&self) -> Vec<FontHandle> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let mut loaded: Vec<(&FontKey, FontHandle)> = cache
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Ready(handle) => Some((key, handle.clone())),
                Slot::Loading(_) => None,
            })
            .collect();
        loaded.sort_by(|a, b| a.0.cmp(b.0));
        loaded.into_iter().map(|(_, h)| h).collect()
    }

    /// Keys held by the cache, loaded or still loading
    pub fn entry_count(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn catalog(&self) -> Vec<FamilyStatus> {
        self.loader.catalog()
    }
}
