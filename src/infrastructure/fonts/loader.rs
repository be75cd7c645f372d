//! Disk font loader

use ab_glyph::FontArc;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

use super::{normalize_family, BlockFace, FamilyStatus, FontHandle, FontKey, FontLoader, OutlineFace};
use crate::application::errors::RenderError;
use crate::infrastructure::config::FontConfig;

/// Reads font files from a fixed list of installation directories
pub struct DiskFontLoader {
    directories: Vec<PathBuf>,
    /// normalized family -> (display name, file name)
    families: HashMap<String, (String, String)>,
    builtin_fallback: bool,
}

impl DiskFontLoader {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            families: HashMap::new(),
            builtin_fallback: false,
        }
    }

    pub fn from_config(config: &FontConfig) -> Self {
        let mut loader = Self::new(config.directories.clone()).with_builtin_fallback(config.builtin_fallback);
        for (family, file) in &config.families {
            loader = loader.with_family(family, file);
        }
        loader
    }

    /// Map a family name to a font file name
    pub fn with_family(mut self, family: &str, file: impl Into<String>) -> Self {
        self.families
            .insert(normalize_family(family), (family.trim().to_string(), file.into()));
        self
    }

    pub fn with_builtin_fallback(mut self, enabled: bool) -> Self {
        self.builtin_fallback = enabled;
        self
    }

    /// File names tried for a family, configured mapping first
    fn candidates(&self, family: &str) -> Vec<String> {
        let mut names = Vec::new();
        if let Some((_, file)) = self.families.get(family) {
            names.push(file.clone());
        }

        // "liberation sans bold" -> LiberationSans-Bold.ttf, else -Regular.ttf
        let words: Vec<String> = family.split_whitespace().map(capitalize).collect();
        if let Some((last, base)) = words.split_last() {
            if !base.is_empty() && matches!(last.as_str(), "Bold" | "Italic" | "BoldItalic") {
                names.push(format!("{}-{}.ttf", base.concat(), last));
            }
        }
        names.push(format!("{}-Regular.ttf", words.concat()));
        names.dedup();
        names
    }

    /// First existing file for the family
    pub fn locate(&self, family: &str) -> Option<PathBuf> {
        let family = normalize_family(family);
        let candidates = self.candidates(&family);

        self.directories.iter().find_map(|dir| {
            candidates
                .iter()
                .map(|name| dir.join(name))
                .find(|path| path.is_file())
        })
    }

    fn display_name(&self, key: &FontKey) -> String {
        self.families
            .get(key.family())
            .map(|(display, _)| display.clone())
            .unwrap_or_else(|| key.family().to_string())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl FontLoader for DiskFontLoader {
    async fn load(&self, key: &FontKey) -> Result<FontHandle, RenderError> {
        let family = self.display_name(key);

        let Some(path) = self.locate(key.family()) else {
            if self.builtin_fallback {
                tracing::warn!("No font file for '{}', using built-in block face", family);
                return Ok(FontHandle::new(family, key.size(), None, BlockFace::new(key.size())));
            }
            return Err(RenderError::FontNotFound { family });
        };

        let data = tokio::fs::read(&path).await.map_err(|e| RenderError::InvalidFont {
            family: family.clone(),
            reason: format!("{}: {}", path.display(), e),
        })?;

        let font = FontArc::try_from_vec(data).map_err(|e| RenderError::InvalidFont {
            family: family.clone(),
            reason: format!("{}: {}", path.display(), e),
        })?;

        Ok(FontHandle::new(family, key.size(), Some(path), OutlineFace::new(font, key.size())))
    }

    fn catalog(&self) -> Vec<FamilyStatus> {
        let mut families: Vec<FamilyStatus> = self
            .families
            .iter()
            .map(|(normalized, (display, _))| FamilyStatus {
                family: display.clone(),
                path: self.locate(normalized),
            })
            .collect();
        families.sort_by(|a, b| a.family.cmp(&b.family));
        families
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fonts::TextMetrics;

    #[test]
    fn test_candidates() {
        let loader = DiskFontLoader::new(vec![]).with_family("Liberation Sans", "LiberationSans-Regular.ttf");

        assert_eq!(loader.candidates("liberation sans"), vec!["LiberationSans-Regular.ttf".to_string()]);
        assert_eq!(
            loader.candidates("liberation mono bold"),
            vec![
                "LiberationMono-Bold.ttf".to_string(),
                "LiberationMonoBold-Regular.ttf".to_string()
            ]
        );
    }

    #[test]
    fn test_locate_searches_directories_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("LiberationSans-Regular.ttf"), b"stub").unwrap();

        let loader = DiskFontLoader::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(
            loader.locate("Liberation Sans"),
            Some(second.path().join("LiberationSans-Regular.ttf"))
        );

        std::fs::write(first.path().join("LiberationSans-Regular.ttf"), b"stub").unwrap();
        assert_eq!(
            loader.locate("liberation  sans"),
            Some(first.path().join("LiberationSans-Regular.ttf"))
        );
    }

    #[tokio::test]
    async fn test_missing_font_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DiskFontLoader::new(vec![dir.path().to_path_buf()]);

        let key = FontKey::new("Liberation Sans", 24).unwrap();
        let err = loader.load(&key).await.unwrap_err();
        assert!(matches!(err, RenderError::FontNotFound { .. }));
    }

    #[tokio::test]
    async fn test_builtin_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DiskFontLoader::new(vec![dir.path().to_path_buf()])
            .with_family("Liberation Sans", "LiberationSans-Regular.ttf")
            .with_builtin_fallback(true);

        let key = FontKey::new("liberation sans", 20).unwrap();
        let handle = loader.load(&key).await.unwrap();
        assert_eq!(handle.family(), "Liberation Sans");
        assert!(handle.source().is_none());
        assert_eq!(handle.advance("ab"), 24.0);
    }

    #[tokio::test]
    async fn test_corrupt_font_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Broken-Regular.ttf"), b"not a font").unwrap();
        let loader = DiskFontLoader::new(vec![dir.path().to_path_buf()]);

        let key = FontKey::new("broken", 12).unwrap();
        let err = loader.load(&key).await.unwrap_err();
        assert!(matches!(err, RenderError::InvalidFont { .. }));
    }

    #[tokio::test]
    async fn test_installed_liberation_sans() {
        let loader = DiskFontLoader::from_config(&FontConfig::default());
        if loader.locate("Liberation Sans").is_none() {
            // fonts-liberation not installed on this machine
            return;
        }

        let key = FontKey::new("Liberation Sans", 24).unwrap();
        let handle = loader.load(&key).await.unwrap();
        assert!(handle.source().is_some());
        assert!(handle.advance("Hello") > 0.0);
        assert!(handle.advance("Hello world") > handle.advance("Hello"));
        assert!(handle.line_height() >= handle.ascent());
    }
}
