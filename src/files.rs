//! File store: decoded source images and stylesheet fragments, keyed by path.
//!
//! Registration is cheap: [`FileStore::add`] only records the path and its
//! modification time. The bytes are read and preprocessed on the first
//! [`FileStore::get`], and stay cached until the host calls
//! [`FileStore::update`] or [`FileStore::invalidate`]. Nothing here re-checks
//! timestamps on its own; [`FileStore::is_stale`] lets the host decide.

use image::RgbaImage;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;
use thiserror::Error;

use crate::codec::{CodecError, CodecRegistry};

/// Error during file store operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FileError {
    /// The path was never registered
    #[error("file not registered: {}", .0.display())]
    NotRegistered(PathBuf),
    /// Reading the file or its metadata failed
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A codec exists for the file but rejected its bytes
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
}

/// Preprocessed content of a source file.
#[derive(Debug)]
pub enum FileContent {
    /// A raster image; `pixels` is `None` when no codec handles its format
    Image { pixels: Option<RgbaImage> },
    /// A stylesheet fragment with its require directives removed
    Stylesheet { text: String, requires: Vec<String> },
    /// Anything else, kept as bytes only
    Raw,
}

/// A registered file after reading and preprocessing.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Modification time recorded at registration (`None` for in-memory content)
    pub mtime: Option<SystemTime>,
    /// Bytes exactly as read
    pub bytes: Vec<u8>,
    pub content: FileContent,
}

impl SourceFile {
    /// Decoded pixels, if this is a decodable image.
    pub fn pixels(&self) -> Option<&RgbaImage> {
        match &self.content {
            FileContent::Image { pixels } => pixels.as_ref(),
            _ => None,
        }
    }

    /// Stylesheet text with require directives stripped.
    pub fn stylesheet(&self) -> Option<&str> {
        match &self.content {
            FileContent::Stylesheet { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Paths named by require directives, in source order.
    pub fn requires(&self) -> &[String] {
        match &self.content {
            FileContent::Stylesheet { requires, .. } => requires,
            _ => &[],
        }
    }

    /// Path as a `/`-separated string, for extension checks.
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }
}

#[derive(Debug)]
struct Entry {
    mtime: Option<SystemTime>,
    /// In-memory content supplied at registration
    inline: Option<Arc<Vec<u8>>>,
    loaded: Option<Arc<SourceFile>>,
}

/// Engine-owned store of source files.
#[derive(Debug)]
pub struct FileStore {
    entries: HashMap<PathBuf, Entry>,
    codecs: CodecRegistry,
}

impl FileStore {
    /// Create an empty store that decodes images with `codecs`.
    pub fn new(codecs: CodecRegistry) -> Self {
        Self { entries: HashMap::new(), codecs }
    }

    /// The codec table this store decodes with.
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Register an on-disk file, recording its modification time.
    ///
    /// Registering a path twice keeps the first registration; use
    /// [`FileStore::update`] to pick up changes.
    pub fn add(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        if self.entries.contains_key(path) {
            return Ok(());
        }
        let mtime = read_mtime(path)?;
        self.entries
            .insert(path.to_path_buf(), Entry { mtime: Some(mtime), inline: None, loaded: None });
        log::info!("Added {}", path.display());
        Ok(())
    }

    /// Register in-memory content under `path`, replacing any previous entry.
    pub fn add_bytes(&mut self, path: impl AsRef<Path>, bytes: Vec<u8>) {
        let path = path.as_ref();
        log::info!("Added {} ({} bytes in memory)", path.display(), bytes.len());
        self.entries.insert(
            path.to_path_buf(),
            Entry { mtime: None, inline: Some(Arc::new(bytes)), loaded: None },
        );
    }

    /// Re-register a path: re-read its modification time and drop any decoded
    /// content. In-memory content is kept.
    pub fn update(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        let entry =
            self.entries.get_mut(path).ok_or_else(|| FileError::NotRegistered(path.to_path_buf()))?;
        if entry.inline.is_none() {
            entry.mtime = Some(read_mtime(path)?);
        }
        entry.loaded = None;
        log::info!("Updated {}", path.display());
        Ok(())
    }

    /// Drop decoded content for a path so the next `get` reads it again.
    pub fn invalidate(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        let entry =
            self.entries.get_mut(path).ok_or_else(|| FileError::NotRegistered(path.to_path_buf()))?;
        entry.loaded = None;
        Ok(())
    }

    /// Unregister a path.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        self.entries.remove(path).ok_or_else(|| FileError::NotRegistered(path.to_path_buf()))?;
        log::info!("Removed {}", path.display());
        Ok(())
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.entries.contains_key(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the file has been read and preprocessed since its last
    /// registration or invalidation.
    pub fn is_preprocessed(&self, path: impl AsRef<Path>) -> bool {
        self.entries.get(path.as_ref()).is_some_and(|e| e.loaded.is_some())
    }

    /// Whether the file on disk is newer than the recorded modification time.
    ///
    /// In-memory entries are never stale.
    pub fn is_stale(&self, path: impl AsRef<Path>) -> Result<bool, FileError> {
        let path = path.as_ref();
        let entry =
            self.entries.get(path).ok_or_else(|| FileError::NotRegistered(path.to_path_buf()))?;
        match entry.mtime {
            Some(recorded) => Ok(read_mtime(path)? > recorded),
            None => Ok(false),
        }
    }

    /// Get a file, reading and preprocessing it on first access.
    pub fn get(&mut self, path: impl AsRef<Path>) -> Result<Arc<SourceFile>, FileError> {
        let path = path.as_ref();
        let entry =
            self.entries.get(path).ok_or_else(|| FileError::NotRegistered(path.to_path_buf()))?;
        if let Some(loaded) = &entry.loaded {
            return Ok(Arc::clone(loaded));
        }

        let bytes = match &entry.inline {
            Some(inline) => inline.as_ref().clone(),
            None => fs::read(path)
                .map_err(|source| FileError::Io { path: path.to_path_buf(), source })?,
        };
        let file = Arc::new(preprocess(path, entry.mtime, bytes, &self.codecs)?);

        if let Some(entry) = self.entries.get_mut(path) {
            entry.loaded = Some(Arc::clone(&file));
        }
        Ok(file)
    }
}

fn read_mtime(path: &Path) -> Result<SystemTime, FileError> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|source| FileError::Io { path: path.to_path_buf(), source })
}

fn preprocess(
    path: &Path,
    mtime: Option<SystemTime>,
    bytes: Vec<u8>,
    codecs: &CodecRegistry,
) -> Result<SourceFile, FileError> {
    let path_str = path.to_string_lossy().replace('\\', "/");
    let content = if is_stylesheet(&path_str) {
        let (text, requires) = strip_requires(&String::from_utf8_lossy(&bytes));
        FileContent::Stylesheet { text, requires }
    } else if crate::codec::image_extension(&path_str).is_some() {
        let pixels = match codecs.for_path(&path_str) {
            Some(backend) => Some(
                backend
                    .decode(&bytes)
                    .map_err(|source| FileError::Decode { path: path.to_path_buf(), source })?,
            ),
            None => {
                log::debug!("No codec for {}; keeping raw bytes only", path.display());
                None
            }
        };
        FileContent::Image { pixels }
    } else {
        FileContent::Raw
    };

    Ok(SourceFile { path: path.to_path_buf(), mtime, bytes, content })
}

pub(crate) fn is_stylesheet(path: &str) -> bool {
    path.ends_with(".css") || path.ends_with(".scss")
}

static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:sc_)?require\(\s*['"]?([^'")]*?)['"]?\s*\);?"#)
        .expect("BUG: invalid REQUIRE_RE regex literal")
});

/// Remove `require(...)`/`sc_require(...)` directives, returning the cleaned
/// text and the required paths.
pub fn strip_requires(text: &str) -> (String, Vec<String>) {
    let mut requires = Vec::new();
    let cleaned = REQUIRE_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        requires.push(caps[1].to_string());
        ""
    });
    (cleaned.into_owned(), requires)
}
