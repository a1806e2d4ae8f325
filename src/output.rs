//! Writing a pass's outputs to disk

use std::io;
use std::path::{Path, PathBuf};

use crate::engine::BuildOutput;

/// Error type for output operations
#[derive(Debug)]
pub enum OutputError {
    /// IO error during file operations
    Io(io::Error),
    /// A generated file name would escape the output directory
    InvalidName(String),
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputError::Io(e) => write!(f, "IO error: {}", e),
            OutputError::InvalidName(name) => write!(f, "Refusing to write '{}' outside the output directory", name),
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OutputError::Io(e) => Some(e),
            OutputError::InvalidName(_) => None,
        }
    }
}

impl From<io::Error> for OutputError {
    fn from(e: io::Error) -> Self {
        OutputError::Io(e)
    }
}

/// Path of a generated file inside `dir`.
///
/// Sprite names may contain directories (repeat-both sprites are named after
/// their source), but never `..` or an absolute root.
pub fn output_path(dir: &Path, name: &str) -> Result<PathBuf, OutputError> {
    let relative = Path::new(name);
    let escapes = relative.is_absolute()
        || relative.components().any(|c| !matches!(c, std::path::Component::Normal(_)));
    if name.is_empty() || escapes {
        return Err(OutputError::InvalidName(name.to_string()));
    }
    Ok(dir.join(relative))
}

/// Write one file, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents)?;
    Ok(())
}

/// Write the stylesheet, sprites, preload script and MHTML document of a pass.
///
/// Returns the written paths in that order.
pub fn write_build_output(dir: &Path, output: &BuildOutput) -> Result<Vec<PathBuf>, OutputError> {
    let mut written = Vec::new();

    let css_path = output_path(dir, &output.names.stylesheet())?;
    write_file(&css_path, output.css.as_bytes())?;
    written.push(css_path);

    for sprite in &output.sprites {
        let path = output_path(dir, &sprite.name)?;
        write_file(&path, &sprite.bytes)?;
        written.push(path);
    }

    let preload_path = output_path(dir, &output.names.preload())?;
    write_file(&preload_path, output.preload.as_bytes())?;
    written.push(preload_path);

    if let Some(mhtml) = &output.mhtml {
        let path = output_path(dir, &output.names.mhtml())?;
        write_file(&path, mhtml.as_bytes())?;
        written.push(path);
    }

    Ok(written)
}
