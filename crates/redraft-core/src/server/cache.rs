//! Locates the llama.cpp model cache and checks for already-downloaded models.
//!
//! The readiness timeout budget depends on whether the model still has to be
//! downloaded, so the supervisor asks this module before spawning the server.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Suffix llama-server gives partially downloaded model files.
const IN_PROGRESS_SUFFIX: &str = ".gguf.downloadInProgress";

/// Resolves the llama.cpp cache directory for the current platform.
///
/// `LLAMA_CACHE` overrides everything. Otherwise the platform's standard
/// cache location is used, with a `llama.cpp` subdirectory appended:
/// `~/Library/Caches` on macOS, `%LOCALAPPDATA%` on Windows (an error if
/// unset), `$XDG_CACHE_HOME` or `~/.cache` elsewhere.
pub fn resolve_cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LLAMA_CACHE")
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    let base = if cfg!(target_os = "macos") {
        home_dir()?.join("Library").join("Caches")
    } else if cfg!(target_os = "windows") {
        let local = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA environment variable not set")?;
        PathBuf::from(local)
    } else {
        match std::env::var("XDG_CACHE_HOME") {
            Ok(cache_home) if !cache_home.is_empty() => PathBuf::from(cache_home),
            _ => home_dir()?.join(".cache"),
        }
    };

    Ok(base.join("llama.cpp"))
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Could not determine home directory")
}

/// Returns true if a completed download of `model` exists in `dir`.
///
/// llama-server flattens the repo id into a filename prefix by replacing
/// path separators with underscores (`unsloth/Qwen3-1.7B-GGUF` becomes
/// `unsloth_Qwen3-1.7B-GGUF...`). A matching entry that still carries the
/// in-progress suffix counts as not cached. A missing cache directory is
/// "not cached", not an error.
pub fn is_model_cached(model: &str, dir: &Path) -> Result<bool> {
    let prefix = model.replace(['/', '\\'], "_");

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to list cache dir {}", dir.display()));
        }
    };

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        if entry.file_type().is_ok_and(|ty| ty.is_dir()) {
            continue;
        }
        if name.starts_with(&prefix) {
            return Ok(!name.ends_with(IN_PROGRESS_SUFFIX));
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_cached_when_prefixed_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("unsloth_Qwen3-1.7B-GGUF_Qwen3-1.7B-Q4_K_M.gguf"),
            b"",
        )
        .unwrap();

        assert!(is_model_cached("unsloth/Qwen3-1.7B-GGUF", dir.path()).unwrap());
    }

    #[test]
    fn test_not_cached_when_download_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path()
                .join("unsloth_Qwen3-1.7B-GGUF_Qwen3-1.7B-Q4_K_M.gguf.downloadInProgress"),
            b"",
        )
        .unwrap();

        assert!(!is_model_cached("unsloth/Qwen3-1.7B-GGUF", dir.path()).unwrap());
    }

    #[test]
    fn test_not_cached_for_different_model() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("unsloth_gemma-3-1b-it-GGUF.gguf"), b"").unwrap();

        assert!(!is_model_cached("unsloth/Qwen3-1.7B-GGUF", dir.path()).unwrap());
    }

    #[test]
    fn test_directories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("unsloth_Qwen3-1.7B-GGUF")).unwrap();

        assert!(!is_model_cached("unsloth/Qwen3-1.7B-GGUF", dir.path()).unwrap());
    }

    #[test]
    fn test_missing_cache_dir_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        assert!(!is_model_cached("unsloth/Qwen3-1.7B-GGUF", &missing).unwrap());
    }
}
