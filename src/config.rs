//! Archive opening configuration
//!
//! Only RAR archives consult the configuration: it decides whether the UnRAR
//! fallback may take over when the primary RAR decoder fails, and which
//! engine to use.

use crate::error::{ArchiveError, Result};
use crate::fallback::{self, unrar_dll::LIBRARY_ENV, UnrarEngine};
use std::path::PathBuf;
use std::sync::Arc;

/// Set to any non-empty value other than `0` to disable the RAR fallback.
pub const NO_FALLBACK_ENV: &str = "POLYARCHIVE_NO_RAR_FALLBACK";

/// Configuration for opening archives
#[derive(Clone)]
pub struct ArchiveConfig {
    /// Try the UnRAR engine when the primary RAR decoder cannot parse an archive
    pub rar_fallback: bool,

    /// UnRAR library to load instead of searching for one
    pub unrar_library: Option<PathBuf>,

    /// Engine to use instead of the system library
    pub unrar_engine: Option<Arc<dyn UnrarEngine>>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            rar_fallback: true,
            unrar_library: None,
            unrar_engine: None,
        }
    }
}

impl std::fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("rar_fallback", &self.rar_fallback)
            .field("unrar_library", &self.unrar_library)
            .field(
                "unrar_engine",
                &self.unrar_engine.as_ref().map(|e| format!("version {}", e.version())),
            )
            .finish()
    }
}

impl ArchiveConfig {
    /// Defaults overridden by `UNRAR_LIB_PATH` and `POLYARCHIVE_NO_RAR_FALLBACK`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = std::env::var_os(LIBRARY_ENV).filter(|p| !p.is_empty()) {
            config.unrar_library = Some(PathBuf::from(path));
        }
        if let Ok(value) = std::env::var(NO_FALLBACK_ENV) {
            config.rar_fallback = value.is_empty() || value == "0";
        }
        config
    }

    pub fn with_unrar_engine(mut self, engine: Arc<dyn UnrarEngine>) -> Self {
        self.unrar_engine = Some(engine);
        self
    }

    pub fn with_unrar_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.unrar_library = Some(path.into());
        self
    }

    pub fn without_rar_fallback(mut self) -> Self {
        self.rar_fallback = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if let Some(path) = &self.unrar_library {
            if !path.is_file() {
                return Err(ConfigError::UnrarLibraryNotFound(path.clone()));
            }
        }
        Ok(())
    }

    /// The engine the fallback should use: the injected one, else the
    /// process-wide system library.
    pub(crate) fn resolve_unrar_engine(&self) -> Result<Arc<dyn UnrarEngine>> {
        if !self.rar_fallback {
            return Err(ArchiveError::FallbackUnavailable(
                "RAR fallback is disabled".to_string(),
            ));
        }
        if let Some(engine) = &self.unrar_engine {
            return Ok(Arc::clone(engine));
        }
        fallback::system_engine(self.unrar_library.as_deref()).ok_or_else(|| {
            ArchiveError::FallbackUnavailable("no UnRAR library could be loaded".to_string())
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("UnRAR library not found: {0}")]
    UnrarLibraryNotFound(PathBuf),
}
