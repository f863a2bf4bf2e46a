//! Where to look for the engine library

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::LoaderConfig;

/// Strategy producing the paths to try, in order, for a library name
pub trait LibraryLocator: Send + Sync {
    fn candidates(&self, name: &str) -> Vec<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn file_name(self, name: &str) -> String {
        match self {
            Platform::Unix => format!("lib{}.so", name),
            Platform::MacOs => format!("lib{}.dylib", name),
            Platform::Windows => format!("{}.dll", name),
        }
    }

    /// Environment variables holding extra library directories
    pub fn search_vars(self) -> &'static [&'static str] {
        match self {
            Platform::Unix => &["LD_LIBRARY_PATH"],
            Platform::MacOs => &["DYLD_LIBRARY_PATH", "DYLD_FALLBACK_LIBRARY_PATH"],
            Platform::Windows => &["PATH"],
        }
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<OsString> + Send + Sync>;

/// Looks for the library
///
/// 1. at the configured path,
/// 2. in the configured search directories,
/// 3. next to the running executable,
/// 4. by bare file name, leaving it to the platform loader,
/// 5. in every directory listed by the platform's library path variables.
pub struct DefaultLocator {
    platform: Platform,
    library_path: Option<PathBuf>,
    search_dirs: Vec<PathBuf>,
    host_dir: Option<PathBuf>,
    env: EnvLookup,
}

impl DefaultLocator {
    pub fn new(config: &LoaderConfig) -> Self {
        let host_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        Self {
            platform: Platform::current(),
            library_path: config.library_path.clone(),
            search_dirs: config.search_dirs.clone(),
            host_dir,
            env: Box::new(|key| env::var_os(key)),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_host_dir(mut self, host_dir: Option<PathBuf>) -> Self {
        self.host_dir = host_dir;
        self
    }

    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }
}

impl LibraryLocator for DefaultLocator {
    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let file_name = self.platform.file_name(name);
        let mut candidates: Vec<PathBuf> = Vec::new();

        candidates.extend(self.library_path.iter().cloned());
        candidates.extend(self.search_dirs.iter().map(|dir| dir.join(&file_name)));
        candidates.extend(self.host_dir.iter().map(|dir| dir.join(&file_name)));
        candidates.push(PathBuf::from(&file_name));

        for var in self.platform.search_vars() {
            if let Some(value) = (self.env)(var) {
                candidates.extend(
                    env::split_paths(&value)
                        .filter(|dir| !dir.as_os_str().is_empty())
                        .map(|dir| dir.join(&file_name)),
                );
            }
        }

        let mut seen = Vec::with_capacity(candidates.len());
        candidates.retain(|path| {
            if seen.contains(path) {
                false
            } else {
                seen.push(path.clone());
                true
            }
        });
        candidates
    }
}
