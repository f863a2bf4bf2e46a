//! Configuration for finding the engine library
//!
//! ```
//!     use oberon_ffi::config::LoaderConfig;
//!
//!     let config = LoaderConfig::from_json(r#"{ "search_dirs": ["/opt/oberon/lib"] }"#).unwrap();
//!     assert_eq!(config.library_name, "oberon");
//! ```

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Path of the engine library file, used before any search
pub const LIBRARY_PATH_VAR: &str = "OBERON_LIBRARY_PATH";
/// Extra directories to search, in the platform's path list format
pub const LIBRARY_DIRS_VAR: &str = "OBERON_LIBRARY_DIRS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Name without platform prefix or extension
    pub library_name: String,
    pub library_path: Option<PathBuf>,
    pub search_dirs: Vec<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            library_name: String::from("oberon"),
            library_path: None,
            search_dirs: Vec::new(),
        }
    }
}

impl LoaderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var_os(key))
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let library_path = lookup(LIBRARY_PATH_VAR)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        let search_dirs = lookup(LIBRARY_DIRS_VAR)
            .map(|dirs| {
                env::split_paths(&dirs)
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            library_path,
            search_dirs,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
