//! Application settings
//!
//! Read from `<config dir>/config.toml` when present, then overridden by
//! `S3UPLOAD_*` environment variables (for example `S3UPLOAD_DEFAULT_BUCKET`).

use crate::utils::{get_config_dir, PROJECT_NAME};
use color_eyre::eyre;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bucket used when an upload command does not name one
    pub default_bucket: Option<String>,
    /// Prefix prepended to every object key
    pub key_prefix: Option<String>,
    /// Explicit credentials file instead of the `creds` data folder
    pub creds_file: Option<PathBuf>,
    /// Credentials profile to use instead of the selected one
    pub profile: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration directory
    pub fn load() -> eyre::Result<Self> {
        Self::load_from(&get_config_dir().join("config.toml"))
    }

    /// Load settings from the given file (optional) layered with the environment
    pub fn load_from(path: &Path) -> eyre::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.to_path_buf()).required(false))
            .add_source(::config::Environment::with_prefix(PROJECT_NAME.as_str()))
            .build()?
            .try_deserialize::<Settings>()?;
        tracing::debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings.key_prefix, None);
        assert_eq!(settings.profile, None);
    }

    #[test]
    fn test_values_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "key_prefix = \"uploads/\"\nprofile = \"work\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.key_prefix.as_deref(), Some("uploads/"));
        assert_eq!(settings.profile.as_deref(), Some("work"));
    }
}
