//! Scaleway CLI configuration file (`~/.config/scw/config.yaml`)

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// One set of keys, either the top level of the file or a named profile
#[derive(Clone, Default, Deserialize)]
pub struct Profile {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub api_url: Option<String>,
    pub default_organization_id: Option<String>,
    pub default_project_id: Option<String>,
    pub default_region: Option<String>,
    pub default_zone: Option<String>,
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| crate::REDACTED))
            .field("api_url", &self.api_url)
            .field("default_organization_id", &self.default_organization_id)
            .field("default_project_id", &self.default_project_id)
            .field("default_region", &self.default_region)
            .field("default_zone", &self.default_zone)
            .finish()
    }
}

impl Profile {
    /// Keys of `other` win over ours
    fn overlay(&self, other: &Profile) -> Profile {
        fn pick(a: &Option<String>, b: &Option<String>) -> Option<String> {
            b.clone().or_else(|| a.clone())
        }
        Profile {
            access_key: pick(&self.access_key, &other.access_key),
            secret_key: pick(&self.secret_key, &other.secret_key),
            api_url: pick(&self.api_url, &other.api_url),
            default_organization_id: pick(
                &self.default_organization_id,
                &other.default_organization_id,
            ),
            default_project_id: pick(&self.default_project_id, &other.default_project_id),
            default_region: pick(&self.default_region, &other.default_region),
            default_zone: pick(&self.default_zone, &other.default_zone),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub base: Profile,
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl ConfigFile {
    /// Load the file at `path`; a missing file is an empty configuration
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no Scaleway config file");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: ConfigFile =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        tracing::debug!(
            path = %path.display(),
            profiles = file.profiles.len(),
            "loaded Scaleway config file"
        );
        Ok(file)
    }

    /// Top-level keys overlaid by the named profile
    ///
    /// `default` is always resolvable; any other name must exist.
    pub fn resolve(&self, name: &str) -> Result<Profile> {
        match self.profiles.get(name) {
            Some(profile) => Ok(self.base.overlay(profile)),
            None if name == crate::DEFAULT_PROFILE => Ok(self.base.clone()),
            None => Err(ConfigError::ProfileNotFound(name.to_string())),
        }
    }
}

/// `SCW_CONFIG_PATH`, else `<config_dir>/scw/config.yaml`
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = crate::env(crate::ENV_CONFIG_PATH) {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir().ok_or(ConfigError::ConfigDirNotFound)?;
    Ok(dir.join("scw").join("config.yaml"))
}
