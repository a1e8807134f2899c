//! Lanfeed Configuration
//!
//! Configuration is layered with `figment`: built-in defaults, then a TOML
//! file, then `LANFEED_`-prefixed environment variables (`__` separates
//! nesting levels, so `LANFEED_CACHE__MAX_SIZE_MB=200` sets
//! `cache.max_size_mb`).
//!
//! ```toml
//! [cache]
//! max_size_mb = 500
//!
//! [network]
//! mount_root = "/mnt/smb"
//!
//! [[sources]]
//! id = "den"
//! host = "nas.local"
//! path = "media/Photos"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use lanfeed_cache::CacheSettings;
use lanfeed_library::NetworkSource;
use lanfeed_smb::{Credentials, ServerEndpoint, Timeouts, split_share};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "lanfeed.toml";
pub const ENV_PREFIX: &str = "LANFEED_";
const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub network: NetworkConfig,
    pub sources: Vec<SourceConfig>,
}
impl Config {
    /// Load from `file` (or the platform config file when `None`) and the
    /// environment, then validate.
    ///
    /// An explicitly given file must exist; the platform file is optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::MissingFile(path.display().to_string())),
            Some(path) => Some(path.to_path_buf()),
            None => default_config_file(),
        };
        Self::from_figment(Self::figment(file.as_deref()))
    }

    /// The layered provider chain, without extracting anything.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "reading configuration file");
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.max_size_mb == 0 {
            exn::bail!(ErrorKind::Invalid("cache.max_size_mb must be greater than zero".into()));
        }
        self.network.validate()?;
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                exn::bail!(ErrorKind::Invalid(format!("duplicate source id `{}`", source.id)));
            }
            source.network_source()?;
        }
        Ok(())
    }

    /// The configured source with the given id.
    pub fn source(&self, id: &str) -> Result<NetworkSource> {
        self.sources
            .iter()
            .find(|source| source.id == id)
            .ok_or_raise(|| ErrorKind::UnknownSource(id.to_string()))?
            .network_source()
    }
}

/// Platform configuration file, e.g. `~/.config/lanfeed/lanfeed.toml`.
pub fn default_config_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "lanfeed")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Parent of the `smb_cache` directory. Defaults to the platform cache
    /// directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub max_size_mb: u64,
    pub min_free_mb: u64,
    pub max_age_hours: u64,
}
impl Default for CacheConfig {
    fn default() -> Self {
        let defaults = CacheSettings::default();
        Self {
            dir: None,
            max_size_mb: defaults.max_bytes / MIB,
            min_free_mb: defaults.min_free_bytes / MIB,
            max_age_hours: defaults.max_age.as_secs() / 3600,
        }
    }
}
impl CacheConfig {
    pub fn settings(&self) -> CacheSettings {
        CacheSettings {
            max_bytes: self.max_size_mb.saturating_mul(MIB),
            min_free_bytes: self.min_free_mb.saturating_mul(MIB),
            max_age: Duration::from_secs(self.max_age_hours.saturating_mul(3600)),
        }
    }

    pub fn location(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => project_dirs().map(|dirs| dirs.cache_dir().to_path_buf()).ok_or_raise(|| ErrorKind::NoCacheDir),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Where shares are mounted, laid out as `<mount_root>/<host>/<share>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_root: Option<PathBuf>,
    pub connect_timeout_ms: u64,
    pub response_timeout_ms: u64,
    pub idle_timeout_ms: u64,
}
impl Default for NetworkConfig {
    fn default() -> Self {
        let defaults = Timeouts::default();
        Self {
            mount_root: None,
            connect_timeout_ms: millis(defaults.connect),
            response_timeout_ms: millis(defaults.response),
            idle_timeout_ms: millis(defaults.idle),
        }
    }
}
impl NetworkConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            response: Duration::from_millis(self.response_timeout_ms),
            idle: Duration::from_millis(self.idle_timeout_ms),
        }
    }

    fn validate(&self) -> Result<()> {
        let timeouts = [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("response_timeout_ms", self.response_timeout_ms),
            ("idle_timeout_ms", self.idle_timeout_ms),
        ];
        match timeouts.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => exn::bail!(ErrorKind::Invalid(format!("network.{name} must be greater than zero"))),
            None => Ok(()),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub host: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    /// `share` or `share/folder`.
    pub path: String,
    #[serde(default = "default_include_subfolders")]
    pub include_subfolders: bool,
}
impl SourceConfig {
    pub fn endpoint(&self) -> Result<ServerEndpoint> {
        let credentials =
            Credentials::new(self.domain.as_deref(), self.username.as_deref(), self.password.as_deref());
        let endpoint = ServerEndpoint::new(&self.host)
            .or_raise(|| ErrorKind::Invalid(format!("source `{}` has an invalid host", self.id)))?;
        Ok(endpoint.with_credentials(credentials))
    }

    pub fn network_source(&self) -> Result<NetworkSource> {
        if self.id.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("source id must not be empty".into()));
        }
        if split_share(&self.path).is_none() {
            exn::bail!(ErrorKind::Invalid(format!("source `{}` does not name a share", self.id)));
        }
        Ok(NetworkSource {
            id: self.id.clone(),
            endpoint: self.endpoint()?,
            path: self.path.clone(),
            include_subfolders: self.include_subfolders,
        })
    }
}
impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("include_subfolders", &self.include_subfolders)
            .finish()
    }
}

fn default_include_subfolders() -> bool {
    true
}
