//! Layered configuration loading.
//!
//! Sources, lowest precedence first:
//!
//! 1. [`ChaskisConfig::default`]
//! 2. values passed to [`ConfigLoader::merge`]
//! 3. the base file, `chaskis.toml` or `config.toml` (YAML with `yaml-config`)
//! 4. its profile variant, e.g. `chaskis.production.toml`
//! 5. `CHASKIS_*` environment variables, `__` between sections:
//!    `CHASKIS_IRC__SERVER=irc.libera.chat`, `CHASKIS_ENGINE__WATCHDOG_ENABLED=false`
//!
//! Without explicit search paths the current directory is searched first,
//! then `<user config dir>/chaskis`.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .file("/etc/chaskis/chaskis.toml")
//!     .profile("prod")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::ChaskisConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "CHASKIS_";

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "CHASKIS_PROFILE";

/// Directory under the user config dir that is searched.
const USER_CONFIG_SUBDIR: &str = "chaskis";

/// Deployment profile. Selects `chaskis.{profile}.toml` next to the base file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `dev` and `prod` are accepted as aliases.
    pub fn parse(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "development" | "dev" => Self::Development,
            "production" | "prod" => Self::Production,
            _ => Self::Custom(name),
        }
    }

    /// Reads `CHASKIS_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }

    /// `dir/chaskis.toml` becomes `dir/chaskis.{profile}.toml`.
    fn variant_of(&self, base: &Path) -> Option<PathBuf> {
        let stem = base.file_stem()?.to_str()?;
        let ext = base.extension()?.to_str()?;
        Some(base.with_file_name(format!("{stem}.{}.{ext}", self.as_str())))
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File formats compiled in through features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    const ENABLED: &'static [FileFormat] = &[
        #[cfg(feature = "toml-config")]
        FileFormat::Toml,
        #[cfg(feature = "yaml-config")]
        FileFormat::Yaml,
    ];

    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ENABLED
            .iter()
            .copied()
            .find(|format| format.extensions().contains(&ext))
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    /// File names searched for, in priority order.
    fn base_names(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["chaskis.toml", "config.toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["chaskis.yaml", "chaskis.yml", "config.yaml", "config.yml"],
        }
    }

    fn merge_into(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(Yaml::file(path)),
        }
    }
}

/// Layered configuration loader.
///
/// Layers, lowest first: defaults, [`merge`](Self::merge)d values, the
/// config file, its profile variant, then `CHASKIS_*` variables.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    explicit_file: Option<PathBuf>,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with the profile taken from `CHASKIS_PROFILE`.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            explicit_file: None,
            use_env: true,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search. Replaces the default locations.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/chaskis` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join(USER_CONFIG_SUBDIR)),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.explicit_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables `CHASKIS_*` overrides. On by default.
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Merges a programmatic configuration below the file layers.
    pub fn merge(mut self, config: ChaskisConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads, layers and extracts the configuration.
    pub fn load(self) -> ConfigResult<ChaskisConfig> {
        let profile = self.profile.clone();
        let config: ChaskisConfig = self
            .figment()?
            .extract()
            .map_err(|e| ConfigError::ParseError(format!("Invalid configuration: {e}")))?;

        debug!(
            profile = %profile,
            server = %config.irc.server,
            nick = %config.irc.nick,
            channels = config.irc.channels.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(self) -> ConfigResult<Figment> {
        let mut figment =
            Figment::from(Serialized::defaults(ChaskisConfig::default())).merge(self.overrides.clone());

        let base = match &self.explicit_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.clone()));
                }
                let format = FileFormat::of(path).ok_or_else(|| {
                    ConfigError::ParseError(format!(
                        "Unsupported or disabled configuration format: {}",
                        path.display()
                    ))
                })?;
                Some((format, path.clone()))
            }
            None => self.find_base_file(),
        };

        match base {
            Some((format, path)) => {
                info!(path = %path.display(), "Loading configuration file");
                figment = format.merge_into(figment, &path);
                if let Some(variant) = self.profile.variant_of(&path)
                    && variant.exists()
                {
                    debug!(path = %variant.display(), profile = %self.profile, "Loading profile config");
                    figment = format.merge_into(figment, &variant);
                }
            }
            None => warn!(paths = ?self.directories(), "No configuration file found, using defaults"),
        }

        if self.use_env {
            trace!(prefix = ENV_PREFIX, "Applying environment overrides");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment)
    }

    /// Explicit search paths, or the current directory then the user config dir.
    fn directories(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(USER_CONFIG_SUBDIR)))
            .collect()
    }

    /// First existing base file, directory by directory.
    fn find_base_file(&self) -> Option<(FileFormat, PathBuf)> {
        self.directories().into_iter().find_map(|dir| {
            FileFormat::ENABLED.iter().find_map(|format| {
                format
                    .base_names()
                    .iter()
                    .map(|name| dir.join(name))
                    .find(|path| path.exists())
                    .map(|path| (*format, path))
            })
        })
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<ChaskisConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<ChaskisConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================
