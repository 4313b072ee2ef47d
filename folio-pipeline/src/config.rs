//! Service configuration, read from `folio.toml`.
//!
//! ```toml
//! [localization]
//! default-locale = "en"
//! locales = ["en", "de"]
//! fallback = true
//!
//! [query]
//! default-depth = 1
//! max-depth = 5
//! default-limit = 10
//! max-limit = 100
//! ```

use crate::error::{PipelineError, PipelineResult};
use folio_types::{Locale, parse_locale};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Settings shared by every pipeline of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub default_locale: Locale,
    /// Accepted locales. Empty accepts any well-formed locale.
    pub locales: Vec<Locale>,
    /// Read the default locale when a document has no data in the requested one.
    pub locale_fallback: bool,
    pub default_depth: usize,
    pub max_depth: usize,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_locale: Locale::new(default_locale()),
            locales: Vec::new(),
            locale_fallback: true,
            default_depth: default_depth(),
            max_depth: default_max_depth(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from `path`.
    ///
    /// A missing file yields the defaults. So does an unreadable or malformed
    /// one, with a warning.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded service config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<ConfigFile>(contents).map(ConfigFile::into_config)
    }

    /// Picks the locale of a request: the requested one, else the default.
    pub fn resolve_locale(&self, requested: Option<&str>) -> PipelineResult<Locale> {
        let Some(code) = requested else {
            return Ok(self.default_locale.clone());
        };
        let locale =
            parse_locale(code).map_err(|e| PipelineError::field("locale", e.to_string()))?;
        if !self.locales.is_empty() && !self.locales.contains(&locale) {
            return Err(PipelineError::field(
                "locale",
                format!("unsupported locale '{locale}'"),
            ));
        }
        Ok(locale)
    }

    pub fn fallback_locale(&self) -> Option<&Locale> {
        self.locale_fallback.then_some(&self.default_locale)
    }

    pub fn clamp_depth(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_depth).min(self.max_depth)
    }

    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).clamp(1, self.max_limit.max(1))
    }
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_depth() -> usize {
    1
}

fn default_max_depth() -> usize {
    5
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    100
}

fn default_fallback() -> bool {
    true
}

/// Raw TOML structure of `folio.toml`.
#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    localization: LocalizationSection,
    #[serde(default)]
    query: QuerySection,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct LocalizationSection {
    #[serde(default = "default_locale")]
    default_locale: String,
    #[serde(default)]
    locales: Vec<String>,
    #[serde(default = "default_fallback")]
    fallback: bool,
}

impl Default for LocalizationSection {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            locales: Vec::new(),
            fallback: default_fallback(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct QuerySection {
    #[serde(default = "default_depth")]
    default_depth: usize,
    #[serde(default = "default_max_depth")]
    max_depth: usize,
    #[serde(default = "default_limit")]
    default_limit: usize,
    #[serde(default = "default_max_limit")]
    max_limit: usize,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            max_depth: default_max_depth(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl ConfigFile {
    fn into_config(self) -> ServiceConfig {
        let locales = self
            .localization
            .locales
            .iter()
            .filter_map(|code| match parse_locale(code) {
                Ok(locale) => Some(locale),
                Err(e) => {
                    warn!("Ignoring configured locale: {}", e);
                    None
                }
            })
            .collect();
        let default_locale = parse_locale(&self.localization.default_locale).unwrap_or_else(|e| {
            warn!("Invalid default locale ({}), using '{}'", e, default_locale());
            Locale::new(default_locale())
        });
        ServiceConfig {
            default_locale,
            locales,
            locale_fallback: self.localization.fallback,
            default_depth: self.query.default_depth,
            max_depth: self.query.max_depth,
            default_limit: self.query.default_limit,
            max_limit: self.query.max_limit,
        }
    }
}
