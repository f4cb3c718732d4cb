// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and scraping behavior settings
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Known filter slug tables for the directory
    #[serde(default)]
    pub filters: FilterTables,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        if !path.as_ref().exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.scraper.base_url.trim().is_empty() {
            return Err(AppError::validation("scraper.base_url is empty"));
        }
        if self.scraper.user_agent.trim().is_empty() {
            return Err(AppError::validation("scraper.user_agent is empty"));
        }
        if self.scraper.timeout_secs == 0 {
            return Err(AppError::validation("scraper.timeout_secs must be > 0"));
        }
        if self.scraper.delay_min_secs < 0.0 || self.scraper.delay_max_secs < 0.0 {
            return Err(AppError::validation("scraper delays must be >= 0"));
        }
        if self.scraper.delay_min_secs > self.scraper.delay_max_secs {
            return Err(AppError::validation(
                "scraper.delay_min_secs must be <= scraper.delay_max_secs",
            ));
        }
        if self.scraper.max_retries == 0 {
            return Err(AppError::validation("scraper.max_retries must be > 0"));
        }
        if self.scraper.results_per_page == 0 {
            return Err(AppError::validation("scraper.results_per_page must be > 0"));
        }
        if self.scraper.save_every_n == 0 {
            return Err(AppError::validation("scraper.save_every_n must be > 0"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            filters: FilterTables::default(),
        }
    }
}

/// HTTP client and scraping behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Base URL of the directory
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header: a declared automated-agent identity permitted by
    /// the site's robots.txt, deliberately not a spoofed browser signature
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Alternative declared agent, switched to after a block is detected
    #[serde(default = "defaults::fallback_user_agent")]
    pub fallback_user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Lower bound of the randomized inter-request delay, in seconds
    #[serde(default = "defaults::delay_min")]
    pub delay_min_secs: f64,

    /// Upper bound of the randomized inter-request delay, in seconds
    #[serde(default = "defaults::delay_max")]
    pub delay_max_secs: f64,

    /// Maximum attempts per target before abandoning it
    #[serde(default = "defaults::max_retries")]
    pub max_retries: usize,

    /// Base for exponential backoff, in seconds (wait = base * 2^attempt)
    #[serde(default = "defaults::retry_backoff_base")]
    pub retry_backoff_base_secs: u64,

    /// Listing results per page on the directory
    #[serde(default = "defaults::results_per_page")]
    pub results_per_page: usize,

    /// Checkpoint cadence: persist progress every N completed records
    #[serde(default = "defaults::save_every_n")]
    pub save_every_n: usize,

    /// Whether a persistent block (401/403/CAPTCHA past retries) aborts the
    /// whole job (true) or only skips the affected target (false)
    #[serde(default = "defaults::auth_block_fatal")]
    pub auth_block_fatal: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            fallback_user_agent: defaults::fallback_user_agent(),
            timeout_secs: defaults::timeout(),
            delay_min_secs: defaults::delay_min(),
            delay_max_secs: defaults::delay_max(),
            max_retries: defaults::max_retries(),
            retry_backoff_base_secs: defaults::retry_backoff_base(),
            results_per_page: defaults::results_per_page(),
            save_every_n: defaults::save_every_n(),
            auth_block_fatal: defaults::auth_block_fatal(),
        }
    }
}

/// Display-name to URL-slug tables for the directory's filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterTables {
    #[serde(default = "defaults::default_provinces")]
    pub provinces: Vec<FilterEntry>,

    #[serde(default = "defaults::default_activities")]
    pub activities: Vec<FilterEntry>,
}

impl Default for FilterTables {
    fn default() -> Self {
        Self {
            provinces: defaults::default_provinces(),
            activities: defaults::default_activities(),
        }
    }
}

impl FilterTables {
    /// Resolve a province given as display name or slug, case-insensitive.
    pub fn resolve_province(&self, input: &str) -> Option<String> {
        Self::resolve(&self.provinces, input)
    }

    /// Resolve an activity given as display name or slug, case-insensitive.
    pub fn resolve_activity(&self, input: &str) -> Option<String> {
        Self::resolve(&self.activities, input)
    }

    fn resolve(entries: &[FilterEntry], input: &str) -> Option<String> {
        let needle = input.trim();
        entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(needle) || e.slug.eq_ignore_ascii_case(needle))
            .map(|e| e.slug.clone())
    }
}

/// One display-name/slug pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterEntry {
    pub name: String,
    pub slug: String,
}

impl FilterEntry {
    fn new(name: &str, slug: &str) -> Self {
        Self {
            name: name.to_string(),
            slug: slug.to_string(),
        }
    }
}

mod defaults {
    use super::FilterEntry;

    // Scraper defaults
    pub fn base_url() -> String {
        "https://empresite.eleconomista.es".into()
    }
    pub fn user_agent() -> String {
        // Declared bot identity permitted by the site's robots.txt
        "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko; compatible; GPTBot/1.2; +https://openai.com/gptbot)".into()
    }
    pub fn fallback_user_agent() -> String {
        "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko; compatible; ChatGPT-User/1.0; +https://openai.com/bot)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn delay_min() -> f64 {
        5.0
    }
    pub fn delay_max() -> f64 {
        10.0
    }
    pub fn max_retries() -> usize {
        4
    }
    pub fn retry_backoff_base() -> u64 {
        30
    }
    pub fn results_per_page() -> usize {
        30
    }
    pub fn save_every_n() -> usize {
        10
    }
    pub fn auth_block_fatal() -> bool {
        true
    }

    // Province defaults
    pub fn default_provinces() -> Vec<FilterEntry> {
        [
            ("Álava", "ALAVA"),
            ("Albacete", "ALBACETE"),
            ("Alicante", "ALICANTE"),
            ("Almería", "ALMERIA"),
            ("Asturias", "ASTURIAS"),
            ("Ávila", "AVILA"),
            ("Badajoz", "BADAJOZ"),
            ("Baleares", "BALEARES"),
            ("Barcelona", "BARCELONA"),
            ("Burgos", "BURGOS"),
            ("Cáceres", "CACERES"),
            ("Cádiz", "CADIZ"),
            ("Cantabria", "CANTABRIA"),
            ("Castellón", "CASTELLON"),
            ("Ceuta", "CEUTA"),
            ("Ciudad Real", "CIUDAD-REAL"),
            ("Córdoba", "CORDOBA"),
            ("Coruña", "CORUNA"),
            ("Cuenca", "CUENCA"),
            ("Gerona", "GERONA"),
            ("Granada", "GRANADA"),
            ("Guadalajara", "GUADALAJARA"),
            ("Guipúzcoa", "GUIPUZCOA"),
            ("Huelva", "HUELVA"),
            ("Huesca", "HUESCA"),
            ("Jaén", "JAEN"),
            ("León", "LEON"),
            ("Lérida", "LERIDA"),
            ("Lugo", "LUGO"),
            ("Madrid", "MADRID"),
            ("Málaga", "MALAGA"),
            ("Melilla", "MELILLA"),
            ("Murcia", "MURCIA"),
            ("Navarra", "NAVARRA"),
            ("Orense", "ORENSE"),
            ("Palencia", "PALENCIA"),
            ("Palmas (Las)", "PALMAS-LAS"),
            ("Pontevedra", "PONTEVEDRA"),
            ("Rioja (La)", "RIOJA-LA"),
            ("Salamanca", "SALAMANCA"),
            ("Santa Cruz de Tenerife", "SANTA-CRUZ-TENERIFE"),
            ("Segovia", "SEGOVIA"),
            ("Sevilla", "SEVILLA"),
            ("Soria", "SORIA"),
            ("Tarragona", "TARRAGONA"),
            ("Teruel", "TERUEL"),
            ("Toledo", "TOLEDO"),
            ("Valencia", "VALENCIA"),
            ("Valladolid", "VALLADOLID"),
            ("Vizcaya", "VIZCAYA"),
            ("Zamora", "ZAMORA"),
            ("Zaragoza", "ZARAGOZA"),
        ]
        .iter()
        .map(|(name, slug)| FilterEntry::new(name, slug))
        .collect()
    }

    // Activity defaults
    pub fn default_activities() -> Vec<FilterEntry> {
        [
            ("Agricultura", "AGRICULTURA"),
            ("Alimentación", "ALIMENTACION"),
            ("Banca", "BANCA"),
            ("Construcciones", "CONSTRUCCIONES"),
            ("Educación", "EDUCACION"),
            ("Energéticas", "ENERGETICAS"),
            ("Farmacéutica", "FARMACEUTICA"),
            ("Ganadería", "GANADERIA"),
            ("Hostelería", "HOSTELERIA"),
            ("Inmobiliaria", "INMOBILIARIA"),
            ("Logística", "LOGISTICA"),
            ("Manufactura", "MANUFACTURA"),
            ("Minería", "MINERIA"),
            ("Ocio", "OCIO"),
            ("Pesca", "PESCA"),
            ("Restauración", "RESTAURACION"),
            ("Sanidad", "SANIDAD"),
            ("Seguro", "SEGURO"),
            ("Silvicultura", "SILVICULTURA"),
            ("Telecomunicaciones", "TELECOMUNICACIONES"),
            ("Transporte", "TRANSPORTE"),
            ("Vehículos", "VEHICULOS"),
        ]
        .iter()
        .map(|(name, slug)| FilterEntry::new(name, slug))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.scraper.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_delay_range() {
        let mut config = Config::default();
        config.scraper.delay_min_secs = 10.0;
        config.scraper.delay_max_secs = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_cadence() {
        let mut config = Config::default();
        config.scraper.save_every_n = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_accepts_name_or_slug() {
        let tables = FilterTables::default();
        assert_eq!(tables.resolve_province("Jaén"), Some("JAEN".to_string()));
        assert_eq!(tables.resolve_province("jaen"), Some("JAEN".to_string()));
        assert_eq!(tables.resolve_activity("Pesca"), Some("PESCA".to_string()));
        assert_eq!(tables.resolve_activity("PESCA"), Some("PESCA".to_string()));
        assert_eq!(tables.resolve_activity("nope"), None);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [scraper]
            delay_min_secs = 0.5
            delay_max_secs = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.scraper.delay_min_secs, 0.5);
        assert_eq!(config.scraper.max_retries, 4);
        assert_eq!(config.scraper.save_every_n, 10);
        assert!(!config.filters.provinces.is_empty());
    }
}
