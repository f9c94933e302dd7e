//! # Terminal Configuration
//!
//! Store, register and policy settings for one register.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MOSTRADOR_REGISTER_ID=caja-2                                       │
//! │     MOSTRADOR_CASH_OUT_POLICY=limit_to_drawer                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/mostrador/terminal.toml (Linux)                          │
//! │     ~/Library/Application Support/mx.mostrador.pos/terminal.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     16% IVA, 8-day returns, $0.50 abono tolerance                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # terminal.toml
//! [store]
//! name = "Ferretería El Tornillo"
//! address = ["Av. Juárez 120", "Col. Centro"]
//! currency_symbol = "$"
//!
//! [register]
//! id = "caja-1"
//! name = "Caja principal"
//!
//! [pricing]
//! tax_rate_bps = 1600
//!
//! [returns]
//! window_days = 8
//!
//! [credit]
//! payment_tolerance_cents = 50
//!
//! [cash]
//! cash_out_policy = "allow_negative"  # allow_negative | limit_to_drawer
//!
//! [database]
//! path = "/var/lib/mostrador/mostrador.db"
//!
//! [supervisor]
//! pin_hash = "$argon2id$v=19$m=19456,t=2,p=1$..."
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use mostrador_core::credit::CreditPolicy;
use mostrador_core::returns::ReturnPolicy;
use mostrador_core::shift::CashOutPolicy;
use mostrador_core::{Money, TaxRate, PAYMENT_TOLERANCE, RETURN_WINDOW_DAYS};

use crate::error::ConfigError;

const MAX_RETURN_WINDOW_DAYS: i64 = 365;

// =============================================================================
// Store
// =============================================================================

/// Ticket header data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_name")]
    pub name: String,

    /// Address lines printed under the name.
    #[serde(default)]
    pub address: Vec<String>,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_store_name() -> String {
    "Mostrador".to_string()
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            name: default_store_name(),
            address: Vec::new(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

// =============================================================================
// Register
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// Shifts are tracked per register id.
    #[serde(default = "default_register_id")]
    pub id: String,

    #[serde(default = "default_register_name")]
    pub name: String,
}

fn default_register_id() -> String {
    "caja-1".to_string()
}

fn default_register_name() -> String {
    "Caja 1".to_string()
}

impl Default for RegisterConfig {
    fn default() -> Self {
        RegisterConfig {
            id: default_register_id(),
            name: default_register_name(),
        }
    }
}

// =============================================================================
// Policies
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSettings {
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,
}

fn default_tax_rate_bps() -> u32 {
    TaxRate::STANDARD.bps()
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            tax_rate_bps: default_tax_rate_bps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnSettings {
    /// Sales older than this many days cannot be returned. Inclusive.
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

fn default_window_days() -> i64 {
    RETURN_WINDOW_DAYS
}

impl Default for ReturnSettings {
    fn default() -> Self {
        ReturnSettings {
            window_days: default_window_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditSettings {
    /// Overpayment accepted on an abono before it is rejected.
    #[serde(default = "default_payment_tolerance")]
    pub payment_tolerance_cents: i64,
}

fn default_payment_tolerance() -> i64 {
    PAYMENT_TOLERANCE.cents()
}

impl Default for CreditSettings {
    fn default() -> Self {
        CreditSettings {
            payment_tolerance_cents: default_payment_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CashSettings {
    #[serde(default)]
    pub cash_out_policy: CashOutPolicy,
}

/// Parses the `cash_out_policy` setting.
pub fn parse_cash_out_policy(value: &str) -> Result<CashOutPolicy, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "allow_negative" | "allow" => Ok(CashOutPolicy::AllowNegative),
        "limit_to_drawer" | "limit" => Ok(CashOutPolicy::LimitToDrawer),
        other => Err(ConfigError::Invalid(format!(
            "Unknown cash out policy: '{}'. Valid options: allow_negative, limit_to_drawer",
            other
        ))),
    }
}

// =============================================================================
// Database / Supervisor
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `mostrador.db` in the platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupervisorSettings {
    /// PHC string produced by `mostrador hash-pin`.
    #[serde(default)]
    pub pin_hash: Option<String>,
}

// =============================================================================
// Terminal Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub register: RegisterConfig,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub returns: ReturnSettings,

    #[serde(default)]
    pub credit: CreditSettings,

    #[serde(default)]
    pub cash: CashSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub supervisor: SupervisorSettings,
}

impl TerminalConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (terminal.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading terminal config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load terminal config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> Result<(), ConfigError> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Terminal config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.register.id.trim().is_empty() {
            return Err(ConfigError::Invalid("register.id must not be empty".into()));
        }

        if self.pricing.tax_rate_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "pricing.tax_rate_bps must be at most 10000, got {}",
                self.pricing.tax_rate_bps
            )));
        }

        if !(0..=MAX_RETURN_WINDOW_DAYS).contains(&self.returns.window_days) {
            return Err(ConfigError::Invalid(format!(
                "returns.window_days must be between 0 and {}, got {}",
                MAX_RETURN_WINDOW_DAYS, self.returns.window_days
            )));
        }

        if self.credit.payment_tolerance_cents < 0 {
            return Err(ConfigError::Invalid(
                "credit.payment_tolerance_cents must not be negative".into(),
            ));
        }

        if let Some(hash) = &self.supervisor.pin_hash {
            argon2::PasswordHash::new(hash).map_err(|e| {
                ConfigError::Invalid(format!("supervisor.pin_hash is not a PHC string: {}", e))
            })?;
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MOSTRADOR_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(id) = std::env::var("MOSTRADOR_REGISTER_ID") {
            debug!(register = %id, "Overriding register id from environment");
            self.register.id = id;
        }

        if let Ok(name) = std::env::var("MOSTRADOR_STORE_NAME") {
            self.store.name = name;
        }

        if let Ok(bps) = std::env::var("MOSTRADOR_TAX_RATE_BPS") {
            match bps.parse::<u32>() {
                Ok(parsed) => self.pricing.tax_rate_bps = parsed,
                Err(_) => warn!(value = %bps, "Ignoring invalid MOSTRADOR_TAX_RATE_BPS"),
            }
        }

        if let Ok(days) = std::env::var("MOSTRADOR_RETURN_WINDOW_DAYS") {
            match days.parse::<i64>() {
                Ok(parsed) => self.returns.window_days = parsed,
                Err(_) => warn!(value = %days, "Ignoring invalid MOSTRADOR_RETURN_WINDOW_DAYS"),
            }
        }

        if let Ok(policy) = std::env::var("MOSTRADOR_CASH_OUT_POLICY") {
            match parse_cash_out_policy(&policy) {
                Ok(parsed) => self.cash.cash_out_policy = parsed,
                Err(e) => warn!("{}", e),
            }
        }

        if let Ok(hash) = std::env::var("MOSTRADOR_SUPERVISOR_PIN_HASH") {
            self.supervisor.pin_hash = Some(hash);
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("mx", "mostrador", "pos")
    }

    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("terminal.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Configured database file, or `mostrador.db` in the platform data dir.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join("mostrador.db"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn register_id(&self) -> &str {
        &self.register.id
    }

    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.pricing.tax_rate_bps)
    }

    pub fn return_policy(&self) -> ReturnPolicy {
        ReturnPolicy {
            window_days: self.returns.window_days,
        }
    }

    pub fn credit_policy(&self) -> CreditPolicy {
        CreditPolicy {
            tolerance: Money::from_cents(self.credit.payment_tolerance_cents),
        }
    }

    pub fn cash_out_policy(&self) -> CashOutPolicy {
        self.cash.cash_out_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TerminalConfig::default();
        assert_eq!(config.register_id(), "caja-1");
        assert_eq!(config.tax_rate(), TaxRate::STANDARD);
        assert_eq!(config.return_policy().window_days, 8);
        assert_eq!(config.credit_policy().tolerance, Money::from_cents(50));
        assert_eq!(config.cash_out_policy(), CashOutPolicy::AllowNegative);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cash_out_policy_parsing() {
        assert_eq!(
            parse_cash_out_policy("limit_to_drawer").unwrap(),
            CashOutPolicy::LimitToDrawer
        );
        assert_eq!(
            parse_cash_out_policy(" Allow_Negative ").unwrap(),
            CashOutPolicy::AllowNegative
        );
        assert!(parse_cash_out_policy("sometimes").is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TerminalConfig::default();

        config.register.id = "  ".to_string();
        assert!(config.validate().is_err());
        config.register.id = "caja-2".to_string();

        config.pricing.tax_rate_bps = 10_001;
        assert!(config.validate().is_err());
        config.pricing.tax_rate_bps = 800;

        config.returns.window_days = -1;
        assert!(config.validate().is_err());
        config.returns.window_days = 30;

        config.supervisor.pin_hash = Some("not-a-hash".to_string());
        assert!(config.validate().is_err());
        config.supervisor.pin_hash = None;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_sections() {
        let config: TerminalConfig = toml::from_str(
            r#"
            [store]
            name = "Ferretería El Tornillo"
            address = ["Av. Juárez 120"]

            [register]
            id = "caja-3"

            [pricing]
            tax_rate_bps = 800

            [cash]
            cash_out_policy = "limit_to_drawer"

            [database]
            path = "/tmp/mostrador-test.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.name, "Ferretería El Tornillo");
        assert_eq!(config.store.currency_symbol, "$");
        assert_eq!(config.register.id, "caja-3");
        assert_eq!(config.register.name, "Caja 1");
        assert_eq!(config.tax_rate().bps(), 800);
        assert_eq!(config.returns.window_days, 8);
        assert_eq!(config.cash_out_policy(), CashOutPolicy::LimitToDrawer);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/mostrador-test.db")
        );
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("mostrador-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("terminal.toml");

        let mut config = TerminalConfig::default();
        config.register.id = "caja-9".to_string();
        config.returns.window_days = 15;
        config.save(Some(path.clone())).unwrap();

        let loaded: TerminalConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.register.id, "caja-9");
        assert_eq!(loaded.returns.window_days, 15);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
