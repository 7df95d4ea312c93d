// ===============================
// src/config.rs
// ===============================
use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

use crate::credential::{Credential, CredentialError};

pub const DEFAULT_WS_URL: &str = "wss://pumpportal.fun/api/data";
pub const DEFAULT_TRADE_URL: &str = "https://pumpportal.fun/api/trade";
pub const DEFAULT_TARGET_ACCOUNT: &str = "DyRxGT7xgYn6ZGN9hmtUBAQ1FQWEGyaXQ7ZVkdH2yiQt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key}: cannot parse `{value}`")]
    Parse { key: &'static str, value: String },
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Whether a trade counts against the cap when the API rejected it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpendAccounting {
    /// Count every submitted trade, whatever the API answered.
    Always,
    ConfirmedOnly,
}

impl FromStr for SpendAccounting {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(SpendAccounting::Always),
            "confirmed_only" | "confirmed" => Ok(SpendAccounting::ConfirmedOnly),
            _ => Err(()),
        }
    }
}

/// Spend cap and per-trade bounds, all in SOL except the USD inputs.
#[derive(Clone, Debug)]
pub struct Limits {
    pub max_spend_usd: Decimal,
    pub sol_price_usd: Decimal,
    pub min_trade_sol: Decimal,
    pub max_trade_sol: Decimal,
    pub accounting: SpendAccounting,
}

impl Limits {
    /// Session cap in SOL. `None` when the division overflows or the price is zero.
    pub fn spend_limit_sol(&self) -> Option<Decimal> {
        self.max_spend_usd.checked_div(self.sol_price_usd)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sol_price_usd <= Decimal::ZERO {
            return Err(ConfigError::Invalid("SOL_PRICE_USD must be positive".into()));
        }
        if self.max_spend_usd.is_sign_negative() {
            return Err(ConfigError::Invalid("MAX_SPENT_USD must not be negative".into()));
        }
        if self.min_trade_sol.is_sign_negative() || self.max_trade_sol.is_sign_negative() {
            return Err(ConfigError::Invalid("trade bounds must not be negative".into()));
        }
        if self.min_trade_sol > self.max_trade_sol {
            return Err(ConfigError::Invalid(format!(
                "MIN_TRADE_SOL ({}) is above MAX_TRADE_SOL ({})",
                self.min_trade_sol, self.max_trade_sol
            )));
        }
        if self.spend_limit_sol().is_none() {
            return Err(ConfigError::Invalid(format!(
                "MAX_SPENT_USD / SOL_PRICE_USD ({} / {}) overflows",
                self.max_spend_usd, self.sol_price_usd
            )));
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_spend_usd: Decimal::from(10),
            sol_price_usd: Decimal::from(25),
            min_trade_sol: Decimal::new(1, 2),
            max_trade_sol: Decimal::new(1, 2),
            accounting: SpendAccounting::Always,
        }
    }
}

/// Fixed fields sent with every order.
#[derive(Clone, Debug)]
pub struct OrderPolicy {
    pub slippage: Decimal,
    pub priority_fee: Decimal,
    pub pool: String,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        OrderPolicy {
            slippage: Decimal::ONE,
            priority_fee: Decimal::new(5, 3),
            pool: "pump".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FeedCfg {
    pub ws_url: String,
    pub target_account: String,
    pub reconnect_delay: Duration,
    /// `None` waits forever for the next frame.
    pub idle_timeout: Option<Duration>,
    pub insecure_skip_verify: bool,
}

#[derive(Clone, Debug)]
pub struct GatewayCfg {
    pub trade_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub policy: OrderPolicy,
}

#[derive(Debug)]
pub struct Args {
    pub feed: FeedCfg,
    pub gateway: GatewayCfg,
    pub limits: Limits,
    pub credential: Credential,
    pub metrics_port: u16,
}

pub fn load() -> Result<Args, ConfigError> {
    // .env is optional
    let _ = dotenv();

    // ===== Secrets =====
    let api_key = required("API_KEY")?;
    let credential = Credential::from_base58(&required("WALLET_PRIVATE_KEY")?)?;

    // ===== Feed =====
    let ws_url = env::var("PUMP_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
    check_url("PUMP_WS_URL", &ws_url)?;
    let target_account = env::var("TARGET_ACCOUNT")
        .unwrap_or_else(|_| DEFAULT_TARGET_ACCOUNT.to_string())
        .trim()
        .to_string();
    if target_account.is_empty() {
        return Err(ConfigError::Invalid("TARGET_ACCOUNT is empty".into()));
    }
    let idle_secs: u64 = parsed("WS_IDLE_TIMEOUT_SECS", 300)?;
    let feed = FeedCfg {
        ws_url,
        target_account,
        reconnect_delay: Duration::from_secs(parsed("RECONNECT_DELAY_SECS", 5)?),
        idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
        insecure_skip_verify: flag("WS_INSECURE_SKIP_VERIFY")?,
    };

    // ===== Gateway =====
    let trade_url = env::var("PUMP_TRADE_URL").unwrap_or_else(|_| DEFAULT_TRADE_URL.to_string());
    check_url("PUMP_TRADE_URL", &trade_url)?;
    let defaults = OrderPolicy::default();
    let gateway = GatewayCfg {
        trade_url,
        api_key,
        timeout: Duration::from_secs(parsed("TRADE_HTTP_TIMEOUT_SECS", 10)?),
        policy: OrderPolicy {
            slippage: parsed("SLIPPAGE", defaults.slippage)?,
            priority_fee: parsed("PRIORITY_FEE", defaults.priority_fee)?,
            pool: env::var("POOL").unwrap_or(defaults.pool),
        },
    };

    // ===== Limits =====
    let d = Limits::default();
    let limits = Limits {
        max_spend_usd: parsed("MAX_SPENT_USD", d.max_spend_usd)?,
        sol_price_usd: parsed("SOL_PRICE_USD", d.sol_price_usd)?,
        min_trade_sol: parsed("MIN_TRADE_SOL", d.min_trade_sol)?,
        max_trade_sol: parsed("MAX_TRADE_SOL", d.max_trade_sol)?,
        accounting: parsed_with("SPEND_ACCOUNTING", d.accounting, |s| s.parse().ok())?,
    };
    limits.validate()?;

    let metrics_port = parsed("METRICS_PORT", 9898)?;

    Ok(Args { feed, gateway, limits, credential, metrics_port })
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    parsed_with(key, default, |s| s.parse().ok())
}

fn parsed_with<T>(
    key: &'static str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            parse(raw.trim()).ok_or(ConfigError::Parse { key, value: raw })
        }
        _ => Ok(default),
    }
}

fn flag(key: &'static str) -> Result<bool, ConfigError> {
    parsed_with(key, false, |s| match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

fn check_url(key: &'static str, raw: &str) -> Result<(), ConfigError> {
    Url::parse(raw)
        .map(|_| ())
        .map_err(|_| ConfigError::Parse { key, value: raw.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[test]
    fn default_limit_is_ten_dollars_of_sol() {
        let lim = Limits::default();
        assert_eq!(lim.spend_limit_sol(), Some(dec!(0.4)));
        assert_eq!(lim.min_trade_sol, dec!(0.01));
        assert_eq!(lim.max_trade_sol, dec!(0.01));
        assert!(lim.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_bounds_and_zero_price() {
        let inverted = Limits { min_trade_sol: dec!(0.5), max_trade_sol: dec!(0.1), ..Limits::default() };
        assert!(matches!(inverted.validate(), Err(ConfigError::Invalid(_))));

        let free_sol = Limits { sol_price_usd: Decimal::ZERO, ..Limits::default() };
        assert!(matches!(free_sol.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn overflowing_cap_is_a_config_error() {
        let huge = Limits { max_spend_usd: Decimal::MAX, sol_price_usd: dec!(0.5), ..Limits::default() };
        assert_eq!(huge.spend_limit_sol(), None);
        assert!(matches!(huge.validate(), Err(ConfigError::Invalid(_))));

        // the same cap at a price above 1 still fits
        let fits = Limits { max_spend_usd: Decimal::MAX, sol_price_usd: dec!(2), ..Limits::default() };
        assert!(fits.validate().is_ok());
    }

    #[test]
    fn spend_accounting_parses() {
        assert_eq!("always".parse::<SpendAccounting>(), Ok(SpendAccounting::Always));
        assert_eq!("Confirmed_Only".parse::<SpendAccounting>(), Ok(SpendAccounting::ConfirmedOnly));
        assert!("sometimes".parse::<SpendAccounting>().is_err());
    }

    #[test]
    fn order_policy_defaults() {
        let p = OrderPolicy::default();
        assert_eq!(p.slippage, dec!(1));
        assert_eq!(p.priority_fee, dec!(0.005));
        assert_eq!(p.pool, "pump");
    }

    #[test]
    fn bad_urls_are_config_errors() {
        assert!(check_url("PUMP_WS_URL", "wss://pumpportal.fun/api/data").is_ok());
        assert!(matches!(
            check_url("PUMP_WS_URL", "not a url"),
            Err(ConfigError::Parse { key: "PUMP_WS_URL", .. })
        ));
    }

    // load() reads the fixed API_KEY / WALLET_PRIVATE_KEY names
    static LOAD_ENV: Mutex<()> = Mutex::new(());

    #[test]
    fn required_rejects_unset_and_blank() {
        env::remove_var("PUMP_COPIER_T_REQUIRED_UNSET");
        assert!(matches!(
            required("PUMP_COPIER_T_REQUIRED_UNSET"),
            Err(ConfigError::Missing("PUMP_COPIER_T_REQUIRED_UNSET"))
        ));

        env::set_var("PUMP_COPIER_T_REQUIRED_BLANK", "   ");
        assert!(matches!(
            required("PUMP_COPIER_T_REQUIRED_BLANK"),
            Err(ConfigError::Missing("PUMP_COPIER_T_REQUIRED_BLANK"))
        ));

        env::set_var("PUMP_COPIER_T_REQUIRED_SET", " key-123 ");
        assert_eq!(required("PUMP_COPIER_T_REQUIRED_SET").unwrap(), "key-123");
    }

    #[test]
    fn insecure_flag_defaults_off_and_rejects_junk() {
        env::remove_var("PUMP_COPIER_T_FLAG_UNSET");
        assert!(!flag("PUMP_COPIER_T_FLAG_UNSET").unwrap());

        env::set_var("PUMP_COPIER_T_FLAG_JUNK", "maybe");
        assert!(matches!(
            flag("PUMP_COPIER_T_FLAG_JUNK"),
            Err(ConfigError::Parse { key: "PUMP_COPIER_T_FLAG_JUNK", .. })
        ));

        env::set_var("PUMP_COPIER_T_FLAG_ON", "TRUE");
        assert!(flag("PUMP_COPIER_T_FLAG_ON").unwrap());
        env::set_var("PUMP_COPIER_T_FLAG_OFF", "0");
        assert!(!flag("PUMP_COPIER_T_FLAG_OFF").unwrap());
    }

    #[test]
    fn load_fails_without_secrets_or_with_bad_key() {
        let _guard = LOAD_ENV.lock().unwrap_or_else(|e| e.into_inner());

        env::remove_var("API_KEY");
        env::remove_var("WALLET_PRIVATE_KEY");
        assert!(matches!(load(), Err(ConfigError::Missing("API_KEY"))));

        env::set_var("API_KEY", "test-key");
        env::set_var("WALLET_PRIVATE_KEY", "  ");
        assert!(matches!(load(), Err(ConfigError::Missing("WALLET_PRIVATE_KEY"))));

        // '0', 'O', 'I' and 'l' are outside the Base58 alphabet
        env::set_var("WALLET_PRIVATE_KEY", "0OIl");
        assert!(matches!(
            load(),
            Err(ConfigError::Credential(CredentialError::NotBase58))
        ));

        env::remove_var("API_KEY");
        env::remove_var("WALLET_PRIVATE_KEY");
    }
}
