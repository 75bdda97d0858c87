use anyhow::{bail, Context, Result};
use ethers::types::{Address, U256};
use std::str::FromStr;
use std::time::Duration;

use crate::services::{
    chain::DEFAULT_REGISTRY_URL, payment_store::DEFAULT_ENTITLEMENT_DAYS,
    retention::DEFAULT_RETENTION_MONTHS, to_minimal_unit, IdentityBindingStrategy,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testnet,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,

    // Chain
    pub chain_name: String,
    pub rpc_url: Option<String>,
    pub chain_registry_url: String,
    pub infura_api_key: Option<String>,
    pub rpc_timeout: Duration,

    // Payment
    pub payment_amount: String,
    pub payment_decimals: u32,
    pub required_amount: U256,
    pub payment_address: Address,
    pub identity_binding: IdentityBindingStrategy,
    pub entitlement_days: i64,

    // Storage
    pub database_url: String,
    pub database_max_connections: u32,

    // Relay
    pub retention_months: u32,
    pub sweep_interval: Duration,
    pub max_event_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let environment = parse_environment(var("ENVIRONMENT"))?;

        let payment_amount = var("PAYMENT_AMOUNT").context("PAYMENT_AMOUNT required")?;
        let payment_decimals = parse_or(&var, "PAYMENT_DECIMALS", 18)?;
        let required_amount = to_minimal_unit(payment_amount.as_str(), payment_decimals)
            .with_context(|| format!("Invalid PAYMENT_AMOUNT: {payment_amount}"))?;

        let payment_address = var("PAYMENT_ADDRESS").context("PAYMENT_ADDRESS required")?;
        let payment_address = Address::from_str(payment_address.trim())
            .with_context(|| format!("Invalid address for PAYMENT_ADDRESS: {payment_address}"))?;

        let identity_binding = match var("IDENTITY_BINDING") {
            Some(value) => value.parse().context("Invalid IDENTITY_BINDING")?,
            None => IdentityBindingStrategy::default(),
        };

        let database_url = var("DATABASE_URL")
            .or_else(|| var("POSTGRESQL_DATABASE"))
            .context("DATABASE_URL required")?;

        let config = Self {
            environment,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, "PORT", 8080)?,

            chain_name: var("CHAIN_NAME").context("CHAIN_NAME required")?,
            rpc_url: var("RPC_URL").filter(|url| !url.is_empty()),
            chain_registry_url: var("CHAIN_REGISTRY_URL")
                .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string()),
            infura_api_key: var("INFURA_API_KEY").filter(|key| !key.is_empty()),
            rpc_timeout: Duration::from_secs(parse_or(&var, "RPC_TIMEOUT_SECS", 10)?),

            payment_amount,
            payment_decimals,
            required_amount,
            payment_address,
            identity_binding,
            entitlement_days: parse_or(&var, "ENTITLEMENT_DAYS", DEFAULT_ENTITLEMENT_DAYS)?,

            database_url,
            database_max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 80)?,

            retention_months: parse_or(&var, "RETENTION_MONTHS", DEFAULT_RETENTION_MONTHS)?,
            sweep_interval: Duration::from_secs(parse_or(&var, "SWEEP_INTERVAL_SECS", 3600)?),
            max_event_bytes: parse_or(
                &var,
                "MAX_EVENT_BYTES",
                crate::middleware::MAX_EVENT_BYTES,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(url) = &self.rpc_url {
            if !url.starts_with("http") {
                bail!("RPC_URL must be HTTP(S) URL");
            }
        }
        if self.required_amount.is_zero() {
            bail!("PAYMENT_AMOUNT must be greater than zero");
        }
        if self.payment_address.is_zero() {
            bail!("PAYMENT_ADDRESS must not be the zero address");
        }
        if self.entitlement_days <= 0 {
            bail!("ENTITLEMENT_DAYS must be positive");
        }
        if self.sweep_interval.is_zero() {
            bail!("SWEEP_INTERVAL_SECS must be positive");
        }

        if self.identity_binding == IdentityBindingStrategy::Credential {
            tracing::warn!(
                "IDENTITY_BINDING=credential: clients must submit secret keys to this relay"
            );
        }

        tracing::info!(
            "Configuration validated for {:?} environment",
            self.environment
        );

        Ok(())
    }
}

fn parse_environment(value: Option<String>) -> Result<Environment> {
    let env = value.unwrap_or_else(|| "development".to_string());

    match env.to_lowercase().as_str() {
        "development" | "dev" => Ok(Environment::Development),
        "testnet" | "test" => Ok(Environment::Testnet),
        "production" | "prod" => Ok(Environment::Production),
        _ => bail!("Unknown environment: {}", env),
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key}")),
        None => Ok(default),
    }
}
