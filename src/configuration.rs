//! src/configuration.rs

use crate::domain::{City, SubscriberEmail, ValidationError};
use crate::email_client::EmailClient;
use crate::offer_prober::PortalProber;
use anyhow::Context;
use chrono::TimeDelta;
use chrono_tz::Tz;
use secrecy::Secret;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use std::time::Duration;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub email_client: EmailClientSettings,
    pub portal: PortalSettings,
    pub alerts: AlertSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub hmac_secret: Secret<String>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub filename: String,
    pub create_if_missing: bool,
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.filename)
            .create_if_missing(self.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    pub authorization_token: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn client(&self) -> Result<EmailClient, anyhow::Error> {
        let client = EmailClient::new(
            self.base_url.clone(),
            self.sender().context("Invalid sender email address.")?,
            self.authorization_token.clone(),
            self.timeout(),
        )
        .context("Failed to build the email API client.")?;
        Ok(client)
    }

    pub fn sender(&self) -> Result<SubscriberEmail, ValidationError> {
        SubscriberEmail::parse(self.sender_email.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

/// A city the portal knows, with the code used in its search URL.
#[derive(serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub label: String,
    pub code: u32,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct PortalSettings {
    pub base_url: String,
    /// Link handed out in alert emails.
    pub public_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
    pub default_location_code: u32,
    pub locations: Vec<Location>,
}

impl PortalSettings {
    pub fn prober(&self) -> Result<PortalProber, anyhow::Error> {
        let prober = PortalProber::new(
            self.base_url.clone(),
            self.locations.clone(),
            self.default_location_code,
            self.timeout(),
        )
        .context("Failed to build the portal client.")?;
        Ok(prober)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    /// Labels offered in the subscription form, sorted alphabetically.
    pub fn city_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .locations
            .iter()
            .filter_map(|l| City::parse(l.label.clone()).ok())
            .map(|c| c.as_ref().to_owned())
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct AlertSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_subscribers: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub cooldown_hours: u32,
    pub sweep_hours: Vec<u32>,
    pub timezone: Tz,
}

impl AlertSettings {
    pub fn cooldown(&self) -> TimeDelta {
        TimeDelta::hours(self.cooldown_hours as i64)
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    // Detect the running environment.
    // Default to `local` if unspecified.
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // Add in settings from environment variables (with a prefix of APP and '__' as separator)
        // E.g. `APP_APPLICATION__PORT=5001 would set `Settings.application.port`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

/// The possible runtime environment for our application.
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. \
                Use either `local` or `production`.",
                other
            )),
        }
    }
}
