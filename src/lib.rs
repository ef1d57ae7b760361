//! src/lib.rs

pub mod alert_engine;
pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod error;
pub mod notifier;
pub mod offer_prober;
pub mod routes;
pub mod startup;
pub mod subscription_store;
pub mod sweep_worker;
pub mod telemetry;
