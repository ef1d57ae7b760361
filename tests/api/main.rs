//! tests/api/main.rs

mod alert_engine;
mod helpers;
