//! src/routes/subscriptions/mod.rs

mod post;

pub use post::*;
