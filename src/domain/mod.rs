//! src/domain/mod.rs

mod city;
mod new_subscription;
mod subscriber_email;
mod subscription;

pub use city::City;
pub use new_subscription::NewSubscription;
pub use subscriber_email::SubscriberEmail;
pub use subscription::{Subscription, SubscriptionId};

/// Validation error for domain data
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{0}` is not a valid subscriber email.")]
    InvalidEmail(String),
    #[error("`{0}` is not a valid city.")]
    InvalidCity(String),
}
