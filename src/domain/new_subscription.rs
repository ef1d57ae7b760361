//! src/domain/new_subscription.rs

use crate::domain::{City, SubscriberEmail};

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub email: SubscriberEmail,
    pub city: City,
}
