//! src/notifier.rs

use crate::domain::{City, SubscriberEmail};
use crate::email_client::EmailClient;
use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
#[error("Failed to deliver the alert for {city} to {email}.")]
pub struct DeliveryError {
    pub email: String,
    pub city: String,
    #[source]
    pub source: anyhow::Error,
}

/// Delivers one "offers available" message to a subscriber.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, email: &SubscriberEmail, city: &City) -> Result<(), DeliveryError>;
}

pub struct EmailNotifier {
    email_client: EmailClient,
    portal_url: String,
}

impl EmailNotifier {
    pub fn new(email_client: EmailClient, portal_url: String) -> Self {
        Self {
            email_client,
            portal_url,
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    #[tracing::instrument(name = "Send offer alert", skip(self), fields(email = %email, city = %city))]
    async fn notify(&self, email: &SubscriberEmail, city: &City) -> Result<(), DeliveryError> {
        let message = AlertMessage::new(city, &self.portal_url);
        self.email_client
            .send_email(email, &message.subject, &message.html_body, &message.text_body)
            .await
            .map_err(|e| DeliveryError {
                email: email.as_ref().to_owned(),
                city: city.as_ref().to_owned(),
                source: e.into(),
            })
    }
}

pub struct AlertMessage {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

impl AlertMessage {
    pub fn new(city: &City, portal_url: &str) -> Self {
        let subject = format!("Logements CROUS disponibles à {} !", city);
        let text_body = format!(
            "Bonjour,\n\n\
            Bonne nouvelle ! Au moins un logement CROUS vient d'être repéré \
            pour la ville de {city}.\n\n\
            Détails : {portal_url}\n\n\
            Service d'alerte logement CROUS",
        );
        let html_body = format!(
            "<p>Bonjour,</p>\
            <p>Bonne nouvelle ! Au moins un logement CROUS vient d'être repéré \
            pour la ville de <b>{city}</b>.</p>\
            <p>Détails : <a href=\"{portal_url}\">{portal_url}</a></p>\
            <p>Service d'alerte logement CROUS</p>",
        );
        Self {
            subject,
            html_body,
            text_body,
        }
    }
}
