//! src/routes/subscriptions/post.rs

use actix_web::{http::header::LOCATION, web, HttpResponse};
use actix_web_flash_messages::FlashMessage;
use chrono::Utc;

use crate::alert_engine::AlertEngine;
use crate::domain::{
    City, NewSubscription, SubscriberEmail, Subscription, SubscriptionId, ValidationError,
};
use crate::error::{AppResult, Error};
use crate::subscription_store::StoreRejection;

/// Missing fields deserialize as empty strings so they are reported the same
/// way as blank ones.
#[derive(serde::Deserialize, serde::Serialize)]
pub struct FormData {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub city: String,
}

impl TryFrom<FormData> for NewSubscription {
    type Error = ValidationError;

    fn try_from(value: FormData) -> Result<Self, Self::Error> {
        let email = SubscriberEmail::parse(value.email)?;
        let city = City::parse(value.city)?;
        Ok(Self { email, city })
    }
}

#[tracing::instrument(
    name = "Adding a new subscriber.",
    skip(form, engine),
    fields(
        subscriber_email = %form.email,
        city = %form.city
    )
)]
pub async fn subscribe(
    form: web::Form<FormData>,
    engine: web::Data<AlertEngine>,
) -> AppResult<HttpResponse> {
    match subscribe_and_check(form.0, &engine).await {
        Ok(_) => FlashMessage::info(
            "Inscription validée ! Une alerte vous sera envoyée pour chaque nouvelle offre \
            (vérification immédiate, puis à 08 h, 12 h, 16 h et 20 h).",
        )
        .send(),
        Err(Error::SubscriptionError(e)) => FlashMessage::error(e.to_string()).send(),
        Err(Error::RejectedError(StoreRejection::DuplicateEmail)) => {
            FlashMessage::error("Inscription impossible : adresse déjà inscrite.").send()
        }
        Err(Error::RejectedError(StoreRejection::QuotaReached(max))) => FlashMessage::error(
            format!("Inscription impossible : les {} places sont déjà prises.", max),
        )
        .send(),
        Err(e) => return Err(e),
    }
    Ok(back_to_form())
}

/// Every outcome lands on the form, where the flash message is shown.
fn back_to_form() -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((LOCATION, "/"))
        .finish()
}

/// Store the subscription, then run the immediate check for it. Once the
/// row is stored the subscription stands, whatever the check does.
async fn subscribe_and_check(form: FormData, engine: &AlertEngine) -> AppResult<SubscriptionId> {
    let new_subscription: NewSubscription = form.try_into()?;
    let id = engine.store().insert(&new_subscription).await?;
    let subscription = Subscription {
        id,
        email: new_subscription.email,
        city: new_subscription.city,
        last_alert: None,
    };
    if let Err(e) = engine.check_one(&subscription, Utc::now()).await {
        tracing::error!(
            error.cause_chain = ?e,
            error.message = %e,
            "Immediate check of the new subscriber failed. The next sweep will retry.",
        );
    }
    Ok(id)
}
