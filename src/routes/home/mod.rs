//! src/routes/home/mod.rs

use crate::alert_engine::AlertEngine;
use crate::error::AppResult;
use crate::startup::KnownCities;
use actix_web::{web, Responder};
use actix_web_flash_messages::IncomingFlashMessages;
use askama_actix::Template;

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    flash_messages: Vec<String>,
    cities: Vec<String>,
    max_subscribers: u32,
    remaining_places: u32,
}

#[tracing::instrument(name = "Render subscription form", skip_all)]
pub async fn home(
    flash_messages: IncomingFlashMessages,
    engine: web::Data<AlertEngine>,
    known_cities: web::Data<KnownCities>,
) -> AppResult<impl Responder> {
    let flash_messages: Vec<String> = flash_messages
        .iter()
        .map(|m| m.content().to_string())
        .collect();
    let store = engine.store();
    let max_subscribers = store.max_subscribers();
    let remaining_places = max_subscribers.saturating_sub(store.count().await?);
    Ok(HomeTemplate {
        flash_messages,
        cities: known_cities.0.clone(),
        max_subscribers,
        remaining_places,
    })
}
