//! src/startup.rs

use crate::alert_engine::AlertEngine;
use crate::configuration::{DatabaseSettings, Settings};
use crate::notifier::EmailNotifier;
use crate::routes::{health_check, home, subscribe};
use crate::subscription_store::SubscriptionStore;
use actix_web::cookie::Key;
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use actix_web_flash_messages::{storage::CookieMessageStore, FlashMessagesFramework};
use anyhow::Context;
use secrecy::{ExposeSecret, Secret};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

/// City labels offered by the subscription form.
pub struct KnownCities(pub Vec<String>);

pub struct Application {
    port: u16,
    server: Server,
    alert_engine: Arc<AlertEngine>,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&configuration.database);
        sqlx::migrate!("./migrations")
            .run(&connection_pool)
            .await
            .context("Failed to migrate the database.")?;

        let alert_engine = Arc::new(build_alert_engine(&configuration, connection_pool)?);

        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();
        let server = run(
            listener,
            alert_engine.clone(),
            configuration.portal.city_labels(),
            configuration.application.hmac_secret,
        )?;

        // We "save" the bound port in one of `Application`'s fields
        Ok(Self {
            port,
            server,
            alert_engine,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The engine serving intake requests, to be shared with the sweep worker.
    pub fn alert_engine(&self) -> Arc<AlertEngine> {
        self.alert_engine.clone()
    }

    // A more expressive name that makes it clear that
    // this function only returns when the application is stopped.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_connection_pool(configuration: &DatabaseSettings) -> SqlitePool {
    SqlitePoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(configuration.connect_options())
}

pub fn build_alert_engine(
    configuration: &Settings,
    connection_pool: SqlitePool,
) -> Result<AlertEngine, anyhow::Error> {
    let store = SubscriptionStore::new(connection_pool, configuration.alerts.max_subscribers);
    let prober = configuration.portal.prober()?;
    let notifier = EmailNotifier::new(
        configuration.email_client.client()?,
        configuration.portal.public_url.clone(),
    );
    Ok(AlertEngine::new(
        store,
        Arc::new(prober),
        Arc::new(notifier),
        configuration.alerts.cooldown(),
    ))
}

pub fn run(
    listener: TcpListener,
    alert_engine: Arc<AlertEngine>,
    known_cities: Vec<String>,
    hmac_secret: Secret<String>,
) -> Result<Server, anyhow::Error> {
    let alert_engine = web::Data::from(alert_engine);
    let known_cities = web::Data::new(KnownCities(known_cities));
    let message_store =
        CookieMessageStore::builder(Key::from(hmac_secret.expose_secret().as_bytes())).build();
    let message_framework = FlashMessagesFramework::builder(message_store).build();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(message_framework.clone())
            .wrap(TracingLogger::default())
            .route("/", web::get().to(home))
            .route("/health_check", web::get().to(health_check))
            .route("/subscriptions", web::post().to(subscribe))
            .app_data(alert_engine.clone())
            .app_data(known_cities.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}
