//! tests/api/helpers.rs

use housing_alert::alert_engine::AlertEngine;
use housing_alert::configuration::{get_configuration, DatabaseSettings};
use housing_alert::domain::{City, NewSubscription, SubscriberEmail};
use housing_alert::startup::{get_connection_pool, Application};
use housing_alert::subscription_store::SubscriptionStore;
use housing_alert::telemetry::{get_subscriber, init_subscriber};
use once_cell::sync::Lazy;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    // We cannot assign the output of `get_subscriber` to a variable based on the
    // value TEST_LOG` because the sink is part of the type returned by
    // `get_subscriber`, therefore they are not the same type.
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub engine: Arc<AlertEngine>,
    pub store: SubscriptionStore,
    pub email_server: MockServer,
    pub portal_server: MockServer,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn post_subscriptions(&self, body: String) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/subscriptions", &self.address))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// helper to get Response from url
    pub async fn get_response_from_url(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// helper to get home html
    pub async fn get_home_html(&self) -> String {
        self.get_response_from_url("/").await.text().await.unwrap()
    }

    /// Serve a search page for `location_code` that mentions `page_text`.
    pub async fn mount_portal_page(&self, location_code: u32, page_text: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/tools/{}/search", location_code)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<html><body><p>{}</p></body></html>", page_text)),
            )
            .mount(&self.portal_server)
            .await;
    }

    /// Fill the store directly, bypassing the HTTP intake.
    pub async fn insert_subscribers(&self, n: usize) {
        for i in 0..n {
            let new_subscription = NewSubscription {
                email: SubscriberEmail::parse(format!("student{}@example.com", i)).unwrap(),
                city: City::parse("Paris".into()).unwrap(),
            };
            self.store.insert(&new_subscription).await.unwrap();
        }
    }
}

// Little helper function to assert redirected location
pub fn assert_is_redirect_to(response: &reqwest::Response, location: &str) {
    assert_eq!(response.status().as_u16(), 303);
    assert_eq!(response.headers().get("Location").unwrap(), location);
}

/// A throwaway SQLite file in the temp directory.
pub fn test_database() -> DatabaseSettings {
    let filename = std::env::temp_dir().join(format!("housing_alert_{}.db", Uuid::new_v4()));
    DatabaseSettings {
        filename: filename.to_string_lossy().into_owned(),
        create_if_missing: true,
    }
}

/// A fresh, migrated database.
pub async fn test_pool() -> SqlitePool {
    Lazy::force(&TRACING);
    let pool = get_connection_pool(&test_database());
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate the database.");
    pool
}

/// A store on a fresh database.
pub async fn test_store(max_subscribers: u32) -> SubscriptionStore {
    SubscriptionStore::new(test_pool().await, max_subscribers)
}

/// Write a row the way an older release could have, skipping validation.
pub async fn insert_raw_subscription(pool: &SqlitePool, email: &str, city: &str) {
    sqlx::query("INSERT INTO subscriptions (email, city) VALUES ($1, $2)")
        .bind(email)
        .bind(city)
        .execute(pool)
        .await
        .expect("Failed to insert raw subscription.");
}

/// Spin up an instance of our application
/// and returns its address (i.e. http://localhost:XXXX)
pub async fn spawn_app() -> TestApp {
    // The first time `initialize` is invoked the code in `TRACING` is executed.
    // All other invocations will instead skip execution.
    Lazy::force(&TRACING);

    // Launch mock servers to stand in for the email API and the housing portal
    let email_server = MockServer::start().await;
    let portal_server = MockServer::start().await;

    // Randomise configuration to ensure test isolation
    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        // use a different database file for each test case
        c.database = test_database();
        // use a random OS port
        c.application.port = 0;
        // use the mock servers as email API and portal
        c.email_client.base_url = email_server.uri();
        c.email_client.timeout_milliseconds = 500;
        c.portal.base_url = portal_server.uri();
        c.portal.timeout_milliseconds = 500;
        c
    };

    let application = Application::build(configuration.clone())
        .await
        .expect("Failed to build application");
    let application_port = application.port();
    let engine = application.alert_engine();
    let _ = tokio::spawn(application.run_until_stopped());

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .build()
        .unwrap();

    TestApp {
        address: format!("http://127.0.0.1:{}", application_port),
        port: application_port,
        store: engine.store().clone(),
        engine,
        email_server,
        portal_server,
        api_client: client,
    }
}
