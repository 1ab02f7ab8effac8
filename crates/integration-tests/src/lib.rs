//! Integration tests for Nom Naa.
//!
//! # Running Tests
//!
//! ```bash
//! # Point at a scratch database; migrations are applied automatically
//! export NN_TEST_DATABASE_URL=postgres://localhost/nom_naa_test
//! cargo test -p nom-naa-integration-tests
//! ```
//!
//! Without `NN_TEST_DATABASE_URL` every database-backed test returns early.
//! Fixtures use random names so tests can share one database and run in
//! parallel.

use std::net::SocketAddr;

use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use nom_naa_api::config::{ApiConfig, LogFormat};
use nom_naa_api::db::carts::CartRepository;
use nom_naa_api::db::regions::RegionRepository;
use nom_naa_api::models::address::{Address, AddressInput, District, Province, SubDistrict};
use nom_naa_api::models::cart::Cart;
use nom_naa_api::models::snack::Snack;
use nom_naa_api::models::user::User;
use nom_naa_api::routes;
use nom_naa_api::services::address::{AddressBook, RegionDirectory};
use nom_naa_api::services::auth::{AuthService, Registration};
use nom_naa_api::services::catalog::{CatalogService, SnackForm};
use nom_naa_api::state::AppState;
use nom_naa_core::{SnackId, UserId};

/// Environment variable naming the test database.
pub const TEST_DATABASE_URL: &str = "NN_TEST_DATABASE_URL";

/// Password given to every fixture user.
pub const TEST_PASSWORD: &str = "correct-horse-9";

/// Region codes reserved for fixtures, outside the real Thai code ranges.
pub const TEST_PROVINCE: i32 = 9001;
pub const TEST_DISTRICT: i32 = 900_101;
pub const TEST_SUB_DISTRICT: i32 = 90_010_101;

/// A short random suffix for unique fixture names.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", id.get(..12).unwrap_or(&id))
}

/// Connection to the test database plus fixture helpers.
pub struct TestContext {
    pub pool: PgPool,
    pub regions: RegionDirectory,
    database_url: String,
}

impl TestContext {
    /// Connect and migrate, or `None` when no test database is configured.
    ///
    /// # Panics
    ///
    /// Panics if the database is configured but unreachable.
    pub async fn connect() -> Option<Self> {
        let database_url = std::env::var(TEST_DATABASE_URL).ok()?;
        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("../api/migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        RegionRepository::new(&pool)
            .upsert_all(
                &[Province {
                    code: TEST_PROVINCE,
                    name_th: "จังหวัดทดสอบ".to_owned(),
                    name_en: "Test Province".to_owned(),
                }],
                &[District {
                    code: TEST_DISTRICT,
                    province_code: TEST_PROVINCE,
                    name_th: "อำเภอทดสอบ".to_owned(),
                    name_en: "Test District".to_owned(),
                }],
                &[SubDistrict {
                    code: TEST_SUB_DISTRICT,
                    district_code: TEST_DISTRICT,
                    province_code: TEST_PROVINCE,
                    name_th: "ตำบลทดสอบ".to_owned(),
                    name_en: "Test Sub-district".to_owned(),
                    postal_code: "99999".to_owned(),
                }],
            )
            .await
            .expect("Failed to seed test regions");

        Some(Self {
            regions: RegionDirectory::new(pool.clone()),
            pool,
            database_url,
        })
    }

    /// Registration form for a fresh random user.
    #[must_use]
    pub fn registration() -> Registration {
        let username = unique("t");
        Registration {
            email: format!("{username}@example.com"),
            username,
            first_name: "Somchai".to_owned(),
            last_name: "Jaidee".to_owned(),
            phone_number: "0812345678".to_owned(),
            password: TEST_PASSWORD.to_owned(),
            confirm_password: TEST_PASSWORD.to_owned(),
        }
    }

    /// Register a fresh user (which also opens their first cart).
    pub async fn user(&self) -> User {
        AuthService::new(&self.pool)
            .register(&Self::registration())
            .await
            .expect("Failed to register test user")
    }

    /// Create a snack with the given price and stock.
    pub async fn snack(&self, price: &str, stock: i32) -> Snack {
        CatalogService::new(&self.pool)
            .create(SnackForm {
                name: Some(unique("snack")),
                price: Some(price.to_owned()),
                quantity: Some(stock.to_string()),
                snack_type: Some("test".to_owned()),
                description: None,
                image: None,
            })
            .await
            .expect("Failed to create test snack")
    }

    /// Overwrite a snack's stock.
    pub async fn set_stock(&self, id: SnackId, stock: i32) {
        CatalogService::new(&self.pool)
            .update(
                id,
                SnackForm {
                    quantity: Some(stock.to_string()),
                    ..SnackForm::default()
                },
            )
            .await
            .expect("Failed to update test snack");
    }

    /// Current stock of a snack.
    pub async fn stock_of(&self, id: SnackId) -> i32 {
        CatalogService::new(&self.pool)
            .detail(id)
            .await
            .expect("Failed to load test snack")
            .snack
            .quantity
    }

    /// Add a shipping address in the fixture region.
    pub async fn address(&self, user_id: UserId) -> Address {
        AddressBook::new(&self.pool, &self.regions)
            .create(user_id, &Self::address_input())
            .await
            .expect("Failed to create test address")
    }

    /// Address body in the fixture region.
    #[must_use]
    pub fn address_input() -> AddressInput {
        AddressInput {
            province_code: TEST_PROVINCE,
            district_code: TEST_DISTRICT,
            sub_district_code: TEST_SUB_DISTRICT,
            address_detail: "99/1 Moo 2, Test Road".to_owned(),
        }
    }

    /// The user's pending cart.
    pub async fn pending_cart(&self, user_id: UserId) -> Cart {
        CartRepository::new(&self.pool)
            .pending_for_user(user_id)
            .await
            .expect("Failed to load pending cart")
    }

    /// Number of pending carts the user has.
    pub async fn pending_cart_count(&self, user_id: UserId) -> i64 {
        CartRepository::new(&self.pool)
            .count_pending(user_id)
            .await
            .expect("Failed to count pending carts")
    }

    /// Serve the full application on an ephemeral port and return its base URL.
    pub async fn spawn_server(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");

        let config = ApiConfig {
            database_url: SecretString::from(self.database_url.clone()),
            host: addr.ip(),
            port: addr.port(),
            base_url: url::Url::parse(&format!("http://{addr}")).expect("Valid base URL"),
            max_upload_mb: 1,
            cors_origins: Vec::new(),
            log_format: LogFormat::Pretty,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 0.0,
            sentry_traces_sample_rate: 0.0,
        };
        let app = routes::app(AppState::new(config, self.pool.clone()));

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test server failed");
        });

        format!("http://{addr}")
    }
}
