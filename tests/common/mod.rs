#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use rsa::RsaPrivateKey;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use storefront_api::{
    config::AppConfig,
    db,
    entities::{category, channel, keyword, order_info, sku},
    services::{
        alipay::{canonical_content, AlipayClient},
        search::{SearchError, SearchHits, SearchIndex, SkuDocument},
    },
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_USER_ID: i32 = 1;
pub const OTHER_USER_ID: i32 = 2;
pub const TEST_GATEWAY: &str = "https://openapi.alipaydev.com/gateway.do";

struct TestKeys {
    app: RsaPrivateKey,
    platform: RsaPrivateKey,
}

fn keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = rand::thread_rng();
        TestKeys {
            app: RsaPrivateKey::new(&mut rng, 1024).expect("app key"),
            platform: RsaPrivateKey::new(&mut rng, 1024).expect("platform key"),
        }
    })
}

/// Merchant client the application uses
pub fn merchant_client() -> AlipayClient {
    let keys = keys();
    AlipayClient::new(
        "2016091200490210",
        TEST_GATEWAY,
        Some("http://127.0.0.1:8080/pay_success.html".into()),
        keys.app.clone(),
        keys.platform.to_public_key(),
    )
}

/// Signs callback parameters the way the payment platform does
pub fn platform_sign(params: &BTreeMap<String, String>) -> String {
    let keys = keys();
    let platform = AlipayClient::new(
        "platform",
        "unused",
        None,
        keys.platform.clone(),
        keys.app.to_public_key(),
    );
    platform
        .sign_content(&canonical_content(params))
        .expect("sign callback")
}

/// Search index that answers every query with a fixed hit list
#[derive(Default)]
pub struct StaticIndex {
    pub hits: Vec<i32>,
    pub indexed: std::sync::Mutex<Vec<SkuDocument>>,
}

impl StaticIndex {
    pub fn with_hits(hits: Vec<i32>) -> Self {
        Self {
            hits,
            indexed: Default::default(),
        }
    }
}

#[async_trait]
impl SearchIndex for StaticIndex {
    async fn search(&self, _text: &str, offset: u64, limit: u64) -> Result<SearchHits, SearchError> {
        let ids = self
            .hits
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .copied()
            .collect();
        Ok(SearchHits {
            total: self.hits.len() as u64,
            ids,
        })
    }

    async fn index_documents(&self, documents: &[SkuDocument]) -> Result<usize, SearchError> {
        let mut indexed = self.indexed.lock().expect("index lock");
        indexed.extend(documents.iter().cloned());
        Ok(documents.len())
    }
}

/// Application state over a throwaway SQLite database
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_search(Arc::new(StaticIndex::default())).await
    }

    pub async fn with_search(index: Arc<dyn SearchIndex>) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.catalog.default_page_size = 5;
        cfg.catalog.max_page_size = 20;
        cfg.catalog.hot_skus_limit = 2;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(
            Arc::new(pool),
            cfg,
            index,
            Arc::new(merchant_client()),
        );
        let token = state
            .auth
            .issue_token(TEST_USER_ID, Some("reader"))
            .expect("issue test token");
        let router = storefront_api::build_router(state.clone());

        Self {
            router,
            state,
            token,
            _dir: dir,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    pub fn token_for(&self, user_id: i32) -> String {
        self.state
            .auth
            .issue_token(user_id, None)
            .expect("issue token")
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).expect("request"))
            .await
            .expect("router response")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, None).await
    }

    pub async fn get_authed(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, Some(&self.token)).await
    }

    pub async fn put_authed(&self, uri: &str) -> Response {
        self.request(Method::PUT, uri, Some(&self.token)).await
    }

    // Seeding helpers

    pub async fn seed_category(&self, id: i32, name: &str, parent_id: Option<i32>) {
        category::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            parent_id: Set(parent_id),
        }
        .insert(self.db())
        .await
        .expect("insert category");
    }

    pub async fn seed_channel(&self, group_id: i32, category_id: i32, url: &str, sequence: i32) {
        channel::ActiveModel {
            group_id: Set(group_id),
            category_id: Set(category_id),
            url: Set(url.to_string()),
            sequence: Set(sequence),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert channel");
    }

    /// Books > Computing > Programming, linked to channel group 1
    pub async fn seed_category_chain(&self) {
        self.seed_category(1, "图书", None).await;
        self.seed_category(2, "计算机", Some(1)).await;
        self.seed_category(3, "编程语言", Some(2)).await;
        self.seed_channel(1, 1, "http://books.example.com", 1).await;
    }

    pub async fn seed_sku(
        &self,
        name: &str,
        category_id: i32,
        price: Decimal,
        sales: i32,
        is_launched: bool,
    ) -> sku::Model {
        sku::ActiveModel {
            name: Set(name.to_string()),
            caption: Set(None),
            category_id: Set(category_id),
            price: Set(price),
            cost_price: Set(price),
            market_price: Set(price),
            stock: Set(10),
            sales: Set(sales),
            comments: Set(0),
            is_launched: Set(is_launched),
            default_image_url: Set(Some(format!("{}.jpg", name))),
            author: Set(Some("佚名".to_string())),
            desc_detail: Set(None),
            desc_service: Set(None),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert sku")
    }

    pub async fn seed_keyword(&self, name: &str) {
        keyword::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert keyword");
    }

    pub async fn seed_order(
        &self,
        order_id: &str,
        user_id: i32,
        pay_method: order_info::PayMethod,
        status: order_info::OrderStatus,
        total_amount: Decimal,
    ) {
        order_info::ActiveModel {
            order_id: Set(order_id.to_string()),
            user_id: Set(user_id),
            total_count: Set(1),
            total_amount: Set(total_amount),
            freight: Set(Decimal::new(1000, 2)),
            pay_method: Set(pay_method),
            status: Set(status),
            create_time: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("insert order");
    }
}

pub async fn response_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json body")
    };
    (status, value)
}
