mod common;

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::Value;

use common::{response_json, TestApp};

fn names(page: &Value) -> Vec<String> {
    page["data"]
        .as_array()
        .expect("data array")
        .iter()
        .map(|sku| sku["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn category_tree_groups_channels_and_nests_children() {
    let app = TestApp::new().await;
    app.seed_category_chain().await;
    app.seed_category(4, "数据库", Some(2)).await;
    app.seed_category(5, "文学", None).await;
    app.seed_category(6, "小说", Some(5)).await;
    app.seed_channel(2, 5, "http://novels.example.com", 1).await;

    let (status, body) = response_json(app.get("/api/v1/categories").await).await;
    assert_eq!(status, StatusCode::OK);

    let group = &body["1"];
    assert_eq!(group["channels"][0]["name"], "图书");
    assert_eq!(group["channels"][0]["url"], "http://books.example.com");
    assert_eq!(group["sub_cats"][0]["name"], "计算机");
    let leaves = group["sub_cats"][0]["sub_cats"].as_array().unwrap();
    assert_eq!(leaves.len(), 2);

    let novels = &body["2"];
    assert_eq!(novels["channels"][0]["id"], 5);
    assert_eq!(novels["sub_cats"][0]["name"], "小说");
    assert!(novels["sub_cats"][0]["sub_cats"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn category_tree_is_served_from_cache_on_repeat() {
    let app = TestApp::new().await;
    app.seed_category_chain().await;

    let first = app.get("/api/v1/categories").await;
    assert_eq!(first.headers()["x-cache"], "MISS");
    let (_, first_body) = response_json(first).await;

    // A change after the first read is not visible until the entry expires
    app.seed_category(7, "外语", None).await;
    app.seed_channel(1, 7, "http://lang.example.com", 2).await;

    let second = app.get("/api/v1/categories").await;
    assert_eq!(second.headers()["x-cache"], "HIT");
    let (status, second_body) = response_json(second).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn breadcrumb_walks_to_the_root_channel() {
    let app = TestApp::new().await;
    app.seed_category_chain().await;

    let (status, body) = response_json(app.get("/api/v1/categories/3").await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cat1"]["url"], "http://books.example.com");
    assert_eq!(body["cat1"]["category"]["name"], "图书");
    assert_eq!(body["cat2"]["name"], "计算机");
    assert_eq!(body["cat3"]["name"], "编程语言");
}

#[tokio::test]
async fn breadcrumb_rejects_broken_chains() {
    let app = TestApp::new().await;
    // Level 3 whose grandparent has no channel
    app.seed_category(1, "图书", None).await;
    app.seed_category(2, "计算机", Some(1)).await;
    app.seed_category(3, "编程语言", Some(2)).await;
    // Level 2 has no grandparent at all
    app.seed_category(8, "散装", None).await;
    app.seed_category(9, "孤儿", Some(8)).await;

    for uri in [
        "/api/v1/categories/3",
        "/api/v1/categories/9",
        "/api/v1/categories/999",
    ] {
        let (status, body) = response_json(app.get(uri).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["message"], "分类不存在", "{uri}");
    }
}

#[tokio::test]
async fn sku_listing_only_shows_launched_items_in_id_order() {
    let app = TestApp::new().await;
    app.seed_category_chain().await;
    app.seed_sku("Rust 编程之道", 3, dec!(89.00), 10, true).await;
    app.seed_sku("下架图书", 3, dec!(10.00), 99, false).await;
    app.seed_sku("深入理解计算机系统", 3, dec!(139.00), 50, true).await;

    let (status, body) = response_json(app.get("/api/v1/categories/3/skus").await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["Rust 编程之道", "深入理解计算机系统"]);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["per_page"], 5);
    assert_eq!(body["data"][0]["author"], "佚名");
}

#[tokio::test]
async fn sku_listing_honours_ordering() {
    let app = TestApp::new().await;
    app.seed_category_chain().await;
    app.seed_sku("中", 3, dec!(50.00), 5, true).await;
    app.seed_sku("贵", 3, dec!(99.00), 1, true).await;
    app.seed_sku("便宜", 3, dec!(9.90), 30, true).await;

    let (_, by_price) = response_json(app.get("/api/v1/categories/3/skus?ordering=price").await).await;
    assert_eq!(names(&by_price), vec!["便宜", "中", "贵"]);

    let (_, by_sales) = response_json(app.get("/api/v1/categories/3/skus?ordering=-sales").await).await;
    assert_eq!(names(&by_sales), vec!["便宜", "中", "贵"]);

    let (_, newest) = response_json(app.get("/api/v1/categories/3/skus?ordering=-create_time").await).await;
    assert_eq!(names(&newest).len(), 3);

    let (status, unknown) =
        response_json(app.get("/api/v1/categories/3/skus?ordering=password").await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&unknown), vec!["中", "贵", "便宜"]);
}

#[tokio::test]
async fn sku_listing_paginates_and_clamps_page_size() {
    let app = TestApp::new().await;
    app.seed_category_chain().await;
    for i in 0..7 {
        app.seed_sku(&format!("书{i}"), 3, dec!(20.00), i, true).await;
    }

    let (_, first) = response_json(app.get("/api/v1/categories/3/skus").await).await;
    assert_eq!(names(&first).len(), 5);
    assert_eq!(first["pagination"]["total_pages"], 2);

    let (_, second) = response_json(app.get("/api/v1/categories/3/skus?page=2").await).await;
    assert_eq!(names(&second), vec!["书5", "书6"]);

    let (status, past_end) = response_json(app.get("/api/v1/categories/3/skus?page=9").await).await;
    assert_eq!(status, StatusCode::OK);
    assert!(names(&past_end).is_empty());

    let (_, clamped) = response_json(app.get("/api/v1/categories/3/skus?page_size=500").await).await;
    assert_eq!(clamped["pagination"]["per_page"], 20);
    assert_eq!(names(&clamped).len(), 7);
}

#[tokio::test]
async fn unknown_category_lists_nothing() {
    let app = TestApp::new().await;

    let (status, body) = response_json(app.get("/api/v1/categories/404/skus").await).await;
    assert_eq!(status, StatusCode::OK);
    assert!(names(&body).is_empty());
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn hot_skus_are_best_sellers_capped_by_config() {
    let app = TestApp::new().await;
    app.seed_category_chain().await;
    app.seed_sku("冷门", 3, dec!(20.00), 1, true).await;
    app.seed_sku("畅销", 3, dec!(20.00), 500, true).await;
    app.seed_sku("下架畅销", 3, dec!(20.00), 900, false).await;
    app.seed_sku("次畅销", 3, dec!(20.00), 200, true).await;

    let (status, body) = response_json(app.get("/api/v1/categories/3/hotskus").await).await;
    assert_eq!(status, StatusCode::OK);
    let hot: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|sku| sku["name"].as_str().unwrap())
        .collect();
    assert_eq!(hot, vec!["畅销", "次畅销"]);
}

#[tokio::test]
async fn keywords_are_listed_in_insertion_order() {
    let app = TestApp::new().await;
    app.seed_keyword("Rust").await;
    app.seed_keyword("算法").await;

    let (status, body) = response_json(app.get("/api/v1/keywords").await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Rust");
    assert_eq!(body[1]["name"], "算法");
}

#[tokio::test]
async fn health_and_openapi_are_exposed() {
    let app = TestApp::new().await;

    let (status, body) = response_json(app.get("/health").await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");

    let response = app.get("/api-docs/openapi.json").await;
    assert!(response.headers().contains_key("x-request-id"));
    let (status, doc) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/v1/categories"].is_object());
}

#[tokio::test]
async fn absurd_page_numbers_return_an_empty_page() {
    let app = TestApp::new().await;
    app.seed_category_chain().await;
    app.seed_sku("三体", 3, dec!(23.00), 1, true).await;

    for page in ["18446744073709551615", "9223372036854775807"] {
        let uri = format!("/api/v1/categories/3/skus?page={page}&page_size=20");
        let (status, body) = response_json(app.get(&uri).await).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(names(&body).is_empty(), "{uri}");
        assert_eq!(body["pagination"]["total"], 1, "{uri}");
    }
}

#[tokio::test]
async fn keywords_are_capped_by_config() {
    let app = TestApp::new().await;
    let limit = app.state.config.catalog.keywords_limit;
    for i in 0..limit + 5 {
        app.seed_keyword(&format!("关键词{i}")).await;
    }

    let (status, body) = response_json(app.get("/api/v1/keywords").await).await;
    assert_eq!(status, StatusCode::OK);
    let keywords = body.as_array().unwrap();
    assert_eq!(keywords.len() as u64, limit);
    assert_eq!(keywords[0]["name"], "关键词0");
}
