mod common;

use std::io::{BufReader, Write};
use std::sync::Arc;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use storefront_api::{
    entities::{category, sku},
    services::{
        import::{CatalogImporter, ImportError, ImportOutcome, JsonLinesSource},
        search::SearchService,
    },
};

use common::{response_json, StaticIndex, TestApp};

const BOOKS: &str = concat!(
    r#"{"b_cate":"小说","s_cate":"科幻","book_title":"三体","book_price":"23.00","book_img":"https://img.example.com/1.jpg","book_author":["刘慈欣"],"book_service":"当当发货"}"#,
    "\n",
    r#"{"b_cate":"小说","s_cate":"武侠","book_title":"天龙八部","book_price":96.5,"book_author":"金庸"}"#,
    "\n",
    "{broken\n",
    r#"{"b_cate":"小说","s_cate":"科幻","book_title":"免费书","book_price":"0"}"#,
    "\n",
);

fn write_books() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(BOOKS.as_bytes()).unwrap();
    file
}

/// Seeds the top-level 图书 category with its channel and returns an importer creating under it
async fn importer_under_books(app: &TestApp) -> CatalogImporter {
    app.seed_category(1, "图书", None).await;
    app.seed_channel(1, 1, "http://books.example.com", 1).await;
    let importer = CatalogImporter::new(app.state.db.clone());
    let root = importer.resolve_root("图书").await.unwrap();
    importer.create_categories_under(root)
}

#[tokio::test]
async fn import_creates_categories_and_priced_skus() {
    let app = TestApp::new().await;
    let file = write_books();

    let importer = importer_under_books(&app).await;
    let source = JsonLinesSource::new(BufReader::new(file.reopen().unwrap()));
    let summary = importer.import_all(source).await;

    assert_eq!(summary.created, 2);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.sku_ids.len(), 2);

    let scifi = category::Entity::find()
        .filter(category::Column::Name.eq("科幻"))
        .one(app.db())
        .await
        .unwrap()
        .expect("leaf category created");
    let novels = category::Entity::find_by_id(scifi.parent_id.unwrap())
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(novels.name, "小说");
    assert_eq!(novels.parent_id, Some(1));

    let book = sku::Entity::find()
        .filter(sku::Column::Name.eq("三体"))
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(book.category_id, scifi.id);
    assert_eq!(book.price, dec!(23.00));
    assert_eq!(book.cost_price, dec!(18.40));
    assert_eq!(book.market_price, dec!(29.90));
    assert_eq!(book.stock, 10);
    assert!(book.is_launched);
    assert_eq!(book.author.as_deref(), Some("刘慈欣"));
}

#[tokio::test]
async fn reimport_refreshes_existing_skus() {
    let app = TestApp::new().await;
    let importer = importer_under_books(&app).await;

    let first = importer
        .import_all(JsonLinesSource::new(BufReader::new(write_books().reopen().unwrap())))
        .await;
    let second = importer
        .import_all(JsonLinesSource::new(BufReader::new(write_books().reopen().unwrap())))
        .await;

    assert_eq!(second.created, 0);
    assert_eq!(second.updated, first.created);
    assert_eq!(sku::Entity::find().all(app.db()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_category_is_skipped_unless_creation_is_enabled() {
    let app = TestApp::new().await;
    let importer = CatalogImporter::new(app.state.db.clone());

    let doc = JsonLinesSource::new(BufReader::new(BOOKS.as_bytes()))
        .next()
        .unwrap()
        .unwrap();
    assert!(importer.import_document(&doc).await.is_err());

    app.seed_category(1, "图书", None).await;
    app.seed_category(2, "小说", Some(1)).await;
    app.seed_category(3, "科幻", Some(2)).await;
    assert_matches!(
        importer.import_document(&doc).await,
        Ok(ImportOutcome::Created(_))
    );
}

#[tokio::test]
async fn imported_skus_can_be_pushed_to_the_index() {
    let app = TestApp::new().await;
    let importer = importer_under_books(&app).await;
    let summary = importer
        .import_all(JsonLinesSource::new(BufReader::new(BOOKS.as_bytes())))
        .await;

    let index = Arc::new(StaticIndex::default());
    let search = SearchService::new(app.state.db.clone(), index.clone());
    assert_eq!(search.reindex(&summary.sku_ids).await.unwrap(), 2);

    let indexed = index.indexed.lock().unwrap();
    assert!(indexed.iter().any(|doc| doc.name == "天龙八部" && doc.text.contains("金庸")));
}

#[tokio::test]
async fn imported_leaf_categories_resolve_to_a_breadcrumb() {
    let app = TestApp::new().await;
    let importer = importer_under_books(&app).await;
    importer
        .import_all(JsonLinesSource::new(BufReader::new(BOOKS.as_bytes())))
        .await;

    let scifi = category::Entity::find()
        .filter(category::Column::Name.eq("科幻"))
        .one(app.db())
        .await
        .unwrap()
        .unwrap();

    let (status, body) = response_json(app.get(&format!("/api/v1/categories/{}", scifi.id)).await).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["cat1"]["category"]["name"], "图书");
    assert_eq!(body["cat1"]["url"], "http://books.example.com");
    assert_eq!(body["cat2"]["name"], "小说");
    assert_eq!(body["cat3"]["name"], "科幻");
}

#[tokio::test]
async fn second_level_categories_cannot_be_import_roots() {
    let app = TestApp::new().await;
    app.seed_category_chain().await;
    let importer = CatalogImporter::new(app.state.db.clone());

    assert_matches!(importer.resolve_root("计算机").await, Err(ImportError::InvalidRoot(_)));
    assert_matches!(importer.resolve_root("2").await, Err(ImportError::InvalidRoot(_)));
    assert_matches!(importer.resolve_root("404").await, Err(ImportError::InvalidRoot(_)));
    assert_matches!(importer.resolve_root("1").await, Ok(root) if root.name == "图书");
}
