mod common;

use std::fs;
use std::time::Duration;

use barscan::client::BarcodeClient;
use barscan::receipt::{render_receipts, write_receipts};
use barscan::server::BarcodeServer;
use barscan::session;
use barscan::settings::{Mode, Settings};
use tempfile::TempDir;

fn settings_in(dir: &TempDir, carts: &str) -> Settings {
    fs::write(dir.path().join("bc3of9.csv"), common::encoding_csv()).unwrap();
    fs::write(dir.path().join("Products.csv"), common::products_csv()).unwrap();
    fs::write(dir.path().join("Carts.csv"), carts).unwrap();
    let mut settings = Settings::default();
    settings.server.port = 0;
    settings.data.encodings = dir.path().join("bc3of9.csv");
    settings.data.products = dir.path().join("Products.csv");
    settings.data.carts = dir.path().join("Carts.csv");
    settings.data.receipts = dir.path().join("receipts.txt");
    settings
}

#[test]
fn defaults_follow_the_reference_setup() {
    let settings = Settings::default();
    assert_eq!(settings.mode, Mode::Session);
    assert_eq!(settings.server.address(), "127.0.0.1:8888");
    assert_eq!(settings.data.carts.to_str(), Some("Carts.csv"));
    assert_eq!(settings.log.filter, "info");
    assert!(settings.http.port.is_none());
}

#[test]
fn a_config_file_overrides_the_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("barscan.toml");
    fs::write(
        &path,
        "mode = \"serve\"\n[server]\nport = 9999\n[client]\nmalformed_tokens = \"report\"\nconcurrent_carts = true\n",
    )
    .unwrap();
    let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
    assert_eq!(settings.mode, Mode::Serve);
    assert_eq!(settings.server.port, 9999);
    assert_eq!(settings.server.host, "127.0.0.1");
    assert!(settings.client.concurrent_carts);
    assert_eq!(settings.client.malformed_tokens, barscan::client::MalformedTokenPolicy::Report);
}

#[test]
fn zero_timeouts_mean_no_bound() {
    let defaults = Settings::default();
    assert_eq!(defaults.server.read_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(defaults.client.read_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(defaults.client.connect_timeout(), None);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("barscan.toml");
    fs::write(
        &path,
        "[server]\nread_timeout_ms = 0\n[client]\nread_timeout_ms = 0\nconnect_timeout_ms = 250\n",
    )
    .unwrap();
    let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
    assert_eq!(settings.server.read_timeout(), None);
    assert_eq!(settings.client.read_timeout(), None);
    assert_eq!(settings.client.connect_timeout(), Some(Duration::from_millis(250)));
}

#[tokio::test(flavor = "multi_thread")]
async fn an_unbounded_server_answers_every_lookup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("barscan.toml");
    fs::write(&path, "[server]\nport = 0\nread_timeout_ms = 0\n").unwrap();
    let settings = Settings::load_from(path.to_str().unwrap()).unwrap();

    let table = common::table();
    let catalog = common::catalog();
    let listener = BarcodeServer::bind(&settings.server.host, settings.server.port).await.unwrap();
    let server = BarcodeServer::new(catalog.clone())
        .with_read_timeout(settings.server.read_timeout())
        .spawn(listener)
        .unwrap();
    let client = BarcodeClient::new(server.address().to_string(), catalog.digest_width());
    let apple = common::digest_of(&table, "Apple");
    for _ in 0..20 {
        assert!(client.lookup_one(&apple).await.is_found());
    }
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn a_session_prices_every_cart() {
    let dir = TempDir::new().unwrap();
    let table = common::table();
    let apple = common::digest_of(&table, "Apple");
    let banana = common::digest_of(&table, "Banana");
    let unknown = common::unknown_digest(&table);
    let carts = format!("{apple},{banana},short\n---CART BREAK---\n{unknown},{apple}\n");
    let settings = settings_in(&dir, &carts);

    let receipts = session::run(&settings).await.unwrap();
    assert_eq!(receipts.len(), 2);
    assert_eq!(receipts[0].lines().len(), 2);
    assert_eq!(receipts[0].total().to_string(), "1.75");
    assert_eq!(receipts[1].lines().len(), 2);
    assert_eq!(receipts[1].resolved(), 1);
    assert_eq!(receipts[1].total().to_string(), "1.50");

    write_receipts(&settings.data.receipts, &receipts).unwrap();
    let saved = fs::read_to_string(&settings.data.receipts).unwrap();
    assert_eq!(saved, render_receipts(&receipts));
    assert!(saved.contains(&format!("(Barcode: {unknown})")));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_sessions_match_sequential_ones() {
    let dir = TempDir::new().unwrap();
    let table = common::table();
    let carts: Vec<String> = (0..6)
        .map(|cart| {
            (0..4)
                .map(|item| common::digest_of(&table, &common::item_name(cart * 4 + item)))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();
    let mut settings = settings_in(&dir, &carts.join("\n---CART BREAK---\n"));
    let sequential = session::run(&settings).await.unwrap();
    settings.client.concurrent_carts = true;
    let concurrent = session::run(&settings).await.unwrap();
    assert_eq!(sequential, concurrent);
    assert_eq!(concurrent.len(), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_inputs_fail_the_session() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings_in(&dir, "");
    settings.data.products = dir.path().join("missing.csv");
    assert!(session::run(&settings).await.is_err());
}
