mod common;

use barscan::catalog::Price;
use barscan::client::{BarcodeClient, CartLine, MalformedTokenPolicy};
use barscan::protocol::LookupResponse;
use barscan::receipt::{ReceiptLine, UnresolvedReason, build_receipt, build_receipts, render_receipts};
use tokio::net::TcpListener;

fn price(s: &str) -> Price {
    Price::parse(s).unwrap()
}

fn found(name: &str, amount: &str) -> LookupResponse {
    LookupResponse::Found { name: name.into(), price: price(amount) }
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_tokens_are_dropped_from_the_cart() {
    let table = common::table();
    let catalog = common::catalog();
    let server = common::start_server(catalog.clone()).await;
    let client = BarcodeClient::new(server.address().to_string(), catalog.digest_width());

    let d1 = common::digest_of(&table, "Apple");
    let d2 = common::digest_of(&table, "Banana");
    let d3 = common::digest_of(&table, "Cherry Pie");
    let cart = vec![d1.clone(), d2.clone(), "bad".to_string(), d3.clone()];
    let lines = client.lookup_cart(&cart).await;

    let codes: Vec<&str> = lines.iter().map(|line| line.code.as_str()).collect();
    assert_eq!(codes, vec![d1.as_str(), d2.as_str(), d3.as_str()]);
    let receipt = build_receipt(1, &lines);
    assert_eq!(receipt.lines().len(), 3);
    assert_eq!(receipt.resolved(), 3);
    assert_eq!(receipt.total(), &(price("1.50") + price("0.25") + price("4.99")));
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn full_width_codes_are_always_asked_for() {
    let table = common::table();
    let catalog = common::catalog();
    let server = common::start_server(catalog.clone()).await;
    let client = BarcodeClient::new(server.address().to_string(), catalog.digest_width());

    let garbled = "2".repeat(catalog.digest_width());
    let cart = vec![common::digest_of(&table, "Apple"), garbled.clone(), "bad".to_string()];
    let lines = client.lookup_cart(&cart).await;
    assert_eq!(lines.len(), 2);
    assert!(matches!(lines[1].response, LookupResponse::Malformed { .. }));
    let receipt = build_receipt(1, &lines);
    assert_eq!(
        receipt.lines()[1],
        ReceiptLine::Unresolved { code: garbled, reason: UnresolvedReason::Malformed }
    );
    assert!(receipt.to_string().contains("[Malformed Code]"));
    assert_eq!(receipt.total(), &price("1.50"));
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn the_report_policy_keeps_malformed_tokens() {
    let table = common::table();
    let catalog = common::catalog();
    let server = common::start_server(catalog.clone()).await;
    let client = BarcodeClient::new(server.address().to_string(), catalog.digest_width())
        .with_policy(MalformedTokenPolicy::Report);

    let cart = vec!["bad".to_string(), common::digest_of(&table, "Apple")];
    let lines = client.lookup_cart(&cart).await;
    assert_eq!(lines.len(), 2);
    assert!(matches!(lines[0].response, LookupResponse::Malformed { .. }));
    let receipt = build_receipt(1, &lines);
    assert_eq!(
        receipt.lines()[0],
        ReceiptLine::Unresolved { code: "bad".into(), reason: UnresolvedReason::Malformed }
    );
    assert_eq!(receipt.total(), &price("1.50"));
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_codes_are_zero_priced_lines() {
    let table = common::table();
    let catalog = common::catalog();
    let server = common::start_server(catalog.clone()).await;
    let client = BarcodeClient::new(server.address().to_string(), catalog.digest_width());

    let unknown = common::unknown_digest(&table);
    let lines = client.lookup_cart(&[unknown.clone(), common::digest_of(&table, "Banana")]).await;
    let receipt = build_receipt(1, &lines);
    assert_eq!(receipt.lines()[0], ReceiptLine::Unresolved { code: unknown, reason: UnresolvedReason::Unknown });
    assert_eq!(receipt.lines()[0].price(), Price::zero());
    assert_eq!(receipt.total(), &price("0.25"));
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn an_unreachable_server_does_not_abort_the_cart() {
    let table = common::table();
    let catalog = common::catalog();
    // grab a free port and release it again so nothing listens there
    let address = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let client = BarcodeClient::new(address.to_string(), catalog.digest_width());

    let cart = vec![common::digest_of(&table, "Apple"), common::digest_of(&table, "Banana")];
    let lines = client.lookup_cart(&cart).await;
    assert_eq!(lines.len(), 2);
    let receipt = build_receipt(1, &lines);
    assert!(receipt.lines().iter().all(|line| matches!(
        line,
        ReceiptLine::Unresolved { reason: UnresolvedReason::Unreachable, .. }
    )));
    assert_eq!(receipt.total(), &Price::zero());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_carts_keep_their_order() {
    let table = common::table();
    let catalog = common::catalog();
    let server = common::start_server(catalog.clone()).await;
    let client = BarcodeClient::new(server.address().to_string(), catalog.digest_width());

    let carts: Vec<Vec<String>> = (0..10)
        .map(|cart| {
            (0..5)
                .map(|item| common::digest_of(&table, &common::item_name(cart * 5 + item)))
                .collect()
        })
        .collect();
    let sequential = client.lookup_carts(&carts).await;
    let concurrent = client.lookup_carts_concurrently(&carts).await;
    assert_eq!(sequential, concurrent);

    let receipts = build_receipts(&concurrent);
    for (cart, receipt) in receipts.iter().enumerate() {
        assert_eq!(receipt.cart(), cart + 1);
        let names: Vec<String> = (0..5).map(|item| common::item_name(cart * 5 + item)).collect();
        let printed: Vec<String> = receipt
            .lines()
            .iter()
            .map(|line| match line {
                ReceiptLine::Item { name, .. } => name.clone(),
                other => panic!("unexpected line {other:?}"),
            })
            .collect();
        assert_eq!(printed, names);
    }
    server.stop().await.unwrap();
}

#[test]
fn receipts_render_like_the_reference_layout() {
    let lines = vec![
        CartLine::new("A", found("Apple", "1.50")),
        CartLine::new("CODE", LookupResponse::NotFound),
        CartLine::new("0101", LookupResponse::Malformed { reason: String::new() }),
        CartLine::new("C", found("Cherry Pie", "4.99")),
    ];
    let receipt = build_receipt(1, &lines);
    let expected = "Cart 1:\n\
        ----------------------------------------\n\
        Apple                    $  1.50\n\
        [Unknown Product]        $  0.00\n\
        (Barcode: CODE)\n\
        [Malformed Code]         $  0.00\n\
        (Barcode: 0101)\n\
        Cherry Pie               $  4.99\n\
        ----------------------------------------\n\
        Total:                   $  6.49\n";
    assert_eq!(receipt.to_string(), expected);
}

#[test]
fn receipts_are_numbered_and_joined() {
    let carts = vec![
        vec![CartLine::new("A", found("Apple", "1.50"))],
        vec![],
        vec![CartLine::new("X", LookupResponse::Unreachable { reason: "refused".into() })],
    ];
    let receipts = build_receipts(&carts);
    assert_eq!(receipts.iter().map(|receipt| receipt.cart()).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(receipts[1].total(), &Price::zero());
    let rendered = render_receipts(&receipts);
    assert!(rendered.starts_with("Cart 1:\n"));
    assert!(rendered.contains("\n\nCart 2:\n"));
    assert!(rendered.contains("[Connection Error]"));
    assert!(rendered.contains("(Barcode: X)"));
}

#[test]
fn receipts_serialize_for_the_gateway() {
    let receipt = build_receipt(2, &[CartLine::new("A", found("Apple", "1.50")), CartLine::new("B", LookupResponse::NotFound)]);
    let value = serde_json::to_value(&receipt).unwrap();
    assert_eq!(value["cart"], 2);
    assert_eq!(value["total"], 1.5);
    assert_eq!(value["lines"][0]["status"], "item");
    assert_eq!(value["lines"][0]["price"], 1.5);
    assert_eq!(value["lines"][1]["status"], "unresolved");
    assert_eq!(value["lines"][1]["reason"], "unknown");
}
