#![allow(dead_code)]

use std::sync::Arc;

use barscan::catalog::{Catalog, barcode_prefix};
use barscan::encoding::EncodingTable;
use barscan::ingest::{parse_catalog, parse_encoding_table};
use barscan::server::{BarcodeServer, RunningServer};

// Every character gets the 9 bit pattern of its position, so 'A' is all narrow.
pub const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-.$/+%";
pub const BITS: usize = 9;
pub const GENERATED_ITEMS: usize = 60;

pub fn pattern(index: usize) -> String {
    (0..BITS)
        .rev()
        .map(|bit| if (index >> bit) & 1 == 1 { 'w' } else { 'n' })
        .collect()
}

pub fn encoding_csv() -> String {
    let mut csv = String::from("Character,Sequence\n");
    for (index, character) in ALPHABET.chars().enumerate() {
        csv.push_str(&format!("{character},{}\n", pattern(index)));
    }
    csv
}

pub fn item_name(index: usize) -> String {
    format!("{index:02}ITEM widget")
}

pub fn item_price(index: usize) -> String {
    format!("{}.{:02}", index + 1, index)
}

// Three hand written products, one quoted, sixty generated ones and four
// rows that ingestion has to skip.
pub fn products_csv() -> String {
    let mut csv = String::from("Product,Price\n");
    csv.push_str("Apple,1.50\n");
    csv.push_str("Banana,0.25\n");
    csv.push_str("Cherry Pie,4.99\n");
    csv.push_str("\"Donut, glazed\",1.25\n");
    csv.push_str("Fig,0.80\n");
    csv.push_str("Grape Juice,\n");
    csv.push_str("Honeydew,-2.00\n");
    csv.push_str("~Kiwi crate,3.00\n");
    for index in 0..GENERATED_ITEMS {
        csv.push_str(&format!("{},{}\n", item_name(index), item_price(index)));
    }
    csv
}

pub const EXPECTED_PRODUCTS: usize = 4 + GENERATED_ITEMS;

pub fn table() -> EncodingTable {
    parse_encoding_table(&encoding_csv()).unwrap()
}

pub fn catalog() -> Arc<Catalog> {
    Arc::new(parse_catalog(&products_csv(), &table()).unwrap())
}

/// Digest a product name is looked up by.
pub fn digest_of(table: &EncodingTable, name: &str) -> String {
    table.encode(&barcode_prefix(name).unwrap(), true).unwrap()
}

/// Well formed, but not the digest of any product.
pub fn unknown_digest(table: &EncodingTable) -> String {
    table.encode("ZZZZZ", true).unwrap()
}

pub async fn start_server(catalog: Arc<Catalog>) -> RunningServer {
    let listener = BarcodeServer::bind("127.0.0.1", 0).await.unwrap();
    BarcodeServer::new(catalog).spawn(listener).unwrap()
}
