//! Barscan – a small concurrent barcode resolution service.
//!
//! A server holds an in-memory catalog of products keyed by the binary digest
//! of their barcode, and answers lookups over TCP. A client drives shopping
//! carts through the server, one connection per code, and folds the answers
//! into priced receipts.
//!
//! * An [`encoding::EncodingTable`] maps every character to a narrow/wide bar
//!   pattern and its binary digest (`w` → `1`, `n` → `0`).
//! * A [`catalog::Catalog`] maps the concatenated digests of the first five
//!   uppercased characters of a product name to the product and its
//!   [`catalog::Price`]. It is frozen once built and shared as `Arc<Catalog>`.
//! * The [`protocol`] module holds the wire contract: the request is the bare
//!   digest, the response a single JSON object, one exchange per connection.
//! * The [`server::BarcodeServer`] runs one task per accepted connection; a
//!   failing connection never takes the accept loop down.
//! * The [`client::BarcodeClient`] resolves carts in order and turns transport
//!   failures into result values.
//! * A [`receipt::Receipt`] sums the found products of a cart and keeps
//!   everything else as zero priced lines carrying the raw code.
//!
//! ## Quick Start
//! ```
//! use barscan::catalog::{Catalog, Price};
//! use barscan::encoding::EncodingTable;
//! use barscan::protocol::LookupResponse;
//! use barscan::server::resolve;
//!
//! let table = EncodingTable::from_patterns([
//!     ('A', "nnnnnnnnn"), ('P', "nnnnnnnnw"), ('L', "nnnnnnnwn"), ('E', "nnnnnnnww"),
//! ]).unwrap();
//! let mut builder = Catalog::builder(&table);
//! builder.insert("Apple", Price::parse("1.50").unwrap()).unwrap();
//! let catalog = builder.build();
//! let digest = table.encode("APPLE", true).unwrap();
//! assert_eq!(digest.len(), 45);
//! assert_eq!(
//!     resolve(&catalog, digest.as_bytes()),
//!     LookupResponse::Found { name: "Apple".into(), price: Price::parse("1.5").unwrap() }
//! );
//! ```
//!
//! ## Known limitations
//! Products are identified by their first five characters only, so two names
//! sharing that prefix cannot be told apart; the one loaded last wins. The
//! protocol has no framing, so responses end where the connection ends.

pub mod catalog;
pub mod client;
pub mod encoding;
pub mod error;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod protocol;
pub mod receipt;
pub mod server;
pub mod session;
pub mod settings;
