//! Loading of the external inputs: the character encoding table, the product
//! table and the cart files.
//!
//! Tables are comma separated with a header record naming the columns
//! (`Character`,`Sequence` and `Product`,`Price`). Rows that cannot be used
//! are skipped with a warning rather than failing the whole load, the same
//! leniency the cart files get. Only a missing header column is fatal.

use std::fs;
use std::path::Path;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, PREFIX_LENGTH, Price};
use crate::encoding::{EncodingEntry, EncodingTable};
use crate::error::{BarscanError, Result};

pub const CHARACTER_COLUMN: &str = "Character";
pub const SEQUENCE_COLUMN: &str = "Sequence";
pub const PRODUCT_COLUMN: &str = "Product";
pub const PRICE_COLUMN: &str = "Price";

#[derive(Parser)]
#[grammar = "ingest.pest"]
pub struct IngestParser;

/// A parsed record together with the line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub fields: Vec<String>,
}

impl Record {
    fn cell(&self, column: usize) -> &str {
        self.fields.get(column).map(|field| field.trim()).unwrap_or("")
    }
}

/// Splits tabular text into records, dropping blank lines.
pub fn parse_records(text: &str) -> Result<Vec<Record>> {
    let text = text.trim_start_matches('\u{feff}');
    let mut records = Vec::new();
    for table in IngestParser::parse(Rule::table, text)? {
        for record in table.into_inner() {
            if record.as_rule() != Rule::record {
                continue;
            }
            let line = record.as_span().start_pos().line_col().0;
            let fields: Vec<String> = record.into_inner().map(field_value).collect();
            if fields.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            records.push(Record { line, fields });
        }
    }
    Ok(records)
}

fn field_value(field: Pair<Rule>) -> String {
    match field.into_inner().next() {
        Some(value) if value.as_rule() == Rule::quoted => value
            .into_inner()
            .next()
            .map(|escaped| escaped.as_str().replace("\"\"", "\""))
            .unwrap_or_default(),
        Some(value) => value.as_str().to_owned(),
        None => String::new(),
    }
}

fn column(header: &Record, name: &str) -> Result<usize> {
    header
        .fields
        .iter()
        .position(|field| field.trim() == name)
        .ok_or_else(|| BarscanError::Ingest {
            message: format!("missing '{name}' column"),
            line: Some(header.line),
        })
}

fn split_header(text: &str, what: &str) -> Result<(Record, Vec<Record>)> {
    let mut records = parse_records(text)?;
    if records.is_empty() {
        return Err(BarscanError::Ingest {
            message: format!("{what} has no header"),
            line: None,
        });
    }
    let header = records.remove(0);
    Ok((header, records))
}

// ------------- Encoding table -------------
pub fn parse_encoding_table(text: &str) -> Result<EncodingTable> {
    let (header, records) = split_header(text, "encoding table")?;
    let character_column = column(&header, CHARACTER_COLUMN)?;
    let sequence_column = column(&header, SEQUENCE_COLUMN)?;

    let mut table = EncodingTable::new();
    for record in records {
        let cell = record.cell(character_column);
        let mut characters = cell.chars();
        let character = match (characters.next(), characters.next()) {
            (Some(character), None) => character,
            _ => {
                warn!(line = record.line, character = %cell, "skipping encoding row without a single character");
                continue;
            }
        };
        // the first row for a character is the one that counts
        if table.resolve(character).is_some() {
            warn!(line = record.line, %character, "skipping repeated encoding row");
            continue;
        }
        let kept = EncodingEntry::new(character, record.cell(sequence_column))
            .and_then(|entry| table.keep(entry));
        if let Err(e) = kept {
            warn!(line = record.line, error = %e, "skipping encoding row");
        }
    }
    info!(characters = table.len(), bits = ?table.bits_per_character(), "encoding table loaded");
    Ok(table)
}

pub fn load_encoding_table(path: impl AsRef<Path>) -> Result<EncodingTable> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading encoding table");
    parse_encoding_table(&fs::read_to_string(path)?)
}

// ------------- Catalog -------------
/// Builds the catalog in row order, so a later product whose prefix collides
/// with an earlier one takes over its digest.
pub fn parse_catalog(text: &str, table: &EncodingTable) -> Result<Catalog> {
    let (header, records) = split_header(text, "product table")?;
    let product_column = column(&header, PRODUCT_COLUMN)?;
    let price_column = column(&header, PRICE_COLUMN)?;

    let mut builder = Catalog::builder(table);
    let mut skipped = 0usize;
    for record in records {
        let name = record.cell(product_column);
        if name.chars().count() < PREFIX_LENGTH {
            warn!(line = record.line, product = %name, "skipping product with a name shorter than {PREFIX_LENGTH} characters");
            skipped += 1;
            continue;
        }
        let Some(price) = Price::parse(record.cell(price_column)) else {
            warn!(line = record.line, product = %name, price = %record.cell(price_column), "skipping product without a usable price");
            skipped += 1;
            continue;
        };
        if let Err(e) = builder.insert(name, price) {
            warn!(line = record.line, product = %name, error = %e, "skipping product");
            skipped += 1;
        }
    }
    let catalog = builder.build();
    info!(products = catalog.len(), skipped, width = catalog.digest_width(), "catalog loaded");
    Ok(catalog)
}

pub fn load_catalog(path: impl AsRef<Path>, table: &EncodingTable) -> Result<Catalog> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading product table");
    parse_catalog(&fs::read_to_string(path)?, table)
}

// ------------- Carts -------------
/// Raw cart tokens in input order. Tokens are trimmed but not validated,
/// that is up to the cart driver.
pub fn parse_carts(text: &str) -> Result<Vec<Vec<String>>> {
    let mut carts = Vec::new();
    for parsed in IngestParser::parse(Rule::carts, text)? {
        for cart in parsed.into_inner() {
            if cart.as_rule() != Rule::cart {
                continue;
            }
            let codes: Vec<String> = cart
                .into_inner()
                .map(|code| code.as_str().trim().to_owned())
                .filter(|code| !code.is_empty())
                .collect();
            if !codes.is_empty() {
                carts.push(codes);
            }
        }
    }
    Ok(carts)
}

pub fn load_carts(path: impl AsRef<Path>) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading carts");
    parse_carts(&fs::read_to_string(path)?)
}
