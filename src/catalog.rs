// used for prices
use bigdecimal::BigDecimal;

// the catalog is a HashMap keyed by digest with a fast hasher
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::HashMap;
use std::collections::hash_map::Values;
use std::sync::Arc;

// used when parsing a string to a Price
use std::str::FromStr;
// used to print out readable forms of a price or an entry
use std::fmt;
// used to overload summation of prices
use std::iter::Sum;
use std::ops;

use tracing::warn;

use crate::encoding::EncodingTable;
use crate::error::{BarscanError, Result};

pub type DigestHasher = BuildHasherDefault<SeaHasher>;

/// Number of leading characters of a product name that make up its barcode.
pub const PREFIX_LENGTH: usize = 5;

// ------------- Price -------------
#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug, Default)]
pub struct Price(BigDecimal);

impl Price {
    pub fn zero() -> Self {
        Self::default()
    }
    /// Parses a non-negative decimal. Anything else yields `None`.
    pub fn parse(s: &str) -> Option<Price> {
        match BigDecimal::from_str(s.trim()) {
            Ok(decimal) if decimal >= BigDecimal::default() => Some(Price(decimal)),
            _ => None,
        }
    }
    pub fn from_f64(value: f64) -> Option<Price> {
        if value.is_finite() { Price::parse(&value.to_string()) } else { None }
    }
    // The wire carries prices as JSON numbers.
    pub fn to_f64(&self) -> f64 {
        self.0.to_string().parse().unwrap_or(f64::NAN)
    }
    pub fn rounded(&self) -> BigDecimal {
        self.0.round(2).with_scale(2)
    }
}
impl FromStr for Price {
    type Err = BarscanError;
    fn from_str(s: &str) -> Result<Self> {
        Price::parse(s).ok_or_else(|| BarscanError::Ingest {
            message: format!("'{s}' is not a non-negative price"),
            line: None,
        })
    }
}
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.rounded())
    }
}
impl ops::Add for Price {
    type Output = Price;
    fn add(self, other: Price) -> Price {
        Price(self.0 + other.0)
    }
}
impl<'a> ops::Add<&'a Price> for Price {
    type Output = Price;
    fn add(self, other: &'a Price) -> Price {
        Price(self.0 + &other.0)
    }
}
impl<'a> Sum<&'a Price> for Price {
    fn sum<I: Iterator<Item = &'a Price>>(iter: I) -> Price {
        iter.fold(Price::zero(), |total, price| total + price)
    }
}
impl ops::Deref for Price {
    type Target = BigDecimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ------------- CatalogEntry -------------
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CatalogEntry {
    name: String,
    price: Price,
    prefix: String,
    digest: String,
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn price(&self) -> &Price {
        &self.price
    }
    /// The uppercased leading characters of the name that were encoded.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
    pub fn digest(&self) -> &str {
        &self.digest
    }
}
impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ${} [{}]", self.name, self.price, self.prefix)
    }
}

/// Uppercased first `PREFIX_LENGTH` characters of a product name, or `None`
/// when the name is too short to carry a barcode.
pub fn barcode_prefix(name: &str) -> Option<String> {
    let name = name.trim();
    if name.chars().count() < PREFIX_LENGTH {
        return None;
    }
    Some(name.chars().take(PREFIX_LENGTH).flat_map(char::to_uppercase).collect())
}

// ------------- CatalogBuilder -------------
// The only way to put entries into a catalog. Inserts are applied in order,
// so when two names share a prefix the last one wins.
pub struct CatalogBuilder<'t> {
    table: &'t EncodingTable,
    width: usize,
    entries: HashMap<String, Arc<CatalogEntry>, DigestHasher>,
}

impl<'t> CatalogBuilder<'t> {
    pub fn new(table: &'t EncodingTable) -> Self {
        let width = table.bits_per_character().unwrap_or(0) * PREFIX_LENGTH;
        Self {
            table,
            width,
            entries: HashMap::default(),
        }
    }
    /// Encodes the name prefix and keeps the product under its digest.
    /// Returns the entry that was displaced, if any.
    pub fn insert(&mut self, name: &str, price: Price) -> Result<Option<Arc<CatalogEntry>>> {
        let name = name.trim();
        let prefix = barcode_prefix(name).ok_or_else(|| {
            BarscanError::Encoding(format!(
                "'{name}' is shorter than {PREFIX_LENGTH} characters"
            ))
        })?;
        let digest = self.table.encode(&prefix, true)?;
        if self.width == 0 || digest.len() != self.width {
            return Err(BarscanError::Encoding(format!(
                "'{name}' encodes to {} bits instead of {}",
                digest.len(),
                self.width
            )));
        }
        let entry = Arc::new(CatalogEntry {
            name: name.to_owned(),
            price,
            prefix,
            digest: digest.clone(),
        });
        let displaced = self.entries.insert(digest, entry);
        if let Some(displaced) = &displaced {
            warn!(digest = %displaced.digest(), replaced = %displaced.name(), by = %name, "colliding catalog digest");
        }
        Ok(displaced)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn build(self) -> Catalog {
        Catalog {
            entries: self.entries,
            width: self.width,
        }
    }
}

// ------------- Catalog -------------
/// Products keyed by the digest of their name prefix.
///
/// A built catalog is frozen: there is no way to add or remove entries, so
/// it can be shared between connection handlers as an `Arc<Catalog>`
/// without any locking.
#[derive(Debug)]
pub struct Catalog {
    entries: HashMap<String, Arc<CatalogEntry>, DigestHasher>,
    width: usize,
}

impl Catalog {
    pub fn builder(table: &EncodingTable) -> CatalogBuilder<'_> {
        CatalogBuilder::new(table)
    }
    pub fn lookup_by_digest(&self, digest: &str) -> Option<Arc<CatalogEntry>> {
        self.entries.get(digest).map(Arc::clone)
    }
    /// Fixed number of binary digits in every request.
    pub fn digest_width(&self) -> usize {
        self.width
    }
    pub fn iter(&self) -> Values<'_, String, Arc<CatalogEntry>> {
        self.entries.values()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
