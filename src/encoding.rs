// used to keep the one-to-one mapping between characters and their digests
use bimap::BiMap;

// the table itself is a HashMap with a fast hasher
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::HashMap;
use std::collections::hash_map::Values;
use std::sync::Arc;

// used to print out readable forms of an entry
use std::fmt;

// patterns are validated once, so the regex is compiled once
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{BarscanError, Result};

pub type SymbolHasher = BuildHasherDefault<SeaHasher>;

pub const NARROW: char = 'n';
pub const WIDE: char = 'w';

lazy_static! {
    static ref PATTERN: Regex = Regex::new(r"^[nw]+$").unwrap();
}

// ------------- EncodingEntry -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodingEntry {
    character: char,
    pattern: String,
    digest: String,
}

impl EncodingEntry {
    /// Builds an entry from a narrow/wide pattern such as `nnnwwnwnn`.
    /// The digest maps every wide symbol to `1` and every narrow one to `0`.
    pub fn new(character: char, pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();
        if !PATTERN.is_match(pattern) {
            return Err(BarscanError::Encoding(format!(
                "pattern '{pattern}' for '{character}' must only contain '{NARROW}' and '{WIDE}'"
            )));
        }
        let digest = pattern
            .chars()
            .map(|symbol| if symbol == WIDE { '1' } else { '0' })
            .collect();
        Ok(Self {
            character,
            pattern: pattern.to_owned(),
            digest,
        })
    }
    // Entries are immutable after creation, so only getters are exposed.
    pub fn character(&self) -> char {
        self.character
    }
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
    pub fn digest(&self) -> &str {
        &self.digest
    }
    pub fn width(&self) -> usize {
        self.digest.len()
    }
}
impl fmt::Display for EncodingEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}' {} ({})", self.character, self.pattern, self.digest)
    }
}

// ------------- EncodingTable -------------
#[derive(Debug, Default)]
pub struct EncodingTable {
    kept: HashMap<char, Arc<EncodingEntry>, SymbolHasher>,
    digests: BiMap<char, String>, // reverse index, used when decoding digests back into text
    width: Option<usize>,
}

impl EncodingTable {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn from_patterns<'a>(patterns: impl IntoIterator<Item = (char, &'a str)>) -> Result<Self> {
        let mut table = Self::new();
        for (character, pattern) in patterns {
            table.keep(EncodingEntry::new(character, pattern)?)?;
        }
        Ok(table)
    }
    /// Keeps an entry, replacing any earlier entry for the same character.
    /// The returned flag tells if the character was previously kept.
    ///
    /// The first kept entry fixes the digest width of the table, and two
    /// characters may not share a digest since decoding would be ambiguous.
    pub fn keep(&mut self, entry: EncodingEntry) -> Result<(Arc<EncodingEntry>, bool)> {
        let character = entry.character();
        if let Some(width) = self.width {
            if width != entry.width() {
                return Err(BarscanError::Encoding(format!(
                    "'{character}' has a {} bit digest but the table uses {width} bits",
                    entry.width()
                )));
            }
        }
        if let Some(other) = self.digests.get_by_right(entry.digest()) {
            if *other != character {
                return Err(BarscanError::Encoding(format!(
                    "'{character}' has digest {} which is already used by '{other}'",
                    entry.digest()
                )));
            }
        }
        self.width = Some(entry.width());
        self.digests.insert(character, entry.digest().to_owned());
        let keepsake = Arc::new(entry);
        let previously_kept = self.kept.insert(character, Arc::clone(&keepsake)).is_some();
        Ok((keepsake, previously_kept))
    }
    pub fn resolve(&self, character: char) -> Option<Arc<EncodingEntry>> {
        self.kept.get(&character).map(Arc::clone)
    }
    /// Concatenates the digests of the characters in `text`. Unknown
    /// characters are an error when `strict`, otherwise they are skipped.
    pub fn encode(&self, text: &str, strict: bool) -> Result<String> {
        let mut encoded = String::with_capacity(text.len() * self.width.unwrap_or(0));
        for character in text.chars() {
            match self.kept.get(&character) {
                Some(entry) => encoded.push_str(entry.digest()),
                None if strict => {
                    return Err(BarscanError::Encoding(format!(
                        "character '{character}' not found in the encoding table"
                    )));
                }
                None => (),
            }
        }
        Ok(encoded)
    }
    /// Reverse of a strict `encode`. Yields `None` unless every chunk of the
    /// digest belongs to a kept character.
    pub fn decode(&self, digest: &str) -> Option<String> {
        let width = self.width?;
        if digest.is_empty() || !digest.is_ascii() || digest.len() % width != 0 {
            return None;
        }
        digest
            .as_bytes()
            .chunks(width)
            .map(|chunk| {
                std::str::from_utf8(chunk)
                    .ok()
                    .and_then(|chunk| self.digests.get_by_right(chunk))
                    .copied()
            })
            .collect()
    }
    pub fn bits_per_character(&self) -> Option<usize> {
        self.width
    }
    pub fn iter(&self) -> Values<'_, char, Arc<EncodingEntry>> {
        self.kept.values()
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
