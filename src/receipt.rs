// used to print out the receipt blocks
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::catalog::Price;
use crate::client::CartLine;
use crate::error::Result;
use crate::protocol::LookupResponse;

const RULE_WIDTH: usize = 40;
const NAME_WIDTH: usize = 24;
const AMOUNT_WIDTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedReason {
    Unknown,
    Malformed,
    Unreachable,
}

impl UnresolvedReason {
    fn label(&self) -> &'static str {
        match self {
            UnresolvedReason::Unknown => "[Unknown Product]",
            UnresolvedReason::Malformed => "[Malformed Code]",
            UnresolvedReason::Unreachable => "[Connection Error]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReceiptLine {
    Item {
        code: String,
        name: String,
        #[serde(serialize_with = "serialize_price")]
        price: Price,
    },
    // zero priced, keeps the raw code for auditing
    Unresolved {
        code: String,
        reason: UnresolvedReason,
    },
}

impl ReceiptLine {
    pub fn code(&self) -> &str {
        match self {
            ReceiptLine::Item { code, .. } | ReceiptLine::Unresolved { code, .. } => code,
        }
    }
    pub fn price(&self) -> Price {
        match self {
            ReceiptLine::Item { price, .. } => price.clone(),
            ReceiptLine::Unresolved { .. } => Price::zero(),
        }
    }
    pub fn is_resolved(&self) -> bool {
        matches!(self, ReceiptLine::Item { .. })
    }
}

impl From<&CartLine> for ReceiptLine {
    fn from(line: &CartLine) -> Self {
        let code = line.code.clone();
        match &line.response {
            LookupResponse::Found { name, price } => ReceiptLine::Item {
                code,
                name: name.clone(),
                price: price.clone(),
            },
            LookupResponse::NotFound => ReceiptLine::Unresolved {
                code,
                reason: UnresolvedReason::Unknown,
            },
            LookupResponse::Malformed { .. } => ReceiptLine::Unresolved {
                code,
                reason: UnresolvedReason::Malformed,
            },
            LookupResponse::Unreachable { .. } => ReceiptLine::Unresolved {
                code,
                reason: UnresolvedReason::Unreachable,
            },
        }
    }
}

fn serialize_price<S: serde::Serializer>(price: &Price, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(price.to_f64())
}

/// The priced summary of one cart. Lines keep the order of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    cart: usize,
    lines: Vec<ReceiptLine>,
    #[serde(serialize_with = "serialize_price")]
    total: Price,
}

impl Receipt {
    /// Folds resolved cart lines into a receipt. Only found products count
    /// towards the total.
    pub fn build(cart: usize, lines: &[CartLine]) -> Self {
        let lines: Vec<ReceiptLine> = lines.iter().map(ReceiptLine::from).collect();
        let total = lines
            .iter()
            .filter_map(|line| match line {
                ReceiptLine::Item { price, .. } => Some(price),
                ReceiptLine::Unresolved { .. } => None,
            })
            .sum();
        Self { cart, lines, total }
    }
    /// 1-based position of the cart in its batch.
    pub fn cart(&self) -> usize {
        self.cart
    }
    pub fn lines(&self) -> &[ReceiptLine] {
        &self.lines
    }
    pub fn total(&self) -> &Price {
        &self.total
    }
    pub fn resolved(&self) -> usize {
        self.lines.iter().filter(|line| line.is_resolved()).count()
    }
}

pub fn build_receipt(cart: usize, lines: &[CartLine]) -> Receipt {
    Receipt::build(cart, lines)
}

/// One receipt per cart, numbered from 1 in the given order.
pub fn build_receipts(carts: &[Vec<CartLine>]) -> Vec<Receipt> {
    carts
        .iter()
        .enumerate()
        .map(|(index, lines)| Receipt::build(index + 1, lines))
        .collect()
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rule = "-".repeat(RULE_WIDTH);
        writeln!(f, "Cart {}:", self.cart)?;
        writeln!(f, "{rule}")?;
        for line in &self.lines {
            match line {
                ReceiptLine::Item { name, price, .. } => {
                    writeln!(f, "{:<NAME_WIDTH$} ${:>AMOUNT_WIDTH$}", name, price.to_string())?;
                }
                ReceiptLine::Unresolved { code, reason } => {
                    writeln!(f, "{:<NAME_WIDTH$} ${:>AMOUNT_WIDTH$}", reason.label(), Price::zero().to_string())?;
                    writeln!(f, "(Barcode: {code})")?;
                }
            }
        }
        writeln!(f, "{rule}")?;
        writeln!(f, "{:<NAME_WIDTH$} ${:>AMOUNT_WIDTH$}", "Total:", self.total.to_string())
    }
}

pub fn render_receipts(receipts: &[Receipt]) -> String {
    receipts
        .iter()
        .map(|receipt| receipt.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_receipts(path: impl AsRef<Path>, receipts: &[Receipt]) -> Result<()> {
    fs::write(path, render_receipts(receipts))?;
    Ok(())
}
