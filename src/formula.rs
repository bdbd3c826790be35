//! Formula text with a stable, content-derived identifier.
//!
//! A formula's identifier is the BLAKE3 digest of its text. Identical text
//! always maps to the same id, which is what the evaluator's parse cache keys on.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable identifier for a formula's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormulaId([u8; 32]);

impl FormulaId {
    /// Derives the id for the given formula text.
    #[must_use]
    pub fn of(text: &str) -> Self {
        Self(*blake3::hash(text.as_bytes()).as_bytes())
    }
}

impl fmt::Display for FormulaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell formulas apart in logs.
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// An immutable arithmetic formula.
///
/// Cloning is cheap; the text is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Formula {
    id: FormulaId,
    text: Arc<str>,
}

impl Formula {
    /// Creates a formula from its text.
    #[must_use]
    pub fn new(text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        Self {
            id: FormulaId::of(text),
            text: Arc::from(text),
        }
    }

    /// Returns the stable identifier.
    #[must_use]
    pub const fn id(&self) -> FormulaId {
        self.id
    }

    /// Returns the formula text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl From<String> for Formula {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Formula {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.text.to_string()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_shares_id() {
        let a = Formula::new("2*M/KM");
        let b = Formula::from("2*M/KM".to_string());
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), Formula::new("2*M / KM").id());
    }

    #[test]
    fn serializes_as_plain_text() {
        let f = Formula::new("ceil(L/60)");
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, "\"ceil(L/60)\"");
        let back: Formula = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn display_id_is_short_hex() {
        let id = Formula::new("10").id().to_string();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
