//! Secret handling utilities.
//!
//! API keys are held as `SecretString` so they never show up in `Debug`
//! output or logs.

pub use secrecy::{ExposeSecret, SecretString};

/// The set of pre-shared API keys accepted by the auth gate.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: Vec<SecretString>,
}

impl ApiKeys {
    /// Parse a comma-separated key list. Blank entries are skipped.
    pub fn parse(raw: &str) -> Self {
        let keys = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| SecretString::from(k.to_string()))
            .collect();
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether `candidate` matches one of the configured keys.
    pub fn contains(&self, candidate: &str) -> bool {
        self.keys
            .iter()
            .any(|k| constant_time_eq(k.expose_secret().as_bytes(), candidate.as_bytes()))
    }
}

impl FromIterator<String> for ApiKeys {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(SecretString::from).collect(),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
