//! ID generation utilities.

use chrono::Utc;
use rand::Rng;
use ulid::Ulid;
use uuid::Uuid;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are lexicographically sortable, so rows keyed by them list in
    /// creation order.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a human-readable application number.
    ///
    /// Format: `{prefix}-{last 6 digits of the millisecond clock}{1000..=9999}`,
    /// e.g. `BSU-4821937312`. Uniqueness is enforced by the database.
    #[must_use]
    pub fn generate_application_number(&self, prefix: &str) -> String {
        let millis = Utc::now().timestamp_millis().rem_euclid(1_000_000);
        let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
        format!("{prefix}-{millis:06}{suffix}")
    }

    /// Generate a cryptographically secure random token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        // Use UUID v4 for tokens (no time component for security)
        Uuid::new_v4().simple().to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_eq!(id2.len(), 26);
        assert_ne!(id1, id2);
        assert_eq!(id1, id1.to_lowercase());
    }

    #[test]
    fn test_generate_application_number() {
        let id_gen = IdGenerator::new();
        let number = id_gen.generate_application_number("BSU");

        let (prefix, digits) = number.split_once('-').unwrap();
        assert_eq!(prefix, "BSU");
        assert_eq!(digits.len(), 10);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));

        let suffix: u16 = digits[6..].parse().unwrap();
        assert!((1000..=9999).contains(&suffix));
    }

    #[test]
    fn test_generate_token() {
        let id_gen = IdGenerator::new();
        let token = id_gen.generate_token();

        assert_eq!(token.len(), 32); // Simple UUID without hyphens
        assert_ne!(token, id_gen.generate_token());
    }
}
