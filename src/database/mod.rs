pub mod backend;
pub mod entity;
pub mod error;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod scope;
pub mod store;

pub use backend::EntityBackend;
pub use entity::{EntityMeta, GeneratedId, TenantAwareEntity};
pub use error::StoreError;
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryBackend;
pub use postgres::PgBackend;
pub use scope::Scope;
pub use store::TenantScopedStore;

/// Table and column names: ASCII letters, digits and underscores, not
/// starting with a digit.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_identifiers() {
        assert!(is_valid_identifier("users"));
        assert!(is_valid_identifier("_tenant_id2"));
        assert!(!is_valid_identifier("2users"));
        assert!(!is_valid_identifier("users; DROP TABLE"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
