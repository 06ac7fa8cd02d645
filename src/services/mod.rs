//! Business logic, one service per aggregate.
//!
//! Services hold an `Arc<DbPool>` and are cheap to clone. The free functions
//! generic over `ConnectionTrait` run inside a caller's transaction.

pub mod charges;
pub mod clock;
pub mod comments;
pub mod consoles;
pub mod csv;
pub mod derived;
pub mod export;
pub mod import;
pub mod invoice;
pub mod lookups;
pub mod manifest;
pub mod notifications;
pub mod parties;
pub mod reference;
pub mod shipments;
pub mod spreadsheet;
pub mod staff_users;

/// Trims `value`, mapping blank strings to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::non_blank;

    #[test]
    fn blank_strings_become_none() {
        assert_eq!(non_blank(Some("  x ".into())), Some("x".to_string()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }
}
