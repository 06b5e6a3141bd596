//! Predicate evaluation against a cookie.

use monster_core::Cookie;

use crate::schema::Predicate;

impl Predicate {
    /// Evaluate this predicate tree against a cookie.
    pub fn matches(&self, cookie: &Cookie) -> bool {
        match self {
            Predicate::All(parts) => parts.iter().all(|p| p.matches(cookie)),
            Predicate::Any(parts) => parts.iter().any(|p| p.matches(cookie)),
            Predicate::Not(inner) => !inner.matches(cookie),
            Predicate::Always(value) => *value,
            Predicate::IdEquals(id) => cookie.identifier == *id,
            Predicate::IdContains(fragment) => cookie.identifier.contains(fragment),
            Predicate::IdStartsWith(prefix) => cookie.identifier.starts_with(prefix),
            Predicate::IdEndsWith(suffix) => cookie.identifier.ends_with(suffix),
            Predicate::HasSource(source) => cookie.sources().contains(source.as_str()),
            Predicate::MetadataExists { key, source } => {
                cookie.metadata_value(key, source.as_deref()).is_some()
            }
            Predicate::MetadataEquals { key, value, source } => {
                cookie.metadata_value(key, source.as_deref()) == Some(value)
            }
            Predicate::EnrichmentCountAtLeast(count) => cookie.enrichments.len() >= *count,
        }
    }
}
