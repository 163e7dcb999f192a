//! Structure id format and allocation (`<prefix><zero-padded integer>`).

use crate::config::StoreConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdScheme {
    prefix: String,
    width: usize,
}

impl IdScheme {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.id_prefix.clone(), config.id_width)
    }

    /// Numeric part of an id carrying this prefix (any digit count).
    pub fn numeric_part(&self, id: &str) -> Option<u64> {
        let digits = id.strip_prefix(self.prefix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Exactly the prefix followed by `width` digits.
    pub fn is_conforming(&self, id: &str) -> bool {
        id.strip_prefix(self.prefix.as_str())
            .map(|digits| digits.len() == self.width && digits.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false)
    }

    pub fn format(&self, number: u64) -> String {
        format!("{}{:0width$}", self.prefix, number, width = self.width)
    }
}

/// Hands out consecutive unused ids.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    scheme: IdScheme,
    next: u64,
}

impl IdAllocator {
    /// Start after the highest existing number (or `floor`, whichever is larger).
    pub fn after<'a>(
        scheme: IdScheme,
        existing: impl IntoIterator<Item = &'a str>,
        floor: u64,
    ) -> Self {
        let max = existing
            .into_iter()
            .filter_map(|id| scheme.numeric_part(id))
            .fold(floor, u64::max);
        Self {
            scheme,
            next: max.saturating_add(1),
        }
    }

    pub fn allocate(&mut self) -> String {
        let id = self.scheme.format(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Next free id for a store using `config`.
pub fn next_structure_id<'a>(
    config: &StoreConfig,
    existing: impl IntoIterator<Item = &'a str>,
) -> String {
    IdAllocator::after(IdScheme::from_config(config), existing, config.id_floor).allocate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_continues_after_the_highest_id() {
        let cfg = StoreConfig::default();
        let ids = ["BAP_0000002", "BAP_0000107", "OTHER_9", "BAP_x"];
        assert_eq!(next_structure_id(&cfg, ids), "BAP_0000108");
    }

    #[test]
    fn floor_applies_to_empty_and_low_stores() {
        let mut alloc = IdAllocator::after(IdScheme::new("BAP_", 7), ["BAP_0000003"], 21700);
        assert_eq!(alloc.allocate(), "BAP_0021701");
        assert_eq!(alloc.allocate(), "BAP_0021702");
    }

    #[test]
    fn conformance_requires_exact_width() {
        let scheme = IdScheme::new("BAP_", 7);
        assert!(scheme.is_conforming("BAP_0000001"));
        assert!(!scheme.is_conforming("BAP_001"));
        assert!(!scheme.is_conforming("FMA_0000001"));
        assert_eq!(scheme.numeric_part("BAP_001"), Some(1));
    }

    #[test]
    fn allocation_saturates_at_the_largest_number() {
        let top = format!("BAP_{}", u64::MAX);
        let mut alloc = IdAllocator::after(IdScheme::new("BAP_", 7), [top.as_str()], 0);
        assert_eq!(alloc.allocate(), top);
        assert_eq!(alloc.allocate(), top);
    }
}
