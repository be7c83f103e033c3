//! Tender number generation (`TND-<year>-<sequence>`).

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug)]
pub struct TenderNumberGenerator {
    prefix: String,
    sequences: Mutex<HashMap<i32, u32>>,
}

impl TenderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequences: Mutex::new(HashMap::new()),
        }
    }

    /// Next number for the given year. Sequences restart every year.
    pub fn next(&self, year: i32) -> String {
        let mut sequences = self.sequences.lock();
        let seq = sequences.entry(year).or_insert(0);
        *seq += 1;
        format!("{}-{}-{:04}", self.prefix, year, seq)
    }

    /// Advance the year's counter past an existing number, e.g. one loaded from storage.
    pub fn observe(&self, tender_number: &str) {
        let Some((year, seq)) = self.parse(tender_number) else {
            return;
        };
        let mut sequences = self.sequences.lock();
        let current = sequences.entry(year).or_insert(0);
        *current = (*current).max(seq);
    }

    fn parse(&self, tender_number: &str) -> Option<(i32, u32)> {
        let rest = tender_number.strip_prefix(&self.prefix)?.strip_prefix('-')?;
        let (year, seq) = rest.split_once('-')?;
        Some((year.parse().ok()?, seq.parse().ok()?))
    }
}

impl Default for TenderNumberGenerator {
    fn default() -> Self {
        Self::new("TND")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_per_year() {
        let numbers = TenderNumberGenerator::default();
        assert_eq!(numbers.next(2024), "TND-2024-0001");
        assert_eq!(numbers.next(2024), "TND-2024-0002");
        assert_eq!(numbers.next(2025), "TND-2025-0001");
    }

    #[test]
    fn observe_skips_past_existing_numbers() {
        let numbers = TenderNumberGenerator::default();
        numbers.observe("TND-2024-0041");
        numbers.observe("TND-2024-0007");
        numbers.observe("ext/2024/99");
        assert_eq!(numbers.next(2024), "TND-2024-0042");
    }
}
