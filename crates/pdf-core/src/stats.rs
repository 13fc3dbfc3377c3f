//! Binary-size accounting and per-stage timings (spec §4.6 item 6, §9
//! "Binary size accounting / stats"). `pdf-core` only owns the struct and
//! a CSV-serializable view of it; appending rows to `stats_file_name` is
//! the CLI collaborator's job (out of scope, spec §1).

use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub header_parse: Duration,
    pub xref_build: Duration,
    pub decrypt: Duration,
    pub object_stream_materialize: Duration,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReadStats {
    pub total_binary_size: u64,
    pub image_binary_size: u64,
    pub font_binary_size: u64,
    pub object_count: u64,
    pub duplicate_object_count: u64,
    #[serde(skip)]
    pub timings: StageTimings,
}

impl ReadStats {
    /// Fraction of objects found to be duplicates by the optimizer
    /// (0.0 if none were examined).
    pub fn duplicate_fraction(&self) -> f64 {
        if self.object_count == 0 {
            0.0
        } else {
            self.duplicate_object_count as f64 / self.object_count as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteStats {
    pub total_binary_size: u64,
    pub object_count: u64,
    pub compressed_object_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_fraction_is_zero_with_no_objects() {
        let stats = ReadStats::default();
        assert_eq!(stats.duplicate_fraction(), 0.0);
    }

    #[test]
    fn duplicate_fraction_divides_correctly() {
        let stats = ReadStats {
            object_count: 4,
            duplicate_object_count: 1,
            ..Default::default()
        };
        assert_eq!(stats.duplicate_fraction(), 0.25);
    }
}
