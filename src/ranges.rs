/// Ordered day-count bins.
///
/// Every bin is half-open, `(previous upper, upper]`, starting from an
/// exclusive `lower` bound. Anything above the last upper bound falls into
/// `overflow`.
#[derive(Debug, Clone, Copy)]
pub struct RangeScheme {
    lower: i64,
    bins: &'static [(i64, &'static str)],
    overflow: &'static str,
}

/// Buckets for days on site.
pub const AGEING_RANGES: RangeScheme = RangeScheme {
    lower: -1,
    bins: &[
        (3, "0-3"),
        (7, "04-07"),
        (15, "08-15"),
        (30, "16-30"),
        (60, "31-60"),
        (90, "61-90"),
        (180, "91-180"),
    ],
    overflow: "More than 180",
};

/// Buckets for turn-around time. Same-day turnaround gets its own `0` bin.
pub const TAT_RANGES: RangeScheme = RangeScheme {
    lower: -1,
    bins: &[
        (0, "0"),
        (3, "0-3"),
        (7, "04-07"),
        (15, "08-15"),
        (30, "16-30"),
        (60, "31-60"),
        (90, "61-90"),
        (180, "91-180"),
    ],
    overflow: "More than 180",
};

impl RangeScheme {
    /// Label for a day-count, or `None` at or below the lower bound.
    pub fn label(&self, days: i64) -> Option<&'static str> {
        if days <= self.lower {
            return None;
        }
        let label = self
            .bins
            .iter()
            .find(|(upper, _)| days <= *upper)
            .map_or(self.overflow, |(_, label)| *label);
        Some(label)
    }

    /// All labels in bin order.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.bins
            .iter()
            .map(|(_, label)| *label)
            .chain(std::iter::once(self.overflow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ageing_bins() {
        assert_eq!(AGEING_RANGES.label(0), Some("0-3"));
        assert_eq!(AGEING_RANGES.label(3), Some("0-3"));
        assert_eq!(AGEING_RANGES.label(4), Some("04-07"));
        assert_eq!(AGEING_RANGES.label(9), Some("08-15"));
        assert_eq!(AGEING_RANGES.label(30), Some("16-30"));
        assert_eq!(AGEING_RANGES.label(31), Some("31-60"));
        assert_eq!(AGEING_RANGES.label(90), Some("61-90"));
        assert_eq!(AGEING_RANGES.label(180), Some("91-180"));
        assert_eq!(AGEING_RANGES.label(181), Some("More than 180"));
        assert_eq!(AGEING_RANGES.label(10_000), Some("More than 180"));
    }

    #[test]
    fn tat_bins_split_same_day() {
        assert_eq!(TAT_RANGES.label(0), Some("0"));
        assert_eq!(TAT_RANGES.label(1), Some("0-3"));
        assert_eq!(TAT_RANGES.label(3), Some("0-3"));
        assert_eq!(TAT_RANGES.label(4), Some("04-07"));
        assert_eq!(TAT_RANGES.label(180), Some("91-180"));
        assert_eq!(TAT_RANGES.label(181), Some("More than 180"));
    }

    #[test]
    fn lower_bound_is_exclusive() {
        assert_eq!(AGEING_RANGES.label(-1), None);
        assert_eq!(AGEING_RANGES.label(-2), None);
        assert_eq!(TAT_RANGES.label(-1), None);
        assert_eq!(TAT_RANGES.label(-30), None);
    }

    #[test]
    fn label_order() {
        let labels: Vec<_> = TAT_RANGES.labels().collect();
        assert_eq!(labels.first(), Some(&"0"));
        assert_eq!(labels.last(), Some(&"More than 180"));
        assert_eq!(labels.len(), 9);
        assert_eq!(AGEING_RANGES.labels().count(), 8);
    }
}
