//! Byte-range helpers shared by the tree container and the processor.

/// Edits address the document through half-open byte ranges.
pub type Range = core::ops::Range<usize>;

/// Does `outer` contain every position of `inner`?
///
/// A zero-length range sitting on either boundary of `outer` counts as
/// contained; it names an insertion point, not content.
pub fn covers(outer: &Range, inner: &Range) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

/// The smallest range containing both inputs.
pub fn union(a: &Range, b: &Range) -> Range {
    a.start.min(b.start)..a.end.max(b.end)
}

/// Sibling conflict test. Two ranges conflict when their content overlaps,
/// and also when they share a start offset without both being empty: an
/// insertion pinned to the first character of a sibling's region has no
/// defined apply order relative to it. Two insertion points at the same
/// offset do not conflict; arrival order disambiguates them.
pub fn conflicts(a: &Range, b: &Range) -> bool {
    if a.start == b.start {
        return !(a.is_empty() && b.is_empty());
    }
    a.start < b.end && b.start < a.end
}

/// The smallest range spanning every range in the iterator, or `None` for an
/// empty iterator.
pub fn coverage<I>(regions: I) -> Option<Range>
where
    I: IntoIterator<Item = Range>,
{
    regions.into_iter().reduce(|acc, region| union(&acc, &region))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_boundaries() {
        assert!(covers(&(0..4), &(0..4)));
        assert!(covers(&(0..4), &(4..4)));
        assert!(covers(&(0..4), &(0..0)));
        assert!(!covers(&(1..4), &(0..2)));
        assert!(!covers(&(0..4), &(2..5)));
    }

    #[test]
    fn conflict_rules() {
        assert!(conflicts(&(0..4), &(2..6)));
        assert!(conflicts(&(0..0), &(0..4)));
        assert!(conflicts(&(0..4), &(0..0)));
        assert!(!conflicts(&(0..0), &(0..0)));
        assert!(!conflicts(&(0..4), &(4..4)));
        assert!(!conflicts(&(0..4), &(4..8)));
        assert!(!conflicts(&(3..3), &(0..3)));
    }

    #[test]
    fn coverage_spans_all() {
        assert_eq!(coverage([1..3, 8..9, 4..6]), Some(1..9));
        assert_eq!(coverage([2..2]), Some(2..2));
        assert_eq!(coverage(std::iter::empty()), None);
    }
}
