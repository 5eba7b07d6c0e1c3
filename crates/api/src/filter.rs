//! The accumulated per-request filter state.

use plexus_types::{ElementId, ElementRange, ItemSelector, PinRequest};

/// The accumulated state of all pin requests made for one [`Request`]:
/// the last merged request plus its normalized selector.
///
/// [`Request`]: crate::Request
#[derive(Clone, Debug, Default)]
pub struct ItemFilter {
    /// The last merged pin request.
    pub current: PinRequest,
    /// The normalized selector driving admission and enumeration.
    pub selector: ItemSelector,
}

impl ItemFilter {
    /// True when some selector span admits the element.
    pub fn admits(&self, elem: &ElementId) -> bool {
        self.selector.admits(elem)
    }

    /// Advances `scan` to the next admissible range; false when exhausted.
    pub fn next_range(&self, scan: &mut ElementRange) -> bool {
        self.selector.next_range(scan)
    }

    /// A compact label for logs.
    pub fn label(&self) -> String {
        let mut out = self.current.label();
        if out.is_empty() {
            out = self.selector.label();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_types::tag::Uid;

    #[test]
    fn admits_follows_selector() {
        let mut filter = ItemFilter::default();
        filter
            .selector
            .add_span(Uid([0, 1]), Uid([0, 2]), Uid([0, 3]), Uid([0, 3]));
        filter.selector.normalize(false).unwrap();

        assert!(filter.admits(&ElementId::new(Uid([0, 1]), Uid([0, 2]), Uid([0, 3]))));
        assert!(!filter.admits(&ElementId::new(Uid([0, 1]), Uid([0, 2]), Uid([0, 4]))));
    }
}
