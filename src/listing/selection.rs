//! Row selection across pages.

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::filters::FilterState;
use crate::models::RunId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// "All matching except some" is not representable; clear first.
    #[error("All matching runs are selected; clear the selection before deselecting single runs")]
    PartialDeselectWhileAllSelected,
}

/// Either an explicit set of checked ids or the "every run matching the
/// current filters" flag. Setting the flag supersedes the explicit set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTracker {
    explicit: BTreeSet<RunId>,
    all_selected: bool,
    total_count: usize,
}

/// What a downstream action receives for the current selection.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionPayload {
    Ids(Vec<RunId>),
    /// Serialized filters, so the backend can recompute the matching set.
    AllMatching(Value),
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip `id`. Returns whether it is selected afterwards.
    ///
    /// While all matching runs are selected every row is already checked,
    /// so the only possible flip is a partial deselect, which is refused.
    pub fn toggle_row(&mut self, id: RunId) -> Result<bool, SelectionError> {
        if self.all_selected {
            return Err(SelectionError::PartialDeselectWhileAllSelected);
        }
        if self.explicit.remove(&id) {
            Ok(false)
        } else {
            self.explicit.insert(id);
            Ok(true)
        }
    }

    /// Check every id rendered on the current page.
    pub fn select_all_on_page<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = RunId>,
    {
        if !self.all_selected {
            self.explicit.extend(ids);
        }
    }

    /// Select every run matching the filters, including unseen pages.
    pub fn select_all_matching(&mut self, total_count: usize) {
        self.all_selected = true;
        self.total_count = total_count;
        self.explicit.clear();
    }

    /// Keep the reported count in step with fresh totals.
    pub fn set_total_count(&mut self, total_count: usize) {
        self.total_count = total_count;
    }

    pub fn clear(&mut self) {
        self.all_selected = false;
        self.explicit.clear();
    }

    pub fn count(&self) -> usize {
        if self.all_selected {
            self.total_count
        } else {
            self.explicit.len()
        }
    }

    pub fn is_all_selected(&self) -> bool {
        self.all_selected
    }

    pub fn is_selected(&self, id: &RunId) -> bool {
        self.all_selected || self.explicit.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Explicitly checked ids, in id order.
    pub fn ids(&self) -> impl Iterator<Item = &RunId> {
        self.explicit.iter()
    }

    /// Payload for "create queue from selection". `None` when nothing is selected.
    pub fn payload(&self, filters: &FilterState, viewer: &str) -> Option<SelectionPayload> {
        if self.all_selected {
            Some(SelectionPayload::AllMatching(filters.describe(viewer)))
        } else if self.explicit.is_empty() {
            None
        } else {
            Some(SelectionPayload::Ids(self.explicit.iter().cloned().collect()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_row() {
        let mut sel = SelectionTracker::new();
        assert_eq!(sel.toggle_row(1.into()), Ok(true));
        assert_eq!(sel.toggle_row("2".into()), Ok(true));
        assert_eq!(sel.toggle_row("1".into()), Ok(false));
        assert_eq!(sel.count(), 1);
        assert!(sel.is_selected(&RunId::Int(2)));
    }

    #[test]
    fn test_select_all_matching_counts_unseen_pages() {
        let mut sel = SelectionTracker::new();
        sel.select_all_on_page([1.into(), 2.into()]);
        sel.select_all_matching(137);
        assert_eq!(sel.count(), 137);
        assert!(sel.is_all_selected());
        assert_eq!(sel.ids().count(), 0);
        assert!(sel.is_selected(&RunId::Int(999)));

        sel.clear();
        assert_eq!(sel.count(), 0);
        assert!(!sel.is_all_selected());
    }

    #[test]
    fn test_partial_deselect_refused_while_all_selected() {
        let mut sel = SelectionTracker::new();
        sel.select_all_matching(10);
        assert_eq!(
            sel.toggle_row(3.into()),
            Err(SelectionError::PartialDeselectWhileAllSelected)
        );
        assert_eq!(sel.count(), 10);
    }

    #[test]
    fn test_payload_shapes() {
        let filters = FilterState::new();
        let mut sel = SelectionTracker::new();
        assert_eq!(sel.payload(&filters, "amy"), None);

        sel.select_all_on_page([5.into(), 3.into()]);
        assert_eq!(
            sel.payload(&filters, "amy"),
            Some(SelectionPayload::Ids(vec![3.into(), 5.into()]))
        );

        sel.select_all_matching(40);
        match sel.payload(&filters, "amy") {
            Some(SelectionPayload::AllMatching(described)) => {
                assert_eq!(described["annotator_user"], "amy");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
