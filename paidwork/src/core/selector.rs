//! Deterministic ordering and selection of scanned work items.
//!
//! Remote branch enumeration order carries no meaning, so candidates are sorted
//! by `(public_issue, branch)` before anything is listed or picked. "Next" is
//! therefore the lowest-numbered public issue that is still ready.

use super::work_item::WorkItem;

/// Which ready item to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// First ready item for this public issue number.
    Issue(u64),
    /// First ready item in canonical order.
    Next,
}

/// Sort items into canonical `(public_issue, branch)` order.
pub fn sort_work_items(items: &mut [WorkItem]) {
    items.sort_by(|a, b| {
        (a.public_issue(), a.branch()).cmp(&(b.public_issue(), b.branch()))
    });
}

/// Items still awaiting execution, in the order given.
pub fn ready_items(items: &[WorkItem]) -> Vec<&WorkItem> {
    items.iter().filter(|item| item.is_ready()).collect()
}

/// Pick the ready item matching `selection` from items in canonical order.
pub fn select_ready(items: &[WorkItem], selection: Selection) -> Option<&WorkItem> {
    let mut ready = items.iter().filter(|item| item.is_ready());
    match selection {
        Selection::Issue(number) => ready.find(|item| item.public_issue() == number),
        Selection::Next => ready.next(),
    }
}

/// Pick the executed item for `public_issue`, if any.
pub fn select_executed(items: &[WorkItem], public_issue: u64) -> Option<&WorkItem> {
    items
        .iter()
        .find(|item| !item.is_ready() && item.public_issue() == public_issue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{executed_item, ready_item};

    #[test]
    fn sorts_by_issue_then_branch() {
        let mut items = vec![
            ready_item("paid/b", 9),
            ready_item("paid/z", 2),
            ready_item("paid/a", 9),
        ];
        sort_work_items(&mut items);
        let branches: Vec<&str> = items.iter().map(WorkItem::branch).collect();
        assert_eq!(branches, vec!["paid/z", "paid/a", "paid/b"]);
    }

    #[test]
    fn next_skips_executed_items() {
        let items = vec![executed_item("paid/1", 1), ready_item("paid/2", 2)];
        let selected = select_ready(&items, Selection::Next).expect("ready item");
        assert_eq!(selected.branch(), "paid/2");
        assert_eq!(ready_items(&items).len(), 1);
    }

    #[test]
    fn issue_selection_ignores_executed_match() {
        let items = vec![executed_item("paid/1", 7), ready_item("paid/2", 8)];
        assert!(select_ready(&items, Selection::Issue(7)).is_none());
        assert_eq!(
            select_ready(&items, Selection::Issue(8)).map(WorkItem::branch),
            Some("paid/2")
        );
        assert_eq!(
            select_executed(&items, 7).map(WorkItem::branch),
            Some("paid/1")
        );
    }

    #[test]
    fn next_on_empty_is_none() {
        assert!(select_ready(&[], Selection::Next).is_none());
    }
}
