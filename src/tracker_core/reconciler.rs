//! Sliding-window diff between two overlapping snapshots of the feed
//!
//! A snapshot only shows the most recent N outcomes. Between two polls the feed appends
//! `m` outcomes and evicts the oldest ones, so the tail of the previous window reappears
//! as the head of the current one. Finding the smallest such `m` recovers exactly the
//! outcomes that are new since the previous poll.

use super::label::Label;

/// Ordered snapshot of the feed, oldest first
pub type Window = Vec<Label>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationResult {
    /// Outcomes new since the previous window, oldest first, noise removed
    NewEvents(Vec<Label>),
    /// No consistent overlap between the two windows
    Unalignable,
}

impl ReconciliationResult {
    pub fn new_events(&self) -> &[Label] {
        match self {
            ReconciliationResult::NewEvents(events) => events,
            ReconciliationResult::Unalignable => &[],
        }
    }

    pub fn is_unalignable(&self) -> bool {
        matches!(self, ReconciliationResult::Unalignable)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowReconciler {
    /// Minimum number of shared labels required to accept an alignment
    min_overlap: usize,
}

impl Default for WindowReconciler {
    fn default() -> Self {
        Self { min_overlap: 1 }
    }
}

impl WindowReconciler {
    pub fn new(min_overlap: usize) -> Self {
        Self {
            min_overlap: min_overlap.max(1),
        }
    }

    pub fn min_overlap(&self) -> usize {
        self.min_overlap
    }

    /// Smallest advance `m` that explains `current` as a continuation of `previous`.
    ///
    /// With `overlap = current.len() - m`, the last `overlap` labels of `previous` must
    /// equal the first `overlap` labels of `current`. Zero overlap never validates.
    pub fn align(&self, previous: &[Label], current: &[Label]) -> Option<usize> {
        (1..=current.len()).find(|&m| {
            let overlap = current.len() - m;
            overlap >= self.min_overlap
                && overlap <= previous.len()
                && previous[previous.len() - overlap..] == current[..overlap]
        })
    }

    pub fn reconcile(&self, previous: Option<&[Label]>, current: &[Label]) -> ReconciliationResult {
        let previous = match previous {
            Some(previous) => previous,
            // No baseline: the whole window is history we may already have seen
            None => return ReconciliationResult::NewEvents(Vec::new()),
        };

        if current.is_empty() || previous.is_empty() || previous == current {
            return ReconciliationResult::NewEvents(Vec::new());
        }

        match self.align(previous, current) {
            Some(m) => {
                let appended = &current[current.len() - m..];
                ReconciliationResult::NewEvents(
                    appended.iter().copied().filter(Label::is_known).collect(),
                )
            }
            None => ReconciliationResult::Unalignable,
        }
    }
}

/// Reconcile with the default minimum overlap of one label.
pub fn reconcile(previous: Option<&[Label]>, current: &[Label]) -> ReconciliationResult {
    WindowReconciler::default().reconcile(previous, current)
}

/// `[CT, T, BONUS]`
pub fn format_window(window: &[Label]) -> String {
    let labels: Vec<&str> = window.iter().map(Label::as_str).collect();
    format!("[{}]", labels.join(", "))
}
