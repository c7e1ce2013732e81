use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single round as shown in the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Ct,
    T,
    Bonus,
    /// Rendering noise or an unrecognized token
    Unknown,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Ct => "CT",
            Label::T => "T",
            Label::Bonus => "BONUS",
            Label::Unknown => "UNKNOWN",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Label::Unknown)
    }

    pub fn all_known() -> [Label; 3] {
        [Label::Ct, Label::T, Label::Bonus]
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a raw observed token to a label.
///
/// Accepts either a coin class attribute (`"previous-rolls-item coin-ct"`) or a bare
/// label (`"CT"`, `"t"`, `" bonus "`). Never fails: unrecognized input is `Unknown`.
pub fn classify(raw: &str) -> Label {
    if raw.contains("coin-ct") {
        return Label::Ct;
    }
    if raw.contains("coin-t") {
        return Label::T;
    }
    if raw.contains("coin-bonus") {
        return Label::Bonus;
    }

    let token = raw.trim();
    Label::all_known()
        .into_iter()
        .find(|label| token.eq_ignore_ascii_case(label.as_str()))
        .unwrap_or(Label::Unknown)
}
