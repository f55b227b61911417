//! Arbitration between the majority key and the key the track ends in
//!
//! Rules are tried in order and the first that matches decides. A track
//! whose body sits on the dominant of its final chord (or, in major, on the
//! subdominant) is in the final key; a track that ends on the dominant of
//! its body key keeps the body key. In minor, a body a fourth above the
//! ending is read as the latter: i -> v is a half cadence, not iv -> i.

use crate::camelot::{Key, Mode};
use std::fmt;

/// Which arbitration rule produced the final key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CadenceRule {
    /// Majority is the dominant (or, in major, subdominant) of the ending: ending wins
    Authentic,
    /// Ending is the dominant of the majority: majority wins
    Half,
    /// Majority and ending agree
    Stable,
    /// No relationship found (or no usable ending): majority wins
    Default,
}

impl CadenceRule {
    pub fn name(&self) -> &'static str {
        match self {
            CadenceRule::Authentic => "authentic",
            CadenceRule::Half => "half",
            CadenceRule::Stable => "stable",
            CadenceRule::Default => "default",
        }
    }

    /// Rules that earn the confidence bonus
    pub fn corroborates(&self) -> bool {
        matches!(self, CadenceRule::Authentic | CadenceRule::Stable)
    }
}

impl fmt::Display for CadenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

type Rule = fn(Key, Key) -> Option<(Key, CadenceRule)>;

/// Evaluation order; the first match wins
const RULES: &[Rule] = &[authentic, half, stable];

fn interval(from: Key, to: Key) -> u8 {
    (to.root() + 12 - from.root()) % 12
}

fn authentic(majority: Key, terminal: Key) -> Option<(Key, CadenceRule)> {
    if majority.mode() != terminal.mode() {
        return None;
    }
    let up = interval(terminal, majority);
    let resolves = up == 7 || (up == 5 && majority.mode() == Mode::Major);
    resolves.then_some((terminal, CadenceRule::Authentic))
}

fn half(majority: Key, terminal: Key) -> Option<(Key, CadenceRule)> {
    (interval(majority, terminal) == 7).then_some((majority, CadenceRule::Half))
}

fn stable(majority: Key, terminal: Key) -> Option<(Key, CadenceRule)> {
    (majority == terminal).then_some((majority, CadenceRule::Stable))
}

/// Decide between the majority key and the terminal key
pub fn arbitrate(majority: Key, terminal: Option<Key>) -> (Key, CadenceRule) {
    let Some(terminal) = terminal else {
        return (majority, CadenceRule::Default);
    };
    RULES
        .iter()
        .find_map(|rule| rule(majority, terminal))
        .unwrap_or((majority, CadenceRule::Default))
}
