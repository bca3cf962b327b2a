//! Transition segments referenced by music rules
//!
//! They only play between two other segments, so they are rendered on their
//! own once the entry is done and aren't reported as unused.

use indexmap::IndexSet;

use crate::builder::TransitionRules;

/// A transition segment plus the bank of the rule owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionRef {
    pub segment: u32,
    pub bank_id: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Transitions {
    items: IndexSet<TransitionRef>,
}

impl Transitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rules: &TransitionRules, bank_id: u32) {
        for segment in rules.transition_segments() {
            self.items.insert(TransitionRef { segment, bank_id });
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &TransitionRef> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
