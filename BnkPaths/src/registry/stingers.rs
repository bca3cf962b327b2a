//! Stingers found while replaying, rendered as their own outputs at the end

use indexmap::IndexSet;

use crate::builder::Stinger;

/// A stinger plus the bank of the object that declared it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StingerRef {
    pub trigger: u32,
    pub segment: u32,
    pub bank_id: u32,
}

/// Stingers in discovery order, without repeats
#[derive(Debug, Clone, Default)]
pub struct Stingers {
    items: IndexSet<StingerRef>,
}

impl Stingers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stingers: &[Stinger], bank_id: u32) {
        for stinger in stingers {
            self.items.insert(StingerRef {
                trigger: stinger.trigger,
                segment: stinger.segment,
                bank_id,
            });
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &StingerRef> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_dedup() {
        let mut stingers = Stingers::new();
        let list = [Stinger { trigger: 1, segment: 10 }, Stinger { trigger: 2, segment: 20 }];
        stingers.add(&list, 5);
        stingers.add(&list[..1], 5);
        stingers.add(&list[..1], 6);

        let segments: Vec<_> = stingers.items().map(|s| (s.segment, s.bank_id)).collect();
        assert_eq!(segments, vec![(10, 5), (20, 5), (10, 6)]);
    }
}
