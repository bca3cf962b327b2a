//! Gamesync paths: which switch/state values lead to each playable leaf
//!
//! Registration builds a tree while traversal descends:
//!
//! ```text
//! (event) > (switch) > music=bgm1 > act=st1        path 1
//!                    |            > act=st2        path 2
//!                    > music=bgm2 > act=*          path 3
//! ```
//!
//! Each root-to-leaf chain becomes one [`GamesyncParams`], replayed later
//! to render one output per path. Upper switches gate lower ones, so a
//! path that sets a group to two different values can't happen at runtime
//! and is flagged unreachable.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use super::params::{Gamesync, GsType, ParamItem, Params};
use crate::utils::id_or_hash;

/// Values selected for one path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GamesyncParams {
    /// (type, group) -> values in registration order (leaf first)
    elems: IndexMap<(GsType, u32), Vec<u32>>,
    /// Set from operator params rather than registration
    manual: bool,
    unreachable: bool,
}

impl GamesyncParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Params from one operator combo; names are hashed and `-` is "any"
    pub fn from_items(items: &[ParamItem]) -> Self {
        let mut params = Self {
            manual: true,
            ..Self::default()
        };
        for item in items {
            if item.gtype == GsType::GameParameter {
                continue;
            }
            let value = if item.val == "-" { 0 } else { id_or_hash(&item.val) };
            params.add(item.gtype, id_or_hash(&item.key), value);
        }
        params
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn is_unreachable(&self) -> bool {
        self.unreachable
    }

    /// Adds a value; returns true when it conflicts with an earlier
    /// non-"any" value of the same group
    pub fn add(&mut self, gtype: GsType, group: u32, value: u32) -> bool {
        let values = self.elems.entry((gtype, group)).or_default();
        let conflict = !values.is_empty() && value != 0 && !values.contains(&value) && !values.contains(&0);
        if conflict {
            tracing::debug!("maybe unreachable: {} {group}={value}", gtype.short());
            self.unreachable = true;
        }
        values.push(value);
        conflict
    }

    pub fn adds(&mut self, gamesyncs: &[Gamesync]) -> bool {
        let mut conflict = false;
        for gs in gamesyncs {
            conflict |= self.add(gs.gtype, gs.group, gs.value);
        }
        conflict
    }

    /// Value currently selected for a group
    ///
    /// Registered paths are read bottom to top, so the last non-"any" value
    /// is the uppermost one. Manual params with one value return it as is.
    pub fn current(&self, gtype: GsType, group: u32) -> Option<u32> {
        let Some(values) = self.elems.get(&(gtype, group)).filter(|v| !v.is_empty()) else {
            tracing::debug!("gamesync {} {group} not set", gtype.short());
            return None;
        };
        if self.manual && values.len() == 1 {
            return Some(values[0]);
        }
        Some(values.iter().rev().copied().find(|&v| v != 0).unwrap_or(0))
    }

    /// Like [`GamesyncParams::current`], but unreachable paths hand out
    /// their values top to bottom, one per query, so inner switches see
    /// the value that made them unreachable
    pub fn take(&mut self, gtype: GsType, group: u32) -> Option<u32> {
        if self.unreachable {
            if let Some(values) = self.elems.get_mut(&(gtype, group)) {
                if values.len() > 1 {
                    return values.pop();
                }
            }
        }
        self.current(gtype, group)
    }

    /// All (type, group, value) items
    pub fn elems(&self) -> Vec<Gamesync> {
        self.elems
            .iter()
            .flat_map(|(&(gtype, group), values)| values.iter().map(move |&value| Gamesync::new(gtype, group, value)))
            .collect()
    }

    /// Order-independent identity, used to merge repeated paths
    pub fn key(&self) -> BTreeSet<Gamesync> {
        self.elems().into_iter().collect()
    }
}

#[derive(Debug, Clone, Default)]
struct PathNode {
    parent: Option<usize>,
    elems: Vec<Gamesync>,
    children: Vec<usize>,
}

/// Tree of gamesync scopes found during registration
#[derive(Debug, Clone)]
pub struct GamesyncPaths {
    nodes: Vec<PathNode>,
    current: usize,
    /// Stop descending into scopes that conflict with an open ancestor
    prefilter: bool,
    combos: Option<Vec<GamesyncParams>>,
}

impl Default for GamesyncPaths {
    fn default() -> Self {
        Self::new(false)
    }
}

impl GamesyncPaths {
    pub fn new(prefilter: bool) -> Self {
        Self {
            nodes: vec![PathNode::default()],
            current: 0,
            prefilter,
            combos: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && self.combos.is_none()
    }

    /// Opens a scope; returns true if it can't be reached (prefilter mode
    /// only), in which case callers should not descend
    pub fn adds(&mut self, gamesyncs: &[Gamesync]) -> bool {
        let id = self.nodes.len();
        self.nodes.push(PathNode {
            parent: Some(self.current),
            elems: gamesyncs.to_vec(),
            children: Vec::new(),
        });
        self.nodes[self.current].children.push(id);
        self.current = id;
        self.is_unreachable()
    }

    pub fn add(&mut self, gtype: GsType, group: u32, value: u32) -> bool {
        self.adds(&[Gamesync::new(gtype, group, value)])
    }

    /// Closes the current scope
    pub fn done(&mut self) {
        if let Some(parent) = self.nodes[self.current].parent {
            self.current = parent;
        }
    }

    fn is_unreachable(&self) -> bool {
        if !self.prefilter {
            return false;
        }

        let elems = &self.nodes[self.current].elems;
        let mut ancestor = self.nodes[self.current].parent;
        while let Some(id) = ancestor {
            let node = &self.nodes[id];
            for gs in elems {
                // last assignment of the key in that scope
                let prev = node
                    .elems
                    .iter()
                    .rev()
                    .find(|p| p.gtype == gs.gtype && p.group == gs.group)
                    .map(|p| p.value);
                // an inner "any" is also cut once an outer value is fixed
                if prev.is_some_and(|prev| prev != 0 && prev != gs.value) {
                    return true;
                }
            }
            ancestor = node.parent;
        }
        false
    }

    /// Every distinct root-to-leaf path; computed once
    pub fn combos(&mut self) -> &[GamesyncParams] {
        if self.combos.is_none() {
            let mut combos = Vec::new();
            let mut done = BTreeSet::new();
            self.include_path(0, &mut combos, &mut done);
            self.combos = Some(combos);
        }
        self.combos.as_deref().unwrap_or_default()
    }

    fn include_path(&self, id: usize, combos: &mut Vec<GamesyncParams>, done: &mut BTreeSet<Vec<Gamesync>>) {
        let node = &self.nodes[id];
        if node.children.is_empty() && id != 0 {
            let mut params = GamesyncParams::new();
            let mut path = Some(id);
            while let Some(pid) = path {
                params.adds(&self.nodes[pid].elems);
                path = self.nodes[pid].parent;
            }

            let key: Vec<Gamesync> = params.key().into_iter().collect();
            if done.insert(key) {
                combos.push(params);
            }
        }
        for &child in &node.children {
            self.include_path(child, combos, done);
        }
    }

    /// Replaces registered paths with operator combos
    pub fn add_params(&mut self, params: &Params) {
        let combos = params.combos().iter().map(|combo| GamesyncParams::from_items(combo)).collect();
        self.combos = Some(combos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUSIC: u32 = 100;
    const ACT: u32 = 200;

    #[test]
    fn test_current_rules() {
        let mut params = GamesyncParams::new();
        params.add(GsType::Switch, MUSIC, 0);
        params.add(GsType::Switch, MUSIC, 5);
        params.add(GsType::Switch, MUSIC, 0);
        assert_eq!(params.current(GsType::Switch, MUSIC), Some(5));
        assert_eq!(params.current(GsType::State, MUSIC), None);
        assert!(!params.is_unreachable());

        // conflicting values: uppermost (last added) wins
        let mut params = GamesyncParams::new();
        params.add(GsType::Switch, ACT, 1);
        assert!(params.add(GsType::Switch, ACT, 2));
        assert_eq!(params.current(GsType::Switch, ACT), Some(2));
        assert!(params.is_unreachable());
        assert_eq!(params.take(GsType::Switch, ACT), Some(2));
        assert_eq!(params.take(GsType::Switch, ACT), Some(1));
    }

    #[test]
    fn test_paths_and_dedup() {
        let mut paths = GamesyncPaths::new(false);
        assert!(paths.is_empty());

        for music in [1, 2] {
            paths.add(GsType::Switch, MUSIC, music);
            for act in [10, 11] {
                paths.add(GsType::State, ACT, act);
                paths.done();
            }
            paths.done();
        }
        // layered repeat of an existing path
        paths.add(GsType::Switch, MUSIC, 1);
        paths.add(GsType::State, ACT, 10);
        paths.done();
        paths.done();

        let first: Vec<_> = paths.combos().iter().map(GamesyncParams::key).collect();
        assert_eq!(first.len(), 4);
        let second: Vec<_> = paths.combos().iter().map(GamesyncParams::key).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_prefilter_unreachable() {
        let mut paths = GamesyncPaths::new(true);
        assert!(!paths.add(GsType::Switch, MUSIC, 1));
        assert!(!paths.add(GsType::Switch, MUSIC, 1));
        paths.done();
        assert!(paths.add(GsType::Switch, MUSIC, 2));
        paths.done();
        assert!(paths.add(GsType::Switch, MUSIC, 0));
        paths.done();
        paths.done();
        // "any" outside lets inner values through
        assert!(!paths.add(GsType::Switch, ACT, 0));
        assert!(!paths.add(GsType::Switch, ACT, 3));
        paths.done();
        paths.done();

        let combos = paths.combos();
        assert_eq!(combos.len(), 4);
        assert!(!combos[0].is_unreachable());
        assert!(combos[1].is_unreachable());
    }

    #[test]
    fn test_prefilter_inner_any_under_fixed_value() {
        let mut paths = GamesyncPaths::new(true);
        assert!(!paths.add(GsType::Switch, MUSIC, 1));
        assert!(paths.add(GsType::Switch, MUSIC, 0));
        paths.done();
        assert!(!paths.add(GsType::Switch, MUSIC, 1));
        paths.done();
        paths.done();

        // without prefilter every scope is descended
        let mut paths = GamesyncPaths::new(false);
        paths.add(GsType::Switch, MUSIC, 1);
        assert!(!paths.add(GsType::Switch, MUSIC, 0));
    }

    #[test]
    fn test_manual_params() {
        let params = Params::parse("(bgm=m01)[act=-]", true, true, false);
        let mut paths = GamesyncPaths::new(false);
        paths.add_params(&params);
        assert!(!paths.is_empty());

        let combos = paths.combos();
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].current(GsType::State, id_or_hash("bgm")), Some(id_or_hash("m01")));
        assert_eq!(combos[0].current(GsType::Switch, id_or_hash("act")), Some(0));
    }
}
