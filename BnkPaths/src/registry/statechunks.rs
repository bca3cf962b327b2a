//! State combos: states that change properties (usually silencing layers)
//!
//! Objects with state chunks register their usable (group, value) pairs
//! while rendering. Afterwards each combination of one value per group is
//! replayed, plus a default with no state applied when it makes sense.

use indexmap::IndexMap;

use super::gamesync::GamesyncParams;
use super::params::{GsType, Params, product};
use crate::utils::id_or_hash;

/// Above this many combos, entries with the same props are merged
const CLEAN_COMBOS: usize = 64;
/// Above this many combos (after merging), all states go in one combo
const MAX_COMBOS: usize = 128;

/// One state that changes props
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateItem {
    pub group: u32,
    pub value: u32,
    /// Content hash of the override props; 0 when unknown
    pub hash: u32,
    /// Can't be set while the current gamesync path is active
    pub unreachable: bool,
}

impl StateItem {
    pub fn new(group: u32, value: u32, hash: u32) -> Self {
        Self {
            group,
            value,
            hash,
            unreachable: false,
        }
    }
}

/// States active for one replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateChunkParams {
    elems: IndexMap<(u32, u32), StateItem>,
    unreachables: bool,
}

impl StateChunkParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: StateItem) {
        if item.unreachable {
            self.unreachables = true;
        }
        self.elems.insert((item.group, item.value), item);
    }

    pub fn has_unreachables(&self) -> bool {
        self.unreachables
    }

    pub fn contains(&self, group: u32, value: u32) -> bool {
        self.elems.contains_key(&(group, value))
    }

    pub fn get(&self, group: u32, value: u32) -> Option<&StateItem> {
        self.elems.get(&(group, value))
    }

    pub fn items(&self) -> impl Iterator<Item = &StateItem> {
        self.elems.values()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }
}

/// State values found during rendering, per group
#[derive(Debug, Clone, Default)]
pub struct StateChunkPaths {
    elems: IndexMap<u32, Vec<StateItem>>,
    forced_path: bool,
    unreachables: bool,
    unreachables_only: bool,
    combos: Option<Vec<StateChunkParams>>,
    fallback: bool,
}

impl StateChunkPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty() && self.combos.is_none()
    }

    pub fn has_unreachables(&self) -> bool {
        self.unreachables
    }

    pub fn is_unreachables_only(&self) -> bool {
        self.unreachables_only
    }

    pub fn set_unreachables_only(&mut self) {
        self.unreachables_only = true;
    }

    /// Whether the last [`StateChunkPaths::combos`] call gave up enumerating
    pub fn used_fallback(&self) -> bool {
        self.fallback
    }

    pub fn add(&mut self, group: u32, value: u32, hash: u32) {
        let items = self.elems.entry(group).or_default();
        if !items.iter().any(|i| i.value == value) {
            items.push(StateItem::new(group, value, hash));
        }
    }

    /// Combos of one value per group; computed once
    pub fn combos(&mut self) -> &[StateChunkParams] {
        if self.combos.is_none() {
            let combos = self.build_combos();
            self.combos = Some(combos);
        }
        self.combos.as_deref().unwrap_or_default()
    }

    fn build_combos(&mut self) -> Vec<StateChunkParams> {
        // reachable values first so they get the better names
        let mut groups: Vec<Vec<StateItem>> = self
            .elems
            .values()
            .map(|items| {
                let mut items = items.clone();
                items.sort_by_key(|i| i.unreachable);
                items
            })
            .collect();

        let total = |groups: &[Vec<StateItem>]| groups.iter().map(Vec::len).product::<usize>();
        if total(&groups) > CLEAN_COMBOS {
            for items in &mut groups {
                let mut seen = Vec::new();
                items.retain(|i| {
                    let key = (i.hash, i.unreachable);
                    if seen.contains(&key) {
                        false
                    } else {
                        seen.push(key);
                        true
                    }
                });
            }
        }

        let count = total(&groups);
        if count > MAX_COMBOS {
            tracing::info!("ignoring statechunk combo excess of {count} (may need to pass manually)");
            self.fallback = true;
            let mut params = StateChunkParams::new();
            for item in groups.into_iter().flatten() {
                params.add(item);
            }
            return vec![params];
        }

        product(&groups)
            .into_iter()
            .map(|combo| {
                let mut params = StateChunkParams::new();
                for item in combo {
                    params.add(item);
                }
                params
            })
            .collect()
    }

    /// Whether a base output with no state applied should be made too
    ///
    /// Not when only unreachable combos are being rendered, nor when the
    /// current path fixes the single state combo.
    pub fn generate_default(&self, combo_count: usize) -> bool {
        if self.unreachables_only {
            return false;
        }
        !(self.forced_path && combo_count == 1)
    }

    /// Marks states the current gamesync path makes impossible
    ///
    /// A path with `bgm=a` can't reach state overrides for `bgm=b`. The
    /// current value is added so the reachable combo gets its name.
    pub fn filter(&mut self, gsparams: Option<&GamesyncParams>) {
        let Some(gsparams) = gsparams.filter(|p| !p.is_empty()) else {
            return;
        };

        for (&group, items) in &mut self.elems {
            let Some(value) = gsparams.current(GsType::State, group) else {
                continue;
            };
            // "any" may be every value
            if value == 0 {
                continue;
            }
            self.forced_path = true;

            if !items.iter().any(|i| i.value == value) {
                items.push(StateItem::new(group, value, 0));
            }
            for item in items.iter_mut() {
                if item.value != value {
                    item.unreachable = true;
                    self.unreachables = true;
                }
            }
        }
    }

    /// Replaces found states with operator combos
    pub fn add_params(&mut self, params: &Params) {
        let combos = params
            .combos()
            .iter()
            .map(|combo| {
                let mut scparams = StateChunkParams::new();
                for item in combo {
                    if item.gtype != GsType::State || item.val == "-" {
                        continue;
                    }
                    scparams.add(StateItem::new(id_or_hash(&item.key), id_or_hash(&item.val), 0));
                }
                scparams
            })
            .collect();
        self.combos = Some(combos);
    }
}
