//! Gamevars: operator values for RTPC game parameters (distance, hp...)
//!
//! There is nothing to register while rendering: combos come only from
//! operator params and are replayed as given.

use indexmap::IndexMap;

use super::params::{GsType, ParamItem, Params};
use crate::utils::id_or_hash;

/// Key applying a value to every binding
pub const ANY_KEY: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GamevarValue {
    /// First point of the curve
    Min,
    /// Last point of the curve
    Max,
    /// Leave the binding unset for this combo
    Unset,
    Value(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GamevarItem {
    pub key: u32,
    /// Original key text, when it was a name
    pub keyname: Option<String>,
    pub value: GamevarValue,
}

impl GamevarItem {
    /// Parses one `key=value` item; `None` when the value isn't valid
    pub fn parse(key: &str, val: &str) -> Option<Self> {
        let (key, keyname) = match key {
            "*" => (ANY_KEY, None),
            _ if key.bytes().all(|b| b.is_ascii_digit()) => (id_or_hash(key), None),
            _ => (id_or_hash(key), Some(key.to_string())),
        };
        let value = match val {
            "min" => GamevarValue::Min,
            "max" => GamevarValue::Max,
            "-" => GamevarValue::Unset,
            _ => GamevarValue::Value(val.parse().ok()?),
        };
        Some(Self { key, keyname, value })
    }

    fn from_param(item: &ParamItem) -> Option<Self> {
        let gitem = Self::parse(&item.key, &item.val);
        if gitem.is_none() {
            tracing::info!("ignored incorrect gamevar {}", item.elem);
        }
        gitem
    }
}

/// Values active for one replay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamevarsParams {
    items: IndexMap<u32, GamevarItem>,
}

impl GamevarsParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: GamevarItem) {
        self.items.insert(item.key, item);
    }

    /// Item for an RTPC id, falling back to the `*` item
    pub fn get(&self, id: u32) -> Option<&GamevarItem> {
        self.items.get(&id).or_else(|| self.items.get(&ANY_KEY))
    }

    pub fn items(&self) -> impl Iterator<Item = &GamevarItem> {
        self.items.values()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GamevarsPaths {
    combos: Vec<GamevarsParams>,
}

impl GamevarsPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    pub fn combos(&self) -> &[GamevarsParams] {
        &self.combos
    }

    pub fn add_params(&mut self, params: &Params) {
        for combo in params.combos() {
            let mut gvparams = GamevarsParams::new();
            for item in combo.iter().filter(|i| i.gtype == GsType::GameParameter) {
                if let Some(gitem) = GamevarItem::from_param(item) {
                    gvparams.add(gitem);
                }
            }
            self.combos.push(gvparams);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items() {
        let item = GamevarItem::parse("*", "max").unwrap();
        assert_eq!((item.key, item.value), (ANY_KEY, GamevarValue::Max));

        let item = GamevarItem::parse("distance", "12.5").unwrap();
        assert_eq!(item.key, id_or_hash("distance"));
        assert_eq!(item.keyname.as_deref(), Some("distance"));
        assert_eq!(item.value, GamevarValue::Value(12.5));

        assert_eq!(GamevarItem::parse("123", "-").unwrap().value, GamevarValue::Unset);
        assert!(GamevarItem::parse("hp", "lots").is_none());
    }

    #[test]
    fn test_paths_and_wildcard() {
        let params = Params::parse("hp=1,2 *=min {bad=x}", false, false, true);
        let mut paths = GamevarsPaths::new();
        paths.add_params(&params);

        let combos = paths.combos();
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[0].get(id_or_hash("hp")).unwrap().value, GamevarValue::Value(1.0));
        assert_eq!(combos[1].get(id_or_hash("hp")).unwrap().value, GamevarValue::Value(2.0));
        // unknown ids use the wildcard
        assert_eq!(combos[0].get(999).unwrap().value, GamevarValue::Min);
        assert_eq!(combos[0].items().count(), 2);
    }
}
