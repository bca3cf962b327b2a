//! Operator params: gamesync, state and gamevar values given as text
//!
//! Syntax, with `(..)` states, `[..]` switches and `{..}` game parameters:
//!
//! ```text
//! (bgm=m01)[bgm=m01] {hp=1.0}   one combo with three items
//! bgm=m01,m02 sfx=s01,s02       four combos (bare items need a single allowed type)
//! bgm=m01 / bgm=m02             two combo lists
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Gamesync kinds, numbered as stored in banks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GsType {
    Switch,
    State,
    /// Not a bank value: marks RTPC game parameters in operator params
    GameParameter,
}

impl GsType {
    pub fn from_value(value: u32) -> Self {
        match value {
            1 => GsType::State,
            2 => GsType::GameParameter,
            _ => GsType::Switch,
        }
    }

    pub fn short(self) -> &'static str {
        match self {
            GsType::Switch => "SW",
            GsType::State => "ST",
            GsType::GameParameter => "GP",
        }
    }
}

/// One gamesync assignment; value 0 is "any"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gamesync {
    pub gtype: GsType,
    pub group: u32,
    pub value: u32,
}

impl Gamesync {
    pub fn new(gtype: GsType, group: u32, value: u32) -> Self {
        Self { gtype, group, value }
    }
}

/// A parsed `key=value` item, names not yet hashed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamItem {
    pub gtype: GsType,
    pub key: String,
    pub val: String,
    /// Original text, for logs
    pub elem: String,
}

impl fmt::Display for ParamItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}={}", self.gtype.short(), self.key, self.val)
    }
}

/// Operator params split into combos
#[derive(Debug, Clone, Default)]
pub struct Params {
    allow_st: bool,
    allow_sw: bool,
    allow_gp: bool,
    items: IndexMap<(GsType, String), Vec<ParamItem>>,
    combos: Vec<Vec<ParamItem>>,
}

const SPLITS: [&str; 9] = [")(", ")[", "){", "](", "][", "]{", "}(", "}[", "}{"];

impl Params {
    /// Params accepting the given kinds for items without brackets
    pub fn new(allow_st: bool, allow_sw: bool, allow_gp: bool) -> Self {
        Self {
            allow_st,
            allow_sw,
            allow_gp,
            ..Self::default()
        }
    }

    /// Parses whitespace separated items
    pub fn parse(text: &str, allow_st: bool, allow_sw: bool, allow_gp: bool) -> Self {
        let mut params = Self::new(allow_st, allow_sw, allow_gp);
        params.adds(text.split_whitespace());
        params
    }

    pub fn adds<I, S>(&mut self, elems: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut any = false;
        for elem in elems {
            any = true;
            let elem = elem.as_ref();
            if elem == "/" {
                self.add_combos();
                continue;
            }

            let mut split = elem.to_string();
            for pair in SPLITS {
                let chars: Vec<char> = pair.chars().collect();
                split = split.replace(pair, &format!("{}:{}", chars[0], chars[1]));
            }
            if split != elem {
                for part in split.split(':') {
                    if !self.add_param(part) {
                        tracing::info!("ignored incorrect param {part}");
                    }
                }
            } else if !self.add_param(elem) {
                tracing::info!("ignored incorrect param {elem}");
            }
        }
        if any {
            self.add_combos();
        }
    }

    fn default_type(&self) -> Option<GsType> {
        match (self.allow_st, self.allow_sw, self.allow_gp) {
            (true, false, false) => Some(GsType::State),
            (false, true, false) => Some(GsType::Switch),
            (false, false, true) => Some(GsType::GameParameter),
            _ => None,
        }
    }

    fn add_param(&mut self, elem: &str) -> bool {
        if elem.is_empty() {
            return false;
        }

        let bracketed = match (elem.chars().next(), elem.chars().last()) {
            (Some('('), Some(')')) => Some(GsType::State),
            (Some('['), Some(']')) => Some(GsType::Switch),
            (Some('{'), Some('}')) => Some(GsType::GameParameter),
            _ => None,
        };
        let (gtype, keyval) = match bracketed {
            Some(gtype) if elem.len() >= 2 => (gtype, &elem[1..elem.len() - 1]),
            _ => match self.default_type() {
                Some(gtype) => (gtype, elem),
                None => return false,
            },
        };

        let parts: Vec<&str> = keyval.split('=').collect();
        let [key, val] = parts.as_slice() else {
            return false;
        };

        if val.contains(',') {
            for subval in val.split(',') {
                self.add_item(ParamItem::new(gtype, key, subval, elem), true);
            }
        } else {
            self.add_item(ParamItem::new(gtype, key, val, elem), false);
        }
        true
    }

    /// Sub-values (`a=1,2`) accumulate without repeats; a repeated key
    /// (`a=1 a=2`) replaces the earlier values
    fn add_item(&mut self, item: ParamItem, subval: bool) {
        let index = (item.gtype, item.key.clone());
        let exists = self.items.contains_key(&index);
        let items = self.items.entry(index).or_default();

        if exists && !subval {
            items.clear();
        }
        if subval && items.iter().any(|old| old.val == item.val) {
            return;
        }
        items.push(item);
    }

    fn add_combos(&mut self) {
        let lists: Vec<Vec<ParamItem>> = std::mem::take(&mut self.items).into_values().collect();
        if lists.is_empty() {
            return;
        }
        self.combos.extend(product(&lists));
    }

    pub fn combos(&self) -> &[Vec<ParamItem>] {
        &self.combos
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }
}

impl ParamItem {
    fn new(gtype: GsType, key: &str, val: &str, elem: &str) -> Self {
        Self {
            gtype,
            key: key.to_string(),
            val: val.to_string(),
            elem: elem.to_string(),
        }
    }
}

/// Cartesian product of lists, first list varying slowest
pub fn product<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut out: Vec<Vec<T>> = vec![Vec::new()];
    for list in lists {
        let mut next = Vec::with_capacity(out.len() * list.len());
        for prefix in &out {
            for item in list {
                let mut combo = prefix.clone();
                combo.push(item.clone());
                next.push(combo);
            }
        }
        out = next;
    }
    out
}
