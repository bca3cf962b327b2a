//! Object filters
//!
//! Each item targets an id, class, bank, bank index or name, optionally as
//! a `*` pattern:
//!
//! ```text
//! play_bgm          event named play_bgm
//! -123456           anything but object 123456
//! cakmusictrack     music tracks
//! music.bnk         objects in music.bnk (compared by hash)
//! music-0012        object 12 in music.bnk
//! @-sfx_step*       skip sounds with this source name while rendering
//! ~cakmusicsegment  unused music segments
//! ```

use crate::model::NodeRef;
use crate::names::NameResolver;
use crate::utils::{hash_name, matches_glob};

/// Where a filter item applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Entries, at the top of a playlist
    Outer,
    /// Objects reached while rendering
    Inner,
    /// Objects no entry reached
    Unused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Sid,
    Class,
    Bank,
    Index(usize),
    /// Id or hashname
    Name,
}

#[derive(Debug, Clone)]
struct FilterItem {
    excluded: bool,
    mode: FilterMode,
    target: Target,
    pattern: bool,
    value: String,
}

fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// `(hash).bnk` for named banks, so renamed dumps still match
fn bank_comp(bankname: &str, pattern: bool) -> String {
    if pattern {
        return bankname.to_string();
    }
    let stem = bankname.strip_suffix(".bnk").unwrap_or(bankname);
    if is_numeric(stem) {
        return bankname.to_string();
    }
    format!("{}.bnk", hash_name(stem))
}

impl FilterItem {
    fn parse(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        let mut value = text.split('#').next().unwrap_or_default().trim();
        if value.is_empty() {
            return None;
        }

        let mut mode = FilterMode::Outer;
        if let Some(rest) = value.strip_prefix('~') {
            mode = FilterMode::Unused;
            value = rest;
        }
        if let Some(rest) = value.strip_prefix('@') {
            mode = FilterMode::Inner;
            value = rest;
        }
        let mut excluded = false;
        if let Some(rest) = value.strip_prefix('-').or_else(|| value.strip_prefix('/')) {
            excluded = true;
            value = rest;
        }

        let pattern = value.contains('*');
        let (target, value) = if is_numeric(value) {
            (Target::Sid, value.to_string())
        } else if value.starts_with("cak") {
            (Target::Class, value.to_string())
        } else if value.ends_with(".bnk") {
            (Target::Bank, bank_comp(value, pattern))
        } else if value.contains('-') {
            // (bank)-(index)-(description)
            let mut parts = value.split('-');
            let bankname = parts.next().unwrap_or_default();
            let index = parts.next().unwrap_or_default().split('~').next().unwrap_or_default();
            let Ok(index) = index.parse::<usize>() else {
                tracing::info!("filter: ignored {text}");
                return None;
            };
            (Target::Index(index), bank_comp(&format!("{bankname}.bnk"), pattern))
        } else {
            (Target::Name, value.to_string())
        };

        Some(Self {
            excluded,
            mode,
            target,
            pattern,
            value,
        })
    }

    fn matches(&self, object: &FilterObject<'_>) -> bool {
        let comps = match self.target {
            Target::Sid => vec![Some(object.sid.to_string())],
            Target::Class => vec![Some(object.class.to_lowercase())],
            Target::Bank => vec![Some(bank_comp(&object.bankname.to_lowercase(), self.pattern))],
            Target::Index(index) => {
                if object.index != Some(index) {
                    return false;
                }
                vec![Some(bank_comp(&object.bankname.to_lowercase(), self.pattern))]
            }
            // banks and hashnames sometimes clash, so both are tried
            Target::Name => vec![Some(object.sid.to_string()), object.hashname.map(str::to_lowercase)],
        };

        comps.into_iter().flatten().any(|comp| {
            if self.pattern {
                matches_glob(&self.value, &comp)
            } else {
                comp == self.value
            }
        })
    }
}

/// What an item is compared against
struct FilterObject<'s> {
    sid: u32,
    hashname: Option<&'s str>,
    class: &'s str,
    bankname: &'s str,
    index: Option<usize>,
}

#[derive(Debug, Clone)]
struct ModeConfig {
    items: Vec<FilterItem>,
    default_allow: bool,
    /// Otherwise only the default entry classes pass
    allow_all_objects: bool,
}

impl ModeConfig {
    fn new(mode: FilterMode, items: &[FilterItem]) -> Self {
        let items: Vec<FilterItem> = items.iter().filter(|i| i.mode == mode).cloned().collect();
        let has_includes = items.iter().any(|i| !i.excluded);
        let has_all = items
            .iter()
            .any(|i| i.target == Target::Class || (i.target == Target::Sid && !i.excluded));

        // only includes: everything else is out; only excludes: everything else is in
        let mut default_allow = !has_includes;
        if mode == FilterMode::Unused && items.is_empty() {
            default_allow = false;
        }
        let allow_all_objects = matches!(mode, FilterMode::Inner | FilterMode::Unused) || has_all;

        Self {
            items,
            default_allow,
            allow_all_objects,
        }
    }
}

/// Decides which objects become playlists and which are rendered inside them
#[derive(Debug, Clone)]
pub struct Filter {
    active: bool,
    default_hircs: Vec<String>,
    outer: ModeConfig,
    inner: ModeConfig,
    unused: ModeConfig,
    /// Also generate entries the filter doesn't select, after the selected ones
    pub generate_rest: bool,
    /// Process entries but don't write them
    pub skip_normal: bool,
    /// Process unused objects but don't write them
    pub skip_unused: bool,
}

impl Filter {
    /// Parses filter items; an empty list makes an inactive filter that
    /// allows everything
    pub fn new<S: AsRef<str>>(items: &[S], default_hircs: &[&str]) -> Self {
        let parsed: Vec<FilterItem> = items.iter().filter_map(|i| FilterItem::parse(i.as_ref())).collect();
        Self {
            active: !items.is_empty(),
            default_hircs: default_hircs.iter().map(|c| c.to_lowercase()).collect(),
            outer: ModeConfig::new(FilterMode::Outer, &parsed),
            inner: ModeConfig::new(FilterMode::Inner, &parsed),
            unused: ModeConfig::new(FilterMode::Unused, &parsed),
            generate_rest: false,
            skip_normal: false,
            skip_unused: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether some item targets unused objects
    pub fn has_unused(&self) -> bool {
        !self.unused.items.is_empty()
    }

    fn config(&self, mode: FilterMode) -> &ModeConfig {
        match mode {
            FilterMode::Outer => &self.outer,
            FilterMode::Inner => &self.inner,
            FilterMode::Unused => &self.unused,
        }
    }

    fn allow(&self, mode: FilterMode, node: NodeRef<'_>, names: &dyn NameResolver) -> bool {
        let Some(sid) = node.sid() else {
            return false;
        };
        let class = node.name();
        let is_sound = class == "CAkSound";

        let hashname = if mode == FilterMode::Inner && is_sound {
            node.find1("sourceID").and_then(|n| n.guidname())
        } else {
            node.find1_type("sid")
                .and_then(|n| n.hashname())
                .or_else(|| names.get_namerow(sid).and_then(|row| row.hashname.as_deref()))
        };

        let config = self.config(mode);
        if !config.allow_all_objects && !self.default_hircs.contains(&class.to_lowercase()) {
            return false;
        }

        // inner includes only apply to sounds, or whole branches would go
        let mut allow = if mode == FilterMode::Inner && !is_sound {
            true
        } else {
            config.default_allow
        };

        let object = FilterObject {
            sid,
            hashname,
            class,
            bankname: node.bank().filename(),
            index: node.index(),
        };
        for item in &config.items {
            if item.matches(&object) {
                allow = !item.excluded;
            }
        }
        allow
    }

    /// Whether an entry should be generated
    pub fn allow_outer(&self, node: NodeRef<'_>, names: &dyn NameResolver) -> bool {
        !self.active || self.allow(FilterMode::Outer, node, names)
    }

    /// Whether an object reached while rendering should be followed
    pub fn allow_inner(&self, node: NodeRef<'_>, names: &dyn NameResolver) -> bool {
        !self.active || self.allow(FilterMode::Inner, node, names)
    }

    /// Whether an unused object should be generated
    pub fn allow_unused(&self, node: NodeRef<'_>, names: &dyn NameResolver) -> bool {
        !self.active || self.generate_rest || self.allow(FilterMode::Unused, node, names)
    }
}
