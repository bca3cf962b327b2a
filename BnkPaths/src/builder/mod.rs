//! Builder layer: rebuilds HIRC objects into typed nodes
//!
//! Objects are indexed by (bank id, short id, id namespace) when created,
//! then rebuilt lazily on first reference. Rebuilt nodes are memoized by
//! object identity and never change afterwards.

pub mod music;
pub mod nodes;
pub mod source;
pub mod tree;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

pub use music::{Clip, PlaylistItem, Stinger, TrackData, TrackSwitch, TransitionRules};
pub use nodes::{ActionKind, BKind, BNode};
pub use source::{Fx, Source};
pub use tree::DecisionTree;

use crate::error::{Error, Result};
use crate::model::{BankSet, NodeKey, NodeRef};
use crate::names::NameResolver;
use crate::props::{Props, RtpcList, StateChunk};

/// Handle to a rebuilt node
pub type BNodeId = usize;

/// Classes rendered as their own entry when no traversal reached them
pub const UNUSED_HIRCS: [&str; 12] = [
    "CAkActionPlay",
    "CAkActionTrigger",
    "CAkActionPlayAndContinue",
    "CAkActionPlayEvent",
    "CAkLayerCntr",
    "CAkSwitchCntr",
    "CAkRanSeqCntr",
    "CAkSound",
    "CAkMusicSwitchCntr",
    "CAkMusicRanSeqCntr",
    "CAkMusicSegment",
    "CAkMusicTrack",
];

/// Namespace of a short id: the same id may name different objects in
/// different namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdType {
    Event,
    DialogueEvent,
    Audio,
    Bus,
    Effect,
    AudioDevice,
}

impl IdType {
    pub fn of_class(class: &str) -> Self {
        match class {
            "CAkEvent" => IdType::Event,
            "CAkDialogueEvent" => IdType::DialogueEvent,
            "CAkBus" | "CAkAuxBus" | "CAkFeedbackBus" => IdType::Bus,
            "CAkFxShareSet" => IdType::Effect,
            "CAkAudioDevice" => IdType::AudioDevice,
            _ => IdType::Audio,
        }
    }
}

/// Reference problems found while building, for the final report
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildDiagnostics {
    /// Missing ids whose bank is loaded (likely leftovers)
    pub missing_loaded: BTreeSet<u32>,
    /// Missing ids in banks not loaded (more input needed)
    pub missing_others: BTreeSet<u32>,
    /// Missing ids without bank info
    pub missing_unknown: BTreeSet<u32>,
    pub missing_buses: BTreeSet<u32>,
    /// Names of banks referenced but not loaded
    pub missing_banks: BTreeSet<String>,
    /// Ids found in more than one bank
    pub multiple_nodes: BTreeSet<u32>,
    pub unknown_props: BTreeSet<String>,
    /// Objects with transition segments outside music switches
    pub transition_objects: usize,
}

impl BuildDiagnostics {
    pub fn has_missing(&self) -> bool {
        !(self.missing_loaded.is_empty() && self.missing_others.is_empty() && self.missing_unknown.is_empty())
    }
}

pub struct Builder<'a> {
    banks: &'a BankSet,
    /// (bank id, sid, namespace) -> object; first registration wins
    refs: HashMap<(u32, u32, IdType), NodeKey>,
    /// (sid, namespace) -> objects in any bank
    ids: HashMap<(u32, IdType), Vec<NodeKey>>,
    /// Class -> objects, in load order
    hircs: IndexMap<&'a str, Vec<NodeKey>>,
    built: HashMap<NodeKey, BNodeId>,
    nodes: Vec<Option<Rc<BNode<'a>>>>,
    used: HashSet<NodeKey>,
    /// Names for missing banks in diagnostics
    names: Option<&'a dyn NameResolver>,
    pub diagnostics: BuildDiagnostics,
}

impl<'a> Builder<'a> {
    /// Indexes every HIRC object of the given banks
    pub fn new(banks: &'a BankSet) -> Self {
        let mut builder = Self {
            banks,
            refs: HashMap::new(),
            ids: HashMap::new(),
            hircs: IndexMap::new(),
            built: HashMap::new(),
            nodes: Vec::new(),
            used: HashSet::new(),
            names: None,
            diagnostics: BuildDiagnostics::default(),
        };
        for bank in banks.iter() {
            for node in bank.hirc_items() {
                builder.register(node);
            }
        }
        builder
    }

    pub fn with_names(mut self, names: &'a dyn NameResolver) -> Self {
        self.names = Some(names);
        self
    }

    fn register(&mut self, node: NodeRef<'a>) {
        let Some(sid) = node.sid() else {
            return;
        };
        let idtype = IdType::of_class(node.name());
        let key = node.key();
        let bank_id = node.bank().id();

        self.refs.entry((bank_id, sid, idtype)).or_insert(key);
        let list = self.ids.entry((sid, idtype)).or_default();
        if !list.contains(&key) {
            list.push(key);
        }
        self.hircs.entry(node.name()).or_default().push(key);
    }

    pub fn banks(&self) -> &'a BankSet {
        self.banks
    }

    /// Objects of a class, in load order
    pub fn hirc_nodes(&self, class: &str) -> Vec<NodeRef<'a>> {
        self.hircs
            .get(class)
            .map(|keys| keys.iter().filter_map(|&k| self.banks.node(k)).collect())
            .unwrap_or_default()
    }

    /// Finds an object: exact bank first, then any bank
    pub fn get_node(&mut self, bank_id: u32, sid: u32, idtype: IdType) -> Option<NodeRef<'a>> {
        if let Some(&key) = self.refs.get(&(bank_id, sid, idtype)) {
            return self.banks.node(key);
        }

        let keys = self.ids.get(&(sid, idtype))?;
        if keys.len() > 1 {
            tracing::debug!("id {sid} found in {} banks, using first", keys.len());
            self.diagnostics.multiple_nodes.insert(sid);
        }
        keys.first().and_then(|&k| self.banks.node(k))
    }

    /// Finds and rebuilds a referenced object, marking it as used
    ///
    /// `target_bank` is the bank the reference explicitly points to, used to
    /// classify missing objects.
    pub fn get_bnode(&mut self, bank_id: u32, tid: u32, idtype: IdType, target_bank: Option<u32>) -> Result<Option<BNodeId>> {
        if bank_id == 0 || tid == 0 {
            return Ok(None);
        }
        let Some(node) = self.get_node(bank_id, tid, idtype) else {
            self.report_missing(tid, idtype, target_bank);
            return Ok(None);
        };
        self.init_bnode(node, true).map(Some)
    }

    /// Like [`Builder::get_bnode`] but for structural links (parents,
    /// buses) that don't count as playback use
    pub fn get_bnode_link(&mut self, bank_id: u32, tid: u32, idtype: IdType) -> Result<Option<BNodeId>> {
        if bank_id == 0 || tid == 0 {
            return Ok(None);
        }
        let Some(node) = self.get_node(bank_id, tid, idtype) else {
            self.report_missing(tid, idtype, None);
            return Ok(None);
        };
        self.init_bnode(node, false).map(Some)
    }

    fn report_missing(&mut self, tid: u32, idtype: IdType, target_bank: Option<u32>) {
        let names = self.names;
        let diag = &mut self.diagnostics;
        if idtype == IdType::Bus {
            tracing::debug!("missing bus {tid}");
            diag.missing_buses.insert(tid);
            return;
        }

        match target_bank {
            Some(bank_id) if self.banks.has_bank_id(bank_id) => {
                tracing::debug!("missing {tid} in loaded bank {bank_id}");
                diag.missing_loaded.insert(tid);
            }
            Some(bank_id) => {
                tracing::debug!("missing {tid} in other bank {bank_id}");
                diag.missing_others.insert(tid);
                let bankname = names
                    .and_then(|names| names.name_of(bank_id))
                    .map_or_else(|| bank_id.to_string(), str::to_string);
                diag.missing_banks.insert(bankname);
            }
            None => {
                tracing::debug!("missing {tid}");
                diag.missing_unknown.insert(tid);
            }
        }
    }

    /// Rebuilds an object, memoized by identity
    pub fn init_bnode(&mut self, node: NodeRef<'a>, mark_used: bool) -> Result<BNodeId> {
        let key = node.key();
        if mark_used {
            self.used.insert(key);
        }
        if let Some(&id) = self.built.get(&key) {
            return Ok(id);
        }

        // reserve the slot first so reference cycles resolve to it
        let id = self.nodes.len();
        self.nodes.push(None);
        self.built.insert(key, id);

        match self.build(node) {
            Ok(bnode) => {
                self.nodes[id] = Some(Rc::new(bnode));
                Ok(id)
            }
            Err(e) => {
                self.built.remove(&key);
                Err(e)
            }
        }
    }

    fn build(&mut self, node: NodeRef<'a>) -> Result<BNode<'a>> {
        let sid = node.sid().ok_or_else(|| Error::hard(0, node.name(), "object without id"))?;
        let bank_id = node.bank().id();

        let mut props = Props::parse(node);
        if let Some(props) = &props {
            self.diagnostics.unknown_props.extend(props.unknowns.iter().cloned());
        }

        let statechunk = StateChunk::parse(node, |instance| {
            let state = self.get_bnode_link(bank_id, instance, IdType::Audio).ok().flatten()?;
            self.bnode(state).and_then(|s| s.props.clone())
        });

        let kind = nodes::build_kind(node, sid, &mut props)?;
        if let BKind::MusicRanSeq { rules, .. } = &kind {
            if !rules.transition_segments().is_empty() {
                self.diagnostics.transition_objects += 1;
            }
        }
        let kind = self.resolve_fx(kind, node, bank_id)?;

        let mut bnode = BNode {
            node,
            sid,
            props,
            statechunk,
            rtpcs: RtpcList::parse(node),
            parent: None,
            bus: None,
            auxs: Vec::new(),
            kind,
        };
        self.build_links(&mut bnode)?;
        Ok(bnode)
    }

    /// Silence sources take their duration from an fx object
    fn resolve_fx(&mut self, kind: BKind, node: NodeRef<'a>, bank_id: u32) -> Result<BKind> {
        let BKind::Sound { source: Some(mut source) } = kind else {
            return Ok(kind);
        };
        if source.is_silence {
            if source.plugin_size.is_some_and(|size| size > 0) {
                let plugin_id = source.plugin_id.unwrap_or(0);
                source.plugin_fx = node.find1("AkBankSourceData").map(|nsrc| Fx::parse(nsrc, plugin_id));
            } else if let Some(fx) = self.get_bnode_link(bank_id, source.tid, IdType::Audio)? {
                if let Some(BKind::FxCustom(fx)) = self.bnode(fx).map(|b| b.kind.clone()) {
                    source.plugin_fx = Some(fx);
                }
            }
        }
        Ok(BKind::Sound { source: Some(source) })
    }

    fn build_links(&mut self, bnode: &mut BNode<'a>) -> Result<()> {
        let node = bnode.node;
        let bank_id = node.bank().id();

        if bnode.is_bus() {
            // buses chain through their parent bus
            let parent = node.uint_of("OverrideBusId").unwrap_or(0);
            bnode.parent = self.get_bnode_link(bank_id, parent, IdType::Bus)?;
        } else if let Some(base) = node.find1("NodeBaseParams") {
            let parent = base.uint_of("DirectParentID").unwrap_or(0);
            bnode.parent = self.get_bnode_link(bank_id, parent, IdType::Audio)?;
            let bus = base.uint_of("OverrideBusId").unwrap_or(0);
            bnode.bus = self.get_bnode_link(bank_id, bus, IdType::Bus)?;
        }

        let has_aux = node.int_of("bHasAux").unwrap_or(0) > 0;
        let override_aux = node.int_of("bOverrideUserAuxSends");
        let aux_allowed = match override_aux {
            None => false,
            Some(flag) => bnode.parent.is_none() || flag > 0,
        };
        if has_aux && aux_allowed {
            for aux in node.finds("auxID") {
                if let Some(id) = self.get_bnode_link(bank_id, aux.uint(), IdType::Bus)? {
                    bnode.auxs.push(id);
                }
            }
        }
        Ok(())
    }

    /// A rebuilt node; `None` while it is still being built
    pub fn bnode(&self, id: BNodeId) -> Option<Rc<BNode<'a>>> {
        self.nodes.get(id).and_then(Clone::clone)
    }

    pub fn is_used(&self, node: NodeRef<'a>) -> bool {
        self.used.contains(&node.key())
    }

    /// Whether an object counts as unused: never reached, and (for music
    /// segments) with something to play
    pub fn is_unused(&mut self, node: NodeRef<'a>) -> bool {
        if self.is_used(node) {
            return false;
        }
        if node.name() == "CAkMusicSegment" {
            let has_children = node.find1("Children").is_some_and(|c| !c.finds_type("tid").is_empty());
            return has_children;
        }
        true
    }

    /// Unused objects of the given classes, in class then load order
    pub fn unused_nodes(&mut self) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        for class in UNUSED_HIRCS {
            for node in self.hirc_nodes(class) {
                if self.is_unused(node) {
                    out.push(node);
                }
            }
        }
        out
    }
}
