//! Playlist tree
//!
//! The renderer builds a rough tree that mirrors the objects it visits.
//! The simplifier then reshapes it into what the printer can express, so
//! nodes carry both the raw config and the final timings.

use crate::builder::Source;
use crate::props::{EffectiveConfig, SILENCE_DB};

/// Index of a node in its [`TxtpTree`]
pub type TNodeId = usize;

pub const ROOT: TNodeId = 0;

const VOLUME_DB_MAX: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Root,
    Single,
    SequenceContinuous,
    SequenceStep,
    RandomContinuous,
    RandomStep,
    Layer,
    Sound,
}

impl NodeType {
    /// Printable groups; the root is neither a group nor a sound
    pub fn is_group(self) -> bool {
        !matches!(self, NodeType::Root | NodeType::Sound)
    }

    pub fn is_steps(self) -> bool {
        matches!(self, NodeType::SequenceStep | NodeType::RandomStep)
    }

    pub fn is_continuous(self) -> bool {
        matches!(self, NodeType::SequenceContinuous | NodeType::RandomContinuous)
    }

    /// Group letter in `group = -X`
    pub fn code(self) -> &'static str {
        match self {
            NodeType::RandomContinuous | NodeType::RandomStep => "R",
            NodeType::Layer => "L",
            _ => "S",
        }
    }
}

/// Music segment timings (ms)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentTimes {
    pub duration: f64,
    pub entry: f64,
    pub exit: f64,
}

/// Config a node starts with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeConfig {
    pub volume: Option<f64>,
    pub delay: f64,
    pub idelay: f64,
    pub looping: Option<i64>,
    pub crossfaded: bool,
    pub silenced: bool,
    pub silenced_default: bool,
    pub segment: Option<SegmentTimes>,
}

impl From<&EffectiveConfig> for NodeConfig {
    fn from(config: &EffectiveConfig) -> Self {
        Self {
            volume: (config.gain != 0.0).then_some(config.gain),
            delay: config.delay,
            idelay: config.idelay,
            looping: config.looping,
            crossfaded: config.crossfaded,
            silenced: config.silenced,
            silenced_default: config.silenced_default,
            segment: None,
        }
    }
}

/// Music clip placement (ms)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClipTimes {
    pub fpa: f64,
    pub fbt: f64,
    pub fet: f64,
    pub fsd: f64,
}

/// Leaf payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSound {
    pub source: Option<Source>,
    /// Music clips get their timings from the track, sfx from their config
    pub clip: Option<ClipTimes>,
    /// Placeholder for empty tracks and segments
    pub silent: bool,
    pub unreachable: bool,
}

impl NodeSound {
    pub fn new(source: Option<Source>) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn silence_clip() -> Self {
        Self {
            clip: Some(ClipTimes::default()),
            silent: true,
            ..Self::default()
        }
    }

    pub fn is_clip(&self) -> bool {
        self.clip.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TxtpNode {
    pub parent: Option<TNodeId>,
    pub children: Vec<TNodeId>,
    pub ntype: NodeType,
    pub sound: Option<NodeSound>,
    pub segment: Option<SegmentTimes>,
    /// Wraps a segment played as part of a playlist transition
    pub transition: bool,

    pub pad_begin: f64,
    pub trim_begin: f64,
    pub body_time: f64,
    pub trim_end: f64,
    pub pad_end: f64,

    pub volume: Option<f64>,
    pub looping: Option<i64>,
    pub delay: f64,
    pub idelay: f64,
    pub crossfaded: bool,
    pub silenced: bool,
    pub silenced_default: bool,

    pub loop_anchor: bool,
    pub loop_end: bool,
    /// Loop removed to simulate an inner infinite loop trapping playback
    pub loop_killed: bool,
    pub self_loop: bool,
    pub force_selectable: bool,
}

impl TxtpNode {
    fn new(parent: Option<TNodeId>, ntype: NodeType, config: &NodeConfig, sound: Option<NodeSound>) -> Self {
        let mut volume = config.volume;
        let mut silenced = config.silenced;
        if volume.is_some_and(|v| v <= SILENCE_DB) {
            volume = None;
            silenced = true;
        }
        if silenced {
            volume = None;
        }
        let is_clip = sound.as_ref().is_some_and(NodeSound::is_clip);

        Self {
            parent,
            children: Vec::new(),
            ntype,
            sound,
            segment: config.segment,
            transition: false,
            pad_begin: 0.0,
            trim_begin: 0.0,
            body_time: 0.0,
            trim_end: 0.0,
            pad_end: 0.0,
            volume,
            // clips loop through their segment
            looping: if is_clip { None } else { config.looping },
            delay: config.delay,
            idelay: config.idelay,
            crossfaded: config.crossfaded,
            silenced,
            silenced_default: config.silenced_default,
            loop_anchor: false,
            loop_end: false,
            loop_killed: false,
            self_loop: false,
            force_selectable: false,
        }
    }

    pub fn is_sound(&self) -> bool {
        self.ntype == NodeType::Sound
    }

    pub fn is_group(&self) -> bool {
        self.ntype.is_group()
    }

    pub fn is_clip(&self) -> bool {
        self.sound.as_ref().is_some_and(NodeSound::is_clip)
    }

    pub fn no_loop(&self) -> bool {
        matches!(self.looping, None | Some(1))
    }

    /// Whether the node adds nothing to the output (its children still do)
    pub fn ignorable(&self, skiploop: bool, simpler: bool) -> bool {
        if !skiploop && self.looping == Some(0) {
            return false;
        }
        if self.looping.is_some_and(|l| l > 1) {
            return false;
        }
        if self.is_sound() || self.children.len() > 1 {
            return false;
        }
        let has_config = self.idelay != 0.0 || self.delay != 0.0 || self.volume.is_some_and(|v| v != 0.0);
        !(has_config && !simpler)
    }

    pub fn clamp_volume(&mut self) {
        if let Some(volume) = self.volume.as_mut() {
            *volume = volume.clamp(-VOLUME_DB_MAX, VOLUME_DB_MAX);
        }
    }
}

/// Arena of nodes, with the root at [`ROOT`]
#[derive(Debug, Clone)]
pub struct TxtpTree {
    nodes: Vec<TxtpNode>,
}

impl Default for TxtpTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TxtpTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![TxtpNode::new(None, NodeType::Root, &NodeConfig::default(), None)],
        }
    }

    pub fn node(&self, id: TNodeId) -> &TxtpNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: TNodeId) -> &mut TxtpNode {
        &mut self.nodes[id]
    }

    pub fn children(&self, id: TNodeId) -> Vec<TNodeId> {
        self.nodes[id].children.clone()
    }

    pub fn add_group(&mut self, parent: TNodeId, ntype: NodeType, config: &NodeConfig) -> TNodeId {
        self.push(TxtpNode::new(Some(parent), ntype, config, None))
    }

    pub fn add_sound(&mut self, parent: TNodeId, sound: NodeSound, config: &NodeConfig) -> TNodeId {
        self.push(TxtpNode::new(Some(parent), NodeType::Sound, config, Some(sound)))
    }

    fn push(&mut self, node: TxtpNode) -> TNodeId {
        let id = self.nodes.len();
        if let Some(parent) = node.parent {
            self.nodes[parent].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    /// Detaches a node from its parent; it stays in the arena unreachable
    pub fn kill(&mut self, id: TNodeId) {
        if let Some(parent) = self.nodes[id].parent {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    /// Appends a deep copy of `id` (with its original config) under `parent`
    pub fn copy_subtree(&mut self, parent: TNodeId, id: TNodeId) -> TNodeId {
        let mut copy = self.nodes[id].clone();
        copy.parent = Some(parent);
        copy.children = Vec::new();
        let children = self.nodes[id].children.clone();
        let new_id = self.push(copy);
        for child in children {
            self.copy_subtree(new_id, child);
        }
        new_id
    }

    /// First node (itself included) that isn't ignorable
    pub fn first_child(&self, id: TNodeId) -> Option<TNodeId> {
        if !self.nodes[id].ignorable(false, false) {
            return Some(id);
        }
        self.nodes[id].children.iter().find_map(|&c| self.first_child(c))
    }

    /// Whether the node or anything below loops forever
    pub fn has_iloops(&self, id: TNodeId) -> bool {
        let node = &self.nodes[id];
        node.looping == Some(0) || node.children.iter().any(|&c| self.has_iloops(c))
    }

    /// Media id of a single-chain branch, for stable layer order
    pub fn single_source_id(&self, id: TNodeId) -> Option<u32> {
        let node = &self.nodes[id];
        if node.is_sound() {
            return node.sound.as_ref().and_then(|s| s.source.as_ref()).map(|s| s.tid);
        }
        match node.children.as_slice() {
            [child] => self.single_source_id(*child),
            _ => None,
        }
    }

    /// Live node count below the root (root excluded)
    pub fn live_count(&self) -> usize {
        let mut count = 0;
        let mut stack = self.nodes[ROOT].children.clone();
        while let Some(id) = stack.pop() {
            count += 1;
            stack.extend(self.nodes[id].children.iter().copied());
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silenced_volume() {
        let config = NodeConfig {
            volume: Some(-100.0),
            ..NodeConfig::default()
        };
        let mut tree = TxtpTree::new();
        let id = tree.add_group(ROOT, NodeType::Layer, &config);
        assert!(tree.node(id).silenced);
        assert_eq!(tree.node(id).volume, None);
    }

    #[test]
    fn test_ignorable() {
        let mut tree = TxtpTree::new();
        let single = tree.add_group(ROOT, NodeType::Single, &NodeConfig::default());
        let sound = tree.add_sound(single, NodeSound::new(None), &NodeConfig::default());
        assert!(tree.node(ROOT).ignorable(false, false));
        assert!(tree.node(single).ignorable(false, false));
        assert!(!tree.node(sound).ignorable(false, false));
        assert_eq!(tree.first_child(ROOT), Some(sound));

        tree.node_mut(single).volume = Some(3.0);
        assert!(!tree.node(single).ignorable(false, false));
        assert!(tree.node(single).ignorable(false, true));

        tree.node_mut(single).looping = Some(0);
        assert!(!tree.node(single).ignorable(false, true));
        assert!(tree.node(single).ignorable(true, true));
    }

    #[test]
    fn test_clip_loses_loop() {
        let config = NodeConfig {
            looping: Some(0),
            ..NodeConfig::default()
        };
        let mut tree = TxtpTree::new();
        let clip = tree.add_sound(ROOT, NodeSound::silence_clip(), &config);
        let sfx = tree.add_sound(ROOT, NodeSound::new(None), &config);
        assert_eq!(tree.node(clip).looping, None);
        assert_eq!(tree.node(sfx).looping, Some(0));
    }

    #[test]
    fn test_kill_and_copy() {
        let mut tree = TxtpTree::new();
        let layer = tree.add_group(ROOT, NodeType::Layer, &NodeConfig::default());
        let a = tree.add_sound(layer, NodeSound::new(None), &NodeConfig::default());
        let b = tree.add_sound(layer, NodeSound::new(None), &NodeConfig::default());
        assert_eq!(tree.live_count(), 3);

        tree.kill(a);
        assert_eq!(tree.children(layer), vec![b]);

        let copy = tree.copy_subtree(ROOT, layer);
        assert_eq!(tree.children(ROOT), vec![layer, copy]);
        assert_eq!(tree.live_count(), 4);
        assert_eq!(tree.node(copy).ntype, NodeType::Layer);
    }
}
