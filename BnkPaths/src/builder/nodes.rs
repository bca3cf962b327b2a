//! Per-class builder data
//!
//! Each HIRC class keeps only what traversal needs. References stay as raw
//! ids and are resolved through the [`Builder`](super::Builder) when rendered.

use indexmap::IndexMap;

use super::music::{self, PlaylistItem, Stinger, TrackData, TransitionRules};
use super::source::{Fx, Source};
use super::tree::DecisionTree;
use super::BNodeId;
use crate::error::{Error, Result};
use crate::model::NodeRef;
use crate::props::{Props, RtpcList, StateChunk};
use crate::registry::GsType;

/// Kinds of action that start playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Play,
    PlayEvent,
    Trigger,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BKind {
    Event {
        actions: Vec<u32>,
    },
    DialogueEvent {
        tree: Option<DecisionTree>,
    },
    Action {
        action: ActionKind,
        target: u32,
        /// Bank holding the target, when the action names one
        bank: Option<u32>,
    },
    ActorMixer,
    Switch {
        gtype: GsType,
        group: u32,
        values: IndexMap<u32, Vec<u32>>,
    },
    RanSeq {
        /// 0 = random, 1 = sequence
        mode: u32,
        random_mode: u32,
        continuous: bool,
        avoid_repeats: u32,
        children: Vec<u32>,
    },
    Layer {
        children: Vec<u32>,
    },
    Sound {
        source: Option<Source>,
    },
    MusicSwitch {
        rules: TransitionRules,
        stingers: Vec<Stinger>,
        tree: Option<DecisionTree>,
        gtype: GsType,
        group: u32,
        values: IndexMap<u32, u32>,
    },
    MusicRanSeq {
        rules: TransitionRules,
        stingers: Vec<Stinger>,
        playlist: Vec<PlaylistItem>,
    },
    MusicSegment {
        stingers: Vec<Stinger>,
        duration: f64,
        entry: f64,
        exit: f64,
        children: Vec<u32>,
    },
    MusicTrack(TrackData),
    State,
    Bus,
    FxCustom(Fx),
    AudioDevice,
    /// Classes that never produce audio (stop actions, attenuations...)
    Other,
}

/// A HIRC object rebuilt for traversal
#[derive(Debug, Clone)]
pub struct BNode<'a> {
    pub node: NodeRef<'a>,
    pub sid: u32,
    pub props: Option<Props>,
    pub statechunk: Option<StateChunk>,
    pub rtpcs: RtpcList,
    pub parent: Option<BNodeId>,
    pub bus: Option<BNodeId>,
    pub auxs: Vec<BNodeId>,
    pub kind: BKind,
}

impl<'a> BNode<'a> {
    pub fn class(&self) -> &'a str {
        self.node.name()
    }

    /// Bank id of the bank holding this object
    pub fn bank_id(&self) -> u32 {
        self.node.bank().id()
    }

    /// Whether the object emits a waveform reference
    pub fn is_audible(&self) -> bool {
        matches!(self.kind, BKind::Sound { .. } | BKind::MusicTrack(_))
    }

    pub fn is_bus(&self) -> bool {
        matches!(self.kind, BKind::Bus)
    }

    pub fn looping(&self) -> Option<i64> {
        self.props.as_ref().and_then(|p| p.looping)
    }

    pub fn stingers(&self) -> &[Stinger] {
        match &self.kind {
            BKind::MusicSwitch { stingers, .. }
            | BKind::MusicRanSeq { stingers, .. }
            | BKind::MusicSegment { stingers, .. } => stingers,
            _ => &[],
        }
    }

    pub fn rules(&self) -> Option<&TransitionRules> {
        match &self.kind {
            BKind::MusicSwitch { rules, .. } | BKind::MusicRanSeq { rules, .. } => Some(rules),
            _ => None,
        }
    }
}

fn tids(node: Option<NodeRef<'_>>) -> Vec<u32> {
    node.map(|n| n.finds_type("tid").iter().map(NodeRef::uint).collect())
        .unwrap_or_default()
}

fn no_loop_flag(props: Option<&Props>, sid: u32, class: &str) -> Result<()> {
    if props.is_some_and(|p| p.looping.is_some()) {
        return Err(Error::hard(sid, class, "loop flag"));
    }
    Ok(())
}

fn group_type(node: NodeRef<'_>, name: &str) -> GsType {
    node.uint_of(name).map_or(GsType::Switch, GsType::from_value)
}

/// Builds the class-specific part of a node
///
/// May adjust `props` where a class stores behavior outside the bundle
/// (container loop counts, older loop fields).
pub(super) fn build_kind(node: NodeRef<'_>, sid: u32, props: &mut Option<Props>) -> Result<BKind> {
    let class = node.name();
    let kind = match class {
        "CAkEvent" => BKind::Event {
            actions: node.finds("ulActionID").iter().map(NodeRef::uint).collect(),
        },

        "CAkDialogueEvent" => {
            no_loop_flag(props.as_ref(), sid, class)?;
            BKind::DialogueEvent {
                tree: DecisionTree::parse(node, sid)?,
            }
        }

        "CAkActionPlay" | "CAkActionPlayEvent" | "CAkActionTrigger" => {
            let action = match class {
                "CAkActionPlay" => ActionKind::Play,
                "CAkActionPlayEvent" => ActionKind::PlayEvent,
                _ => ActionKind::Trigger,
            };
            let target = node.uint_of("idExt").or_else(|| node.uint_of("ulTargetID")).unwrap_or(0);
            let bank = match node.find1("PlayActionParams") {
                Some(params) => params.uint_of("bankID"),
                None => node.uint_of("fileID"),
            };
            BKind::Action { action, target, bank }
        }
        "CAkActionPlayAndContinue" => return Err(Error::hard(sid, class, "play and continue actions not supported")),

        "CAkActorMixer" => BKind::ActorMixer,

        "CAkSwitchCntr" => {
            no_loop_flag(props.as_ref(), sid, class)?;
            let mut values = IndexMap::new();
            for nswitch in node.finds("ulSwitchID") {
                let children = tids(nswitch.parent().and_then(|p| p.find1("NodeList")));
                if children.is_empty() {
                    continue;
                }
                values.insert(nswitch.uint(), children);
            }
            BKind::Switch {
                gtype: group_type(node, "eGroupType"),
                group: node.uint_of("ulGroupID").unwrap_or(0),
                values,
            }
        }

        "CAkRanSeqCntr" => {
            no_loop_flag(props.as_ref(), sid, class)?;
            let mode = node.uint_of("eMode").unwrap_or(0);
            let continuous = node.int_of("bIsContinuous").unwrap_or(0) != 0;
            let loop_count = node.int_of("sLoopCount").unwrap_or(1);
            // infinite loops in step mode just replay one child
            let looping = (loop_count != 0 || continuous).then_some(loop_count);
            props.get_or_insert_with(Props::default).looping = looping;

            let mut children: Vec<u32> = node
                .finds("AkPlaylistItem")
                .iter()
                .filter_map(|item| item.find1_type("tid").map(|t| t.uint()))
                .collect();
            if children.is_empty() {
                children = tids(node.find1("Children"));
            }
            BKind::RanSeq {
                mode,
                random_mode: node.uint_of("eRandomMode").unwrap_or(0),
                continuous,
                avoid_repeats: node.uint_of("wAvoidRepeatCount").unwrap_or(0),
                children,
            }
        }

        "CAkLayerCntr" => {
            no_loop_flag(props.as_ref(), sid, class)?;
            BKind::Layer {
                children: tids(node.find1("Children")),
            }
        }

        "CAkSound" => {
            if let Some(nloop) = node.find1("Loop") {
                props.get_or_insert_with(Props::default).looping = Some(nloop.int());
            }
            let source = match node.find1("AkBankSourceData") {
                Some(nsrc) => Some(Source::parse(nsrc, sid, class)?),
                None => None,
            };
            BKind::Sound { source }
        }

        "CAkMusicSwitchCntr" => {
            let tree = DecisionTree::parse(node, sid)?;
            let mut values = IndexMap::new();
            if tree.is_none() {
                if let Some(assocs) = node.find1("pAssocs") {
                    for nvalue in assocs.finds("switchID") {
                        let target = nvalue.parent().and_then(|p| p.uint_of("nodeID")).unwrap_or(0);
                        values.insert(nvalue.uint(), target);
                    }
                }
            }
            BKind::MusicSwitch {
                rules: TransitionRules::parse(node),
                stingers: music::parse_stingers(node),
                tree,
                gtype: group_type(node, "eGroupType"),
                group: node.uint_of("ulGroupID").unwrap_or(0),
                values,
            }
        }

        "CAkMusicRanSeqCntr" => {
            no_loop_flag(props.as_ref(), sid, class)?;
            BKind::MusicRanSeq {
                rules: TransitionRules::parse(node),
                stingers: music::parse_stingers(node),
                playlist: music::parse_playlist(node.find1("pPlayList"), sid, class)?,
            }
        }

        "CAkMusicSegment" => {
            no_loop_flag(props.as_ref(), sid, class)?;
            let (entry, exit) = music::parse_markers(node, sid)?;
            BKind::MusicSegment {
                stingers: music::parse_stingers(node),
                duration: node.float_of("fDuration").unwrap_or(0.0),
                entry,
                exit,
                children: tids(node.find1("Children")),
            }
        }

        "CAkMusicTrack" => {
            // tracks loop through their segment, never by themselves
            if let Some(props) = props.as_mut() {
                props.looping = None;
            }
            BKind::MusicTrack(music::parse_track(node, sid)?)
        }

        "CAkState" => BKind::State,
        "CAkBus" | "CAkAuxBus" | "CAkFeedbackBus" => BKind::Bus,
        "CAkFxCustom" => {
            let plugin_id = node.uint_of("fxID").unwrap_or(0);
            BKind::FxCustom(Fx::parse(node, plugin_id))
        }
        "CAkAudioDevice" => BKind::AudioDevice,
        _ => BKind::Other,
    };
    Ok(kind)
}
