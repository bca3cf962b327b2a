//! Per-class rendering
//!
//! Each class adds its groups and sounds to the playlist, then follows its
//! references. With no gamesync params set, gamesync containers register
//! every branch instead of picking one.

use super::Renderer;
use crate::builder::{ActionKind, BKind, BNode, Clip, DecisionTree, IdType, PlaylistItem, TrackData};
use crate::error::{Error, Result};
use crate::props::PropertyCalculator;
use crate::registry::{Gamesync, GsType};
use crate::txtp::tree::{ClipTimes, SegmentTimes};
use crate::txtp::{NodeConfig, NodeSound, Txtp};

/// Deepest chain of references followed before giving up
const MAX_DEPTH: usize = 500;

/// Classes that never add anything to a playlist
fn is_silent_kind(kind: &BKind) -> bool {
    matches!(
        kind,
        BKind::Other | BKind::Bus | BKind::State | BKind::FxCustom(_) | BKind::AudioDevice | BKind::ActorMixer
    )
}

impl<'a> Renderer<'a> {
    /// Final config for a node under the current states and gamevars
    fn config(&mut self, bnode: &BNode<'a>, txtp: &mut Txtp<'a>) -> NodeConfig {
        let calculator = PropertyCalculator::new(self.scparams.as_ref(), self.gvparams.as_ref());
        let scpaths = if self.sc_registering { Some(&mut self.scpaths) } else { None };
        let config = calculator.compute(&self.builder, bnode, scpaths);
        txtp.info.statechunks(&config.states);
        txtp.info.gamevars(&config.gamevars);
        NodeConfig::from(&config)
    }

    pub(super) fn render_base(&mut self, bnode: &BNode<'a>, txtp: &mut Txtp<'a>) -> Result<()> {
        if is_silent_kind(&bnode.kind) {
            return Ok(());
        }
        txtp.info.next(bnode.node);
        self.render_kind(bnode, txtp)?;
        txtp.info.done();
        Ok(())
    }

    /// Follows a reference; `target_bank` is the bank the reference names,
    /// if any, otherwise the referencing object's bank is tried first
    fn render_next(&mut self, bank_id: u32, tid: u32, target_bank: Option<u32>, idtype: IdType, txtp: &mut Txtp<'a>) -> Result<()> {
        // common in switches that declare every value
        if tid == 0 {
            return Ok(());
        }
        let bank_id = target_bank.filter(|&b| b != 0).unwrap_or(bank_id);
        let Some(id) = self.builder.get_bnode(bank_id, tid, idtype, target_bank)? else {
            return Ok(());
        };
        let Some(bnode) = self.builder.bnode(id) else {
            return Ok(());
        };
        if !self.filter.allow_inner(bnode.node, self.names) {
            return Ok(());
        }

        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::hard(bnode.sid, bnode.class(), "reference chain too deep"));
        }
        let result = self.render_base(&bnode, txtp);
        self.depth -= 1;
        result
    }

    fn render_kind(&mut self, bnode: &BNode<'a>, txtp: &mut Txtp<'a>) -> Result<()> {
        let bank_id = bnode.bank_id();
        match &bnode.kind {
            BKind::Event { actions } => {
                let config = self.config(bnode, txtp);
                txtp.group_layer(actions.len(), &config);
                for &tid in actions {
                    self.render_next(bank_id, tid, None, IdType::Audio, txtp)?;
                }
                txtp.group_done(Some(actions.len()))
            }

            BKind::DialogueEvent { tree } => {
                let Some(tree) = tree else {
                    return Ok(());
                };
                let config = self.config(bnode, txtp);
                self.render_tree(bank_id, tree, &config, txtp)
            }

            BKind::Action { action, target, bank } => {
                let idtype = match action {
                    ActionKind::Trigger => return Ok(()),
                    ActionKind::Play => IdType::Audio,
                    ActionKind::PlayEvent => IdType::Event,
                };
                let config = self.config(bnode, txtp);
                txtp.group_single(&config);
                self.render_next(bank_id, *target, *bank, idtype, txtp)?;
                txtp.group_done(None)
            }

            BKind::Switch { gtype, group, values } => {
                if self.gsparams.is_none() {
                    for (&value, children) in values {
                        let unreachable = self.gspaths.add(*gtype, *group, value);
                        if !unreachable {
                            for &tid in children {
                                self.render_next(bank_id, tid, None, IdType::Audio, txtp)?;
                            }
                        }
                        self.gspaths.done();
                    }
                    return Ok(());
                }

                let Some(value) = self.current_gamesync(*gtype, *group) else {
                    return Ok(());
                };
                let Some(children) = values.get(&value) else {
                    return Ok(());
                };
                txtp.info.gamesyncs(&[Gamesync::new(*gtype, *group, value)]);

                let config = self.config(bnode, txtp);
                txtp.group_layer(children.len(), &config);
                for &tid in children {
                    self.render_next(bank_id, tid, None, IdType::Audio, txtp)?;
                }
                txtp.group_done(Some(children.len()))
            }

            BKind::RanSeq { mode, continuous, children, .. } => {
                let config = self.config(bnode, txtp);
                let count = children.len();
                match (mode, continuous) {
                    (0, true) => txtp.group_random_continuous(count, &config),
                    (0, false) => txtp.group_random_step(count, &config),
                    (1, true) => txtp.group_sequence_continuous(count, &config),
                    (1, false) => txtp.group_sequence_step(count, &config),
                    _ => return Err(Error::hard(bnode.sid, bnode.class(), format!("unknown ranseq mode {mode}"))),
                };
                for &tid in children {
                    self.render_next(bank_id, tid, None, IdType::Audio, txtp)?;
                }
                txtp.group_done(Some(count))
            }

            BKind::Layer { children } => {
                let config = self.config(bnode, txtp);
                txtp.group_layer(children.len(), &config);
                for &tid in children {
                    self.render_next(bank_id, tid, None, IdType::Audio, txtp)?;
                }
                txtp.group_done(Some(children.len()))
            }

            BKind::Sound { source } => {
                let config = self.config(bnode, txtp);
                if let Some(source) = source {
                    txtp.info.source(source.tid);
                }
                let sound = NodeSound {
                    unreachable: self.unreachable_path(),
                    ..NodeSound::new(source.clone())
                };
                txtp.source_sound(sound, &config);
                Ok(())
            }

            BKind::MusicSwitch {
                rules,
                stingers,
                tree,
                gtype,
                group,
                values,
            } => {
                self.transitions.add(rules, bank_id);
                self.stingers.add(stingers, bank_id);
                let config = self.config(bnode, txtp);

                if let Some(tree) = tree {
                    return self.render_tree(bank_id, tree, &config, txtp);
                }

                if self.gsparams.is_none() {
                    for (&value, &tid) in values {
                        let unreachable = self.gspaths.add(*gtype, *group, value);
                        if !unreachable {
                            self.render_next(bank_id, tid, None, IdType::Audio, txtp)?;
                        }
                        self.gspaths.done();
                    }
                    return Ok(());
                }

                let Some(value) = self.current_gamesync(*gtype, *group) else {
                    return Ok(());
                };
                let Some(&tid) = values.get(&value) else {
                    return Ok(());
                };
                txtp.info.gamesyncs(&[Gamesync::new(*gtype, *group, value)]);

                txtp.group_single(&config);
                self.render_next(bank_id, tid, None, IdType::Audio, txtp)?;
                txtp.group_done(None)
            }

            BKind::MusicRanSeq { rules, stingers, playlist } => {
                self.transitions.add(rules, bank_id);
                self.stingers.add(stingers, bank_id);
                let config = self.config(bnode, txtp);

                txtp.group_single(&config);
                self.render_playlist(bnode, playlist, txtp)?;
                txtp.group_done(None)
            }

            BKind::MusicSegment {
                stingers,
                duration,
                entry,
                exit,
                children,
            } => {
                self.stingers.add(stingers, bank_id);
                let mut config = self.config(bnode, txtp);
                config.segment = Some(SegmentTimes {
                    duration: *duration,
                    entry: *entry,
                    exit: *exit,
                });

                // empty segments play as silence
                if children.is_empty() {
                    txtp.group_layer(1, &config);
                    txtp.source_sound(NodeSound::silence_clip(), &NodeConfig::default());
                    return txtp.group_done(Some(1));
                }

                txtp.group_layer(children.len(), &config);
                for &tid in children {
                    self.render_next(bank_id, tid, None, IdType::Audio, txtp)?;
                }
                txtp.group_done(Some(children.len()))
            }

            BKind::MusicTrack(track) => self.render_track(bnode, track, txtp),

            BKind::ActorMixer | BKind::State | BKind::Bus | BKind::FxCustom(_) | BKind::AudioDevice | BKind::Other => Ok(()),
        }
    }

    /// Value set for a group in the current path
    fn current_gamesync(&mut self, gtype: GsType, group: u32) -> Option<u32> {
        self.gsparams.as_mut().and_then(|params| params.take(gtype, group))
    }

    fn unreachable_path(&self) -> bool {
        self.gsparams.as_ref().is_some_and(|params| params.is_unreachable())
    }

    /// Decision trees (dialogue events, newer music switches)
    fn render_tree(&mut self, bank_id: u32, tree: &DecisionTree, config: &NodeConfig, txtp: &mut Txtp<'a>) -> Result<()> {
        // rarely a tree plays a single object with any state
        if let Some(ntid) = tree.ntid {
            txtp.group_single(config);
            self.render_next(bank_id, ntid, None, IdType::Audio, txtp)?;
            return txtp.group_done(None);
        }

        if self.gsparams.is_none() {
            for (path, ntid) in &tree.paths {
                let unreachable = self.gspaths.adds(path);
                if !unreachable {
                    self.render_next(bank_id, *ntid, None, IdType::Audio, txtp)?;
                }
                self.gspaths.done();
            }
            return Ok(());
        }

        let Some((npath, ntid)) = self.gsparams.as_ref().and_then(|params| tree.get_npath(params)) else {
            return Ok(());
        };
        txtp.info.gamesyncs(&npath);

        txtp.group_single(config);
        self.render_next(bank_id, ntid, None, IdType::Audio, txtp)?;
        txtp.group_done(None)
    }

    fn render_playlist(&mut self, bnode: &BNode<'a>, items: &[PlaylistItem], txtp: &mut Txtp<'a>) -> Result<()> {
        let bank_id = bnode.bank_id();
        for item in items {
            let config = NodeConfig {
                looping: Some(item.looping),
                ..NodeConfig::default()
            };

            if item.rs_type == -1 || item.segment.is_some() {
                txtp.group_single_transition(&config);
                self.render_next(bank_id, item.segment.unwrap_or(0), None, IdType::Audio, txtp)?;
                txtp.group_done(None)?;
                continue;
            }

            let count = item.items.len();
            match item.rs_type {
                0 => txtp.group_sequence_continuous(count, &config),
                1 => txtp.group_sequence_step(count, &config),
                2 => txtp.group_random_continuous(count, &config),
                3 => txtp.group_random_step(count, &config),
                other => return Err(Error::hard(bnode.sid, bnode.class(), format!("unknown playlist type {other}"))),
            };
            self.render_playlist(bnode, &item.items, txtp)?;
            txtp.group_done(Some(count))?;
        }
        Ok(())
    }

    fn render_track(&mut self, bnode: &BNode<'a>, track: &TrackData, txtp: &mut Txtp<'a>) -> Result<()> {
        if track.subtracks.is_empty() {
            return Ok(());
        }
        let config = self.config(bnode, txtp);
        let count = track.subtracks.len();

        match track.track_type {
            // normal: one subtrack
            0 => {
                if count > 1 {
                    return Err(Error::hard(bnode.sid, bnode.class(), "more than one subtrack"));
                }
                txtp.group_single(&config);
                for subtrack in &track.subtracks {
                    self.render_clips(bnode, subtrack, txtp)?;
                }
                txtp.group_done(None)
            }
            // random/sequence: a different subtrack per play
            1 | 2 => {
                if track.track_type == 1 {
                    txtp.group_random_step(count, &config);
                } else {
                    txtp.group_sequence_step(count, &config);
                }
                for subtrack in &track.subtracks {
                    self.render_clips(bnode, subtrack, txtp)?;
                }
                txtp.group_done(Some(count))
            }
            // switch: subtrack picked by gamesync
            3 => {
                let Some(switch) = &track.switch else {
                    return Err(Error::hard(bnode.sid, bnode.class(), "switch track without switch params"));
                };
                if self.gsparams.is_none() {
                    for &value in switch.values.keys() {
                        self.gspaths.add(switch.gtype, switch.group, value);
                        self.gspaths.done();
                    }
                    return Ok(());
                }

                let Some(value) = self.current_gamesync(switch.gtype, switch.group) else {
                    return Ok(());
                };
                let Some(&index) = switch.values.get(&value) else {
                    return Ok(());
                };
                txtp.info.gamesyncs(&[Gamesync::new(switch.gtype, switch.group, value)]);

                let subtrack = index.and_then(|i| track.subtracks.get(i)).map_or(&[][..], Vec::as_slice);
                txtp.group_single(&config);
                self.render_clips(bnode, subtrack, txtp)?;
                txtp.group_done(None)
            }
            other => Err(Error::hard(bnode.sid, bnode.class(), format!("unknown track type {other}"))),
        }
    }

    fn render_clips(&mut self, bnode: &BNode<'a>, clips: &[Clip], txtp: &mut Txtp<'a>) -> Result<()> {
        let default = NodeConfig::default();

        // no clips (or a switch default without subtrack) plays as silence
        if clips.is_empty() {
            txtp.group_layer(1, &default);
            txtp.source_sound(NodeSound::silence_clip(), &default);
            return txtp.group_done(Some(1));
        }

        txtp.group_layer(clips.len(), &default);
        for clip in clips {
            // clips may start an event at the clip's position
            if clip.event != 0 {
                let config = NodeConfig {
                    idelay: clip.fpa,
                    ..NodeConfig::default()
                };
                txtp.group_single(&config);
                self.render_next(bnode.bank_id(), clip.event, None, IdType::Event, txtp)?;
                txtp.group_done(None)?;
                continue;
            }

            if let Some(source) = &clip.source {
                txtp.info.source(source.tid);
            }
            let sound = NodeSound {
                source: clip.source.clone(),
                clip: Some(ClipTimes {
                    fpa: clip.fpa,
                    fbt: clip.fbt,
                    fet: clip.fet,
                    fsd: clip.fsd,
                }),
                unreachable: self.unreachable_path(),
                ..NodeSound::default()
            };
            txtp.source_sound(sound, &default);
        }
        txtp.group_done(Some(clips.len()))
    }
}
