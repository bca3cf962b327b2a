//! Tree simplification: turns engine concepts into playlist commands
//!
//! Passes run in a fixed order, each one relying on the previous:
//! cleanup, self loops, prop moves, timings, layer order, loop trapping,
//! first-node extras and master volume.

use super::tree::{NodeType, ROOT, SegmentTimes, TNodeId, TxtpTree};
use crate::error::{Error, Result};

/// One sample at 48000hz (ms are divided by 1000 before comparing)
const THRESHOLD: f64 = 1.0 / 48000.0;
/// Minimum body left when a transition trims a clip to nothing (ms)
const MIN_BODY: f64 = 5.0 / 48000.0 * 1000.0;

#[derive(Debug, Clone, Default)]
pub struct SimplifyOptions {
    /// Keep the first node's delay
    pub write_delays: bool,
    /// Make step groups selectable
    pub random_all: bool,
    /// Make groups selectable when layers loop forever
    pub random_multi: bool,
    /// Make any group selectable
    pub random_force: bool,
    pub master_volume: f64,
}

/// Why the first group became selectable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectKind {
    Random,
    Multi,
    Force,
}

/// What the simplified tree contains
#[derive(Debug, Clone, Default)]
pub struct TreeFlags {
    pub sound_count: usize,
    pub has_multiloops: bool,
    pub has_externals: bool,
    pub has_self_loops: bool,
    pub selectable_count: usize,
    pub select: Option<SelectKind>,
    /// Master volume left for the commands line
    pub master_volume: f64,
}

struct Simplifier<'t> {
    tree: &'t mut TxtpTree,
    options: &'t SimplifyOptions,
    flags: TreeFlags,
    transition_count: usize,
    loop_groups: usize,
    loop_sounds: usize,
}

/// Simplifies the tree in place
pub fn simplify(tree: &mut TxtpTree, options: &SimplifyOptions) -> Result<TreeFlags> {
    let mut simplifier = Simplifier {
        tree,
        options,
        flags: TreeFlags {
            master_volume: options.master_volume,
            ..TreeFlags::default()
        },
        transition_count: 0,
        loop_groups: 0,
        loop_sounds: 0,
    };
    simplifier.clean_tree(ROOT);
    simplifier.set_self_loops(ROOT);
    simplifier.set_props(ROOT);
    simplifier.set_times(ROOT)?;
    simplifier.reorder_wem(ROOT);
    simplifier.find_loops();
    simplifier.set_extra();
    simplifier.set_volume();
    Ok(simplifier.flags)
}

fn nonzero(value: Option<f64>) -> bool {
    value.is_some_and(|v| v != 0.0)
}

impl Simplifier<'_> {
    fn clean_tree(&mut self, id: TNodeId) {
        for child in self.tree.children(id) {
            self.clean_tree(child);
        }

        let node = self.tree.node(id);
        let source = node.sound.as_ref().and_then(|s| s.source.as_ref());
        if source.is_some_and(|s| s.plugin_ignorable) {
            self.tree.kill(id);
            return;
        }
        if source.is_some_and(|s| s.plugin_external) {
            self.flags.has_externals = true;
        }

        if node.is_group() && node.parent.is_some() {
            let is_empty = node.children.is_empty();
            let is_nosound = node.segment.is_some_and(|s| s.duration == 0.0 || s.exit == 0.0);
            if is_empty || is_nosound {
                self.tree.kill(id);
            }
        }
    }

    fn set_self_loops(&mut self, id: TNodeId) {
        self.make_self_loop(id);
        for child in self.tree.children(id) {
            self.set_self_loops(child);
        }
    }

    /// A looping playlist item whose only segment is a transition that
    /// starts after its entry plays `0..entry` once, then loops the segment
    /// from its entry
    fn make_self_loop(&mut self, id: TNodeId) -> bool {
        let node = self.tree.node(id);
        if node.no_loop() {
            return false;
        }
        let &[sub] = node.children.as_slice() else {
            return false;
        };
        let subnode = self.tree.node(sub);
        if !subnode.transition {
            return false;
        }
        let &[subsub] = subnode.children.as_slice() else {
            return false;
        };
        let Some(segment) = self.tree.node(subsub).segment else {
            return false;
        };
        if segment.duration == 0.0 || segment.entry == 0.0 || segment.entry <= THRESHOLD {
            return false;
        }

        let looping = node.looping;
        self.tree.node_mut(id).ntype = NodeType::SequenceContinuous;
        let copy = self.tree.copy_subtree(id, sub);
        let subnode = self.tree.node_mut(sub);
        subnode.self_loop = true;
        subnode.looping = None;
        self.tree.node_mut(copy).looping = looping;
        self.tree.node_mut(id).looping = None;
        true
    }

    fn set_props(&mut self, id: TNodeId) {
        // twice so values travel through chains of singles
        self.set_props_move(id);
        self.set_props_move(id);
        self.set_props_config(id);
    }

    fn set_props_move(&mut self, id: TNodeId) {
        let node = self.tree.node(id);
        if node.is_group() && node.children.len() == 1 {
            self.move_group_props(id);
        }
        for child in self.tree.children(id) {
            self.set_props_move(child);
        }
    }

    /// Pushes a single group's config down to its child, so the group
    /// becomes ignorable
    fn move_group_props(&mut self, id: TNodeId) {
        self.tree.node_mut(id).ntype = NodeType::Single;
        let sub = self.tree.node(id).children[0];
        let mut node = self.tree.node(id).clone();
        let mut subnode = self.tree.node(sub).clone();

        if subnode.is_group() {
            let is_bothloop = node.looping == Some(0) && subnode.looping == Some(0);
            if subnode.no_loop() || is_bothloop {
                subnode.looping = node.looping;
                node.looping = None;
            }
        }

        let can_move_delays = node.no_loop() && !subnode.is_clip();
        if subnode.delay == 0.0 && can_move_delays {
            subnode.delay = node.delay;
            node.delay = 0.0;
        }
        if subnode.idelay == 0.0 && can_move_delays {
            subnode.idelay = node.idelay;
            node.idelay = 0.0;
        }

        if !nonzero(subnode.volume) {
            subnode.volume = node.volume;
            node.volume = None;
        } else if nonzero(node.volume) && subnode.ntype == NodeType::Single {
            subnode.volume = Some(subnode.volume.unwrap_or(0.0) + node.volume.unwrap_or(0.0));
            node.volume = None;
        }

        if !subnode.crossfaded {
            subnode.crossfaded = node.crossfaded;
            node.crossfaded = false;
        }
        if !subnode.silenced {
            subnode.silenced = node.silenced;
            node.silenced = false;
        }

        *self.tree.node_mut(id) = node;
        *self.tree.node_mut(sub) = subnode;
    }

    fn set_props_config(&mut self, id: TNodeId) {
        for child in self.tree.children(id) {
            self.set_props_config(child);
        }

        let node = self.tree.node_mut(id);
        if node.is_group() {
            node.pad_begin += node.idelay + node.delay;
        }
        if node.looping == Some(0) {
            if node.is_group() {
                self.loop_groups += 1;
            } else if node.is_sound() && !node.is_clip() {
                // clips can't loop forever by themselves
                self.loop_sounds += 1;
            }
        }
    }

    fn set_times(&mut self, id: TNodeId) -> Result<()> {
        let node = self.tree.node(id);
        if let Some(sound) = &node.sound {
            if !sound.silent {
                self.flags.sound_count += 1;
            }
            if sound.is_clip() {
                self.apply_clip(id)?;
            } else {
                let node = self.tree.node_mut(id);
                node.pad_begin += node.idelay + node.delay;
            }
        }

        for child in self.tree.children(id) {
            self.set_times(child)?;
        }

        let node = self.tree.node(id);
        if node.segment.is_some_and(|s| s.duration != 0.0) {
            self.set_duration(id, id);
        }
        if self.tree.node(id).transition {
            self.set_transition(id, id, None)?;
        }
        Ok(())
    }

    fn set_duration(&mut self, id: TNodeId, snode: TNodeId) {
        let node = self.tree.node(id);
        if id != snode && node.segment.is_some_and(|s| s.duration != 0.0) {
            tracing::info!("found segment duration inside another segment");
            return;
        }
        if node.is_clip() {
            if let Some(segment) = self.tree.node(snode).segment {
                self.apply_duration(id, segment);
            }
        }
        for child in self.tree.children(id) {
            self.set_duration(child, snode);
        }
    }

    fn set_transition(&mut self, id: TNodeId, tnode: TNodeId, mut snode: Option<TNodeId>) -> Result<()> {
        let node = self.tree.node(id);
        if id != tnode && node.transition {
            return Ok(());
        }
        let is_segment = node.segment.is_some();
        if is_segment && snode.is_some() {
            tracing::info!("found segment inside another transition segment");
            return Ok(());
        }
        if is_segment {
            snode = Some(id);
            self.transition_count += 1;
        }
        if node.is_clip() {
            if let Some(segment) = snode.and_then(|s| self.tree.node(s).segment) {
                self.apply_transition(id, tnode, segment)?;
            }
        }
        for child in self.tree.children(id) {
            self.set_transition(child, tnode, snode)?;
        }
        Ok(())
    }

    /// Layers sorted by media id, so equivalent trees print the same
    fn reorder_wem(&mut self, id: TNodeId) {
        for child in self.tree.children(id) {
            self.reorder_wem(child);
        }
        if self.tree.node(id).ntype != NodeType::Layer {
            return;
        }

        let mut ids = Vec::new();
        for child in self.tree.children(id) {
            let Some(tid) = self.tree.single_source_id(child) else {
                return;
            };
            ids.push((tid, child));
        }
        ids.sort_by_key(|(tid, _)| *tid);
        self.tree.node_mut(id).children = ids.into_iter().map(|(_, child)| child).collect();
    }

    fn find_loops(&mut self) {
        if self.loop_groups == 0 && self.loop_sounds == 0 {
            return;
        }
        self.find_loops_internal(ROOT);
    }

    fn find_loops_internal(&mut self, id: TNodeId) {
        for child in self.tree.children(id) {
            self.find_loops_internal(child);
        }

        let children = self.tree.children(id);
        if self.tree.node(id).ntype == NodeType::Layer && !self.flags.has_multiloops {
            if children.iter().any(|&c| self.tree.has_iloops(c)) {
                self.flags.has_multiloops = true;
            }
        }

        let node = self.tree.node_mut(id);
        if node.looping == Some(0) {
            match node.ntype {
                NodeType::RandomStep => node.ntype = NodeType::RandomContinuous,
                NodeType::SequenceStep => node.ntype = NodeType::SequenceContinuous,
                _ => {}
            }
        }

        if self.tree.node(id).ntype == NodeType::RandomContinuous {
            // every child looping forever: shuffled songs, pick one
            let iloops = children.iter().filter(|&&c| self.tree.has_iloops(c)).count();
            if iloops == children.len() {
                let node = self.tree.node_mut(id);
                node.ntype = NodeType::RandomStep;
                node.looping = None;
            }
        }

        if self.tree.node(id).ntype.is_continuous() {
            self.trap_loops(id, &children);
        }
    }

    /// An infinite loop inside a continuous group never lets it finish, so
    /// the group's own loop goes away
    fn trap_loops(&mut self, id: TNodeId, children: &[TNodeId]) {
        let mut loop_ends = 0;
        for (i, &sub) in children.iter().enumerate() {
            let Some(mut child) = self.tree.first_child(sub) else {
                continue;
            };

            let node = self.tree.node(child);
            if node.looping == Some(0) && node.ntype == NodeType::Single && node.ignorable(true, false) {
                let subchild = node.children.first().and_then(|&c| self.tree.first_child(c));
                if let Some(subchild) = subchild.filter(|&s| self.tree.node(s).looping.is_none()) {
                    let looping = self.tree.node(child).looping;
                    let target = self.tree.node_mut(subchild);
                    target.looping = looping;
                    if target.is_sound() {
                        target.loop_anchor = true;
                    }
                    self.tree.node_mut(child).looping = None;
                    child = subchild;
                }
            }

            if self.tree.node(child).looping == Some(0) {
                // the last item only gets an end mark after others got one
                if i + 1 < children.len() || loop_ends > 0 {
                    loop_ends += 1;
                    self.tree.node_mut(child).loop_end = true;
                }
                let node = self.tree.node_mut(id);
                node.looping = None;
                node.loop_killed = true;
            }
        }
    }

    fn set_extra(&mut self) {
        let Some(base) = self.tree.first_child(ROOT) else {
            return;
        };

        let node = self.tree.node_mut(base);
        if !self.options.write_delays && !node.is_clip() {
            node.pad_begin = 0.0;
            node.idelay = 0.0;
            node.delay = 0.0;
        }

        let node = self.tree.node(base);
        let count = node.children.len();
        if !node.is_group() || count <= 1 {
            return;
        }
        let steps = node.ntype.is_steps();
        let select = if self.options.random_all && steps {
            Some(SelectKind::Random)
        } else if self.options.random_multi && self.flags.has_multiloops {
            Some(SelectKind::Multi)
        } else if self.options.random_force && !steps {
            Some(SelectKind::Force)
        } else {
            None
        };
        if select.is_some() {
            self.flags.selectable_count = count;
            self.flags.select = select;
            self.tree.node_mut(base).force_selectable = true;
        }
    }

    fn set_volume(&mut self) {
        let master = self.flags.master_volume;
        if master < 0.0 {
            self.set_volume_negative(ROOT, master);
            self.flags.master_volume = 0.0;
        } else if master > 0.0 {
            self.set_volume_positive();
        }
    }

    fn set_volume_negative(&mut self, id: TNodeId, master: f64) {
        let node = self.tree.node_mut(id);
        if node.is_sound() {
            node.volume = Some(node.volume.unwrap_or(0.0) + master);
            node.clamp_volume();
        }
        for child in self.tree.children(id) {
            self.set_volume_negative(child, master);
        }
    }

    /// Raises the first node with a volume, or all first-level sounds;
    /// otherwise the volume is left for the commands line
    fn set_volume_positive(&mut self) {
        let master = self.flags.master_volume;
        let Some(base) = self.tree.first_child(ROOT) else {
            return;
        };
        if nonzero(self.tree.node(base).volume) {
            let node = self.tree.node_mut(base);
            node.volume = Some(node.volume.unwrap_or(0.0) + master);
            node.clamp_volume();
            self.flags.master_volume = 0.0;
            return;
        }

        let mut sounds = Vec::new();
        for child in self.tree.children(base) {
            let Some(sub) = self.tree.first_child(child) else {
                continue;
            };
            if !self.tree.node(sub).is_sound() {
                return;
            }
            sounds.push(sub);
        }
        if sounds.is_empty() {
            return;
        }
        for sound in sounds {
            let node = self.tree.node_mut(sound);
            node.volume = Some(node.volume.unwrap_or(0.0) + master);
            node.clamp_volume();
        }
        self.flags.master_volume = 0.0;
    }

    /// Converts clip offsets into padding, trims and body
    fn apply_clip(&mut self, id: TNodeId) -> Result<()> {
        let node = self.tree.node(id);
        if node.delay != 0.0 || node.idelay != 0.0 {
            return Err(Error::InvalidTimings(format!("delay in clip ({}, {})", node.delay, node.idelay)));
        }
        let Some(mut clip) = node.sound.as_ref().and_then(|s| s.clip) else {
            return Ok(());
        };

        if clip.fbt < 0.0 && clip.fbt > -THRESHOLD {
            clip.fbt = 0.0;
            if clip.fet > 0.0 && clip.fet < THRESHOLD {
                clip.fet = 0.0;
            }
        }

        let mut body_time = clip.fsd;
        let mut pad_begin = clip.fpa;
        let mut trim_begin = 0.0;
        let mut trim_end = 0.0;

        if clip.fbt >= 0.0 {
            trim_begin += clip.fbt;
            pad_begin += clip.fbt;
        } else {
            // negative begin repeats the end part of the clip
            let repeat = clip.fbt.abs();
            let trim = if clip.fsd == 0.0 { 0.0 } else { clip.fbt.rem_euclid(clip.fsd).abs() };
            body_time += repeat + trim;
            trim_begin += trim;
            pad_begin -= repeat;
        }

        if clip.fet <= 0.0 {
            trim_end += clip.fet.abs();
        } else {
            body_time += clip.fet;
        }

        if pad_begin < 0.0 && pad_begin > -THRESHOLD {
            pad_begin = 0.0;
        }
        if trim_begin < 0.0 && trim_begin > -THRESHOLD {
            trim_begin = 0.0;
        }
        if body_time < 0.0 || pad_begin < 0.0 || trim_begin < 0.0 || trim_end < 0.0 {
            return Err(Error::InvalidTimings(format!(
                "negative clip values: b={body_time}, p={pad_begin}, r={trim_begin}, R={trim_end}"
            )));
        }
        if body_time - trim_begin - trim_end < 0.0 {
            return Err(Error::InvalidTimings("clip trims longer than body".to_string()));
        }

        if trim_end != 0.0 && trim_end <= body_time {
            body_time -= trim_end;
            trim_end = 0.0;
        }

        let node = self.tree.node_mut(id);
        node.pad_begin = pad_begin;
        node.trim_begin = trim_begin;
        node.body_time = body_time;
        node.trim_end = trim_end;
        node.pad_end = 0.0;
        Ok(())
    }

    /// Pads clips up to the segment duration
    fn apply_duration(&mut self, id: TNodeId, segment: SegmentTimes) {
        if segment.duration == 0.0 {
            return;
        }
        if segment.exit != 0.0 && segment.duration < segment.exit {
            tracing::info!("segment duration {} smaller than exit {}", segment.duration, segment.exit);
        }

        let node = self.tree.node_mut(id);
        let body_full = node.pad_begin + node.body_time - node.trim_begin - node.trim_end;
        if segment.duration > body_full {
            node.pad_end = segment.duration - body_full;
        }
        if node.body_time == 0.0 && node.pad_end != 0.0 {
            node.body_time = node.pad_end;
            node.pad_end = 0.0;
        }
    }

    /// Cuts a transition segment's clips to its entry..exit window
    ///
    /// The first segment plays from the start; later ones start at their
    /// entry. All of them stop at their exit.
    fn apply_transition(&mut self, id: TNodeId, tnode: TNodeId, segment: SegmentTimes) -> Result<()> {
        let play_before = self.transition_count == 1;
        let self_loop = self.tree.node(tnode).self_loop;

        let mut entry = segment.entry;
        let mut exit = segment.exit;
        if play_before && self_loop {
            entry = 0.0;
            exit = segment.entry;
            self.flags.has_self_loops = true;
        }

        let node = self.tree.node_mut(id);
        let body = node.pad_begin + node.body_time - node.trim_begin - node.trim_end + node.pad_end;

        if !play_before {
            let mut time = entry;
            let remove = time.min(node.pad_begin);
            node.pad_begin -= remove;
            time -= remove;
            node.trim_begin += time;
        }

        if body < exit {
            node.pad_end += exit - body;
            return Ok(());
        }

        let mut time = body - exit;
        let removed = time.min(node.pad_end);
        node.pad_end -= removed;
        time -= removed;

        let removed = time.min(node.body_time);
        node.body_time -= removed;
        if node.body_time == 0.0 {
            node.body_time = MIN_BODY;
        }
        time -= removed;

        let removed = time.min(node.pad_begin);
        node.pad_begin -= removed;
        time -= removed;

        if time.abs() > 1e-9 {
            return Err(Error::InvalidTimings(format!("non-trimmed transition {time}")));
        }
        Ok(())
    }
}
