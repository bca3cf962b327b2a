//! Effective property calculation
//!
//! Properties reach an object in three ways:
//! - relative (volume, makeup gain): added up from an audible object and
//!   all of its ancestors, whether or not the event passes through them
//! - absolute (output bus): the first one set walking up wins
//! - behavior (loop, delay): only the object being played, never inherited
//!
//! Audible objects also pass through their bus chain, which adds its own
//! volumes. Active states and gamevars modify any object visited.

use std::collections::HashSet;

use super::{Props, Rtpc, RtpcParam, SILENCE_DB};
use crate::builder::{BNode, BNodeId, Builder};
use crate::registry::{GamevarItem, GamevarValue, GamevarsParams, StateChunkParams, StateChunkPaths, StateItem};
use crate::utils::hash_text;

const MAX_GAIN: f64 = 200.0;
const MAX_DELAY: f64 = 3_200_000.0;
const MAX_LOOP: i64 = 32767;

/// Final values for one object under the active states and gamevars
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveConfig {
    /// dB
    pub gain: f64,
    /// ms
    pub delay: f64,
    /// ms
    pub idelay: f64,
    /// `Some(0)` loops forever
    pub looping: Option<i64>,
    /// Some state or RTPC may change the gain
    pub crossfaded: bool,
    pub silenced: bool,
    /// Silent even with no state or gamevar applied
    pub silenced_default: bool,
    /// States that changed some property
    pub states: Vec<StateItem>,
    /// Gamevars that moved some curve
    pub gamevars: Vec<GamevarItem>,
}

impl EffectiveConfig {
    pub fn loops_forever(&self) -> bool {
        self.looping == Some(0)
    }
}

#[derive(Default)]
struct Totals {
    gain: f64,
    base_gain: f64,
    delay: Option<f64>,
    idelay: Option<f64>,
    crossfaded: bool,
    states: Vec<StateItem>,
    gamevars: Vec<GamevarItem>,
}

/// Computes [`EffectiveConfig`]s for one replay
///
/// With no state params set, usable state overrides found on the way are
/// registered instead of applied.
pub struct PropertyCalculator<'p> {
    scparams: Option<&'p StateChunkParams>,
    gvparams: Option<&'p GamevarsParams>,
}

impl<'p> PropertyCalculator<'p> {
    pub fn new(scparams: Option<&'p StateChunkParams>, gvparams: Option<&'p GamevarsParams>) -> Self {
        Self { scparams, gvparams }
    }

    pub fn compute<'a>(&self, builder: &Builder<'a>, bnode: &BNode<'a>, mut scpaths: Option<&mut StateChunkPaths>) -> EffectiveConfig {
        let mut totals = Totals::default();
        let looping = bnode.props.as_ref().and_then(|p| p.looping);
        if let Some(props) = &bnode.props {
            totals.delay = props.delay;
            totals.idelay = props.idelay;
        }

        if bnode.is_audible() {
            let mut visited: HashSet<BNodeId> = HashSet::new();
            self.apply_node(bnode, false, true, &mut totals, scpaths.as_deref_mut());

            let mut parent = bnode.parent;
            while let Some(id) = parent {
                if !visited.insert(id) {
                    tracing::debug!("parent loop at {}", bnode.sid);
                    break;
                }
                let Some(pnode) = builder.bnode(id) else {
                    break;
                };
                self.apply_node(&pnode, false, false, &mut totals, scpaths.as_deref_mut());
                parent = pnode.parent;
            }

            self.apply_bus(builder, bnode, &mut totals, scpaths.as_deref_mut());
        } else {
            self.apply_behavior(bnode, &mut totals, scpaths);
        }

        let gain = totals.gain.clamp(-MAX_GAIN, MAX_GAIN);
        let base_gain = totals.base_gain.clamp(-MAX_GAIN, MAX_GAIN);
        EffectiveConfig {
            gain,
            delay: totals.delay.unwrap_or(0.0).clamp(0.0, MAX_DELAY),
            idelay: totals.idelay.unwrap_or(0.0).clamp(0.0, MAX_DELAY),
            looping: looping.map(|l| l.clamp(0, MAX_LOOP)),
            crossfaded: totals.crossfaded,
            silenced: gain <= SILENCE_DB,
            silenced_default: base_gain <= SILENCE_DB,
            states: totals.states,
            gamevars: totals.gamevars,
        }
    }

    /// Adds the bus chain: the first bus set walking up, or a usable aux
    /// when that bus is muted
    fn apply_bus<'a>(&self, builder: &Builder<'a>, bnode: &BNode<'a>, totals: &mut Totals, mut scpaths: Option<&mut StateChunkPaths>) {
        let mut holder_bus = bnode.bus.map(|bus| (bus, bnode.props.clone(), bnode.auxs.clone()));
        let mut parent = bnode.parent;
        let mut visited: HashSet<BNodeId> = HashSet::new();
        while holder_bus.is_none() {
            let Some(id) = parent.filter(|id| visited.insert(*id)) else {
                break;
            };
            let Some(pnode) = builder.bnode(id) else {
                break;
            };
            holder_bus = pnode.bus.map(|bus| (bus, pnode.props.clone(), pnode.auxs.clone()));
            parent = pnode.parent;
        }
        let Some((bus_id, holder_props, holder_auxs)) = holder_bus else {
            return;
        };
        let Some(bus) = builder.bnode(bus_id) else {
            return;
        };

        let usable = |props: Option<&Props>| props.is_none_or(|p| p.bus_gain() > SILENCE_DB);
        let bus = if usable(bus.props.as_ref()) {
            Some(bus)
        } else {
            holder_auxs
                .iter()
                .chain(bus.auxs.iter())
                .filter_map(|&aux| builder.bnode(aux))
                .find(|aux| usable(aux.props.as_ref()))
        };
        let Some(bus) = bus else {
            tracing::debug!("no usable bus for {}", bnode.sid);
            return;
        };

        if let Some(output) = holder_props.and_then(|p| p.outputbusvolume) {
            totals.gain += output;
            totals.base_gain += output;
        }

        self.apply_node(&bus, true, false, totals, scpaths.as_deref_mut());
        let mut visited: HashSet<BNodeId> = HashSet::new();
        let mut parent = bus.parent;
        while let Some(id) = parent {
            if !visited.insert(id) {
                break;
            }
            let Some(pbus) = builder.bnode(id) else {
                break;
            };
            self.apply_node(&pbus, true, false, totals, scpaths.as_deref_mut());
            parent = pbus.parent;
        }
    }

    fn apply_node(&self, bnode: &BNode<'_>, is_bus: bool, is_root: bool, totals: &mut Totals, scpaths: Option<&mut StateChunkPaths>) {
        let own = |p: &Props| if is_bus { p.gain() + p.bus_gain() } else { p.gain() };

        let base = bnode.props.as_ref().map_or(0.0, own);
        let mut gain = base;

        if let Some(chunk) = bnode.statechunk.as_ref().filter(|c| !c.is_empty()) {
            totals.crossfaded = true;
            match (self.scparams, scpaths) {
                (Some(scparams), _) => {
                    for entry in &chunk.entries {
                        let Some(item) = scparams.get(entry.group, entry.value) else {
                            continue;
                        };
                        gain += own(&entry.props);
                        if !totals.states.contains(item) {
                            totals.states.push(*item);
                        }
                        if is_root {
                            if let Some(delay) = entry.props.delay {
                                totals.delay = Some(delay);
                            }
                        }
                    }
                }
                (None, Some(scpaths)) => {
                    for entry in chunk.usable(is_bus) {
                        scpaths.add(entry.group, entry.value, hash_text(&entry.props.signature()));
                    }
                }
                (None, None) => {}
            }
        }

        if !bnode.rtpcs.is_empty() {
            totals.crossfaded = true;
            if let Some(gvparams) = self.gvparams {
                for rtpc in bnode.rtpcs.usable(is_bus) {
                    let Some((item, y)) = gamevar_output(rtpc, gvparams) else {
                        continue;
                    };
                    if !totals.gamevars.iter().any(|g| g.key == item.key) {
                        totals.gamevars.push(item.clone());
                    }
                    if rtpc.param == RtpcParam::InitialDelay {
                        if is_root {
                            totals.idelay = Some(rtpc.accum.apply(y, totals.idelay.unwrap_or(0.0)));
                        }
                    } else {
                        gain = rtpc.accum.apply(y, gain);
                    }
                }
            }
        }

        totals.gain += gain;
        totals.base_gain += base;
    }

    /// Delays a played container gets from its own states and RTPCs
    fn apply_behavior(&self, bnode: &BNode<'_>, totals: &mut Totals, scpaths: Option<&mut StateChunkPaths>) {
        if let Some(chunk) = &bnode.statechunk {
            let delays: Vec<_> = chunk.entries.iter().filter(|e| e.props.delay.is_some()).collect();
            if !delays.is_empty() {
                totals.crossfaded = true;
            }
            match (self.scparams, scpaths) {
                (Some(scparams), _) => {
                    for entry in delays {
                        let Some(item) = scparams.get(entry.group, entry.value) else {
                            continue;
                        };
                        totals.delay = entry.props.delay;
                        if !totals.states.contains(item) {
                            totals.states.push(*item);
                        }
                    }
                }
                (None, Some(scpaths)) => {
                    for entry in delays {
                        scpaths.add(entry.group, entry.value, hash_text(&entry.props.signature()));
                    }
                }
                (None, None) => {}
            }
        }

        let idelays: Vec<&Rtpc> = bnode.rtpcs.usable(false).filter(|r| r.param == RtpcParam::InitialDelay).collect();
        if idelays.is_empty() {
            return;
        }
        totals.crossfaded = true;
        let Some(gvparams) = self.gvparams else {
            return;
        };
        for rtpc in idelays {
            let Some((item, y)) = gamevar_output(rtpc, gvparams) else {
                continue;
            };
            if !totals.gamevars.iter().any(|g| g.key == item.key) {
                totals.gamevars.push(item.clone());
            }
            totals.idelay = Some(rtpc.accum.apply(y, totals.idelay.unwrap_or(0.0)));
        }
    }
}

/// Curve output for the gamevar bound to an RTPC, if any is set
fn gamevar_output<'g>(rtpc: &Rtpc, gvparams: &'g GamevarsParams) -> Option<(&'g GamevarItem, f64)> {
    let item = gvparams.get(rtpc.id)?;
    let (min, max) = rtpc.minmax();
    let x = match item.value {
        GamevarValue::Unset => return None,
        GamevarValue::Min => min,
        GamevarValue::Max => max,
        GamevarValue::Value(x) => x,
    };
    Some((item, rtpc.get(x)))
}
