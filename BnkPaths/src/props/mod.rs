//! Object properties: bundles, state overrides, RTPC curves and the
//! calculator that composes them into an effective config

pub mod calculator;
pub mod rtpc;
pub mod statechunk;

pub use calculator::{EffectiveConfig, PropertyCalculator};
pub use rtpc::{Accum, Graph, GraphPoint, Rtpc, RtpcList, RtpcParam};
pub use statechunk::{StateChunk, StateEntry};

use crate::model::NodeRef;

/// Bundle names, newest first
const BUNDLES: [&str; 3] = [
    "AkPropBundle<AkPropValue,unsigned char>",
    "AkPropBundle<float,unsigned short>",
    "AkPropBundle<float>",
];

const RANGED_BUNDLE: &str = "AkPropBundle<RANGED_MODIFIERS<AkPropValue>>";

/// Properties that change the output but aren't applied
const WARN_PROPS: [&str; 7] = [
    "[LoopStart]",
    "[LoopEnd]",
    "[FadeInTime]",
    "[FadeOutTime]",
    "[LoopCrossfadeDuration]",
    "[CrossfadeUpCurve]",
    "[CrossfadeDownCurve]",
];

/// Level at or below which audio is considered silent (dB)
pub const SILENCE_DB: f64 = -96.0;

/// Scalar properties of one object (or one state override)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    /// Loop count, 0 = infinite
    pub looping: Option<i64>,
    pub volume: Option<f64>,
    pub makeupgain: Option<f64>,
    pub pitch: Option<f64>,
    pub busvolume: Option<f64>,
    pub outputbusvolume: Option<f64>,
    pub playbackspeed: Option<f64>,
    /// Delay (ms)
    pub delay: Option<f64>,
    /// Initial delay (ms)
    pub idelay: Option<f64>,
    /// Ranged modifiers as (property, min, max)
    pub ranges: Vec<(String, f64, f64)>,
    /// Properties found but not applied
    pub unknowns: Vec<String>,
}

impl Props {
    /// Reads the property bundles under `node`, or `None` if it has none
    pub fn parse(node: NodeRef<'_>) -> Option<Self> {
        let bundle = node.find1_any(&BUNDLES);
        let ranged = node.find1(RANGED_BUNDLE);
        if bundle.is_none() && ranged.is_none() {
            return None;
        }

        let mut props = Props::default();
        if let Some(bundle) = bundle {
            for prop in bundle.finds("AkPropBundle") {
                let (Some(key), Some(value)) = (prop.find1("pID"), prop.find1("pValue")) else {
                    continue;
                };
                props.set(key.valuefmt(), value.float());
            }
        }

        if let Some(ranged) = ranged {
            for prop in ranged.finds("AkPropBundle") {
                let Some(key) = prop.find1("pID") else {
                    continue;
                };
                let min = prop.float_of("min").unwrap_or(0.0);
                let max = prop.float_of("max").unwrap_or(0.0);
                props.ranges.push((key.valuefmt().to_string(), min, max));
            }
        }
        Some(props)
    }

    fn set(&mut self, valuefmt: &str, value: f64) {
        if WARN_PROPS.iter().any(|p| valuefmt.contains(p)) {
            self.unknowns.push(valuefmt.to_string());
            return;
        }

        // order matters: "[BusVolume]" must not match as "[Volume]"
        if valuefmt.contains("[Loop]") {
            self.looping = Some(value as i64);
        } else if valuefmt.contains("[OutputBusVolume]") {
            self.outputbusvolume = Some(value);
        } else if valuefmt.contains("[BusVolume]") {
            self.busvolume = Some(value);
        } else if valuefmt.contains("[Volume]") {
            self.volume = Some(value);
        } else if valuefmt.contains("[MakeUpGain]") {
            self.makeupgain = Some(value);
        } else if valuefmt.contains("[Pitch]") {
            self.pitch = Some(value);
        } else if valuefmt.contains("[PlaybackSpeed]") {
            self.playbackspeed = Some(value);
        } else if valuefmt.contains("[DelayTime]") {
            self.delay = Some(value);
        } else if valuefmt.contains("[InitialDelay]") {
            self.idelay = Some(value * 1000.0);
        }
    }

    /// Pass-through gain: volume plus makeup gain
    pub fn gain(&self) -> f64 {
        self.volume.unwrap_or(0.0) + self.makeupgain.unwrap_or(0.0)
    }

    /// Bus mixing gain: bus volume plus output bus volume
    pub fn bus_gain(&self) -> f64 {
        self.busvolume.unwrap_or(0.0) + self.outputbusvolume.unwrap_or(0.0)
    }

    /// Whether applying these props may change a path's output
    pub fn is_usable(&self, apply_bus: bool) -> bool {
        let set = |v: Option<f64>| v.is_some_and(|v| v != 0.0);
        if apply_bus && (set(self.busvolume) || set(self.outputbusvolume)) {
            return true;
        }
        set(self.volume) || set(self.makeupgain) || set(self.delay)
    }

    /// Stable text of the applied values, for content hashing
    pub fn signature(&self) -> String {
        format!(
            "{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}",
            self.looping, self.volume, self.makeupgain, self.busvolume, self.outputbusvolume, self.delay, self.idelay
        )
    }
}
