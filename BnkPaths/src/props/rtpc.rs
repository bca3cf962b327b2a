//! RTPC curves: graph evaluation and parameter bindings
//!
//! Curve math reproduces the engine's fast approximations constant for
//! constant, so results match what the game would compute.

use crate::model::NodeRef;

/// First bank version using the newer scaling table
const NEW_SCALING_VERSION: u32 = 72;

/// Interpolation kind between two graph points
pub mod curve {
    pub const LOG3: u32 = 0;
    pub const SINE: u32 = 1;
    pub const LOG1: u32 = 2;
    pub const INV_S_CURVE: u32 = 3;
    pub const LINEAR: u32 = 4;
    pub const S_CURVE: u32 = 5;
    pub const EXP1: u32 = 6;
    pub const SINE_RECIP: u32 = 7;
    pub const EXP3: u32 = 8;
    pub const CONSTANT: u32 = 9;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphPoint {
    pub x: f64,
    pub y: f64,
    pub interp: u32,
}

/// Piecewise curve plus its output scaling
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub points: Vec<GraphPoint>,
    pub scaling: u32,
    pub version: u32,
}

impl Graph {
    pub fn new(points: Vec<GraphPoint>, scaling: u32, version: u32) -> Self {
        Self { points, scaling, version }
    }

    fn parse(node: NodeRef<'_>, scaling: u32) -> Self {
        let points = node
            .finds("AkRTPCGraphPoint")
            .into_iter()
            .map(|p| GraphPoint {
                x: p.float_of("From").unwrap_or(0.0),
                y: p.float_of("To").unwrap_or(0.0),
                interp: p.uint_of("Interp").unwrap_or(curve::LINEAR),
            })
            .collect();
        Self::new(points, scaling, node.bank().version())
    }

    /// Evaluates the curve at `x`, then applies the unit scaling
    ///
    /// Unknown interpolation or scaling modes fall back to linear and identity.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.scale(self.find(x))
    }

    fn find(&self, v: f64) -> f64 {
        let ps = &self.points;
        match ps.len() {
            0 => return 0.0,
            1 => return ps[0].y,
            _ => {}
        }

        for (i, p1) in ps.iter().enumerate() {
            if p1.x >= v {
                return p1.y;
            }
            let Some(p2) = ps.get(i + 1) else {
                return p1.y;
            };
            if p2.x > v {
                return match p1.interp {
                    curve::LINEAR => interpolate_linear(p1.x, p1.y, p2.x, p2.y, v),
                    curve::CONSTANT => p1.y,
                    kind => interpolate_curve((v - p1.x) / (p2.x - p1.x), p1.y, p2.y, kind),
                };
            }
        }
        ps[ps.len() - 1].y
    }

    fn scale(&self, v: f64) -> f64 {
        if self.version < NEW_SCALING_VERSION {
            match self.scaling {
                0 => v,
                2 | 4 => linear_muting_to_db_muting96(v),
                3 => linear_to_frequency_20_20000(v),
                other => {
                    tracing::debug!("unknown graph scaling {other}");
                    v
                }
            }
        } else {
            match self.scaling {
                0 => v,
                2 => scaling_from_lin_db(v),
                3 => 10f64.powf(v / 20.0),
                4 => 10f64.powf(v * 0.050000001),
                other => {
                    tracing::debug!("unknown graph scaling {other}");
                    v
                }
            }
        }
    }
}

fn interpolate_linear(lower_x: f64, lower_y: f64, upper_x: f64, upper_y: f64, v: f64) -> f64 {
    (upper_y - lower_y) * ((v - lower_x) / (upper_x - lower_x)) + lower_y
}

/// Fade curve between two values at `t` in 0..1
pub fn interpolate_curve(t: f64, initial: f64, target: f64, kind: u32) -> f64 {
    match kind {
        curve::LOG3 => (1.0 - t) * (1.0 - t) * (1.0 - t) * (initial - target) + target,
        curve::SINE => {
            let v1 = (1.5707964 * t) * (1.5707964 * t);
            let v2 = (v1 * -0.00018363654 + 0.0083063254) * v1 + -0.16664828;
            let v3 = v2 * v1 + 0.9999966;
            v3 * (1.5707964 * t) * (target - initial) + initial
        }
        curve::LOG1 => (t - 3.0) * t * 0.5 * (initial - target) + initial,
        curve::INV_S_CURVE => {
            if t > 0.5 {
                let v1 = 3.1415927 - (3.1415927 * t);
                let v2 = (v1 * v1 * -0.00009181827 + 0.0041531627) * (v1 * v1) + -0.083324142;
                let v3 = 1.0 - (v2 * (v1 * v1) + 0.4999983) * v1;
                v3 * (target - initial) + initial
            } else {
                let v1 = (3.1415927 * t) * (3.1415927 * t);
                let v2 = (v1 * -0.00009181827 + 0.0041531627) * v1 + -0.083324142;
                let v3 = (v2 * v1 + 0.4999983) * (3.1415927 * t);
                v3 * (target - initial) + initial
            }
        }
        curve::S_CURVE => {
            let v1 = (3.1415927 * t) * (3.1415927 * t);
            let v2 = (v1 * 0.00048483399 + -0.01961384) * v1 + 0.24767479;
            let v3 = v2 * v1 + 0.00069670216;
            v3 * (target - initial) + initial
        }
        curve::EXP1 => (t + 1.0) * t * 0.5 * (target - initial) + initial,
        curve::SINE_RECIP => {
            let v1 = (1.5707964 * t) * (1.5707964 * t);
            let v2 = (v1 * -0.0012712094 + 0.04148775) * v1 + -0.49991244;
            let v3 = v2 * v1 + 0.99999332;
            v3 * (initial - target) + target
        }
        curve::EXP3 => t * t * t * (target - initial) + initial,
        curve::LINEAR => (target - initial) * t + initial,
        other => {
            tracing::debug!("unknown interpolation {other}");
            (target - initial) * t + initial
        }
    }
}

fn linear_muting_to_db_muting96(v: f64) -> f64 {
    const MAX: f64 = 96.300003;
    if v == 0.0 {
        return v;
    }
    if v >= MAX {
        return MAX;
    }
    if v <= -MAX {
        return -MAX;
    }
    if v > 0.0 {
        -(((96.3 - v) / 96.3).log10() * 20.0)
    } else {
        ((v + 96.3) / 96.3).log10() * 20.0
    }
}

fn linear_to_frequency_20_20000(v: f64) -> f64 {
    if v >= 20000.0 {
        return 20000.0;
    }
    if v <= 20.0 {
        return 20.0;
    }
    10f64.powf((v - 20.0) / 6660.0 + 1.301029995663981)
}

fn scaling_from_lin_db(v: f64) -> f64 {
    let v = v.clamp(-1.0, 1.0);
    if v == -1.0 { -96.3 } else { (v + 1.0).log10() * 20.0 }
}

/// How a curve result combines with the running value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accum {
    Exclusive,
    Additive,
    Multiply,
    Boolean,
}

impl Accum {
    pub fn apply(self, y: f64, current: f64) -> f64 {
        match self {
            Accum::Exclusive => y,
            Accum::Additive => y + current,
            Accum::Multiply => y * current,
            Accum::Boolean => y.max(current),
        }
    }
}

/// Which property a binding drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtpcParam {
    Volume,
    BusVolume,
    OutputBusVolume,
    MakeUpGain,
    Pitch,
    PlaybackSpeed,
    InitialDelay,
    Other,
}

impl RtpcParam {
    fn parse(node: Option<NodeRef<'_>>) -> Self {
        let Some(node) = node else {
            return RtpcParam::Other;
        };
        let fmt = node.valuefmt();
        if fmt.contains("[Volume]") || node.int() == 0 {
            RtpcParam::Volume
        } else if fmt.contains("[BusVolume]") {
            RtpcParam::BusVolume
        } else if fmt.contains("[OutputBusVolume]") {
            RtpcParam::OutputBusVolume
        } else if fmt.contains("[MakeUpGain]") {
            RtpcParam::MakeUpGain
        } else if fmt.contains("[Pitch]") {
            RtpcParam::Pitch
        } else if fmt.contains("[PlaybackSpeed]") {
            RtpcParam::PlaybackSpeed
        } else if fmt.contains("[InitialDelay]") {
            RtpcParam::InitialDelay
        } else {
            RtpcParam::Other
        }
    }

    /// Default accumulation of banks without an explicit mode
    fn default_accum(self) -> Accum {
        match self {
            RtpcParam::PlaybackSpeed => Accum::Multiply,
            RtpcParam::InitialDelay => Accum::Exclusive,
            _ => Accum::Additive,
        }
    }

    pub fn is_gain(self) -> bool {
        matches!(self, RtpcParam::Volume | RtpcParam::MakeUpGain)
    }

    pub fn is_bus_gain(self) -> bool {
        matches!(self, RtpcParam::BusVolume | RtpcParam::OutputBusVolume)
    }
}

/// One curve bound to a game parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Rtpc {
    pub id: u32,
    pub is_gamevar: bool,
    pub param: RtpcParam,
    pub accum: Accum,
    pub graph: Graph,
}

impl Rtpc {
    pub fn parse(node: NodeRef<'_>) -> Option<Self> {
        let id = node.uint_of("RTPCID")?;
        let is_gamevar = node.find1("rtpcType").is_none_or(|n| n.int() == 0);
        let param = RtpcParam::parse(node.find1("ParamID"));
        let scaling = node.uint_of("eScaling").unwrap_or(0);

        let accum = match node.find1("rtpcAccum") {
            None => param.default_accum(),
            Some(n) => {
                let fmt = n.valuefmt();
                if fmt.contains("[Exclusive]") {
                    Accum::Exclusive
                } else if fmt.contains("[Multiply]") {
                    Accum::Multiply
                } else if fmt.contains("[Boolean]") || fmt.contains("[Maximum]") {
                    Accum::Boolean
                } else {
                    Accum::Additive
                }
            }
        };

        Some(Self {
            id,
            is_gamevar,
            param,
            accum,
            graph: Graph::parse(node, scaling),
        })
    }

    /// Whether this binding can change the output of a path
    pub fn is_usable(&self, apply_bus: bool) -> bool {
        if apply_bus && self.param.is_bus_gain() {
            return true;
        }
        self.param.is_gain() || self.param == RtpcParam::InitialDelay
    }

    /// Curve output at `x`, in the property's unit (delays in ms)
    pub fn get(&self, x: f64) -> f64 {
        let y = self.graph.evaluate(x);
        if self.param == RtpcParam::InitialDelay { y * 1000.0 } else { y }
    }

    /// Input range (first and last point)
    pub fn minmax(&self) -> (f64, f64) {
        match (self.graph.points.first(), self.graph.points.last()) {
            (Some(first), Some(last)) => (first.x, last.x),
            _ => (0.0, 0.0),
        }
    }
}

/// All curve bindings of an object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RtpcList {
    pub rtpcs: Vec<Rtpc>,
}

impl RtpcList {
    pub fn parse(node: NodeRef<'_>) -> Self {
        Self {
            rtpcs: node.finds("RTPC").into_iter().filter_map(Rtpc::parse).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rtpcs.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Rtpc> {
        self.rtpcs.iter().find(|r| r.id == id)
    }

    pub fn usable(&self, apply_bus: bool) -> impl Iterator<Item = &Rtpc> {
        self.rtpcs.iter().filter(move |r| r.is_usable(apply_bus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64, interp: u32) -> GraphPoint {
        GraphPoint { x, y, interp }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn test_linear_and_clamp() {
        let graph = Graph::new(vec![point(0.0, -96.0, curve::LINEAR), point(100.0, 0.0, curve::LINEAR)], 0, 134);
        assert_close(graph.evaluate(50.0), -48.0);
        assert_eq!(graph.evaluate(-10.0), graph.evaluate(0.0));
        assert_eq!(graph.evaluate(150.0), graph.evaluate(100.0));
        assert_eq!(graph.evaluate(100.0), 0.0);
    }

    #[test]
    fn test_constant_and_empty() {
        let graph = Graph::new(vec![point(0.0, 5.0, curve::CONSTANT), point(10.0, 1.0, curve::LINEAR)], 0, 134);
        assert_eq!(graph.evaluate(9.9), 5.0);
        assert_eq!(Graph::default().evaluate(3.0), 0.0);
        let single = Graph::new(vec![point(4.0, 2.0, curve::LINEAR)], 0, 134);
        assert_eq!(single.evaluate(100.0), 2.0);
    }

    #[test]
    fn test_curves() {
        // values computed with the engine's approximations
        assert_close(interpolate_curve(0.5, 0.0, 1.0, curve::LOG3), 0.875);
        assert_close(interpolate_curve(0.5, 0.0, 1.0, curve::LOG1), 0.625);
        assert_close(interpolate_curve(0.5, 0.0, 1.0, curve::EXP1), 0.375);
        assert_close(interpolate_curve(0.5, 0.0, 1.0, curve::EXP3), 0.125);
        assert_close(interpolate_curve(0.5, 0.0, 1.0, curve::SINE), 0.7071073856);
        assert_close(interpolate_curve(1.0, 0.0, 1.0, curve::S_CURVE), 1.0006967328);
        assert_close(interpolate_curve(0.0, 0.0, 1.0, curve::INV_S_CURVE), 0.0);
    }

    #[test]
    fn test_scaling_by_version() {
        let old = Graph::new(vec![point(0.0, 48.15, curve::LINEAR)], 2, 65);
        assert_close(old.evaluate(0.0), -(0.5f64.log10() * 20.0));

        let new = Graph::new(vec![point(0.0, -1.0, curve::LINEAR)], 2, 134);
        assert_eq!(new.evaluate(0.0), -96.3);

        let freq = Graph::new(vec![point(0.0, 5.0, curve::LINEAR)], 3, 65);
        assert_eq!(freq.evaluate(0.0), 20.0);
    }

    #[test]
    fn test_accum() {
        assert_eq!(Accum::Exclusive.apply(3.0, 10.0), 3.0);
        assert_eq!(Accum::Additive.apply(3.0, 10.0), 13.0);
        assert_eq!(Accum::Multiply.apply(3.0, 10.0), 30.0);
        assert_eq!(Accum::Boolean.apply(3.0, 10.0), 10.0);
    }
}
