//! Interactive music data: transition rules, stingers, playlists, markers
//! and track clips

use std::collections::HashMap;

use indexmap::IndexMap;

use super::source::Source;
use crate::error::{Error, Result};
use crate::model::NodeRef;
use crate::registry::GsType;

const MARKER_ENTRY: [u32; 2] = [43573010, 0];
const MARKER_EXIT: [u32; 2] = [1539036744, 1];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fade {
    pub time: i64,
    pub offset: i64,
    pub curve: u32,
}

impl Fade {
    fn parse(node: Option<NodeRef<'_>>) -> Self {
        let Some(node) = node else {
            return Self::default();
        };
        Self {
            time: node.int_of("transitionTime").unwrap_or(0),
            offset: node.int_of("iFadeOffset").unwrap_or(0),
            curve: node.uint_of("eFadeCurve").unwrap_or(0),
        }
    }
}

/// Segment played between source and destination of a transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionObject {
    pub segment: u32,
    pub fade_in: Fade,
    pub fade_out: Fade,
    pub play_pre_entry: bool,
    pub play_post_exit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRule {
    pub src_ids: Vec<i64>,
    pub dst_ids: Vec<i64>,
    pub src_fade: Fade,
    pub sync_type: u32,
    pub play_post_exit: bool,
    pub dst_fade: Fade,
    pub entry_type: u32,
    pub play_pre_entry: bool,
    pub transition: Option<TransitionObject>,
}

/// All rules of a music switch or playlist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionRules {
    pub rules: Vec<TransitionRule>,
}

impl TransitionRules {
    pub fn parse(node: NodeRef<'_>) -> Self {
        let rules = node
            .finds("AkMusicTransitionRule")
            .into_iter()
            .map(|nrule| {
                let src = nrule.find1("AkMusicTransSrcRule");
                let dst = nrule.find1("AkMusicTransDstRule");
                let flag = |n: Option<NodeRef<'_>>, name: &str| n.and_then(|n| n.int_of(name)).unwrap_or(0) != 0;
                let transition = nrule.find1("AkMusicTransitionObject").map(|ntrn| TransitionObject {
                    segment: ntrn.uint_of("segmentID").unwrap_or(0),
                    fade_in: Fade::parse(ntrn.find1("fadeInParams")),
                    fade_out: Fade::parse(ntrn.find1("fadeOutParams")),
                    play_pre_entry: flag(Some(ntrn), "bPlayPreEntry"),
                    play_post_exit: flag(Some(ntrn), "bPlayPostExit"),
                });
                TransitionRule {
                    src_ids: nrule.finds("srcID").iter().map(NodeRef::int).collect(),
                    dst_ids: nrule.finds("dstID").iter().map(NodeRef::int).collect(),
                    src_fade: Fade::parse(src),
                    sync_type: src.and_then(|n| n.uint_of("eSyncType")).unwrap_or(0),
                    play_post_exit: flag(src, "bPlayPostExit"),
                    dst_fade: Fade::parse(dst),
                    entry_type: dst.and_then(|n| n.uint_of("eEntryType")).unwrap_or(0),
                    play_pre_entry: flag(dst, "bPlayPreEntry"),
                    transition,
                }
            })
            .collect();
        Self { rules }
    }

    /// Transition segments worth rendering (segment 0 plays nothing)
    pub fn transition_segments(&self) -> Vec<u32> {
        self.rules
            .iter()
            .filter_map(|r| r.transition.map(|t| t.segment))
            .filter(|&segment| segment != 0)
            .collect()
    }
}

/// Segment substitution fired by a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stinger {
    pub trigger: u32,
    pub segment: u32,
}

pub fn parse_stingers(node: NodeRef<'_>) -> Vec<Stinger> {
    node.finds("CAkStinger")
        .into_iter()
        .map(|n| Stinger {
            trigger: n.uint_of("TriggerID").unwrap_or(0),
            segment: n.uint_of("SegmentID").unwrap_or(0),
        })
        .filter(|s| s.segment != 0)
        .collect()
}

/// Entry and exit marker positions (ms)
pub fn parse_markers(node: NodeRef<'_>, sid: u32) -> Result<(f64, f64)> {
    let markers: Vec<(u32, f64)> = node
        .find1("pArrayMarkers")
        .map(|base| {
            base.finds("AkMusicMarkerWwise")
                .into_iter()
                .map(|m| (m.uint_of("id").unwrap_or(u32::MAX), m.float_of("fPosition").unwrap_or(0.0)))
                .collect()
        })
        .unwrap_or_default();

    let find = |ids: &[u32]| markers.iter().find(|(id, _)| ids.contains(id)).map(|(_, pos)| *pos);
    let entry = find(&MARKER_ENTRY).ok_or_else(|| Error::hard(sid, node.name(), "can't find entry marker"))?;
    let exit = find(&MARKER_EXIT).ok_or_else(|| Error::hard(sid, node.name(), "can't find exit marker"))?;
    Ok((entry, exit))
}

/// Node of a music playlist
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistItem {
    /// -1 = segment, 0 = sequence continuous, 1 = sequence step,
    /// 2 = random continuous, 3 = random step
    pub rs_type: i64,
    pub looping: i64,
    /// Segment to play, for leaf items
    pub segment: Option<u32>,
    pub items: Vec<PlaylistItem>,
}

pub fn parse_playlist(nplaylist: Option<NodeRef<'_>>, sid: u32, kind: &str) -> Result<Vec<PlaylistItem>> {
    let Some(nplaylist) = nplaylist else {
        return Ok(Vec::new());
    };

    let mut items = Vec::new();
    for nitem in nplaylist.children() {
        let rs_type = match nitem.find1("eRSType") {
            Some(ntype) => ntype.int(),
            // older versions have no type, only leafs without children
            None if nitem.int_of("NumChildren") == Some(0) => -1,
            None => return Err(Error::hard(sid, kind, "unknown playlist type")),
        };
        let sub = nitem.find1("pPlayList");
        let segment = if rs_type == -1 || sub.is_none_or(|s| !s.has_children()) {
            nitem.uint_of("SegmentID")
        } else {
            None
        };

        items.push(PlaylistItem {
            rs_type,
            looping: nitem.int_of("Loop").unwrap_or(1),
            segment,
            items: parse_playlist(sub, sid, kind)?,
        });
    }
    Ok(items)
}

/// One placement of a source (or event) on a music track
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub source: Option<Source>,
    /// Event played instead of a source (newer versions)
    pub event: u32,
    /// Play-at offset (ms)
    pub fpa: f64,
    /// Begin trim offset (ms)
    pub fbt: f64,
    /// End trim offset (ms)
    pub fet: f64,
    /// Source duration (ms)
    pub fsd: f64,
}

/// Switch selecting a track's sub-track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSwitch {
    pub gtype: GsType,
    pub group: u32,
    pub default: u32,
    /// Switch value to sub-track index, `None` plays nothing
    pub values: IndexMap<u32, Option<usize>>,
}

/// Sub-tracks of a music track (index = sub-track)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackData {
    pub track_type: i64,
    pub subtracks: Vec<Vec<Clip>>,
    pub switch: Option<TrackSwitch>,
}

pub fn parse_track(node: NodeRef<'_>, sid: u32) -> Result<TrackData> {
    let kind = node.name();
    let track_type = node.find1_any(&["eTrackType", "eRSType"]).map_or(0, |n| n.int());

    let mut sources = HashMap::new();
    if let Some(nsources) = node.find1("pSource") {
        for nsrc in nsources.finds("AkBankSourceData") {
            let source_id = nsrc.uint_of("sourceID").unwrap_or(0);
            sources.insert(source_id, Source::parse(nsrc, sid, kind)?);
        }
    }

    let mut data = TrackData { track_type, ..TrackData::default() };
    let Some(count) = node.uint_of("numSubTrack") else {
        return Ok(data);
    };
    data.subtracks = vec![Vec::new(); count as usize];

    for nclip in node.finds("AkTrackSrcInfo") {
        let track = nclip.uint_of("trackID").unwrap_or(0) as usize;
        let source_id = nclip.uint_of("sourceID").unwrap_or(0);
        let source = if source_id != 0 {
            let source = sources
                .get(&source_id)
                .ok_or_else(|| Error::hard(sid, kind, format!("clip source {source_id} not found")))?;
            Some(source.clone())
        } else {
            None
        };
        let clip = Clip {
            source,
            event: nclip.uint_of("eventID").unwrap_or(0),
            fpa: nclip.float_of("fPlayAt").unwrap_or(0.0),
            fbt: nclip.float_of("fBeginTrimOffset").unwrap_or(0.0),
            fet: nclip.float_of("fEndTrimOffset").unwrap_or(0.0),
            fsd: nclip.float_of("fSrcDuration").unwrap_or(0.0),
        };
        let subtrack = data
            .subtracks
            .get_mut(track)
            .ok_or_else(|| Error::hard(sid, kind, format!("clip for missing subtrack {track}")))?;
        subtrack.push(clip);
    }

    if track_type == 3 {
        let nswitch = node
            .find1("SwitchParams")
            .ok_or_else(|| Error::hard(sid, kind, "switch track without switch params"))?;
        let mut values = IndexMap::new();
        for nvalue in nswitch.finds("ulSwitchAssoc") {
            let index = nvalue.parent().and_then(|p| p.index());
            values.insert(nvalue.uint(), index);
        }
        let default = nswitch.uint_of("uDefaultSwitch").unwrap_or(0);
        values.entry(default).or_insert(None);

        data.switch = Some(TrackSwitch {
            gtype: nswitch.uint_of("eGroupType").map_or(GsType::Switch, GsType::from_value),
            group: nswitch.uint_of("uGroupID").unwrap_or(0),
            default,
            values,
        });
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BankBuilder;

    #[test]
    fn test_markers() {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.object("CAkMusicSegment").list("pArrayMarkers");
        b.object("AkMusicMarkerWwise").field("tid", "id", "43573010").field("d64", "fPosition", "0").close();
        b.object("AkMusicMarkerWwise").field("tid", "id", "1539036744").field("d64", "fPosition", "12000.5").close();
        b.close().close();
        let bank = b.build();
        let node = bank.root().find1("CAkMusicSegment").unwrap();
        assert_eq!(parse_markers(node, 1).unwrap(), (0.0, 12000.5));

        let mut b = BankBuilder::new("test.bnk", 134);
        b.object("CAkMusicSegment").field("u32", "x", "0").close();
        let bank = b.build();
        assert!(parse_markers(bank.root().find1("CAkMusicSegment").unwrap(), 1).is_err());
    }

    #[test]
    fn test_playlist() {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.object("CAkMusicRanSeqCntr").list("pPlayList");
        b.object("AkMusicRanSeqPlaylistItem")
            .field("tid", "SegmentID", "0")
            .field("s32", "eRSType", "3")
            .field("s16", "Loop", "0")
            .list("pPlayList");
        b.object("AkMusicRanSeqPlaylistItem")
            .field("tid", "SegmentID", "500")
            .field("s32", "eRSType", "-1")
            .field("s16", "Loop", "1")
            .close();
        b.close().close().close().close();
        let bank = b.build();
        let node = bank.root().find1("CAkMusicRanSeqCntr").unwrap();

        let items = parse_playlist(node.find1("pPlayList"), 1, "CAkMusicRanSeqCntr").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].rs_type, 3);
        assert_eq!(items[0].looping, 0);
        assert_eq!(items[0].segment, None);
        assert_eq!(items[0].items[0].segment, Some(500));
    }

    #[test]
    fn test_stingers() {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.object("CAkMusicSwitchCntr").list("pStingers");
        b.object("CAkStinger").field("tid", "TriggerID", "1").field("tid", "SegmentID", "10").close();
        b.object("CAkStinger").field("tid", "TriggerID", "2").field("tid", "SegmentID", "0").close();
        b.close().close();
        let bank = b.build();
        let stingers = parse_stingers(bank.root().find1("CAkMusicSwitchCntr").unwrap());
        assert_eq!(stingers, vec![Stinger { trigger: 1, segment: 10 }]);
    }
}
