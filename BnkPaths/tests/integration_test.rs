use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use bnkpaths::builder::{Builder, IdType};
use bnkpaths::generator::{Generator, GeneratorConfig, Report};
use bnkpaths::model::{BankSet, load_dump, load_dumps};
use bnkpaths::props::{Graph, GraphPoint, PropertyCalculator};
use bnkpaths::registry::{GamesyncPaths, GsType, StateChunkParams, StateChunkPaths, StateItem};
use bnkpaths::utils::hash_name;

const STREAM_PLUGIN: &str = "262145";

// ---------------------------------------------------------------------------
// Dump writing helpers
// ---------------------------------------------------------------------------

fn field(ty: &str, name: &str, value: impl ToString) -> String {
    format!(r#"<field type="{ty}" name="{name}" value="{}"/>"#, value.to_string())
}

fn named(ty: &str, name: &str, text: &str) -> String {
    format!(r#"<field type="{ty}" name="{name}" value="{}" hashname="{text}"/>"#, hash_name(text))
}

fn prop(fmt: &str, value: &str) -> String {
    format!(
        r#"<object name="AkPropBundle"><field type="u8" name="pID" value="0" valuefmt="{fmt}"/>{}</object>"#,
        field("f32", "pValue", value)
    )
}

fn props(items: &[(&str, &str)]) -> String {
    let inner: String = items.iter().map(|(fmt, value)| prop(fmt, value)).collect();
    format!(r#"<object name="AkPropBundle&lt;AkPropValue,unsigned char&gt;">{inner}</object>"#)
}

fn base(parent: u32) -> String {
    format!(
        r#"<object name="NodeBaseParams">{}{}</object>"#,
        field("tid", "DirectParentID", parent),
        field("tid", "OverrideBusId", 0)
    )
}

fn list(name: &str, children: &[String]) -> String {
    format!(r#"<list name="{name}">{}</list>"#, children.concat())
}

fn object(name: &str, children: &[String]) -> String {
    format!(r#"<object name="{name}">{}</object>"#, children.concat())
}

fn bank(filename: &str, id: u32, items: &[(&str, Vec<String>)]) -> String {
    let items: String = items
        .iter()
        .enumerate()
        .map(|(index, (class, children))| format!(r#"<object name="{class}" index="{index}">{}</object>"#, children.concat()))
        .collect();
    format!(
        r#"<root filename="{filename}" path="{filename}" version="134"><object name="BankHeader">{}</object><list name="listLoadedItem">{items}</list></root>"#,
        field("u32", "dwSoundBankID", id)
    )
}

fn write_dump(dir: &Path, name: &str, banks: &[String]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("<base>{}</base>", banks.concat())).unwrap();
    path
}

fn event(name: &str, action: u32) -> (&'static str, Vec<String>) {
    ("CAkEvent", vec![named("sid", "ulID", name), field("tid", "ulActionID", action)])
}

fn play(id: u32, target: u32, bank_id: u32) -> (&'static str, Vec<String>) {
    (
        "CAkActionPlay",
        vec![
            field("sid", "ulID", id),
            field("tid", "idExt", target),
            object("PlayActionParams", &[field("tid", "bankID", bank_id)]),
        ],
    )
}

fn stream_source(media: u32) -> String {
    object(
        "AkBankSourceData",
        &[
            field("u32", "ulPluginID", STREAM_PLUGIN),
            field("u8", "StreamType", 2),
            object("AkMediaInformation", &[field("tid", "sourceID", media)]),
        ],
    )
}

fn sound(id: u32, parent: u32, media: u32, extra: &[String]) -> (&'static str, Vec<String>) {
    let mut children = vec![field("sid", "ulID", id), stream_source(media), base(parent)];
    children.extend_from_slice(extra);
    ("CAkSound", children)
}

fn switch(id: u32, group: &str, values: &[(&str, u32)]) -> (&'static str, Vec<String>) {
    let packages: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(index, (value, node))| {
            let switch_id = if value.is_empty() {
                field("tid", "ulSwitchID", 0)
            } else {
                named("tid", "ulSwitchID", value)
            };
            format!(
                r#"<object name="CAkSwitchPackage" index="{index}">{switch_id}{}</object>"#,
                list("NodeList", &[field("tid", "NodeID", node)])
            )
        })
        .collect();
    (
        "CAkSwitchCntr",
        vec![
            field("sid", "ulID", id),
            base(0),
            field("u8", "eGroupType", 0),
            named("tid", "ulGroupID", group),
            list("SwitchList", &packages),
        ],
    )
}

fn files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.ends_with(".txtp"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap()
}

fn generate(dump: &Path, outdir: &Path, config: GeneratorConfig) -> Report {
    let config = GeneratorConfig {
        outdir: outdir.to_path_buf(),
        ..config
    };
    Generator::new(config).run(&[dump]).unwrap()
}

struct Setup {
    _tmp: TempDir,
    dump: PathBuf,
    outdir: PathBuf,
}

fn setup(banks: &[String]) -> Setup {
    let tmp = tempfile::tempdir().unwrap();
    let dump = write_dump(tmp.path(), "banks.xml", banks);
    let outdir = tmp.path().join("txtp");
    Setup { _tmp: tmp, dump, outdir }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn test_load_dump_banks() {
    let setup = setup(&[
        bank("init.bnk", 1, &[]),
        bank("music.bnk", 2, &[event("play_music", 10), play(10, 0, 2)]),
    ]);
    let banks = load_dump(&setup.dump).unwrap();
    assert_eq!(banks.len(), 2);
    assert_eq!(banks[0].filename(), "init.bnk");
    assert_eq!(banks[1].id(), 2);
    assert_eq!(banks[1].version(), 134);
    assert_eq!(banks[1].hirc_items().len(), 2);
}

#[test]
fn test_load_dumps_reports_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let good = write_dump(tmp.path(), "good.xml", &[bank("a.bnk", 1, &[])]);
    let bad = tmp.path().join("bad.xml");
    std::fs::write(&bad, "<base><root filename=\"b.bnk\" version=\"134\"><object name=\"x\">").unwrap();

    let loaded = load_dumps(&[good, bad.clone()], |_, _, _| {});
    assert_eq!(loaded.banks.len(), 1);
    assert_eq!(loaded.failed.len(), 1);
    assert_eq!(loaded.failed[0].0, bad);
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// event > play > sound(-2 dB) under a mixer(-1 dB)
#[test]
fn test_simple_event() {
    let setup = setup(&[bank(
        "sfx.bnk",
        1,
        &[
            ("CAkActorMixer", vec![field("sid", "ulID", 200), base(0), props(&[("0x00 [Volume]", "-1")])]),
            sound(100, 200, 1001, &[props(&[("0x00 [Volume]", "-2")])]),
            play(20, 100, 1),
            event("play_sfx", 20),
        ],
    )]);
    let report = generate(&setup.dump, &setup.outdir, GeneratorConfig::default());

    assert_eq!(files(&setup.outdir), vec!["play_sfx.txtp"]);
    assert_eq!(report.outputs.created, 1);
    assert_eq!(report.outputs.streams, 1);
    assert!(report.failures.is_empty());

    let text = read(&setup.outdir, "play_sfx.txtp");
    let line = text.lines().next().unwrap();
    assert!(line.contains("1001.wem"), "{line}");
    assert!(line.contains("#v -3.0dB"), "{line}");
    assert!(text.contains("# AUTOGENERATED WITH BNKPATHS"));
    assert!(text.contains("# - sfx.bnk"));
}

/// one output per switch value, the "any" value gets no name
#[test]
fn test_switch_paths() {
    let setup = setup(&[bank(
        "music.bnk",
        1,
        &[
            sound(101, 0, 1001, &[]),
            sound(102, 0, 1002, &[]),
            sound(103, 0, 1003, &[]),
            switch(300, "music", &[("bgm1", 101), ("bgm2", 102), ("", 103)]),
            play(20, 300, 1),
            event("play_music", 20),
        ],
    )]);
    let report = generate(&setup.dump, &setup.outdir, GeneratorConfig::default());

    assert_eq!(
        files(&setup.outdir),
        vec!["play_music [music=bgm1].txtp", "play_music [music=bgm2].txtp", "play_music.txtp"]
    );
    assert_eq!(report.outputs.created, 3);

    assert!(read(&setup.outdir, "play_music [music=bgm1].txtp").starts_with("1001.wem"));
    assert!(read(&setup.outdir, "play_music [music=bgm2].txtp").starts_with("1002.wem"));
    let any = read(&setup.outdir, "play_music.txtp");
    assert!(any.starts_with("1003.wem"));
    assert!(any.contains("[music=-]"), "{any}");
}

fn statechunk_bank() -> String {
    let chunk = object(
        "StateChunk",
        &[object(
            "AkStateGroupChunk",
            &[
                named("tid", "ulStateGroupID", "mood"),
                object(
                    "AkState",
                    &[named("tid", "ulStateID", "calm"), field("tid", "ulStateInstanceID", 50)],
                ),
            ],
        )],
    );
    bank(
        "sfx.bnk",
        1,
        &[
            ("CAkState", vec![field("sid", "ulID", 50), props(&[("0x00 [Volume]", "-96")])]),
            sound(100, 0, 1001, &[chunk]),
            play(20, 100, 1),
            event("play_ambience", 20),
        ],
    )
}

/// a state that mutes its sound yields a silenced output plus the base one
#[test]
fn test_statechunk_silences() {
    let setup = setup(&[statechunk_bank()]);

    // property level
    let banks = BankSet::new(load_dump(&setup.dump).unwrap());
    let mut builder = Builder::new(&banks);
    let id = builder.get_bnode(1, 100, IdType::Audio, None).unwrap().unwrap();
    let bnode = builder.bnode(id).unwrap();

    let mut scpaths = StateChunkPaths::new();
    let config = PropertyCalculator::new(None, None).compute(&builder, &bnode, Some(&mut scpaths));
    assert!(config.crossfaded);
    assert_eq!(scpaths.combos().len(), 1);

    let mut scparams = StateChunkParams::new();
    scparams.add(StateItem::new(hash_name("mood"), hash_name("calm"), 0));
    let config = PropertyCalculator::new(Some(&scparams), None).compute(&builder, &bnode, None);
    assert!(config.gain <= -96.0);
    assert!(config.silenced);

    let empty = StateChunkParams::new();
    let config = PropertyCalculator::new(Some(&empty), None).compute(&builder, &bnode, None);
    assert_eq!(config.gain, 0.0);
    assert!(!config.silenced_default);

    // pipeline level
    let report = generate(&setup.dump, &setup.outdir, GeneratorConfig::default());
    let names = files(&setup.outdir);
    assert_eq!(names.len(), 2, "{names:?}");
    assert_eq!(report.outputs.created, 2);

    let silenced: Vec<&String> = names
        .iter()
        .filter(|name| read(&setup.outdir, name).starts_with("?1001.wem"))
        .collect();
    assert_eq!(silenced.len(), 1);
    assert!(silenced[0].contains("{mood=calm}"), "{silenced:?}");
}

fn segment(id: u32, track: u32) -> (&'static str, Vec<String>) {
    let markers = list(
        "pArrayMarkers",
        &[
            object("AkMusicMarkerWwise", &[field("tid", "id", 43573010), field("d64", "fPosition", "0")]),
            object("AkMusicMarkerWwise", &[field("tid", "id", 1539036744), field("d64", "fPosition", "1000")]),
        ],
    );
    (
        "CAkMusicSegment",
        vec![
            field("sid", "ulID", id),
            base(0),
            list("Children", &[field("tid", "ulChildID", track)]),
            field("d64", "fDuration", "1000"),
            markers,
        ],
    )
}

fn track(id: u32, media: u32) -> (&'static str, Vec<String>) {
    let clip = object(
        "AkTrackSrcInfo",
        &[
            field("u32", "trackID", 0),
            field("tid", "sourceID", media),
            field("tid", "eventID", 0),
            field("d64", "fPlayAt", "0"),
            field("d64", "fBeginTrimOffset", "0"),
            field("d64", "fEndTrimOffset", "0"),
            field("d64", "fSrcDuration", "1000"),
        ],
    );
    (
        "CAkMusicTrack",
        vec![
            field("sid", "ulID", id),
            list("pSource", &[stream_source(media)]),
            list("pPlaylist", &[clip]),
            field("u32", "numSubTrack", 1),
            base(0),
            field("u8", "eTrackType", 0),
        ],
    )
}

/// stingers found while traversing a music switch get their own outputs
#[test]
fn test_music_stingers() {
    let stinger = |trigger: &str, segment: u32| {
        object("CAkStinger", &[named("tid", "TriggerID", trigger), field("tid", "SegmentID", segment)])
    };
    let assoc = object(
        "AkMusicSwitchAssoc",
        &[named("tid", "switchID", "stage1"), field("tid", "nodeID", 500)],
    );
    let music_switch = (
        "CAkMusicSwitchCntr",
        vec![
            field("sid", "ulID", 400),
            base(0),
            list("pStingers", &[stinger("hit", 510), stinger("win", 520)]),
            field("u8", "eGroupType", 0),
            named("tid", "ulGroupID", "stage"),
            list("pAssocs", &[assoc]),
        ],
    );
    let setup = setup(&[bank(
        "music.bnk",
        1,
        &[
            track(600, 2001),
            track(610, 2002),
            track(620, 2003),
            segment(500, 600),
            segment(510, 610),
            segment(520, 620),
            music_switch,
            play(20, 400, 1),
            event("play_stage", 20),
        ],
    )]);
    let report = generate(&setup.dump, &setup.outdir, GeneratorConfig::default());

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.runs[0].render.stingers, 2);

    let names = files(&setup.outdir);
    assert_eq!(names.len(), 3, "{names:?}");
    assert!(names.contains(&"play_stage [stage=stage1].txtp".to_string()), "{names:?}");

    let stingers: Vec<&String> = names.iter().filter(|n| n.contains("~{stinger-")).collect();
    assert_eq!(stingers.len(), 2);
    assert!(stingers.iter().any(|n| n.contains("=hit")));
    assert!(stingers.iter().any(|n| n.contains("=win")));

    let hit = stingers.iter().find(|n| n.contains("=hit")).unwrap();
    assert!(read(&setup.outdir, hit).contains("2002.wem"));
}

fn unreachable_bank() -> String {
    bank(
        "sfx.bnk",
        1,
        &[
            sound(301, 0, 3001, &[]),
            sound(302, 0, 3002, &[]),
            sound(303, 0, 3003, &[]),
            switch(410, "area", &[("a", 301), ("b", 303)]),
            switch(400, "area", &[("a", 410), ("b", 302)]),
            play(20, 400, 1),
            event("play_area", 20),
        ],
    )
}

/// an inner switch re-declaring an outer group only reaches one value
#[test]
fn test_unreachable_path() {
    let setup = setup(&[unreachable_bank()]);
    let report = generate(&setup.dump, &setup.outdir, GeneratorConfig::default());

    assert_eq!(report.runs[0].render.unreachables, 1);
    let names = files(&setup.outdir);
    assert_eq!(names.len(), 3, "{names:?}");

    let marked: Vec<String> = names
        .iter()
        .map(|n| read(&setup.outdir, n))
        .filter(|text| text.contains("##unreachable"))
        .collect();
    assert_eq!(marked.len(), 1);
    assert!(marked[0].starts_with("3003.wem"), "{}", marked[0]);
    assert!(!marked[0].contains("3002.wem"), "{}", marked[0]);
}

#[test]
fn test_unreachable_path_skipped() {
    let setup = setup(&[unreachable_bank()]);
    let config = GeneratorConfig {
        unreachables: false,
        ..GeneratorConfig::default()
    };
    let report = generate(&setup.dump, &setup.outdir, config);

    assert_eq!(report.runs[0].render.unreachables, 0);
    let names = files(&setup.outdir);
    assert_eq!(names.len(), 2, "{names:?}");
    for name in &names {
        assert!(!read(&setup.outdir, name).contains("3003.wem"));
    }
}

#[test]
fn test_unused_objects() {
    let setup = setup(&[bank(
        "sfx.bnk",
        1,
        &[sound(100, 0, 1001, &[]), sound(101, 0, 1002, &[]), play(20, 100, 1), event("play_sfx", 20)],
    )]);

    let report = generate(&setup.dump, &setup.outdir, GeneratorConfig::default());
    assert_eq!(report.outputs.created, 1);

    let outdir = setup.outdir.join("unused");
    let config = GeneratorConfig {
        generate_unused: true,
        ..GeneratorConfig::default()
    };
    let report = generate(&setup.dump, &outdir, config);
    assert_eq!(report.outputs.created, 2);
    assert_eq!(report.outputs.unused, 1);

    let names = files(&outdir);
    assert!(names.iter().any(|n| n.contains("~unused")), "{names:?}");
}

#[test]
fn test_params_fix_switch() {
    let setup = setup(&[bank(
        "music.bnk",
        1,
        &[
            sound(101, 0, 1001, &[]),
            sound(102, 0, 1002, &[]),
            switch(300, "music", &[("bgm1", 101), ("bgm2", 102)]),
            play(20, 300, 1),
            event("play_music", 20),
        ],
    )]);
    let config = GeneratorConfig {
        params: Some("[music=bgm2]".to_string()),
        ..GeneratorConfig::default()
    };
    generate(&setup.dump, &setup.outdir, config);

    let names = files(&setup.outdir);
    assert_eq!(names, vec!["play_music [music=bgm2].txtp"]);
}

#[test]
fn test_report_json() {
    let setup = setup(&[bank("sfx.bnk", 1, &[sound(100, 0, 1001, &[]), play(20, 100, 1), event("play_sfx", 20)])]);
    let report = generate(&setup.dump, &setup.outdir, GeneratorConfig::default());

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["banks_loaded"], 1);
    assert_eq!(json["outputs"]["created"], 1);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

const MUSIC: u32 = 100;
const ACT: u32 = 200;

#[test]
fn test_combos_are_stable() {
    let mut paths = GamesyncPaths::new(true);
    paths.add(GsType::Switch, MUSIC, 1);
    paths.add(GsType::State, ACT, 2);
    paths.done();
    paths.done();
    paths.add(GsType::Switch, MUSIC, 3);
    paths.done();

    let first = paths.combos().to_vec();
    let second = paths.combos().to_vec();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[test]
fn test_repeated_paths_merge() {
    let mut paths = GamesyncPaths::new(true);
    for _ in 0..2 {
        paths.add(GsType::Switch, MUSIC, 1);
        paths.add(GsType::Switch, ACT, 2);
        paths.done();
        paths.done();
    }
    // same assignments, other order
    paths.add(GsType::Switch, ACT, 2);
    paths.add(GsType::Switch, MUSIC, 1);
    paths.done();
    paths.done();

    assert_eq!(paths.combos().len(), 1);
}

#[test]
fn test_conflicting_scope_flagged() {
    let mut paths = GamesyncPaths::new(true);
    assert!(!paths.add(GsType::Switch, MUSIC, 1));
    assert!(paths.add(GsType::Switch, MUSIC, 2));
    paths.done();
    // "any" can't be taken once the outer scope fixed the group
    assert!(paths.add(GsType::Switch, MUSIC, 0));
    paths.done();
    paths.done();

    let combos = paths.combos();
    assert_eq!(combos.len(), 2);
    assert!(combos[0].is_unreachable());
    assert!(!combos[1].is_unreachable());
}

#[test]
fn test_graph_clamps() {
    let graph = Graph::new(
        vec![
            GraphPoint { x: 0.0, y: -10.0, interp: 4 },
            GraphPoint { x: 100.0, y: 0.0, interp: 4 },
        ],
        0,
        134,
    );
    assert_eq!(graph.evaluate(-50.0), -10.0);
    assert_eq!(graph.evaluate(500.0), 0.0);
    assert!((graph.evaluate(50.0) - -5.0).abs() < 1e-9);
}

#[test]
fn test_statechunk_combo_limits() {
    let mut paths = StateChunkPaths::new();
    for group in [1, 2] {
        for value in 1..=200 {
            paths.add(group, value, value % 3);
        }
    }
    assert_eq!(paths.combos().len(), 9);
    assert!(!paths.used_fallback());

    let mut paths = StateChunkPaths::new();
    for group in [1, 2] {
        for value in 1..=200 {
            paths.add(group, value, value);
        }
    }
    assert_eq!(paths.combos().len(), 1);
    assert!(paths.used_fallback());
}
