//! Entry rendering
//!
//! One entry usually means several playlists. A first pass with no params
//! registers every gamesync path, then each path is replayed. Inside each
//! path the same happens for states that change volumes, and gamevars
//! given by the operator are applied last:
//!
//! ```text
//! entry > gamesync paths > state combos (+ default) > gamevar combos > write
//! ```
//!
//! Stingers and transition segments found on the way are rendered as their
//! own playlists once the entry is done.

pub mod filter;
mod hircs;

pub use filter::{Filter, FilterMode};

use serde::Serialize;

use crate::builder::{Builder, IdType};
use crate::error::{Error, Result};
use crate::model::NodeRef;
use crate::names::NameResolver;
use crate::registry::{
    GamesyncParams, GamesyncPaths, GamevarsParams, GamevarsPaths, GsType, Params, StateChunkParams, StateChunkPaths,
    Stingers, Transitions,
};
use crate::txtp::{Txtp, TxtpWriter};

/// Render settings that stay the same for every entry
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Gamesync (and state) combos given by the operator, replacing the
    /// ones found while rendering
    pub params: Option<Params>,
    /// Gamevar combos given by the operator
    pub gamevars: Option<Params>,
    /// Skip gamesync branches that contradict an outer branch
    pub prefilter: bool,
    /// Also render unreachable gamesync paths, after the rest
    pub unreachables: bool,
}

/// Counters for the final report
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderStats {
    /// Unreachable gamesync paths rendered
    pub unreachables: usize,
    /// Entries whose state combos were too many and got merged
    pub statechunk_fallbacks: usize,
    pub stingers: usize,
    pub transitions: usize,
}

/// What a playlist starts from and how it's named
#[derive(Debug, Clone, Copy)]
struct Job<'a> {
    /// Object rendered
    root: NodeRef<'a>,
    /// Object the name comes from
    entry: NodeRef<'a>,
    ncaller: Option<NodeRef<'a>>,
    stinger: Option<(u32, NodeRef<'a>)>,
    transition: bool,
    unused: bool,
}

impl<'a> Job<'a> {
    fn new(node: NodeRef<'a>, unused: bool) -> Self {
        Self {
            root: node,
            entry: node,
            ncaller: None,
            stinger: None,
            transition: false,
            unused,
        }
    }
}

/// Run state for one set of banks
///
/// Holds the node cache plus the path registries, which are reset for
/// every entry.
pub struct Renderer<'a> {
    builder: Builder<'a>,
    filter: &'a Filter,
    names: &'a dyn NameResolver,
    options: RenderOptions,
    /// Manual combos, parsed once
    default_gs: Option<Vec<GamesyncParams>>,
    default_sc: Option<Vec<StateChunkParams>>,
    default_gv: Option<Vec<GamevarsParams>>,
    /// Manual combo being rendered, to pair gamesyncs with their states
    default_index: usize,

    gspaths: GamesyncPaths,
    scpaths: StateChunkPaths,
    /// Active values; `None` while registering
    gsparams: Option<GamesyncParams>,
    scparams: Option<StateChunkParams>,
    gvparams: Option<GamevarsParams>,
    sc_registering: bool,
    sc_default: bool,
    /// State combos with unreachable values, rendered after the rest
    deferred_sc: Vec<(Option<GamesyncParams>, StateChunkParams)>,
    stingers: Stingers,
    transitions: Transitions,
    depth: usize,
    pub stats: RenderStats,
}

impl<'a> Renderer<'a> {
    pub fn new(builder: Builder<'a>, filter: &'a Filter, names: &'a dyn NameResolver, options: RenderOptions) -> Self {
        let default_gs = options.params.as_ref().filter(|p| !p.is_empty()).map(|params| {
            let mut paths = GamesyncPaths::new(false);
            paths.add_params(params);
            paths.combos().to_vec()
        });
        // states in params also fix state combos
        let default_sc = options
            .params
            .as_ref()
            .filter(|p| p.combos().iter().flatten().any(|item| item.gtype == GsType::State))
            .map(|params| {
                let mut paths = StateChunkPaths::new();
                paths.add_params(params);
                paths.combos().to_vec()
            });
        let default_gv = options.gamevars.as_ref().filter(|p| !p.is_empty()).map(|params| {
            let mut paths = GamevarsPaths::new();
            paths.add_params(params);
            paths.combos().to_vec()
        });

        Self {
            builder,
            filter,
            names,
            default_gs,
            default_sc,
            default_gv,
            default_index: 0,
            gspaths: GamesyncPaths::new(options.prefilter),
            scpaths: StateChunkPaths::new(),
            gsparams: None,
            scparams: None,
            gvparams: None,
            sc_registering: false,
            sc_default: false,
            deferred_sc: Vec::new(),
            stingers: Stingers::new(),
            transitions: Transitions::new(),
            depth: 0,
            options,
            stats: RenderStats::default(),
        }
    }

    pub fn builder(&self) -> &Builder<'a> {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut Builder<'a> {
        &mut self.builder
    }

    pub fn into_builder(self) -> Builder<'a> {
        self.builder
    }

    /// Renders every playlist an entry can make, then its stingers and
    /// transition segments
    pub fn render_entry(&mut self, node: NodeRef<'a>, unused: bool, writer: &mut TxtpWriter<'_>) -> Result<()> {
        self.stingers = Stingers::new();
        self.transitions = Transitions::new();

        self.render_gs(&Job::new(node, unused), writer)?;

        // segments playing a stinger may declare more, ignored here
        let stingers: Vec<_> = self.stingers.items().copied().collect();
        for stinger in stingers {
            let Some(segment) = self.builder.get_node(stinger.bank_id, stinger.segment, IdType::Audio) else {
                continue;
            };
            tracing::debug!("stinger {} > segment {}", stinger.trigger, stinger.segment);
            self.stats.stingers += 1;
            let job = Job {
                root: segment,
                stinger: Some((stinger.trigger, segment)),
                ..Job::new(node, unused)
            };
            self.render_gs(&job, writer)?;
        }

        let transitions: Vec<_> = self.transitions.items().copied().collect();
        for transition in transitions {
            let Some(segment) = self.builder.get_node(transition.bank_id, transition.segment, IdType::Audio) else {
                continue;
            };
            self.stats.transitions += 1;
            let job = Job {
                ncaller: Some(node),
                transition: true,
                ..Job::new(segment, unused)
            };
            self.render_gs(&job, writer)?;
        }
        Ok(())
    }

    fn render_gs(&mut self, job: &Job<'a>, writer: &mut TxtpWriter<'_>) -> Result<()> {
        if let Some(combos) = self.default_gs.clone() {
            for (index, params) in combos.into_iter().enumerate() {
                self.default_index = index;
                self.gsparams = Some(params);
                self.render_sc(job, writer)?;
            }
            self.gsparams = None;
            self.default_index = 0;
            return self.render_deferred(job, writer);
        }

        // register paths, no output
        self.gsparams = None;
        self.gspaths = GamesyncPaths::new(self.options.prefilter);
        self.render_pass(job)?;

        if self.gspaths.is_empty() {
            self.render_sc(job, writer)?;
            return self.render_deferred(job, writer);
        }

        let (reachables, unreachables): (Vec<_>, Vec<_>) =
            self.gspaths.combos().iter().cloned().partition(|params| !params.is_unreachable());

        for params in reachables {
            self.gsparams = Some(params);
            self.render_sc(job, writer)?;
        }
        if self.options.unreachables {
            for params in unreachables {
                tracing::debug!("rendering unreachable path {:?}", params.elems());
                self.stats.unreachables += 1;
                self.gsparams = Some(params);
                self.render_sc(job, writer)?;
            }
        }
        self.gsparams = None;
        self.render_deferred(job, writer)
    }

    fn render_sc(&mut self, job: &Job<'a>, writer: &mut TxtpWriter<'_>) -> Result<()> {
        if let Some(scparams) = self.default_sc.as_ref().and_then(|list| list.get(self.default_index)).cloned() {
            self.scparams = Some(scparams);
            self.render_gv(job, writer)?;
            self.scparams = None;
            return Ok(());
        }

        // register states, no output
        self.scparams = None;
        self.scpaths = StateChunkPaths::new();
        self.sc_registering = true;
        let registered = self.render_pass(job);
        self.sc_registering = false;
        registered?;

        if self.scpaths.is_empty() {
            return self.render_gv(job, writer);
        }

        self.scpaths.filter(self.gsparams.as_ref());
        let combos = self.scpaths.combos().to_vec();
        if self.scpaths.used_fallback() {
            self.stats.statechunk_fallbacks += 1;
        }

        for scparams in &combos {
            if scparams.has_unreachables() {
                self.deferred_sc.push((self.gsparams.clone(), scparams.clone()));
                continue;
            }
            self.scparams = Some(scparams.clone());
            self.render_gv(job, writer)?;
        }

        // base playlist with no state applied
        if self.scpaths.generate_default(combos.len()) {
            self.scparams = Some(StateChunkParams::new());
            self.sc_default = true;
            let result = self.render_gv(job, writer);
            self.sc_default = false;
            result?;
        }
        self.scparams = None;
        Ok(())
    }

    /// State combos that can't happen with their gamesync path
    fn render_deferred(&mut self, job: &Job<'a>, writer: &mut TxtpWriter<'_>) -> Result<()> {
        for (gsparams, scparams) in std::mem::take(&mut self.deferred_sc) {
            self.gsparams = gsparams;
            self.scparams = Some(scparams);
            self.render_gv(job, writer)?;
        }
        self.gsparams = None;
        self.scparams = None;
        Ok(())
    }

    fn render_gv(&mut self, job: &Job<'a>, writer: &mut TxtpWriter<'_>) -> Result<()> {
        let Some(combos) = self.default_gv.clone() else {
            self.gvparams = None;
            return self.render_last(job, writer);
        };
        for params in combos {
            self.gvparams = Some(params);
            self.render_last(job, writer)?;
        }
        self.gvparams = None;
        Ok(())
    }

    fn render_last(&mut self, job: &Job<'a>, writer: &mut TxtpWriter<'_>) -> Result<()> {
        let mut txtp = self.render_pass(job)?;
        writer.write(&mut txtp)
    }

    /// Renders the job's root once with the current params
    fn render_pass(&mut self, job: &Job<'a>) -> Result<Txtp<'a>> {
        let mut txtp = Txtp::new(job.entry, self.names);
        txtp.ncaller = job.ncaller;
        txtp.stinger = job.stinger;
        txtp.transition = job.transition;
        txtp.unused = job.unused;
        txtp.sc_default = self.sc_default;

        // unreachable paths are consumed while read, so each pass gets a copy
        let gsparams = self.gsparams.clone();
        let result = self.render_root(job, &mut txtp);
        self.gsparams = gsparams;
        result?;
        Ok(txtp)
    }

    fn render_root(&mut self, job: &Job<'a>, txtp: &mut Txtp<'a>) -> Result<()> {
        self.depth = 0;
        let id = self.builder.init_bnode(job.root, true)?;
        let Some(bnode) = self.builder.bnode(id) else {
            return Ok(());
        };
        self.render_base(&bnode, txtp)?;

        if !txtp.is_balanced() {
            return Err(Error::UnbalancedTree(format!("entry {}", bnode.sid)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BankBuilder, BankSet};
    use crate::names::NameTable;
    use crate::txtp::{MediaIndex, WriterOptions};

    const DEFAULT_HIRCS: [&str; 2] = ["CAkEvent", "CAkDialogueEvent"];

    fn base(b: &mut BankBuilder, parent: &str) {
        b.object("NodeBaseParams")
            .field("tid", "DirectParentID", parent)
            .field("tid", "OverrideBusId", "0")
            .close();
    }

    fn sound(b: &mut BankBuilder, index: usize, sid: &str, source: &str) {
        b.item("CAkSound", index).field("sid", "ulID", sid);
        b.object("AkBankSourceData")
            .field("u32", "ulPluginID", "262145")
            .field("u8", "StreamType", "2")
            .object("AkMediaInformation")
            .field("tid", "sourceID", source)
            .close()
            .close();
        base(b, "0");
        b.close();
    }

    fn event(b: &mut BankBuilder, index: usize, sid: &str, action: &str) {
        b.item("CAkEvent", index).field("sid", "ulID", sid);
        b.list("actions").field("tid", "ulActionID", action).close();
        b.close();
    }

    fn action(b: &mut BankBuilder, index: usize, sid: &str, target: &str) {
        b.item("CAkActionPlay", index)
            .field("sid", "ulID", sid)
            .field("tid", "idExt", target)
            .object("PlayActionParams")
            .field("tid", "bankID", "1")
            .close()
            .close();
    }

    fn switch(b: &mut BankBuilder, index: usize, sid: &str, group: &str, branches: &[(&str, &str)]) {
        b.item("CAkSwitchCntr", index)
            .field("sid", "ulID", sid)
            .field("u8", "eGroupType", "0")
            .field("tid", "ulGroupID", group);
        base(b, "0");
        b.list("SwitchList");
        for (value, child) in branches {
            b.object("CAkSwitchPackage")
                .field("tid", "ulSwitchID", value)
                .list("NodeList")
                .field("tid", "NodeID", child)
                .close()
                .close();
        }
        b.close().close();
    }

    /// event 10 > action 20 > switch 30 (group 99: 1 > sound 41, 2 > sound 42)
    fn switch_banks() -> BankSet {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.object("BankHeader").field("sid", "dwSoundBankID", "1").close();
        b.list("listLoadedItem");
        event(&mut b, 0, "10", "20");
        action(&mut b, 1, "20", "30");
        switch(&mut b, 2, "30", "99", &[("1", "41"), ("2", "42")]);
        sound(&mut b, 3, "41", "1001");
        sound(&mut b, 4, "42", "1002");
        b.close();
        BankSet::new(vec![b.build()])
    }

    /// switch 30 (group 99: 1 > switch 31, 2 > sound 42), where switch 31
    /// (group 99: 1 > sound 41, 2 > sound 43) can only see value 1
    fn nested_switch_banks() -> BankSet {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.object("BankHeader").field("sid", "dwSoundBankID", "1").close();
        b.list("listLoadedItem");
        event(&mut b, 0, "10", "20");
        action(&mut b, 1, "20", "30");
        switch(&mut b, 2, "30", "99", &[("1", "31"), ("2", "42")]);
        switch(&mut b, 3, "31", "99", &[("1", "41"), ("2", "43")]);
        sound(&mut b, 4, "41", "1001");
        sound(&mut b, 5, "42", "1002");
        sound(&mut b, 6, "43", "1003");
        b.close();
        BankSet::new(vec![b.build()])
    }

    /// (file name, contents) in write order, plus stats
    fn render_ordered(banks: &BankSet, options: RenderOptions) -> (Vec<(String, String)>, RenderStats) {
        let dir = tempfile::tempdir().unwrap();
        let names = NameTable::new();
        let filter = Filter::new::<&str>(&[], &DEFAULT_HIRCS);
        let media = MediaIndex::new(banks);
        let writer_options = WriterOptions {
            outdir: dir.path().to_path_buf(),
            ..WriterOptions::default()
        };
        let mut writer = TxtpWriter::new(writer_options, &media, banks);
        let mut renderer = Renderer::new(Builder::new(banks), &filter, &names, options);

        let entry = banks.get(0).unwrap().hirc_items()[0];
        renderer.render_entry(entry, false, &mut writer).unwrap();

        let outputs = writer
            .written
            .iter()
            .map(|name| (name.clone(), std::fs::read_to_string(dir.path().join(name)).unwrap()))
            .collect();
        (outputs, renderer.stats)
    }

    fn render_all(banks: &BankSet, options: RenderOptions) -> (Vec<String>, RenderStats) {
        let (outputs, stats) = render_ordered(banks, options);
        let mut files: Vec<String> = outputs.into_iter().map(|(name, _)| name).collect();
        files.sort();
        (files, stats)
    }

    #[test]
    fn test_one_playlist_per_switch_value() {
        let banks = switch_banks();
        let (files, _) = render_all(&banks, RenderOptions::default());
        assert_eq!(files, vec!["test-0000-event [99=1].txtp", "test-0000-event [99=2].txtp"]);
    }

    #[test]
    fn test_manual_params() {
        let banks = switch_banks();
        let options = RenderOptions {
            params: Some(Params::parse("[99=2]", true, true, false)),
            ..RenderOptions::default()
        };
        let (files, _) = render_all(&banks, options);
        assert_eq!(files, vec!["test-0000-event [99=2].txtp"]);
    }

    #[test]
    fn test_missing_target_renders_nothing() {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.object("BankHeader").field("sid", "dwSoundBankID", "1").close();
        b.list("listLoadedItem");
        event(&mut b, 0, "10", "20");
        action(&mut b, 1, "20", "999");
        b.close();
        let banks = BankSet::new(vec![b.build()]);

        let (files, _) = render_all(&banks, RenderOptions::default());
        assert!(files.is_empty());
    }

    #[test]
    fn test_unreachable_path_plays_inner_branch() {
        let banks = nested_switch_banks();
        let options = RenderOptions {
            unreachables: true,
            ..RenderOptions::default()
        };
        let (outputs, stats) = render_ordered(&banks, options);
        assert_eq!(stats.unreachables, 1);
        assert_eq!(outputs.len(), 3, "{outputs:?}");

        let marked: Vec<&String> = outputs
            .iter()
            .map(|(_, text)| text)
            .filter(|text| text.contains("##unreachable"))
            .collect();
        assert_eq!(marked.len(), 1);
        assert!(marked[0].starts_with("1003.wem"), "{}", marked[0]);
    }

    #[test]
    fn test_unreachable_paths_written_last() {
        let banks = nested_switch_banks();
        let options = RenderOptions {
            unreachables: true,
            ..RenderOptions::default()
        };
        let (outputs, _) = render_ordered(&banks, options);

        let flags: Vec<bool> = outputs.iter().map(|(_, text)| text.contains("##unreachable")).collect();
        assert_eq!(flags, vec![false, false, true], "{outputs:?}");
    }

    #[test]
    fn test_unreachable_paths_skipped_by_default() {
        let banks = nested_switch_banks();
        let (outputs, stats) = render_ordered(&banks, RenderOptions::default());
        assert_eq!(stats.unreachables, 0);
        assert_eq!(outputs.len(), 2, "{outputs:?}");
        assert!(outputs.iter().all(|(_, text)| !text.contains("1003.wem")));
    }
}
