//! Run driver: loads dumps, picks entries and writes every playlist
//!
//! A run may be split per language. Each split gets its own builder,
//! renderer and writer, so nothing cached in one language leaks into
//! another.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::builder::{BuildDiagnostics, Builder};
use crate::error::{Error, Result};
use crate::model::{Bank, BankSet, NodeRef, load_dumps};
use crate::names::{NameResolver, NameTable};
use crate::registry::Params;
use crate::render::{Filter, RenderOptions, RenderStats, Renderer};
use crate::txtp::{DupeMode, MediaIndex, TxtpWriter, WriteStats, WriterOptions};
use crate::utils::{find_dump_files, hash_name, id_or_hash};

/// Classes generated as entries by default
pub const DEFAULT_ENTRIES: [&str; 2] = ["CAkEvent", "CAkDialogueEvent"];

/// Every knob of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub outdir: PathBuf,
    /// Only banks of this language (plus SFX banks); name or id
    pub language: Option<String>,
    /// Name lists used to reverse ids
    pub names: Vec<PathBuf>,
    pub filter: Vec<String>,
    /// Generate entries the filter doesn't select, after the rest
    pub filter_rest: bool,
    /// Skip writing normal entries
    pub filter_normal: bool,
    /// Skip writing unused objects
    pub filter_unused: bool,
    pub master_volume: f64,
    pub dupes: DupeMode,
    /// Fixed gamesyncs and states, like `(state=a) [switch=b] / [switch=c]`
    pub params: Option<String>,
    /// Fixed gamevars, like `{rtpc=50}`
    pub gamevars: Option<String>,
    /// Skip gamesync branches that contradict an outer one
    pub prefilter: bool,
    /// Also render unreachable gamesync paths
    pub unreachables: bool,
    pub generate_unused: bool,
    /// Write entries in bank order instead of by name
    pub bank_order: bool,
    pub write_delays: bool,
    pub random_all: bool,
    pub random_multi: bool,
    pub random_force: bool,
    /// Silence every crossfaded sound
    pub silence: bool,
    pub bnkmark: bool,
    pub alt_exts: bool,
    /// Classes generated as entries
    pub entries: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("txtp"),
            language: None,
            names: Vec::new(),
            filter: Vec::new(),
            filter_rest: false,
            filter_normal: false,
            filter_unused: false,
            master_volume: 0.0,
            dupes: DupeMode::default(),
            params: None,
            gamevars: None,
            prefilter: true,
            unreachables: true,
            generate_unused: false,
            bank_order: false,
            write_delays: false,
            random_all: false,
            random_multi: false,
            random_force: false,
            silence: false,
            bnkmark: false,
            alt_exts: false,
            entries: DEFAULT_ENTRIES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl GeneratorConfig {
    /// Loads a JSON config file; missing keys keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            outdir: self.outdir.clone(),
            dupes: self.dupes,
            write_delays: self.write_delays,
            random_all: self.random_all,
            random_multi: self.random_multi,
            random_force: self.random_force,
            master_volume: self.master_volume,
            bnkmark: self.bnkmark,
            alt_exts: self.alt_exts,
            silence: self.silence,
        }
    }

    fn render_options(&self) -> RenderOptions {
        let parse = |text: &Option<String>, st, sw, gp| {
            text.as_deref()
                .map(|text| Params::parse(text, st, sw, gp))
                .filter(|params| !params.is_empty())
        };
        RenderOptions {
            params: parse(&self.params, true, true, false),
            gamevars: parse(&self.gamevars, false, false, true),
            prefilter: self.prefilter,
            unreachables: self.unreachables,
        }
    }
}

/// An entry that failed and was skipped
#[derive(Debug, Clone, Serialize)]
pub struct EntryFailure {
    pub bank: String,
    pub class: String,
    pub sid: u32,
    pub message: String,
}

/// Results of one language split
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// `None` when the run covers every bank
    pub language: Option<String>,
    pub banks: Vec<String>,
    pub diagnostics: BuildDiagnostics,
    pub render: RenderStats,
}

/// Post-run summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub banks_loaded: usize,
    /// Dumps skipped, with the reason
    pub banks_failed: Vec<(PathBuf, String)>,
    pub outputs: WriteStats,
    pub failures: Vec<EntryFailure>,
    pub runs: Vec<RunReport>,
}

impl Report {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Logs the summary an operator needs to follow up on
    pub fn log_summary(&self) {
        let out = &self.outputs;
        tracing::info!(
            "Created {} files ({} duplicates, {} unused, {} with memory audio, {} with streams)",
            out.created,
            out.duplicates,
            out.unused,
            out.internals,
            out.streams
        );
        if out.trims > 0 {
            tracing::info!("{} names were trimmed", out.trims);
        }
        if !out.missing_media.is_empty() {
            tracing::warn!("{} memory media not found in loaded banks", out.missing_media.len());
        }
        if !self.failures.is_empty() {
            tracing::warn!("{} entries failed and were skipped", self.failures.len());
        }

        for run in &self.runs {
            let lang = run.language.as_deref().unwrap_or("all");
            let diag = &run.diagnostics;
            if !diag.missing_loaded.is_empty() {
                tracing::info!("[{lang}] {} ids missing in loaded banks (likely unused data)", diag.missing_loaded.len());
            }
            if !diag.missing_others.is_empty() {
                tracing::warn!("[{lang}] {} ids in banks not loaded: {:?}", diag.missing_others.len(), diag.missing_banks);
            }
            if !diag.missing_unknown.is_empty() {
                tracing::warn!("[{lang}] {} ids not found anywhere", diag.missing_unknown.len());
            }
            if !diag.multiple_nodes.is_empty() {
                tracing::info!("[{lang}] {} ids found in more than one bank", diag.multiple_nodes.len());
            }
            if !diag.unknown_props.is_empty() {
                tracing::warn!("[{lang}] unknown properties: {:?}", diag.unknown_props);
            }
            if run.render.transitions > 0 || run.render.stingers > 0 {
                tracing::info!(
                    "[{lang}] rendered {} transition and {} stinger playlists",
                    run.render.transitions,
                    run.render.stingers
                );
            }
            if run.render.statechunk_fallbacks > 0 {
                tracing::info!("[{lang}] {} entries merged their state combos", run.render.statechunk_fallbacks);
            }
        }
    }
}

/// Language of a bank: `None` for SFX (language independent) banks
pub fn language_of(bank: &Bank) -> Option<(u32, String)> {
    let field = bank
        .root()
        .find1("BankHeader")
        .and_then(|header| header.find1("dwLanguageID"))?;
    let id = field.uint();
    if id == 0 || id == hash_name("sfx") {
        return None;
    }
    let name = field.hashname().map_or_else(|| id.to_string(), ToString::to_string);
    Some((id, name))
}

/// Bank slots per run: one list per language, or a single list
fn language_splits(banks: &BankSet, filter: Option<&str>) -> Vec<(Option<String>, Vec<usize>)> {
    let mut langs: IndexMap<u32, String> = IndexMap::new();
    for bank in banks.iter() {
        if let Some((id, name)) = language_of(bank) {
            langs.entry(id).or_insert(name);
        }
    }
    if let Some(filter) = filter {
        let id = id_or_hash(filter);
        langs.retain(|&lid, name| lid == id || name.eq_ignore_ascii_case(filter));
        if langs.is_empty() {
            tracing::warn!("No banks for language '{filter}', using SFX banks only");
        }
    } else if langs.len() <= 1 {
        return vec![(None, (0..banks.len()).collect())];
    }

    let select = |lang: Option<u32>| -> Vec<usize> {
        banks
            .iter()
            .filter(|bank| match language_of(bank) {
                None => true,
                Some((id, _)) => lang == Some(id),
            })
            .map(Bank::slot)
            .collect()
    };
    if langs.is_empty() {
        return vec![(None, select(None))];
    }
    langs.into_iter().map(|(id, name)| (Some(name), select(Some(id)))).collect()
}

/// Runs the whole generation
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Loads dumps from files or folders and generates everything
    pub fn run<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<Report> {
        self.run_with_progress(inputs, |_, _, _| {})
    }

    /// Like [`Generator::run`], reporting dump loading progress
    pub fn run_with_progress<P, F>(&self, inputs: &[P], progress: F) -> Result<Report>
    where
        P: AsRef<Path>,
        F: Fn(usize, usize, &Path) + Send + Sync,
    {
        let paths = find_dump_files(inputs);
        tracing::info!("Loading {} dump(s)", paths.len());
        let loaded = load_dumps(&paths, progress);

        let mut report = self.generate(&loaded.banks)?;
        report.banks_failed = loaded.failed;
        Ok(report)
    }

    /// Generates playlists for already loaded banks
    pub fn generate(&self, banks: &BankSet) -> Result<Report> {
        if banks.iter().all(Bank::is_empty) {
            return Err(Error::NoBanks);
        }

        let mut names = NameTable::new();
        for path in &self.config.names {
            if let Err(e) = names.load_list(path) {
                tracing::warn!("Can't read names from {}: {e}", path.display());
            }
        }
        names.add_from_banks(banks);

        let entries: Vec<&str> = self.config.entries.iter().map(String::as_str).collect();
        let mut filter = Filter::new(&self.config.filter, &entries);
        filter.generate_rest = self.config.filter_rest;
        filter.skip_normal = self.config.filter_normal;
        filter.skip_unused = self.config.filter_unused;

        let mut report = Report {
            banks_loaded: banks.len(),
            ..Report::default()
        };

        for (language, slots) in language_splits(banks, self.config.language.as_deref()) {
            if let Some(lang) = &language {
                tracing::info!("Generating language {lang}");
            }
            if slots.len() == banks.len() {
                self.generate_split(banks, language, &names, &filter, &mut report)?;
            } else {
                let split = BankSet::new(slots.iter().filter_map(|&slot| banks.get(slot).cloned()).collect());
                self.generate_split(&split, language, &names, &filter, &mut report)?;
            }
        }

        Ok(report)
    }

    fn generate_split(
        &self,
        banks: &BankSet,
        language: Option<String>,
        names: &NameTable,
        filter: &Filter,
        report: &mut Report,
    ) -> Result<()> {
        let media = MediaIndex::new(banks);
        let mut writer = TxtpWriter::new(self.config.writer_options(), &media, banks);
        let mut renderer = Renderer::new(Builder::new(banks).with_names(names), filter, names, self.config.render_options());

        writer.no_txtp = filter.skip_normal;
        for bank in banks.iter() {
            for node in self.bank_entries(bank, filter, names) {
                self.render_entry(&mut renderer, &mut writer, node, false, report)?;
            }
        }

        if self.config.generate_unused || filter.has_unused() {
            writer.unused_mark = true;
            writer.no_txtp = filter.skip_unused;
            let nodes = renderer.builder_mut().unused_nodes();
            tracing::info!("Generating {} unused object(s)", nodes.len());
            for node in nodes {
                // rendering an earlier one may have reached it
                if !renderer.builder_mut().is_unused(node) || !filter.allow_unused(node, names) {
                    continue;
                }
                self.render_entry(&mut renderer, &mut writer, node, true, report)?;
            }
        }

        report.outputs.merge(std::mem::take(&mut writer.stats));
        let render = std::mem::take(&mut renderer.stats);
        let diagnostics = renderer.into_builder().diagnostics;
        report.runs.push(RunReport {
            language,
            banks: banks.iter().map(|b| b.filename().to_string()).collect(),
            diagnostics,
            render,
        });
        Ok(())
    }

    /// Entries of a bank in output order: filter matches first, then
    /// named entries by name, then unnamed ones in bank order
    fn bank_entries<'a>(&self, bank: &'a Bank, filter: &Filter, names: &dyn NameResolver) -> Vec<NodeRef<'a>> {
        let is_entry = |node: &NodeRef<'_>| self.config.entries.iter().any(|c| c.eq_ignore_ascii_case(node.name()));

        let mut allowed = Vec::new();
        let mut rest = Vec::new();
        for node in bank.hirc_items() {
            if filter.is_active() {
                if filter.allow_outer(node, names) {
                    allowed.push(node);
                } else if filter.generate_rest && is_entry(&node) {
                    rest.push(node);
                }
            } else if is_entry(&node) {
                rest.push(node);
            }
        }

        if !self.config.bank_order {
            let name_of = |node: &NodeRef<'_>| node.sid().and_then(|sid| names.get_namerow(sid)).and_then(|r| r.hashname.clone());
            let (mut named, unnamed): (Vec<_>, Vec<_>) = rest.into_iter().partition(|node| name_of(node).is_some());
            named.sort_by_cached_key(|node| name_of(node).unwrap_or_default().to_lowercase());
            named.extend(unnamed);
            rest = named;
        }
        allowed.extend(rest);
        allowed
    }

    fn render_entry<'a>(
        &self,
        renderer: &mut Renderer<'a>,
        writer: &mut TxtpWriter<'_>,
        node: NodeRef<'a>,
        unused: bool,
        report: &mut Report,
    ) -> Result<()> {
        match renderer.render_entry(node, unused, writer) {
            Ok(()) => Ok(()),
            Err(e @ Error::Io(_)) => Err(e),
            Err(e) => {
                tracing::error!("Skipping {} {:?} in {}: {e}", node.name(), node.sid(), node.bank().filename());
                report.failures.push(EntryFailure {
                    bank: node.bank().filename().to_string(),
                    class: node.name().to_string(),
                    sid: node.sid().unwrap_or(0),
                    message: e.to_string(),
                });
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BankBuilder;

    fn lang_bank(filename: &str, id: &str, lang: u32, langname: &str) -> Bank {
        let mut b = BankBuilder::new(filename, 134);
        b.object("BankHeader").field("sid", "dwSoundBankID", id);
        let mut field = crate::model::ModelNode::new(crate::model::NodeKind::Field, "dwLanguageID");
        field.ty = "u32".to_string();
        field.value = crate::model::Value::parse("u32", &lang.to_string());
        field.attrs.insert("hashname".to_string(), langname.to_string());
        b.leaf(field).close();
        b.build()
    }

    #[test]
    fn test_language_splits() {
        let sfx = hash_name("sfx");
        let en = hash_name("english(us)");
        let ja = hash_name("japanese");
        let banks = BankSet::new(vec![
            lang_bank("init.bnk", "1", sfx, "SFX"),
            lang_bank("vo_en.bnk", "2", en, "English(US)"),
            lang_bank("vo_ja.bnk", "3", ja, "Japanese"),
        ]);

        let splits = language_splits(&banks, None);
        assert_eq!(splits.len(), 2);
        assert_eq!(splits[0], (Some("English(US)".to_string()), vec![0, 1]));
        assert_eq!(splits[1], (Some("Japanese".to_string()), vec![0, 2]));

        let splits = language_splits(&banks, Some("japanese"));
        assert_eq!(splits, vec![(Some("Japanese".to_string()), vec![0, 2])]);

        let splits = language_splits(&banks, Some("german"));
        assert_eq!(splits, vec![(None, vec![0])]);
    }

    #[test]
    fn test_single_language_uses_all_banks() {
        let banks = BankSet::new(vec![
            lang_bank("init.bnk", "1", hash_name("sfx"), "SFX"),
            lang_bank("vo.bnk", "2", hash_name("english(us)"), "English(US)"),
        ]);
        assert_eq!(language_splits(&banks, None), vec![(None, vec![0, 1])]);
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: GeneratorConfig = serde_json::from_str(r#"{"outdir": "out", "dupes": "all"}"#).unwrap();
        assert_eq!(config.outdir, PathBuf::from("out"));
        assert_eq!(config.dupes, DupeMode::All);
        assert!(config.prefilter);
        assert_eq!(config.entries, vec!["CAkEvent", "CAkDialogueEvent"]);
    }

    #[test]
    fn test_no_banks() {
        let generator = Generator::new(GeneratorConfig::default());
        assert!(matches!(generator.generate(&BankSet::default()), Err(Error::NoBanks)));
    }

    #[test]
    fn test_entry_order() {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.object("BankHeader").field("sid", "dwSoundBankID", "1").close();
        b.list("listLoadedItem");
        b.item("CAkEvent", 0).field("sid", "ulID", "30").close();
        b.item("CAkEvent", 1).field("sid", "ulID", "20").close();
        b.item("CAkSound", 2).field("sid", "ulID", "40").close();
        b.item("CAkEvent", 3).field("sid", "ulID", "10").close();
        b.close();
        let banks = BankSet::new(vec![b.build()]);
        let bank = banks.get(0).unwrap();

        let mut names = NameTable::new();
        names.add_hashname(20, "b_event");
        names.add_hashname(10, "a_event");

        let generator = Generator::new(GeneratorConfig::default());
        let filter = Filter::new::<&str>(&[], &DEFAULT_ENTRIES);
        let order: Vec<_> = generator.bank_entries(bank, &filter, &names).iter().filter_map(NodeRef::sid).collect();
        assert_eq!(order, vec![10, 20, 30]);

        let filter = Filter::new(&["30"], &DEFAULT_ENTRIES);
        let order: Vec<_> = generator.bank_entries(bank, &filter, &names).iter().filter_map(NodeRef::sid).collect();
        assert_eq!(order, vec![30]);

        let mut filter = Filter::new(&["30"], &DEFAULT_ENTRIES);
        filter.generate_rest = true;
        let order: Vec<_> = generator.bank_entries(bank, &filter, &names).iter().filter_map(NodeRef::sid).collect();
        assert_eq!(order, vec![30, 10, 20]);

        let generator = Generator::new(GeneratorConfig {
            bank_order: true,
            ..GeneratorConfig::default()
        });
        let filter = Filter::new::<&str>(&[], &DEFAULT_ENTRIES);
        let order: Vec<_> = generator.bank_entries(bank, &filter, &names).iter().filter_map(NodeRef::sid).collect();
        assert_eq!(order, vec![30, 20, 10]);
    }
}
