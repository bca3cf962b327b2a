//! TXTP output: dupe checks, final names and files

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::Txtp;
use super::media::MediaIndex;
use super::namer;
use super::printer::{Printer, format_float};
use super::simplify::{SimplifyOptions, TreeFlags, simplify};
use crate::error::Result;
use crate::model::{BankSet, NodeKey};
use crate::utils::sanitize_filename;

/// How repeated playlists are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DupeMode {
    /// Skip playlists that only differ in minor details (volumes, delays)
    #[default]
    Skip,
    /// Skip exact repeats only
    Exact,
    /// Write everything, marking repeats with `{d}`
    All,
}

#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    pub outdir: PathBuf,
    pub dupes: DupeMode,
    pub write_delays: bool,
    pub random_all: bool,
    pub random_multi: bool,
    pub random_force: bool,
    pub master_volume: f64,
    /// Mark playlists using in-bank media with `{b}`
    pub bnkmark: bool,
    /// Use codec extensions (`.logg`, `.lwav`) for old banks
    pub alt_exts: bool,
    /// Silence every crossfaded sound
    pub silence: bool,
}

/// Output counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteStats {
    pub created: usize,
    pub duplicates: usize,
    pub unused: usize,
    pub internals: usize,
    pub streams: usize,
    /// Names cut for being too long
    pub trims: usize,
    /// Memory media not found in any loaded bank
    pub missing_media: BTreeSet<u32>,
}

impl WriteStats {
    /// Adds counters from another run
    pub fn merge(&mut self, other: WriteStats) {
        self.created += other.created;
        self.duplicates += other.duplicates;
        self.unused += other.unused;
        self.internals += other.internals;
        self.streams += other.streams;
        self.trims += other.trims;
        self.missing_media.extend(other.missing_media);
    }
}

pub struct TxtpWriter<'w> {
    options: WriterOptions,
    media: &'w MediaIndex,
    banks: &'w BankSet,
    texts: HashSet<String>,
    namenodes: HashSet<(String, NodeKey)>,
    namebases: HashSet<String>,
    names: usize,
    /// Count and name outputs but don't write them
    pub no_txtp: bool,
    /// Outputs now come from the unused pass
    pub unused_mark: bool,
    /// File names in the order they were written
    pub written: Vec<String>,
    pub stats: WriteStats,
}

impl<'w> TxtpWriter<'w> {
    pub fn new(options: WriterOptions, media: &'w MediaIndex, banks: &'w BankSet) -> Self {
        Self {
            options,
            media,
            banks,
            texts: HashSet::new(),
            namenodes: HashSet::new(),
            namebases: HashSet::new(),
            names: 0,
            no_txtp: false,
            unused_mark: false,
            written: Vec::new(),
            stats: WriteStats::default(),
        }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Simplifies and writes a rendered playlist, once per selectable
    /// group when those are requested
    pub fn write(&mut self, txtp: &mut Txtp<'_>) -> Result<()> {
        let options = SimplifyOptions {
            write_delays: self.options.write_delays,
            random_all: self.options.random_all,
            random_multi: self.options.random_multi,
            random_force: self.options.random_force,
            master_volume: self.options.master_volume,
        };
        let tflags = simplify(&mut txtp.tree, &options)?;

        // may have sounds but all removed
        if tflags.sound_count == 0 {
            tracing::debug!("no sounds for {:?}", txtp.entry.sid());
            return Ok(());
        }

        if tflags.selectable_count > 0 {
            for selected in 1..=tflags.selectable_count {
                self.write_txtp(txtp, &tflags, Some(selected))?;
            }
            return Ok(());
        }
        self.write_txtp(txtp, &tflags, None)
    }

    fn write_txtp(&mut self, txtp: &Txtp<'_>, tflags: &TreeFlags, selected: Option<usize>) -> Result<()> {
        let (media, banks) = (self.media, self.banks);
        let mut printer = Printer::new(&txtp.tree, tflags, media, banks, selected, self.options.alt_exts);
        printer.set_silence(self.options.silence);

        // near-identical playlists (volumes, delays) compare by a simpler text
        let text = printer.generate(false);
        let key = match self.options.dupes {
            DupeMode::Exact => text.clone(),
            _ => printer.generate(true),
        };
        self.stats.missing_media.extend(printer.flags.missing_media.iter().copied());

        let mut name = namer::longname(txtp, &printer, self.options.bnkmark);

        let is_newtxtp = self.register_txtp(key, &printer);
        // same name from the same object is a repeat of a known combo
        let is_newname = self.namenodes.insert((name.clone(), txtp.entry.key()));

        if !is_newtxtp && !is_newname {
            self.stats.duplicates -= 1;
            return Ok(());
        }
        if !is_newtxtp {
            if self.options.dupes != DupeMode::All {
                tracing::debug!("ignored '{name}' (repeat)");
                return Ok(());
            }
            name.push_str(" {d}");
        }

        let longname = format!("{name}.txtp");
        let name = self.clean_name(&name);
        tracing::debug!("saving '{name}'");
        if self.no_txtp {
            return Ok(());
        }

        let outname = match namer::trim_filename(&name) {
            Some(trimmed) => {
                self.stats.trims += 1;
                trimmed
            }
            None => name.clone(),
        };
        let info = self.info_text(txtp, &name, &longname, selected);

        std::fs::create_dir_all(&self.options.outdir)?;
        std::fs::write(self.options.outdir.join(&outname), format!("{text}{info}"))?;
        self.written.push(outname);
        Ok(())
    }

    fn register_txtp(&mut self, key: String, printer: &Printer<'_>) -> bool {
        if !self.texts.insert(key) {
            self.stats.duplicates += 1;
            return false;
        }
        self.stats.created += 1;
        if self.unused_mark {
            self.stats.unused += 1;
        }
        if printer.flags.has_internals {
            self.stats.internals += 1;
        }
        if printer.flags.has_streams {
            self.stats.streams += 1;
        }
        true
    }

    /// Filesystem-safe name with extension; repeated names get a counter
    fn clean_name(&mut self, name: &str) -> String {
        self.names += 1;
        let mut name = name.to_string();
        if !self.namebases.insert(name.to_lowercase()) {
            name.push_str(&format!("#dupe#{:03}", self.names));
        }
        format!("{}.txtp", sanitize_filename(&name))
    }

    fn info_text(&self, txtp: &Txtp<'_>, name: &str, longname: &str, selected: Option<usize>) -> String {
        let mut info = String::from("\n\n");
        info.push_str(&format!("# AUTOGENERATED WITH BNKPATHS {}\n", crate::VERSION));
        info.push_str("#\n");
        info.push_str(&format!("# {name}\n"));

        if longname != name {
            info.push_str(&format!("# * full name: {longname}\n"));
        }
        let gsnames = txtp.info.gsnames(true);
        if !gsnames.is_empty() {
            info.push_str(&format!("# * gamesyncs: {}\n", gsnames.trim()));
        }
        let scnames = txtp.info.scnames();
        if !scnames.is_empty() {
            info.push_str(&format!("# * statechunks: {scnames}\n"));
        }
        let gvnames = txtp.info.gvnames();
        if !gvnames.is_empty() {
            info.push_str(&format!("# * gamevars: {gvnames}\n"));
        }
        if self.options.master_volume != 0.0 {
            info.push_str(&format!("# * master volume: {}dB\n", format_float(self.options.master_volume)));
        }
        if let Some(selected) = selected {
            let extra = if self.options.random_force {
                " (forced)"
            } else if self.options.random_multi {
                " (multi)"
            } else {
                ""
            };
            info.push_str(&format!("# * selected group={selected}{extra}\n"));
        }
        for bank in txtp.info.banks() {
            info.push_str(&format!("# - {bank}\n"));
        }
        info.push_str("#\n");
        info.push_str(&txtp.info.tree_lines());
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Source;
    use crate::model::BankBuilder;
    use crate::names::NameTable;
    use crate::txtp::tree::{NodeConfig, NodeSound, ROOT};

    fn sample_bank() -> BankSet {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.list("listLoadedItem");
        b.item("CAkEvent", 0).field("sid", "ulID", "10").close();
        b.item("CAkEvent", 1).field("sid", "ulID", "20").close();
        b.close();
        BankSet::new(vec![b.build()])
    }

    fn stream(tid: u32) -> Source {
        Source {
            tid,
            owner: 1,
            bank: 0,
            version: 134,
            internal: false,
            plugin_id: None,
            plugin_name: None,
            plugin_size: None,
            plugin_external: false,
            plugin_ignorable: false,
            plugin_midi: false,
            is_silence: false,
            plugin_fx: None,
            extension: Some("wem"),
            lang: None,
        }
    }

    fn render<'a>(entry: crate::model::NodeRef<'a>, names: &'a NameTable, tid: u32, volume: f64) -> Txtp<'a> {
        let mut txtp = Txtp::new(entry, names);
        txtp.info.next(entry);
        let config = NodeConfig {
            volume: Some(volume),
            ..NodeConfig::default()
        };
        txtp.tree.add_sound(ROOT, NodeSound::new(Some(stream(tid))), &config);
        txtp.info.source(tid);
        txtp.info.done();
        txtp
    }

    #[test]
    fn test_write_and_dupes() {
        let dir = tempfile::tempdir().unwrap();
        let banks = sample_bank();
        let media = MediaIndex::new(&banks);
        let mut names = NameTable::new();
        names.add_name("play_bgm");
        let options = WriterOptions {
            outdir: dir.path().to_path_buf(),
            ..WriterOptions::default()
        };
        let mut writer = TxtpWriter::new(options, &media, &banks);

        let events = banks.get(0).unwrap().hirc_items();
        let mut first = render(events[0], &names, 100, -2.0);
        writer.write(&mut first).unwrap();

        // same sound, different volume: dupe in the default mode
        let mut second = render(events[1], &names, 100, -4.0);
        writer.write(&mut second).unwrap();

        assert_eq!(writer.stats.created, 1);
        assert_eq!(writer.stats.duplicates, 1);
        assert_eq!(writer.stats.streams, 1);

        let path = dir.path().join("test-0000-event.txtp");
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("100.wem #i  #v -2.0dB\n\n"));
        assert!(text.contains("# AUTOGENERATED WITH BNKPATHS"));
        assert!(text.contains("# - test.bnk\n"));
    }

    #[test]
    fn test_fake_dupe_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let banks = sample_bank();
        let media = MediaIndex::new(&banks);
        let names = NameTable::new();
        let options = WriterOptions {
            outdir: dir.path().to_path_buf(),
            dupes: DupeMode::All,
            ..WriterOptions::default()
        };
        let mut writer = TxtpWriter::new(options, &media, &banks);

        let events = banks.get(0).unwrap().hirc_items();
        writer.write(&mut render(events[0], &names, 100, 0.0)).unwrap();
        writer.write(&mut render(events[0], &names, 100, 0.0)).unwrap();
        assert_eq!(writer.stats.duplicates, 0);

        writer.write(&mut render(events[1], &names, 100, 0.0)).unwrap();
        assert_eq!(writer.stats.duplicates, 1);
        assert!(dir.path().join("test-0001-event {d}.txtp").exists());
    }

    #[test]
    fn test_clean_name() {
        let banks = sample_bank();
        let media = MediaIndex::new(&banks);
        let mut writer = TxtpWriter::new(WriterOptions::default(), &media, &banks);
        assert_eq!(writer.clean_name("a:b*c"), "a_b_c.txtp");
        assert_eq!(writer.clean_name("A:B*C"), "A_B_C#dupe#002.txtp");
    }
}
