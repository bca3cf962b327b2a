//! CLI command for TXTP generation

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use clap::Args;

use crate::cli::progress::{DISK, GEAR, LOOKING_GLASS, print_done, print_step, simple_bar};
use crate::generator::{Generator, GeneratorConfig};
use crate::model::load_dumps;
use crate::txtp::DupeMode;
use crate::utils::find_dump_files;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Dump files or folders with dumps (.xml)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// JSON config file; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Only banks of this language (SFX banks are always used)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Name lists (one name per line) to reverse ids
    #[arg(short, long)]
    pub names: Vec<PathBuf>,

    /// Filter items: ids, names, classes, banks, bank-index; `-` excludes,
    /// `@` applies to inner objects, `~` to unused ones
    #[arg(short, long, allow_hyphen_values = true)]
    pub filter: Vec<String>,

    /// Also generate entries the filter doesn't select
    #[arg(long)]
    pub filter_rest: bool,

    /// Don't write normal entries
    #[arg(long)]
    pub filter_normal: bool,

    /// Don't write unused objects
    #[arg(long)]
    pub filter_unused: bool,

    /// Master volume in dB
    #[arg(long, allow_hyphen_values = true)]
    pub volume: Option<f64>,

    /// How repeated playlists are handled
    #[arg(short, long, value_enum)]
    pub dupes: Option<DupeMode>,

    /// Fixed gamesyncs and states, like "(state=a) [switch=b] / [switch=c]"
    #[arg(short, long)]
    pub params: Option<String>,

    /// Fixed gamevars, like "{rtpc=50}"
    #[arg(short, long)]
    pub gamevars: Option<String>,

    /// Keep gamesync branches that contradict an outer one
    #[arg(long)]
    pub no_prefilter: bool,

    /// Skip unreachable gamesync paths
    #[arg(long)]
    pub no_unreachables: bool,

    /// Also generate objects no entry reaches
    #[arg(short, long)]
    pub unused: bool,

    /// Write entries in bank order instead of by name
    #[arg(long)]
    pub bank_order: bool,

    /// Keep initial delays
    #[arg(long)]
    pub write_delays: bool,

    /// Make every random group selectable
    #[arg(long)]
    pub random_all: bool,

    /// Make random groups selectable even when nested
    #[arg(long)]
    pub random_multi: bool,

    /// Write one file per random group value
    #[arg(long)]
    pub random_force: bool,

    /// Silence every crossfaded sound
    #[arg(long)]
    pub silence: bool,

    /// Mark files using in-bank media with {b}
    #[arg(long)]
    pub bnkmark: bool,

    /// Use codec extensions (.logg, .lwav) for old banks
    #[arg(long)]
    pub alt_exts: bool,

    /// Write the run report as JSON
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Suppress progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl GenerateArgs {
    /// Config file (or defaults) with flags applied on top
    fn to_config(&self) -> anyhow::Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::load(path)?,
            None => GeneratorConfig::default(),
        };

        if let Some(outdir) = &self.outdir {
            config.outdir.clone_from(outdir);
        }
        if self.language.is_some() {
            config.language.clone_from(&self.language);
        }
        config.names.extend(self.names.iter().cloned());
        config.filter.extend(self.filter.iter().cloned());
        if let Some(volume) = self.volume {
            config.master_volume = volume;
        }
        if let Some(dupes) = self.dupes {
            config.dupes = dupes;
        }
        if self.params.is_some() {
            config.params.clone_from(&self.params);
        }
        if self.gamevars.is_some() {
            config.gamevars.clone_from(&self.gamevars);
        }

        config.filter_rest |= self.filter_rest;
        config.filter_normal |= self.filter_normal;
        config.filter_unused |= self.filter_unused;
        config.prefilter &= !self.no_prefilter;
        config.unreachables &= !self.no_unreachables;
        config.generate_unused |= self.unused;
        config.bank_order |= self.bank_order;
        config.write_delays |= self.write_delays;
        config.random_all |= self.random_all;
        config.random_multi |= self.random_multi;
        config.random_force |= self.random_force;
        config.silence |= self.silence;
        config.bnkmark |= self.bnkmark;
        config.alt_exts |= self.alt_exts;
        Ok(config)
    }
}

pub fn execute(args: &GenerateArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = args.to_config()?;

    print_step(1, 3, LOOKING_GLASS, "Finding bank dumps...");
    let paths = find_dump_files(&args.inputs);
    if paths.is_empty() {
        anyhow::bail!("no dumps found in {:?}", args.inputs);
    }

    print_step(2, 3, GEAR, &format!("Loading {} dump(s)...", paths.len()));
    let loaded = if args.quiet {
        load_dumps(&paths, |_, _, _| {})
    } else {
        let pb = simple_bar(paths.len() as u64, "Loading");
        let count = AtomicUsize::new(0);
        let loaded = load_dumps(&paths, |_, _, path| {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            pb.set_position(n as u64);
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                pb.set_message(name.to_string());
            }
        });
        pb.finish_with_message("done");
        loaded
    };

    print_step(3, 3, DISK, &format!("Writing TXTP to {}...", config.outdir.display()));
    let generator = Generator::new(config);
    let mut report = generator.generate(&loaded.banks)?;
    report.banks_failed = loaded.failed;

    report.log_summary();
    if let Some(path) = &args.report {
        report.save(path)?;
        println!("Report written to {}", path.display());
    }

    print_done(start.elapsed());
    Ok(())
}
