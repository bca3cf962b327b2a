use std::path::PathBuf;

use clap::Subcommand;

pub mod generate;
pub mod inspect;
pub mod params;

pub use generate::GenerateArgs;

#[derive(Subcommand)]
pub enum Commands {
    /// Write every playback path of the given bank dumps as TXTP files
    Generate(GenerateArgs),

    /// Show version, id, language and object counts of bank dumps
    Inspect {
        /// Dump files or folders with dumps (.xml)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Expand an operator params string into its combos
    Params {
        /// Params text, like "(bgm=m01) [music=a,b] / [music=c]"
        text: String,

        /// Parse as gamevars (`{rtpc=value}`) instead of gamesyncs
        #[arg(short, long)]
        gamevars: bool,
    },
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Generate(args) => generate::execute(args),
            Commands::Inspect { inputs } => inspect::execute(inputs),
            Commands::Params { text, gamevars } => params::execute(text, *gamevars),
        }
    }
}
