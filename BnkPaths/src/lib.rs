//! # BnkPaths
//!
//! A pure-Rust library for expanding Wwise SoundBanks into every playback
//! path they can take, written as TXTP playlists.
//!
//! ## What It Does
//!
//! - **Bank dumps** - Loads XML dumps of `.bnk` files into a searchable object model
//! - **Builder** - Rebuilds HIRC objects (events, containers, music) into typed nodes
//! - **Properties** - Resolves volumes, delays and loops through parents, buses, states and RTPCs
//! - **Path expansion** - Finds every switch, state and gamevar combo an event can play
//! - **TXTP output** - Simplifies each playlist tree and writes it with a descriptive name
//!
//! ## Quick Start
//!
//! ```no_run
//! use bnkpaths::generator::{Generator, GeneratorConfig};
//!
//! let config = GeneratorConfig {
//!     outdir: "txtp".into(),
//!     generate_unused: true,
//!     ..GeneratorConfig::default()
//! };
//! let report = Generator::new(config).run(&["dumps/"])?;
//! println!("Created {} files", report.outputs.created);
//! # Ok::<(), bnkpaths::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```
//! use bnkpaths::prelude::*;
//!
//! // Now you have access to:
//! // - Generator, GeneratorConfig, Report
//! // - BankSet, NodeRef, NameTable
//! // - Builder, Renderer, Filter, Params
//! // - Error, Result, and more
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `bnkpaths` command-line binary

pub mod builder;
pub mod error;
pub mod generator;
pub mod model;
pub mod names;
pub mod props;
pub mod registry;
pub mod render;
pub mod txtp;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};

    pub use crate::builder::{BKind, BNode, BuildDiagnostics, Builder, IdType};
    pub use crate::generator::{Generator, GeneratorConfig, Report};
    pub use crate::model::{Bank, BankBuilder, BankSet, NodeRef, load_dump, load_dumps};
    pub use crate::names::{NameResolver, NameTable};
    pub use crate::props::PropertyCalculator;
    pub use crate::registry::{GamesyncPaths, GamevarsPaths, Params, StateChunkPaths};
    pub use crate::render::{Filter, RenderOptions, Renderer};
    pub use crate::txtp::{DupeMode, TxtpWriter, WriterOptions};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
