//! Path registries: gamesyncs, state chunks and gamevars found or given
//! for an entry, plus stingers and transitions left to render afterwards

pub mod gamesync;
pub mod gamevars;
pub mod params;
pub mod statechunks;
pub mod stingers;
pub mod transitions;

pub use gamesync::{GamesyncParams, GamesyncPaths};
pub use gamevars::{GamevarItem, GamevarValue, GamevarsParams, GamevarsPaths};
pub use params::{Gamesync, GsType, ParamItem, Params, product};
pub use statechunks::{StateChunkParams, StateChunkPaths, StateItem};
pub use stingers::{StingerRef, Stingers};
pub use transitions::{TransitionRef, Transitions};
