//! Bank object model
//!
//! A read-only tree view over a decoded bank, materialized from XML dumps.

pub mod build;
pub mod find;
pub mod node;
pub mod xml;

pub use build::BankBuilder;
pub use find::Query;
pub use node::{Bank, BankSet, ModelNode, NodeId, NodeKey, NodeKind, NodeRef, Value};
pub use xml::{LoadResult, load_dump, load_dumps, parse_dump};
