//! Playlist building and output
//!
//! The renderer walks objects and records what it finds through [`Txtp`],
//! a rough tree of groups and sounds. [`TxtpWriter`] then simplifies that
//! tree, prints it, checks for dupes and writes the final `.txtp` file.

pub mod info;
pub mod media;
pub mod namer;
pub mod printer;
pub mod simplify;
pub mod tree;
pub mod writer;

pub use info::TxtpInfo;
pub use media::MediaIndex;
pub use printer::{PrintFlags, Printer};
pub use simplify::{SelectKind, SimplifyOptions, TreeFlags, simplify};
pub use tree::{NodeConfig, NodeSound, NodeType, ROOT, TNodeId, TxtpTree};
pub use writer::{DupeMode, TxtpWriter, WriteStats, WriterOptions};

use crate::error::{Error, Result};
use crate::model::NodeRef;
use crate::names::NameResolver;

/// One playlist being rendered
pub struct Txtp<'a> {
    pub tree: TxtpTree,
    current: TNodeId,
    pub info: TxtpInfo<'a>,
    /// Object the playlist starts from, used for naming
    pub entry: NodeRef<'a>,
    /// Object that led to a transition segment, for naming
    pub ncaller: Option<NodeRef<'a>>,
    /// Trigger id and played segment, for stinger entries
    pub stinger: Option<(u32, NodeRef<'a>)>,
    pub transition: bool,
    pub unused: bool,
    /// Rendered with no states applied although some exist
    pub sc_default: bool,
}

impl<'a> Txtp<'a> {
    pub fn new(entry: NodeRef<'a>, names: &'a dyn NameResolver) -> Self {
        Self {
            tree: TxtpTree::new(),
            current: ROOT,
            info: TxtpInfo::new(names),
            entry,
            ncaller: None,
            stinger: None,
            transition: false,
            unused: false,
            sc_default: false,
        }
    }

    fn group_add(&mut self, ntype: NodeType, config: &NodeConfig) -> TNodeId {
        self.current = self.tree.add_group(self.current, ntype, config);
        self.current
    }

    /// Wraps one object, to hold its config
    pub fn group_single(&mut self, config: &NodeConfig) {
        self.group_add(NodeType::Single, config);
    }

    /// Wraps a segment played by a music playlist item
    pub fn group_single_transition(&mut self, config: &NodeConfig) {
        let id = self.group_add(NodeType::Single, config);
        self.tree.node_mut(id).transition = true;
    }

    /// Groups below skip empty lists, so callers must pass the same count
    /// to [`Txtp::group_done`]
    pub fn group_layer(&mut self, count: usize, config: &NodeConfig) -> bool {
        self.group_list(NodeType::Layer, count, config)
    }

    pub fn group_random_continuous(&mut self, count: usize, config: &NodeConfig) -> bool {
        self.group_list(NodeType::RandomContinuous, count, config)
    }

    pub fn group_random_step(&mut self, count: usize, config: &NodeConfig) -> bool {
        self.group_list(NodeType::RandomStep, count, config)
    }

    pub fn group_sequence_continuous(&mut self, count: usize, config: &NodeConfig) -> bool {
        self.group_list(NodeType::SequenceContinuous, count, config)
    }

    pub fn group_sequence_step(&mut self, count: usize, config: &NodeConfig) -> bool {
        self.group_list(NodeType::SequenceStep, count, config)
    }

    fn group_list(&mut self, ntype: NodeType, count: usize, config: &NodeConfig) -> bool {
        if count == 0 {
            return false;
        }
        self.group_add(ntype, config);
        true
    }

    /// Closes the current group; `Some(0)` matches a skipped list group
    pub fn group_done(&mut self, count: Option<usize>) -> Result<()> {
        if count == Some(0) {
            return Ok(());
        }
        let Some(parent) = self.tree.node(self.current).parent else {
            return Err(Error::UnbalancedTree(format!("group closed at root of {:?}", self.entry.sid())));
        };
        self.current = parent;
        Ok(())
    }

    pub fn source_sound(&mut self, sound: NodeSound, config: &NodeConfig) {
        self.tree.add_sound(self.current, sound, config);
    }

    /// Whether every group opened was closed
    pub fn is_balanced(&self) -> bool {
        self.current == ROOT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BankBuilder, BankSet};
    use crate::names::NameTable;

    fn sample_bank() -> BankSet {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.list("listLoadedItem");
        b.item("CAkEvent", 0).field("sid", "ulID", "10").close();
        b.close();
        BankSet::new(vec![b.build()])
    }

    #[test]
    fn test_groups_balance() {
        let banks = sample_bank();
        let names = NameTable::new();
        let entry = banks.get(0).unwrap().hirc_items()[0];
        let mut txtp = Txtp::new(entry, &names);

        let config = NodeConfig::default();
        txtp.group_single(&config);
        assert!(!txtp.group_layer(0, &config));
        txtp.group_done(Some(0)).unwrap();
        assert!(txtp.group_random_step(2, &config));
        txtp.source_sound(NodeSound::new(None), &config);
        txtp.source_sound(NodeSound::new(None), &config);
        txtp.group_done(Some(2)).unwrap();
        txtp.group_done(None).unwrap();

        assert!(txtp.is_balanced());
        assert_eq!(txtp.tree.live_count(), 4);
        assert!(matches!(txtp.group_done(None), Err(Error::UnbalancedTree(_))));
    }
}
