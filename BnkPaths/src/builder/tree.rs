//! Decision trees: gamesync-keyed lookup used by dialogue events and newer
//! music switches

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::model::NodeRef;
use crate::registry::{Gamesync, GamesyncParams, GsType};

/// One tree level: which gamesync group it switches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeArg {
    pub gtype: GsType,
    pub group: u32,
}

#[derive(Debug, Clone, PartialEq)]
enum Branch {
    Leaf(u32),
    Sub(IndexMap<u32, Branch>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionTree {
    pub args: Vec<TreeArg>,
    root: IndexMap<u32, Branch>,
    /// Every leaf with the gamesyncs leading to it
    pub paths: Vec<(Vec<Gamesync>, u32)>,
    /// Target of a tree with a single node and no branches
    pub ntid: Option<u32>,
}

impl DecisionTree {
    /// Reads the `AkDecisionTree` of `node`, if any
    pub fn parse(node: NodeRef<'_>, sid: u32) -> Result<Option<Self>> {
        let Some(ntree) = node.find1("AkDecisionTree") else {
            return Ok(None);
        };
        let kind = node.name();

        let depth = node.uint_of("uTreeDepth").unwrap_or(0) as usize;
        let nargs = node.finds("AkGameSync");
        if depth != nargs.len() {
            return Err(Error::hard(sid, kind, "tree depth and args don't match"));
        }

        let mut tree = Self::default();
        for narg in nargs {
            // older dialogue events have no type and always use states
            let gtype = narg.uint_of("eGroupType").map_or(GsType::State, GsType::from_value);
            let group = narg.uint_of("ulGroup").unwrap_or(0);
            tree.args.push(TreeArg { gtype, group });
        }

        let root_node = ntree.find1("pNodes").and_then(|n| n.find1("Node"));
        let Some(root_node) = root_node else {
            return Ok(Some(tree));
        };

        match root_node.find1("pNodes") {
            Some(npnodes) => {
                let mut path = Vec::new();
                let mut root = IndexMap::new();
                tree.build_level(&mut root, 0, npnodes, &mut path, sid, kind)?;
                tree.root = root;
            }
            None => tree.ntid = root_node.uint_of("audioNodeId"),
        }
        Ok(Some(tree))
    }

    fn build_level(
        &mut self,
        level: &mut IndexMap<u32, Branch>,
        depth: usize,
        npnodes: NodeRef<'_>,
        path: &mut Vec<Gamesync>,
        sid: u32,
        kind: &str,
    ) -> Result<()> {
        let Some(&arg) = self.args.get(depth) else {
            return Err(Error::hard(sid, kind, "wrong tree depth"));
        };

        for nnode in npnodes.children() {
            let key = nnode.uint_of("key").unwrap_or(0);
            path.truncate(depth);
            path.push(Gamesync::new(arg.gtype, arg.group, key));

            match nnode.find1("pNodes") {
                None => {
                    let ntid = nnode.uint_of("audioNodeId").unwrap_or(0);
                    level.insert(key, Branch::Leaf(ntid));
                    self.paths.push((path.clone(), ntid));
                }
                Some(sub) => {
                    let mut subtree = IndexMap::new();
                    self.build_level(&mut subtree, depth + 1, sub, path, sid, kind)?;
                    level.insert(key, Branch::Sub(subtree));
                }
            }
        }
        path.truncate(depth);
        Ok(())
    }

    /// Best match for the current params: exact value first, then `0` (any)
    /// at each level. Returns the matched path and its leaf target.
    pub fn get_npath(&self, params: &GamesyncParams) -> Option<(Vec<Gamesync>, u32)> {
        let mut npath = Vec::new();
        let leaf = self.match_level(params, &self.root, 0, &mut npath)?;
        Some((npath, leaf))
    }

    fn match_level(&self, params: &GamesyncParams, level: &IndexMap<u32, Branch>, depth: usize, npath: &mut Vec<Gamesync>) -> Option<u32> {
        if level.is_empty() {
            return None;
        }
        let arg = self.args.get(depth)?;
        let value = params.current(arg.gtype, arg.group)?;

        for key in [value, 0] {
            let Some(branch) = level.get(&key) else {
                continue;
            };
            npath.truncate(depth);
            npath.push(Gamesync::new(arg.gtype, arg.group, key));
            match branch {
                Branch::Leaf(ntid) => return Some(*ntid),
                Branch::Sub(sub) => {
                    if let Some(leaf) = self.match_level(params, sub, depth + 1, npath) {
                        return Some(leaf);
                    }
                }
            }
            if key == 0 {
                break;
            }
        }
        npath.truncate(depth);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BankBuilder;

    /// Two levels: state 10 (values 1, 0) then switch 20 (values 5, 0)
    fn sample_tree() -> crate::model::Bank {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.object("CAkDialogueEvent").field("sid", "ulID", "300").field("u32", "uTreeDepth", "2");
        b.list("Arguments");
        b.object("AkGameSync").field("tid", "ulGroup", "10").field("u8", "eGroupType", "1").close();
        b.object("AkGameSync").field("tid", "ulGroup", "20").field("u8", "eGroupType", "0").close();
        b.close();
        b.object("AkDecisionTree").list("pNodes").object("Node").list("pNodes");
        for (key, leaves) in [("1", [("5", "1001"), ("0", "1002")]), ("0", [("5", "1003"), ("0", "1004")])] {
            b.object("Node").field("tid", "key", key).list("pNodes");
            for (subkey, ntid) in leaves {
                b.object("Node").field("tid", "key", subkey).field("tid", "audioNodeId", ntid).close();
            }
            b.close().close();
        }
        b.close().close().close().close();
        b.close();
        b.build()
    }

    #[test]
    fn test_tree_paths() {
        let bank = sample_tree();
        let node = bank.root().find1("CAkDialogueEvent").unwrap();
        let tree = DecisionTree::parse(node, 300).unwrap().unwrap();
        assert_eq!(tree.args.len(), 2);
        assert_eq!(tree.paths.len(), 4);
        assert_eq!(
            tree.paths[0].0,
            vec![Gamesync::new(GsType::State, 10, 1), Gamesync::new(GsType::Switch, 20, 5)]
        );
        assert_eq!(tree.paths[0].1, 1001);
    }

    #[test]
    fn test_best_match() {
        let bank = sample_tree();
        let node = bank.root().find1("CAkDialogueEvent").unwrap();
        let tree = DecisionTree::parse(node, 300).unwrap().unwrap();

        let mut params = GamesyncParams::new();
        params.add(GsType::State, 10, 1);
        params.add(GsType::Switch, 20, 7);
        let (npath, leaf) = tree.get_npath(&params).unwrap();
        assert_eq!(leaf, 1002);
        assert_eq!(npath[1].value, 0);

        let mut params = GamesyncParams::new();
        params.add(GsType::State, 10, 3);
        params.add(GsType::Switch, 20, 5);
        assert_eq!(tree.get_npath(&params).unwrap().1, 1003);

        // group not set at all: no match
        assert!(tree.get_npath(&GamesyncParams::new()).is_none());
    }
}
