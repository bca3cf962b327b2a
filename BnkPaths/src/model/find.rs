//! Node searches
//!
//! Searches never match the starting node. Each level is checked fully
//! before descending, then children are searched one subtree at a time:
//! for `A > [B > [C > D, E > F], G]` the order is `B G C E D F`.

use super::node::{Bank, NodeId, NodeKind, NodeRef};
use crate::error::{Error, Result};

/// What a search matches against
#[derive(Debug, Clone, Copy)]
pub enum Query<'q> {
    /// The node's `name` attribute
    Name(&'q str),
    /// The field's `type` attribute
    Type(&'q str),
}

impl Query<'_> {
    fn matches(&self, bank: &Bank, id: NodeId) -> bool {
        let node = bank.raw(id);
        match self {
            Query::Name(name) => node.kind != NodeKind::Root && node.name == *name,
            Query::Type(ty) => node.kind == NodeKind::Field && node.ty == *ty,
        }
    }

    fn text(&self) -> &str {
        match self {
            Query::Name(v) | Query::Type(v) => v,
        }
    }
}

fn search(bank: &Bank, ids: &[NodeId], query: Query<'_>, first: bool, out: &mut Vec<NodeId>) -> bool {
    for &id in ids {
        if query.matches(bank, id) {
            out.push(id);
            if first {
                return true;
            }
        }
    }

    for &id in ids {
        if search(bank, &bank.raw(id).children, query, first, out) {
            return true;
        }
    }
    false
}

impl<'a> NodeRef<'a> {
    /// All matches, in search order
    pub fn query(&self, query: Query<'_>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        search(self.bank, self.child_ids(), query, false, &mut out);
        out.into_iter().map(|id| self.bank.node(id)).collect()
    }

    /// First match, if any
    pub fn query1(&self, query: Query<'_>) -> Option<NodeRef<'a>> {
        let mut out = Vec::new();
        search(self.bank, self.child_ids(), query, true, &mut out);
        out.first().map(|&id| self.bank.node(id))
    }

    /// Single match; more than one is an error
    pub fn find(&self, name: &str) -> Result<Option<NodeRef<'a>>> {
        let query = Query::Name(name);
        let mut found = self.query(query);
        if found.len() > 1 {
            return Err(Error::AmbiguousField {
                query: query.text().to_string(),
                parent: self.name().to_string(),
            });
        }
        Ok(found.pop())
    }

    pub fn find1(&self, name: &str) -> Option<NodeRef<'a>> {
        self.query1(Query::Name(name))
    }

    pub fn find1_type(&self, ty: &str) -> Option<NodeRef<'a>> {
        self.query1(Query::Type(ty))
    }

    pub fn finds(&self, name: &str) -> Vec<NodeRef<'a>> {
        self.query(Query::Name(name))
    }

    pub fn finds_type(&self, ty: &str) -> Vec<NodeRef<'a>> {
        self.query(Query::Type(ty))
    }

    /// First of several names that exists
    pub fn find1_any(&self, names: &[&str]) -> Option<NodeRef<'a>> {
        names.iter().find_map(|name| self.find1(name))
    }

    /// Shortcut for a field's unsigned value
    pub fn uint_of(&self, name: &str) -> Option<u32> {
        self.find1(name).map(|n| n.uint())
    }

    /// Shortcut for a field's signed value
    pub fn int_of(&self, name: &str) -> Option<i64> {
        self.find1(name).map(|n| n.int())
    }

    /// Shortcut for a field's float value
    pub fn float_of(&self, name: &str) -> Option<f64> {
        self.find1(name).map(|n| n.float())
    }

    /// Own short id of an object
    pub fn sid(&self) -> Option<u32> {
        self.find1_type("sid").map(|n| n.uint())
    }
}
