//! Incremental bank tree builder, used by the dump loader and tests

use super::node::{Bank, ModelNode, NodeId, NodeKind, Value};

/// Builds a [`Bank`] tree with open/close calls
///
/// ```
/// use bnkpaths::model::BankBuilder;
///
/// let mut b = BankBuilder::new("init.bnk", 140);
/// b.object("BankHeader").field("u32", "dwSoundBankID", "1355168291").close();
/// let bank = b.build();
/// assert_eq!(bank.id(), 1355168291);
/// ```
pub struct BankBuilder {
    bank: Bank,
    stack: Vec<NodeId>,
}

impl BankBuilder {
    pub fn new(filename: &str, version: u32) -> Self {
        Self::with_path(filename, "", version)
    }

    pub fn with_path(filename: &str, path: &str, version: u32) -> Self {
        Self {
            bank: Bank::new(filename, path, version),
            stack: vec![NodeId(0)],
        }
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(NodeId(0))
    }

    /// Depth of open elements, not counting the root
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Adds a node under the current one and makes it current
    pub fn open(&mut self, node: ModelNode) -> &mut Self {
        let id = self.bank.push(self.current(), node);
        self.stack.push(id);
        self
    }

    /// Adds a node under the current one without descending
    pub fn leaf(&mut self, node: ModelNode) -> &mut Self {
        self.bank.push(self.current(), node);
        self
    }

    pub fn close(&mut self) -> &mut Self {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self
    }

    pub fn object(&mut self, name: &str) -> &mut Self {
        self.open(ModelNode::new(NodeKind::Object, name))
    }

    /// Object with a list index
    pub fn item(&mut self, name: &str, index: usize) -> &mut Self {
        let mut node = ModelNode::new(NodeKind::Object, name);
        node.attrs.insert("index".to_string(), index.to_string());
        self.open(node)
    }

    pub fn list(&mut self, name: &str) -> &mut Self {
        self.open(ModelNode::new(NodeKind::List, name))
    }

    pub fn field(&mut self, ty: &str, name: &str, value: &str) -> &mut Self {
        self.leaf(field_node(ty, name, value, None))
    }

    /// Field with a formatted value, as used by enums and property ids
    pub fn field_fmt(&mut self, ty: &str, name: &str, value: &str, valuefmt: &str) -> &mut Self {
        self.leaf(field_node(ty, name, value, Some(valuefmt)))
    }

    /// Field that holds sub-fields (bitflags)
    pub fn open_field(&mut self, ty: &str, name: &str, value: &str) -> &mut Self {
        self.open(field_node(ty, name, value, None))
    }

    pub fn build(mut self) -> Bank {
        self.bank.finish();
        self.bank
    }
}

fn field_node(ty: &str, name: &str, value: &str, valuefmt: Option<&str>) -> ModelNode {
    let mut node = ModelNode::new(NodeKind::Field, name);
    node.ty = ty.to_string();
    node.value = Value::parse(ty, value);
    if let Some(fmt) = valuefmt {
        node.attrs.insert("valuefmt".to_string(), fmt.to_string());
    }
    node
}
