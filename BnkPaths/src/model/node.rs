//! Object model types: banks, nodes and borrowed node cursors

use indexmap::IndexMap;

/// Index of a node inside its bank's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Process-wide node identity: (bank slot, node index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub bank: usize,
    pub node: NodeId,
}

/// Element kind as found in the dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Object,
    List,
    Field,
    Error,
}

/// Scalar value of a field node
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Parses a dump value according to its field type
    pub fn parse(ty: &str, text: &str) -> Self {
        match ty {
            "f32" | "d64" => text.parse().map(Value::Float).unwrap_or(Value::Str(text.to_string())),
            "str" | "gap" | "" => Value::Str(text.to_string()),
            _ => text
                .parse::<i64>()
                .map(Value::Int)
                .or_else(|_| text.parse::<f64>().map(Value::Float))
                .unwrap_or_else(|_| Value::Str(text.to_string())),
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Int(v) => *v,
            Value::Float(v) => *v as i64,
            _ => 0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Int(v) => *v as f64,
            Value::Float(v) => *v,
            _ => 0.0,
        }
    }
}

/// One element of the bank tree
#[derive(Debug, Clone)]
pub struct ModelNode {
    pub kind: NodeKind,
    pub name: String,
    pub ty: String,
    pub value: Value,
    /// Remaining attributes (valuefmt, hashname, guidname, index...)
    pub attrs: IndexMap<String, String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl ModelNode {
    pub fn new(kind: NodeKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            ty: String::new(),
            value: Value::None,
            attrs: IndexMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// A loaded bank: a node arena rooted at index 0
#[derive(Debug, Clone)]
pub struct Bank {
    pub(crate) slot: usize,
    filename: String,
    path: String,
    version: u32,
    id: u32,
    nodes: Vec<ModelNode>,
}

impl Bank {
    /// Creates an empty bank with just its root node
    pub fn new(filename: &str, path: &str, version: u32) -> Self {
        let mut root = ModelNode::new(NodeKind::Root, "root");
        root.attrs.insert("filename".to_string(), filename.to_string());
        Self {
            slot: 0,
            filename: filename.to_string(),
            path: path.to_string(),
            version,
            id: 0,
            nodes: vec![root],
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bank name: filename without folders or extension
    pub fn bankname(&self) -> &str {
        let name = self.filename.rsplit(['/', '\\']).next().unwrap_or(&self.filename);
        name.rsplit_once('.').map_or(name, |(stem, _)| stem)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef { bank: self, id: NodeId(0) }
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { bank: self, id }
    }

    pub(crate) fn raw(&self, id: NodeId) -> &ModelNode {
        &self.nodes[id.index()]
    }

    /// Appends a node under `parent`, returning its id
    pub fn push(&mut self, parent: NodeId, mut node: ModelNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Reads the bank id from the header once the tree is complete
    pub(crate) fn finish(&mut self) {
        let id = self
            .root()
            .find1("BankHeader")
            .and_then(|header| header.find1("dwSoundBankID"))
            .map(|field| field.uint());
        self.id = id.unwrap_or(0);
    }

    /// Language id from the bank header, if present
    pub fn language_id(&self) -> Option<u32> {
        self.root()
            .find1("BankHeader")
            .and_then(|header| header.find1("dwLanguageID"))
            .map(|field| field.uint())
    }

    /// All HIRC objects, in bank order
    pub fn hirc_items(&self) -> Vec<NodeRef<'_>> {
        self.root()
            .find1("listLoadedItem")
            .map(|list| list.children().filter(|n| n.kind() == NodeKind::Object).collect())
            .unwrap_or_default()
    }
}

/// Cheap cursor over a node of a bank
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    pub(crate) bank: &'a Bank,
    pub(crate) id: NodeId,
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]#{}", self.name(), self.bank.filename, self.id.0)
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for NodeRef<'_> {}

impl<'a> NodeRef<'a> {
    fn raw(&self) -> &'a ModelNode {
        self.bank.raw(self.id)
    }

    pub fn key(&self) -> NodeKey {
        NodeKey { bank: self.bank.slot, node: self.id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn bank(&self) -> &'a Bank {
        self.bank
    }

    pub fn kind(&self) -> NodeKind {
        self.raw().kind
    }

    pub fn name(&self) -> &'a str {
        &self.raw().name
    }

    pub fn ty(&self) -> &'a str {
        &self.raw().ty
    }

    pub fn value(&self) -> &'a Value {
        &self.raw().value
    }

    pub fn int(&self) -> i64 {
        self.raw().value.as_i64()
    }

    /// Value as a 32-bit id (dumps print 0xFFFFFFFF as -1)
    pub fn uint(&self) -> u32 {
        self.raw().value.as_i64() as u32
    }

    pub fn float(&self) -> f64 {
        self.raw().value.as_f64()
    }

    pub fn attr(&self, key: &str) -> Option<&'a str> {
        self.raw().attrs.get(key).map(String::as_str)
    }

    pub fn attrs(&self) -> &'a IndexMap<String, String> {
        &self.raw().attrs
    }

    pub fn valuefmt(&self) -> &'a str {
        self.attr("valuefmt").unwrap_or("")
    }

    pub fn hashname(&self) -> Option<&'a str> {
        self.attr("hashname")
    }

    pub fn guidname(&self) -> Option<&'a str> {
        self.attr("guidname")
    }

    /// Position of an object inside its list
    pub fn index(&self) -> Option<usize> {
        self.attr("index").and_then(|v| v.parse().ok())
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.raw().parent.map(|id| NodeRef { bank: self.bank, id })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let bank = self.bank;
        self.raw().children.iter().map(move |&id| NodeRef { bank, id })
    }

    pub fn has_children(&self) -> bool {
        !self.raw().children.is_empty()
    }

    pub(crate) fn child_ids(&self) -> &'a [NodeId] {
        &self.raw().children
    }
}

/// All banks loaded for one run, indexed by slot
#[derive(Debug, Default)]
pub struct BankSet {
    banks: Vec<Bank>,
}

impl BankSet {
    pub fn new(banks: Vec<Bank>) -> Self {
        let mut set = Self::default();
        for bank in banks {
            set.push(bank);
        }
        set
    }

    pub fn push(&mut self, mut bank: Bank) {
        bank.slot = self.banks.len();
        self.banks.push(bank);
    }

    pub fn get(&self, slot: usize) -> Option<&Bank> {
        self.banks.get(slot)
    }

    pub fn node(&self, key: NodeKey) -> Option<NodeRef<'_>> {
        self.banks.get(key.bank).map(|bank| bank.node(key.node))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bank> {
        self.banks.iter()
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    /// Whether a bank with this id is loaded
    pub fn has_bank_id(&self, id: u32) -> bool {
        self.banks.iter().any(|b| b.id() == id)
    }
}
