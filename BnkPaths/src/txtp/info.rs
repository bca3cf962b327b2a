//! Path info: what was visited to build a playlist
//!
//! Every rendered object leaves an entry here, indented by depth. The
//! entries end up as the comment trailer and feed the gamesync, state and
//! gamevar parts of the output name.

use crate::model::NodeRef;
use crate::names::NameResolver;
use crate::registry::{Gamesync, GamevarItem, GamevarValue, GsType, StateItem};

use super::printer::format_float;

#[derive(Debug, Clone)]
struct InfoNode<'a> {
    depth: usize,
    node: Option<NodeRef<'a>>,
    /// Media id, for source entries
    source: Option<u32>,
    gstext_long: String,
    gstext_short: String,
}

pub struct TxtpInfo<'a> {
    names: &'a dyn NameResolver,
    depth: usize,
    nodes: Vec<InfoNode<'a>>,
    /// Entries that set gamesyncs
    gs_indexes: Vec<usize>,
    scitems: Vec<StateItem>,
    gvitems: Vec<GamevarItem>,
}

impl<'a> TxtpInfo<'a> {
    pub fn new(names: &'a dyn NameResolver) -> Self {
        Self {
            names,
            depth: 0,
            nodes: Vec::new(),
            gs_indexes: Vec::new(),
            scitems: Vec::new(),
            gvitems: Vec::new(),
        }
    }

    pub fn names(&self) -> &'a dyn NameResolver {
        self.names
    }

    pub fn next(&mut self, node: NodeRef<'a>) {
        self.depth += 1;
        self.nodes.push(InfoNode {
            depth: self.depth,
            node: Some(node),
            source: None,
            gstext_long: String::new(),
            gstext_short: String::new(),
        });
    }

    pub fn done(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn source(&mut self, tid: u32) {
        self.nodes.push(InfoNode {
            depth: self.depth + 1,
            node: None,
            source: Some(tid),
            gstext_long: String::new(),
            gstext_short: String::new(),
        });
    }

    fn name_or_id(&self, id: u32) -> String {
        self.names.name_of(id).map_or_else(|| id.to_string(), str::to_string)
    }

    /// Marks the current entry with the gamesyncs that selected it
    pub fn gamesyncs(&mut self, gamesyncs: &[Gamesync]) {
        let mut long = String::new();
        let mut short = String::new();
        for gs in gamesyncs {
            let name = self.name_or_id(gs.group);
            let value = if gs.value == 0 { "-".to_string() } else { self.name_or_id(gs.value) };
            let text = match gs.gtype {
                GsType::State => format!("({name}={value})"),
                _ => format!("[{name}={value}]"),
            };
            // "any" values only go in the long form
            if value != "-" {
                short.push_str(&text);
            }
            long.push_str(&text);
        }

        let Some(current) = self.nodes.last_mut() else {
            return;
        };
        current.gstext_long.push_str(&long);
        current.gstext_short.push_str(&short);
        let index = self.nodes.len() - 1;
        if !self.gs_indexes.contains(&index) {
            self.gs_indexes.push(index);
        }
    }

    pub fn statechunks(&mut self, states: &[StateItem]) {
        for state in states {
            let seen = self.scitems.iter().any(|s| s.group == state.group && s.value == state.value);
            if !seen {
                self.scitems.push(*state);
            }
        }
    }

    pub fn gamevars(&mut self, gamevars: &[GamevarItem]) {
        for gamevar in gamevars {
            if !self.gvitems.iter().any(|g| g.key == gamevar.key) {
                self.gvitems.push(gamevar.clone());
            }
        }
    }

    /// Whether some source sits below an entry
    fn has_source(&self, index: usize) -> bool {
        let depth = self.nodes[index].depth;
        self.nodes[index + 1..]
            .iter()
            .take_while(|n| n.depth > depth)
            .any(|n| n.source.is_some())
    }

    /// Gamesyncs of entries that lead to some sound, each with a leading space
    pub fn gsnames(&self, long: bool) -> String {
        let mut out = String::new();
        for &index in &self.gs_indexes {
            if !self.has_source(index) {
                continue;
            }
            let node = &self.nodes[index];
            let text = if long { &node.gstext_long } else { &node.gstext_short };
            if !text.is_empty() {
                out.push(' ');
                out.push_str(text);
            }
        }
        out
    }

    /// `{group=value}` per applied state, `~` first when any is unreachable
    pub fn scnames(&self) -> String {
        let mut out = String::new();
        for state in &self.scitems {
            out.push_str(&format!("{{{}={}}}", self.name_or_id(state.group), self.name_or_id(state.value)));
        }
        if self.scitems.iter().any(|s| s.unreachable) {
            out.insert(0, '~');
        }
        out
    }

    pub fn gvnames(&self) -> String {
        let mut out = String::new();
        for gamevar in &self.gvitems {
            let name = gamevar.keyname.clone().unwrap_or_else(|| self.name_or_id(gamevar.key));
            let value = match gamevar.value {
                GamevarValue::Min => "min".to_string(),
                GamevarValue::Max => "max".to_string(),
                GamevarValue::Unset => "-".to_string(),
                GamevarValue::Value(value) => format_float(value),
            };
            out.push_str(&format!("{{{name}={value}}}"));
        }
        out
    }

    /// Filenames of the banks visited, in visit order
    pub fn banks(&self) -> Vec<&'a str> {
        let mut banks = Vec::new();
        for node in self.nodes.iter().filter_map(|n| n.node) {
            let filename = node.bank().filename();
            if !banks.contains(&filename) {
                banks.push(filename);
            }
        }
        banks
    }

    /// `# PATH` section of the trailer
    pub fn tree_lines(&self) -> String {
        let multibank = self.banks().len() > 1;
        let mut out = String::from("# PATH\n");
        for node in &self.nodes {
            out.push_str(&self.node_lines(node, multibank));
        }
        out
    }

    fn node_lines(&self, info: &InfoNode<'a>, multibank: bool) -> String {
        let pad = " ".repeat(info.depth * 2 + 1);
        let mut out = String::new();

        if let Some(node) = info.node {
            let mut line = node.name().to_string();
            if let Some(index) = node.index() {
                line.push_str(&format!("[{index}]"));
            }
            let sid = node.sid();
            if let Some(sid) = sid {
                line.push_str(&format!(" {sid}"));
            }
            if multibank {
                line.push_str(&format!(" / {}", node.bank().filename()));
            }
            out.push_str(&format!("#{pad}{line}\n"));
            if let Some(row) = sid.and_then(|sid| self.names.get_namerow(sid)) {
                out.push_str(&row_lines(&pad, row));
            }
        }

        if !info.gstext_long.is_empty() {
            out.push_str(&format!("#{pad}~ {}\n", info.gstext_long));
        }

        if let Some(tid) = info.source {
            out.push_str(&format!("#{pad}Source {tid}\n"));
            if let Some(row) = self.names.get_namerow(tid) {
                out.push_str(&row_lines(&pad, row));
            }
        }

        out.push_str("#\n");
        out
    }
}

fn row_lines(pad: &str, row: &crate::names::NameRow) -> String {
    let mut out = String::new();
    if let Some(name) = &row.hashname {
        out.push_str(&format!("#{pad}- hashname: {name}\n"));
    }
    if let Some(name) = &row.guidname {
        out.push_str(&format!("#{pad}- guidname: {name}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BankBuilder, BankSet};
    use crate::names::NameTable;

    fn sample_bank() -> BankSet {
        let mut b = BankBuilder::new("music.bnk", 134);
        b.list("listLoadedItem");
        b.item("CAkEvent", 0).field("sid", "ulID", "10").close();
        b.item("CAkSwitchCntr", 1).field("sid", "ulID", "20").close();
        b.close();
        BankSet::new(vec![b.build()])
    }

    #[test]
    fn test_gamesync_names() {
        let banks = sample_bank();
        let mut names = NameTable::new();
        let group = names.add_name("music");
        let value = names.add_name("bgm1");
        let event = banks.get(0).unwrap().hirc_items()[0];
        let switch = banks.get(0).unwrap().hirc_items()[1];

        let mut info = TxtpInfo::new(&names);
        info.next(event);
        info.next(switch);
        info.gamesyncs(&[Gamesync::new(GsType::Switch, group, value), Gamesync::new(GsType::State, 99, 0)]);
        info.source(123);
        info.done();
        info.done();

        assert_eq!(info.gsnames(false), " [music=bgm1]");
        assert_eq!(info.gsnames(true), " [music=bgm1](99=-)");
        assert_eq!(info.banks(), vec!["music.bnk"]);

        let lines = info.tree_lines();
        assert!(lines.starts_with("# PATH\n#   CAkEvent[0] 10\n#\n"));
        assert!(lines.contains("#     CAkSwitchCntr[1] 20\n#     ~ [music=bgm1](99=-)\n"));
        assert!(lines.contains("#       Source 123\n"));
    }

    #[test]
    fn test_gamesyncs_without_source_are_skipped() {
        let banks = sample_bank();
        let names = NameTable::new();
        let switch = banks.get(0).unwrap().hirc_items()[1];

        let mut info = TxtpInfo::new(&names);
        info.next(switch);
        info.gamesyncs(&[Gamesync::new(GsType::Switch, 1, 2)]);
        info.done();
        assert_eq!(info.gsnames(true), "");
    }

    #[test]
    fn test_state_and_gamevar_names() {
        let mut names = NameTable::new();
        let group = names.add_name("mood");
        let mut info = TxtpInfo::new(&names);

        let mut state = StateItem::new(group, 5, 0);
        info.statechunks(&[state, state]);
        assert_eq!(info.scnames(), "{mood=5}");
        state.value = 6;
        state.unreachable = true;
        info.statechunks(&[state]);
        assert_eq!(info.scnames(), "~{mood=5}{mood=6}");

        let gamevar = GamevarItem::parse("distance", "10").unwrap();
        info.gamevars(&[gamevar.clone(), gamevar]);
        assert_eq!(info.gvnames(), "{distance=10.0}");
    }
}
