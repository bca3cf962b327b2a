//! Name database: reverses short ids into readable names
//!
//! Names only feed diagnostics and output filenames.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::model::{BankSet, NodeKind, NodeRef};
use crate::utils::hash_name;

/// Known names for an id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameRow {
    pub id: u32,
    pub hashname: Option<String>,
    pub guidname: Option<String>,
}

impl NameRow {
    /// Best name available, hashname first
    pub fn name(&self) -> Option<&str> {
        self.hashname.as_deref().or(self.guidname.as_deref())
    }
}

/// Lookup service for names
pub trait NameResolver {
    fn get_namerow(&self, id: u32) -> Option<&NameRow>;

    /// Name for an id, if known
    fn name_of(&self, id: u32) -> Option<&str> {
        self.get_namerow(id).and_then(NameRow::name)
    }
}

/// In-memory name table
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    rows: HashMap<u32, NameRow>,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '%'
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds a name under its FNV hash; the first name for an id is kept
    pub fn add_name(&mut self, name: &str) -> u32 {
        let id = hash_name(name);
        let row = self.rows.entry(id).or_insert_with(|| NameRow { id, ..NameRow::default() });
        if row.hashname.is_none() {
            row.hashname = Some(name.to_string());
        }
        id
    }

    pub fn add_guidname(&mut self, id: u32, name: &str) {
        let row = self.rows.entry(id).or_insert_with(|| NameRow { id, ..NameRow::default() });
        if row.guidname.is_none() {
            row.guidname = Some(name.to_string());
        }
    }

    /// Adds a name already resolved for an id
    pub fn add_hashname(&mut self, id: u32, name: &str) {
        let row = self.rows.entry(id).or_insert_with(|| NameRow { id, ..NameRow::default() });
        if row.hashname.is_none() {
            row.hashname = Some(name.to_string());
        }
    }

    /// Parses a name list: one or more names per line, `#` starts a comment
    ///
    /// Lines are split on non-name characters, so script lines like
    /// `PlayMusic( bgm_01 )` register `bgm_01` too.
    pub fn parse_list(&mut self, text: &str) -> usize {
        let mut added = 0;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            for elem in line.split(|c: char| !is_name_char(c)) {
                if elem.is_empty() || elem.starts_with(|c: char| c.is_ascii_digit()) || elem.len() > 100 {
                    continue;
                }
                if elem.contains('%') {
                    continue;
                }
                let before = self.rows.len();
                self.add_name(&elem.replace('-', "_"));
                if self.rows.len() > before {
                    added += 1;
                }
            }
        }
        added
    }

    /// Loads a name list file
    pub fn load_list<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let added = self.parse_list(&text);
        tracing::info!("Loaded {added} names from {}", path.as_ref().display());
        Ok(added)
    }

    /// Collects names already resolved in the dumps
    pub fn add_from_banks(&mut self, banks: &BankSet) {
        for bank in banks.iter() {
            self.add_from_node(bank.root());
        }
    }

    fn add_from_node(&mut self, node: NodeRef<'_>) {
        if node.kind() == NodeKind::Field && matches!(node.ty(), "sid" | "tid") {
            let id = node.uint();
            if let Some(name) = node.hashname() {
                self.add_hashname(id, name);
            }
            if let Some(name) = node.guidname() {
                self.add_guidname(id, name);
            }
        }
        for child in node.children() {
            self.add_from_node(child);
        }
    }
}

impl NameResolver for NameTable {
    fn get_namerow(&self, id: u32) -> Option<&NameRow> {
        self.rows.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BankBuilder, BankSet};

    #[test]
    fn test_parse_list() {
        let mut names = NameTable::new();
        let added = names.parse_list("# comment\nplay_music\nPlayMusic( bgm1 )\n1234\n");
        assert_eq!(added, 3);
        assert_eq!(names.name_of(2932040671), Some("play_music"));
        assert_eq!(names.name_of(1189781958), Some("bgm1"));
        assert!(names.get_namerow(1234).is_none());
    }

    #[test]
    fn test_names_from_banks() {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.list("listLoadedItem").object("CAkEvent").leaf({
            let mut node = crate::model::ModelNode::new(NodeKind::Field, "ulID");
            node.ty = "sid".to_string();
            node.value = crate::model::Value::Int(55);
            node.attrs.insert("hashname".to_string(), "Play_Thing".to_string());
            node
        });
        let banks = BankSet::new(vec![b.build()]);

        let mut names = NameTable::new();
        names.add_from_banks(&banks);
        assert_eq!(names.name_of(55), Some("Play_Thing"));
    }
}
