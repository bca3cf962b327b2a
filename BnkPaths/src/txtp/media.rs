//! In-bank media lookup
//!
//! Memory sources are stored in some bank's data index. The same media id
//! may live in several banks, so lookups try the source's own bank first.

use std::collections::HashMap;

use crate::model::BankSet;

#[derive(Debug, Clone, Default)]
pub struct MediaIndex {
    /// (bank filename, media id) -> index in that bank
    banks: HashMap<(String, u32), usize>,
    /// media id -> first (bank filename, index) seen
    sids: HashMap<u32, (String, usize)>,
}

impl MediaIndex {
    pub fn new(banks: &BankSet) -> Self {
        let mut index = Self::default();
        for bank in banks.iter() {
            for nchunk in bank.root().finds("MediaIndex") {
                for nsid in nchunk.finds_type("sid") {
                    let Some(position) = nsid.parent().and_then(|p| p.index()) else {
                        continue;
                    };
                    index.add(bank.filename(), nsid.uint(), position);
                }
            }
        }
        tracing::debug!("indexed {} media entries", index.banks.len());
        index
    }

    fn add(&mut self, bankname: &str, sid: u32, position: usize) {
        self.banks.insert((bankname.to_string(), sid), position);
        self.sids.entry(sid).or_insert_with(|| (bankname.to_string(), position));
    }

    /// (bank filename, index) holding a media id
    pub fn get<'s>(&'s self, bankname: &'s str, sid: u32) -> Option<(&'s str, usize)> {
        if sid == 0 {
            return None;
        }
        if let Some(&position) = self.banks.get(&(bankname.to_string(), sid)) {
            return Some((bankname, position));
        }
        self.sids.get(&sid).map(|(name, position)| (name.as_str(), *position))
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BankBuilder;

    fn media_bank(filename: &str, sids: &[&str]) -> crate::model::Bank {
        let mut b = BankBuilder::new(filename, 134);
        b.object("MediaIndex").list("pLoadedMedia");
        for (i, sid) in sids.iter().enumerate() {
            b.item("MediaHeader", i).field("sid", "id", sid).close();
        }
        b.close().close();
        b.build()
    }

    #[test]
    fn test_lookup_prefers_own_bank() {
        let banks = BankSet::new(vec![
            media_bank("a.bnk", &["100", "200"]),
            media_bank("b.bnk", &["300", "200"]),
        ]);
        let index = MediaIndex::new(&banks);
        assert_eq!(index.len(), 4);
        assert_eq!(index.get("a.bnk", 200), Some(("a.bnk", 1)));
        assert_eq!(index.get("b.bnk", 200), Some(("b.bnk", 1)));
        assert_eq!(index.get("a.bnk", 300), Some(("b.bnk", 0)));
        assert_eq!(index.get("a.bnk", 400), None);
        assert_eq!(index.get("a.bnk", 0), None);
    }
}
