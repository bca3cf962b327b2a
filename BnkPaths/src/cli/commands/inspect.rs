//! CLI command for bank dump summaries

use std::path::PathBuf;

use indexmap::IndexMap;

use crate::generator::language_of;
use crate::model::{Bank, load_dumps};
use crate::utils::find_dump_files;

/// Object count per class, in first-seen order
fn class_counts(bank: &Bank) -> IndexMap<&str, usize> {
    let mut counts = IndexMap::new();
    for node in bank.hirc_items() {
        *counts.entry(node.name()).or_insert(0) += 1;
    }
    counts
}

pub fn execute(inputs: &[PathBuf]) -> anyhow::Result<()> {
    let paths = find_dump_files(inputs);
    if paths.is_empty() {
        anyhow::bail!("no dumps found in {inputs:?}");
    }

    let loaded = load_dumps(&paths, |_, _, _| {});
    for (path, reason) in &loaded.failed {
        println!("{}: failed ({reason})", path.display());
    }

    for bank in loaded.banks.iter() {
        let language = language_of(bank).map_or_else(|| "SFX".to_string(), |(_, name)| name);
        println!("{}", bank.filename());
        println!("  version:  {}", bank.version());
        println!("  id:       {}", bank.id());
        println!("  language: {language}");

        let counts = class_counts(bank);
        let total: usize = counts.values().sum();
        println!("  objects:  {total}");
        for (class, count) in counts {
            println!("    {class:<24} {count:>6}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BankBuilder;

    #[test]
    fn test_class_counts() {
        let mut b = BankBuilder::new("test.bnk", 134);
        b.list("listLoadedItem");
        b.item("CAkEvent", 0).field("sid", "ulID", "1").close();
        b.item("CAkSound", 1).field("sid", "ulID", "2").close();
        b.item("CAkEvent", 2).field("sid", "ulID", "3").close();
        b.close();
        let bank = b.build();

        let counts = class_counts(&bank);
        assert_eq!(counts.get("CAkEvent"), Some(&2));
        assert_eq!(counts.get("CAkSound"), Some(&1));
        assert_eq!(counts.keys().copied().collect::<Vec<_>>(), vec!["CAkEvent", "CAkSound"]);
    }
}
