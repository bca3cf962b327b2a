//! CLI command for checking operator params

use crate::registry::{ParamItem, Params};
use crate::utils::id_or_hash;

/// `SW:music=a (1234=5678)` with the ids used to match banks
fn describe(item: &ParamItem) -> String {
    let value = if item.val == "-" { 0 } else { id_or_hash(&item.val) };
    format!("{item} ({}={value})", id_or_hash(&item.key))
}

pub fn execute(text: &str, gamevars: bool) -> anyhow::Result<()> {
    let params = if gamevars {
        Params::parse(text, false, false, true)
    } else {
        Params::parse(text, true, true, false)
    };

    if params.is_empty() {
        anyhow::bail!("no valid params in '{text}'");
    }

    for (index, combo) in params.combos().iter().enumerate() {
        let items: Vec<String> = combo.iter().map(describe).collect();
        println!("{:>3}: {}", index + 1, items.join(" "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash_name;

    #[test]
    fn test_describe() {
        let params = Params::parse("[music=bgm1]", true, true, false);
        let item = &params.combos()[0][0];
        let expected = format!("SW:music=bgm1 ({}={})", hash_name("music"), hash_name("bgm1"));
        assert_eq!(describe(item), expected);
    }

    #[test]
    fn test_any_value() {
        let params = Params::parse("(stage=-)", true, true, false);
        assert!(describe(&params.combos()[0][0]).ends_with("=0)"));
    }
}
