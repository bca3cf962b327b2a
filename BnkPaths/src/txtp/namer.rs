//! Output names
//!
//! A name starts from the entry (event name, or bank + index when
//! unnamed), then adds the gamesyncs, states and gamevars that made this
//! playlist, then one `{x}` flag per notable feature.

use super::Txtp;
use super::printer::Printer;
use super::simplify::SelectKind;
use crate::model::NodeRef;
use crate::names::NameResolver;
use crate::utils::hash_text;

/// Longest filename written, before the extension
pub const MAX_FILENAME_LENGTH: usize = 240;

/// Short class names for unnamed entries
pub fn short_class(class: &str) -> Option<&'static str> {
    let short = match class {
        "CAkEvent" => "event",
        "CAkDialogueEvent" => "dialogueevent",
        "CAkActionPlay" | "CAkActionPlayEvent" | "CAkActionTrigger" => "action",
        "CAkLayerCntr" => "layer",
        "CAkSwitchCntr" => "switch",
        "CAkRanSeqCntr" => "ranseq",
        "CAkSound" => "sound",
        "CAkMusicSwitchCntr" => "musicswitch",
        "CAkMusicRanSeqCntr" => "musicranseq",
        "CAkMusicSegment" => "musicsegment",
        "CAkMusicTrack" => "musictrack",
        _ => return None,
    };
    Some(short)
}

fn hashname_of(names: &dyn NameResolver, node: NodeRef<'_>) -> Option<String> {
    node.sid()
        .and_then(|sid| names.get_namerow(sid))
        .and_then(|row| row.hashname.clone())
}

/// `0012` from the object's list index, or its id when it has none
fn index_text(node: NodeRef<'_>) -> String {
    node.index()
        .map_or_else(|| node.sid().unwrap_or(0).to_string(), |index| format!("{index:04}"))
}

/// Bank name for unnamed entries: the bank id's name, or the file stem
fn bank_name(names: &dyn NameResolver, node: NodeRef<'_>) -> String {
    let bank = node.bank();
    names
        .get_namerow(bank.id())
        .and_then(|row| row.hashname.clone())
        .unwrap_or_else(|| bank.bankname().to_string())
}

/// Full name for a playlist, without extension
pub fn longname(txtp: &Txtp<'_>, printer: &Printer<'_>, bnkmark: bool) -> String {
    let names = txtp.info.names();
    let entry = txtp.entry;

    let row = entry.sid().and_then(|sid| names.get_namerow(sid));
    let mut hashname = row.and_then(|r| r.hashname.clone());
    let guidname = row.and_then(|r| r.guidname.clone());
    if hashname.is_none() {
        hashname = txtp.ncaller.and_then(|caller| hashname_of(names, caller));
    }
    let extra_name = hashname.is_none() && guidname.is_none();

    let mut name = match hashname.or(guidname) {
        Some(name) => name,
        None => bank_name(names, entry),
    };

    if extra_name {
        let mut info = index_text(entry);
        if txtp.unused {
            info.push_str("~unused");
        }
        match short_class(entry.name()) {
            Some(short) => name = format!("{name}-{info}-{short}"),
            None => name = format!("{name}-{info}"),
        }
    } else if txtp.unused {
        name.push_str("~unused");
    }

    if txtp.transition {
        name.push_str(&format!("~{{transition-{}}}", index_text(entry)));
    }
    if let Some((trigger, segment)) = txtp.stinger {
        let trigname = names.name_of(trigger).map_or_else(|| trigger.to_string(), str::to_string);
        name.push_str(&format!("~{{stinger-{}}}={trigname}", index_text(segment)));
    }

    name.push_str(&txtp.info.gsnames(false));

    let scnames = txtp.info.scnames();
    let sc = if !scnames.is_empty() {
        format!("={scnames}")
    } else if txtp.sc_default {
        "=-".to_string()
    } else {
        String::new()
    };

    let gvnames = txtp.info.gvnames();
    let gv = if gvnames.is_empty() {
        String::new()
    } else if printer.flags.has_silences {
        format!("={gvnames}")
    } else {
        format!(" {gvnames}")
    };

    if printer.silence() && printer.flags.has_silences {
        name.push_str(" {s-}");
    } else if printer.is_crossfading_multiple() || !sc.is_empty() || !gv.is_empty() {
        name.push_str(" {s}");
    }
    name.push_str(&sc);
    name.push_str(&gv);

    let tflags = printer.tree_flags();
    let selected = printer.selected().unwrap_or(1);
    if printer.flags.has_random_steps {
        if tflags.select == Some(SelectKind::Random) {
            name.push_str(&format!(" {{r{selected}}}"));
        } else {
            name.push_str(" {r}");
        }
    }
    if tflags.has_multiloops {
        if tflags.select == Some(SelectKind::Multi) {
            name.push_str(&format!(" {{m{selected}}}"));
        } else {
            name.push_str(" {m}");
        }
    }
    if tflags.select == Some(SelectKind::Force) {
        name.push_str(&format!(" {{f{selected}}}"));
    }
    if let Some(lang) = &printer.flags.lang_name {
        name.push_str(&format!(" {{l={lang}}}"));
    }
    if printer.flags.has_internals && bnkmark {
        name.push_str(" {b}");
    }
    if tflags.has_externals {
        name.push_str(" {e}");
    }
    if printer.flags.has_unsupported || printer.has_many_sounds() {
        name.push_str(" {!}");
    }
    name
}

/// Cuts names the filesystem can't take, keeping them unique with a CRC
pub fn trim_filename(name: &str) -> Option<String> {
    if name.len() <= MAX_FILENAME_LENGTH {
        return None;
    }
    let mut cut = MAX_FILENAME_LENGTH;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    Some(format!("{}~{:08x}.txtp", &name[..cut], hash_text(name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_class() {
        assert_eq!(short_class("CAkActionPlayEvent"), Some("action"));
        assert_eq!(short_class("CAkMusicTrack"), Some("musictrack"));
        assert_eq!(short_class("CAkBus"), None);
    }

    #[test]
    fn test_trim_filename() {
        assert_eq!(trim_filename("short.txtp"), None);

        let long = format!("{}.txtp", "a".repeat(300));
        let trimmed = trim_filename(&long).unwrap();
        assert!(trimmed.starts_with(&"a".repeat(MAX_FILENAME_LENGTH)));
        assert!(trimmed.ends_with(".txtp"));
        assert_eq!(trimmed.len(), MAX_FILENAME_LENGTH + 1 + 8 + 5);

        // multibyte names are cut on char boundaries
        let long = format!("{}.txtp", "é".repeat(200));
        assert!(trim_filename(&long).is_some());
    }
}
