//! Audio sources: media ids, plugins, codecs and language subdirs

use crate::error::{Error, Result};
use crate::model::NodeRef;
use crate::utils::hash_name;

/// First version where every codec uses `.wem`
const NEW_EXTENSION_VERSION: u32 = 62;
/// Last version storing languages as table ids instead of name hashes
const LANGUAGE_ID_VERSION: u32 = 122;

pub const PLUGIN_SILENCE: u32 = 0x00650002;
const PLUGIN_MIDI: u32 = 0x00100001;
const PLUGINS_IGNORABLE: [u32; 2] = [0x01950002, 0x01990002];
const CODEC_EXTERNAL: u32 = 0x08;

/// Languages in table id order, with their short names
const LANGUAGES: [(&str, &str); 39] = [
    ("SFX", "sfx"),
    ("Arabic", "ar"),
    ("Bulgarian", "bg"),
    ("Chinese(HK)", "zh-hk"),
    ("Chinese(PRC)", "zh-cn"),
    ("Chinese(Taiwan)", "zh-tw"),
    ("Czech", "cs"),
    ("Danish", "da"),
    ("Dutch", "nl"),
    ("English(Australia)", "en-au"),
    ("English(India)", "en-in"),
    ("English(UK)", "en"),
    ("English(US)", "us"),
    ("Finnish", "fi"),
    ("French(Canada)", "fr-ca"),
    ("French(France)", "fr"),
    ("German", "de"),
    ("Greek", "el"),
    ("Hebrew", "he"),
    ("Hungarian", "hu"),
    ("Indonesian", "id"),
    ("Italian", "it"),
    ("Japanese", "ja"),
    ("Korean", "ko"),
    ("Latin", "la"),
    ("Norwegian", "no"),
    ("Polish", "pl"),
    ("Portuguese(Brazil)", "pt-br"),
    ("Portuguese(Portugal)", "pt"),
    ("Romanian", "ro"),
    ("Russian", "ru"),
    ("Slovenian", "sl"),
    ("Spanish(Mexico)", "es-mx"),
    ("Spanish(Spain)", "es"),
    ("Spanish(US)", "es-us"),
    ("Swedish", "sv"),
    ("Turkish", "tr"),
    ("Ukrainian", "uk"),
    ("Vietnamese", "vi"),
];

/// Names only found as hashes in newer banks
const EXTRA_LANGUAGES: [(&str, &str); 1] = [("Japanese(JP)", "ja")];

fn old_codec_extension(codec: u32) -> Option<&'static str> {
    match codec {
        0x01 | 0x02 | 0x05 | 0x07 => Some("wav"),
        0x03 => Some("xma"),
        0x04 => Some("ogg"),
        _ => None,
    }
}

fn plugin_name(plugin: u32) -> String {
    match plugin {
        0x00640002 => "sine".to_string(),
        PLUGIN_SILENCE => "silence".to_string(),
        0x00660002 => "tone".to_string(),
        other => format!("{other:08x}"),
    }
}

/// Language of a bank, as (full name, short name)
pub fn bank_language(bank: &crate::model::Bank) -> Option<(String, String)> {
    let root = bank.root();
    let field = root.find1("BankHeader")?.find1("dwLanguageID")?;
    let value = field.uint();

    let full = if bank.version() <= LANGUAGE_ID_VERSION {
        LANGUAGES.get(value as usize).map(|(name, _)| (*name).to_string())
    } else {
        LANGUAGES
            .iter()
            .chain(EXTRA_LANGUAGES.iter())
            .find(|(name, _)| hash_name(name) == value)
            .map(|(name, _)| (*name).to_string())
            .or_else(|| field.hashname().map(str::to_string))
    };
    let full = full.unwrap_or_else(|| format!("language-{value}"));

    let short = LANGUAGES
        .iter()
        .chain(EXTRA_LANGUAGES.iter())
        .find(|(name, _)| *name == full)
        .map_or_else(|| full.clone(), |(_, short)| (*short).to_string());
    Some((full, short))
}

/// Whether a bank holds language-independent data
pub fn is_sfx_language(bank: &crate::model::Bank) -> bool {
    bank_language(bank).is_none_or(|(full, _)| full == "SFX")
}

/// Custom fx config, used for silence durations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fx {
    pub plugin_id: u32,
    /// Duration (ms)
    pub duration: f64,
}

impl Fx {
    pub fn parse(node: NodeRef<'_>, plugin_id: u32) -> Self {
        let mut duration = 1000.0;
        if plugin_id == PLUGIN_SILENCE {
            if let Some(value) = node.find1("AkFXSrcSilenceParams").and_then(|p| p.float_of("fDuration")) {
                duration = value * 1000.0;
            }
        }
        Self { plugin_id, duration }
    }
}

/// One `AkBankSourceData`
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Media id (the `.wem` number)
    pub tid: u32,
    /// Object that owns the source
    pub owner: u32,
    /// Bank slot the source was read from
    pub bank: usize,
    pub version: u32,
    /// Media stored inside the bank
    pub internal: bool,
    pub plugin_id: Option<u32>,
    pub plugin_name: Option<String>,
    pub plugin_size: Option<u32>,
    pub plugin_external: bool,
    pub plugin_ignorable: bool,
    pub plugin_midi: bool,
    pub is_silence: bool,
    pub plugin_fx: Option<Fx>,
    pub extension: Option<&'static str>,
    /// Language subdir ("" or "Name/") and short name, for language sources
    pub lang: Option<(String, String)>,
}

impl Source {
    pub fn parse(node: NodeRef<'_>, owner: u32, owner_kind: &str) -> Result<Self> {
        let bank = node.bank();
        let version = bank.version();
        let plugin = node.uint_of("ulPluginID").unwrap_or(0);
        let mut internal = node.int_of("StreamType").unwrap_or(0) == 0;

        let source_id = node.uint_of("sourceID").unwrap_or(0);
        let tid = match node.uint_of("uFileID") {
            Some(file_id) if !internal => file_id,
            _ => source_id,
        };

        let plugin_type = plugin & 0x000F;
        let codec = (plugin >> 16) & 0xFFFF;
        let plugin_external = codec == CODEC_EXTERNAL;
        if plugin_external {
            internal = false;
        }
        let (plugin_id, plugin_name) = if plugin_type != 0x01 {
            (Some(plugin), Some(plugin_name(plugin)))
        } else {
            (None, None)
        };

        let extension = if plugin_id.is_some() || codec == 0 {
            None
        } else if version >= NEW_EXTENSION_VERSION {
            Some("wem")
        } else {
            Some(old_codec_extension(codec).ok_or_else(|| {
                Error::hard(owner, owner_kind, format!("extension not found for codec {codec}, tid={tid}"))
            })?)
        };

        let language_flag = node.int_of("bIsLanguageSpecific").unwrap_or(0) != 0;
        let lang = if internal || language_flag {
            bank_language(bank).map(|(full, short)| {
                let subdir = if full == "SFX" { String::new() } else { format!("{full}/") };
                let short = if short == "sfx" { String::new() } else { short };
                (subdir, short)
            })
        } else {
            None
        };

        Ok(Self {
            tid,
            owner,
            bank: bank.slot(),
            version,
            internal,
            plugin_id,
            plugin_name,
            plugin_size: node.uint_of("uSize"),
            plugin_external,
            plugin_ignorable: PLUGINS_IGNORABLE.contains(&plugin),
            plugin_midi: plugin == PLUGIN_MIDI,
            is_silence: plugin == PLUGIN_SILENCE,
            plugin_fx: None,
            extension,
            lang,
        })
    }

    /// Alternate extension for players that need renamed files
    pub fn extension_alt(&self) -> Option<&'static str> {
        match self.extension {
            Some("ogg") => Some("logg"),
            Some("wav") => Some("lwav"),
            other => other,
        }
    }

    /// Language subdir, empty when not language-specific
    pub fn subdir(&self) -> &str {
        self.lang.as_ref().map_or("", |(subdir, _)| subdir.as_str())
    }

    /// Language short name, empty for SFX
    pub fn lang_short(&self) -> &str {
        self.lang.as_ref().map_or("", |(_, short)| short.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BankBuilder;

    fn bank_with_source(version: u32, lang: &str, plugin: &str, stream: &str) -> crate::model::Bank {
        let mut b = BankBuilder::new("test.bnk", version);
        b.object("BankHeader").field("u32", "dwLanguageID", lang).close();
        b.object("AkBankSourceData")
            .field("u32", "ulPluginID", plugin)
            .field("u8", "StreamType", stream)
            .object("AkMediaInformation")
            .field("tid", "sourceID", "12345")
            .field("u8", "bIsLanguageSpecific", "0")
            .close()
            .close();
        b.build()
    }

    #[test]
    fn test_stream_source() {
        let bank = bank_with_source(134, "393239870", "262145", "2");
        let node = bank.root().find1("AkBankSourceData").unwrap();
        let source = Source::parse(node, 1, "CAkSound").unwrap();
        assert_eq!(source.tid, 12345);
        assert!(!source.internal);
        assert_eq!(source.extension, Some("wem"));
        assert!(source.lang.is_none());
    }

    #[test]
    fn test_internal_language_source() {
        let bank = bank_with_source(134, "684519430", "262145", "0");
        let node = bank.root().find1("AkBankSourceData").unwrap();
        let source = Source::parse(node, 1, "CAkSound").unwrap();
        assert!(source.internal);
        assert_eq!(source.subdir(), "English(US)/");
        assert_eq!(source.lang_short(), "us");
    }

    #[test]
    fn test_old_codec_and_plugins() {
        let bank = bank_with_source(48, "0", "262145", "0");
        let node = bank.root().find1("AkBankSourceData").unwrap();
        let source = Source::parse(node, 1, "CAkSound").unwrap();
        assert_eq!(source.extension, Some("ogg"));
        assert_eq!(source.extension_alt(), Some("logg"));
        assert_eq!(source.subdir(), "");

        let bank = bank_with_source(134, "0", &PLUGIN_SILENCE.to_string(), "0");
        let node = bank.root().find1("AkBankSourceData").unwrap();
        let source = Source::parse(node, 1, "CAkSound").unwrap();
        assert!(source.is_silence);
        assert_eq!(source.plugin_name.as_deref(), Some("silence"));
        assert_eq!(source.extension, None);

        let bank = bank_with_source(48, "0", "720897", "0");
        let node = bank.root().find1("AkBankSourceData").unwrap();
        assert!(Source::parse(node, 1, "CAkSound").is_err());
    }
}
