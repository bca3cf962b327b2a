//! Writes a simplified tree as TXTP text
//!
//! Sounds print in tree order and each group line follows its children,
//! which is how TXTP groups take the previous N entries. The "simpler"
//! variant drops cosmetic config so near-identical playlists compare equal.

use super::media::MediaIndex;
use super::simplify::TreeFlags;
use super::tree::{NodeType, ROOT, TNodeId, TxtpNode, TxtpTree};
use crate::model::BankSet;

/// Sounds above this are hard to play as one file
pub const SOUNDS_LIMIT: usize = 150;

/// Features found while printing, used for naming
#[derive(Debug, Clone, Default)]
pub struct PrintFlags {
    pub lang_name: Option<String>,
    pub has_random_continuous: bool,
    pub has_random_steps: bool,
    pub has_silences: bool,
    pub has_streams: bool,
    pub has_internals: bool,
    pub has_unsupported: bool,
    /// Memory media not found in any loaded bank
    pub missing_media: Vec<u32>,
}

pub struct Printer<'t> {
    tree: &'t TxtpTree,
    tflags: &'t TreeFlags,
    media: &'t MediaIndex,
    banks: &'t BankSet,
    selected: Option<usize>,
    alt_exts: bool,
    /// Silence every crossfaded sound, not only those silenced by default
    silence: bool,
    text: String,
    depth: usize,
    simpler: bool,
    pub flags: PrintFlags,
}

/// Seconds as the shortest text that reads back the same value
///
/// Scientific notation isn't accepted by players, so tiny values are
/// written with fixed decimals, or dropped when those round to zero.
pub fn format_secs(value: f64) -> Option<String> {
    if value == 0.0 {
        return None;
    }
    let text = format!("{value:?}");
    if !text.contains('e') {
        return Some(text);
    }
    let text = format!("{value:.10}");
    if text.parse::<f64>().is_ok_and(|v| v == 0.0) {
        return None;
    }
    Some(text)
}

/// ` #X seconds` for a time in ms, empty when zero
pub fn format_ms(param: &str, value_ms: f64) -> String {
    if value_ms == 0.0 {
        return String::new();
    }
    format_secs(value_ms / 1000.0).map_or_else(String::new, |secs| format!("{param} {secs}"))
}

/// Float printed with at least one decimal (`3.0`, `-1.5`)
pub fn format_float(value: f64) -> String {
    format!("{value:?}")
}

impl<'t> Printer<'t> {
    pub fn new(
        tree: &'t TxtpTree,
        tflags: &'t TreeFlags,
        media: &'t MediaIndex,
        banks: &'t BankSet,
        selected: Option<usize>,
        alt_exts: bool,
    ) -> Self {
        Self {
            tree,
            tflags,
            media,
            banks,
            selected,
            alt_exts,
            silence: false,
            text: String::new(),
            depth: 0,
            simpler: false,
            flags: PrintFlags::default(),
        }
    }

    pub fn generate(&mut self, simpler: bool) -> String {
        self.depth = 0;
        self.text = String::new();
        self.simpler = simpler;

        self.write_node(ROOT);
        self.text.push('\n');

        // raised volume goes last, so the mix doesn't clip early
        let master = self.tflags.master_volume;
        if master > 0.0 && !self.simpler {
            self.text.push_str(&format!("commands = #v {}dB\n", format_float(master)));
        }
        std::mem::take(&mut self.text)
    }

    pub fn set_silence(&mut self, silence: bool) {
        self.silence = silence;
    }

    pub fn silence(&self) -> bool {
        self.silence
    }

    pub fn tree_flags(&self) -> &TreeFlags {
        self.tflags
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn has_many_sounds(&self) -> bool {
        self.tflags.sound_count > SOUNDS_LIMIT
    }

    pub fn is_crossfading_multiple(&self) -> bool {
        self.flags.has_silences && self.tflags.sound_count > 1
    }

    /// A lone sound silenced by default plays anyway
    fn ignore_silenced(&self, node: &TxtpNode) -> bool {
        self.tflags.sound_count == 1 && node.silenced_default
    }

    fn padding(&self) -> String {
        " ".repeat(self.depth.saturating_sub(1))
    }

    fn write_node(&mut self, id: TNodeId) {
        let tree = self.tree;
        let node = tree.node(id);
        let counted = !node.ignorable(false, self.simpler);
        if counted {
            self.depth += 1;
        }

        if node.is_sound() {
            self.write_sound(node);
        }
        for &child in &node.children {
            self.write_node(child);
        }
        if node.is_group() {
            self.write_group(node);
        }

        if counted {
            self.depth -= 1;
        }

        // flags use the final tree, where single-item randoms are gone
        let multiple = node.children.len() > 1;
        if node.ntype == NodeType::RandomContinuous && multiple {
            self.flags.has_random_continuous = true;
        }
        if node.ntype.is_steps() && multiple {
            self.flags.has_random_steps = true;
        }
        if node.crossfaded || node.silenced {
            self.flags.has_silences = true;
        }
    }

    fn volume_of(&self, node: &TxtpNode) -> f64 {
        if self.simpler && !node.crossfaded {
            return 0.0;
        }
        node.volume.unwrap_or(0.0)
    }

    fn write_group(&mut self, node: &TxtpNode) {
        if node.ignorable(false, self.simpler) {
            return;
        }

        let mut line = format!("group = -{}{}", node.ntype.code(), node.children.len());
        if node.ntype.is_steps() || node.force_selectable {
            line.push_str(&format!(">{}", self.selected.unwrap_or(1)));
        } else if node.ntype == NodeType::RandomContinuous {
            line.push_str(">-");
        }

        let mut mods = String::new();
        let volume = self.volume_of(node);
        if volume != 0.0 {
            mods.push_str(&format!("  #v {}dB", format_float(volume)));
        }
        if node.ntype == NodeType::Layer {
            mods.push_str(" #@layer-v");
        }
        if !self.simpler {
            mods.push_str(&format_ms(" #p", node.pad_begin));
        }
        mods.push_str(&format_ms(" #B", node.body_time));
        mods.push_str(&format_ms(" #r", node.trim_begin));

        match node.looping {
            Some(0) => {
                mods.push_str(" #@loop");
                if node.loop_end {
                    mods.push_str(" #@loop-end");
                }
            }
            Some(count) if count > 1 => mods.push_str(&format!(" #E #l {count}.0")),
            _ => {}
        }

        let info = extra_info(node);
        let pad = self.padding();
        self.text.push_str(&format!("{pad}{line}{mods}{info}\n"));
    }

    fn write_sound(&mut self, node: &TxtpNode) {
        let Some(sound) = &node.sound else {
            return;
        };
        let mut name = String::new();
        let mut mods = String::new();
        let mut info = String::new();

        if let Some(source) = &sound.source {
            // midis may be music, or just sync helpers
            if source.plugin_midi {
                name.push('?');
                if !node.silenced {
                    self.flags.has_unsupported = true;
                }
            }
            if !source.lang_short().is_empty() {
                self.flags.lang_name = Some(source.lang_short().to_string());
            }
        }

        match &sound.source {
            _ if sound.silent => name = "?.silent".to_string(),
            None => name = "?.missing".to_string(),
            Some(source) if source.plugin_id.is_some() => {
                name = format!("?.plugin-{}", source.plugin_name.as_deref().unwrap_or_default());
                match source.plugin_fx {
                    Some(fx) if source.is_silence => mods.push_str(&format_ms(" #B", fx.duration)),
                    _ if source.is_silence || node.silenced => {}
                    _ => self.flags.has_unsupported = true,
                }
            }
            Some(source) if source.plugin_external => {
                name = format!("?{name}(?).wem");
                info.push_str(&format!("  ##external {} [obj {}]", source.tid, source.owner));
            }
            Some(source) if source.internal => {
                let extension = self.extension(source);
                let bankname = self.banks.get(source.bank).map_or("", |b| b.filename());
                match self.media.get(bankname, source.tid) {
                    Some(_) if self.simpler => {
                        // same media loaded from other banks compares equal
                        name.push_str(&format!("banks/{}.{extension}", source.tid));
                    }
                    Some((media_bank, index)) => {
                        name.push_str(&format!("{}{media_bank} #s{}", source.subdir(), index + 1));
                        info.push_str(&format!("  ##{}.{extension}", source.tid));
                    }
                    None => {
                        tracing::debug!("missing memory media {}", source.tid);
                        name = format!("?{name}{}.{extension}", source.tid);
                        info.push_str("  ##other bnk?");
                        self.flags.has_unsupported = true;
                        if !self.flags.missing_media.contains(&source.tid) {
                            self.flags.missing_media.push(source.tid);
                        }
                    }
                }
                self.flags.has_internals = true;
            }
            Some(source) => {
                let extension = self.extension(source);
                name.push_str(&format!("{}{}.{extension}", source.subdir(), source.tid));
                self.flags.has_streams = true;
            }
        }

        if sound.unreachable {
            info.push_str(" ##unreachable");
        }

        if sound.is_clip() {
            mods.push_str(&self.clip_mods(node));
        } else {
            mods.push_str(&self.sfx_mods(node));
        }

        let ignore_silenced = self.ignore_silenced(node);
        let silence_line = (node.silenced || (self.silence && node.crossfaded)) && !ignore_silenced;
        let volume = self.volume_of(node);
        if volume != 0.0 {
            if ignore_silenced {
                info.push_str(&format!("  ##v {}dB", format_float(volume)));
            } else {
                mods.push_str(&format!("  #v {}dB", format_float(volume)));
            }
        }

        if node.loop_anchor {
            mods.push_str(" #@loop");
            if node.loop_end {
                mods.push_str(" #@loop-end");
            }
        }

        info.push_str(&extra_info(node));
        if silence_line {
            name = format!("?{name}");
        }

        let pad = self.padding();
        self.text.push_str(&format!("{pad}{name}{mods}{info}\n"));
    }

    fn extension(&self, source: &crate::builder::Source) -> &'static str {
        let extension = if self.alt_exts { source.extension_alt() } else { source.extension };
        extension.unwrap_or("wem")
    }

    /// Sfx loop flags: whole files loop, there is no clip math
    fn sfx_mods(&self, node: &TxtpNode) -> String {
        let mut mods = String::new();
        match node.looping {
            None | Some(1) => mods.push_str(" #i"),
            Some(count) => {
                mods.push_str(" #e");
                if count > 1 {
                    mods.push_str(&format!(" #l {count}.0"));
                }
            }
        }
        if !self.simpler {
            mods.push_str(&format_ms(" #p", node.pad_begin));
        }
        mods
    }

    fn clip_mods(&self, node: &TxtpNode) -> String {
        let Some(sound) = &node.sound else {
            return String::new();
        };
        let fsd = sound.clip.map_or(0.0, |c| c.fsd);
        // body past the source duration means the clip repeats
        let loops = !sound.silent && node.body_time - node.trim_end > fsd;

        let mut mods = String::new();
        if !sound.silent {
            mods.push_str(if loops { " #E" } else { " #i" });
        }
        mods.push_str(&format_ms(" #p", node.pad_begin));
        mods.push_str(&format_ms(if loops { " #B" } else { " #b" }, node.body_time));
        mods.push_str(&format_ms(" #r", node.trim_begin));
        mods.push_str(&format_ms(" #R", node.trim_end));
        mods.push_str(&format_ms(" #P", node.pad_end));
        mods
    }
}

fn extra_info(node: &TxtpNode) -> String {
    let mut info = String::new();
    if node.loop_killed {
        info.push_str("  ##loop");
        if node.loop_end {
            info.push_str(" #loop-end");
        }
    }
    if node.crossfaded || node.silenced {
        info.push_str("  ##fade");
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Source;
    use crate::model::BankBuilder;
    use crate::txtp::simplify::{SimplifyOptions, simplify};
    use crate::txtp::tree::{NodeConfig, NodeSound};

    fn stream(tid: u32) -> Source {
        Source {
            tid,
            owner: 1,
            bank: 0,
            version: 134,
            internal: false,
            plugin_id: None,
            plugin_name: None,
            plugin_size: None,
            plugin_external: false,
            plugin_ignorable: false,
            plugin_midi: false,
            is_silence: false,
            plugin_fx: None,
            extension: Some("wem"),
            lang: None,
        }
    }

    fn print(tree: &mut TxtpTree, options: &SimplifyOptions) -> (String, String) {
        let flags = simplify(tree, options).unwrap();
        let banks = BankSet::new(vec![BankBuilder::new("test.bnk", 134).build()]);
        let media = MediaIndex::new(&banks);
        let mut printer = Printer::new(tree, &flags, &media, &banks, None, false);
        (printer.generate(false), printer.generate(true))
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(0.0), None);
        assert_eq!(format_secs(1.0).as_deref(), Some("1.0"));
        assert_eq!(format_secs(0.25).as_deref(), Some("0.25"));
        assert_eq!(format_secs(0.0000092213114704).as_deref(), Some("0.0000092213"));
        assert_eq!(format_secs(1e-12), None);
        assert_eq!(format_ms(" #p", 1500.0), " #p 1.5");
        assert_eq!(format_ms(" #p", 0.0), "");
    }

    #[test]
    fn test_single_sound() {
        let mut tree = TxtpTree::new();
        let config = NodeConfig {
            volume: Some(-3.0),
            ..NodeConfig::default()
        };
        tree.add_sound(ROOT, NodeSound::new(Some(stream(123))), &config);
        let (text, simpler) = print(&mut tree, &SimplifyOptions::default());
        assert_eq!(text, "123.wem #i  #v -3.0dB\n\n");
        assert_eq!(simpler, "123.wem #i\n\n");
    }

    #[test]
    fn test_random_group() {
        let mut tree = TxtpTree::new();
        let random = tree.add_group(ROOT, NodeType::RandomStep, &NodeConfig::default());
        tree.add_sound(random, NodeSound::new(Some(stream(1))), &NodeConfig::default());
        tree.add_sound(random, NodeSound::new(Some(stream(2))), &NodeConfig::default());
        let flags = simplify(&mut tree, &SimplifyOptions::default()).unwrap();
        let banks = BankSet::new(vec![BankBuilder::new("test.bnk", 134).build()]);
        let media = MediaIndex::new(&banks);
        let mut printer = Printer::new(&tree, &flags, &media, &banks, None, false);
        let text = printer.generate(false);
        assert_eq!(text, " 1.wem #i\n 2.wem #i\ngroup = -R2>1\n\n");
        assert!(printer.flags.has_random_steps);
        assert!(printer.flags.has_streams);
    }

    #[test]
    fn test_looping_layers_and_master_volume() {
        let mut tree = TxtpTree::new();
        let looped = NodeConfig {
            looping: Some(0),
            ..NodeConfig::default()
        };
        let seq = tree.add_group(ROOT, NodeType::SequenceContinuous, &looped);
        for tids in [[1, 2], [3, 4]] {
            let layer = tree.add_group(seq, NodeType::Layer, &NodeConfig::default());
            for tid in tids {
                tree.add_sound(layer, NodeSound::new(Some(stream(tid))), &NodeConfig::default());
            }
        }
        let options = SimplifyOptions {
            master_volume: 3.0,
            ..SimplifyOptions::default()
        };
        let (text, simpler) = print(&mut tree, &options);
        let body = "  1.wem #i\n  2.wem #i\n group = -L2 #@layer-v\n  3.wem #i\n  4.wem #i\n group = -L2 #@layer-v\ngroup = -S2 #@loop\n\n";
        assert_eq!(text, format!("{body}commands = #v 3.0dB\n"));
        assert_eq!(simpler, body);
    }

    #[test]
    fn test_missing_and_silent() {
        let mut tree = TxtpTree::new();
        let layer = tree.add_group(ROOT, NodeType::Layer, &NodeConfig::default());
        tree.add_sound(layer, NodeSound::new(None), &NodeConfig::default());
        let silenced = NodeConfig {
            silenced: true,
            ..NodeConfig::default()
        };
        tree.add_sound(layer, NodeSound::new(Some(stream(5))), &silenced);
        let (text, _) = print(&mut tree, &SimplifyOptions::default());
        assert_eq!(text, " ?.missing #i\n ?5.wem #i  ##fade\ngroup = -L2 #@layer-v\n\n");
    }
}
