//! Bank dump (XML) loading
//!
//! Dumps hold one `root` element per bank, in either the long element and
//! attribute names or the shortened ones (`obj`/`fld`/`lst`, `na`/`va`...).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rayon::prelude::*;

use super::build::BankBuilder;
use super::node::{Bank, BankSet, ModelNode, NodeKind, Value};
use crate::error::{Error, Result};

/// Result of loading several dumps
#[derive(Debug, Default)]
pub struct LoadResult {
    pub banks: BankSet,
    /// Dumps that could not be read, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

fn long_attr(key: &[u8]) -> String {
    let key = match key {
        b"ty" => "type",
        b"na" => "name",
        b"va" => "value",
        b"vf" => "valuefmt",
        b"hn" => "hashname",
        b"gn" => "guidname",
        b"ix" => "index",
        b"co" => "count",
        b"me" => "message",
        b"of" => "offset",
        b"pa" => "path",
        b"op" => "objpath",
        b"si" => "size",
        other => return String::from_utf8_lossy(other).into_owned(),
    };
    key.to_string()
}

fn node_kind(tag: &[u8]) -> Option<NodeKind> {
    match tag {
        b"object" | b"obj" => Some(NodeKind::Object),
        b"list" | b"lst" => Some(NodeKind::List),
        b"field" | b"fld" => Some(NodeKind::Field),
        b"error" | b"skip" => Some(NodeKind::Error),
        _ => None,
    }
}

fn parse_node(e: &BytesStart, path: &Path) -> Result<ModelNode> {
    let tag = e.name();
    let Some(kind) = node_kind(tag.as_ref()) else {
        return Err(Error::MalformedDump {
            path: path.to_path_buf(),
            reason: format!("unknown element <{}>", String::from_utf8_lossy(tag.as_ref())),
        });
    };

    let mut node = ModelNode::new(kind, "");
    let mut value = None;
    for attr in e.attributes() {
        let attr = attr?;
        let text = attr.unescape_value()?.into_owned();
        match long_attr(attr.key.as_ref()).as_str() {
            "name" => node.name = text,
            "type" => node.ty = text,
            "value" => value = Some(text),
            "count" | "offset" | "size" => {}
            key => {
                node.attrs.insert(key.to_string(), text);
            }
        }
    }
    if let Some(value) = value {
        node.value = Value::parse(&node.ty, &value);
    }
    Ok(node)
}

fn start_bank(e: &BytesStart) -> Result<BankBuilder> {
    let mut filename = String::new();
    let mut bank_path = String::new();
    let mut version = 0;
    for attr in e.attributes() {
        let attr = attr?;
        let text = attr.unescape_value()?;
        match long_attr(attr.key.as_ref()).as_str() {
            "filename" => filename = text.into_owned(),
            "path" => bank_path = text.into_owned(),
            "version" => version = text.parse().unwrap_or(0),
            _ => {}
        }
    }
    Ok(BankBuilder::with_path(&filename, &bank_path, version))
}

/// Parses dump text into its banks
pub fn parse_dump(content: &str, path: &Path) -> Result<Vec<Bank>> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut banks = Vec::new();
    let mut current: Option<BankBuilder> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"root" {
                    current = Some(start_bank(&e)?);
                } else if let Some(builder) = current.as_mut() {
                    builder.open(parse_node(&e, path)?);
                }
            }
            Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"root" {
                    banks.push(start_bank(&e)?.build());
                } else if let Some(builder) = current.as_mut() {
                    builder.leaf(parse_node(&e, path)?);
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"root" {
                    let Some(builder) = current.take() else {
                        return Err(Error::MalformedDump {
                            path: path.to_path_buf(),
                            reason: "closing root without opening".to_string(),
                        });
                    };
                    if builder.depth() != 0 {
                        return Err(Error::MalformedDump {
                            path: path.to_path_buf(),
                            reason: "root closed with open elements".to_string(),
                        });
                    }
                    banks.push(builder.build());
                } else if let Some(builder) = current.as_mut() {
                    builder.close();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::XmlError(e)),
            _ => {}
        }
        buf.clear();
    }

    if current.is_some() {
        return Err(Error::MalformedDump {
            path: path.to_path_buf(),
            reason: "unexpected end of dump".to_string(),
        });
    }
    if banks.is_empty() {
        return Err(Error::EmptyDump(path.to_path_buf()));
    }

    tracing::debug!("Parsed {} bank(s) from {}", banks.len(), path.display());
    Ok(banks)
}

/// Reads and parses one dump file
pub fn load_dump<P: AsRef<Path>>(path: P) -> Result<Vec<Bank>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    parse_dump(&content, path)
}

/// Loads several dumps in parallel
///
/// Failed dumps are logged and skipped. Banks keep input order.
pub fn load_dumps<F>(paths: &[PathBuf], progress: F) -> LoadResult
where
    F: Fn(usize, usize, &Path) + Send + Sync,
{
    let processed = AtomicUsize::new(0);
    let total = paths.len();

    let results: Vec<(PathBuf, Result<Vec<Bank>>)> = paths
        .par_iter()
        .map(|path| {
            let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
            progress(current, total, path);
            (path.clone(), load_dump(path))
        })
        .collect();

    let mut result = LoadResult::default();
    for (path, loaded) in results {
        match loaded {
            Ok(banks) => {
                for bank in banks {
                    result.banks.push(bank);
                }
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", path.display());
                result.failed.push((path, e.to_string()));
            }
        }
    }
    result
}
