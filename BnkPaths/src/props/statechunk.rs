//! State chunks: per-object property overrides keyed by (state group, state)

use super::Props;
use crate::model::NodeRef;

/// One override: when `group` is set to `value`, apply `props`
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    pub group: u32,
    pub value: u32,
    /// Id of the `CAkState` object holding the props
    pub instance: u32,
    pub props: Props,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateChunk {
    pub entries: Vec<StateEntry>,
}

impl StateChunk {
    /// Reads the `StateChunk` under `node`
    ///
    /// `resolve` maps a state instance id to its props; entries whose
    /// instance can't be resolved, or that set "none", are skipped.
    pub fn parse<F>(node: NodeRef<'_>, mut resolve: F) -> Option<Self>
    where
        F: FnMut(u32) -> Option<Props>,
    {
        let chunk = node.find1("StateChunk")?;

        let mut entries = Vec::new();
        for group_chunk in chunk.finds("AkStateGroupChunk") {
            let group = group_chunk.uint_of("ulStateGroupID").unwrap_or(0);
            for state in group_chunk.finds("AkState") {
                let value = state.uint_of("ulStateID").unwrap_or(0);
                if value == 0 {
                    continue;
                }
                let instance = state.uint_of("ulStateInstanceID").unwrap_or(0);
                if instance == 0 {
                    continue;
                }
                let Some(props) = resolve(instance) else {
                    continue;
                };
                entries.push(StateEntry { group, value, instance, props });
            }
        }
        Some(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, group: u32, value: u32) -> Option<&StateEntry> {
        self.entries.iter().find(|e| e.group == group && e.value == value)
    }

    /// Entries that can change the output
    pub fn usable(&self, apply_bus: bool) -> impl Iterator<Item = &StateEntry> {
        self.entries.iter().filter(move |e| e.props.is_usable(apply_bus))
    }
}
