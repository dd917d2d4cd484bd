use std::collections::BTreeMap;

use crate::node::{ErrorKind, ErrorSet, NodeId, NodeKind};
use crate::tree::{FormError, FormResult, FormTree, TreeState, read_lock, write_lock};

#[derive(Clone, Debug, Default)]
pub struct MessageCatalog {
    entries: BTreeMap<String, BTreeMap<ErrorKind, String>>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(
        mut self,
        path: impl Into<String>,
        kind: ErrorKind,
        text: impl Into<String>,
    ) -> Self {
        self.entries
            .entry(path.into())
            .or_default()
            .insert(kind, text.into());
        self
    }

    pub fn lookup(&self, path: &str, kind: ErrorKind) -> Option<&str> {
        self.entries.get(path)?.get(&kind).map(String::as_str)
    }
}

impl TreeState {
    pub(crate) fn composed_message(&self, path: &str, errors: &ErrorSet) -> String {
        let mut parts = Vec::new();
        for kind in errors.keys() {
            match self.catalog.lookup(path, *kind) {
                Some(text) => parts.push(text),
                None => log::warn!("no message configured for {path}:{kind}"),
            }
        }
        parts.join(" ")
    }

    fn collect_leaf_messages(&self, id: NodeId, aggregate: &mut BTreeMap<String, String>) {
        let NodeKind::Group { children, .. } = &self.nodes[id.index()].kind else {
            return;
        };
        for (name, child) in children {
            let node = &self.nodes[child.index()];
            match &node.kind {
                NodeKind::Group { .. } => self.collect_leaf_messages(*child, aggregate),
                NodeKind::Field { .. } => {
                    if !(node.meta.dirty || node.meta.touched) || node.meta.errors.is_empty() {
                        continue;
                    }
                    let path = self.qualified_path(*child);
                    let text = self.composed_message(&path, &node.meta.errors);
                    if !text.is_empty() {
                        aggregate.insert(name.clone(), text);
                    }
                }
            }
        }
    }
}

impl FormTree {
    pub fn set_message(&self, path: &str) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resolving field message")?;
        let id = state
            .resolve(path)
            .ok_or_else(|| FormError::UnknownPath(path.to_string()))?;
        state.messages.insert(path.to_string(), String::new());

        let meta = state.nodes[id.index()].meta.clone();
        if !(meta.touched || meta.dirty) {
            return Ok(());
        }
        if !meta.errors.is_empty() {
            let text = state.composed_message(path, &meta.errors);
            state.messages.insert(path.to_string(), text);
        }

        // The root group is unnamed; only named ancestors get a store entry.
        let parent = state.nodes[id.index()].parent;
        if let Some(parent) = parent.filter(|parent| *parent != state.root) {
            let parent_path = state.qualified_path(parent);
            let parent_errors = state.nodes[parent.index()].meta.errors.clone();
            state.messages.insert(parent_path.clone(), String::new());
            if !parent_errors.is_empty() {
                let text = state.composed_message(&parent_path, &parent_errors);
                state.messages.insert(parent_path, text);
            }
        }
        Ok(())
    }

    pub fn message(&self, path: &str) -> FormResult<Option<String>> {
        let state = read_lock(&self.state, "reading field message")?;
        Ok(state.messages.get(path).cloned())
    }

    pub fn messages(&self) -> FormResult<BTreeMap<String, String>> {
        let state = read_lock(&self.state, "reading message store")?;
        Ok(state.messages.clone())
    }

    /// Flat leaf-name aggregation: equal leaf names in different
    /// branches collide, last one enumerated wins.
    pub fn process_messages(&self) -> FormResult<BTreeMap<String, String>> {
        let state = read_lock(&self.state, "aggregating field messages")?;
        let mut aggregate = BTreeMap::new();
        state.collect_leaf_messages(state.root, &mut aggregate);
        Ok(aggregate)
    }
}
