use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use indexmap::IndexMap;

use crate::builder::{GroupSpec, NodeSpec};
use crate::messages::MessageCatalog;
use crate::node::{ErrorSet, FieldMeta, Node, NodeId, NodeKind, Value};
use crate::validators::{ChildValue, FieldValidator};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TreeOptions {
    pub change_debounce: Duration,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            change_debounce: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    StatePoisoned(&'static str),
    UnknownPath(String),
    DuplicateChild { parent: String, name: String },
    NotAField(String),
    SaveFailed(String),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::StatePoisoned(context) => {
                write!(f, "form state lock poisoned while {context}")
            }
            FormError::UnknownPath(path) => write!(f, "no field or group at path {path:?}"),
            FormError::DuplicateChild { parent, name } => {
                if parent.is_empty() {
                    write!(f, "duplicate child name {name:?} at the form root")
                } else {
                    write!(f, "duplicate child name {name:?} under {parent:?}")
                }
            }
            FormError::NotAField(path) => write!(f, "{path:?} is a group, not a field"),
            FormError::SaveFailed(error) => write!(f, "failed to serialize form value: {error}"),
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}

type ChangeHandler = Arc<dyn Fn(&FormTree, &Value) + Send + Sync>;

pub(crate) struct TreeState {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) snapshot: Value,
    pub(crate) catalog: MessageCatalog,
    pub(crate) messages: BTreeMap<String, String>,
    pub(crate) change_ticket: u64,
}

impl TreeState {
    pub(crate) fn resolve(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root;
        if path.is_empty() {
            return Some(current);
        }
        for segment in path.split('.') {
            current = self.child_of(current, segment)?;
        }
        Some(current)
    }

    fn child_of(&self, id: NodeId, name: &str) -> Option<NodeId> {
        match &self.nodes[id.index()].kind {
            NodeKind::Group { children, .. } => children.get(name).copied(),
            NodeKind::Field { .. } => None,
        }
    }

    pub(crate) fn qualified_path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let node = &self.nodes[node.index()];
            if node.parent.is_some() {
                segments.push(node.name.as_str());
            }
            current = node.parent;
        }
        segments.reverse();
        segments.join(".")
    }

    pub(crate) fn composite_value(&self, id: NodeId) -> Value {
        match &self.nodes[id.index()].kind {
            NodeKind::Field { value, .. } => value.clone(),
            NodeKind::Group { children, .. } => Value::Composite(
                children
                    .iter()
                    .map(|(name, child)| (name.clone(), self.composite_value(*child)))
                    .collect(),
            ),
        }
    }

    fn child_values(&self, id: NodeId) -> Vec<ChildValue> {
        match &self.nodes[id.index()].kind {
            NodeKind::Group { children, .. } => children
                .iter()
                .map(|(name, child)| ChildValue {
                    name: name.clone(),
                    value: self.composite_value(*child),
                    pristine: !self.nodes[child.index()].meta.dirty,
                })
                .collect(),
            NodeKind::Field { .. } => Vec::new(),
        }
    }

    pub(crate) fn revalidate(&mut self, id: NodeId) {
        self.revalidate_node(id);
        let mut current = self.nodes[id.index()].parent;
        while let Some(ancestor) = current {
            self.revalidate_node(ancestor);
            current = self.nodes[ancestor.index()].parent;
        }
    }

    fn revalidate_node(&mut self, id: NodeId) {
        let errors = {
            let node = &self.nodes[id.index()];
            match &node.kind {
                NodeKind::Field { value, validators } => {
                    let mut errors = ErrorSet::new();
                    for validator in validators {
                        if let Some(set) = validator.validate(value) {
                            errors.extend(set);
                        }
                    }
                    errors
                }
                NodeKind::Group { validators, .. } => {
                    let children = self.child_values(id);
                    let mut errors = ErrorSet::new();
                    for validator in validators {
                        if let Some(set) = validator.validate(&children) {
                            errors.extend(set);
                        }
                    }
                    errors
                }
            }
        };
        self.nodes[id.index()].meta.errors = errors;
    }

    fn insert_node(
        &mut self,
        name: String,
        parent: Option<NodeId>,
        spec: NodeSpec,
    ) -> FormResult<NodeId> {
        let id = NodeId(self.nodes.len());
        match spec {
            NodeSpec::Field(field) => {
                self.nodes.push(Node {
                    name,
                    parent,
                    meta: FieldMeta::default(),
                    kind: NodeKind::Field {
                        value: field.initial,
                        validators: field.validators,
                    },
                });
            }
            NodeSpec::Group(group) => {
                self.nodes.push(Node {
                    name,
                    parent,
                    meta: FieldMeta::default(),
                    kind: NodeKind::Group {
                        children: IndexMap::new(),
                        validators: group.validators,
                    },
                });
                for (child_name, child_spec) in group.children {
                    if self.child_of(id, &child_name).is_some() {
                        return Err(FormError::DuplicateChild {
                            parent: self.qualified_path(id),
                            name: child_name,
                        });
                    }
                    let child_id = self.insert_node(child_name.clone(), Some(id), child_spec)?;
                    if let NodeKind::Group { children, .. } = &mut self.nodes[id.index()].kind {
                        children.insert(child_name, child_id);
                    }
                }
            }
        }
        Ok(id)
    }
}

#[derive(Clone)]
pub struct FormTree {
    pub(crate) options: TreeOptions,
    pub(crate) state: Arc<RwLock<TreeState>>,
    pub(crate) change_handlers: Arc<RwLock<BTreeMap<NodeId, Vec<ChangeHandler>>>>,
}

#[derive(Clone, Debug)]
pub struct TreeSnapshot {
    pub value: Value,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub messages: BTreeMap<String, String>,
}

impl FormTree {
    pub fn build(
        root: GroupSpec,
        catalog: MessageCatalog,
        options: TreeOptions,
    ) -> FormResult<Self> {
        let mut state = TreeState {
            nodes: Vec::new(),
            root: NodeId(0),
            snapshot: Value::Null,
            catalog,
            messages: BTreeMap::new(),
            change_ticket: 0,
        };
        state.root = state.insert_node(String::new(), None, NodeSpec::Group(root))?;
        state.snapshot = state.composite_value(state.root);
        for index in 0..state.nodes.len() {
            state.revalidate_node(NodeId(index));
        }
        Ok(Self {
            options,
            state: Arc::new(RwLock::new(state)),
            change_handlers: Arc::new(RwLock::new(BTreeMap::new())),
        })
    }

    pub fn set_value(&self, path: &str, value: impl Into<Value>) -> FormResult<()> {
        let value = value.into();
        let id = {
            let mut state = write_lock(&self.state, "setting field value")?;
            let id = state
                .resolve(path)
                .ok_or_else(|| FormError::UnknownPath(path.to_string()))?;
            match &mut state.nodes[id.index()].kind {
                NodeKind::Field { value: slot, .. } => *slot = value.clone(),
                NodeKind::Group { .. } => return Err(FormError::NotAField(path.to_string())),
            }
            let mut current = Some(id);
            while let Some(node) = current {
                state.nodes[node.index()].meta.dirty = true;
                current = state.nodes[node.index()].parent;
            }
            state.revalidate(id);
            id
        };

        // Handlers run outside the lock so they may mutate the tree.
        let handlers = read_lock(&self.change_handlers, "reading change handlers")?
            .get(&id)
            .cloned()
            .unwrap_or_default();
        for handler in &handlers {
            handler(self, &value);
        }
        Ok(())
    }

    pub fn mark_touched(&self, path: &str) -> FormResult<()> {
        let mut state = write_lock(&self.state, "marking field touched")?;
        let id = state
            .resolve(path)
            .ok_or_else(|| FormError::UnknownPath(path.to_string()))?;
        state.nodes[id.index()].meta.touched = true;
        Ok(())
    }

    pub fn update_value_and_validity(&self, path: &str) -> FormResult<()> {
        let mut state = write_lock(&self.state, "recomputing validity")?;
        let id = state
            .resolve(path)
            .ok_or_else(|| FormError::UnknownPath(path.to_string()))?;
        state.revalidate(id);
        Ok(())
    }

    pub fn set_validators(
        &self,
        path: &str,
        validators: Vec<Arc<dyn FieldValidator>>,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "replacing field validators")?;
        let id = state
            .resolve(path)
            .ok_or_else(|| FormError::UnknownPath(path.to_string()))?;
        match &mut state.nodes[id.index()].kind {
            NodeKind::Field {
                validators: slot, ..
            } => *slot = validators,
            NodeKind::Group { .. } => return Err(FormError::NotAField(path.to_string())),
        }
        state.revalidate(id);
        Ok(())
    }

    pub fn clear_validators(&self, path: &str) -> FormResult<()> {
        self.set_validators(path, Vec::new())
    }

    pub fn on_change(
        &self,
        path: &str,
        handler: impl Fn(&FormTree, &Value) + Send + Sync + 'static,
    ) -> FormResult<()> {
        let id = read_lock(&self.state, "resolving change handler path")?
            .resolve(path)
            .ok_or_else(|| FormError::UnknownPath(path.to_string()))?;
        write_lock(&self.change_handlers, "registering change handler")?
            .entry(id)
            .or_default()
            .push(Arc::new(handler));
        Ok(())
    }

    pub fn value(&self, path: &str) -> FormResult<Value> {
        let state = read_lock(&self.state, "reading field value")?;
        let id = state
            .resolve(path)
            .ok_or_else(|| FormError::UnknownPath(path.to_string()))?;
        Ok(state.composite_value(id))
    }

    pub fn composite_value(&self) -> FormResult<Value> {
        let state = read_lock(&self.state, "reading composite value")?;
        Ok(state.composite_value(state.root))
    }

    pub fn meta(&self, path: &str) -> FormResult<FieldMeta> {
        let state = read_lock(&self.state, "reading field meta")?;
        let id = state
            .resolve(path)
            .ok_or_else(|| FormError::UnknownPath(path.to_string()))?;
        Ok(state.nodes[id.index()].meta.clone())
    }

    pub fn errors(&self, path: &str) -> FormResult<ErrorSet> {
        Ok(self.meta(path)?.errors)
    }

    pub fn is_dirty(&self, path: &str) -> FormResult<bool> {
        Ok(self.meta(path)?.dirty)
    }

    pub fn is_touched(&self, path: &str) -> FormResult<bool> {
        Ok(self.meta(path)?.touched)
    }

    pub fn snapshot(&self) -> FormResult<TreeSnapshot> {
        let state = read_lock(&self.state, "creating tree snapshot")?;
        let is_valid = state.nodes.iter().all(|node| node.meta.errors.is_empty());
        Ok(TreeSnapshot {
            value: state.composite_value(state.root),
            is_dirty: state.nodes[state.root.index()].meta.dirty,
            is_valid,
            messages: state.messages.clone(),
        })
    }

    pub fn save(&self) -> FormResult<String> {
        let value = self.composite_value()?;
        let json = serde_json::to_string(&value)
            .map_err(|error| FormError::SaveFailed(error.to_string()))?;
        log::info!("saved: {json}");
        Ok(json)
    }
}
