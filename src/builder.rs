use std::sync::Arc;

use crate::node::Value;
use crate::validators::{FieldValidator, GroupValidator};

pub struct FieldSpec {
    pub(crate) initial: Value,
    pub(crate) validators: Vec<Arc<dyn FieldValidator>>,
}

impl FieldSpec {
    pub fn new(initial: impl Into<Value>) -> Self {
        Self {
            initial: initial.into(),
            validators: Vec::new(),
        }
    }

    pub fn validator(mut self, validator: impl FieldValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }
}

pub(crate) enum NodeSpec {
    Field(FieldSpec),
    Group(GroupSpec),
}

pub struct GroupSpec {
    pub(crate) children: Vec<(String, NodeSpec)>,
    pub(crate) validators: Vec<Arc<dyn GroupValidator>>,
}

impl GroupSpec {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            validators: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.children.push((name.into(), NodeSpec::Field(spec)));
        self
    }

    pub fn group(mut self, name: impl Into<String>, spec: GroupSpec) -> Self {
        self.children.push((name.into(), NodeSpec::Group(spec)));
        self
    }

    pub fn validator(mut self, validator: impl GroupValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }
}

impl Default for GroupSpec {
    fn default() -> Self {
        Self::new()
    }
}
