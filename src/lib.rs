mod builder;
mod changes;
mod messages;
mod node;
mod tree;
mod validators;

#[cfg(test)]
mod tests;

pub use builder::{FieldSpec, GroupSpec};
pub use changes::{ChangeTicket, changed_path};
pub use messages::MessageCatalog;
pub use node::{ErrorDetail, ErrorKind, ErrorSet, FieldMeta, Value};
pub use tree::{FormError, FormResult, FormTree, TreeOptions, TreeSnapshot};
pub use validators::{
    ChildValue, FieldValidator, FieldValidatorRef, GroupValidator, GroupValidatorRef, email_format,
    max_length, min_length, numeric_range, required, values_match,
};
