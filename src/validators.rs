use std::sync::{Arc, LazyLock};

use regex::Regex;
use rust_decimal::Decimal;

use crate::node::{ErrorDetail, ErrorKind, ErrorSet, Value};

pub trait FieldValidator: Send + Sync {
    fn validate(&self, value: &Value) -> Option<ErrorSet>;
}

impl<F> FieldValidator for F
where
    F: for<'a> Fn(&'a Value) -> Option<ErrorSet> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Option<ErrorSet> {
        (self)(value)
    }
}

#[derive(Clone, Debug)]
pub struct ChildValue {
    pub name: String,
    pub value: Value,
    pub pristine: bool,
}

pub trait GroupValidator: Send + Sync {
    fn validate(&self, children: &[ChildValue]) -> Option<ErrorSet>;
}

impl<F> GroupValidator for F
where
    F: for<'a> Fn(&'a [ChildValue]) -> Option<ErrorSet> + Send + Sync,
{
    fn validate(&self, children: &[ChildValue]) -> Option<ErrorSet> {
        (self)(children)
    }
}

pub type FieldValidatorRef = Arc<dyn FieldValidator>;
pub type GroupValidatorRef = Arc<dyn GroupValidator>;

fn single(kind: ErrorKind, detail: ErrorDetail) -> Option<ErrorSet> {
    Some(ErrorSet::from([(kind, detail)]))
}

pub fn required() -> impl FieldValidator {
    |value: &Value| {
        if value.is_empty() {
            single(ErrorKind::REQUIRED, ErrorDetail::Flag)
        } else {
            None
        }
    }
}

pub fn min_length(limit: usize) -> impl FieldValidator {
    move |value: &Value| match value.as_str() {
        Some(text) if !text.is_empty() && text.chars().count() < limit => {
            single(ErrorKind::MIN_LENGTH, ErrorDetail::Length { limit })
        }
        _ => None,
    }
}

pub fn max_length(limit: usize) -> impl FieldValidator {
    move |value: &Value| match value.as_str() {
        Some(text) if text.chars().count() > limit => {
            single(ErrorKind::MAX_LENGTH, ErrorDetail::Length { limit })
        }
        _ => None,
    }
}

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

pub fn email_format() -> impl FieldValidator {
    |value: &Value| match value.as_str() {
        Some(text) if !text.is_empty() && !EMAIL_SHAPE.is_match(text) => {
            single(ErrorKind::EMAIL, ErrorDetail::Flag)
        }
        _ => None,
    }
}

// An unset value is valid; emptiness is required()'s concern.
pub fn numeric_range(min: Decimal, max: Decimal) -> impl FieldValidator {
    move |value: &Value| {
        if value.is_null() {
            return None;
        }
        match value.as_decimal() {
            Some(number) if number >= min && number <= max => None,
            _ => single(ErrorKind::RANGE, ErrorDetail::Range { min, max }),
        }
    }
}

pub fn values_match<I, S>(names: I) -> impl GroupValidator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    move |children: &[ChildValue]| {
        let mut participants = Vec::with_capacity(names.len());
        for name in &names {
            match children.iter().find(|child| &child.name == name) {
                Some(child) => participants.push(child),
                None => {
                    log::warn!("values_match references unknown child {name}");
                    return None;
                }
            }
        }
        let first = participants.first()?;
        if participants.iter().any(|child| child.pristine) {
            return None;
        }
        if participants.iter().any(|child| child.value != first.value) {
            return single(ErrorKind::MATCH, ErrorDetail::Flag);
        }
        None
    }
}
