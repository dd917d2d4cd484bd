use futures_timer::Delay;

use crate::node::Value;
use crate::tree::{FormResult, FormTree, read_lock, write_lock};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ChangeTicket(pub u64);

/// Assumes exactly one leaf changed since `old` was taken; with several
/// simultaneous edits the first differing key in insertion order wins.
pub fn changed_path(old: &Value, new: &Value) -> Option<String> {
    let (Value::Composite(old_entries), Value::Composite(new_entries)) = (old, new) else {
        return None;
    };
    for (name, new_child) in new_entries {
        let old_child = old_entries.get(name);
        if old_child == Some(new_child) {
            continue;
        }
        if let (Some(old_child @ Value::Composite(_)), Value::Composite(_)) = (old_child, new_child)
        {
            return changed_path(old_child, new_child).map(|nested| format!("{name}.{nested}"));
        }
        return Some(name.clone());
    }
    None
}

impl FormTree {
    pub fn flush_changes(&self) -> FormResult<Option<String>> {
        let changed = {
            let mut state = write_lock(&self.state, "flushing change snapshot")?;
            let current = state.composite_value(state.root);
            let changed = changed_path(&state.snapshot, &current);
            state.snapshot = current;
            changed
        };
        if let Some(path) = &changed {
            log::debug!("value change resolved to {path}");
            self.set_message(path)?;
        }
        Ok(changed)
    }

    pub async fn set_value_debounced(
        &self,
        path: &str,
        value: impl Into<Value>,
    ) -> FormResult<Option<String>> {
        self.set_value(path, value)?;
        let ticket = {
            let mut state = write_lock(&self.state, "scheduling debounced change pass")?;
            state.change_ticket += 1;
            ChangeTicket(state.change_ticket)
        };
        if !self.options.change_debounce.is_zero() {
            Delay::new(self.options.change_debounce).await;
            let latest = read_lock(&self.state, "checking latest change ticket")?.change_ticket;
            if latest != ticket.0 {
                return Ok(None);
            }
        }
        self.flush_changes()
    }
}
