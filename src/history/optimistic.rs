use crate::models::Identified;

/// A local removal that can be undone if the backend refuses it.
#[derive(Debug, Clone)]
pub struct OptimisticRemoval<T> {
    previous: Vec<T>,
    previous_active: Option<String>,
    removed_id: String,
}

impl<T: Identified + Clone> OptimisticRemoval<T> {
    /// Remove `id` from `items`, clearing `active` if it pointed at it.
    pub fn apply(items: &mut Vec<T>, active: &mut Option<String>, id: &str) -> Self {
        let removal = Self {
            previous: items.clone(),
            previous_active: active.clone(),
            removed_id: id.to_string(),
        };
        items.retain(|item| item.id() != id);
        if active.as_deref() == Some(id) {
            *active = None;
        }
        removal
    }

    pub fn removed_id(&self) -> &str {
        &self.removed_id
    }

    pub fn was_active(&self) -> bool {
        self.previous_active.as_deref() == Some(self.removed_id.as_str())
    }

    /// Put everything back. Returns true when the active selection was the
    /// removed item and has been restored.
    pub fn rollback(self, items: &mut Vec<T>, active: &mut Option<String>) -> bool {
        let restored = self.was_active();
        *items = self.previous;
        *active = self.previous_active;
        restored
    }
}
