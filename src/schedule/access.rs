use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::{AgendaFilter, Store, Visibility};
use crate::types::{Agenda, Role};

/// Grants to insert and revoke to move from `existing` to `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessDiff {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

/// Order of `desired` is kept for additions; duplicates are dropped.
pub fn diff_access(existing: &[String], desired: &[String]) -> AccessDiff {
    let existing_set: BTreeSet<&str> = existing.iter().map(String::as_str).collect();
    let desired_set: BTreeSet<&str> = desired.iter().map(String::as_str).collect();

    let mut seen = BTreeSet::new();
    let to_add = desired
        .iter()
        .filter(|id| !existing_set.contains(id.as_str()) && seen.insert(id.as_str()))
        .cloned()
        .collect();

    let to_remove = existing
        .iter()
        .filter(|id| !desired_set.contains(id.as_str()))
        .cloned()
        .collect();

    AccessDiff { to_add, to_remove }
}

/// Read-only answers to "who may see this" and "who hears about this".
#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn Store>,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn visibility_for(&self, user_id: &str) -> Result<Visibility> {
        let user = self.store.get_user(user_id)?.ok_or(Error::NotFound)?;
        Ok(Visibility::for_user(&user))
    }

    pub fn visible_agendas(&self, user_id: &str, filter: &AgendaFilter) -> Result<Vec<Agenda>> {
        let visibility = self.visibility_for(user_id)?;
        self.store.list_visible_agendas(&visibility, filter)
    }

    pub fn count_visible_agendas(&self, user_id: &str, filter: &AgendaFilter) -> Result<i64> {
        let visibility = self.visibility_for(user_id)?;
        self.store.count_visible_agendas(&visibility, filter)
    }

    /// Every lecturer when the agenda is open to all of them, otherwise
    /// exactly the explicit grants.
    pub fn recipients_for(&self, agenda: &Agenda) -> Result<BTreeSet<String>> {
        if agenda.access_all_dosen {
            return Ok(self
                .store
                .list_users_by_role(Role::Dosen)?
                .into_iter()
                .map(|u| u.id)
                .collect());
        }

        Ok(self
            .store
            .list_agenda_access(&agenda.id)?
            .into_iter()
            .map(|a| a.user_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_adds_and_removes() {
        let diff = diff_access(&ids(&["d1", "d2"]), &ids(&["d1", "d3"]));
        assert_eq!(diff.to_add, ids(&["d3"]));
        assert_eq!(diff.to_remove, ids(&["d2"]));
    }

    #[test]
    fn test_diff_ignores_duplicates() {
        let diff = diff_access(&ids(&["d1"]), &ids(&["d2", "d2", "d1"]));
        assert_eq!(diff.to_add, ids(&["d2"]));
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn test_diff_same_set_is_empty() {
        assert_eq!(
            diff_access(&ids(&["d1", "d2"]), &ids(&["d2", "d1"])),
            AccessDiff::default()
        );
    }
}
