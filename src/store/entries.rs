//! Authoritative, ordered collection of tracked entries.

use chrono::Utc;
use reqwest::Url;

use crate::errors::AppError;
use crate::models::{normalize_contributors, Entry, EntryDraft, EntryPatch, RepoIdentifier};

/// In-memory entry list. Insertion order is the display order and is persisted.
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    entries: Vec<Entry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents, keeping the first entry of any duplicated id.
    pub fn replace_all(&mut self, entries: Vec<Entry>) {
        let mut seen = std::collections::HashSet::new();
        self.entries = entries
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
    }

    /// Validate a draft and append it as a new entry.
    pub fn add(&mut self, draft: EntryDraft) -> Result<Entry, AppError> {
        let identifier = RepoIdentifier::from_url_like(&draft.external_url).ok_or_else(|| {
            AppError::Validation(format!(
                "Cannot derive a project identifier from '{}'",
                draft.external_url
            ))
        })?;
        let display_name = draft.display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::Validation("Display name is required".to_string()));
        }
        let description = draft.description.trim();
        if description.is_empty() {
            return Err(AppError::Validation("Description is required".to_string()));
        }
        let secondary_url = validate_secondary_url(draft.secondary_url)?;

        let entry = Entry {
            id: uuid::Uuid::new_v4().to_string(),
            identifier,
            display_name: display_name.to_string(),
            description: description.to_string(),
            external_url: draft.external_url.trim().to_string(),
            secondary_url,
            declared_contributors: normalize_contributors(&draft.declared_contributors),
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Remove by id. Unknown ids are a no-op and return `None`.
    pub fn remove(&mut self, id: &str) -> Option<Entry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Apply a partial update to the user-editable fields.
    ///
    /// `enriched` says whether remote metadata exists for the entry, in which
    /// case name and description may be cleared.
    pub fn update(&mut self, id: &str, patch: EntryPatch, enriched: bool) -> Result<Entry, AppError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", id)))?;

        let mut updated = self.entries[index].clone();
        if let Some(name) = patch.display_name {
            let name = name.trim();
            if name.is_empty() && !enriched {
                return Err(AppError::Validation("Display name is required".to_string()));
            }
            updated.display_name = name.to_string();
        }
        if let Some(description) = patch.description {
            let description = description.trim();
            if description.is_empty() && !enriched {
                return Err(AppError::Validation("Description is required".to_string()));
            }
            updated.description = description.to_string();
        }
        if patch.secondary_url.is_some() {
            updated.secondary_url = validate_secondary_url(patch.secondary_url)?;
        }
        if let Some(handles) = patch.declared_contributors {
            updated.declared_contributors = normalize_contributors(&handles);
        }

        self.entries[index] = updated.clone();
        Ok(updated)
    }

    pub fn list(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains_identifier(&self, identifier: &RepoIdentifier) -> bool {
        self.entries.iter().any(|e| &e.identifier == identifier)
    }

    /// Distinct identifiers in first-seen order.
    pub fn identifiers(&self) -> Vec<RepoIdentifier> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .filter(|e| seen.insert(e.identifier.clone()))
            .map(|e| e.identifier.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Blank clears the link; anything else must be an http(s) URL.
fn validate_secondary_url(url: Option<String>) -> Result<Option<String>, AppError> {
    let Some(url) = url else {
        return Ok(None);
    };
    let url = url.trim();
    if url.is_empty() {
        return Ok(None);
    }
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(Some(url.to_string())),
        _ => Err(AppError::Validation(format!("Invalid secondary URL '{}'", url))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(url: &str) -> EntryDraft {
        EntryDraft {
            display_name: "Widget".to_string(),
            description: "Tracks widgets".to_string(),
            external_url: url.to_string(),
            secondary_url: None,
            declared_contributors: vec!["alice".to_string(), "alice".to_string()],
        }
    }

    #[test]
    fn test_add_assigns_id_and_identifier() {
        let mut store = EntryStore::new();
        let entry = store.add(draft("https://example.com/acme/widget")).unwrap();

        assert!(!entry.id.is_empty());
        assert_eq!(entry.identifier, RepoIdentifier::new("acme", "widget"));
        assert_eq!(entry.declared_contributors, vec!["alice".to_string()]);
        assert_eq!(store.list(), &[entry]);
    }

    #[test]
    fn test_add_rejects_underivable_url() {
        let mut store = EntryStore::new();
        let err = store.add(draft("https://example.com/")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_requires_name_and_description() {
        let mut store = EntryStore::new();
        let mut no_name = draft("acme/widget");
        no_name.display_name = "  ".to_string();
        assert!(matches!(store.add(no_name), Err(AppError::Validation(_))));

        let mut no_description = draft("acme/widget");
        no_description.description = String::new();
        assert!(matches!(store.add(no_description), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_add_validates_secondary_url_format() {
        let mut store = EntryStore::new();
        let mut bad = draft("acme/widget");
        bad.secondary_url = Some("ftp://demo".to_string());
        assert!(matches!(store.add(bad), Err(AppError::Validation(_))));

        let mut good = draft("acme/widget");
        good.secondary_url = Some("https://widget.example.com".to_string());
        let entry = store.add(good).unwrap();
        assert_eq!(entry.secondary_url.as_deref(), Some("https://widget.example.com"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = EntryStore::new();
        let entry = store.add(draft("acme/widget")).unwrap();

        assert!(store.remove(&entry.id).is_some());
        assert!(store.remove(&entry.id).is_none());
        assert!(store.remove("never-existed").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_keeps_insertion_order() {
        let mut store = EntryStore::new();
        let a = store.add(draft("acme/a")).unwrap();
        let b = store.add(draft("acme/b")).unwrap();
        let c = store.add(draft("acme/c")).unwrap();
        store.remove(&b.id);

        let ids: Vec<&str> = store.list().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), c.id.as_str()]);
    }

    #[test]
    fn test_update_patches_only_given_fields() {
        let mut store = EntryStore::new();
        let entry = store.add(draft("acme/widget")).unwrap();

        let patch = EntryPatch {
            description: Some("New description".to_string()),
            declared_contributors: Some(vec!["bob".to_string(), "carol".to_string()]),
            ..Default::default()
        };
        let updated = store.update(&entry.id, patch, false).unwrap();

        assert_eq!(updated.display_name, "Widget");
        assert_eq!(updated.description, "New description");
        assert_eq!(updated.declared_contributors, vec!["bob", "carol"]);
        assert_eq!(updated.identifier, entry.identifier);
        assert_eq!(updated.created_at, entry.created_at);
        assert_eq!(store.get(&entry.id), Some(&updated));
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let mut store = EntryStore::new();
        let err = store
            .update("missing", EntryPatch::default(), false)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_update_blank_name_allowed_only_when_enriched() {
        let mut store = EntryStore::new();
        let entry = store.add(draft("acme/widget")).unwrap();
        let blank = EntryPatch {
            display_name: Some(String::new()),
            ..Default::default()
        };

        assert!(matches!(
            store.update(&entry.id, blank.clone(), false),
            Err(AppError::Validation(_))
        ));
        assert_eq!(store.get(&entry.id).unwrap().display_name, "Widget");

        let updated = store.update(&entry.id, blank, true).unwrap();
        assert_eq!(updated.display_name, "");
    }

    #[test]
    fn test_identifiers_are_distinct() {
        let mut store = EntryStore::new();
        store.add(draft("acme/widget")).unwrap();
        store.add(draft("https://github.com/acme/widget")).unwrap();
        store.add(draft("acme/gadget")).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(
            store.identifiers(),
            vec![
                RepoIdentifier::new("acme", "widget"),
                RepoIdentifier::new("acme", "gadget")
            ]
        );
    }

    #[test]
    fn test_replace_all_drops_duplicate_ids() {
        let mut store = EntryStore::new();
        let entry = store.add(draft("acme/widget")).unwrap();
        let mut seeded = EntryStore::new();
        seeded.replace_all(vec![entry.clone(), entry]);
        assert_eq!(seeded.len(), 1);
    }
}
