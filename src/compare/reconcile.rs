//! Working sets and the stored-content fallback.
//!
//! Exact key matching removes everything the stored snapshot already knows;
//! the remainder is cross-checked against previously stored content. An item
//! whose identifier is unmatched may still be known to the store under its
//! title (the URL or video id drifted); an item whose title is unmatched may
//! be known under its identifier (it was retitled). Both directions annotate
//! the item with the prior value instead of reporting a false difference.

use std::collections::{BTreeSet, HashMap};

use crate::snapshot::Snapshot;
use crate::storage::{ContentLookup, StorageError, StoredContent};
use crate::teaser::Teaser;

/// Result of reconciling a fresh snapshot against the stored one.
#[derive(Debug)]
pub struct Reconciliation {
    /// The latest items in fetch order, drift annotations applied.
    pub items: Vec<Teaser>,
    /// Indices into `items` that no key match or lookup could resolve.
    pub unresolved: BTreeSet<usize>,
}

/// Runs key matching and the lookup fallback.
///
/// # Errors
/// Propagates [`StorageError`] from the lookup.
pub fn reconcile(
    current: &Snapshot,
    latest: &Snapshot,
    lookup: Option<&dyn ContentLookup>,
) -> Result<Reconciliation, StorageError> {
    let mut items: Vec<Teaser> = latest.items().to_vec();

    // Working sets over the latest listing. First occurrence wins on
    // duplicate keys.
    let mut by_title: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut by_ident: HashMap<String, usize> = HashMap::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        by_title.entry(item.title_key()).or_insert(idx);
        by_ident.entry(item.ident.clone()).or_insert(idx);
    }

    // Everything the stored snapshot matches by the same key is unchanged.
    for known in current.items() {
        by_title.remove(&known.title_key());
        by_ident.remove(&known.ident);
    }

    if let Some(lookup) = lookup {
        resolve_idents_by_title(&mut items, &mut by_ident, lookup)?;
        resolve_titles_by_ident(&mut items, &mut by_title, lookup)?;
    }

    let unresolved: BTreeSet<usize> = by_title
        .values()
        .chain(by_ident.values())
        .copied()
        .collect();

    Ok(Reconciliation { items, unresolved })
}

/// Items with an unmatched identifier may be stored under their title; a hit
/// means the identifier merely drifted.
fn resolve_idents_by_title(
    items: &mut [Teaser],
    by_ident: &mut HashMap<String, usize>,
    lookup: &dyn ContentLookup,
) -> Result<(), StorageError> {
    let pending: Vec<(String, usize)> = by_ident
        .iter()
        .map(|(key, &idx)| (key.clone(), idx))
        .collect();

    for (key, idx) in pending {
        let item = &mut items[idx];
        let Some(stored) = lookup.find_by_title(item.title.trim())? else {
            continue;
        };
        annotate_ident_drift(item, &stored);
        annotate_date_drift(item, &stored);
        by_ident.remove(&key);
    }
    Ok(())
}

/// Items with an unmatched title may be stored under their identifier; a hit
/// means the item was retitled.
fn resolve_titles_by_ident(
    items: &mut [Teaser],
    by_title: &mut HashMap<String, usize>,
    lookup: &dyn ContentLookup,
) -> Result<(), StorageError> {
    let pending: Vec<(String, usize)> = by_title
        .iter()
        .map(|(key, &idx)| (key.clone(), idx))
        .collect();

    for (key, idx) in pending {
        let item = &mut items[idx];
        let Some(stored) = lookup.find_by_ident(&item.ident)? else {
            continue;
        };
        annotate_title_drift(item, &stored);
        annotate_date_drift(item, &stored);
        by_title.remove(&key);
    }
    Ok(())
}

fn annotate_ident_drift(item: &mut Teaser, stored: &StoredContent) {
    if stored.ident != item.ident && item.last_ident.is_none() {
        item.last_ident = Some(stored.ident.clone());
    }
}

fn annotate_title_drift(item: &mut Teaser, stored: &StoredContent) {
    if stored.title.trim().to_lowercase() != item.title_key() && item.last_title.is_none() {
        item.last_title = Some(stored.title.clone());
    }
}

fn annotate_date_drift(item: &mut Teaser, stored: &StoredContent) {
    if let Some(published) = stored.published {
        if item.date != Some(published) && item.last_date.is_none() {
            item.last_date = Some(published);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teaser::ContentKind;
    use chrono::NaiveDate;
    use std::sync::RwLock;

    /// Minimal in-module lookup; the full reference store lives in storage.
    #[derive(Default)]
    struct MapLookup {
        records: RwLock<Vec<StoredContent>>,
    }

    impl MapLookup {
        fn with(records: Vec<StoredContent>) -> Self {
            Self {
                records: RwLock::new(records),
            }
        }
    }

    impl ContentLookup for MapLookup {
        fn find_by_title(&self, title: &str) -> Result<Option<StoredContent>, StorageError> {
            let key = title.trim().to_lowercase();
            Ok(self
                .records
                .read()
                .map_err(|_| StorageError::BackendError("poisoned lock".into()))?
                .iter()
                .find(|c| c.title.trim().to_lowercase() == key)
                .cloned())
        }

        fn find_by_ident(&self, ident: &str) -> Result<Option<StoredContent>, StorageError> {
            Ok(self
                .records
                .read()
                .map_err(|_| StorageError::BackendError("poisoned lock".into()))?
                .iter()
                .find(|c| c.ident == ident)
                .cloned())
        }
    }

    fn snap(items: Vec<Teaser>) -> Snapshot {
        Snapshot::new(ContentKind::Page, items)
    }

    #[test]
    fn exact_matches_resolve_without_lookup() {
        let current = snap(vec![Teaser::new("a", "u1"), Teaser::new("b", "u2")]);
        let latest = snap(vec![Teaser::new("b", "u2"), Teaser::new("a", "u1")]);
        let rec = reconcile(&current, &latest, None).unwrap();
        assert!(rec.unresolved.is_empty());
    }

    #[test]
    fn title_match_is_case_insensitive() {
        let current = snap(vec![Teaser::new("Annual Report", "u1")]);
        let latest = snap(vec![Teaser::new("ANNUAL REPORT", "u1")]);
        let rec = reconcile(&current, &latest, None).unwrap();
        assert!(rec.unresolved.is_empty());
    }

    #[test]
    fn ident_drift_resolved_by_title_lookup() {
        let current = snap(vec![Teaser::new("a", "u-old")]);
        let latest = snap(vec![Teaser::new("a", "u-new")]);
        let lookup = MapLookup::with(vec![StoredContent::new("a", "u-old")]);

        let rec = reconcile(&current, &latest, Some(&lookup)).unwrap();
        assert!(rec.unresolved.is_empty());
        assert_eq!(rec.items[0].last_ident.as_deref(), Some("u-old"));
    }

    #[test]
    fn title_drift_resolved_by_ident_lookup() {
        let current = snap(vec![Teaser::new("old title", "u1")]);
        let latest = snap(vec![Teaser::new("new title", "u1")]);
        let lookup = MapLookup::with(vec![StoredContent::new("old title", "u1")]);

        let rec = reconcile(&current, &latest, Some(&lookup)).unwrap();
        assert!(rec.unresolved.is_empty());
        assert_eq!(rec.items[0].last_title.as_deref(), Some("old title"));
    }

    #[test]
    fn date_drift_is_annotated_on_resolution() {
        let old = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let new = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();

        let current = snap(vec![Teaser::new("a", "u-old").with_date(old)]);
        let latest = snap(vec![Teaser::new("a", "u-new").with_date(new)]);
        let lookup =
            MapLookup::with(vec![StoredContent::new("a", "u-old").with_published(old)]);

        let rec = reconcile(&current, &latest, Some(&lookup)).unwrap();
        assert!(rec.unresolved.is_empty());
        assert_eq!(rec.items[0].last_ident.as_deref(), Some("u-old"));
        assert_eq!(rec.items[0].last_date, Some(old));
    }

    #[test]
    fn unknown_items_stay_unresolved() {
        let current = snap(vec![Teaser::new("a", "u1")]);
        let latest = snap(vec![Teaser::new("a", "u1"), Teaser::new("brand new", "u9")]);
        let lookup = MapLookup::default();

        let rec = reconcile(&current, &latest, Some(&lookup)).unwrap();
        assert_eq!(rec.unresolved.len(), 1);
        assert!(rec.unresolved.contains(&1));
    }

    #[test]
    fn store_known_item_resolves_in_both_sets() {
        // Dropped from the listing earlier, now back: both keys are
        // unmatched against current, but the store still knows the item.
        let current = snap(vec![Teaser::new("other", "u0")]);
        let latest = snap(vec![Teaser::new("other", "u0"), Teaser::new("returning", "u7")]);
        let lookup = MapLookup::with(vec![StoredContent::new("returning", "u7")]);

        let rec = reconcile(&current, &latest, Some(&lookup)).unwrap();
        assert!(rec.unresolved.is_empty());
        assert!(!rec.items[1].is_annotated());
    }
}
