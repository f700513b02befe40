//! Snapshot comparison and reconciliation.
//!
//! The comparator classifies the difference between the stored snapshot and a
//! freshly fetched one. Titles and identifiers can each drift independently
//! (retitled articles, redirected URLs, corrected timestamps), so matching on
//! either key alone produces false positives; both are attempted, and
//! whatever remains is cross-checked against previously stored content before
//! concluding that a genuine addition occurred.
//!
//! The abnormal-shrinkage case is a distinct result variant, not an error:
//! callers must handle it explicitly and treat it as a crawl anomaly rather
//! than a mass-deletion diff.

/// Working sets and the stored-content fallback.
pub mod reconcile;

use crate::error::{WatchError, WatchResult};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::storage::ContentLookup;
use crate::teaser::ContentKind;

/// Shrinkage above this share of the stored listing is a crawl anomaly.
pub const SHRINK_LIMIT_PCT: f64 = 50.0;

/// Whether the abnormal-shrinkage guard is enforced for a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkGuard {
    /// Reject abnormal shrinkage as an anomaly.
    Enforce,
    /// Accept any shrinkage (content types with legitimate fluctuation).
    Skip,
}

impl ShrinkGuard {
    /// Default guard for a content kind: video listings are exempt.
    #[must_use]
    pub fn for_kind(kind: ContentKind) -> Self {
        if kind.shrink_guarded() {
            Self::Enforce
        } else {
            Self::Skip
        }
    }
}

/// Classification of a fresh snapshot against the stored one.
#[derive(Debug, Clone, PartialEq)]
pub enum CompareResult {
    /// No material change.
    Unchanged {
        /// The reconciled latest snapshot, carrying any drift annotations;
        /// this is what the monitor persists.
        snapshot: Snapshot,
    },

    /// Material difference requiring human confirmation.
    Changed {
        /// Items present in the latest snapshot that could not be reconciled.
        diff: Snapshot,
        /// The reconciled latest snapshot to persist.
        snapshot: Snapshot,
        /// Share of the latest listing that is unresolved, in percent.
        difference_pct: f64,
    },

    /// Abnormal item-count collapse; treated as a broken crawl, never as a
    /// content change.
    Anomaly {
        /// Shrinkage relative to the stored listing, in percent.
        decrease_pct: f64,
    },
}

/// Compares two snapshots of the same kind.
///
/// `lookup`, when given, is consulted only for items that exact key matching
/// left unresolved. The guard fires before any diffing: a latest listing
/// less than half the stored size is an anomaly, not a change.
///
/// # Errors
/// Returns [`WatchError::Snapshot`] on a kind mismatch and propagates
/// [`WatchError::Storage`] from the lookup.
pub fn compare(
    current: &Snapshot,
    latest: &Snapshot,
    lookup: Option<&dyn ContentLookup>,
    guard: ShrinkGuard,
) -> WatchResult<CompareResult> {
    if current.kind() != latest.kind() {
        return Err(WatchError::Snapshot(SnapshotError::KindMismatch {
            expected: current.kind(),
            actual: latest.kind(),
        }));
    }

    if guard == ShrinkGuard::Enforce && latest.count() < current.count() {
        #[allow(clippy::cast_precision_loss)]
        let decrease_pct =
            (current.count() - latest.count()) as f64 / current.count() as f64 * 100.0;
        if decrease_pct > SHRINK_LIMIT_PCT {
            return Ok(CompareResult::Anomaly { decrease_pct });
        }
    }

    // Structurally identical listings need no reconciliation.
    if current == latest {
        return Ok(CompareResult::Unchanged {
            snapshot: latest.clone(),
        });
    }

    let outcome = reconcile::reconcile(current, latest, lookup)?;
    let kind = latest.kind();

    if outcome.unresolved.is_empty() {
        return Ok(CompareResult::Unchanged {
            snapshot: Snapshot::new(kind, outcome.items),
        });
    }

    let diff_items = outcome
        .unresolved
        .iter()
        .map(|&idx| outcome.items[idx].clone())
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let difference_pct =
        outcome.unresolved.len() as f64 / latest.count().max(1) as f64 * 100.0;

    Ok(CompareResult::Changed {
        diff: Snapshot::new(kind, diff_items),
        snapshot: Snapshot::new(kind, outcome.items),
        difference_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teaser::Teaser;

    fn page(titles_urls: &[(&str, &str)]) -> Snapshot {
        Snapshot::new(
            ContentKind::Page,
            titles_urls
                .iter()
                .map(|(t, u)| Teaser::new(*t, *u))
                .collect(),
        )
    }

    #[test]
    fn identical_snapshots_are_unchanged() {
        let current = page(&[("a", "u1"), ("b", "u2")]);
        let result = compare(&current, &current.clone(), None, ShrinkGuard::Enforce).unwrap();
        assert!(matches!(result, CompareResult::Unchanged { .. }));
    }

    #[test]
    fn permuted_snapshots_are_unchanged() {
        let current = page(&[("a", "u1"), ("b", "u2"), ("c", "u3")]);
        let latest = page(&[("c", "u3"), ("a", "u1"), ("b", "u2")]);
        let result = compare(&current, &latest, None, ShrinkGuard::Enforce).unwrap();
        assert!(matches!(result, CompareResult::Unchanged { .. }));
    }

    #[test]
    fn additions_form_the_diff() {
        let current = page(&[("a", "u1")]);
        let latest = page(&[("a", "u1"), ("b", "u2"), ("c", "u3")]);
        let CompareResult::Changed {
            diff,
            difference_pct,
            ..
        } = compare(&current, &latest, None, ShrinkGuard::Enforce).unwrap()
        else {
            panic!("expected change");
        };
        assert_eq!(diff.count(), 2);
        assert_eq!(diff.items()[0].title, "b");
        assert_eq!(diff.items()[1].title, "c");
        assert!((difference_pct - 2.0 / 3.0 * 100.0).abs() < 1e-9);
    }

    fn numbered(n: usize) -> Snapshot {
        Snapshot::new(
            ContentKind::Page,
            (0..n)
                .map(|i| Teaser::new(format!("t{i}"), format!("u{i}")))
                .collect(),
        )
    }

    #[test]
    fn abnormal_shrinkage_is_an_anomaly() {
        let current = numbered(100);
        let latest = numbered(40);

        let CompareResult::Anomaly { decrease_pct } =
            compare(&current, &latest, None, ShrinkGuard::Enforce).unwrap()
        else {
            panic!("expected anomaly");
        };
        assert!((decrease_pct - 60.0).abs() < 1e-9);

        // The same shrinkage with the guard off is just a small diff-less fetch.
        let result = compare(&current, &latest, None, ShrinkGuard::Skip).unwrap();
        assert!(matches!(result, CompareResult::Unchanged { .. }));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let current = Snapshot::empty(ContentKind::Page);
        let latest = Snapshot::empty(ContentKind::Video);
        let err = compare(&current, &latest, None, ShrinkGuard::Enforce).unwrap_err();
        assert!(matches!(err, WatchError::Snapshot(SnapshotError::KindMismatch { .. })));
    }

    #[test]
    fn video_guard_defaults_off() {
        assert_eq!(ShrinkGuard::for_kind(ContentKind::Video), ShrinkGuard::Skip);
        assert_eq!(ShrinkGuard::for_kind(ContentKind::Page), ShrinkGuard::Enforce);
        assert_eq!(ShrinkGuard::for_kind(ContentKind::Event), ShrinkGuard::Enforce);
    }
}
