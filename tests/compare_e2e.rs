use chrono::NaiveDate;

use sourcewatch::{
    compare, CompareResult, ContentKind, ContentStore, InMemoryContentStore, ShrinkGuard,
    Snapshot, StoredContent, Teaser,
};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn pages(items: &[(&str, &str)]) -> Snapshot {
    Snapshot::new(
        ContentKind::Page,
        items.iter().map(|(t, u)| Teaser::new(*t, *u)).collect(),
    )
}

fn videos(items: &[(&str, &str)]) -> Snapshot {
    Snapshot::new(
        ContentKind::Video,
        items.iter().map(|(t, v)| Teaser::new(*t, *v)).collect(),
    )
}

#[test]
fn comparing_a_snapshot_to_itself_is_unchanged() {
    let snapshot = pages(&[("a", "u1"), ("b", "u2"), ("c", "u3")]);
    let result = compare(&snapshot, &snapshot.clone(), None, ShrinkGuard::Enforce).unwrap();
    let CompareResult::Unchanged { snapshot: kept } = result else {
        panic!("expected unchanged, got {result:?}");
    };
    assert_eq!(kept, snapshot);
}

#[test]
fn any_permutation_of_identical_items_is_unchanged() {
    let items = [("a", "u1"), ("b", "u2"), ("c", "u3"), ("d", "u4")];
    let current = pages(&items);

    let permutations = [
        [("d", "u4"), ("c", "u3"), ("b", "u2"), ("a", "u1")],
        [("b", "u2"), ("a", "u1"), ("d", "u4"), ("c", "u3")],
        [("c", "u3"), ("a", "u1"), ("d", "u4"), ("b", "u2")],
    ];

    for permuted in permutations {
        let latest = pages(&permuted);
        let result = compare(&current, &latest, None, ShrinkGuard::Enforce).unwrap();
        assert!(
            matches!(result, CompareResult::Unchanged { .. }),
            "permutation {permuted:?} produced {result:?}"
        );
    }
}

#[test]
fn pure_additions_form_exactly_the_diff() {
    let current = pages(&[("a", "u1"), ("b", "u2")]);
    let latest = pages(&[("a", "u1"), ("b", "u2"), ("new 1", "u8"), ("new 2", "u9")]);

    let CompareResult::Changed { diff, .. } =
        compare(&current, &latest, None, ShrinkGuard::Enforce).unwrap()
    else {
        panic!("expected change");
    };

    assert_eq!(diff.count(), 2);
    assert_eq!(diff.kind(), ContentKind::Page);
    let titles: Vec<&str> = diff.items().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["new 1", "new 2"]);
}

#[test]
fn video_items_are_keyed_by_video_id_not_url() {
    // Same title as a stored item but a different video id: still new.
    let current = videos(&[("Weekly update", "vid-001")]);
    let latest = videos(&[("Weekly update", "vid-001"), ("Weekly update", "vid-002")]);

    let CompareResult::Changed { diff, .. } =
        compare(&current, &latest, None, ShrinkGuard::Skip).unwrap()
    else {
        panic!("expected change");
    };
    assert_eq!(diff.count(), 1);
    assert_eq!(diff.items()[0].ident, "vid-002");

    // The diff document carries the video identifier field.
    let doc = diff.to_document();
    assert_eq!(doc["video"][0]["video_id"], "vid-002");
}

#[test]
fn retitled_item_resolves_through_identifier_lookup() {
    let store = InMemoryContentStore::new();
    store
        .upsert(StoredContent::new("Original headline", "https://example.org/story"))
        .unwrap();

    let current = pages(&[("Original headline", "https://example.org/story")]);
    let latest = pages(&[("Updated headline", "https://example.org/story")]);

    let CompareResult::Unchanged { snapshot } =
        compare(&current, &latest, Some(&store), ShrinkGuard::Enforce).unwrap()
    else {
        panic!("expected unchanged");
    };

    assert_eq!(
        snapshot.items()[0].last_title.as_deref(),
        Some("Original headline")
    );
}

#[test]
fn moved_item_resolves_through_title_lookup() {
    let store = InMemoryContentStore::new();
    store
        .upsert(StoredContent::new("Annual report", "https://example.org/old-path"))
        .unwrap();

    let current = pages(&[("Annual report", "https://example.org/old-path")]);
    let latest = pages(&[("Annual report", "https://example.org/new-path")]);

    let CompareResult::Unchanged { snapshot } =
        compare(&current, &latest, Some(&store), ShrinkGuard::Enforce).unwrap()
    else {
        panic!("expected unchanged");
    };

    assert_eq!(
        snapshot.items()[0].last_ident.as_deref(),
        Some("https://example.org/old-path")
    );
    // On the wire the annotation is the kind-specific field.
    let doc = snapshot.to_document();
    assert_eq!(doc["page"][0]["last_url"], "https://example.org/old-path");
}

#[test]
fn moved_video_records_last_video_id() {
    let store = InMemoryContentStore::new();
    store
        .upsert(StoredContent::new("Keynote", "vid-old").with_published(date("2026-02-01")))
        .unwrap();

    let current = videos(&[("Keynote", "vid-old")]);
    let latest = Snapshot::new(
        ContentKind::Video,
        vec![Teaser::new("Keynote", "vid-new").with_date(date("2026-02-03"))],
    );

    let CompareResult::Unchanged { snapshot } =
        compare(&current, &latest, Some(&store), ShrinkGuard::Skip).unwrap()
    else {
        panic!("expected unchanged");
    };

    let item = &snapshot.items()[0];
    assert_eq!(item.last_ident.as_deref(), Some("vid-old"));
    assert_eq!(item.last_date, Some(date("2026-02-01")));

    let doc = snapshot.to_document();
    assert_eq!(doc["video"][0]["last_video_id"], "vid-old");
    assert_eq!(doc["video"][0]["last_date"], "2026-02-01");
}

#[test]
fn massive_shrinkage_is_an_anomaly_not_a_diff() {
    let current = Snapshot::new(
        ContentKind::Page,
        (0..100)
            .map(|i| Teaser::new(format!("title {i}"), format!("https://example.org/{i}")))
            .collect(),
    );
    let latest = Snapshot::new(
        ContentKind::Page,
        (0..40)
            .map(|i| Teaser::new(format!("title {i}"), format!("https://example.org/{i}")))
            .collect(),
    );

    let CompareResult::Anomaly { decrease_pct } =
        compare(&current, &latest, None, ShrinkGuard::Enforce).unwrap()
    else {
        panic!("expected anomaly");
    };
    assert!((decrease_pct - 60.0).abs() < 1e-9);
}

#[test]
fn shrinkage_at_the_limit_is_still_compared() {
    let current = pages(&[("a", "u1"), ("b", "u2")]);
    let latest = pages(&[("a", "u1")]);

    // 50% decrease is at the limit, not over it; removal-only changes
    // produce an empty diff because the diff tracks unreconcilable items in
    // the latest listing.
    let result = compare(&current, &latest, None, ShrinkGuard::Enforce).unwrap();
    assert!(matches!(result, CompareResult::Unchanged { .. }));
}

#[test]
fn empty_stored_snapshot_reports_everything_as_new() {
    let current = Snapshot::empty(ContentKind::Page);
    let latest = pages(&[("a", "u1"), ("b", "u2")]);

    let CompareResult::Changed {
        diff,
        difference_pct,
        ..
    } = compare(&current, &latest, None, ShrinkGuard::Enforce).unwrap()
    else {
        panic!("expected change");
    };
    assert_eq!(diff.count(), 2);
    assert!((difference_pct - 100.0).abs() < 1e-9);
}
