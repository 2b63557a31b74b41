//! Integration scenarios from the subsystem's testable-properties list:
//! end-to-end create → map → execute runs against the in-memory test double
//! in `tests/support`.

mod support;

use abs_import_contracts::ids::{ForeignMediaId, ForeignUserId};
use abs_import_core::executor::execute;
use abs_import_core::import::{
    create_import, set_book_mapping, set_user_mapping, EntityFilter, ImportRepository,
    SessionFilter, SessionStatus,
};
use abs_import_core::parser::{ParsedBackup, ParsedLibraryItem, ParsedProgress, ParsedSession, ParsedUser};

use support::{book_record, user_record, FakeCatalog, FakeImportRepo, FlakyImportRepo};

fn backup_with_one_session(
    foreign_user: &str,
    foreign_book: &str,
    asin: &str,
    foreign_duration_ms: i64,
    session_start: i64,
    session_end: i64,
) -> ParsedBackup {
    ParsedBackup {
        users: vec![ParsedUser {
            id: foreign_user.into(),
            username: "alice".into(),
            email: Some("alice@x.com".into()),
            progress: Vec::new(),
        }],
        library_items: vec![ParsedLibraryItem {
            id: foreign_book.into(),
            media_id: None,
            title: "Storm".into(),
            primary_author: "Some Author".into(),
            asin: Some(asin.into()),
            isbn: None,
            duration_ms: foreign_duration_ms,
            path: None,
        }],
        sessions: vec![ParsedSession {
            id: "fs1".into(),
            user_id: foreign_user.into(),
            library_item_id: foreign_book.into(),
            started_at_ms: 1_700_000_000_000,
            duration_ms: session_end - session_start,
            start_position_ms: session_start,
            end_position_ms: session_end,
            display_title: Some("Storm".into()),
        }],
    }
}

/// Scenario 1: auto-map by email (user) and ASIN (book), then execute one
/// session; the duration clamp caps the reconstructed position at 98% of
/// the local book's duration.
#[tokio::test]
async fn auto_map_by_email_and_asin_then_execute_clamps_position() {
    let catalog = FakeCatalog::new();
    let local_user = user_record("alice@x.com", "alice_local");
    let mut local_book = book_record("Storm", "Some Author", 60_000);
    local_book.asin = Some("A1".into());
    let local_user_id = local_user.id;
    let local_book_id = local_book.id;
    catalog.seed_user(local_user);
    catalog.seed_book(local_book);

    let repo = FakeImportRepo::new();
    let backup = backup_with_one_session("fu1", "fb1", "A1", 60_100, 0, 60_050);

    let import = create_import(&repo, &catalog, "backup.json".into(), None, &backup)
        .await
        .unwrap();

    assert_eq!(import.mapped.users, 1);
    assert_eq!(import.mapped.books, 1);

    let ready = repo
        .list_imported_sessions(import.id, SessionFilter::Ready)
        .await
        .unwrap();
    assert_eq!(ready.len(), 1);

    let report = execute(&repo, &catalog, import.id).await.unwrap();
    assert_eq!(report.sessions_imported, 1);
    assert_eq!(report.events_created, 1);

    let state = catalog
        .playback
        .read()
        .unwrap()
        .get(&(local_user_id, local_book_id))
        .cloned()
        .unwrap();
    assert_eq!(state.current_position_ms, (60_000_f64 * 0.98).floor() as i64);
    assert!(!state.is_finished);

    // The durable summary must converge to the imported session count (§3, §8).
    let import = repo.get_import(import.id).await.unwrap();
    assert_eq!(import.mapped.sessions_imported, 1);
}

/// Scenario 2: a foreign progress entry marked finished, with no sessions,
/// produces a reading session but no listening event, and carries the
/// finished flag onto playback state once events do arrive.
#[tokio::test]
async fn finished_progress_carries_without_sessions() {
    let catalog = FakeCatalog::new();
    let local_user = user_record("alice@x.com", "alice_local");
    let mut local_book = book_record("Storm", "Some Author", 60_000);
    local_book.asin = Some("A1".into());
    catalog.seed_user(local_user);
    catalog.seed_book(local_book);

    let repo = FakeImportRepo::new();
    let backup = ParsedBackup {
        users: vec![ParsedUser {
            id: "fu1".into(),
            username: "alice".into(),
            email: Some("alice@x.com".into()),
            progress: vec![ParsedProgress {
                abs_media_id: "fb1".into(),
                current_time_ms: 61_000,
                duration_ms: 60_100,
                fraction: 1.0,
                is_finished: true,
                last_update_ms: 1_700_000_100_000,
                finished_at_ms: Some(1_700_000_100_000),
            }],
        }],
        library_items: vec![ParsedLibraryItem {
            id: "fb1".into(),
            media_id: None,
            title: "Storm".into(),
            primary_author: "Some Author".into(),
            asin: Some("A1".into()),
            isbn: None,
            duration_ms: 60_100,
            path: None,
        }],
        sessions: Vec::new(),
    };

    let import = create_import(&repo, &catalog, "backup.json".into(), None, &backup)
        .await
        .unwrap();

    let report = execute(&repo, &catalog, import.id).await.unwrap();
    assert_eq!(report.events_created, 0);
    assert_eq!(report.reading_sessions_created, 1);

    let sessions = catalog.reading_sessions.read().unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_completed);
    assert!(sessions[0].finished_at.is_some());
    drop(sessions);

    // The finished-carry progress entry has been consumed; it must not
    // linger in `ready` forever (§3 lifecycle terminal state).
    let applied = repo
        .list_imported_progress(import.id, EntityFilter::Mapped)
        .await
        .unwrap();
    assert_eq!(applied.len(), 1);
}

/// Scenario 3: a session referencing `LibraryItem.id` while the
/// `ImportedBook` is keyed by `mediaId` is normalized onto the canonical
/// key at creation time, and subsequently becomes ready once mapped.
#[tokio::test]
async fn session_book_id_variant_normalizes_to_canonical_key() {
    let catalog = FakeCatalog::new();
    // Neither the user nor the book auto-matches, so the session starts
    // pending and the test drives it to `ready` through explicit mapping.
    let local_user = user_record("nomatch@x.com", "nobody");
    let local_user_id = local_user.id;
    let local_book = book_record("A Completely Different Title", "Nobody In Particular", 60_000);
    catalog.seed_user(local_user);
    catalog.seed_book(local_book.clone());

    let repo = FakeImportRepo::new();
    let backup = ParsedBackup {
        users: vec![ParsedUser {
            id: "fu1".into(),
            username: "alice".into(),
            email: Some("alice@x.com".into()),
            progress: Vec::new(),
        }],
        library_items: vec![ParsedLibraryItem {
            id: "li1".into(),
            media_id: Some("m1".into()),
            title: "Storm".into(),
            primary_author: "Some Author".into(),
            asin: None,
            isbn: None,
            duration_ms: 60_000,
            path: None,
        }],
        sessions: vec![ParsedSession {
            id: "fs1".into(),
            user_id: "fu1".into(),
            library_item_id: "li1".into(),
            started_at_ms: 1_700_000_000_000,
            duration_ms: 1_000,
            start_position_ms: 0,
            end_position_ms: 1_000,
            display_title: None,
        }],
    };

    let import = create_import(&repo, &catalog, "backup.json".into(), None, &backup)
        .await
        .unwrap();

    // The session references the raw `LibraryItem.id`; creation normalizes
    // it onto the canonical key (the item's own id, here unchanged since
    // `li1` carries no distinct `mediaId` collision) and it stays pending.
    let session = repo
        .get_imported_session(import.id, &"fs1".into())
        .await
        .unwrap();
    assert_eq!(session.foreign_media_id, ForeignMediaId::from("li1"));
    assert_eq!(session.status, SessionStatus::PendingUser);

    set_user_mapping(&repo, &catalog, import.id, &"fu1".into(), Some(local_user_id))
        .await
        .unwrap();
    let session = repo
        .get_imported_session(import.id, &"fs1".into())
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::PendingBook);

    // Mapping `m1` (the `mediaId` variant) must resolve onto the same
    // canonical `li1` row the session was normalized against.
    set_book_mapping(&repo, &catalog, import.id, &"li1".into(), Some(local_book.id))
        .await
        .unwrap();
    let session = repo
        .get_imported_session(import.id, &"fs1".into())
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::Ready);
}

/// Scenario 4: mapping edits drive both sessions for a shared
/// `(user, book)` pair through `pendingUser` → `pendingBook` → `ready`, and
/// clearing the user mapping reverts unexecuted sessions.
#[tokio::test]
async fn mapping_edit_transitions_both_sessions_for_the_pair() {
    let catalog = FakeCatalog::new();
    let local_user = user_record("nomatch@x.com", "nobody");
    let local_user_id = local_user.id;
    let local_book = book_record("Different Title", "Different Author", 0);
    let local_book_id = local_book.id;
    catalog.seed_user(local_user);
    catalog.seed_book(local_book);

    let repo = FakeImportRepo::new();
    let mut backup = backup_with_one_session("fu1", "fb1", "NOASIN", 1_000, 0, 500);
    backup.sessions.push(ParsedSession {
        id: "fs2".into(),
        user_id: "fu1".into(),
        library_item_id: "fb1".into(),
        started_at_ms: 1_700_000_000_500,
        duration_ms: 200,
        start_position_ms: 500,
        end_position_ms: 700,
        display_title: None,
    });
    // no ASIN/ISBN/path/title match, so the book starts unmapped too.
    backup.library_items[0].asin = None;

    let import = create_import(&repo, &catalog, "backup.json".into(), None, &backup)
        .await
        .unwrap();

    for id in ["fs1", "fs2"] {
        let s = repo.get_imported_session(import.id, &id.into()).await.unwrap();
        assert_eq!(s.status, SessionStatus::PendingUser);
    }

    set_user_mapping(&repo, &catalog, import.id, &"fu1".into(), Some(local_user_id))
        .await
        .unwrap();
    for id in ["fs1", "fs2"] {
        let s = repo.get_imported_session(import.id, &id.into()).await.unwrap();
        assert_eq!(s.status, SessionStatus::PendingBook);
    }

    set_book_mapping(&repo, &catalog, import.id, &"fb1".into(), Some(local_book_id))
        .await
        .unwrap();
    for id in ["fs1", "fs2"] {
        let s = repo.get_imported_session(import.id, &id.into()).await.unwrap();
        assert_eq!(s.status, SessionStatus::Ready);
    }

    set_user_mapping(&repo, &catalog, import.id, &"fu1".into(), None)
        .await
        .unwrap();
    for id in ["fs1", "fs2"] {
        let s = repo.get_imported_session(import.id, &id.into()).await.unwrap();
        assert_eq!(s.status, SessionStatus::PendingUser);
    }
}

/// Scenario 6: counter correctness on partial failure — a repository that
/// rejects every 5th imported-user write still leaves `Import.mapped.users`
/// consistent with the rows that actually persisted.
#[tokio::test]
async fn counters_reflect_only_successful_writes() {
    let catalog = FakeCatalog::new();
    for i in 0..10 {
        catalog.seed_user(user_record(&format!("user{i}@x.com"), &format!("user{i}")));
    }

    let repo = FlakyImportRepo::failing_every(5);
    let backup = ParsedBackup {
        users: (0..10)
            .map(|i| ParsedUser {
                id: ForeignUserId::from(format!("fu{i}")),
                username: format!("user{i}"),
                email: Some(format!("user{i}@x.com")),
                progress: Vec::new(),
            })
            .collect(),
        library_items: Vec::new(),
        sessions: Vec::new(),
    };

    let import = create_import(&repo, &catalog, "backup.json".into(), None, &backup)
        .await
        .unwrap();

    // Every foreign user auto-maps by email, but calls 5 and 10 to
    // `upsert_imported_user` are injected failures, so only 8 of the 10
    // rows actually persist — and only those 8 should count as mapped.
    let persisted = repo
        .list_imported_users(import.id, EntityFilter::All)
        .await
        .unwrap();
    assert_eq!(persisted.len(), 8);

    let mapped = repo
        .list_imported_users(import.id, EntityFilter::Mapped)
        .await
        .unwrap();
    assert_eq!(mapped.len(), 8);
    assert_eq!(import.mapped.users, 8);
}

/// Boundary: a duration clamp keeps a spuriously long foreign position
/// from auto-finishing the book, while an explicit finished-carry from the
/// foreign progress entry still wins.
#[tokio::test]
async fn finished_carry_overrides_duration_clamp() {
    let catalog = FakeCatalog::new();
    let local_user = user_record("alice@x.com", "alice_local");
    let local_user_id = local_user.id;
    let mut local_book = book_record("Storm", "Some Author", 60_000);
    local_book.asin = Some("A1".into());
    let local_book_id = local_book.id;
    catalog.seed_user(local_user);
    catalog.seed_book(local_book);

    let repo = FakeImportRepo::new();
    let mut backup = backup_with_one_session("fu1", "fb1", "A1", 60_100, 0, 90_000);
    backup.users[0].progress.push(ParsedProgress {
        abs_media_id: "fb1".into(),
        current_time_ms: 90_000,
        duration_ms: 60_100,
        fraction: 1.0,
        is_finished: true,
        last_update_ms: 1_700_000_100_000,
        finished_at_ms: Some(1_700_000_100_000),
    });

    let import = create_import(&repo, &catalog, "backup.json".into(), None, &backup)
        .await
        .unwrap();
    execute(&repo, &catalog, import.id).await.unwrap();

    let state = catalog
        .playback
        .read()
        .unwrap()
        .get(&(local_user_id, local_book_id))
        .cloned()
        .unwrap();
    assert_eq!(state.current_position_ms, (60_000_f64 * 0.98).floor() as i64);
    assert!(state.is_finished);

    let applied = repo
        .list_imported_progress(import.id, EntityFilter::Mapped)
        .await
        .unwrap();
    assert_eq!(applied.len(), 1);
}
