//! The matching engine: deterministic and fuzzy rules that reconcile the
//! foreign user/book population in a backup against the local catalog.

mod books;
mod similarity;
mod users;

use std::collections::HashMap;

use abs_import_contracts::ids::{ForeignMediaId, ForeignUserId, LocalBookId, LocalUserId};
use abs_import_contracts::store::CatalogStore;
use serde::Serialize;

use crate::confidence::Confidence;
use crate::error::Result;
use crate::parser::{ParsedBackup, ParsedLibraryItem};

const SUGGESTION_LIMIT: usize = 5;
const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;
const DEFAULT_FUZZY_MARGIN: f64 = 0.05;
const DEFAULT_PATH_SUFFIX_SEGMENTS: usize = 2;
const PROGRESS_REPORT_STRIDE: usize = 100;

/// Phase boundaries the analyzer reports through on its progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Parsing,
    MatchingUsers,
    MatchingBooks,
    MatchingSessions,
    MatchingProgress,
    Done,
}

/// A single matcher's verdict: chosen local id (if any), confidence,
/// human-readable reason, and ranked alternatives.
#[derive(Debug, Clone, Serialize)]
pub struct Decision<Local> {
    pub local_id: Option<Local>,
    pub confidence: Confidence,
    pub reason: String,
    pub suggestions: Vec<Suggestion<Local>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Suggestion<Local> {
    pub local_id: Local,
    pub score: f64,
}

fn rank_scored<Id: Ord + Copy>(scored: &mut Vec<(Id, f64)>) {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

fn to_suggestions<Id: Copy>(scored: Vec<(Id, f64)>) -> Vec<Suggestion<Id>> {
    scored
        .into_iter()
        .take(SUGGESTION_LIMIT)
        .map(|(local_id, score)| Suggestion { local_id, score })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub match_by_email: bool,
    pub match_by_path: bool,
    pub fuzzy_match_books: bool,
    pub fuzzy_threshold: f64,
    pub fuzzy_margin: f64,
    pub path_suffix_segments: usize,
    pub user_mappings: HashMap<ForeignUserId, LocalUserId>,
    pub book_mappings: HashMap<ForeignMediaId, LocalBookId>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            match_by_email: true,
            match_by_path: true,
            fuzzy_match_books: true,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            fuzzy_margin: DEFAULT_FUZZY_MARGIN,
            path_suffix_segments: DEFAULT_PATH_SUFFIX_SEGMENTS,
            user_mappings: HashMap::new(),
            book_mappings: HashMap::new(),
        }
    }
}

impl AnalyzerConfig {
    /// A threshold of `0` is normalized to the default, per spec.
    pub fn normalized(mut self) -> Self {
        if self.fuzzy_threshold == 0.0 {
            self.fuzzy_threshold = DEFAULT_FUZZY_THRESHOLD;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDecision {
    pub foreign_user_id: ForeignUserId,
    pub foreign_username: String,
    pub foreign_email: Option<String>,
    pub decision: Decision<LocalUserId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookDecision {
    pub foreign_media_id: ForeignMediaId,
    pub foreign_title: String,
    pub foreign_author: String,
    pub foreign_asin: Option<String>,
    pub foreign_isbn: Option<String>,
    pub foreign_duration_ms: i64,
    pub decision: Decision<LocalBookId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisRollup {
    pub users_total: usize,
    pub users_matched: usize,
    pub users_pending: usize,
    pub books_total: usize,
    pub books_matched: usize,
    pub books_pending: usize,
    pub sessions_total: usize,
    pub sessions_ready: usize,
    pub sessions_pending: usize,
    pub progress_total: usize,
    pub progress_ready: usize,
    pub progress_pending: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub users: Vec<UserDecision>,
    pub books: Vec<BookDecision>,
    pub rollup: AnalysisRollup,
    pub warnings: Vec<String>,
    /// Lookup from every raw foreign book key seen in the backup (both
    /// `LibraryItem.id` and `LibraryItem.mediaId`) to the canonical key
    /// under which the matching `ImportedBook` is stored.
    pub book_key_lookup: HashMap<String, ForeignMediaId>,
}

/// Builds the `LibraryItem.id`/`LibraryItem.mediaId` → canonical key lookup
/// described in spec §4.5 step 7. The canonical key is always the library
/// item's own id.
pub fn build_book_key_lookup(items: &[ParsedLibraryItem]) -> HashMap<String, ForeignMediaId> {
    let mut lookup = HashMap::new();
    for item in items {
        lookup.insert(item.id.as_str().to_string(), item.id.clone());
        if let Some(media_id) = &item.media_id {
            lookup
                .entry(media_id.as_str().to_string())
                .or_insert_with(|| item.id.clone());
        }
    }
    lookup
}

/// Runs the full analysis pipeline against the current catalog.
///
/// `on_progress` is invoked at phase boundaries and at most every 100 items
/// within a phase. `is_cancelled` is polled at the same cadence; when it
/// returns `true` the analysis stops and surfaces
/// [`crate::error::ImportError::Cancelled`].
pub async fn analyze(
    backup: &ParsedBackup,
    catalog: &(dyn CatalogStore + Send + Sync),
    config: &AnalyzerConfig,
    mut on_progress: impl FnMut(Phase, usize, usize),
    mut is_cancelled: impl FnMut() -> bool,
) -> Result<AnalysisResult> {
    let config = config.clone().normalized();

    on_progress(Phase::Parsing, backup.users.len(), backup.users.len());

    let local_users = catalog.list_users().await?;
    let local_books = catalog.list_books().await?;

    let mut warnings = Vec::new();
    let mut rollup = AnalysisRollup::default();

    // --- Users ---
    on_progress(Phase::MatchingUsers, 0, backup.users.len());
    let mut user_decisions = Vec::with_capacity(backup.users.len());
    for (i, foreign_user) in backup.users.iter().enumerate() {
        if is_cancelled() {
            return Err(crate::error::ImportError::Cancelled("analysis cancelled during user matching".into()));
        }
        let decision = users::match_user(foreign_user, &local_users, &config);
        rollup.users_total += 1;
        if decision.confidence.auto_accepts() {
            rollup.users_matched += 1;
        } else {
            rollup.users_pending += 1;
        }
        user_decisions.push(UserDecision {
            foreign_user_id: foreign_user.id.clone(),
            foreign_username: foreign_user.username.clone(),
            foreign_email: foreign_user.email.clone(),
            decision,
        });
        if (i + 1) % PROGRESS_REPORT_STRIDE == 0 {
            on_progress(Phase::MatchingUsers, i + 1, backup.users.len());
        }
    }
    on_progress(Phase::MatchingUsers, backup.users.len(), backup.users.len());

    // --- Books ---
    on_progress(Phase::MatchingBooks, 0, backup.library_items.len());
    let mut book_decisions = Vec::with_capacity(backup.library_items.len());
    for (i, foreign_item) in backup.library_items.iter().enumerate() {
        if is_cancelled() {
            return Err(crate::error::ImportError::Cancelled("analysis cancelled during book matching".into()));
        }
        let decision = books::match_book(foreign_item, &local_books, &config);
        rollup.books_total += 1;
        if decision.confidence.auto_accepts() {
            rollup.books_matched += 1;
        } else {
            rollup.books_pending += 1;
        }
        book_decisions.push(BookDecision {
            foreign_media_id: foreign_item.id.clone(),
            foreign_title: foreign_item.title.clone(),
            foreign_author: foreign_item.primary_author.clone(),
            foreign_asin: foreign_item.asin.clone(),
            foreign_isbn: foreign_item.isbn.clone(),
            foreign_duration_ms: foreign_item.duration_ms,
            decision,
        });
        if (i + 1) % PROGRESS_REPORT_STRIDE == 0 {
            on_progress(Phase::MatchingBooks, i + 1, backup.library_items.len());
        }
    }
    on_progress(Phase::MatchingBooks, backup.library_items.len(), backup.library_items.len());

    let book_key_lookup = build_book_key_lookup(&backup.library_items);
    let user_mapped: HashMap<&ForeignUserId, bool> = user_decisions
        .iter()
        .map(|u| (&u.foreign_user_id, u.decision.confidence.auto_accepts()))
        .collect();
    let book_mapped: HashMap<&ForeignMediaId, bool> = book_decisions
        .iter()
        .map(|b| (&b.foreign_media_id, b.decision.confidence.auto_accepts()))
        .collect();

    // --- Sessions (rollup only; analyzer does not persist) ---
    on_progress(Phase::MatchingSessions, 0, backup.sessions.len());
    for (i, session) in backup.sessions.iter().enumerate() {
        if is_cancelled() {
            return Err(crate::error::ImportError::Cancelled("analysis cancelled during session matching".into()));
        }
        rollup.sessions_total += 1;
        let canonical = book_key_lookup.get(session.library_item_id.as_str());
        let ready = match canonical {
            Some(key) => {
                let user_ok = user_mapped.get(&session.user_id).copied().unwrap_or(false);
                let book_ok = book_mapped.get(key).copied().unwrap_or(false);
                user_ok && book_ok
            }
            None => {
                warnings.push(format!(
                    "session {} references unknown foreign book {}",
                    session.id, session.library_item_id
                ));
                false
            }
        };
        if ready {
            rollup.sessions_ready += 1;
        } else {
            rollup.sessions_pending += 1;
        }
        if (i + 1) % PROGRESS_REPORT_STRIDE == 0 {
            on_progress(Phase::MatchingSessions, i + 1, backup.sessions.len());
        }
    }
    on_progress(Phase::MatchingSessions, backup.sessions.len(), backup.sessions.len());

    // --- Progress entries ---
    let progress_entries: Vec<(&ForeignUserId, &crate::parser::ParsedProgress)> = backup
        .users
        .iter()
        .flat_map(|u| u.progress.iter().map(move |p| (&u.id, p)))
        .collect();
    on_progress(Phase::MatchingProgress, 0, progress_entries.len());
    for (i, (_user_id, progress)) in progress_entries.iter().enumerate() {
        if is_cancelled() {
            return Err(crate::error::ImportError::Cancelled("analysis cancelled during progress matching".into()));
        }
        rollup.progress_total += 1;
        let book_ok = book_mapped
            .get(&progress.abs_media_id)
            .copied()
            .unwrap_or(false);
        if book_ok {
            rollup.progress_ready += 1;
        } else {
            rollup.progress_pending += 1;
        }
        if (i + 1) % PROGRESS_REPORT_STRIDE == 0 {
            on_progress(Phase::MatchingProgress, i + 1, progress_entries.len());
        }
    }
    on_progress(Phase::MatchingProgress, progress_entries.len(), progress_entries.len());

    on_progress(Phase::Done, 1, 1);

    Ok(AnalysisResult {
        users: user_decisions,
        books: book_decisions,
        rollup,
        warnings,
        book_key_lookup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use abs_import_contracts::ids::{ForeignMediaId, LocalBookId, LocalUserId};
    use abs_import_contracts::store::{BookRecord, UserRecord};
    use crate::parser::ParsedUser;

    fn user(id: &str, username: &str, email: Option<&str>) -> ParsedUser {
        ParsedUser {
            id: id.into(),
            username: username.into(),
            email: email.map(|e| e.to_string()),
            progress: Vec::new(),
        }
    }

    #[test]
    fn email_match_is_definitive() {
        let local = vec![UserRecord {
            id: LocalUserId::new(),
            email: "alice@x.com".into(),
            display_name: "alice_local".into(),
        }];
        let config = AnalyzerConfig::default();
        let foreign = user("fu1", "someone_else", Some("Alice@X.com"));
        let decision = users::match_user(&foreign, &local, &config);
        assert_eq!(decision.confidence, Confidence::Definitive);
        assert_eq!(decision.local_id, Some(local[0].id));
        assert_eq!(decision.reason, "email match");
    }

    #[test]
    fn username_equality_is_strong_when_email_does_not_match() {
        let local = vec![UserRecord {
            id: LocalUserId::new(),
            email: "nomatch@x.com".into(),
            display_name: "Alice".into(),
        }];
        let config = AnalyzerConfig::default();
        let foreign = user("fu1", "alice", Some("different@x.com"));
        let decision = users::match_user(&foreign, &local, &config);
        assert_eq!(decision.confidence, Confidence::Strong);
        assert_eq!(decision.reason, "username match");
    }

    #[test]
    fn manual_override_skips_fuzzy_search() {
        let local_id = LocalUserId::new();
        let local = vec![UserRecord {
            id: local_id,
            email: "x@x.com".into(),
            display_name: "nobody".into(),
        }];
        let mut config = AnalyzerConfig::default();
        config.user_mappings.insert("fu1".into(), local_id);
        let foreign = user("fu1", "zzz", None);
        let decision = users::match_user(&foreign, &local, &config);
        assert_eq!(decision.confidence, Confidence::Definitive);
        assert_eq!(decision.local_id, Some(local_id));
        assert!(decision.suggestions.is_empty());
    }

    #[test]
    fn asin_match_is_definitive() {
        let local_id = LocalBookId::new();
        let local = vec![BookRecord {
            id: local_id,
            title: "Storm".into(),
            primary_author: "Some Author".into(),
            asin: Some("A1".into()),
            isbn: None,
            path: None,
            duration_ms: 60_000,
        }];
        let config = AnalyzerConfig::default();
        let foreign = ParsedLibraryItem {
            id: ForeignMediaId::from("fb1"),
            media_id: None,
            title: "Completely Different Title".into(),
            primary_author: "Other".into(),
            asin: Some("A1".into()),
            isbn: None,
            duration_ms: 60_100,
            path: None,
        };
        let decision = books::match_book(&foreign, &local, &config);
        assert_eq!(decision.confidence, Confidence::Definitive);
        assert_eq!(decision.local_id, Some(local_id));
        assert_eq!(decision.reason, "ASIN match");
    }

    #[test]
    fn fuzzy_threshold_zero_behaves_like_default() {
        let config_zero = AnalyzerConfig {
            fuzzy_threshold: 0.0,
            ..AnalyzerConfig::default()
        }
        .normalized();
        let config_default = AnalyzerConfig::default().normalized();
        assert_eq!(config_zero.fuzzy_threshold, config_default.fuzzy_threshold);
    }

    #[test]
    fn book_key_lookup_maps_both_id_and_media_id() {
        let items = vec![ParsedLibraryItem {
            id: "li1".into(),
            media_id: Some("m1".into()),
            title: "T".into(),
            primary_author: "A".into(),
            asin: None,
            isbn: None,
            duration_ms: 0,
            path: None,
        }];
        let lookup = build_book_key_lookup(&items);
        assert_eq!(lookup.get("li1").unwrap().as_str(), "li1");
        assert_eq!(lookup.get("m1").unwrap().as_str(), "li1");
    }
}
