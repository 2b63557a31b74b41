use abs_import_contracts::ids::LocalBookId;
use abs_import_contracts::store::BookRecord;

use crate::confidence::Confidence;
use crate::parser::ParsedLibraryItem;

use super::similarity::{normalized_eq, path_suffix, title_author_similarity};
use super::{rank_scored, to_suggestions, AnalyzerConfig, Decision};

/// Applies the book matching rules in spec order; the first rule that fires
/// wins.
pub(super) fn match_book(
    foreign: &ParsedLibraryItem,
    local_books: &[BookRecord],
    config: &AnalyzerConfig,
) -> Decision<LocalBookId> {
    // 1. Manual override.
    if let Some(local_id) = config.book_mappings.get(&foreign.id) {
        return Decision {
            local_id: Some(*local_id),
            confidence: Confidence::Definitive,
            reason: "manual override".into(),
            suggestions: Vec::new(),
        };
    }

    // 2. ASIN equality.
    if let Some(foreign_asin) = foreign.asin.as_deref().filter(|s| !s.is_empty()) {
        if let Some(local) = local_books
            .iter()
            .find(|b| b.asin.as_deref() == Some(foreign_asin))
        {
            return definitive(local.id, "ASIN match");
        }
    }

    // 3. ISBN equality.
    if let Some(foreign_isbn) = foreign.isbn.as_deref().filter(|s| !s.is_empty()) {
        if let Some(local) = local_books
            .iter()
            .find(|b| b.isbn.as_deref() == Some(foreign_isbn))
        {
            return definitive(local.id, "ISBN match");
        }
    }

    // 4. Path-suffix equality.
    if config.match_by_path {
        if let Some(foreign_path) = foreign.path.as_deref() {
            let foreign_suffix = path_suffix(foreign_path, config.path_suffix_segments);
            if !foreign_suffix.is_empty() {
                if let Some(local) = local_books.iter().find(|b| {
                    b.path
                        .as_deref()
                        .map(|p| path_suffix(p, config.path_suffix_segments) == foreign_suffix)
                        .unwrap_or(false)
                }) {
                    return strong(local.id, "path match");
                }
            }
        }
    }

    // 5. Title + primary-author equality, case-insensitive and
    //    punctuation-stripped.
    if let Some(local) = local_books.iter().find(|b| {
        normalized_eq(&b.title, &foreign.title) && normalized_eq(&b.primary_author, &foreign.primary_author)
    }) {
        return strong(local.id, "title+author match");
    }

    // 6. Fuzzy title+author similarity.
    if config.fuzzy_match_books {
        let mut scored: Vec<(LocalBookId, f64)> = local_books
            .iter()
            .map(|b| {
                (
                    b.id,
                    title_author_similarity(&foreign.title, &foreign.primary_author, &b.title, &b.primary_author),
                )
            })
            .filter(|(_, score)| *score >= config.fuzzy_threshold)
            .collect();
        rank_scored(&mut scored);

        if !scored.is_empty() {
            let top = scored[0].1;
            let runner_up = scored.get(1).map(|(_, s)| *s).unwrap_or(0.0);
            let confidence = if top - runner_up > config.fuzzy_margin {
                Confidence::Weak
            } else {
                Confidence::None
            };
            let reason = format!("title+author similarity {:.2}", top);
            return Decision {
                local_id: None,
                confidence,
                reason,
                suggestions: to_suggestions(scored),
            };
        }
    }

    // 7. Otherwise.
    Decision {
        local_id: None,
        confidence: Confidence::None,
        reason: "no candidate matched".into(),
        suggestions: Vec::new(),
    }
}

fn definitive(local_id: LocalBookId, reason: &str) -> Decision<LocalBookId> {
    Decision {
        local_id: Some(local_id),
        confidence: Confidence::Definitive,
        reason: reason.into(),
        suggestions: Vec::new(),
    }
}

fn strong(local_id: LocalBookId, reason: &str) -> Decision<LocalBookId> {
    Decision {
        local_id: Some(local_id),
        confidence: Confidence::Strong,
        reason: reason.into(),
        suggestions: Vec::new(),
    }
}
