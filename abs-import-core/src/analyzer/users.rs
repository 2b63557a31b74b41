use abs_import_contracts::ids::LocalUserId;
use abs_import_contracts::store::UserRecord;

use crate::confidence::Confidence;
use crate::parser::ParsedUser;

use super::similarity::username_similarity;
use super::{rank_scored, to_suggestions, AnalyzerConfig, Decision};

/// Applies the user matching rules in spec order; the first rule that fires
/// wins.
pub(super) fn match_user(
    foreign: &ParsedUser,
    local_users: &[UserRecord],
    config: &AnalyzerConfig,
) -> Decision<LocalUserId> {
    // 1. Manual override.
    if let Some(local_id) = config.user_mappings.get(&foreign.id) {
        return Decision {
            local_id: Some(*local_id),
            confidence: Confidence::Definitive,
            reason: "manual override".into(),
            suggestions: Vec::new(),
        };
    }

    // 2. Email equality (case-insensitive, trimmed).
    if config.match_by_email {
        if let Some(foreign_email) = &foreign.email {
            let foreign_email = foreign_email.trim().to_lowercase();
            if !foreign_email.is_empty() {
                if let Some(local) = local_users
                    .iter()
                    .find(|u| u.email.trim().to_lowercase() == foreign_email)
                {
                    return Decision {
                        local_id: Some(local.id),
                        confidence: Confidence::Definitive,
                        reason: "email match".into(),
                        suggestions: Vec::new(),
                    };
                }
            }
        }
    }

    // 3. Username equality (case-insensitive).
    let foreign_username = foreign.username.trim().to_lowercase();
    if let Some(local) = local_users
        .iter()
        .find(|u| u.display_name.trim().to_lowercase() == foreign_username)
    {
        return Decision {
            local_id: Some(local.id),
            confidence: Confidence::Strong,
            reason: "username match".into(),
            suggestions: Vec::new(),
        };
    }

    // 4. Username token/substring similarity.
    let mut scored: Vec<(LocalUserId, f64)> = local_users
        .iter()
        .map(|u| (u.id, username_similarity(&foreign.username, &u.display_name)))
        .filter(|(_, score)| *score >= config.fuzzy_threshold)
        .collect();
    rank_scored(&mut scored);

    if let Some((_, best_score)) = scored.first().copied() {
        return Decision {
            local_id: None,
            confidence: Confidence::Weak,
            reason: format!("username similarity {:.2}", best_score),
            suggestions: to_suggestions(scored),
        };
    }

    // 5. Otherwise.
    Decision {
        local_id: None,
        confidence: Confidence::None,
        reason: "no candidate matched".into(),
        suggestions: Vec::new(),
    }
}
