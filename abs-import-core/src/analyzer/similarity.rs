//! Deterministic, dependency-light string similarity used by the matching
//! engine. Per the spec's open question, the exact function is
//! unconstrained as long as it is deterministic and monotonic in `[0,1]`;
//! this uses `strsim`'s Jaro-Winkler, the same crate another repo in this
//! codebase's lineage reaches for when validating near-duplicate strings.

fn strip_punctuation_lower(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn normalized_eq(a: &str, b: &str) -> bool {
    strip_punctuation_lower(a) == strip_punctuation_lower(b)
}

/// Username similarity in `[0,1]`. Rewards substring containment on top of
/// the base Jaro-Winkler score since ABS usernames are frequently truncated
/// or prefixed variants of the local display name.
pub fn username_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let base = strsim::jaro_winkler(&a, &b);
    let bonus = if a.contains(&b) || b.contains(&a) {
        0.15
    } else {
        0.0
    };
    (base + bonus).min(1.0)
}

/// Title+author similarity in `[0,1]`.
pub fn title_author_similarity(title_a: &str, author_a: &str, title_b: &str, author_b: &str) -> f64 {
    let key_a = format!(
        "{} {}",
        strip_punctuation_lower(title_a),
        strip_punctuation_lower(author_a)
    );
    let key_b = format!(
        "{} {}",
        strip_punctuation_lower(title_b),
        strip_punctuation_lower(author_b)
    );
    strsim::jaro_winkler(&key_a, &key_b)
}

/// Joins the last `n` path segments, used for path-suffix matching.
pub fn path_suffix(path: &str, n: usize) -> String {
    let segments: Vec<&str> = path.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
    let start = segments.len().saturating_sub(n);
    segments[start..].join("/")
}
