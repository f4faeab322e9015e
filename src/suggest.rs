use strsim::jaro_winkler;

/// Orders candidate queries by similarity to what the user has typed so far.
///
/// Ties keep candidate order. A blank query returns the first `limit`
/// candidates as-is.
pub fn rank(query: &str, candidates: &[String], limit: usize) -> Vec<String> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return candidates.iter().take(limit).cloned().collect();
    }

    let mut scored: Vec<(f64, usize)> = candidates
        .iter()
        .enumerate()
        .map(|(idx, candidate)| (jaro_winkler(&needle, &candidate.to_lowercase()), idx))
        .collect();

    // stable sort: equal scores stay in candidate order
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    scored
        .into_iter()
        .take(limit)
        .map(|(_, idx)| candidates[idx].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<String> {
        vec![
            "Show employees with more than 20 hours of absence".to_string(),
            "What's the average absence by education level?".to_string(),
            "Compare absence between smokers and non-smokers".to_string(),
            "Show monthly absence trends".to_string(),
        ]
    }

    #[test]
    fn test_rank_puts_closest_first() {
        let ranked = rank("compare smokers", &candidates(), 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0], "Compare absence between smokers and non-smokers");
    }

    #[test]
    fn test_blank_query_keeps_order() {
        let ranked = rank("   ", &candidates(), 3);
        assert_eq!(ranked, candidates()[..3].to_vec());
    }

    #[test]
    fn test_limit_larger_than_candidates() {
        assert_eq!(rank("show", &candidates(), 10).len(), 4);
        assert!(rank("show", &[], 10).is_empty());
    }
}
