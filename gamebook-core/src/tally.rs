//! Vote tallying.
//!
//! Replies are scanned for hashtags, counted case-insensitively, and ranked
//! against the valid hashtag map for the current decision point. Ordering is
//! by descending count with ties broken by first occurrence in the collected
//! sequence, so a tally is deterministic for a given reply order.

use crate::story::HASHTAG;
use std::collections::HashMap;

/// Every hashtag in every reply, in reply order.
pub fn extract_tags(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .flat_map(|text| HASHTAG.find_iter(text).map(|m| m.as_str().to_string()))
        .collect()
}

/// Count collected tags against the valid hashtag map.
///
/// Returns one summary line per counted tag that is a valid hashtag, in rank
/// order, plus the target key of the highest-ranked valid tag. Tags outside
/// the map are ignored entirely; if none are valid there is no winner and
/// the caller decides whether to re-poll.
pub fn tally(
    collected: &[String],
    valid: &HashMap<String, String>,
) -> (Vec<String>, Option<String>) {
    // Vec keeps first-seen order; a stable sort then preserves it for ties.
    let mut counts: Vec<(String, u32)> = Vec::new();
    for tag in collected {
        let tag = tag.to_uppercase();
        match counts.iter_mut().find(|(seen, _)| *seen == tag) {
            Some((_, n)) => *n += 1,
            None => counts.push((tag, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let mut summary = Vec::new();
    let mut winner = None;
    for (tag, votes) in &counts {
        if let Some(target) = valid.get(tag) {
            if winner.is_none() {
                winner = Some(target.clone());
            }
            summary.push(format!("{tag}: {votes} vote(s)"));
        }
    }
    (summary, winner)
}
