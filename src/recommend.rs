//! Goal recommendation scoring for check-in emails.
//!
//! Picks which incomplete squares to nudge the user about: squares that
//! would finish the most near-complete lines score highest. A square with
//! no item on it still counts as missing for its lines but can't be
//! recommended (there's nothing to suggest), so scoring only considers
//! squares that carry an incomplete item.

use std::collections::HashMap;

use crate::lines::line_positions;

/// The slice of a bingo item the recommender needs.
#[derive(Debug, Clone)]
pub struct RecommendInput {
    pub position: usize,
    pub text: String,
    pub completed: bool,
    /// Stored creation timestamp; drives the oldest-first fallback.
    pub created_at: String,
}

/// A recommended goal, highest score first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub position: usize,
    pub text: String,
    /// Number of minimal-missing lines this square participates in.
    pub score: usize,
}

/// Recommend up to `limit` incomplete squares to highlight.
pub fn recommend_goals(
    items: &[RecommendInput],
    grid_size: usize,
    free_space_position: Option<usize>,
    limit: usize,
) -> Vec<Recommendation> {
    if grid_size == 0 || limit == 0 {
        return Vec::new();
    }

    let total = grid_size * grid_size;
    let mut completed = vec![false; total];
    let mut item_at: HashMap<usize, &RecommendInput> = HashMap::new();
    for item in items {
        if item.position >= total {
            continue;
        }
        item_at.insert(item.position, item);
        if item.completed {
            completed[item.position] = true;
        }
    }

    // Per line: positions that are neither the free space nor completed.
    // A position with no item at all is still missing.
    let missing_per_line: Vec<Vec<usize>> = line_positions(grid_size)
        .into_iter()
        .map(|line| {
            line.into_iter()
                .filter(|&pos| free_space_position != Some(pos) && !completed[pos])
                .collect()
        })
        .collect();

    let min_missing = missing_per_line
        .iter()
        .map(|m| m.len())
        .filter(|&len| len > 0)
        .min();

    let mut scores: HashMap<usize, usize> = HashMap::new();
    if let Some(min_missing) = min_missing {
        for missing in missing_per_line.iter().filter(|m| m.len() == min_missing) {
            for &pos in missing {
                *scores.entry(pos).or_insert(0) += 1;
            }
        }
    }

    // Only squares with an actual incomplete item are suggestible.
    let mut ranked: Vec<Recommendation> = scores
        .into_iter()
        .filter_map(|(pos, score)| {
            item_at
                .get(&pos)
                .filter(|item| !item.completed)
                .map(|item| Recommendation {
                    position: pos,
                    text: item.text.clone(),
                    score,
                })
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.position.cmp(&b.position)));
    ranked.truncate(limit);

    if !ranked.is_empty() {
        return ranked;
    }

    // Fallback: oldest incomplete, non-free items.
    let mut fallback: Vec<&RecommendInput> = items
        .iter()
        .filter(|item| {
            !item.completed && free_space_position != Some(item.position) && item.position < total
        })
        .collect();
    fallback.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.position.cmp(&b.position)));
    fallback
        .into_iter()
        .take(limit)
        .map(|item| Recommendation {
            position: item.position,
            text: item.text.clone(),
            score: 0,
        })
        .collect()
}
