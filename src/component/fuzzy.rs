//! Subsequence matching for the filter widget.
//!
//! Scores are "lower is better": word-boundary hits and runs of adjacent
//! hits pull the score down, gaps and late positions push it up.

/// A successful match of a query against one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub score: f64,
    /// Char indices of the matched characters in the candidate.
    pub positions: Vec<usize>,
}

/// Lowercases one char to one char so indices stay those of the candidate.
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn is_boundary(prev: char) -> bool {
    prev.is_whitespace() || matches!(prev, '-' | '_' | '.' | '/' | ':')
}

/// Case-insensitive subsequence match of `query` in `text`.
///
/// An empty query matches everything with score 0.
pub fn fuzzy_match(query: &str, text: &str) -> Option<Match> {
    let query: Vec<char> = query.chars().map(fold).collect();
    if query.is_empty() {
        return Some(Match {
            score: 0.0,
            positions: Vec::new(),
        });
    }
    let text: Vec<char> = text.chars().map(fold).collect();
    if query.len() > text.len() {
        return None;
    }

    let mut positions = Vec::with_capacity(query.len());
    let mut score = 0.0f64;
    let mut last: Option<usize> = None;
    let mut run = 0u32;

    for (i, &ch) in text.iter().enumerate() {
        if positions.len() == query.len() {
            break;
        }
        if ch != query[positions.len()] {
            continue;
        }
        match last {
            Some(prev) if prev + 1 == i => {
                run += 1;
                score -= f64::from(run) * 5.0;
            }
            Some(prev) => {
                run = 0;
                score += (i - prev - 1) as f64 * 2.0;
            }
            None => run = 0,
        }
        // Kept below the smallest run bonus so adjacency wins over boundaries.
        if i == 0 || is_boundary(text[i - 1]) {
            score -= 4.0;
        }
        score += i as f64 * 0.1;
        last = Some(i);
        positions.push(i);
    }

    (positions.len() == query.len()).then_some(Match { score, positions })
}

/// Case-insensitive substring match. Positions cover the first occurrence.
pub fn substring_match(query: &str, text: &str) -> Option<Match> {
    let needle: Vec<char> = query.chars().map(fold).collect();
    let hay: Vec<char> = text.chars().map(fold).collect();
    if needle.is_empty() {
        return Some(Match {
            score: 0.0,
            positions: Vec::new(),
        });
    }
    let start = hay
        .windows(needle.len())
        .position(|window| window == needle.as_slice())?;
    Some(Match {
        score: start as f64,
        positions: (start..start + needle.len()).collect(),
    })
}

/// One candidate that survived filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    /// Index into the original candidate list.
    pub index: usize,
    pub score: f64,
    pub positions: Vec<usize>,
}

/// Filter `items` by `query`.
///
/// With `fuzzy` every whitespace-separated token must match as a subsequence
/// and scores add up; otherwise the whole query must appear as a substring.
/// With `sort` survivors are ordered best first (stable, so ties keep list
/// order); without it they keep list order.
pub fn rank<S: AsRef<str>>(items: &[S], query: &str, fuzzy: bool, sort: bool) -> Vec<Ranked> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let mut ranked: Vec<Ranked> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let text = item.as_ref();
            if tokens.is_empty() {
                return Some(Ranked {
                    index,
                    score: 0.0,
                    positions: Vec::new(),
                });
            }
            if !fuzzy {
                let m = substring_match(query.trim(), text)?;
                return Some(Ranked {
                    index,
                    score: m.score,
                    positions: m.positions,
                });
            }
            let mut score = 0.0;
            let mut positions = Vec::new();
            for token in &tokens {
                let m = fuzzy_match(token, text)?;
                score += m.score;
                positions.extend(m.positions);
            }
            positions.sort_unstable();
            positions.dedup();
            Some(Ranked {
                index,
                score,
                positions,
            })
        })
        .collect();

    if sort && !tokens.is_empty() {
        ranked.sort_by(|a, b| a.score.total_cmp(&b.score));
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_beats_spaced() {
        let direct = fuzzy_match("abc", "abc").expect("direct");
        let spaced = fuzzy_match("abc", "a_b_c").expect("spaced");
        assert!(direct.score < spaced.score);
    }

    #[test]
    fn test_word_boundary_preferred() {
        let boundary = fuzzy_match("b", "foo-bar").expect("boundary");
        let inner = fuzzy_match("b", "foobar").expect("inner");
        assert!(boundary.score < inner.score);
    }

    #[test]
    fn test_positions_and_case() {
        let m = fuzzy_match("FB", "foo bar").expect("match");
        assert_eq!(m.positions, vec![0, 4]);
        assert!(fuzzy_match("xyz", "foo bar").is_none());
        assert!(fuzzy_match("toolong", "short").is_none());
    }

    #[test]
    fn test_boundary_hits_do_not_outrank_runs() {
        let run = fuzzy_match("ab", "ab").expect("run");
        let spaced = fuzzy_match("ab", "a b").expect("spaced");
        assert!(run.score < spaced.score);
        let later = fuzzy_match("fb", "foo bar").expect("later");
        let inner = fuzzy_match("fb", "foobar").expect("inner");
        assert!(later.score < inner.score);
    }

    #[test]
    fn test_positions_index_original_chars() {
        // 'İ' lowercases to two chars.
        assert_eq!(fuzzy_match("x", "İx").map(|m| m.positions), Some(vec![1]));
        assert_eq!(fuzzy_match("ix", "İx").map(|m| m.positions), Some(vec![0, 1]));
        assert_eq!(
            substring_match("Xy", "İİxy").map(|m| m.positions),
            Some(vec![2, 3])
        );
    }

    #[test]
    fn test_substring_mode() {
        assert_eq!(
            substring_match("BAR", "foobar").map(|m| m.positions),
            Some(vec![3, 4, 5])
        );
        assert!(substring_match("fbr", "foobar").is_none());
    }

    #[test]
    fn test_rank_requires_all_tokens() {
        let items = ["alpha beta", "alpha", "beta alpha"];
        let ranked: Vec<usize> = rank(&items, "alpha beta", true, false)
            .into_iter()
            .map(|r| r.index)
            .collect();
        assert_eq!(ranked, vec![0, 2]);
    }

    #[test]
    fn test_rank_sorts_best_first() {
        let items = ["a_x_b_x_c", "abc", "zzz"];
        let ranked: Vec<usize> = rank(&items, "abc", true, true)
            .into_iter()
            .map(|r| r.index)
            .collect();
        assert_eq!(ranked, vec![1, 0]);
    }

    #[test]
    fn test_empty_query_keeps_everything() {
        let items = ["b", "a"];
        assert_eq!(rank(&items, "  ", true, true).len(), 2);
    }
}
