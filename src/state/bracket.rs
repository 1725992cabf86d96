//! Single-elimination bracket generation.

use std::{collections::HashSet, time::SystemTime};

use rand::{Rng, seq::SliceRandom};
use thiserror::Error;
use uuid::Uuid;

use crate::state::matches::{Advancement, Match, MatchRules, Slot};

/// Inputs required to generate a bracket.
#[derive(Debug, Clone)]
pub struct BracketSeed {
    /// Competition category shared by all generated matches.
    pub category: String,
    /// Competition level shared by all generated matches.
    pub level: String,
    /// Competitors to seed, in any order.
    pub competitors: Vec<Uuid>,
    /// Operator assigned to every generated match.
    pub referee_id: Option<String>,
}

/// Reasons a bracket cannot be generated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BracketError {
    /// Fewer than two competitors were supplied.
    #[error("a bracket needs at least two competitors (got {0})")]
    NotEnoughCompetitors(usize),
    /// The same competitor was listed twice.
    #[error("competitor `{0}` is listed more than once")]
    DuplicateCompetitor(Uuid),
}

/// Label of the round sitting `level` rounds below the final.
pub fn round_name(level: u32) -> String {
    match level {
        0 => "FINAL".to_string(),
        1 => "SEMIS".to_string(),
        2 => "QUARTERS".to_string(),
        3 => "OCTAVOS".to_string(),
        _ => format!("{}VOS", 1u64 << level.min(63)),
    }
}

/// Number of rounds needed to seat `competitors` competitors.
pub fn depth_for(competitors: usize) -> u32 {
    competitors.next_power_of_two().trailing_zeros()
}

/// Generate the matches of a single-elimination bracket.
///
/// Competitors are shuffled with `rng` and seated in the first round; slots beyond the
/// roster stay empty so that byes surface as single-competitor matches. Every match but
/// the final links to its parent, children at even positions feeding slot A. The final
/// comes first in the returned list, followed by each round in order.
pub fn build_bracket<R: Rng + ?Sized>(
    seed: BracketSeed,
    rules: &MatchRules,
    rng: &mut R,
    now: SystemTime,
) -> Result<Vec<Match>, BracketError> {
    let count = seed.competitors.len();
    if count < 2 {
        return Err(BracketError::NotEnoughCompetitors(count));
    }

    let mut seen = HashSet::with_capacity(count);
    if let Some(duplicate) = seed.competitors.iter().find(|id| !seen.insert(**id)) {
        return Err(BracketError::DuplicateCompetitor(*duplicate));
    }

    let depth = depth_for(count);
    let bracket_id = Uuid::new_v4();

    let mut rounds: Vec<Vec<Match>> = Vec::with_capacity(depth as usize);
    for level in 0..depth {
        let width = 1usize << level;
        let parents = rounds.last();
        let round = (0..width)
            .map(|index| {
                let mut node = Match::new(
                    seed.category.clone(),
                    round_name(level),
                    seed.level.clone(),
                    seed.referee_id.clone(),
                    rules,
                    now,
                );
                node.bracket_id = Some(bracket_id);
                node.next = parents.map(|parents| Advancement {
                    match_id: parents[index / 2].id,
                    slot: Slot::for_child_index(index),
                });
                node
            })
            .collect();
        rounds.push(round);
    }

    let mut seats: Vec<Option<Uuid>> = seed.competitors.into_iter().map(Some).collect();
    seats.shuffle(rng);
    seats.resize(1usize << depth, None);

    if let Some(first_round) = rounds.last_mut() {
        for (node, pair) in first_round.iter_mut().zip(seats.chunks(2)) {
            node.competitor_a = pair[0];
            node.competitor_b = pair[1];
        }
    }

    Ok(rounds.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn seed(count: usize) -> BracketSeed {
        BracketSeed {
            category: "sumo".into(),
            level: "university".into(),
            competitors: (0..count).map(|_| Uuid::new_v4()).collect(),
            referee_id: None,
        }
    }

    fn build(count: usize) -> Vec<Match> {
        let mut rng = StdRng::seed_from_u64(count as u64);
        build_bracket(seed(count), &MatchRules::default(), &mut rng, SystemTime::now()).unwrap()
    }

    #[test]
    fn match_count_is_one_less_than_padded_size() {
        for count in 2..=33 {
            let matches = build(count);
            let size = count.next_power_of_two();
            assert_eq!(matches.len(), size - 1, "count = {count}");
            assert_eq!(
                matches.iter().filter(|m| m.is_root()).count(),
                1,
                "count = {count}"
            );
        }
    }

    #[test]
    fn every_competitor_is_seated_exactly_once() {
        let input = seed(11);
        let expected: HashSet<Uuid> = input.competitors.iter().copied().collect();
        let mut rng = StdRng::seed_from_u64(7);
        let matches =
            build_bracket(input, &MatchRules::default(), &mut rng, SystemTime::now()).unwrap();

        let seated: Vec<Uuid> = matches
            .iter()
            .flat_map(|m| [m.competitor_a, m.competitor_b])
            .flatten()
            .collect();
        assert_eq!(seated.len(), expected.len());
        assert_eq!(seated.into_iter().collect::<HashSet<_>>(), expected);
    }

    #[test]
    fn links_point_to_existing_parents_with_distinct_slots() {
        let matches = build(13);
        let by_id: HashMap<Uuid, &Match> = matches.iter().map(|m| (m.id, m)).collect();
        let mut taken = HashSet::new();

        for node in &matches {
            assert_eq!(node.bracket_id, matches[0].bracket_id);
            let Some(link) = node.next else {
                continue;
            };
            assert!(by_id.contains_key(&link.match_id));
            assert!(taken.insert((link.match_id, link.slot)), "slot fed twice");
        }

        // Every non-leaf match receives exactly two feeders.
        let feeders = matches.iter().filter(|m| m.next.is_some()).count();
        assert_eq!(feeders, matches.len() - 1);
    }

    #[test]
    fn five_competitors_produce_three_rounds_with_byes() {
        let matches = build(5);
        let rounds: Vec<&str> = matches.iter().map(|m| m.round.as_str()).collect();
        assert_eq!(
            rounds,
            vec![
                "FINAL", "SEMIS", "SEMIS", "QUARTERS", "QUARTERS", "QUARTERS", "QUARTERS"
            ]
        );

        let quarters: Vec<&Match> = matches.iter().filter(|m| m.round == "QUARTERS").collect();
        let singles = quarters
            .iter()
            .filter(|m| m.competitor_a.is_some() != m.competitor_b.is_some())
            .count();
        let full = quarters
            .iter()
            .filter(|m| m.competitor_a.is_some() && m.competitor_b.is_some())
            .count();
        assert_eq!(full * 2 + singles, 5);

        for node in matches.iter().filter(|m| m.round != "QUARTERS") {
            assert_eq!(node.competitor_a, None);
            assert_eq!(node.competitor_b, None);
        }
    }

    #[test]
    fn generated_matches_start_idle_with_full_clock() {
        for node in build(4) {
            assert_eq!(node.time_remaining, MatchRules::default().match_duration_secs);
            assert!(!node.is_active);
            assert!(!node.is_finished);
            assert_eq!(node.score_a + node.score_b, 0);
            assert!(node.check_invariants().is_ok());
        }
    }

    #[test]
    fn rejects_small_or_duplicated_rosters() {
        let mut rng = StdRng::seed_from_u64(1);
        let rules = MatchRules::default();

        assert_eq!(
            build_bracket(seed(1), &rules, &mut rng, SystemTime::now()).unwrap_err(),
            BracketError::NotEnoughCompetitors(1)
        );

        let mut duplicated = seed(3);
        duplicated.competitors.push(duplicated.competitors[0]);
        let expected = duplicated.competitors[0];
        assert_eq!(
            build_bracket(duplicated, &rules, &mut rng, SystemTime::now()).unwrap_err(),
            BracketError::DuplicateCompetitor(expected)
        );
    }

    #[test]
    fn round_names_follow_depth() {
        assert_eq!(round_name(0), "FINAL");
        assert_eq!(round_name(1), "SEMIS");
        assert_eq!(round_name(2), "QUARTERS");
        assert_eq!(round_name(3), "OCTAVOS");
        assert_eq!(round_name(4), "16VOS");
        assert_eq!(round_name(5), "32VOS");
    }
}
