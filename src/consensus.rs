//! Reduces votes into per-place tallies and picks the places the group
//! agrees on.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::errors::BackendError;
use crate::recommendation::Recommendation;
use crate::vote::{Vote, VoteType};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub(crate) up_count: usize,
    pub(crate) down_count: usize,
    /// Every vote, in either direction.
    pub(crate) total: usize,
    pub(crate) score: i64,
}

impl Tally {
    fn record(&mut self, vote_type: VoteType) {
        match vote_type {
            VoteType::Up => {
                self.up_count += 1;
                self.score += 1;
            }
            VoteType::Down => {
                self.down_count += 1;
                self.score -= 1;
            }
        }

        self.total += 1;
    }

    pub fn up_count(&self) -> usize {
        self.up_count
    }

    pub fn down_count(&self) -> usize {
        self.down_count
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn score(&self) -> i64 {
        self.score
    }
}

/// Tallies votes per recommendation, in the order recommendations
/// first appear among the votes.
pub fn tally(votes: &[Vote]) -> Vec<(Uuid, Tally)> {
    let mut positions: HashMap<Uuid, usize> = HashMap::new();
    let mut tallies: Vec<(Uuid, Tally)> = Vec::new();

    for vote in votes {
        let i = *positions.entry(vote.recommendation_id).or_insert_with(|| {
            tallies.push((vote.recommendation_id, Tally::default()));
            tallies.len() - 1
        });

        tallies[i].1.record(vote.vote_type);
    }

    tallies
}

#[derive(Clone, Debug, Serialize)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub(crate) recommendation: Recommendation,

    #[serde(flatten)]
    pub(crate) tally: Tally,
}

impl RankedCandidate {
    pub fn recommendation(&self) -> &Recommendation {
        &self.recommendation
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }
}

/// The outcome of voting on a trip's candidates.
#[derive(Clone, Debug, Serialize)]
pub struct Consensus {
    total_votes: usize,

    /// Every candidate sharing the highest total, best score first.
    winners: Vec<RankedCandidate>,

    /// Every candidate by descending total, then descending score.
    ranking: Vec<RankedCandidate>,
}

impl Consensus {
    pub fn from_votes(candidates: Vec<Recommendation>, votes: &[Vote]) -> Self {
        let tallies: HashMap<Uuid, Tally> = tally(votes).into_iter().collect();

        let mut ranking: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|recommendation| RankedCandidate {
                tally: tallies.get(&recommendation.id).copied().unwrap_or_default(),
                recommendation,
            })
            .collect();

        // stable, so equal candidates keep their original order
        ranking.sort_by(|a, b| {
            b.tally
                .total
                .cmp(&a.tally.total)
                .then(b.tally.score.cmp(&a.tally.score))
        });

        let winners = match ranking.first() {
            Some(best) => {
                let max = best.tally.total;
                ranking
                    .iter()
                    .take_while(|c| c.tally.total == max)
                    .cloned()
                    .collect()
            }
            None => vec![],
        };

        Consensus {
            total_votes: votes.len(),
            winners,
            ranking,
        }
    }

    pub fn total_votes(&self) -> usize {
        self.total_votes
    }

    pub fn winners(&self) -> &[RankedCandidate] {
        &self.winners
    }

    pub fn ranking(&self) -> &[RankedCandidate] {
        &self.ranking
    }

    pub fn is_ready(&self, minimum_votes: usize) -> bool {
        self.check_ready(minimum_votes).is_ok()
    }

    /// Fails unless a plan may be generated from this consensus.
    pub fn check_ready(&self, minimum_votes: usize) -> Result<(), BackendError> {
        if self.ranking.is_empty() {
            return Err(BackendError::NoCandidates);
        }

        if self.total_votes < minimum_votes {
            return Err(BackendError::NotEnoughVotes {
                actual: self.total_votes,
                required: minimum_votes,
            });
        }

        Ok(())
    }
}
