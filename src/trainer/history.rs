use std::collections::BTreeMap;

use crate::traits::Losses;

/// Number of trailing episodes in the moving average score
pub const AVERAGE_WINDOW: usize = 100;

/// Episode cadence of tagged checkpoints
pub const TAG_EVERY: usize = 100;

/// Mean of the last `window` scores (fewer when the history is shorter)
pub fn moving_average(scores: &[f64], window: usize) -> Option<f64> {
    let start = scores.len().saturating_sub(window.max(1));
    let tail = &scores[start..];
    if tail.is_empty() {
        return None;
    }
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Everything one trial produced, episode by episode
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrialHistory {
    pub scores: Vec<f64>,
    pub avg_scores: Vec<f64>,
    /// Mean losses per episode, `None` when no learning pass ran during it.
    /// Only filled in training mode.
    pub losses: Vec<Option<Losses>>,
}

impl TrialHistory {
    /// Append an episode score and return the updated moving average
    pub fn push_score(&mut self, score: f64) -> f64 {
        self.scores.push(score);
        let avg = moving_average(&self.scores, AVERAGE_WINDOW).unwrap_or(score);
        self.avg_scores.push(avg);
        avg
    }

    pub fn push_losses(&mut self, losses: Option<Losses>) {
        self.losses.push(losses);
    }

    pub fn episodes(&self) -> usize {
        self.scores.len()
    }
}

/// Trial index → history of that trial
pub type ResultBook = BTreeMap<usize, TrialHistory>;

/// What the agent should persist after an episode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckpointDecision {
    pub save_best: bool,
    /// Tag for an extra snapshot, the episode index
    pub save_tagged: Option<usize>,
}

/// Best-score tracking for one trial.
///
/// `best_score` starts at the environment's reward floor and never decreases.
/// A moving average that ties or beats it becomes the new best; the "best"
/// checkpoint is only written in training mode. Tagged snapshots are taken
/// every [`TAG_EVERY`] episodes in both modes.
#[derive(Clone, Debug)]
pub struct CheckpointPolicy {
    best_score: f64,
    training_mode: bool,
    tag_every: usize,
}

impl CheckpointPolicy {
    pub fn new(floor: f64, training_mode: bool) -> Self {
        Self {
            best_score: floor,
            training_mode,
            tag_every: TAG_EVERY,
        }
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn observe(&mut self, episode: usize, avg_score: f64) -> CheckpointDecision {
        let improved = avg_score >= self.best_score;
        if improved {
            self.best_score = avg_score;
        }
        CheckpointDecision {
            save_best: improved && self.training_mode,
            save_tagged: (episode % self.tag_every == 0).then_some(episode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average_uses_available_history() {
        assert_eq!(moving_average(&[], AVERAGE_WINDOW), None);
        assert_eq!(moving_average(&[10.0], AVERAGE_WINDOW), Some(10.0));
        assert_eq!(moving_average(&[10.0, 20.0], AVERAGE_WINDOW), Some(15.0));
    }

    #[test]
    fn moving_average_drops_old_episodes() {
        let mut history = TrialHistory::default();
        for i in 0..150 {
            history.push_score(i as f64);
        }

        // episodes 50..=149
        let expected = (50..150).sum::<usize>() as f64 / 100.0;
        assert_eq!(history.avg_scores[149], expected);
        // still growing window at 99
        assert_eq!(history.avg_scores[99], (0..100).sum::<usize>() as f64 / 100.0);
        assert_eq!(history.avg_scores.len(), history.episodes());
    }

    #[test]
    fn best_score_is_monotonic() {
        let mut policy = CheckpointPolicy::new(f64::NEG_INFINITY, true);
        let mut previous = policy.best_score();
        for (i, avg) in [3.0, -1.0, 5.0, 5.0, 4.9, 7.5, 0.0].into_iter().enumerate() {
            let decision = policy.observe(i, avg);
            assert!(policy.best_score() >= previous);
            assert_eq!(decision.save_best, avg >= previous);
            previous = policy.best_score();
        }
        assert_eq!(policy.best_score(), 7.5);
    }

    #[test]
    fn ties_count_as_improvement() {
        let mut policy = CheckpointPolicy::new(1.0, true);
        assert!(policy.observe(1, 1.0).save_best);
    }

    #[test]
    fn evaluation_never_saves_best_but_still_tags() {
        let mut policy = CheckpointPolicy::new(-1000.0, false);

        let first = policy.observe(0, 50.0);
        assert!(!first.save_best);
        assert_eq!(first.save_tagged, Some(0));
        assert_eq!(policy.best_score(), 50.0);

        assert_eq!(policy.observe(100, 60.0).save_tagged, Some(100));
        assert_eq!(policy.observe(101, 70.0).save_tagged, None);
    }
}
