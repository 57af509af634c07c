use tracing::warn;

use crate::{
    env::Environment,
    error::Result,
    traits::{ActionChoice, Agent, Losses, Transition},
};

/// Episode length after which an episode that never signals `done` is cut off
pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// Counters that live for a whole trial and span episodes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepCounters {
    /// Environment steps taken so far in the trial
    pub n_steps: usize,
    /// Learning passes run so far in the trial
    pub learn_iters: usize,
}

/// What a single episode produced
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpisodeOutcome {
    pub score: f64,
    /// Steps taken in this episode
    pub steps: usize,
    /// Trial step counter when the episode ended
    pub total_steps: usize,
    pub learn_events: usize,
    /// One entry per learning pass that ran during the episode
    pub losses: Vec<Losses>,
    /// Hit the step guard instead of reaching `done`
    pub truncated: bool,
}

/// Plays one episode between an environment and an agent
#[derive(Clone, Debug)]
pub struct EpisodeRunner {
    pub render: bool,
    pub learning_enabled: bool,
    /// A learning pass runs whenever the trial step counter is a multiple of this
    pub update_every: usize,
    pub max_steps: usize,
}

impl Default for EpisodeRunner {
    fn default() -> Self {
        Self {
            render: false,
            learning_enabled: true,
            update_every: 20,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl EpisodeRunner {
    pub fn run<E, A>(
        &self,
        agent: &mut A,
        env: &mut E,
        counters: &mut StepCounters,
    ) -> Result<EpisodeOutcome>
    where
        E: Environment,
        A: Agent<E> + ?Sized,
    {
        let mut observation = env.reset()?;
        let mut outcome = EpisodeOutcome::default();
        let mut done = false;
        let mut render_ok = true;

        while !done {
            if outcome.steps >= self.max_steps {
                warn!(steps = outcome.steps, "episode truncated by step guard");
                outcome.truncated = true;
                break;
            }

            if self.render && render_ok {
                if let Err(err) = env.render() {
                    warn!(%err, "rendering failed, continuing without it");
                    render_ok = false;
                }
            }

            let ActionChoice {
                action,
                log_prob,
                value,
            } = agent.choose_action(&observation)?;
            let step = env.step(action.clone())?;

            counters.n_steps += 1;
            outcome.steps += 1;
            outcome.score += f64::from(step.reward);
            done = step.done;

            agent.remember(Transition {
                observation,
                action,
                log_prob,
                value,
                reward: step.reward,
                done,
            });

            if self.learning_enabled
                && self.update_every > 0
                && counters.n_steps % self.update_every == 0
            {
                outcome.losses.push(agent.learn()?);
                outcome.learn_events += 1;
                counters.learn_iters += 1;
            }

            observation = step.observation;
        }

        outcome.total_steps = counters.n_steps;
        Ok(outcome)
    }
}
