use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::{
    env::Environment,
    error::Result,
    traits::{Agent, Losses},
};

use super::{
    history::{CheckpointPolicy, ResultBook, TrialHistory},
    runner::{EpisodeRunner, StepCounters, DEFAULT_MAX_STEPS},
};

/// Settings of a whole run
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub trials: usize,
    pub episodes_per_trial: usize,
    /// Environment steps between learning passes
    pub update_every: usize,
    /// `false` means evaluation: checkpoints are loaded and nothing is learned
    pub training_mode: bool,
    pub render: bool,
    pub max_steps_per_episode: usize,
    pub show_progress: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            trials: 1,
            episodes_per_trial: 10,
            update_every: 20,
            training_mode: true,
            render: false,
            max_steps_per_episode: DEFAULT_MAX_STEPS,
            show_progress: false,
        }
    }
}

/// Mutable state owned by one trial
#[derive(Clone, Debug)]
pub struct TrialState {
    pub counters: StepCounters,
    pub policy: CheckpointPolicy,
    pub history: TrialHistory,
}

impl TrialState {
    pub fn new(reward_floor: f64, training_mode: bool) -> Self {
        Self {
            counters: StepCounters::default(),
            policy: CheckpointPolicy::new(reward_floor, training_mode),
            history: TrialHistory::default(),
        }
    }
}

/// Runs trials of episodes and collects their histories.
///
/// Each trial gets a fresh agent from the factory passed to [`Controller::run`].
/// In evaluation mode that agent must load its checkpoint before the first
/// episode; a missing checkpoint aborts the run.
pub struct Controller {
    config: ControllerConfig,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    pub fn run<E, A, F>(&self, env: &mut E, mut make_agent: F) -> Result<ResultBook>
    where
        E: Environment,
        A: Agent<E>,
        F: FnMut(usize) -> Result<A>,
    {
        let mut book = ResultBook::new();
        for trial in 0..self.config.trials {
            info!(trial = trial + 1, of = self.config.trials, "starting trial");
            let agent = make_agent(trial)?;
            let history = self.run_trial(trial, agent, env)?;
            book.insert(trial, history);
        }
        Ok(book)
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(self.config.episodes_per_trial as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} episodes {msg}",
        ) {
            bar.set_style(style);
        }
        bar
    }

    fn run_trial<E, A>(&self, trial: usize, mut agent: A, env: &mut E) -> Result<TrialHistory>
    where
        E: Environment,
        A: Agent<E>,
    {
        let training = self.config.training_mode;
        if !training {
            agent.load_models()?;
            agent.eval();
        }

        let mut state = TrialState::new(f64::from(env.reward_range().0), training);
        let runner = EpisodeRunner {
            render: self.config.render,
            learning_enabled: training,
            update_every: self.config.update_every,
            max_steps: self.config.max_steps_per_episode,
        };
        let progress = self.progress_bar();

        for episode in 0..self.config.episodes_per_trial {
            let outcome = runner.run(&mut agent, env, &mut state.counters)?;

            let avg_score = state.history.push_score(outcome.score);
            if training {
                state.history.push_losses(Losses::mean(&outcome.losses));
            }

            let decision = state.policy.observe(episode, avg_score);
            if decision.save_best {
                agent.save_models()?;
            }
            if let Some(tag) = decision.save_tagged {
                agent.save_custom_models(tag)?;
            }

            debug!(
                trial,
                episode,
                score = outcome.score,
                avg_score,
                time_steps = state.counters.n_steps,
                learning_steps = state.counters.learn_iters,
                truncated = outcome.truncated,
                "episode finished"
            );
            progress.set_message(format!("avg {avg_score:.2}"));
            progress.inc(1);
        }
        progress.finish_and_clear();

        info!(
            trial = trial + 1,
            episodes = state.history.episodes(),
            time_steps = state.counters.n_steps,
            learning_steps = state.counters.learn_iters,
            best_score = state.policy.best_score(),
            "trial finished"
        );
        Ok(state.history)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, path::PathBuf, rc::Rc};

    use super::*;
    use crate::error::Error;
    use crate::trainer::testing::{Event, Journal, RecordingAgent, ScriptedEnv};

    fn journal() -> Rc<RefCell<Journal>> {
        Rc::new(RefCell::new(Journal::default()))
    }

    fn config(episodes: usize, training_mode: bool) -> ControllerConfig {
        ControllerConfig {
            episodes_per_trial: episodes,
            training_mode,
            ..Default::default()
        }
    }

    #[test]
    fn best_checkpoint_follows_the_moving_average() {
        let mut env = ScriptedEnv::new(vec![vec![10.0], vec![20.0], vec![-5.0]], -1000.0);
        let log = journal();

        let book = Controller::new(config(3, true))
            .run(&mut env, |_| Ok(RecordingAgent::new(log.clone())))
            .unwrap();

        let history = &book[&0];
        assert_eq!(history.scores, vec![10.0, 20.0, -5.0]);
        assert_eq!(history.avg_scores[0], 10.0);
        assert_eq!(history.avg_scores[1], 15.0);
        assert!((history.avg_scores[2] - 25.0 / 3.0).abs() < 1e-12);

        // saves after episodes 0 and 1 only; episode 0 also takes the tagged snapshot
        assert_eq!(
            log.borrow().events,
            vec![Event::SaveBest, Event::SaveTagged(0), Event::SaveBest]
        );
    }

    #[test]
    fn tagged_snapshots_every_hundred_episodes() {
        let mut env = ScriptedEnv::constant(1, 1.0);
        let log = journal();

        Controller::new(config(201, true))
            .run(&mut env, |_| Ok(RecordingAgent::new(log.clone())))
            .unwrap();

        assert_eq!(log.borrow().tags(), vec![0, 100, 200]);
    }

    #[test]
    fn evaluation_loads_first_and_never_learns() {
        let mut env = ScriptedEnv::new(vec![vec![1.0; 30]], -1000.0);
        let log = journal();

        let book = Controller::new(config(3, false))
            .run(&mut env, |_| {
                let mut agent = RecordingAgent::new(log.clone());
                agent.checkpoint = Some(PathBuf::from("tmp/trained_model"));
                Ok(agent)
            })
            .unwrap();

        let log = log.borrow();
        assert_eq!(&log.events[..2], &[Event::Load, Event::Eval]);
        assert_eq!(log.count(&Event::Learn), 0);
        assert_eq!(log.count(&Event::SaveBest), 0);
        // the periodic snapshot still fires in evaluation
        assert_eq!(log.tags(), vec![0]);
        assert_eq!(book[&0].scores, vec![30.0; 3]);
        assert!(book[&0].losses.is_empty());
    }

    #[test]
    fn evaluation_without_checkpoint_fails_before_any_episode() {
        let mut env = ScriptedEnv::constant(1, 1.0);
        let log = journal();

        let err = Controller::new(config(5, false))
            .run(&mut env, |_| Ok(RecordingAgent::new(log.clone())))
            .unwrap_err();

        assert!(matches!(err, Error::MissingCheckpoint(_)));
        assert_eq!(env.resets, 0);
        assert!(log.borrow().transitions.is_empty());
    }

    #[test]
    fn episodes_without_learning_have_no_losses() {
        // 15-step episodes, learning every 20 steps: passes at steps 20, 40, 60
        let mut env = ScriptedEnv::new(vec![vec![1.0; 15]], -1000.0);
        let log = journal();

        let book = Controller::new(ControllerConfig {
            episodes_per_trial: 4,
            update_every: 20,
            ..Default::default()
        })
        .run(&mut env, |_| Ok(RecordingAgent::new(log.clone())))
        .unwrap();

        let losses = &book[&0].losses;
        assert_eq!(losses.len(), 4);
        assert!(losses[0].is_none());
        assert!(losses[1].is_some());
        assert!(losses[2].is_some());
        assert!(losses[3].is_some());
        assert_eq!(log.borrow().count(&Event::Learn), 3);
    }

    #[test]
    fn every_trial_starts_from_fresh_counters() {
        let mut env = ScriptedEnv::new(vec![vec![1.0; 10]], -1000.0);
        let log = journal();
        let mut built = Vec::new();

        let book = Controller::new(ControllerConfig {
            trials: 3,
            episodes_per_trial: 2,
            update_every: 20,
            ..Default::default()
        })
        .run(&mut env, |trial| {
            built.push(trial);
            Ok(RecordingAgent::new(log.clone()))
        })
        .unwrap();

        assert_eq!(built, vec![0, 1, 2]);
        assert_eq!(book.len(), 3);
        // 20 steps per trial, one pass each, on a counter that restarts at 0
        assert_eq!(log.borrow().count(&Event::Learn), 3);
        for history in book.values() {
            assert_eq!(history.losses, vec![None, Some(RecordingAgent::new(journal()).losses)]);
        }
    }

    #[test]
    fn learn_failure_aborts_the_run() {
        let mut env = ScriptedEnv::new(vec![vec![1.0; 25]], -1000.0);

        let result = Controller::new(config(2, true)).run(&mut env, |_| {
            let mut agent = RecordingAgent::new(journal());
            agent.fail_learn = true;
            Ok(agent)
        });

        assert!(matches!(result, Err(Error::Agent(_))));
    }
}
