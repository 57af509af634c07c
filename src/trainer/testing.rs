//! Scripted environment and recording agent for driving the trainer in tests

use std::{cell::RefCell, path::PathBuf, rc::Rc};

use crate::{
    env::{Environment, Step},
    error::{Error, Result},
    traits::{ActionChoice, Agent, Losses, Transition},
};

/// Plays back fixed reward sequences, one per episode, cycling when exhausted.
/// An empty sequence never finishes.
pub struct ScriptedEnv {
    episodes: Vec<Vec<f32>>,
    floor: f32,
    episode: usize,
    position: usize,
    pub resets: usize,
    pub fail_render: bool,
}

impl ScriptedEnv {
    pub fn new(episodes: Vec<Vec<f32>>, floor: f32) -> Self {
        Self {
            episodes,
            floor,
            episode: 0,
            position: 0,
            resets: 0,
            fail_render: false,
        }
    }

    /// `n` single-step episodes with reward `reward`
    pub fn constant(n: usize, reward: f32) -> Self {
        Self::new(vec![vec![reward]; n], f32::NEG_INFINITY)
    }

    fn script(&self) -> &[f32] {
        &self.episodes[(self.episode - 1) % self.episodes.len()]
    }
}

impl Environment for ScriptedEnv {
    type State = [f32; 1];
    type Action = usize;

    fn reset(&mut self) -> Result<Self::State> {
        self.resets += 1;
        self.episode += 1;
        self.position = 0;
        Ok([0.0])
    }

    fn step(&mut self, _action: usize) -> Result<Step<Self::State>> {
        let script = self.script();
        let reward = script.get(self.position).copied().unwrap_or(0.0);
        self.position += 1;
        Ok(Step {
            observation: [self.position as f32],
            reward,
            done: !script.is_empty() && self.position >= script.len(),
        })
    }

    fn render(&mut self) -> Result<()> {
        if self.fail_render {
            return Err(Error::Environment("no display".into()));
        }
        Ok(())
    }

    fn reward_range(&self) -> (f32, f32) {
        (self.floor, f32::INFINITY)
    }

    fn observation_dim(&self) -> usize {
        1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Learn,
    SaveBest,
    SaveTagged(usize),
    Load,
    Eval,
}

/// Everything a [`RecordingAgent`] saw, shared with the test after the agent is dropped
#[derive(Default)]
pub struct Journal {
    pub events: Vec<Event>,
    pub transitions: Vec<Transition<[f32; 1], usize>>,
}

impl Journal {
    pub fn count(&self, event: &Event) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    pub fn tags(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::SaveTagged(tag) => Some(*tag),
                _ => None,
            })
            .collect()
    }
}

pub struct RecordingAgent {
    pub journal: Rc<RefCell<Journal>>,
    pub checkpoint: Option<PathBuf>,
    pub losses: Losses,
    pub fail_learn: bool,
}

impl RecordingAgent {
    pub fn new(journal: Rc<RefCell<Journal>>) -> Self {
        Self {
            journal,
            checkpoint: None,
            losses: Losses {
                actor: 0.5,
                critic: 1.5,
                total: 2.0,
            },
            fail_learn: false,
        }
    }
}

impl Agent<ScriptedEnv> for RecordingAgent {
    fn choose_action(&mut self, _observation: &[f32; 1]) -> Result<ActionChoice<usize>> {
        Ok(ActionChoice {
            action: 0,
            log_prob: -0.1,
            value: 0.0,
        })
    }

    fn remember(&mut self, transition: Transition<[f32; 1], usize>) {
        self.journal.borrow_mut().transitions.push(transition);
    }

    fn learn(&mut self) -> Result<Losses> {
        if self.fail_learn {
            return Err(Error::Agent("diverged".into()));
        }
        self.journal.borrow_mut().events.push(Event::Learn);
        Ok(self.losses)
    }

    fn save_models(&self) -> Result<()> {
        self.journal.borrow_mut().events.push(Event::SaveBest);
        Ok(())
    }

    fn save_custom_models(&self, tag: usize) -> Result<()> {
        self.journal.borrow_mut().events.push(Event::SaveTagged(tag));
        Ok(())
    }

    fn load_models(&mut self) -> Result<()> {
        match &self.checkpoint {
            Some(_) => {
                self.journal.borrow_mut().events.push(Event::Load);
                Ok(())
            }
            None => Err(Error::MissingCheckpoint(PathBuf::from("tmp/actor_ppo.mpk"))),
        }
    }

    fn eval(&mut self) {
        self.journal.borrow_mut().events.push(Event::Eval);
    }
}
