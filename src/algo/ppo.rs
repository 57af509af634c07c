//! Proximal Policy Optimization (PPO) for discrete action spaces
//!
//! PPO is an on-policy actor-critic algorithm. Each learning pass reuses the
//! buffered trajectory for several epochs of mini-batch updates and limits how
//! far the policy can move with a clipped surrogate objective.
//!
//! # Algorithm Overview
//!
//! 1. Buffer transitions produced by the current policy ([`Agent::remember`])
//! 2. On [`Agent::learn`], compute advantages with GAE
//! 3. For K epochs, shuffle and split the trajectory into mini-batches:
//!    - update the actor with the clipped objective plus an entropy bonus
//!    - update the critic with the (optionally clipped) value loss
//! 4. Clear the trajectory
//!
//! When to learn is decided by the caller, not by the agent: the trial runner
//! triggers a pass every `update_every` environment steps.
//!
//! # Checkpoints
//!
//! Networks are stored with burn's named MessagePack recorder as
//! `actor_ppo.mpk` / `critic_ppo.mpk` in the checkpoint directory, and as
//! `actor_ppo_{tag}.mpk` / `critic_ppo_{tag}.mpk` for tagged snapshots.
//!
//! Reference: "Proximal Policy Optimization Algorithms" (Schulman et al., 2017)

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, AdamW, AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{
        activation::{log_softmax, softmax},
        backend::AutodiffBackend,
        BasicOps,
    },
};
use rand::{
    distributions::{Distribution, WeightedIndex},
    seq::SliceRandom,
    thread_rng,
};
use tracing::{debug, info};

use crate::{
    env::Environment,
    error::{Error, Result},
    nn::MLP,
    traits::{ActionChoice, Agent, Losses, ToTensor, Transition},
};

/// PPO actor: `[batch, features]` → `[batch, num_actions]` logits
pub trait PPOActorModel<B: AutodiffBackend, const D: usize>: AutodiffModule<B> {
    fn forward(&self, state: Tensor<B, D>) -> Tensor<B, 2>;
}

/// PPO critic: `[batch, features]` → `[batch, 1]` state values
pub trait PPOCriticModel<B: AutodiffBackend, const D: usize>: AutodiffModule<B> {
    fn forward(&self, state: Tensor<B, D>) -> Tensor<B, 2>;
}

/// Configuration for [`PPOAgent`]
#[derive(Debug, Clone)]
pub struct PPOAgentConfig {
    /// Discount factor γ (default: 0.99)
    pub gamma: f32,
    /// GAE lambda λ (default: 0.95)
    pub gae_lambda: f32,
    /// Clipping parameter ε (default: 0.2)
    pub clip_epsilon: f32,
    /// Actor learning rate (default: 3e-4)
    pub lr_actor: f64,
    /// Critic learning rate (default: 3e-4)
    pub lr_critic: f64,
    /// Entropy bonus coefficient (default: 0.01)
    pub entropy_coef: f32,
    /// Value loss coefficient (default: 0.5)
    pub value_coef: f32,
    /// Optimisation epochs per learning pass (default: 10)
    pub n_epochs: usize,
    /// Mini-batch size (default: 5)
    pub batch_size: usize,
    /// Gradient clipping value (default: Some(0.5))
    pub gradient_clip: Option<f32>,
    /// Clip the value function update (default: false)
    pub clip_value_loss: bool,
    /// Where checkpoints are written and read (default: `tmp/trained_model`)
    pub checkpoint_dir: PathBuf,
}

impl Default for PPOAgentConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_epsilon: 0.2,
            lr_actor: 3e-4,
            lr_critic: 3e-4,
            entropy_coef: 0.01,
            value_coef: 0.5,
            n_epochs: 10,
            batch_size: 5,
            gradient_clip: Some(0.5),
            clip_value_loss: false,
            checkpoint_dir: PathBuf::from("tmp/trained_model"),
        }
    }
}

/// Transitions buffered since the last learning pass
#[derive(Clone, Debug)]
struct Trajectory<S> {
    states: Vec<S>,
    action_indices: Vec<usize>,
    rewards: Vec<f32>,
    log_probs: Vec<f32>,
    values: Vec<f32>,
    dones: Vec<bool>,
}

impl<S> Trajectory<S> {
    fn new() -> Self {
        Self {
            states: Vec::new(),
            action_indices: Vec::new(),
            rewards: Vec::new(),
            log_probs: Vec::new(),
            values: Vec::new(),
            dones: Vec::new(),
        }
    }

    fn push<A: Into<usize>>(&mut self, t: Transition<S, A>) {
        self.states.push(t.observation);
        self.action_indices.push(t.action.into());
        self.rewards.push(t.reward);
        self.log_probs.push(t.log_prob);
        self.values.push(t.value);
        self.dones.push(t.done);
    }

    fn clear(&mut self) {
        self.states.clear();
        self.action_indices.clear();
        self.rewards.clear();
        self.log_probs.clear();
        self.values.clear();
        self.dones.clear();
    }

    fn len(&self) -> usize {
        self.states.len()
    }

    fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Per mini-batch tensors shared by the actor and critic updates
struct Batch<B: Backend, const D: usize> {
    states: Tensor<B, D>,
    actions: Tensor<B, 2, Int>,
    old_log_probs: Tensor<B, 1>,
    returns: Tensor<B, 1>,
    advantages: Tensor<B, 1>,
    old_values: Tensor<B, 1>,
}

type Recorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// PPO agent for discrete action spaces
///
/// Generic over:
/// - `B`: autodiff backend (e.g. `Autodiff<Wgpu>`, `Autodiff<NdArray>`)
/// - `Actor` / `Critic`: networks implementing [`PPOActorModel`] / [`PPOCriticModel`]
/// - `E`: environment with a discrete action space
/// - `D`: rank of a batch of states
pub struct PPOAgent<B, Actor, Critic, E, const D: usize>
where
    B: AutodiffBackend,
    E: Environment,
    Actor: AutodiffModule<B>,
    Critic: AutodiffModule<B>,
{
    // Option so the optimiser can take ownership during a step
    actor: Option<Actor>,
    critic: Option<Critic>,

    trajectory: Trajectory<E::State>,
    device: &'static B::Device,
    config: PPOAgentConfig,
    learn_mode: bool,

    optimizer_actor: OptimizerAdaptor<AdamW, Actor, B>,
    optimizer_critic: OptimizerAdaptor<AdamW, Critic, B>,
}

fn adamw(gradient_clip: Option<f32>) -> AdamWConfig {
    AdamWConfig::new().with_grad_clipping(
        gradient_clip.map(burn::grad_clipping::GradientClippingConfig::Value),
    )
}

fn recorder_error(path: &Path, err: impl std::fmt::Debug) -> Error {
    Error::Checkpoint(format!("{}: {err:?}", path.display()))
}

impl<B, Actor, Critic, E, const D: usize> PPOAgent<B, Actor, Critic, E, D>
where
    B: AutodiffBackend,
    Actor: PPOActorModel<B, D>,
    Critic: PPOCriticModel<B, D>,
    E: Environment,
    E::Action: From<usize> + Into<usize>,
    Vec<E::State>: ToTensor<B, D, Float>,
{
    pub fn new(
        actor: Actor,
        critic: Critic,
        config: PPOAgentConfig,
        device: &'static B::Device,
    ) -> Self {
        let optimizer_actor = adamw(config.gradient_clip).init();
        let optimizer_critic = adamw(config.gradient_clip).init();

        Self {
            actor: Some(actor),
            critic: Some(critic),
            trajectory: Trajectory::new(),
            device,
            config,
            learn_mode: true,
            optimizer_actor,
            optimizer_critic,
        }
    }

    /// Number of transitions waiting for the next learning pass
    pub fn buffered(&self) -> usize {
        self.trajectory.len()
    }

    fn actor(&self) -> Result<&Actor> {
        self.actor
            .as_ref()
            .ok_or_else(|| Error::Agent("actor network is not available".into()))
    }

    fn critic(&self) -> Result<&Critic> {
        self.critic
            .as_ref()
            .ok_or_else(|| Error::Agent("critic network is not available".into()))
    }

    fn checkpoint_paths(&self, tag: Option<usize>) -> (PathBuf, PathBuf) {
        let suffix = tag.map(|t| format!("_{t}")).unwrap_or_default();
        let dir = &self.config.checkpoint_dir;
        (
            dir.join(format!("actor_ppo{suffix}")),
            dir.join(format!("critic_ppo{suffix}")),
        )
    }

    fn save_checkpoint(&self, tag: Option<usize>) -> Result<()> {
        fs::create_dir_all(&self.config.checkpoint_dir)?;
        let (actor_path, critic_path) = self.checkpoint_paths(tag);
        let recorder = Recorder::new();

        self.actor()?
            .clone()
            .save_file(actor_path.clone(), &recorder)
            .map_err(|e| recorder_error(&actor_path, e))?;
        self.critic()?
            .clone()
            .save_file(critic_path.clone(), &recorder)
            .map_err(|e| recorder_error(&critic_path, e))?;
        Ok(())
    }

    fn tensor_1d(&self, values: &[f32]) -> Tensor<B, 1> {
        Tensor::<B, 1>::from_data(
            TensorData::from(values).convert::<B::FloatElem>(),
            self.device,
        )
    }

    fn index_tensor(&self, indices: &[usize]) -> Tensor<B, 1, Int> {
        let indices: Vec<i32> = indices.iter().map(|&i| i as i32).collect();
        Tensor::<B, 1, Int>::from_data(
            TensorData::from(indices.as_slice()).convert::<B::IntElem>(),
            self.device,
        )
    }

    /// Generalized Advantage Estimation over the buffered trajectory.
    ///
    /// The pass has no successor observation, so an unfinished trajectory
    /// bootstraps from the value estimate of its last state.
    ///
    /// Returns `(returns, normalized advantages)`.
    fn compute_gae(&self) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let t = &self.trajectory;
        let n = t.len();
        let gamma = self.config.gamma;
        let lambda = self.config.gae_lambda;

        let bootstrap = match (t.dones.last(), t.values.last()) {
            (Some(false), Some(&v)) => v,
            _ => 0.0,
        };

        let mut advantages = vec![0.0_f32; n];
        let mut gae = 0.0;
        for i in (0..n).rev() {
            let next_value = if i + 1 == n { bootstrap } else { t.values[i + 1] };
            let not_done = 1.0 - t.dones[i] as u8 as f32;
            let delta = t.rewards[i] + gamma * next_value * not_done - t.values[i];
            gae = delta + gamma * lambda * not_done * gae;
            advantages[i] = gae;
        }

        let returns: Vec<f32> = advantages
            .iter()
            .zip(&t.values)
            .map(|(adv, v)| adv + v)
            .collect();

        let advantages = self.tensor_1d(&advantages);
        let mean = advantages.clone().mean();
        let std = (advantages.clone() - mean.clone()).powf_scalar(2.0).mean().sqrt();
        let normalized = (advantages - mean) / (std + 1e-8);

        (self.tensor_1d(&returns), normalized)
    }

    fn gather<const R: usize, K: BasicOps<B>>(
        &self,
        tensor: &Tensor<B, R, K>,
        indices: &Tensor<B, 1, Int>,
    ) -> Tensor<B, R, K> {
        tensor.clone().select(0, indices.clone())
    }

    /// Clipped surrogate step on the actor. Returns the loss including the entropy bonus.
    fn update_actor(&mut self, batch: &Batch<B, D>) -> Result<f32> {
        let actor = self
            .actor
            .take()
            .ok_or_else(|| Error::Agent("actor network is not available".into()))?;
        let eps = self.config.clip_epsilon;

        let logits = actor.forward(batch.states.clone());
        let log_probs = log_softmax(logits.clone(), 1);
        let action_log_probs = log_probs
            .clone()
            .gather(1, batch.actions.clone())
            .squeeze_dims(&[1]);

        let ratio = (action_log_probs - batch.old_log_probs.clone()).exp();
        let surr1 = ratio.clone() * batch.advantages.clone();
        let surr2 = ratio.clamp(1.0 - eps, 1.0 + eps) * batch.advantages.clone();
        let policy_loss = surr1.min_pair(surr2).mean().neg();

        let entropy = (softmax(logits, 1) * log_probs).sum_dim(1).neg().mean();
        let loss = policy_loss - entropy * self.config.entropy_coef;
        let loss_value = loss.clone().into_scalar().elem::<f32>();

        let grads = GradientsParams::from_grads(loss.backward(), &actor);
        self.actor = Some(self.optimizer_actor.step(self.config.lr_actor, actor, grads));
        Ok(loss_value)
    }

    /// Value regression step on the critic. Returns the scaled value loss.
    fn update_critic(&mut self, batch: &Batch<B, D>) -> Result<f32> {
        let critic = self
            .critic
            .take()
            .ok_or_else(|| Error::Agent("critic network is not available".into()))?;
        let eps = self.config.clip_epsilon;

        let values = critic.forward(batch.states.clone()).squeeze_dims(&[1]);
        let unclipped = (batch.returns.clone() - values.clone()).powf_scalar(2.0);
        let value_loss = if self.config.clip_value_loss {
            let clipped_values = batch.old_values.clone()
                + (values - batch.old_values.clone()).clamp(-eps, eps);
            let clipped = (batch.returns.clone() - clipped_values).powf_scalar(2.0);
            unclipped.max_pair(clipped).mean()
        } else {
            unclipped.mean()
        };
        let loss = value_loss * self.config.value_coef;
        let loss_value = loss.clone().into_scalar().elem::<f32>();

        let grads = GradientsParams::from_grads(loss.backward(), &critic);
        self.critic = Some(self.optimizer_critic.step(self.config.lr_critic, critic, grads));
        Ok(loss_value)
    }
}

impl<B, Actor, Critic, E, const D: usize> Agent<E> for PPOAgent<B, Actor, Critic, E, D>
where
    B: AutodiffBackend,
    Actor: PPOActorModel<B, D>,
    Critic: PPOCriticModel<B, D>,
    E: Environment,
    E::Action: From<usize> + Into<usize>,
    Vec<E::State>: ToTensor<B, D, Float>,
{
    fn choose_action(&mut self, observation: &E::State) -> Result<ActionChoice<E::Action>> {
        let state = vec![observation.clone()].to_tensor(self.device);

        let logits = self.actor()?.forward(state.clone());
        let probs = softmax(logits.clone(), 1).into_data();
        let log_probs = log_softmax(logits, 1).into_data();
        let value = self.critic()?.forward(state).into_data();

        let probs = probs
            .as_slice::<f32>()
            .map_err(|e| Error::Agent(format!("policy output: {e:?}")))?;
        let log_probs = log_probs
            .as_slice::<f32>()
            .map_err(|e| Error::Agent(format!("policy output: {e:?}")))?;
        let value = value
            .as_slice::<f32>()
            .map_err(|e| Error::Agent(format!("critic output: {e:?}")))?
            .first()
            .copied()
            .ok_or_else(|| Error::Agent("critic returned no value".into()))?;

        let dist = WeightedIndex::new(probs)
            .map_err(|e| Error::Agent(format!("invalid action distribution: {e}")))?;
        let action_idx = dist.sample(&mut thread_rng());

        Ok(ActionChoice {
            action: E::Action::from(action_idx),
            log_prob: log_probs[action_idx],
            value,
        })
    }

    fn remember(&mut self, transition: Transition<E::State, E::Action>) {
        if self.learn_mode {
            self.trajectory.push(transition);
        }
    }

    fn learn(&mut self) -> Result<Losses> {
        if self.trajectory.is_empty() {
            return Err(Error::Agent(
                "learning pass requested with an empty trajectory".into(),
            ));
        }
        let started = Instant::now();

        let (returns, advantages) = self.compute_gae();
        let actions = self.index_tensor(&self.trajectory.action_indices);
        let old_log_probs = self.tensor_1d(&self.trajectory.log_probs);
        let old_values = self.tensor_1d(&self.trajectory.values);

        let n_samples = self.trajectory.len();
        let batch_size = self.config.batch_size.max(1);
        let mut indices: Vec<usize> = (0..n_samples).collect();

        let mut actor_total = 0.0_f32;
        let mut critic_total = 0.0_f32;
        let mut n_updates = 0_usize;

        for _epoch in 0..self.config.n_epochs {
            indices.shuffle(&mut thread_rng());

            for chunk in indices.chunks(batch_size) {
                let states: Vec<E::State> = chunk
                    .iter()
                    .map(|&i| self.trajectory.states[i].clone())
                    .collect();
                let selected = self.index_tensor(chunk);
                let batch = Batch {
                    states: states.to_tensor(self.device),
                    actions: self.gather(&actions, &selected).unsqueeze_dim::<2>(1),
                    old_log_probs: self.gather(&old_log_probs, &selected),
                    returns: self.gather(&returns, &selected),
                    advantages: self.gather(&advantages, &selected),
                    old_values: self.gather(&old_values, &selected),
                };

                actor_total += self.update_actor(&batch)?;
                critic_total += self.update_critic(&batch)?;
                n_updates += 1;
            }
        }

        self.trajectory.clear();

        let n = n_updates.max(1) as f32;
        let losses = Losses {
            actor: actor_total / n,
            critic: critic_total / n,
            total: (actor_total + critic_total) / n,
        };
        debug!(
            samples = n_samples,
            updates = n_updates,
            elapsed = ?started.elapsed(),
            actor = losses.actor,
            critic = losses.critic,
            "learning pass done"
        );
        Ok(losses)
    }

    fn save_models(&self) -> Result<()> {
        info!(dir = %self.config.checkpoint_dir.display(), "saving models");
        self.save_checkpoint(None)
    }

    fn save_custom_models(&self, tag: usize) -> Result<()> {
        debug!(tag, dir = %self.config.checkpoint_dir.display(), "saving tagged models");
        self.save_checkpoint(Some(tag))
    }

    fn load_models(&mut self) -> Result<()> {
        let (actor_path, critic_path) = self.checkpoint_paths(None);
        for path in [&actor_path, &critic_path] {
            let file = path.with_extension("mpk");
            if !file.is_file() {
                return Err(Error::MissingCheckpoint(file));
            }
        }
        info!(dir = %self.config.checkpoint_dir.display(), "loading models");

        let recorder = Recorder::new();
        let actor = self
            .actor()?
            .clone()
            .load_file(actor_path.clone(), &recorder, self.device)
            .map_err(|e| recorder_error(&actor_path, e))?;
        let critic = self
            .critic()?
            .clone()
            .load_file(critic_path.clone(), &recorder, self.device)
            .map_err(|e| recorder_error(&critic_path, e))?;

        self.actor = Some(actor);
        self.critic = Some(critic);
        Ok(())
    }

    fn eval(&mut self) {
        self.learn_mode = false;
        self.trajectory.clear();
    }
}

impl<B: AutodiffBackend> PPOActorModel<B, 2> for MLP<B> {
    fn forward(&self, state: Tensor<B, 2>) -> Tensor<B, 2> {
        MLP::forward(self, state)
    }
}

impl<B: AutodiffBackend> PPOCriticModel<B, 2> for MLP<B> {
    fn forward(&self, state: Tensor<B, 2>) -> Tensor<B, 2> {
        MLP::forward(self, state)
    }
}
