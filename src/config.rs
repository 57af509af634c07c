//! Experiment configuration
//!
//! Values come from the defaults below, then an optional TOML file, then
//! command-line overrides applied by the binary.
//!
//! ```toml
//! env = "cart-pole"
//! load_checkpoint = false
//! n_trials = 3
//! n_episodes = 500
//! update_every = 20
//!
//! [ppo]
//! batch_size = 5
//! alpha = 0.0003
//! hidden_layers = [256, 256]
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    algo::ppo::PPOAgentConfig,
    error::{Error, Result},
    trainer::{ControllerConfig, DEFAULT_MAX_STEPS},
};

/// Environment to run the experiment against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum EnvKind {
    CartPole,
    MountainCar,
}

impl EnvKind {
    pub fn name(self) -> &'static str {
        match self {
            EnvKind::CartPole => "CartPole",
            EnvKind::MountainCar => "MountainCar",
        }
    }
}

/// Hyperparameters handed to the PPO agent untouched
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PpoParams {
    pub batch_size: usize,
    pub n_epochs: usize,
    /// Learning rate of both actor and critic
    pub alpha: f64,
    pub gamma: f32,
    pub gae_lambda: f32,
    pub clip_epsilon: f32,
    /// Clip the critic's value estimate around the one seen while acting
    pub clip_value_loss: bool,
    pub hidden_layers: Vec<usize>,
}

impl Default for PpoParams {
    fn default() -> Self {
        Self {
            batch_size: 5,
            n_epochs: 10,
            alpha: 3e-4,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_epsilon: 0.2,
            clip_value_loss: false,
            hidden_layers: vec![256, 256],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub env: EnvKind,
    pub checkpoint_dir: PathBuf,
    /// Evaluate a saved policy instead of training a new one
    pub load_checkpoint: bool,
    pub render: bool,
    pub n_trials: usize,
    pub n_episodes: usize,
    /// Environment steps between learning passes
    pub update_every: usize,
    pub max_steps_per_episode: usize,
    /// Where the CSV tables go
    pub data_dir: PathBuf,
    /// File name prefix of the tables, `PPO-{env}` when unset
    pub prefix: Option<String>,
    pub progress: bool,
    pub ppo: PpoParams,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            env: EnvKind::CartPole,
            checkpoint_dir: PathBuf::from("tmp/trained_model"),
            load_checkpoint: false,
            render: false,
            n_trials: 1,
            n_episodes: 10,
            update_every: 20,
            max_steps_per_episode: DEFAULT_MAX_STEPS,
            data_dir: PathBuf::from("data"),
            prefix: None,
            progress: true,
            ppo: PpoParams::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        if self.update_every == 0 {
            return invalid("update_every must be at least 1");
        }
        if self.max_steps_per_episode == 0 {
            return invalid("max_steps_per_episode must be at least 1");
        }
        if self.ppo.batch_size == 0 {
            return invalid("ppo.batch_size must be at least 1");
        }
        if self.ppo.n_epochs == 0 {
            return invalid("ppo.n_epochs must be at least 1");
        }
        if self.ppo.hidden_layers.contains(&0) {
            return invalid("ppo.hidden_layers widths must be at least 1");
        }
        if !(self.ppo.alpha > 0.0) {
            return invalid("ppo.alpha must be positive");
        }
        if self.prefix.as_deref().is_some_and(str::is_empty) {
            return invalid("prefix must not be empty");
        }
        Ok(())
    }

    pub fn training_mode(&self) -> bool {
        !self.load_checkpoint
    }

    pub fn output_prefix(&self) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| format!("PPO-{}", self.env.name()))
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            trials: self.n_trials,
            episodes_per_trial: self.n_episodes,
            update_every: self.update_every,
            training_mode: self.training_mode(),
            render: self.render,
            max_steps_per_episode: self.max_steps_per_episode,
            show_progress: self.progress,
        }
    }

    pub fn agent_config(&self) -> PPOAgentConfig {
        PPOAgentConfig {
            gamma: self.ppo.gamma,
            gae_lambda: self.ppo.gae_lambda,
            clip_epsilon: self.ppo.clip_epsilon,
            clip_value_loss: self.ppo.clip_value_loss,
            lr_actor: self.ppo.alpha,
            lr_critic: self.ppo.alpha,
            n_epochs: self.ppo.n_epochs,
            batch_size: self.ppo.batch_size,
            checkpoint_dir: self.checkpoint_dir.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ExperimentConfig::from_toml_str("").unwrap();
        assert_eq!(config, ExperimentConfig::default());
        assert!(config.training_mode());
        assert_eq!(config.output_prefix(), "PPO-CartPole");
        config.validate().unwrap();
    }

    #[test]
    fn nested_ppo_section_overrides_selected_fields() {
        let config = ExperimentConfig::from_toml_str(
            r#"
            env = "mountain-car"
            load_checkpoint = true
            n_trials = 3
            checkpoint_dir = "models/ppo"

            [ppo]
            batch_size = 64
            clip_value_loss = true
            hidden_layers = [64, 64]
            "#,
        )
        .unwrap();

        assert_eq!(config.env, EnvKind::MountainCar);
        assert!(!config.training_mode());
        assert_eq!(config.n_trials, 3);
        assert_eq!(config.ppo.batch_size, 64);
        assert_eq!(config.ppo.n_epochs, 10);
        assert_eq!(config.ppo.hidden_layers, vec![64, 64]);
        assert_eq!(config.output_prefix(), "PPO-MountainCar");

        let agent = config.agent_config();
        assert_eq!(agent.batch_size, 64);
        assert!(agent.clip_value_loss);
        assert_eq!(agent.checkpoint_dir, PathBuf::from("models/ppo"));
        assert!(!config.controller_config().training_mode);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ExperimentConfig::from_toml_str("n_episode = 3").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn zero_update_cadence_is_invalid() {
        let config = ExperimentConfig {
            update_every: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn zero_width_hidden_layer_is_invalid() {
        let mut config = ExperimentConfig::default();
        config.ppo.hidden_layers = vec![64, 0];
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.ppo.hidden_layers = vec![];
        config.validate().unwrap();
    }

    #[test]
    fn empty_prefix_is_invalid() {
        let config = ExperimentConfig {
            prefix: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
