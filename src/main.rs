use std::path::PathBuf;

use anyhow::Context;
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    tensor::Float,
};
use clap::Parser;
use gym_rs::utils::renderer::RenderMode;
use lander_rl::{
    algo::ppo::PPOAgent,
    config::{EnvKind, ExperimentConfig},
    env::DiscreteActionSpace,
    gym::{CartPole, MountainCar},
    nn::{MLPConfig, MLP},
    trainer::{Controller, ResultBook, ResultRecorder},
    traits::ToTensor,
};
use once_cell::sync::Lazy;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

type PPOBackend = Autodiff<Wgpu>;

static DEVICE: Lazy<WgpuDevice> = Lazy::new(WgpuDevice::default);

#[derive(Debug, Parser)]
#[command(about = "Train or evaluate a PPO agent over repeated trials")]
struct Cli {
    #[arg(short = 'v', long, action = clap::ArgAction::Count, help = "Increase verbosity (-v = DEBUG, -vv = TRACE)")]
    verbose: u8,

    #[arg(long, help = "TOML experiment configuration")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Environment to run")]
    env: Option<EnvKind>,

    #[arg(long, conflicts_with = "train", help = "Evaluate the saved policy instead of training")]
    evaluate: bool,

    #[arg(long, help = "Train a fresh policy even if the config asks for evaluation")]
    train: bool,

    #[arg(long, conflicts_with = "no_render", help = "Render the environment while stepping")]
    render: bool,

    #[arg(long, help = "Do not render, whatever the config says")]
    no_render: bool,

    #[arg(long, help = "Number of trials")]
    trials: Option<usize>,

    #[arg(long, help = "Episodes per trial")]
    episodes: Option<usize>,

    #[arg(long, help = "Environment steps between learning passes")]
    update_every: Option<usize>,

    #[arg(long, help = "Cut episodes off after this many steps")]
    max_steps: Option<usize>,

    #[arg(long, help = "Directory for model checkpoints")]
    checkpoint_dir: Option<PathBuf>,

    #[arg(long, help = "Directory for the CSV result tables")]
    data_dir: Option<PathBuf>,

    #[arg(long, help = "Hide the episode progress bar")]
    no_progress: bool,
}

impl Cli {
    fn apply(&self, config: &mut ExperimentConfig) {
        if let Some(env) = self.env {
            config.env = env;
        }
        if self.evaluate {
            config.load_checkpoint = true;
        } else if self.train {
            config.load_checkpoint = false;
        }
        if self.render {
            config.render = true;
        } else if self.no_render {
            config.render = false;
        }
        if let Some(trials) = self.trials {
            config.n_trials = trials;
        }
        if let Some(episodes) = self.episodes {
            config.n_episodes = episodes;
        }
        if let Some(update_every) = self.update_every {
            config.update_every = update_every;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps_per_episode = max_steps;
        }
        if let Some(dir) = &self.checkpoint_dir {
            config.checkpoint_dir = dir.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if self.no_progress {
            config.progress = false;
        }
    }
}

fn run<E, const N: usize>(mut env: E, config: &ExperimentConfig) -> lander_rl::Result<ResultBook>
where
    E: DiscreteActionSpace<State = [f32; N]>,
    E::Action: From<usize> + Into<usize>,
    Vec<E::State>: ToTensor<PPOBackend, 2, Float>,
{
    let obs_dim = env.observation_dim();
    let n_actions = env.num_actions();
    let hidden = config.ppo.hidden_layers.clone();

    Controller::new(config.controller_config()).run(&mut env, |_trial| {
        let actor = MLPConfig::new(obs_dim, hidden.clone(), n_actions).init::<PPOBackend>(&*DEVICE);
        let critic = MLPConfig::new(obs_dim, hidden.clone(), 1).init::<PPOBackend>(&*DEVICE);
        Ok(PPOAgent::<PPOBackend, MLP<PPOBackend>, MLP<PPOBackend>, E, 2>::new(
            actor,
            critic,
            config.agent_config(),
            &*DEVICE,
        ))
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .init();

    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    info!(
        env = config.env.name(),
        training = config.training_mode(),
        trials = config.n_trials,
        episodes = config.n_episodes,
        "starting experiment"
    );

    let render_mode = if config.render {
        RenderMode::Human
    } else {
        RenderMode::None
    };
    let book = match config.env {
        EnvKind::CartPole => run(CartPole::new(render_mode), &config)?,
        EnvKind::MountainCar => run(MountainCar::new(render_mode), &config)?,
    };

    let recorder = ResultRecorder::new(&config.data_dir, config.output_prefix());
    let written = recorder
        .export(&book, config.training_mode())
        .context("exporting results")?;
    for path in &written {
        info!(path = %path.display(), "wrote table");
    }

    info!("Experiment finished");
    Ok(())
}
