use std::time::Instant;

use anyhow::{anyhow, Context};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde_json::json;
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use taxi_qlearning::env::{Env, TaxiEnv};
use taxi_qlearning::trainer::Trainer;
use taxi_qlearning::utils::{plot_performance, save_json};
use taxi_qlearning::{AgentConfig, LearningAgent, ValueTable};

/// Train a tabular Q-learning agent on Taxi and report its sliding-window performance
#[derive(StructOpt, Debug)]
#[structopt(name = "RLRust - Taxi")]
struct Cli {
    /// Number of episodes for the training
    #[structopt(long = "n_episodes", short = "n", default_value = "20000")]
    n_episodes: u128,

    /// Number of episodes averaged for the performance window
    #[structopt(long = "window", default_value = "100")]
    window: usize,

    /// Maximum number of steps per episode
    #[structopt(long = "max_steps", default_value = "200")]
    max_steps: u128,

    /// Seed for reproducibility
    #[structopt(long = "seed", default_value = "42")]
    seed: u64,

    /// Learning rate used until the first episode ends
    #[structopt(long = "learning_rate", default_value = "0.1")]
    learning_rate: f64,

    /// Discount factor used until the first episode ends
    #[structopt(long = "discount_factor", default_value = "1.0")]
    discount_factor: f64,

    /// Initial value for the exploration ratio
    #[structopt(long = "initial_epsilon", default_value = "1.0")]
    initial_epsilon: f64,

    /// Stop training once the window average reaches this reward
    #[structopt(long = "target_average")]
    target_average: Option<f64>,

    /// Number of greedy episodes run after training
    #[structopt(long = "eval_episodes", default_value = "100")]
    eval_episodes: u128,

    /// Show example of episode
    #[structopt(long = "show_example")]
    show_example: bool,

    /// Hide the progress bar
    #[structopt(long = "quiet")]
    quiet: bool,

    /// Where to draw the window-average curve (png)
    #[structopt(long = "plot")]
    plot: Option<String>,

    /// Where to write the training results (json)
    #[structopt(long = "results")]
    results: Option<String>,

    /// Where to write the learned value table (json)
    #[structopt(long = "save_table")]
    save_table: Option<String>,

    /// Value table to start from (json)
    #[structopt(long = "load_table")]
    load_table: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli: Cli = Cli::from_args();

    let mut env = TaxiEnv::new(cli.max_steps, cli.seed);
    let config = AgentConfig::new(cli.n_episodes, env.n_actions())
        .with_learning_rate(cli.learning_rate)
        .with_discount_factor(cli.discount_factor)
        .with_epsilon(cli.initial_epsilon);
    let rng = SmallRng::seed_from_u64(cli.seed);
    let mut agent: LearningAgent<usize> = match &cli.load_table {
        Some(path) => {
            let table: ValueTable<usize> = ValueTable::load_json(path)
                .with_context(|| format!("could not load value table from {}", path))?;
            info!(path = %path, states = table.len(), "loaded value table");
            LearningAgent::with_table(config, table, rng)?
        }
        None => LearningAgent::with_rng(config, rng)?,
    };

    let trainer = Trainer::new(cli.window, cli.target_average, !cli.quiet);
    let now: Instant = Instant::now();
    let results = trainer.interact(&mut env, &mut agent, cli.n_episodes)?;
    info!(elapsed = ?now.elapsed(), "training time");
    info!(
        "Best Average Reward over {} Episodes: {}",
        cli.window, results.best_avg_reward
    );

    let (eval_rewards, eval_lengths) = trainer.evaluate(&mut env, &agent, cli.eval_episodes)?;
    if !eval_rewards.is_empty() {
        let mean_reward: f64 = eval_rewards.iter().sum::<f64>() / eval_rewards.len() as f64;
        let mean_length: f64 =
            eval_lengths.iter().sum::<u128>() as f64 / eval_lengths.len() as f64;
        info!(mean_reward, mean_length, "greedy evaluation");
    }

    if cli.show_example {
        trainer.example(&mut env, &agent)?;
    }

    if let Some(path) = &cli.plot {
        plot_performance(path, cli.n_episodes, &results.avg_rewards, cli.window)
            .map_err(|e| anyhow!("could not draw {}: {}", path, e))?;
    }
    if let Some(path) = &cli.results {
        save_json(
            path,
            &json!({
                "avg_rewards": &results.avg_rewards,
                "best_avg_reward": results.best_avg_reward,
                "episode_rewards": &results.episode_rewards,
                "episode_lengths": &results.episode_lengths,
                "eval_rewards": &eval_rewards,
                "hyper_parameters": agent.hyper_parameters(),
            }),
        )
        .with_context(|| format!("could not write results to {}", path))?;
    }
    if let Some(path) = &cli.save_table {
        agent
            .value_table()
            .save_json(path)
            .with_context(|| format!("could not save value table to {}", path))?;
    }
    Ok(())
}
