use kdam::{tqdm, BarExt};
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::hash::Hash;
use thiserror::Error;
use tracing::info;

use crate::agent::LearningAgent;
use crate::env::{Env, EnvError};
use crate::error::AgentError;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainResults {
    /// Mean reward over the last `window` episodes, one entry per episode
    /// once the first window is full.
    pub avg_rewards: Vec<f64>,
    pub best_avg_reward: f64,
    pub episode_rewards: Vec<f64>,
    pub episode_lengths: Vec<u128>,
    pub training_error: Vec<f64>,
}

/// Episode loop around a [`LearningAgent`] and an [`Env`].
#[derive(Debug, Clone)]
pub struct Trainer {
    pub window: usize,
    /// Stop as soon as the window average reaches this value.
    pub target_average: Option<f64>,
    pub show_progress: bool,
}

impl Trainer {
    pub fn new(window: usize, target_average: Option<f64>, show_progress: bool) -> Self {
        Self {
            window,
            target_average,
            show_progress,
        }
    }

    pub fn interact<S, R, E>(
        &self,
        env: &mut E,
        agent: &mut LearningAgent<S, R>,
        num_episodes: u128,
    ) -> Result<TrainResults, TrainError>
    where
        S: Hash + Eq + Clone,
        R: Rng,
        E: Env<S> + ?Sized,
    {
        let mut results = TrainResults {
            avg_rewards: vec![],
            best_avg_reward: f64::NEG_INFINITY,
            episode_rewards: vec![],
            episode_lengths: vec![],
            training_error: vec![],
        };
        let mut samp_rewards: VecDeque<f64> = VecDeque::with_capacity(self.window);

        let mut pb = tqdm!(total = num_episodes as usize, disable = !self.show_progress);
        pb.set_description("Episodes");
        pb.refresh();

        for episode in 1..=num_episodes {
            let mut action_counter: u128 = 0;
            let mut epi_reward: f64 = 0.0;
            let mut state: S = env.reset();
            loop {
                action_counter += 1;
                let action: usize = agent.select_action(&state);
                let (next_state, reward, done) = env.step(action)?;
                let td: f64 = agent.step(&state, action, reward, &next_state, done)?;
                results.training_error.push(td);
                epi_reward += reward;
                state = next_state;
                if done {
                    break;
                }
            }
            results.episode_rewards.push(epi_reward);
            results.episode_lengths.push(action_counter);

            if self.window > 0 {
                if samp_rewards.len() == self.window {
                    samp_rewards.pop_front();
                }
                samp_rewards.push_back(epi_reward);
                if samp_rewards.len() == self.window {
                    let avg_reward: f64 = samp_rewards.iter().sum::<f64>() / self.window as f64;
                    results.avg_rewards.push(avg_reward);
                    if avg_reward > results.best_avg_reward {
                        results.best_avg_reward = avg_reward;
                        pb.set_postfix(format!("best avg={:.2}", avg_reward));
                    }
                }
            }
            pb.update(1);

            if let Some(target) = self.target_average {
                if results.best_avg_reward >= target {
                    info!(episode = %episode, target_average = target, "environment solved");
                    break;
                }
            }
        }
        if self.show_progress {
            eprintln!();
        }
        info!(
            episodes = results.episode_rewards.len(),
            best_avg_reward = results.best_avg_reward,
            states = agent.value_table().len(),
            "training finished"
        );
        Ok(results)
    }

    /// Runs greedy episodes without learning.
    pub fn evaluate<S, R, E>(
        &self,
        env: &mut E,
        agent: &LearningAgent<S, R>,
        n_episodes: u128,
    ) -> Result<(Vec<f64>, Vec<u128>), TrainError>
    where
        S: Hash + Eq + Clone,
        R: Rng,
        E: Env<S> + ?Sized,
    {
        let mut reward_history: Vec<f64> = vec![];
        let mut episode_length: Vec<u128> = vec![];
        for _episode in 0..n_episodes {
            let mut action_counter: u128 = 0;
            let mut epi_reward: f64 = 0.0;
            let mut state: S = env.reset();
            loop {
                action_counter += 1;
                let (next_state, reward, done) = env.step(agent.greedy_action(&state))?;
                epi_reward += reward;
                state = next_state;
                if done {
                    break;
                }
            }
            reward_history.push(epi_reward);
            episode_length.push(action_counter);
        }
        Ok((reward_history, episode_length))
    }

    /// Plays one greedy episode, logging every frame.
    pub fn example<S, R, E>(
        &self,
        env: &mut E,
        agent: &LearningAgent<S, R>,
    ) -> Result<f64, TrainError>
    where
        S: Hash + Eq + Clone,
        R: Rng,
        E: Env<S> + ?Sized,
    {
        let mut epi_reward: f64 = 0.0;
        let mut state: S = env.reset();
        let mut steps: u128 = 0;
        loop {
            steps += 1;
            info!("\n{}", env.render());
            let action: usize = agent.greedy_action(&state);
            let (next_state, reward, done) = env.step(action)?;
            info!(action = %env.action_label(action), reward, "step");
            epi_reward += reward;
            state = next_state;
            if done {
                info!("\n{}", env.render());
                info!(reward = epi_reward, steps = %steps, "episode finished");
                return Ok(epi_reward);
            }
        }
    }
}
