mod schedule;

pub use schedule::{HyperParameters, Phase};

use rand::distributions::{Distribution, Uniform};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::utils::argmax;
use crate::value_table::ValueTable;

/// Construction inputs of a [`LearningAgent`].
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub num_episodes: u128,
    pub n_actions: usize,
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon: f64,
}

impl AgentConfig {
    pub fn new(num_episodes: u128, n_actions: usize) -> Self {
        let defaults: HyperParameters = HyperParameters::default();
        Self {
            num_episodes,
            n_actions,
            learning_rate: defaults.learning_rate,
            discount_factor: defaults.discount_factor,
            epsilon: defaults.epsilon,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_discount_factor(mut self, discount_factor: f64) -> Self {
        self.discount_factor = discount_factor;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    fn validate(&self) -> Result<(), AgentError> {
        if self.num_episodes == 0 {
            return Err(AgentError::InvalidConfiguration(
                "the number of episodes must be positive".to_string(),
            ));
        }
        if self.n_actions == 0 {
            return Err(AgentError::InvalidConfiguration(
                "the action space must have at least one action".to_string(),
            ));
        }
        Ok(())
    }
}

/// Epsilon-greedy Q-learning agent over a [`ValueTable`].
///
/// Hyperparameters are annealed every time an episode ends, following
/// [`Phase`].
pub struct LearningAgent<S: Hash + Eq + Clone, R: Rng = SmallRng> {
    table: ValueTable<S>,
    params: HyperParameters,
    /// Phase whose rule produced `params`.
    phase: Phase,
    episode: u128,
    num_episodes: u128,
    exploration_decider: Uniform<f64>,
    rand_action_selecter: Uniform<usize>,
    rng: R,
    negative_epsilon_reported: bool,
}

impl<S: Hash + Eq + Clone> LearningAgent<S, SmallRng> {
    pub fn new(num_episodes: u128, n_actions: usize, seed: u64) -> Result<Self, AgentError> {
        Self::with_rng(
            AgentConfig::new(num_episodes, n_actions),
            SmallRng::seed_from_u64(seed),
        )
    }
}

impl<S: Hash + Eq + Clone, R: Rng> LearningAgent<S, R> {
    pub fn with_rng(config: AgentConfig, rng: R) -> Result<Self, AgentError> {
        let table: ValueTable<S> = ValueTable::new(config.n_actions)?;
        Self::with_table(config, table, rng)
    }

    /// Starts from an existing table, e.g. one restored from a checkpoint.
    pub fn with_table(
        config: AgentConfig,
        table: ValueTable<S>,
        rng: R,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        if table.n_actions() != config.n_actions {
            return Err(AgentError::InvalidConfiguration(format!(
                "table has {} actions but the agent was configured with {}",
                table.n_actions(),
                config.n_actions
            )));
        }
        Ok(Self {
            table,
            params: HyperParameters {
                learning_rate: config.learning_rate,
                discount_factor: config.discount_factor,
                epsilon: config.epsilon,
            },
            phase: Phase::First,
            episode: 1,
            num_episodes: config.num_episodes,
            exploration_decider: Uniform::from(0.0..1.0),
            rand_action_selecter: Uniform::from(0..config.n_actions),
            rng,
            negative_epsilon_reported: false,
        })
    }

    /// Exploits when a uniform draw exceeds epsilon, otherwise picks any
    /// action uniformly.
    pub fn select_action(&mut self, state: &S) -> usize {
        if self.exploration_decider.sample(&mut self.rng) > self.params.epsilon {
            self.greedy_action(state)
        } else {
            self.rand_action_selecter.sample(&mut self.rng)
        }
    }

    /// Best known action, lowest index on ties. Unseen states give action 0.
    pub fn greedy_action(&self, state: &S) -> usize {
        match self.table.peek(state) {
            Some(values) => argmax(values.iter()),
            None => 0,
        }
    }

    /// Applies one Q-learning update and returns the temporal difference.
    ///
    /// When `done` is set `next_state` is not looked at and the episode
    /// counter advances, which re-anneals the hyperparameters.
    pub fn step(
        &mut self,
        state: &S,
        action: usize,
        reward: f64,
        next_state: &S,
        done: bool,
    ) -> Result<f64, AgentError> {
        let old_q: f64 = self.table.get_value(state, action)?;
        let next_max: f64 = if done {
            0.0
        } else {
            self.table.max_value(next_state)
        };
        let target: f64 = reward + self.params.discount_factor * next_max;
        let temporal_difference: f64 = target - old_q;
        self.table.set_value(
            state,
            action,
            old_q + self.params.learning_rate * temporal_difference,
        )?;
        if done {
            self.update_hyper_parameters();
        }
        Ok(temporal_difference)
    }

    fn update_hyper_parameters(&mut self) {
        self.episode += 1;
        let phase: Phase = Phase::for_episode(self.episode, self.num_episodes);
        if phase != self.phase {
            debug!(episode = %self.episode, ?phase, "entering new training phase");
            self.phase = phase;
        }
        phase.apply(self.episode, self.num_episodes, &mut self.params);
        if self.params.epsilon < 0.0 && !self.negative_epsilon_reported {
            warn!(
                episode = %self.episode,
                epsilon = self.params.epsilon,
                "epsilon fell below zero, exploration is disabled until the next phase"
            );
            self.negative_epsilon_reported = true;
        }
    }

    /// Phase of the parameters currently in effect. Construction counts as
    /// the first phase whatever the horizon.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn hyper_parameters(&self) -> HyperParameters {
        self.params
    }

    pub fn epsilon(&self) -> f64 {
        self.params.epsilon
    }

    pub fn learning_rate(&self) -> f64 {
        self.params.learning_rate
    }

    pub fn discount_factor(&self) -> f64 {
        self.params.discount_factor
    }

    pub fn episode(&self) -> u128 {
        self.episode
    }

    pub fn num_episodes(&self) -> u128 {
        self.num_episodes
    }

    pub fn n_actions(&self) -> usize {
        self.table.n_actions()
    }

    pub fn value_table(&self) -> &ValueTable<S> {
        &self.table
    }

    pub fn value_table_mut(&mut self) -> &mut ValueTable<S> {
        &mut self.table
    }
}

impl<S: Hash + Eq + Clone, R: Rng> Debug for LearningAgent<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearningAgent")
            .field("params", &self.params)
            .field("phase", &self.phase)
            .field("episode", &self.episode)
            .field("num_episodes", &self.num_episodes)
            .field("n_actions", &self.table.n_actions())
            .field("states", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn agent_with(config: AgentConfig) -> LearningAgent<&'static str> {
        LearningAgent::with_rng(config, SmallRng::seed_from_u64(7)).unwrap()
    }

    fn finish_episodes(agent: &mut LearningAgent<&'static str>, count: usize) {
        for _ in 0..count {
            agent.step(&"A", 0, 0.0, &"B", true).unwrap();
        }
    }

    #[test]
    fn defaults_match_construction_contract() {
        let agent: LearningAgent<&str> = LearningAgent::new(10, 6, 0).unwrap();
        assert_eq!(agent.learning_rate(), 0.1);
        assert_eq!(agent.discount_factor(), 1.0);
        assert_eq!(agent.epsilon(), 1.0);
        assert_eq!(agent.episode(), 1);
        assert_eq!(agent.phase(), Phase::First);
        assert_eq!(agent.n_actions(), 6);
    }

    #[test]
    fn single_episode_horizon_starts_in_first_phase() {
        let mut agent: LearningAgent<u32> = LearningAgent::new(1, 2, 1).unwrap();
        assert_eq!(agent.phase(), Phase::First);
        assert_eq!(agent.epsilon(), 1.0);
        agent.step(&0, 0, -1.0, &1, true).unwrap();
        assert_eq!(agent.phase(), Phase::Third);
        assert_eq!(agent.epsilon(), 0.0);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(matches!(
            LearningAgent::<u32>::new(0, 6, 0),
            Err(AgentError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            LearningAgent::<u32>::new(10, 0, 0),
            Err(AgentError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn table_with_other_action_count_is_rejected() {
        let table: ValueTable<u32> = ValueTable::new(4).unwrap();
        let result = LearningAgent::with_table(
            AgentConfig::new(10, 6),
            table,
            SmallRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(AgentError::InvalidConfiguration(_))));
    }

    #[test]
    fn first_update_on_fresh_table() {
        let mut agent = agent_with(AgentConfig::new(10, 2));
        let td = agent.step(&"A", 0, 1.0, &"B", false).unwrap();
        assert!((td - 1.0).abs() < TOLERANCE);
        let table = agent.value_table_mut();
        assert!((table.get_value(&"A", 0).unwrap() - 0.1).abs() < TOLERANCE);
        assert_eq!(table.get_value(&"A", 1).unwrap(), 0.0);
    }

    #[test]
    fn update_uses_next_state_maximum() {
        let mut agent = agent_with(AgentConfig::new(10, 2));
        let table = agent.value_table_mut();
        table.set_value(&"A", 1, 2.0).unwrap();
        table.set_value(&"B", 0, 1.0).unwrap();
        table.set_value(&"B", 1, 3.0).unwrap();

        agent.step(&"A", 1, 0.5, &"B", false).unwrap();
        // 2.0 + 0.1 * (0.5 + 1.0 * 3.0 - 2.0)
        let q = agent.value_table_mut().get_value(&"A", 1).unwrap();
        assert!((q - 2.15).abs() < TOLERANCE);
        assert_eq!(agent.episode(), 1);
    }

    #[test]
    fn terminal_update_ignores_next_state() {
        let mut agent = agent_with(AgentConfig::new(10, 2));
        let table = agent.value_table_mut();
        table.set_value(&"A", 1, 2.0).unwrap();
        table.set_value(&"B", 0, 100.0).unwrap();

        agent.step(&"A", 1, 0.5, &"B", true).unwrap();
        // 2.0 + 0.1 * (0.5 - 2.0)
        let q = agent.value_table_mut().get_value(&"A", 1).unwrap();
        assert!((q - 1.85).abs() < TOLERANCE);
        assert_eq!(agent.episode(), 2);
    }

    #[test]
    fn terminal_update_does_not_touch_next_state() {
        let mut agent = agent_with(AgentConfig::new(10, 2));
        agent.step(&"A", 0, 1.0, &"never", true).unwrap();
        assert!(agent.value_table().peek(&"never").is_none());
    }

    #[test]
    fn invalid_action_leaves_agent_untouched() {
        let mut agent = agent_with(AgentConfig::new(10, 2));
        let result = agent.step(&"A", 2, 1.0, &"B", true);
        assert_eq!(
            result,
            Err(AgentError::InvalidAction {
                action: 2,
                n_actions: 2
            })
        );
        assert!(agent.value_table().is_empty());
        assert_eq!(agent.episode(), 1);
        assert_eq!(agent.hyper_parameters(), HyperParameters::default());
    }

    #[test]
    fn zero_epsilon_always_exploits_first_maximum() {
        let mut agent = agent_with(AgentConfig::new(10, 4).with_epsilon(0.0));
        let table = agent.value_table_mut();
        table.set_value(&"S", 1, 5.0).unwrap();
        table.set_value(&"S", 3, 5.0).unwrap();
        table.set_value(&"S", 2, -1.0).unwrap();
        for _ in 0..1000 {
            assert_eq!(agent.select_action(&"S"), 1);
        }
    }

    #[test]
    fn selection_does_not_grow_the_table() {
        let mut agent = agent_with(AgentConfig::new(10, 4));
        for _ in 0..100 {
            let action = agent.select_action(&"unseen");
            assert!(action < 4);
        }
        assert!(agent.value_table().is_empty());
    }

    #[test]
    fn full_epsilon_is_uniform() {
        let n_actions: usize = 6;
        let trials: usize = 60_000;
        let mut agent = agent_with(AgentConfig::new(10, n_actions));
        agent.value_table_mut().set_value(&"S", 2, 10.0).unwrap();

        let mut counts: Vec<usize> = vec![0; n_actions];
        for _ in 0..trials {
            counts[agent.select_action(&"S")] += 1;
        }
        let expected: f64 = trials as f64 / n_actions as f64;
        let chi_square: f64 = counts
            .iter()
            .map(|c| (*c as f64 - expected).powi(2) / expected)
            .sum();
        // 5 degrees of freedom, p = 0.001
        assert!(chi_square < 20.515, "chi square {} for {:?}", chi_square, counts);
    }

    #[test]
    fn annealing_phase_boundaries() {
        let mut agent = agent_with(AgentConfig::new(100, 2));

        finish_episodes(&mut agent, 49);
        assert_eq!(agent.episode(), 50);
        assert_eq!(agent.phase(), Phase::First);
        assert_eq!(agent.discount_factor(), 0.9);
        assert_eq!(agent.learning_rate(), 0.05);

        finish_episodes(&mut agent, 1);
        assert_eq!(agent.episode(), 51);
        assert_eq!(agent.phase(), Phase::Second);
        assert_eq!(agent.discount_factor(), 0.8);
        assert_eq!(agent.learning_rate(), 0.01);
        assert!((agent.epsilon() - 0.5).abs() < TOLERANCE);

        finish_episodes(&mut agent, 29);
        assert_eq!(agent.episode(), 80);
        assert_eq!(agent.phase(), Phase::Second);
        assert!((agent.epsilon() - 0.5 / 30.0).abs() < TOLERANCE);

        finish_episodes(&mut agent, 1);
        assert_eq!(agent.episode(), 81);
        let absorbed = HyperParameters {
            learning_rate: 0.2,
            discount_factor: 0.9,
            epsilon: 0.0,
        };
        assert_eq!(agent.hyper_parameters(), absorbed);

        finish_episodes(&mut agent, 200);
        assert_eq!(agent.phase(), Phase::Third);
        assert_eq!(agent.hyper_parameters(), absorbed);
    }

    #[test]
    fn first_phase_epsilon_goes_negative_and_is_kept() {
        // 1 - 1/2 - 1/3 - 1/4 = -1/12
        let mut agent = agent_with(AgentConfig::new(100, 3));
        finish_episodes(&mut agent, 1);
        assert!((agent.epsilon() - 0.5).abs() < TOLERANCE);
        finish_episodes(&mut agent, 2);
        assert!((agent.epsilon() + 1.0 / 12.0).abs() < TOLERANCE);

        agent.value_table_mut().set_value(&"S", 2, 1.0).unwrap();
        for _ in 0..500 {
            assert_eq!(agent.select_action(&"S"), 2);
        }
    }

    #[test]
    fn overrides_are_used_until_first_episode_ends() {
        let mut agent = agent_with(
            AgentConfig::new(10, 2)
                .with_learning_rate(0.5)
                .with_discount_factor(0.5),
        );
        agent.value_table_mut().set_value(&"B", 1, 4.0).unwrap();
        agent.step(&"A", 0, 1.0, &"B", false).unwrap();
        // 0 + 0.5 * (1.0 + 0.5 * 4.0)
        let q = agent.value_table_mut().get_value(&"A", 0).unwrap();
        assert!((q - 1.5).abs() < TOLERANCE);
    }
}
