use serde::Serialize;

/// Learning rate, discount factor and exploration rate in effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HyperParameters {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon: f64,
}

impl Default for HyperParameters {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 1.0,
            epsilon: 1.0,
        }
    }
}

/// Stage of training, derived only from the episode counter.
///
/// `First` covers episodes up to half the horizon, `Second` up to 80% of it,
/// `Third` the rest. Nothing leads back to an earlier phase since the counter
/// only grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    First,
    Second,
    Third,
}

impl Phase {
    pub fn for_episode(episode: u128, num_episodes: u128) -> Self {
        let n: f64 = episode as f64;
        let t: f64 = num_episodes as f64;
        if n <= 0.5 * t {
            Phase::First
        } else if n <= 0.8 * t {
            Phase::Second
        } else {
            Phase::Third
        }
    }

    /// Rewrites `params` for `episode`.
    ///
    /// In the first phase epsilon is decreased by `1/n` from whatever value it
    /// currently holds, so it can drop below zero well before the phase ends.
    pub fn apply(self, episode: u128, num_episodes: u128, params: &mut HyperParameters) {
        let n: f64 = episode as f64;
        let t: f64 = num_episodes as f64;
        match self {
            Phase::First => {
                params.epsilon -= 1.0 / n;
                params.discount_factor = 0.9;
                params.learning_rate = 0.05;
            }
            Phase::Second => {
                params.epsilon = 0.5 / (n - 0.5 * t);
                params.discount_factor = 0.8;
                params.learning_rate = 0.01;
            }
            Phase::Third => {
                params.epsilon = 0.0;
                params.discount_factor = 0.9;
                params.learning_rate = 0.2;
            }
        }
    }
}
