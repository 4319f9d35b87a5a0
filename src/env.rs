mod taxi;

pub use taxi::TaxiEnv;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("the environment must be reset before stepping")]
    EnvNotReady,
    #[error("action {0} is not available in this environment")]
    InvalidAction(usize),
}

/// Discrete-action environment driven one step at a time.
pub trait Env<T> {
    fn reset(&mut self) -> T;
    /// Returns `(next_obs, reward, done)`.
    fn step(&mut self, action: usize) -> Result<(T, f64, bool), EnvError>;
    fn render(&self) -> String;
    fn n_actions(&self) -> usize;

    fn action_label(&self, action: usize) -> String {
        action.to_string()
    }
}
