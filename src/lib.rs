pub mod agent;
pub mod env;
pub mod error;
pub mod trainer;
pub mod utils;
pub mod value_table;

pub use agent::{AgentConfig, LearningAgent};
pub use error::AgentError;
pub use value_table::ValueTable;
