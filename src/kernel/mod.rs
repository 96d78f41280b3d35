pub mod engine;
pub mod scheduler;
pub mod state;
