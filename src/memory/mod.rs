pub mod types;
pub mod store;
pub mod history;
pub mod recent;
pub mod stats;

pub use types::*;
pub use store::*;
pub use history::*;
pub use recent::*;
pub use stats::*;
