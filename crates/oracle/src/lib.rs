mod features;
pub mod model;
pub mod oracle;
mod routes;
mod startup;
mod utils;

pub use features::*;
pub use model::*;
pub use oracle::{PredictionResult, RainOracle};
pub use routes::*;
pub use startup::*;
pub use utils::*;
