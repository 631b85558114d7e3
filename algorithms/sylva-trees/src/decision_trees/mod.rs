mod algorithm;
mod condition;
mod data;
mod hyperparams;
mod iter;
mod node;
mod nominal;
mod schema;
mod split;
mod statistics;
mod stats;

pub use algorithm::*;
pub use condition::*;
pub use data::*;
pub use hyperparams::*;
pub use iter::*;
pub use node::*;
pub use schema::*;
pub use split::{Direction, Split, SplitKind};
pub use statistics::*;
pub use stats::NodeStats;
