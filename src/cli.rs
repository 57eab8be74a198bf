//! CLI domain: parse, route, output and presentation only.
//! Domain work happens in the contract, replica and store modules.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{StateView, SummaryView};
pub use route::RunContext;
