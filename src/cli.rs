//! CLI domain: parse, route and presentation only.
//! The route table calls into the library; no scoring logic lives here.

mod parse;
mod presentation;
mod route;

pub use parse::{Cli, Commands};
pub use presentation::{
    format_run_summary, format_status_json, format_status_text, format_tiles_text,
    format_validation_text,
};
pub use route::RunContext;
