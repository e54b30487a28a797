pub mod cli;
pub mod document;
pub mod langflow;
pub mod load_config;
pub mod supabase;
pub mod watch;

pub use cli::{run, Cli, Commands};
