pub mod commands;
pub mod config;
pub mod http;

pub use commands::{run_fetch, run_listen, run_serve};
pub use config::{default_config_path, CliConfig};
pub use http::{router, run_server, HttpServerState};
