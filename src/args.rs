use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(about = "Relays channel messages to an IVR backend as spoken audio")]
pub struct Args {
    /// TOML settings file; built-in defaults are used if the default file is absent.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG.
    #[clap(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub const DEFAULT_CONFIG: &'static str = "relay.toml";

    /// Settings path and whether it was given explicitly.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(Self::DEFAULT_CONFIG), false),
        }
    }
}
