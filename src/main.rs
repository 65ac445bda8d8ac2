use std::path::PathBuf;

use clap::Parser;
use phonon::sim::top::{PhononTop, PhononTopConfig};

#[derive(Parser)]
#[command(version, about)]
struct PhononArgs {
    /// Toml config with [sim], [port] and [mem] sections.
    config_path: Option<PathBuf>,

    #[arg(long)]
    timeout: Option<u64>,
    #[arg(long)]
    data_width_bits: Option<usize>,
}

pub fn main() {
    env_logger::init();
    let argv = PhononArgs::parse();

    let mut config = match &argv.config_path {
        Some(path) => PhononTopConfig::from_toml(path),
        None => PhononTopConfig::default(),
    };
    config.sim.timeout = argv.timeout.unwrap_or(config.sim.timeout);
    config.port.data_width_bits = argv.data_width_bits.unwrap_or(config.port.data_width_bits);

    let mut top = PhononTop::new(&config);
    if let Err(e) = top.run() {
        log::error!("fatal protocol error: {e}");
        std::process::exit(1);
    }
    top.port.stats().log_summary();
}
