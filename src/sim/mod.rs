pub mod config;
pub mod top;

pub use config::{Config, SimConfig};
pub use top::{PhononTop, PhononTopConfig};
