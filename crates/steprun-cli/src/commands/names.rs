//! Names command

use clap::Args;
use steprun_pod::{is_container_sidecar, is_container_step, trim_sidecar_prefix, trim_step_prefix};

use crate::Result;

#[derive(Args, Debug)]
pub struct NamesArgs {
    /// Container names to classify
    #[arg(required = true)]
    pub containers: Vec<String>,
}

pub fn run(args: NamesArgs) -> Result<()> {
    for name in &args.containers {
        println!("{}", classify(name));
    }
    Ok(())
}

/// `<container>\t<role>\t<logical name>` for one container name
pub fn classify(name: &str) -> String {
    if is_container_step(name) {
        format!("{}\tstep\t{}", name, trim_step_prefix(name))
    } else if is_container_sidecar(name) {
        format!("{}\tsidecar\t{}", name, trim_sidecar_prefix(name))
    } else {
        format!("{}\tother\t{}", name, name)
    }
}
