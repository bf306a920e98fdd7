//! steprun CLI
//!
//! Compiles TaskRuns into Pods offline and inspects container names.

use clap::Parser;

use steprun_cli::{Cli, Result};
use steprun_common::telemetry::{init_logging, LogFormat, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(TelemetryConfig {
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
        default_filter: None,
    })?;

    cli.run().await
}
