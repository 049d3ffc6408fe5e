//! Minimal end-to-end demo: supervise a shell script as the "emulator",
//! print its output, and stop after a few seconds.
//!
//! ```sh
//! cargo run --example supervise
//! ```

use std::time::Duration;

use emuvisor::{Config, LaunchConfig, LogWriter, Orchestrator, StartOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config {
        grace: Duration::from_secs(5),
        launch: LaunchConfig {
            program: "sh".to_string(),
            start_args: vec![
                "-c".to_string(),
                "while true; do echo tick; sleep 1; done".to_string(),
            ],
            ..LaunchConfig::default()
        },
        ..Config::default()
    };

    let dir = std::env::temp_dir().join("emuvisor-demo");
    let orchestrator = Orchestrator::new(cfg, &dir);
    orchestrator.init().await?;

    let printer = LogWriter::attach(orchestrator.bus());

    // auto_snapshot stays off: the default export command (the Firebase
    // CLI) is not expected to be installed where this demo runs.
    orchestrator
        .start(StartOptions {
            auto_snapshot: false,
            ..StartOptions::default()
        })
        .await?;

    tokio::time::sleep(Duration::from_secs(3)).await;

    orchestrator.stop().await?;
    printer.abort();
    Ok(())
}
