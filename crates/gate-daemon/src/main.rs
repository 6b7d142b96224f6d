use anyhow::Result;

use gate_daemon::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = telemetry::init("gate-daemon")?;
    gate_daemon::server::run().await
}
