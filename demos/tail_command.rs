//! Capture a command's output into a live log stream and tail it
//!
//! Run with: cargo run --example tail_command [COMMAND [ARGS...]]
//!
//! Examples:
//!   cargo run --example tail_command                     # runs `df -h`
//!   cargo run --example tail_command ls -la /tmp
//!   RUST_LOG=livelog=debug cargo run --example tail_command
//!
//! Standard output and standard error both land in the same stream.
//! A live subscriber prints lines as they are captured. Once the command
//! exits, a late subscriber attaches and receives the retained history.

use std::process::Stdio;
use std::sync::Arc;

use livelog::{CancellationToken, LineCapture, LogStreamRegistry, StreamId};
use tokio::process::Command;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (program, rest) = match args.next() {
        Some(program) => (program, args.collect::<Vec<_>>()),
        None => ("df".to_string(), vec!["-h".to_string()]),
    };

    let registry = Arc::new(LogStreamRegistry::new());
    let id = StreamId(1);
    registry.create(id).await;

    let mut live = registry.tail(id, CancellationToken::new()).await;
    let printer = tokio::spawn(async move {
        while let Some(line) = live.recv().await {
            println!("{:>5} {} {}", line.number, line.timestamp, line.message);
        }
    });

    let mut child = Command::new(&program)
        .args(&rest)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdout = child.stdout.take().ok_or("stdout not captured")?;
    let stderr = child.stderr.take().ok_or("stderr not captured")?;

    let lines = LineCapture::new(Arc::clone(&registry), id)
        .run_merged(stdout, stderr)
        .await?;
    let status = child.wait().await?;
    tracing::info!(command = %program, lines = lines, %status, "Command finished");

    let mut late = registry.tail(id, CancellationToken::new()).await;
    registry.delete(id).await?;

    let mut replayed = 0;
    while late.recv().await.is_some() {
        replayed += 1;
    }
    printer.await?;

    println!("late subscriber replayed {} lines", replayed);
    Ok(())
}
