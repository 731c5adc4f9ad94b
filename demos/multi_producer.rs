//! # Example: many producers, one sink
//!
//! Spawns the sink, lets a few async tasks and one OS thread log concurrently,
//! writes a short transcript rotated every 4 entries, then shuts down.
//!
//! ## Run
//! ```bash
//! cargo build --bin logvisor-sink
//! cargo run --example multi_producer
//! ```
//!
//! Output lands in `demo-out/`: `app.log` plus `transcripts/chat_*.log`.

use std::path::PathBuf;
use std::time::Duration;

use logvisor::{
    FileLogConfig, Level, RotationPolicy, SinkConfig, Supervisor, SupervisorConfig,
    TranscriptConfig,
};
use serde_json::json;

/// `target/<profile>/logvisor-sink`, next to the `examples/` directory holding this binary.
fn sink_program() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| Some(exe.parent()?.parent()?.join("logvisor-sink")))
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from("logvisor-sink"))
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = SupervisorConfig {
        sink: SinkConfig {
            console_level: Level::INFO,
            file: Some(FileLogConfig::new("demo-out/app.log", Level::DEBUG)),
            transcript: Some(
                TranscriptConfig::in_dir("demo-out/transcripts")
                    .with_name("chat")
                    .with_policy(RotationPolicy::parse("lines", 4, "00:00:00")?),
            ),
            ..SinkConfig::default()
        },
        ..SupervisorConfig::with_program(sink_program())
    };

    let mut sup = Supervisor::new(cfg)?;
    sup.start()?;

    let mut workers = Vec::new();
    for id in 0..3 {
        let log = sup.handle(&format!("worker-{id}"));
        workers.push(tokio::spawn(async move {
            for step in 0..5 {
                log.debug(format!("step {step}")).await?;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            log.info("done").await
        }));
    }

    let thread_log = sup.handle("thread");
    let thread =
        std::thread::spawn(move || thread_log.record_blocking(Level(25), "hello from a thread"));

    let bot = sup.handle("bot");
    for turn in 0..10 {
        bot.transcribe(&json!({ "turn": turn, "user": "ping", "bot": "pong" }))
            .await?;
    }

    for worker in workers {
        worker.await??;
    }
    thread.join().map_err(|_| "producer thread panicked")??;

    sup.set_level(Level::WARNING).await?;
    sup.handle("main").info("filtered out").await?;
    sup.handle("main").warning("still visible").await?;

    sup.shutdown().await?;
    println!("sink exited cleanly, see demo-out/");
    Ok(())
}
