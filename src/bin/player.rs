//! Stream Player Application
//!
//! Connects to an MPEG stream server and plays the stream gaplessly.
//!
//! Usage: `player [ADDRESS] [--config PATH]`

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gapless_stream::{
    config::{AppConfig, SinkKind},
    pipeline::{play, PipelineReport, RunFlag},
    playback::{AudioSink, ClockSink, SchedulerStats},
    stream::{connect_tcp, TcpChunkSource},
};

#[cfg(feature = "minimp3")]
type Decoder = gapless_stream::codec::Minimp3Decoder;
#[cfg(not(feature = "minimp3"))]
type Decoder = gapless_stream::codec::SilenceDecoder;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting stream player");

    // Parse arguments
    let mut address = None;
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => anyhow::bail!("--config needs a path"),
            },
            _ => address = Some(arg),
        }
    }

    let mut config = AppConfig::load_or_default(config_path.as_deref())?;
    if let Some(address) = address {
        config.source.address = address;
    }
    config.validate()?;

    let run = RunFlag::new();

    // Stop on Ctrl+C
    {
        let run = run.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down...");
                run.cancel();
            }
        });
    }

    let source = connect_tcp(&config.source).await?;
    let decoder = Arc::new(Decoder::default());

    let (report, stats) = match config.playback.sink {
        SinkKind::Clock => run_with(source, decoder, ClockSink::new(), &config, run).await?,
        #[cfg(feature = "cpal")]
        SinkKind::Device => {
            let sink = gapless_stream::playback::CpalSink::new(None);
            run_with(source, decoder, sink, &config, run).await?
        }
        #[cfg(not(feature = "cpal"))]
        SinkKind::Device => {
            tracing::warn!("Built without the cpal feature, falling back to the clock sink");
            run_with(source, decoder, ClockSink::new(), &config, run).await?
        }
    };

    tracing::info!(
        "Read {} bytes in {} chunks: {} frames, {} bytes skipped, {} resyncs",
        report.bytes_read,
        report.chunks_read,
        report.reassembler.frames_emitted,
        report.reassembler.bytes_skipped,
        report.reassembler.resync_events
    );
    tracing::info!(
        "Decoded {} blocks ({} failed, {} frames rejected), played {} segments ({} chained, {} underruns)",
        report.batch.blocks_decoded,
        report.batch.decode_failures,
        report.batch.frames_rejected,
        stats.started,
        stats.chained,
        stats.underruns
    );

    Ok(())
}

async fn run_with<S: AudioSink + 'static>(
    source: TcpChunkSource,
    decoder: Arc<Decoder>,
    sink: S,
    config: &AppConfig,
    run: Arc<RunFlag>,
) -> gapless_stream::Result<(PipelineReport, SchedulerStats)> {
    play(source, decoder, sink, config, run).await
}
