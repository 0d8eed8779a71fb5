//! Durable operations demo
//!
//! Submits a search to Brave and a video job to Runway, then drives both
//! to completion. Operations are checkpointed in memory; a real deployment
//! plugs in its own `CheckpointStore` and calls `resume_all` on startup.
//!
//! Run with: cargo run --example durable_operations -- longhaul.yaml
//!
//! The config file needs a `brave` and a `runway` provider, for example:
//!
//! ```yaml
//! version: "0.1"
//! providers:
//!   - { name: search, type: brave, api_key: "${BRAVE_API_KEY}" }
//!   - { name: video, type: runway, api_key: "${RUNWAY_API_KEY}" }
//! ```

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use longhaul_core::config;
use longhaul_core::operation::{MemoryCheckpointStore, OperationEngine, OperationId, Phase};
use longhaul_core::protocol::{AspectRatio, SearchRequest, UnifiedResult, VideoRequest};
use longhaul_core::providers::ProviderKind;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "longhaul.yaml".to_string());
    let config = config::load(&path).with_context(|| format!("loading {}", path))?;
    let engine = OperationEngine::from_config(&config, Arc::new(MemoryCheckpointStore::new()))?;

    println!("Search: streaming pages from Brave");
    let search = engine
        .submit(
            OperationId::new_v4(),
            ProviderKind::Brave,
            SearchRequest::new("durable execution engines").with_max_results(10),
        )
        .await?;
    while let Some(chunk) = engine.stream_next(&search).await? {
        println!("  page {} ({} hits)", chunk.sequence, chunk.len());
        for hit in &chunk.page.hits {
            println!("    {} <{}>", hit.title, hit.url);
        }
        if chunk.sequence >= 1 {
            // two pages are enough for a demo
            engine.cancel(&search).await?;
        }
    }

    println!("Video: generating a clip on Runway");
    let video = engine
        .submit(
            OperationId::new_v4(),
            ProviderKind::Runway,
            VideoRequest::from_image_url("https://upload.wikimedia.org/wikipedia/commons/3/3f/Fronalpstock_big.jpg")
                .with_prompt("slow aerial push over the mountain ridge")
                .with_aspect_ratio(AspectRatio::Landscape)
                .with_duration(5),
        )
        .await?;
    let status = engine.run(&video).await?;

    match (status.phase, status.result) {
        (Phase::Succeeded, Some(UnifiedResult::Video(output))) => {
            for clip in output.videos {
                println!("  clip: {}", clip.uri.unwrap_or_else(|| "<inline>".to_string()));
            }
        }
        (phase, _) => {
            if let Some(error) = status.error {
                bail!("video operation ended {}: {}", phase, error);
            }
            bail!("video operation ended {}", phase);
        }
    }

    engine.acknowledge(&video).await?;
    Ok(())
}
