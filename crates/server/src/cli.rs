//! CLI commands that run without a server of their own.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use futures::StreamExt;
use portal_core::catalog::CatalogClient;
use portal_core::config::PortalConfig;
use portal_core::narration::{EvaluationOutcome, StreamDecoder};
use portal_core::search::{create_documents, HttpEmbedder, SearchService, DEFAULT_BATCH_SIZE};

/// Narrate one location through a running server, printing as it streams
pub async fn tour(config: &PortalConfig, location_id: &str, server: &str) -> anyhow::Result<()> {
    let catalog = CatalogClient::new(config.catalog_url.clone());
    let locations = catalog
        .fetch_by_ids(&[location_id.to_string()])
        .await
        .context("Failed to look up location")?;
    let Some(location) = locations.into_iter().next() else {
        bail!("No location with id {}", location_id);
    };
    let descriptor = location.descriptor();

    println!("🌀 {} ({})", descriptor.name, descriptor.kind);
    println!();

    let url = format!("{}/api/v1/narration", server.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(url)
        .json(&descriptor)
        .send()
        .await
        .context("Failed to reach the portal server")?
        .error_for_status()?;

    let mut decoder = StreamDecoder::new();
    let mut printed = 0usize;
    let mut stdout = std::io::stdout();
    let mut bytes = response.bytes_stream().boxed();

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                println!();
                bail!("Narration stream broke off: {}", e);
            }
        };
        decoder.push(&chunk);

        let narrative = decoder.narrative();
        if let Some(fresh) = unprinted(&narrative, printed) {
            print!("{}", fresh);
            stdout.flush()?;
            printed = narrative.len();
        }
    }

    let decoded = decoder.finish();
    if let Some(fresh) = unprinted(&decoded.narrative, printed) {
        print!("{}", fresh);
    }
    println!();
    println!();

    match decoded.evaluation {
        EvaluationOutcome::Available(verdict) => {
            println!("⭐ Consistency score: {}/10", verdict.score);
            println!("   {}", verdict.reasoning);
        }
        EvaluationOutcome::Unavailable => println!("⚠️  Evaluation unavailable"),
        EvaluationOutcome::Malformed(reason) => {
            println!("⚠️  Evaluation unavailable (malformed verdict: {})", reason)
        }
    }

    Ok(())
}

/// The part of `narrative` past `printed`, if that offset is still a char boundary
fn unprinted(narrative: &str, printed: usize) -> Option<&str> {
    narrative.get(printed..).filter(|rest| !rest.is_empty())
}

/// Fetch the whole catalog, embed it and save the vector index
pub async fn build_index(config: &PortalConfig) -> anyhow::Result<()> {
    let embedder = Arc::new(
        HttpEmbedder::from_env(config.embeddings.clone())
            .context("Embedding API key is required to build the index")?,
    );
    let catalog = CatalogClient::new(config.catalog_url.clone());

    tracing::info!("Fetching characters...");
    let characters = catalog.fetch_all_characters().await?;
    tracing::info!("Fetching locations...");
    let locations = catalog.fetch_all_locations().await?;

    let documents = create_documents(&characters, &locations);
    tracing::info!(
        characters = characters.len(),
        locations = locations.len(),
        "Created {} documents",
        documents.len()
    );

    let service = SearchService::build(embedder, documents, DEFAULT_BATCH_SIZE).await?;
    service
        .save(&config.index_path)
        .await
        .with_context(|| format!("Failed to save index to {}", config.index_path.display()))?;

    println!(
        "✅ Indexed {} documents into {}",
        service.len(),
        config.index_path.display()
    );
    Ok(())
}
