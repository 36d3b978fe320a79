//! Command implementations. Each returns the JSON document to print.

use anyhow::{bail, Context};
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;
use voyara_cache::{CacheExt, CacheInterface, CacheService, CacheTag, WarmUpEntry};

pub async fn stats(cache: &CacheService) -> Value {
    json!({
        "backend": cache.backend(),
        "enabled": cache.is_enabled(),
        "healthy": cache.health_check().await,
        "namespace": cache.namespace(),
        "default_ttl_secs": cache.default_ttl().as_secs(),
        "stats": cache.get_stats(),
    })
}

pub async fn ping(cache: &CacheService) -> anyhow::Result<Value> {
    if !cache.health_check().await {
        bail!("cache store '{}' is not reachable", cache.backend());
    }
    Ok(json!({ "backend": cache.backend(), "healthy": true }))
}

pub async fn invalidate(cache: &CacheService, tags: &[String]) -> anyhow::Result<Value> {
    ensure_enabled(cache)?;

    let tags: Vec<CacheTag> = tags.iter().map(|t| CacheTag::from(t.as_str())).collect();
    let removed = cache.invalidate_by_tags(&tags).await;
    info!("Invalidated {} entries", removed);

    Ok(json!({
        "tags": tags,
        "removed": removed,
    }))
}

pub async fn clear(cache: &CacheService, confirmed: bool) -> anyhow::Result<Value> {
    if !confirmed {
        bail!(
            "refusing to delete every key under '{}' without --yes",
            cache.namespace()
        );
    }
    ensure_enabled(cache)?;

    if !cache.clear_all().await {
        bail!("failed to clear namespace '{}'", cache.namespace());
    }
    Ok(json!({ "namespace": cache.namespace(), "cleared": true }))
}

/// Reads a warm-up file: a JSON array of entries.
pub fn load_entries(path: &Path) -> anyhow::Result<Vec<WarmUpEntry<Value>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let entries = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of cache entries", path.display()))?;
    Ok(entries)
}

pub async fn warm_up(cache: &CacheService, entries: Vec<WarmUpEntry<Value>>) -> anyhow::Result<Value> {
    ensure_enabled(cache)?;

    let report = cache.warm_up(entries).await;
    if report.total > 0 && report.succeeded == 0 {
        bail!("none of the {} entries could be stored", report.total);
    }
    Ok(serde_json::to_value(report)?)
}

fn ensure_enabled(cache: &CacheService) -> anyhow::Result<()> {
    if !cache.is_enabled() {
        bail!("caching is disabled in the current configuration");
    }
    Ok(())
}
