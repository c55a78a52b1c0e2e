// =============================================================================
// Coin pool — ranked candidate symbols plus the OI-top overlay
// =============================================================================
//
// The engine does not pick symbols itself; it consumes a ranked list from an
// external coin-pool service (an "ai500"-style universe) and overlays it with
// the venue's own open-interest leaderboard. Both calls are best-effort: a
// failure here degrades the candidate universe for one cycle rather than
// aborting it.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::types::CandidateCoin;

/// Per-symbol OI-leaderboard entry.
#[derive(Debug, Clone)]
pub struct OiOverlayEntry {
    pub symbol: String,
    pub oi_change_pct: f64,
    pub rank: u32,
}

#[async_trait]
pub trait CoinPoolProvider: Send + Sync {
    async fn get_candidates(&self) -> Result<Vec<CandidateCoin>>;
    async fn get_oi_top(&self) -> Result<Vec<OiOverlayEntry>>;
}

/// HTTP-backed coin pool client with bounded retries for the OI-top overlay,
/// grounded on the teacher's `OpenInterestTracker::fetch` request shape.
pub struct HttpCoinPool {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCoinPool {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("failed to build reqwest client for HttpCoinPool"),
            base_url: base_url.into(),
        }
    }

    async fn fetch_oi_top_once(&self) -> Result<Vec<OiOverlayEntry>> {
        let url = format!("{}/oi-top", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET oi-top overlay")?;
        let body: serde_json::Value = resp.json().await.context("parse oi-top response")?;
        let entries = body
            .as_array()
            .context("oi-top response is not a JSON array")?
            .iter()
            .enumerate()
            .filter_map(|(i, v)| {
                Some(OiOverlayEntry {
                    symbol: v.get("symbol")?.as_str()?.to_string(),
                    oi_change_pct: v.get("oi_change_pct").and_then(|x| x.as_f64()).unwrap_or(0.0),
                    rank: i as u32 + 1,
                })
            })
            .collect();
        Ok(entries)
    }
}

#[async_trait]
impl CoinPoolProvider for HttpCoinPool {
    #[instrument(skip(self), name = "coin_pool_candidates")]
    async fn get_candidates(&self) -> Result<Vec<CandidateCoin>> {
        let url = format!("{}/candidates", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET coin pool candidates")?;
        let body: serde_json::Value = resp.json().await.context("parse candidates response")?;
        let candidates = body
            .as_array()
            .context("candidates response is not a JSON array")?
            .iter()
            .filter_map(|v| {
                Some(CandidateCoin {
                    symbol: v.get("symbol")?.as_str()?.to_string(),
                    tags: vec!["ai500".to_string()],
                })
            })
            .collect();
        Ok(candidates)
    }

    #[instrument(skip(self), name = "coin_pool_oi_top")]
    async fn get_oi_top(&self) -> Result<Vec<OiOverlayEntry>> {
        // Up to 3 attempts with a fixed back-off (§7): this overlay is
        // best-effort and an empty result is an acceptable fallback.
        let mut last_err = None;
        for attempt in 1..=3 {
            match self.fetch_oi_top_once().await {
                Ok(entries) => return Ok(entries),
                Err(e) => {
                    warn!(attempt, error = %e, "oi-top overlay fetch failed, retrying");
                    last_err = Some(e);
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
            }
        }
        Err(last_err.unwrap())
    }
}

/// Merge the coin-pool candidate list with the OI-top overlay, tagging any
/// symbol present in both.
pub fn merge_oi_overlay(
    mut candidates: Vec<CandidateCoin>,
    oi_top: &[OiOverlayEntry],
) -> Vec<CandidateCoin> {
    for entry in oi_top {
        if let Some(c) = candidates.iter_mut().find(|c| c.symbol == entry.symbol) {
            if !c.has_tag("oi_top") {
                c.tags.push("oi_top".to_string());
            }
        } else {
            candidates.push(CandidateCoin {
                symbol: entry.symbol.clone(),
                tags: vec!["oi_top".to_string()],
            });
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overlay_tags_existing_candidate() {
        let candidates = vec![CandidateCoin {
            symbol: "BTCUSDT".to_string(),
            tags: vec!["ai500".to_string()],
        }];
        let overlay = vec![OiOverlayEntry {
            symbol: "BTCUSDT".to_string(),
            oi_change_pct: 5.0,
            rank: 1,
        }];
        let merged = merge_oi_overlay(candidates, &overlay);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].has_tag("ai500"));
        assert!(merged[0].has_tag("oi_top"));
    }

    #[test]
    fn merge_overlay_adds_new_candidate() {
        let candidates = vec![];
        let overlay = vec![OiOverlayEntry {
            symbol: "SOLUSDT".to_string(),
            oi_change_pct: 12.0,
            rank: 1,
        }];
        let merged = merge_oi_overlay(candidates, &overlay);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].symbol, "SOLUSDT");
        assert!(merged[0].has_tag("oi_top"));
    }
}
