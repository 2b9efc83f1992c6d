//! Tip floor oracle: turns landed-tip percentiles into a tip amount

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::client::EngineClient;

/// No derived tip ever goes below this (0.00001 SOL)
pub const MIN_TIP_LAMPORTS: u64 = 10_000;

/// Tip priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TipPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TipPriority {
    /// Amount used when no tip floor data is available
    pub fn default_lamports(&self) -> u64 {
        match self {
            TipPriority::Low => 10_000,
            TipPriority::Medium => 50_000,
            TipPriority::High => 100_000,
            TipPriority::Urgent => 500_000,
        }
    }
}

impl fmt::Display for TipPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TipPriority::Low => "low",
            TipPriority::Medium => "medium",
            TipPriority::High => "high",
            TipPriority::Urgent => "urgent",
        };
        f.write_str(name)
    }
}

impl FromStr for TipPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TipPriority::Low),
            "medium" => Ok(TipPriority::Medium),
            "high" => Ok(TipPriority::High),
            "urgent" => Ok(TipPriority::Urgent),
            other => Err(format!(
                "unknown tip priority '{}', expected low|medium|high|urgent",
                other
            )),
        }
    }
}

/// One sample of recently landed tips, in lamports
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TipFloorSnapshot {
    /// Sample timestamp as reported; informational only
    #[serde(default)]
    pub time: Option<String>,
    pub landed_tips_25th_percentile: f64,
    pub landed_tips_50th_percentile: f64,
    pub landed_tips_75th_percentile: f64,
    pub landed_tips_95th_percentile: f64,
    /// Reserved for a future extreme-priority tier
    pub landed_tips_99th_percentile: f64,
}

impl TipFloorSnapshot {
    /// Sample time, accepting RFC 3339 or a bare `YYYY-MM-DD HH:MM:SS` in UTC
    pub fn sampled_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.time.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                    .ok()
                    .map(|t| Utc.from_utc_datetime(&t))
            })
    }

    /// Percentile backing a priority tier
    pub fn percentile_for(&self, priority: TipPriority) -> f64 {
        match priority {
            TipPriority::Low => self.landed_tips_25th_percentile,
            TipPriority::Medium => self.landed_tips_50th_percentile,
            TipPriority::High => self.landed_tips_75th_percentile,
            TipPriority::Urgent => self.landed_tips_95th_percentile,
        }
    }

    /// Tip amount for a priority tier, never below [`MIN_TIP_LAMPORTS`]
    pub fn tip_for(&self, priority: TipPriority) -> u64 {
        // `as` saturates: NaN and negatives become 0
        let floored = self.percentile_for(priority).floor() as u64;
        floored.max(MIN_TIP_LAMPORTS)
    }
}

/// Recommends tip amounts from the Block Engine's tip floor statistics
pub struct TipFloorOracle {
    engine: Arc<EngineClient>,
    /// Last snapshot successfully fetched
    last_snapshot: RwLock<Option<TipFloorSnapshot>>,
}

impl TipFloorOracle {
    pub fn new(engine: Arc<EngineClient>) -> Self {
        Self {
            engine,
            last_snapshot: RwLock::new(None),
        }
    }

    /// Recommended tip in lamports for a priority tier.
    ///
    /// Always hits the network; any failure falls back to
    /// [`TipPriority::default_lamports`].
    pub async fn get_recommended_tip(&self, priority: TipPriority) -> u64 {
        match self.engine.get_tip_floor().await {
            Ok(snapshots) => match snapshots.into_iter().next() {
                Some(snapshot) => {
                    let tip = snapshot.tip_for(priority);
                    debug!(%priority, tip, sampled_at = ?snapshot.sampled_at(), "Tip floor recommendation");
                    *self.last_snapshot.write() = Some(snapshot);
                    return tip;
                }
                None => warn!("Tip floor endpoint returned no snapshots"),
            },
            Err(e) => warn!("Failed to fetch tip floor: {}", e),
        }

        priority.default_lamports()
    }

    /// Most recent snapshot seen, if any
    pub fn last_snapshot(&self) -> Option<TipFloorSnapshot> {
        self.last_snapshot.read().clone()
    }
}
