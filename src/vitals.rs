//! In-memory store for client performance reports (Web Vitals).
//!
//! Reports are held in a bounded ring buffer — process memory only, no
//! persistence. When the buffer is full the oldest report is dropped.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// A single Web Vitals report posted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalReport {
    /// Metric name (LCP, CLS, INP, FCP, TTFB)
    pub name: String,
    /// Metric value in the unit the client measured (ms or unitless)
    pub value: f64,
    /// Client-side rating bucket
    #[serde(default)]
    pub rating: Option<Rating>,
    /// Page the metric was captured on
    #[serde(default)]
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

/// Per-metric aggregate.
#[derive(Debug, Clone, Serialize, Default)]
pub struct VitalSummary {
    pub count: u64,
    pub average: f64,
    pub good: u64,
    pub needs_improvement: u64,
    pub poor: u64,
}

/// Bounded in-memory report buffer.
pub struct VitalsStore {
    capacity: usize,
    reports: RwLock<VecDeque<VitalReport>>,
}

impl VitalsStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            reports: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record a report, evicting the oldest when at capacity.
    pub fn record(&self, report: VitalReport) {
        let mut reports = self.reports.write();
        if reports.len() == self.capacity {
            reports.pop_front();
        }
        reports.push_back(report);
    }

    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }

    /// Aggregate retained reports per metric name.
    pub fn summary(&self) -> HashMap<String, VitalSummary> {
        let reports = self.reports.read();
        let mut totals: HashMap<String, (f64, VitalSummary)> = HashMap::new();

        for report in reports.iter() {
            let (sum, summary) = totals.entry(report.name.clone()).or_default();
            *sum += report.value;
            summary.count += 1;
            match report.rating {
                Some(Rating::Good) => summary.good += 1,
                Some(Rating::NeedsImprovement) => summary.needs_improvement += 1,
                Some(Rating::Poor) => summary.poor += 1,
                None => {}
            }
        }

        totals
            .into_iter()
            .map(|(name, (sum, mut summary))| {
                summary.average = sum / summary.count as f64;
                (name, summary)
            })
            .collect()
    }
}
