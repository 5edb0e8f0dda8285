//! Descriptive statistics over flat listing records.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::db::Document;

const PRICE_BINS: usize = 10;
const TOP_N: usize = 5;

/// A section either has data or explains why not.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Section<T> {
    Ready(T),
    Unavailable { error: &'static str },
}

impl<T> Section<T> {
    fn unavailable() -> Self {
        Section::Unavailable {
            error: "No data available",
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(t) => Some(t),
            Section::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Count {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PriceStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; `None` with fewer than two prices.
    pub std: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct BasicStats {
    pub total_items: usize,
    pub price_stats: PriceStats,
    pub top_locations: Vec<Count>,
    pub top_categories: Vec<Count>,
    pub keywords_summary: Vec<Count>,
}

#[derive(Debug, Serialize)]
pub struct Percentiles {
    #[serde(rename = "25%")]
    pub p25: f64,
    #[serde(rename = "50%")]
    pub p50: f64,
    #[serde(rename = "75%")]
    pub p75: f64,
}

#[derive(Debug, Serialize)]
pub struct PriceRange {
    pub range: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PriceDistribution {
    pub percentiles: Percentiles,
    pub price_ranges: Vec<PriceRange>,
}

#[derive(Debug, Serialize)]
pub struct LocationAnalysis {
    pub location_counts: Vec<Count>,
    pub location_price_avg: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub basic_stats: Section<BasicStats>,
    pub price_distribution: Section<PriceDistribution>,
    pub location_analysis: Section<LocationAnalysis>,
}

pub struct Analyzer<'a> {
    docs: &'a [Document],
    prices: Vec<f64>,
}

impl<'a> Analyzer<'a> {
    pub fn new(docs: &'a [Document]) -> Self {
        let prices = docs.iter().filter_map(price_of).collect();
        info!("Loaded {} records for analysis", docs.len());
        Analyzer { docs, prices }
    }

    pub fn basic_statistics(&self) -> Section<BasicStats> {
        if self.prices.is_empty() {
            warn!("No data available for analysis");
            return Section::unavailable();
        }
        let mut sorted = self.prices.clone();
        sorted.sort_by(f64::total_cmp);

        let stats = BasicStats {
            total_items: self.docs.len(),
            price_stats: PriceStats {
                mean: mean(&sorted),
                median: quantile(&sorted, 0.5),
                min: sorted[0],
                max: sorted[sorted.len() - 1],
                std: sample_std(&sorted),
            },
            top_locations: top(value_counts(self.docs, "location"), TOP_N),
            top_categories: top(value_counts(self.docs, "category_id"), TOP_N),
            keywords_summary: value_counts(self.docs, "keyword"),
        };
        info!("Basic statistics calculated successfully");
        Section::Ready(stats)
    }

    pub fn price_distribution(&self) -> Section<PriceDistribution> {
        if self.prices.is_empty() {
            return Section::unavailable();
        }
        let mut sorted = self.prices.clone();
        sorted.sort_by(f64::total_cmp);

        let dist = PriceDistribution {
            percentiles: Percentiles {
                p25: quantile(&sorted, 0.25),
                p50: quantile(&sorted, 0.50),
                p75: quantile(&sorted, 0.75),
            },
            price_ranges: price_ranges(&sorted, PRICE_BINS),
        };
        info!("Price distribution analysis completed");
        Section::Ready(dist)
    }

    pub fn location_analysis(&self) -> Section<LocationAnalysis> {
        if self.docs.is_empty() {
            return Section::unavailable();
        }

        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for doc in self.docs {
            if let (Some(loc), Some(price)) = (label_of(doc, "location"), price_of(doc)) {
                let entry = sums.entry(loc).or_insert((0.0, 0));
                entry.0 += price;
                entry.1 += 1;
            }
        }

        let analysis = LocationAnalysis {
            location_counts: value_counts(self.docs, "location"),
            location_price_avg: sums
                .into_iter()
                .map(|(loc, (sum, n))| (loc, sum / n as f64))
                .collect(),
        };
        info!("Location analysis completed");
        Section::Ready(analysis)
    }

    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            basic_stats: self.basic_statistics(),
            price_distribution: self.price_distribution(),
            location_analysis: self.location_analysis(),
        }
    }
}

pub fn write_report(report: &AnalysisReport, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {:?}", output_dir))?;
    let path = output_dir.join("analysis_results.json");
    let text = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, text).with_context(|| format!("Failed to write {:?}", path))?;
    info!(path = %path.display(), "Analysis results saved");
    Ok(path)
}

pub(crate) fn price_of(doc: &Document) -> Option<f64> {
    doc.get("price").and_then(Value::as_f64).filter(|p| p.is_finite())
}

/// Non-empty string (or number) under `key`.
pub(crate) fn label_of(doc: &Document, key: &str) -> Option<String> {
    match doc.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Occurrences per distinct label, most frequent first, ties by label.
pub(crate) fn value_counts(docs: &[Document], key: &str) -> Vec<Count> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in docs.iter().filter_map(|d| label_of(d, key)) {
        *counts.entry(label).or_default() += 1;
    }
    let mut out: Vec<Count> = counts
        .into_iter()
        .map(|(value, count)| Count { value, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    out
}

fn top(mut counts: Vec<Count>, n: usize) -> Vec<Count> {
    counts.truncate(n);
    counts
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Linear-interpolated quantile over sorted, non-empty input.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Equal-width bin edges over sorted, non-empty input. The lowest edge is
/// nudged down so the minimum falls inside the first right-closed bin.
pub(crate) fn bin_edges(sorted: &[f64], bins: usize) -> Vec<f64> {
    let (mut lo, mut hi) = (sorted[0], sorted[sorted.len() - 1]);
    if lo == hi {
        lo -= if lo != 0.0 { 0.001 * lo.abs() } else { 0.001 };
        hi += if hi != 0.0 { 0.001 * hi.abs() } else { 0.001 };
        return (0..=bins)
            .map(|i| lo + (hi - lo) * i as f64 / bins as f64)
            .collect();
    }
    let mut edges: Vec<f64> = (0..=bins)
        .map(|i| lo + (hi - lo) * i as f64 / bins as f64)
        .collect();
    edges[0] -= (hi - lo) * 0.001;
    edges
}

/// Counts per `(left, right]` bin.
pub(crate) fn bin_counts(sorted: &[f64], edges: &[f64]) -> Vec<usize> {
    let mut counts = vec![0; edges.len() - 1];
    for &v in sorted {
        if let Some(i) = edges.windows(2).position(|w| v > w[0] && v <= w[1]) {
            counts[i] += 1;
        }
    }
    counts
}

fn price_ranges(sorted: &[f64], bins: usize) -> Vec<PriceRange> {
    let edges = bin_edges(sorted, bins);
    bin_counts(sorted, &edges)
        .into_iter()
        .zip(edges.windows(2))
        .map(|(count, w)| PriceRange {
            range: format!("{:.2}-{:.2}", w[0], w[1]),
            count,
        })
        .collect()
}
