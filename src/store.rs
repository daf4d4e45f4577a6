//! Whole-file JSON and CSV persistence.
//!
//! Every write replaces the target file; nothing is appended or locked.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::models::{or_none, ComparisonRecord, RawReview};

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Loads raw reviews from a JSON array or a CSV export, chosen by extension.
pub fn read_raw_reviews(path: &Path) -> Result<Vec<RawReview>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        read_raw_reviews_csv(path)
    } else {
        read_json(path)
    }
}

pub fn read_raw_reviews_csv(path: &Path) -> Result<Vec<RawReview>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut reviews = Vec::new();
    for (i, row) in reader.deserialize::<RawReview>().enumerate() {
        let review = row.with_context(|| format!("bad row {} in {}", i + 1, path.display()))?;
        reviews.push(blank_ratings_to_none(review));
    }
    Ok(reviews)
}

fn blank_ratings_to_none(mut review: RawReview) -> RawReview {
    review.overall = or_none(Some(&review.overall));
    review.food = or_none(Some(&review.food));
    review.service = or_none(Some(&review.service));
    review.ambience = or_none(Some(&review.ambience));
    review
}

/// Converts a raw reviews CSV export into the JSON array the comparison view loads.
pub fn convert_csv_to_json(csv_path: &Path, json_path: &Path) -> Result<usize> {
    let reviews = read_raw_reviews_csv(csv_path)?;
    write_json(json_path, &reviews)?;
    info!("💾 Saved {} reviews to {}", reviews.len(), json_path.display());
    Ok(reviews.len())
}

pub fn write_comparison_csv(path: &Path, records: &[ComparisonRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("failed to create {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_comparison_csv(path: &Path) -> Result<Vec<ComparisonRecord>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("failed to open {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<ComparisonRecord>, _>>()
        .with_context(|| format!("invalid comparison data in {}", path.display()))
}
