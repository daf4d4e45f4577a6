//! Main-vs-competitor rating comparison.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::config::{AppConfig, COMPARISON_CSV, MAIN_REVIEWS_JSON};
use crate::crawler;
use crate::dates::normalize_review_date;
use crate::models::{ComparisonRecord, RawReview, RestaurantRole, RATING_CATEGORIES};
use crate::store;

#[derive(Debug, Serialize, ToSchema)]
pub struct ComparisonOutcome {
    pub success: bool,
    pub message: String,
    pub main_reviews: usize,
    pub competitor_reviews: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrendPoint {
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    pub rating: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrendSeries {
    pub restaurant: String,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryTrend {
    pub category: String,
    pub series: Vec<TrendSeries>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrendReport {
    pub categories: Vec<CategoryTrend>,
    /// Records left out because their date could not be normalized.
    pub dropped_undated: usize,
}

/// Tags both sides and concatenates them, main restaurant first.
pub fn tag_and_merge(main: Vec<RawReview>, competitor: Vec<RawReview>) -> Vec<ComparisonRecord> {
    main.into_iter()
        .map(|r| ComparisonRecord::tagged(r, RestaurantRole::Main))
        .chain(
            competitor
                .into_iter()
                .map(|r| ComparisonRecord::tagged(r, RestaurantRole::Competitor)),
        )
        .collect()
}

/// Writes the merged comparison CSV when both sides have data.
pub fn compare_with(main: Vec<RawReview>, competitor: Vec<RawReview>, csv_path: &Path) -> Result<ComparisonOutcome> {
    let (main_reviews, competitor_reviews) = (main.len(), competitor.len());
    if main.is_empty() || competitor.is_empty() {
        return Ok(ComparisonOutcome {
            success: false,
            message: "Failed to scrape data for one or both restaurants.".to_string(),
            main_reviews,
            competitor_reviews,
        });
    }

    let records = tag_and_merge(main, competitor);
    store::write_comparison_csv(csv_path, &records)?;
    info!("💾 Saved {} comparison rows in {}", records.len(), csv_path.display());

    Ok(ComparisonOutcome {
        success: true,
        message: "Data scraped successfully!".to_string(),
        main_reviews,
        competitor_reviews,
    })
}

/// Loads the main restaurant's saved reviews, scrapes the competitor and
/// writes `ratings_comparison.csv`.
pub async fn run_comparison(config: &AppConfig, competitor_url: &str) -> Result<ComparisonOutcome> {
    let main_path = config.data_path(MAIN_REVIEWS_JSON);
    let main: Vec<RawReview> = match store::read_json(&main_path) {
        Ok(reviews) => reviews,
        Err(e) => {
            error!("❌ Error loading main restaurant data: {:#}", e);
            Vec::new()
        }
    };

    let competitor = crawler::scrape_reviews(competitor_url, &config.scrape, &config.data_dir).await?;

    compare_with(main, competitor, &config.data_path(COMPARISON_CSV))
}

/// One series per rating category and role, dated records only.
pub fn trend_report(records: &[ComparisonRecord]) -> TrendReport {
    trend_report_with(records, normalize_review_date)
}

/// Same as [`trend_report`] with a caller-supplied date normalizer.
pub fn trend_report_with(
    records: &[ComparisonRecord],
    normalize: impl Fn(&str) -> Option<NaiveDate>,
) -> TrendReport {
    let dated: Vec<(NaiveDate, &ComparisonRecord)> = records
        .iter()
        .filter_map(|r| normalize(&r.date).map(|d| (d, r)))
        .collect();

    let dropped_undated = records.len() - dated.len();
    if dropped_undated > 0 {
        warn!("Dropped {} records with unparseable dates", dropped_undated);
    }

    let categories = RATING_CATEGORIES
        .iter()
        .map(|category| CategoryTrend {
            category: category.to_string(),
            series: [RestaurantRole::Main, RestaurantRole::Competitor]
                .into_iter()
                .map(|role| series_for(&dated, category, role))
                .collect(),
        })
        .collect();

    TrendReport {
        categories,
        dropped_undated,
    }
}

fn series_for(dated: &[(NaiveDate, &ComparisonRecord)], category: &str, role: RestaurantRole) -> TrendSeries {
    let mut points: Vec<(NaiveDate, f64)> = dated
        .iter()
        .filter(|(_, r)| r.restaurant == role)
        .filter_map(|(date, r)| {
            let rating = r.rating(category)?.trim().parse::<f64>().ok()?;
            rating.is_finite().then_some((*date, rating))
        })
        .collect();
    points.sort_by_key(|(date, _)| *date);

    TrendSeries {
        restaurant: role.label().to_string(),
        points: points
            .into_iter()
            .map(|(date, rating)| TrendPoint {
                date: date.format("%Y-%m-%d").to_string(),
                rating,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::normalize_review_date_at;
    use chrono::NaiveDateTime;

    fn raw(date: &str, overall: &str, food: &str) -> RawReview {
        RawReview {
            restaurant_name: "Blue Door".to_string(),
            review: "ok".to_string(),
            date: date.to_string(),
            overall: overall.to_string(),
            food: food.to_string(),
            service: "4".to_string(),
            ambience: "None".to_string(),
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_merge_tags_main_first() {
        let records = tag_and_merge(vec![raw("Dined today", "5", "5")], vec![raw("Dined today", "3", "2"); 2]);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].restaurant, RestaurantRole::Main);
        assert!(records[1..].iter().all(|r| r.restaurant == RestaurantRole::Competitor));
    }

    #[test]
    fn test_compare_requires_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings_comparison.csv");

        let outcome = compare_with(vec![raw("Dined today", "5", "5")], vec![], &path).unwrap();
        assert!(!outcome.success);
        assert!(!path.exists());

        let outcome = compare_with(vec![raw("Dined today", "5", "5")], vec![raw("Dined today", "3", "3")], &path).unwrap();
        assert!(outcome.success);
        assert_eq!(store::read_comparison_csv(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_trends_drop_undated_and_sort() {
        let records = tag_and_merge(
            vec![
                raw("Dined 1 days ago", "4", "5"),
                raw("Jul 12, 2023", "2", "None"),
                raw("No date found", "5", "5"),
            ],
            vec![raw("Dined 2 weeks ago", "3", "3")],
        );

        let report = trend_report_with(&records, |d| normalize_review_date_at(d, now()));
        assert_eq!(report.dropped_undated, 1);
        assert_eq!(report.categories.len(), 4);

        let overall = &report.categories[0];
        assert_eq!(overall.category, "Overall");
        let main = &overall.series[0];
        assert_eq!(main.restaurant, "Main Restaurant");
        assert_eq!(main.points.len(), 2);
        assert_eq!(main.points[0].date, "2023-07-12");
        assert_eq!(main.points[1].date, "2024-03-14");
        assert_eq!(overall.series[1].points[0].date, "2024-03-01");

        // "None" ratings are not plotted.
        let food_main = &report.categories[1].series[0];
        assert_eq!(food_main.points.len(), 1);
        let ambience = &report.categories[3];
        assert!(ambience.series.iter().all(|s| s.points.is_empty()));
    }

    #[test]
    fn test_trend_report_dates_against_local_clock() {
        let records = tag_and_merge(
            vec![raw("Dined today", "4", "4"), raw("not a date", "3", "3")],
            vec![raw("Jul 12, 2023", "5", "5")],
        );
        let report = trend_report(&records);
        assert_eq!(report.dropped_undated, 1);

        let today = chrono::Local::now().date_naive();
        let main = &report.categories[0].series[0];
        assert_eq!(main.points.len(), 1);
        let plotted = NaiveDate::parse_from_str(&main.points[0].date, "%Y-%m-%d").unwrap();
        // Allow a midnight rollover between the two clock reads.
        assert!(plotted == today || Some(plotted) == today.succ_opt());
        assert_eq!(report.categories[0].series[1].points[0].date, "2023-07-12");
    }
}
