use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::{ChromeDriver, NextPage, PageDriver, REVIEWS_CONTAINER};
use crate::config::ScrapeConfig;
use crate::models::{none_string, RawReview, RATING_CATEGORIES};
use crate::store;

pub const NO_REVIEW_TEXT: &str = "No review text found";
pub const NO_DATE: &str = "No date found";
const FALLBACK_NAME: &str = "Restaurant";

static CONTAINER_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(REVIEWS_CONTAINER).unwrap());
static REVIEW_TEXT_SEL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"span[data-test="wrapper-tag"][data-testid="wrapper-tag"]"#).unwrap()
});
static RATINGS_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("ol").unwrap());
static RATING_VALUE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());
static DATE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("p.iLkEeQbexGs-").unwrap());

// ============================================================================
// Naming
// ============================================================================

/// Display name from the listing URL's last path segment,
/// e.g. `/r/toulouse-petit-kitchen-and-lounge-seattle` -> "Toulouse Petit Kitchen And Lounge Seattle".
pub fn restaurant_name_from_url(url: &str) -> String {
    let slug = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path()
                .split('/')
                .filter(|s| !s.is_empty())
                .last()
                .map(str::to_string)
        })
        .unwrap_or_default();

    let name = title_case(&slug.replace('-', " "));
    if name.trim().is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// `<first name token, lower-cased>_reviews.json`.
pub fn reviews_file_name(restaurant_name: &str) -> String {
    let stem = restaurant_name
        .split_whitespace()
        .next()
        .unwrap_or(FALLBACK_NAME)
        .to_lowercase();
    format!("{}_reviews.json", stem)
}

// ============================================================================
// Page Extraction
// ============================================================================

/// What a rendered listing page contained.
#[derive(Debug)]
pub enum PageParse {
    /// The reviews container has not rendered.
    MissingContainer,
    /// The container is present but empty: no more data.
    NoItems,
    Reviews(Vec<RawReview>),
}

/// Extracts every review item directly under the reviews container.
pub fn parse_review_page(html: &str, restaurant_name: &str, page: usize) -> PageParse {
    let document = Html::parse_document(html);
    let Some(container) = document.select(&CONTAINER_SEL).next() else {
        return PageParse::MissingContainer;
    };

    let items: Vec<ElementRef> = container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "li")
        .collect();

    if items.is_empty() {
        return PageParse::NoItems;
    }

    PageParse::Reviews(
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| extract_review(item, restaurant_name, page, i + 1))
            .collect(),
    )
}

fn extract_review(item: ElementRef, restaurant_name: &str, page: usize, index: usize) -> RawReview {
    let review = item
        .select(&REVIEW_TEXT_SEL)
        .next()
        .map(stripped_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_REVIEW_TEXT.to_string());

    let date = item
        .select(&DATE_SEL)
        .next()
        .map(stripped_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_DATE.to_string());

    let mut ratings: [String; 4] = std::array::from_fn(|_| none_string());
    if let Some(list) = item.select(&RATINGS_SEL).next() {
        for rating_item in list.children().filter_map(ElementRef::wrap).filter(|el| el.value().name() == "li") {
            match rating_pair(rating_item) {
                Some((key, value)) => {
                    // Unknown categories are ignored.
                    if let Some(slot) = RATING_CATEGORIES.iter().position(|c| *c == key) {
                        ratings[slot] = value;
                    }
                }
                None => warn!(
                    "⚠️ Couldn't process rating item of review #{} on page {}",
                    index, page
                ),
            }
        }
    }
    let [overall, food, service, ambience] = ratings;

    RawReview {
        restaurant_name: restaurant_name.to_string(),
        review,
        date,
        overall,
        food,
        service,
        ambience,
    }
}

// A rating item reads "<label><span>value</span>", label first.
fn rating_pair(item: ElementRef) -> Option<(String, String)> {
    let key = item
        .children()
        .next()?
        .value()
        .as_text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())?;
    let value = item
        .select(&RATING_VALUE_SEL)
        .next()
        .map(stripped_text)
        .filter(|t| !t.is_empty())?;
    Some((key, value))
}

fn stripped_text(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Pagination Loop
// ============================================================================

/// Scrapes every review reachable from `url` with a fresh Chrome session and
/// saves them to `<slug>_reviews.json` under `out_dir`.
pub async fn scrape_reviews(url: &str, config: &ScrapeConfig, out_dir: &Path) -> Result<Vec<RawReview>> {
    let mut driver = ChromeDriver::launch(config)?;
    scrape_reviews_with(&mut driver, url, config, out_dir).await
}

/// Same as [`scrape_reviews`] over any [`PageDriver`]. The driver is closed before returning.
pub async fn scrape_reviews_with<D: PageDriver + ?Sized>(
    driver: &mut D,
    url: &str,
    config: &ScrapeConfig,
    out_dir: &Path,
) -> Result<Vec<RawReview>> {
    let restaurant_name = restaurant_name_from_url(url);
    info!("🍽️ Starting review scrape for {} ({})", restaurant_name, url);

    let reviews = collect_reviews(driver, url, &restaurant_name, config).await;
    driver.close().await;

    let path: PathBuf = out_dir.join(reviews_file_name(&restaurant_name));
    store::write_json(&path, &reviews)
        .with_context(|| format!("failed to save reviews to {}", path.display()))?;
    info!("💾 Saved {} reviews in {}", reviews.len(), path.display());

    Ok(reviews)
}

/// Walks the listing page by page. Never fails: per-item and per-page problems
/// degrade to whatever has been collected so far.
pub async fn collect_reviews<D: PageDriver + ?Sized>(
    driver: &mut D,
    url: &str,
    restaurant_name: &str,
    config: &ScrapeConfig,
) -> Vec<RawReview> {
    let mut reviews = Vec::new();

    if let Err(e) = driver.open(url).await {
        error!("❌ Failed to open {}: {:#}", url, e);
        return reviews;
    }
    if let Err(e) = driver.wait_for_reviews(config.container_timeout).await {
        error!("❌ Error loading the reviews container: {:#}", e);
        return reviews;
    }
    info!("✅ Successfully loaded the reviews container");

    let mut page = 1;
    for _ in 0..config.max_pages {
        let html = match driver.page_source().await {
            Ok(html) => html,
            Err(e) => {
                warn!("⚠️ Couldn't process page {}: {:#}", page, e);
                recover(driver, config).await;
                continue;
            }
        };

        match parse_review_page(&html, restaurant_name, page) {
            PageParse::MissingContainer => {
                warn!("⚠️ Reviews not found on page {}, refreshing", page);
                recover(driver, config).await;
                continue;
            }
            PageParse::NoItems => {
                info!("No review items found on page {}", page);
                break;
            }
            PageParse::Reviews(items) => {
                info!("📄 Page {}: {} reviews", page, items.len());
                reviews.extend(items);
            }
        }

        match advance(driver, config, page).await {
            NextPage::Advanced => page += 1,
            NextPage::LastPage => break,
        }
    }

    reviews
}

// Clicks through to the next page, retrying transient failures.
// Exhausted retries end pagination just like a disabled control.
async fn advance<D: PageDriver + ?Sized>(driver: &mut D, config: &ScrapeConfig, page: usize) -> NextPage {
    for attempt in 1..=config.click_attempts {
        match driver.click_next_page(config.next_timeout).await {
            Ok(NextPage::Advanced) => {
                sleep(config.page_pause).await;
                return NextPage::Advanced;
            }
            Ok(NextPage::LastPage) => {
                info!("🏁 Last page reached ({})", page);
                return NextPage::LastPage;
            }
            Err(e) => warn!(
                "🔄 Error clicking next on page {}. Attempt {}/{}: {:#}",
                page, attempt, config.click_attempts, e
            ),
        }
    }
    warn!("Retry limit reached on page {}. Stopping pagination.", page);
    NextPage::LastPage
}

async fn recover<D: PageDriver + ?Sized>(driver: &mut D, config: &ScrapeConfig) {
    if let Err(e) = driver.refresh().await {
        warn!("⚠️ Refresh failed: {:#}", e);
    }
    sleep(config.refresh_pause).await;
}
