//! Review browser: keyword filtering and verbatim highlighting.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::models::AnnotatedReview;

const FOOD_OPEN: &str = r#"<span class="hl-food">"#;
const STAFF_OPEN: &str = r#"<span class="hl-staff">"#;
const CLOSE: &str = "</span>";

static HIGHLIGHT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<span class="hl-(?:food|staff)">|</span>"#).unwrap());

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewCard {
    pub review: String,
    /// Escaped review text with food/staff comments wrapped in highlight spans.
    pub highlighted_html: String,
    pub food_comments: String,
    pub staff_comments: String,
    pub sentiment: String,
}

/// Case-insensitive substring match over review, food and staff text.
/// An empty keyword keeps everything.
pub fn filter_reviews<'a>(reviews: &'a [AnnotatedReview], keyword: &str) -> Vec<&'a AnnotatedReview> {
    let needle = keyword.trim().to_lowercase();
    reviews
        .iter()
        .filter(|r| {
            needle.is_empty()
                || [&r.review, &r.food_comments, &r.staff_comments]
                    .iter()
                    .any(|text| text.to_lowercase().contains(&needle))
        })
        .collect()
}

pub fn review_cards(reviews: &[AnnotatedReview], keyword: &str) -> Vec<ReviewCard> {
    filter_reviews(reviews, keyword)
        .into_iter()
        .map(|r| ReviewCard {
            review: r.review.clone(),
            highlighted_html: card_html(r),
            food_comments: r.food_comments.clone(),
            staff_comments: r.staff_comments.clone(),
            sentiment: r.sentiment.as_str().to_string(),
        })
        .collect()
}

// Highlighted markup, or the plain escaped review if the markup would not
// strip back to the exact review text.
fn card_html(review: &AnnotatedReview) -> String {
    let html = highlight_review(review);
    if strip_highlights(&html) == review.review {
        html
    } else {
        warn!("⚠️ Highlight markup altered review text, showing it unhighlighted");
        escape_html(&review.review)
    }
}

/// Renders the review as HTML with every occurrence of its food and staff
/// comments highlighted. Comments that are not verbatim substrings are skipped;
/// where both overlap the food comment wins.
pub fn highlight_review(review: &AnnotatedReview) -> String {
    let text = review.review.as_str();
    let mut spans: Vec<(usize, usize, &str)> = Vec::new();

    for (comment, open) in [(review.food_highlight(), FOOD_OPEN), (review.staff_highlight(), STAFF_OPEN)] {
        let Some(comment) = comment else { continue };
        for (start, matched) in text.match_indices(comment) {
            let end = start + matched.len();
            if spans.iter().all(|(s, e, _)| end <= *s || start >= *e) {
                spans.push((start, end, open));
            }
        }
    }
    spans.sort_by_key(|(start, _, _)| *start);

    let mut html = String::with_capacity(text.len() + spans.len() * 32);
    let mut pos = 0;
    for (start, end, open) in spans {
        html.push_str(&escape_html(&text[pos..start]));
        html.push_str(open);
        html.push_str(&escape_html(&text[start..end]));
        html.push_str(CLOSE);
        pos = end;
    }
    html.push_str(&escape_html(&text[pos..]));
    html
}

/// Inverse of [`highlight_review`]: removes highlight spans and unescapes.
pub fn strip_highlights(html: &str) -> String {
    unescape_html(&HIGHLIGHT_TAG.replace_all(html, ""))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sentiment;

    fn annotated(review: &str, food: &str, staff: &str) -> AnnotatedReview {
        AnnotatedReview {
            review: review.to_string(),
            food_comments: food.to_string(),
            staff_comments: staff.to_string(),
            sentiment: Sentiment::Negative,
        }
    }

    #[test]
    fn test_highlight_wraps_both_comments() {
        let r = annotated(
            "The pasta was amazing but service was slow",
            "pasta was amazing",
            "service was slow",
        );
        assert_eq!(
            highlight_review(&r),
            r#"The <span class="hl-food">pasta was amazing</span> but <span class="hl-staff">service was slow</span>"#
        );
    }

    #[test]
    fn test_highlight_round_trip() {
        let cases = [
            annotated("The pasta was amazing but service was slow", "pasta was amazing", "service was slow"),
            annotated("Fish & chips <3, the \"waiter\" wasn't rude", "Fish & chips", "\"waiter\" wasn't rude"),
            annotated("Good good good", "good", "None"),
            annotated("Nothing matched here", "pasta", "staff"),
            annotated("", "None", "None"),
        ];
        for r in &cases {
            assert_eq!(strip_highlights(&highlight_review(r)), r.review);
        }
    }

    #[test]
    fn test_non_verbatim_comment_is_not_highlighted() {
        let r = annotated("Great tacos, friendly bartender", "The tacos were great", "None");
        assert_eq!(highlight_review(&r), "Great tacos, friendly bartender");
    }

    #[test]
    fn test_overlapping_comments_prefer_food() {
        let r = annotated("hot soup served fast", "hot soup served", "soup served fast");
        let html = highlight_review(&r);
        assert!(html.contains(r#"<span class="hl-food">hot soup served</span>"#));
        assert!(!html.contains("hl-staff"));
    }

    #[test]
    fn test_keyword_filter_is_case_insensitive() {
        let reviews = vec![
            annotated("Delicious gumbo", "Delicious gumbo", "None"),
            annotated("Server was rude", "None", "Server was rude"),
            annotated("Fine", "None", "None"),
        ];
        assert_eq!(filter_reviews(&reviews, "DELICIOUS").len(), 1);
        assert_eq!(filter_reviews(&reviews, "rude")[0].review, "Server was rude");
        assert_eq!(filter_reviews(&reviews, "").len(), 3);
        assert!(filter_reviews(&reviews, "sushi").is_empty());
    }

    #[test]
    fn test_card_markup_in_review_text_stays_literal() {
        let r = annotated(r#"Try the <span class="hl-food">soup</span> &amp; bread"#, "soup", "None");
        let cards = review_cards(std::slice::from_ref(&r), "");
        let html = &cards[0].highlighted_html;
        assert!(html.starts_with("Try the &lt;span class=&quot;hl-food&quot;&gt;"));
        assert!(html.contains(r#"<span class="hl-food">soup</span>"#));
        assert_eq!(strip_highlights(html), r.review);
    }

    #[test]
    fn test_review_cards_carry_highlight() {
        let reviews = vec![annotated("Crispy fries", "Crispy fries", "None")];
        let cards = review_cards(&reviews, "fries");
        assert_eq!(cards.len(), 1);
        assert!(cards[0].highlighted_html.starts_with(FOOD_OPEN));
    }
}
