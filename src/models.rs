//! Review records shared by the scraper, the analyzer and the dashboard.
//!
//! Field names on disk follow the files the dashboard has always read:
//! raw reviews use the column titles shown on the site (`Review`, `Overall`, ...),
//! analysis records use snake_case keys returned by the model.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Literal used for every absent field, both in raw ratings and in analysis comments.
pub const NONE: &str = "None";

/// The rating categories shown on a review, in display order.
pub const RATING_CATEGORIES: [&str; 4] = ["Overall", "Food", "Service", "Ambience"];

/// One review as it appeared on the listing page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RawReview {
    #[serde(rename = "Restaurant Name", default = "none_string")]
    pub restaurant_name: String,
    #[serde(rename = "Review")]
    pub review: String,
    /// Free-form date text, e.g. "Dined 3 days ago" or "Jul 12, 2023".
    #[serde(rename = "Date", default = "none_string")]
    pub date: String,
    #[serde(rename = "Overall", default = "none_string")]
    pub overall: String,
    #[serde(rename = "Food", default = "none_string")]
    pub food: String,
    #[serde(rename = "Service", default = "none_string")]
    pub service: String,
    #[serde(rename = "Ambience", default = "none_string")]
    pub ambience: String,
}

pub(crate) fn none_string() -> String {
    NONE.to_string()
}

/// Maps a missing or blank value to the `"None"` literal.
pub fn or_none(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => none_string(),
    }
}

/// Binary sentiment label, with `None` for failed or missing analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    None,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::None => NONE,
        }
    }
}

impl From<&str> for Sentiment {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::None,
        }
    }
}

impl From<String> for Sentiment {
    fn from(s: String) -> Self {
        Sentiment::from(s.as_str())
    }
}

impl Serialize for Sentiment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label.map(Sentiment::from).unwrap_or_default())
    }
}

/// Food/staff feedback and sentiment extracted from one review.
///
/// `food_comments` and `staff_comments` are expected to be verbatim substrings of
/// `review` whenever they are not `"None"`; see [`AnnotatedReview::food_highlight`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnnotatedReview {
    pub review: String,
    #[serde(default = "none_string")]
    pub food_comments: String,
    #[serde(default = "none_string")]
    pub staff_comments: String,
    #[serde(default)]
    pub sentiment: Sentiment,
}

impl AnnotatedReview {
    /// Stand-in for a review whose batch could not be analyzed.
    pub fn placeholder(review: impl Into<String>) -> Self {
        Self {
            review: review.into(),
            food_comments: none_string(),
            staff_comments: none_string(),
            sentiment: Sentiment::None,
        }
    }

    /// Food comment, only when it can be found verbatim inside the review.
    pub fn food_highlight(&self) -> Option<&str> {
        verbatim(&self.review, &self.food_comments)
    }

    /// Staff comment, only when it can be found verbatim inside the review.
    pub fn staff_highlight(&self) -> Option<&str> {
        verbatim(&self.review, &self.staff_comments)
    }
}

fn verbatim<'a>(review: &str, comment: &'a str) -> Option<&'a str> {
    if comment.is_empty() || comment == NONE || !review.contains(comment) {
        None
    } else {
        Some(comment)
    }
}

/// Which side of a comparison a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestaurantRole {
    #[serde(rename = "Main Restaurant")]
    Main,
    #[serde(rename = "Competitor Restaurant")]
    Competitor,
}

impl RestaurantRole {
    pub fn label(&self) -> &'static str {
        match self {
            RestaurantRole::Main => "Main Restaurant",
            RestaurantRole::Competitor => "Competitor Restaurant",
        }
    }
}

/// A raw review tagged with its comparison role; one row of `ratings_comparison.csv`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ComparisonRecord {
    #[serde(rename = "Restaurant Name")]
    pub restaurant_name: String,
    #[serde(rename = "Review")]
    pub review: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Overall", default = "none_string")]
    pub overall: String,
    #[serde(rename = "Food", default = "none_string")]
    pub food: String,
    #[serde(rename = "Service", default = "none_string")]
    pub service: String,
    #[serde(rename = "Ambience", default = "none_string")]
    pub ambience: String,
    #[serde(rename = "Restaurant")]
    pub restaurant: RestaurantRole,
}

impl ComparisonRecord {
    pub fn tagged(review: RawReview, role: RestaurantRole) -> Self {
        Self {
            restaurant_name: review.restaurant_name,
            review: review.review,
            date: review.date,
            overall: review.overall,
            food: review.food,
            service: review.service,
            ambience: review.ambience,
            restaurant: role,
        }
    }

    pub fn rating(&self, category: &str) -> Option<&str> {
        match category {
            "Overall" => Some(&self.overall),
            "Food" => Some(&self.food),
            "Service" => Some(&self.service),
            "Ambience" => Some(&self.ambience),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_review_uses_site_column_names() {
        let json = r#"{"Restaurant Name":"Toulouse Petit","Review":"Great gumbo","Date":"Dined 2 days ago","Overall":"5","Food":"5"}"#;
        let review: RawReview = serde_json::from_str(json).unwrap();
        assert_eq!(review.food, "5");
        assert_eq!(review.service, "None");
        assert_eq!(review.ambience, "None");

        let back = serde_json::to_value(&review).unwrap();
        assert_eq!(back["Restaurant Name"], "Toulouse Petit");
        assert_eq!(back["Ambience"], "None");
    }

    #[test]
    fn test_sentiment_normalizes_labels() {
        assert_eq!(Sentiment::from("Positive"), Sentiment::Positive);
        assert_eq!(Sentiment::from(" negative "), Sentiment::Negative);
        assert_eq!(Sentiment::from("neutral"), Sentiment::None);
        assert_eq!(serde_json::to_string(&Sentiment::None).unwrap(), "\"None\"");
        assert_eq!(serde_json::to_string(&Sentiment::Positive).unwrap(), "\"positive\"");
    }

    #[test]
    fn test_verbatim_highlights() {
        let annotated = AnnotatedReview {
            review: "The pasta was amazing but service was slow".to_string(),
            food_comments: "pasta was amazing".to_string(),
            staff_comments: "Service was slow".to_string(),
            sentiment: Sentiment::Positive,
        };
        assert_eq!(annotated.food_highlight(), Some("pasta was amazing"));
        // Case differs, so it is not a verbatim substring.
        assert_eq!(annotated.staff_highlight(), None);
        assert_eq!(AnnotatedReview::placeholder("x").food_highlight(), None);
    }

    #[test]
    fn test_role_serializes_as_label() {
        let json = serde_json::to_string(&RestaurantRole::Competitor).unwrap();
        assert_eq!(json, "\"Competitor Restaurant\"");
        assert_eq!(RestaurantRole::Main.label(), "Main Restaurant");
    }

    #[test]
    fn test_or_none() {
        assert_eq!(or_none(Some("  ")), "None");
        assert_eq!(or_none(None), "None");
        assert_eq!(or_none(Some(" tasty ")), "tasty");
    }
}
