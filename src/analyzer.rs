//! Food/staff/sentiment extraction over batches of review text.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::claude::CompletionService;
use crate::models::{or_none, AnnotatedReview, Sentiment, NONE};
use crate::store;

pub const SYSTEM_PROMPT: &str =
    "You are an assistant trained to analyze my restaurant's customer reviews about the food and staff.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("text-analysis service call failed: {0}")]
    Service(String),
    #[error("text-analysis service returned no text")]
    EmptyResponse,
    #[error("response is not a JSON array of analyses: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct WireAnalysis {
    #[serde(default)]
    review: Option<String>,
    #[serde(default)]
    food_comments: Option<String>,
    #[serde(default)]
    staff_comments: Option<String>,
    #[serde(default)]
    sentiment: Option<String>,
}

/// Prompt asking for one JSON object per review, in input order.
pub fn build_prompt(reviews: &[String]) -> String {
    let reviews_text: String = reviews
        .iter()
        .map(|review| format!("Review: {} \n\n", review))
        .collect();

    format!(
        r#"Analyze the following customer reviews. For each review, provide feedback on:
1. Food quality (if mentioned), using the exact wording from the review.
2. Staff/service (if mentioned), using the exact wording from the review.
3. Overall sentiment of the review, categorizing it as either **positive** or **negative** based on the tone and content of the review. This sentiment must be provided in the response for each review.

The analysis should be done **individually** for each review. For each review, respond with the following:
- The original review text.
- Feedback on food quality, using the exact words from the review (or 'None' if not mentioned).
- Feedback on staff/service, using the exact words from the review (or 'None' if not mentioned).
- A **positive/negative sentiment field** which should be explicitly marked as **positive** if the overall tone of the review is favorable, and **negative** if it is unfavorable.

Your response should be formatted as a JSON array with each element corresponding to one review, in the same order as the reviews below. The format should be like this:
[
    {{
        "review": "Original review text here.",
        "food_comments": "Exact feedback on food quality (or 'None' if not mentioned).",
        "staff_comments": "Exact feedback on staff/service (or 'None' if not mentioned).",
        "sentiment": "positive" or "negative" based on the tone of the review.
    }},
    ...
]

Reviews:
{}"#,
        reviews_text
    )
}

/// Strips markdown code fences around a JSON reply.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parses the service reply for `batch`. Missing or blank fields become `"None"`;
/// a missing review text falls back to the input review at the same position.
pub fn parse_analysis(response: &str, batch: &[String]) -> Result<Vec<AnnotatedReview>, AnalysisError> {
    let wire: Vec<WireAnalysis> = serde_json::from_str(strip_code_blocks(response))?;

    if wire.len() != batch.len() {
        warn!(
            "⚠️ Analysis returned {} entries for {} reviews",
            wire.len(),
            batch.len()
        );
    }

    Ok(wire
        .into_iter()
        .enumerate()
        .map(|(i, w)| {
            let review = w
                .review
                .filter(|r| !r.trim().is_empty())
                .or_else(|| batch.get(i).cloned())
                .unwrap_or_else(|| NONE.to_string());
            let annotated = AnnotatedReview {
                review,
                food_comments: or_none(w.food_comments.as_deref()),
                staff_comments: or_none(w.staff_comments.as_deref()),
                sentiment: w.sentiment.as_deref().map(Sentiment::from).unwrap_or_default(),
            };
            check_verbatim(&annotated);
            annotated
        })
        .collect())
}

fn check_verbatim(annotated: &AnnotatedReview) {
    for (label, comment, found) in [
        ("food", &annotated.food_comments, annotated.food_highlight().is_some()),
        ("staff", &annotated.staff_comments, annotated.staff_highlight().is_some()),
    ] {
        if comment != NONE && !found {
            warn!("⚠️ {} comment is not a verbatim part of its review: {:?}", label, comment);
        }
    }
}

pub struct ReviewAnalyzer<S> {
    service: S,
}

impl<S: CompletionService> ReviewAnalyzer<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Analyzes one batch. An `Err` means the whole batch produced no annotations;
    /// it has already been logged.
    pub async fn analyze_reviews(&self, batch: &[String]) -> Result<Vec<AnnotatedReview>, AnalysisError> {
        let prompt = build_prompt(batch);

        let response = match self.service.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(text) if strip_code_blocks(&text).is_empty() => {
                error!("❌ Text-analysis service returned no text");
                return Err(AnalysisError::EmptyResponse);
            }
            Ok(text) => text,
            Err(e) => {
                error!("❌ Error calling the text-analysis service: {:#}", e);
                return Err(AnalysisError::Service(format!("{:#}", e)));
            }
        };

        parse_analysis(&response, batch).map_err(|e| {
            error!("❌ Error decoding analysis response: {}", e);
            e
        })
    }

    /// Analyzes at most `max_reviews` reviews in consecutive batches of `batch_size`
    /// and saves the ordered result to `output`.
    ///
    /// A failed batch contributes one placeholder per review so later batches
    /// stay aligned with their input.
    pub async fn generate_reviews_analysis(
        &self,
        reviews: &[String],
        batch_size: usize,
        max_reviews: usize,
        output: &Path,
    ) -> Result<Vec<AnnotatedReview>> {
        if batch_size == 0 {
            bail!("batch size must be at least 1");
        }

        let capped = &reviews[..reviews.len().min(max_reviews)];
        if capped.len() < reviews.len() {
            info!("Capping analysis at {} of {} reviews", capped.len(), reviews.len());
        }

        let total_batches = capped.len().div_ceil(batch_size);
        let mut analysis = Vec::with_capacity(capped.len());

        for (i, batch) in capped.chunks(batch_size).enumerate() {
            match self.analyze_reviews(batch).await {
                Ok(annotated) => {
                    info!("🧠 Batch {}/{} analyzed", i + 1, total_batches);
                    analysis.extend(annotated);
                }
                Err(_) => {
                    warn!("Batch {}/{} replaced with placeholders", i + 1, total_batches);
                    analysis.extend(batch.iter().map(AnnotatedReview::placeholder));
                }
            }
        }

        store::write_json(output, &analysis)?;
        info!("💾 Saved analysis of {} reviews in {}", analysis.len(), output.display());
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes every review back as a positive analysis; optionally fails one call.
    struct EchoService {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    impl EchoService {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call,
            }
        }
    }

    #[async_trait]
    impl CompletionService for EchoService {
        async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
            assert_eq!(system, SYSTEM_PROMPT);
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(anyhow!("503 overloaded"));
            }
            let reviews = prompt.split("\nReviews:\n").nth(1).unwrap_or_default();
            let items: Vec<serde_json::Value> = reviews
                .split("Review: ")
                .filter_map(|r| r.strip_suffix(" \n\n"))
                .map(|r| {
                    serde_json::json!({
                        "review": r,
                        "food_comments": "",
                        "staff_comments": null,
                        "sentiment": "positive",
                    })
                })
                .collect();
            Ok(format!("```json\n{}\n```", serde_json::to_string(&items).unwrap()))
        }
    }

    struct FixedService(&'static str);

    #[async_trait]
    impl CompletionService for FixedService {
        async fn complete(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Review number {}", i)).collect()
    }

    #[tokio::test]
    async fn test_failed_batch_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("reviews_analysis.json");
        let analyzer = ReviewAnalyzer::new(EchoService::new(Some(2)));

        let analysis = analyzer
            .generate_reviews_analysis(&texts(6), 2, 900, &output)
            .await
            .unwrap();

        assert_eq!(analysis.len(), 6);
        assert_eq!(analysis[0].sentiment, Sentiment::Positive);
        assert_eq!(analysis[1].review, "Review number 2");
        assert_eq!(analysis[2], AnnotatedReview::placeholder("Review number 3"));
        assert_eq!(analysis[3], AnnotatedReview::placeholder("Review number 4"));
        assert_eq!(analysis[4].review, "Review number 5");
        assert_eq!(analysis[5].sentiment, Sentiment::Positive);

        let saved: Vec<AnnotatedReview> = store::read_json(&output).unwrap();
        assert_eq!(saved, analysis);
    }

    #[tokio::test]
    async fn test_cap_at_900_reviews() {
        let dir = tempfile::tempdir().unwrap();
        let service = EchoService::new(None);
        let analyzer = ReviewAnalyzer::new(service);

        let analysis = analyzer
            .generate_reviews_analysis(&texts(1000), 10, 900, &dir.path().join("out.json"))
            .await
            .unwrap();

        assert_eq!(analysis.len(), 900);
        assert_eq!(analyzer.service.calls.load(Ordering::SeqCst), 90);
        assert_eq!(analysis[899].review, "Review number 900");
    }

    #[tokio::test]
    async fn test_missing_fields_default_to_none() {
        let analyzer = ReviewAnalyzer::new(EchoService::new(None));
        let analysis = analyzer.analyze_reviews(&texts(1)).await.unwrap();
        assert_eq!(analysis[0].food_comments, "None");
        assert_eq!(analysis[0].staff_comments, "None");
    }

    #[tokio::test]
    async fn test_malformed_response_yields_no_annotations() {
        let analyzer = ReviewAnalyzer::new(FixedService("Sure! Here is the analysis you asked for."));
        let err = analyzer.analyze_reviews(&texts(2)).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_empty_reply_yields_no_annotations() {
        for reply in ["", "  \n", "```json\n```"] {
            let analyzer = ReviewAnalyzer::new(FixedService(reply));
            let err = analyzer.analyze_reviews(&texts(2)).await.unwrap_err();
            assert!(matches!(err, AnalysisError::EmptyResponse));
        }
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = ReviewAnalyzer::new(EchoService::new(None));
        assert!(analyzer
            .generate_reviews_analysis(&texts(3), 0, 900, &dir.path().join("out.json"))
            .await
            .is_err());
    }

    #[test]
    fn test_verbatim_comments_are_kept() {
        let batch = vec!["The pasta was amazing but service was slow".to_string()];
        let response = r#"[{
            "review": "The pasta was amazing but service was slow",
            "food_comments": "pasta was amazing",
            "staff_comments": "service was slow",
            "sentiment": "negative"
        }]"#;

        let analysis = parse_analysis(response, &batch).unwrap();
        let a = &analysis[0];
        assert!(a.review.contains(&a.food_comments));
        assert!(a.review.contains(&a.staff_comments));
        assert_eq!(a.sentiment, Sentiment::Negative);
    }

    #[test]
    fn test_missing_review_falls_back_to_input() {
        let batch = vec!["Loved the oysters".to_string()];
        let analysis = parse_analysis(r#"[{"sentiment": "Positive"}]"#, &batch).unwrap();
        assert_eq!(analysis[0].review, "Loved the oysters");
        assert_eq!(analysis[0].sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_prompt_lists_reviews_in_order() {
        let prompt = build_prompt(&["first".to_string(), "second".to_string()]);
        let first = prompt.find("Review: first").unwrap();
        let second = prompt.find("Review: second").unwrap();
        assert!(first < second);
        assert!(prompt.contains("\"food_comments\""));
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n[]\n```"), "[]");
        assert_eq!(strip_code_blocks("```\n[]\n```"), "[]");
        assert_eq!(strip_code_blocks(" [] "), "[]");
    }
}
