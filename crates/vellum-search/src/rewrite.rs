//! Query rewriting: one completion call turning a raw question into search
//! variants plus explicit-signal filters. Never fails; every failure mode
//! degrades to the original question as the sole variant.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use vellum_core::{CompletionBackend, ConfigHandle, QueryRewrite, Result, RewriteFilters};

const SYSTEM_PROMPT: &str = "You are a search query analyst for a personal document \
collection. Given a user question, respond with JSON only, no prose, matching this shape: \
{\"intent\": string, \"variants\": [string, string, string], \"filters\": \
{\"time_range\": {\"start\": string|null, \"end\": string|null}|null, \
\"entities\": [string], \"document_types\": [string]}}. \
The three variants are: a keyword query, a paraphrase, and a concept expansion. \
Populate filters only from explicit signals in the question (named people, \
organizations, dates, file types). Never infer filters from what the documents \
might contain.";

/// Wire shape of the completion output. Deliberately separate from
/// [`QueryRewrite`]: the model does not echo the original question.
#[derive(Deserialize)]
struct RewriteResponse {
    intent: String,
    variants: Vec<String>,
    #[serde(default)]
    filters: RewriteFilters,
}

pub struct QueryRewriter {
    completion: Arc<dyn CompletionBackend>,
    config: Arc<ConfigHandle>,
}

impl QueryRewriter {
    pub fn new(completion: Arc<dyn CompletionBackend>, config: Arc<ConfigHandle>) -> Self {
        Self { completion, config }
    }

    /// Rewrite a question into search variants. Completion failure, timeout,
    /// or undecodable output all degrade to [`QueryRewrite::fallback`].
    #[instrument(skip(self, question), fields(subsystem = "search", component = "rewriter"))]
    pub async fn rewrite(&self, question: &str) -> QueryRewrite {
        let cfg = self.config.snapshot();
        let truncated = truncate_chars(question, cfg.completion_char_budget);

        let completion = tokio::time::timeout(
            Duration::from_secs(cfg.rewrite_timeout_secs),
            self.completion.complete(SYSTEM_PROMPT, truncated),
        )
        .await;

        let raw = match completion {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error_msg = %e, "Query rewrite completion failed");
                return QueryRewrite::fallback(question, "completion failed");
            }
            Err(_) => {
                warn!(
                    timeout_secs = cfg.rewrite_timeout_secs,
                    "Query rewrite timed out"
                );
                return QueryRewrite::fallback(question, "completion timed out");
            }
        };

        match parse_rewrite(&raw) {
            Ok(response) => {
                let mut variants: Vec<String> = response
                    .variants
                    .into_iter()
                    .filter(|v| !v.trim().is_empty())
                    .collect();
                variants.truncate(cfg.max_variants);
                if variants.is_empty() {
                    variants.push(question.to_string());
                }
                debug!(variant_count = variants.len(), "Query rewritten");
                QueryRewrite {
                    original: question.to_string(),
                    variants,
                    intent: response.intent,
                    filters: response.filters,
                }
            }
            Err(e) => {
                warn!(error_msg = %e, "Query rewrite output undecodable");
                QueryRewrite::fallback(question, "undecodable rewrite output")
            }
        }
    }
}

/// Extract and decode the JSON object from completion output. Tolerates code
/// fences and surrounding prose, but the object itself must decode to the
/// typed shape as-is.
fn parse_rewrite(raw: &str) -> Result<RewriteResponse> {
    let json = extract_json_object(raw).ok_or_else(|| {
        vellum_core::Error::Serialization(format!(
            "No JSON object in rewrite output ({} chars)",
            raw.len()
        ))
    })?;
    Ok(serde_json::from_str(json)?)
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
