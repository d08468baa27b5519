//! LLM-backed resume scoring.
//!
//! Wraps the provider-agnostic `llm-client` with the matching prompt, the
//! structured-output schema, and a parsing cascade that survives malformed
//! model output. One malformed response must never abort a batch: transport
//! failures surface as errors (the matcher counts them), everything else
//! degrades to a defaulted result.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use llm_client::{parse, FunctionSpec, LlmClient, Message, ProviderConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::traits::BaseResumeScorer;

/// Delay before the single retry on rate-limit / server errors.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// How much raw model text is preserved in a defaulted result.
const RAW_TEXT_PREVIEW: usize = 500;

// =============================================================================
// Analysis result
// =============================================================================

/// Structured scoring output.
///
/// Stored wholesale into a found job's `ai_analysis` column; the score is
/// mirrored into `match_score`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub matching_score: i64,
    pub summary: String,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
    pub reasoning: String,
}

impl AnalysisResult {
    /// Default result when nothing parseable came back. The raw model text is
    /// preserved (truncated) so the failure can be diagnosed from the row.
    pub fn unavailable(raw_text: &str) -> Self {
        Self {
            matching_score: 0,
            summary: "analysis unavailable".to_string(),
            strengths: Vec::new(),
            gaps: Vec::new(),
            recommendations: Vec::new(),
            reasoning: truncate(raw_text, RAW_TEXT_PREVIEW),
        }
    }

    /// Build a result from a parsed JSON value, tolerating schema drift.
    ///
    /// Accepts both the flat shape (`{matching_score, summary, ...}`) and the
    /// nested shape the prompt asks for (`{matching_score, ai_analysis: {...}}`).
    /// Missing list fields become empty, missing text fields become
    /// "Not provided", and the score is coerced to an integer in [0, 100].
    pub fn from_value(value: &Value) -> Self {
        let analysis = match value.get("ai_analysis") {
            Some(Value::Object(_)) => value.get("ai_analysis").unwrap_or(value),
            _ => value,
        };

        let score = value
            .get("matching_score")
            .or_else(|| analysis.get("matching_score"))
            .map(coerce_score)
            .unwrap_or(0);

        Self {
            matching_score: score,
            summary: string_field(analysis, "summary"),
            strengths: list_field(analysis, "strengths"),
            gaps: list_field(analysis, "gaps"),
            recommendations: list_field(analysis, "recommendations"),
            reasoning: string_field(analysis, "reasoning"),
        }
    }
}

/// Coerce a score value to an integer clamped to [0, 100].
///
/// Providers occasionally return the score as a string or a float.
fn coerce_score(value: &Value) -> i64 {
    let raw = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| {
            s.trim().parse::<f64>().ok().map(|f| f.round() as i64)
        }),
        _ => None,
    };
    raw.unwrap_or(0).clamp(0, 100)
}

fn string_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        _ => "Not provided".to_string(),
    }
}

fn list_field(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

/// Parse a raw completion body into a result.
///
/// Cascade: direct JSON parse, fence stripping, outermost-brace extraction;
/// if everything fails, a defaulted result carrying the raw text. Never
/// errors and never panics.
pub fn parse_analysis_response(content: &str) -> AnalysisResult {
    match parse::parse_lenient(content) {
        Some(value) => AnalysisResult::from_value(&value),
        None => AnalysisResult::unavailable(content),
    }
}

// =============================================================================
// Prompt
// =============================================================================

const SCORING_SYSTEM_PROMPT: &str = "You are an expert HR analyst specializing in resume-job matching. \
Return ONLY a valid JSON object with keys 'matching_score' (0-100) and 'ai_analysis' \
(with fields summary, strengths, gaps, recommendations, reasoning). No extra text or code fences.";

const MATCHING_PROMPT_TEMPLATE: &str = r#"You are an expert HR analyst and recruitment specialist. Your task is to analyze how well a candidate's resume matches a specific job posting.

Please carefully analyze the following resume and job posting data:

**RESUME DATA:**
{resume_json}

**JOB POSTING DATA:**
{job_json}

**ANALYSIS INSTRUCTIONS:**

1. **Scoring Guidelines (0-100 scale):**
   - 90-100: Exceptional match - candidate exceeds requirements with relevant experience
   - 80-89: Excellent match - candidate meets most requirements with strong background
   - 70-79: Good match - candidate meets core requirements with some gaps
   - 60-69: Fair match - candidate has relevant skills but missing key requirements
   - 50-59: Moderate match - some relevant experience but significant gaps
   - 30-49: Weak match - limited relevant experience
   - 0-29: Poor match - very little relevant experience

2. **Evaluation Criteria:**
   - Skills Alignment (40%): technical skills, tools, technologies
   - Experience Level (30%): years of experience, seniority level
   - Industry/Domain (15%): relevant industry experience
   - Education (10%): educational background and qualifications
   - Culture Fit (5%): soft skills, work style alignment

3. **Analysis Requirements:**
   - Provide a comprehensive summary of the match quality
   - Identify 3-5 key strengths where the candidate excels
   - List 2-4 main gaps or areas for improvement
   - Give 2-3 specific recommendations for the candidate
   - Explain your reasoning for the final score

Return your analysis as a JSON object of this exact shape:

{
  "matching_score": <integer 0-100>,
  "ai_analysis": {
    "summary": "<brief 2-3 sentence summary of match quality>",
    "strengths": ["<specific strength>", "..."],
    "gaps": ["<gap or missing requirement>", "..."],
    "recommendations": ["<specific recommendation>", "..."],
    "reasoning": "<detailed explanation for the score, covering all evaluation criteria>"
  }
}

Be thorough, objective, and provide actionable insights for both the candidate and the hiring manager."#;

/// Render the matching prompt.
///
/// Literal substring replacement only: the substituted payloads are JSON and
/// the template itself contains braces, so a format-string facility would
/// corrupt the rendering.
pub fn render_matching_prompt(resume: &Value, job: &Value) -> String {
    let resume_json = serde_json::to_string_pretty(resume).unwrap_or_else(|_| "{}".to_string());
    let job_json = serde_json::to_string_pretty(job).unwrap_or_else(|_| "{}".to_string());

    MATCHING_PROMPT_TEMPLATE
        .replace("{resume_json}", &resume_json)
        .replace("{job_json}", &job_json)
}

/// Function schema for providers that support forced tool calls.
fn analysis_function_spec() -> FunctionSpec {
    FunctionSpec {
        name: "analyze_resume_job_match".to_string(),
        description: "Analyze how well a resume matches a job posting".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "matching_score": {
                    "type": "integer",
                    "description": "Match score from 0-100, where 90+ is extremely good match",
                    "minimum": 0,
                    "maximum": 100
                },
                "ai_analysis": {
                    "type": "object",
                    "properties": {
                        "summary": { "type": "string", "description": "Brief summary of the match" },
                        "strengths": { "type": "array", "items": { "type": "string" } },
                        "gaps": { "type": "array", "items": { "type": "string" } },
                        "recommendations": { "type": "array", "items": { "type": "string" } },
                        "reasoning": { "type": "string", "description": "Detailed reasoning for the score" }
                    },
                    "required": ["summary", "strengths", "gaps", "recommendations", "reasoning"]
                }
            },
            "required": ["matching_score", "ai_analysis"]
        }),
    }
}

// =============================================================================
// Production scorer
// =============================================================================

/// Scorer backed by the configured provider registry.
pub struct LlmResumeScorer {
    clients: HashMap<String, LlmClient>,
}

impl LlmResumeScorer {
    /// Build clients for every configured provider.
    pub fn new(providers: HashMap<String, ProviderConfig>) -> Result<Self> {
        let mut clients = HashMap::new();
        for (key, config) in providers {
            clients.insert(key, LlmClient::new(config)?);
        }
        Ok(Self { clients })
    }

    pub fn has_provider(&self, key: &str) -> bool {
        self.clients.contains_key(key)
    }

    fn client_for(&self, provider: &str) -> Result<&LlmClient> {
        if let Some(client) = self.clients.get(provider) {
            return Ok(client);
        }

        // Unknown keys fall back to the default provider when configured.
        if let Some(client) = self.clients.get("deepseek") {
            warn!(provider = %provider, "unknown provider key, falling back to deepseek");
            return Ok(client);
        }

        Err(anyhow!("no configured provider for '{provider}'"))
    }

    async fn chat_with_retry(&self, client: &LlmClient, messages: &[Message]) -> Result<String> {
        match client.chat(messages, true).await {
            Ok(content) => Ok(content),
            Err(e) if e.is_retryable() => {
                warn!(provider = %client.provider(), error = %e, "provider call failed, retrying once");
                tokio::time::sleep(RETRY_DELAY).await;
                client
                    .chat(messages, true)
                    .await
                    .map_err(|e| anyhow!("provider {} failed: {e}", client.provider()))
            }
            Err(e) => Err(anyhow!("provider {} failed: {e}", client.provider())),
        }
    }
}

#[async_trait]
impl BaseResumeScorer for LlmResumeScorer {
    async fn score(
        &self,
        provider: &str,
        resume: &Value,
        job: &Value,
    ) -> Result<AnalysisResult> {
        let client = self.client_for(provider)?;
        let prompt = render_matching_prompt(resume, job);
        let messages = [
            Message::system(SCORING_SYSTEM_PROMPT),
            Message::user(prompt),
        ];

        // Structured tool call first where the provider is reliable; any
        // failure falls through to the JSON-mode completion.
        if client.supports_function_calls() {
            match client
                .function_call(&messages, &analysis_function_spec())
                .await
            {
                Ok(arguments) => {
                    debug!(provider = %client.provider(), "scored via function call");
                    return Ok(AnalysisResult::from_value(&arguments));
                }
                Err(e) => {
                    warn!(provider = %client.provider(), error = %e, "function call failed, falling back to JSON completion");
                }
            }
        }

        let content = self.chat_with_retry(client, &messages).await?;
        let result = parse_analysis_response(&content);

        info!(
            provider = %client.provider(),
            score = result.matching_score,
            "resume-job analysis complete"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_FLAT: &str = r#"{"matching_score": 87, "summary":"ok", "strengths":[], "gaps":[], "recommendations":[], "reasoning":""}"#;

    #[test]
    fn direct_json_parses_to_score() {
        let result = parse_analysis_response(FULL_FLAT);
        assert_eq!(result.matching_score, 87);
        assert_eq!(result.summary, "ok");
    }

    #[test]
    fn fenced_json_parses_to_score() {
        let content = "```json\n{\"matching_score\": 42, \"summary\":\"ok\", \"strengths\":[], \"gaps\":[], \"recommendations\":[], \"reasoning\":\"\"}\n```";
        let result = parse_analysis_response(content);
        assert_eq!(result.matching_score, 42);
    }

    #[test]
    fn prose_wrapped_json_parses_to_score() {
        let content = "Sure! Here is my assessment:\n{\"matching_score\": 73, \"summary\":\"fine\", \"strengths\":[], \"gaps\":[], \"recommendations\":[], \"reasoning\":\"x\"}\nLet me know.";
        let result = parse_analysis_response(content);
        assert_eq!(result.matching_score, 73);
    }

    #[test]
    fn garbage_defaults_to_zero_with_raw_text() {
        let result = parse_analysis_response("not even close to JSON");
        assert_eq!(result.matching_score, 0);
        assert_eq!(result.summary, "analysis unavailable");
        assert!(result.reasoning.contains("not even close to JSON"));
    }

    #[test]
    fn string_score_is_coerced() {
        let result = parse_analysis_response(r#"{"matching_score": "95" }"#);
        assert_eq!(result.matching_score, 95);
        assert_eq!(result.summary, "Not provided");
        assert!(result.strengths.is_empty());
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(
            parse_analysis_response(r#"{"matching_score": 250}"#).matching_score,
            100
        );
        assert_eq!(
            parse_analysis_response(r#"{"matching_score": -5}"#).matching_score,
            0
        );
    }

    #[test]
    fn nested_analysis_shape_is_accepted() {
        let content = r#"{"matching_score": 61, "ai_analysis": {"summary": "s", "strengths": ["a"], "gaps": ["b"], "recommendations": ["c"], "reasoning": "r"}}"#;
        let result = parse_analysis_response(content);
        assert_eq!(result.matching_score, 61);
        assert_eq!(result.strengths, vec!["a".to_string()]);
        assert_eq!(result.reasoning, "r");
    }

    #[test]
    fn missing_fields_are_backfilled() {
        let result = parse_analysis_response(r#"{"matching_score": 50, "summary": "only this"}"#);
        assert_eq!(result.summary, "only this");
        assert_eq!(result.reasoning, "Not provided");
        assert!(result.gaps.is_empty());
    }

    #[test]
    fn prompt_rendering_preserves_json_braces() {
        let resume = serde_json::json!({"skills": ["rust"], "nested": {"a": 1}});
        let job = serde_json::json!({"title": "Engineer {remote}"});
        let prompt = render_matching_prompt(&resume, &job);

        assert!(prompt.contains(r#""skills""#));
        assert!(prompt.contains("Engineer {remote}"));
        // Template braces around the output schema survive untouched.
        assert!(prompt.contains(r#""matching_score": <integer 0-100>"#));
        assert!(!prompt.contains("{resume_json}"));
        assert!(!prompt.contains("{job_json}"));
    }

    #[test]
    fn raw_text_preview_is_truncated() {
        let long = "x".repeat(2000);
        let result = AnalysisResult::unavailable(&long);
        assert!(result.reasoning.len() <= RAW_TEXT_PREVIEW + 3);
    }
}
