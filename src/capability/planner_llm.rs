use crate::error::{AppError, Result};
use crate::models::TransitionKind;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSelection {
    pub track_id: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub transition_kind: TransitionKind,
    pub t_trans_a: f64,
    pub x: f64,
    pub v_off: f64,
    pub rationale: String,
}

impl TransitionPlan {
    /// Default plan used when the planner is unavailable or its response
    /// is malformed.
    pub fn default_for(t_a: f64) -> Self {
        Self {
            transition_kind: TransitionKind::Blend,
            t_trans_a: t_a - 30.0,
            x: 10.0,
            v_off: 5.0,
            rationale: "default plan (planner unavailable or malformed response)".to_string(),
        }
    }
}

/// Returns structured JSON for track selection, transition parameters, and
/// speech scripts. The raw `chat` method is kept for the
/// query-suggestion helper used by `select_initial`/`plan_next_track`;
/// the specialized helpers return already-validated structs so validation
/// doesn't get scattered through the Planning Graph.
#[async_trait]
pub trait PlannerLlm: Send + Sync {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        reasoning_budget: u32,
    ) -> Result<ChatResponse>;

    async fn suggest_search_queries(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        reasoning_budget: u32,
    ) -> Result<Vec<String>>;

    async fn select_track(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        reasoning_budget: u32,
    ) -> Result<TrackSelection>;

    async fn plan_transition(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        reasoning_budget: u32,
    ) -> Result<TransitionPlan>;

    async fn write_script(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        reasoning_budget: u32,
    ) -> Result<Option<String>>;
}

/// Offline/unconfigured implementation. `select_track` and `plan_transition`
/// return `CapabilityUnavailable` so callers apply their own stage-local
/// fallback (first candidate / default transition plan); `write_script`
/// returns `None`, which is the non-error "render without voice" path.
pub struct NullPlannerLlm;

#[async_trait]
impl PlannerLlm for NullPlannerLlm {
    async fn chat(&self, _messages: Vec<ChatMessage>, _reasoning_budget: u32) -> Result<ChatResponse> {
        Err(AppError::CapabilityUnavailable("planner llm not configured".to_string()))
    }

    async fn suggest_search_queries(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _reasoning_budget: u32,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn select_track(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _reasoning_budget: u32,
    ) -> Result<TrackSelection> {
        Err(AppError::CapabilityUnavailable("planner llm not configured".to_string()))
    }

    async fn plan_transition(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _reasoning_budget: u32,
    ) -> Result<TransitionPlan> {
        Err(AppError::CapabilityUnavailable("planner llm not configured".to_string()))
    }

    async fn write_script(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _reasoning_budget: u32,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Planner LLM backed directly by the Anthropic Messages API, following the
/// same request/response shape as `AiCurator::call_claude`: a single-turn
/// user message, a markdown-fenced JSON reply stripped before parsing.
pub struct ClaudePlannerLlm {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudePlannerLlm {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("failed to build reqwest client"),
            api_key,
            model: "claude-sonnet-4-5-20250929".to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, prompt: &str, max_tokens: u32) -> Result<T> {
        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::CapabilityTransient(format!("planner call failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::CapabilityTransient(format!(
                "planner returned {status}: {text}"
            )));
        }

        let response_json: serde_json::Value = resp.json().await?;
        let text = response_json["content"][0]["text"]
            .as_str()
            .ok_or_else(|| AppError::PlanMalformed("planner response had no text content".to_string()))?;

        let cleaned = text
            .trim()
            .strip_prefix("```json")
            .or_else(|| text.trim().strip_prefix("```"))
            .unwrap_or(text.trim())
            .trim_end_matches("```")
            .trim();

        serde_json::from_str(cleaned)
            .map_err(|e| AppError::PlanMalformed(format!("planner JSON did not parse: {e}")))
    }
}

#[async_trait]
impl PlannerLlm for ClaudePlannerLlm {
    async fn chat(&self, messages: Vec<ChatMessage>, reasoning_budget: u32) -> Result<ChatResponse> {
        let prompt = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        #[derive(Deserialize)]
        struct Raw {
            content: String,
        }
        let raw: Raw = self.call(&prompt, reasoning_budget.max(256)).await?;
        Ok(ChatResponse {
            content: raw.content,
            model: self.model.clone(),
        })
    }

    async fn suggest_search_queries(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        reasoning_budget: u32,
    ) -> Result<Vec<String>> {
        let prompt = format!(
            "{system_prompt}\n\n{user_prompt}\n\nRespond with a JSON array of up to 5 search query strings."
        );

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Queries {
            Direct(Vec<String>),
            Wrapped { queries: Vec<String> },
        }

        let parsed: Queries = self.call(&prompt, reasoning_budget).await?;
        Ok(match parsed {
            Queries::Direct(v) => v,
            Queries::Wrapped { queries } => queries,
        })
    }

    async fn select_track(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        reasoning_budget: u32,
    ) -> Result<TrackSelection> {
        let prompt = format!(
            "{system_prompt}\n\n{user_prompt}\n\nRespond with JSON: {{\"track_id\": ..., \"rationale\": ...}}"
        );
        self.call(&prompt, reasoning_budget).await
    }

    async fn plan_transition(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        reasoning_budget: u32,
    ) -> Result<TransitionPlan> {
        let prompt = format!(
            "{system_prompt}\n\n{user_prompt}\n\nRespond with JSON: \
            {{\"transition_kind\": \"blend|bass_swap|filter_sweep|echo_out|vinyl_stop\", \
            \"t_trans_a\": <seconds>, \"x\": <seconds>, \"v_off\": <seconds>, \"rationale\": ...}}"
        );

        #[derive(Deserialize)]
        struct Raw {
            transition_kind: String,
            t_trans_a: f64,
            x: f64,
            v_off: f64,
            rationale: String,
        }

        let raw: Raw = self.call(&prompt, reasoning_budget).await?;
        Ok(TransitionPlan {
            transition_kind: TransitionKind::parse_or_blend(&raw.transition_kind),
            t_trans_a: raw.t_trans_a,
            x: raw.x,
            v_off: raw.v_off,
            rationale: raw.rationale,
        })
    }

    async fn write_script(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        reasoning_budget: u32,
    ) -> Result<Option<String>> {
        let prompt = format!(
            "{system_prompt}\n\n{user_prompt}\n\nRespond with JSON: {{\"script\": \"...\" }}. \
            The script must be at most 4 sentences."
        );

        #[derive(Deserialize)]
        struct Raw {
            script: Option<String>,
        }

        match self.call::<Raw>(&prompt, reasoning_budget).await {
            Ok(raw) => Ok(raw.script.filter(|s| !s.trim().is_empty())),
            // Synthesis scripts are optional — any planner failure here
            // degrades to "no voice" rather than failing the segment.
            Err(_) => Ok(None),
        }
    }
}
