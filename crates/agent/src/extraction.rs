//! Bounded-context structured extraction against a language model.
//!
//! The invoker renders a prompt from the recent turns, the current draft and the ranked
//! candidates, asks the model for JSON matching [`output_schema`], and validates the reply
//! against the candidate set. Model failures never escape: after the single retry the caller
//! receives [`ExtractedOrderData::fallback`] with the attempt flagged for audit.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tera::{Context, Tera};
use thiserror::Error;
use tracing::{info, warn};

use chatorder_core::config::{ExtractionConfig, LlmConfig};
use chatorder_core::domain::conversation::ConversationTurn;
use chatorder_core::domain::intent::{ExtractedOrderData, UNRESOLVED_ITEM_FIELD};
use chatorder_core::domain::menu::{MenuCandidate, SynonymTarget};
use chatorder_core::domain::order::DraftOrderItem;
use chatorder_core::text::normalize_text;

use crate::llm::{LlmClient, LlmRequest};

const PROMPT_TEMPLATE_NAME: &str = "extraction_prompt";

const SYSTEM_PROMPT: &str = "You take food orders for a restaurant from chat messages. \
Only use menu item ids from the candidate list. If the customer mentions something you cannot \
match to a candidate, return it with menuItemId null and their wording in `unresolved`. \
Use action `add` for new items, `remove` to take a whole line off the draft order and `keep` \
to confirm a line is unaffected. Quantities are positive integers. Ask a short \
clarificationQuestion whenever the order is ambiguous and list what is unclear in \
missingFields. Answer with a single JSON document matching the schema.";

const PROMPT_TEMPLATE: &str = r#"Conversation so far (oldest first):
{% for turn in turns %}[{{ turn.role }}] {{ turn.text }}
{% endfor %}
Current draft order: {{ draft }}

Menu candidates:
{% for candidate in candidates %}- {{ candidate.kind }} `{{ candidate.id }}`: {{ candidate.name }} ({{ candidate.category }})
{% endfor %}{% if candidates | length == 0 %}(no candidates matched)
{% endif %}
Return the order changes requested in the latest customer message."#;

const CORRECTIVE_INSTRUCTION: &str = "Your previous answer was rejected";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("model output violates the extraction contract: {0}")]
    SchemaValidation(String),
    #[error("model call timed out after {0:?}")]
    UpstreamTimeout(Duration),
    #[error("model call failed: {0}")]
    Upstream(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub max_turns: usize,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self { max_turns: 6, timeout: Duration::from_secs(10), max_retries: 1 }
    }
}

impl ExtractionSettings {
    pub fn from_config(llm: &LlmConfig, extraction: &ExtractionConfig) -> Self {
        Self {
            max_turns: extraction.max_turns.max(1),
            timeout: Duration::from_secs(llm.timeout_secs),
            max_retries: llm.max_retries.min(1),
        }
    }
}

/// Result of one `extract` call, including the fallback path.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractionAttempt {
    pub data: ExtractedOrderData,
    pub attempts: u32,
    pub flagged_for_audit: bool,
    /// Last failure when the fallback was used.
    pub failure: Option<ExtractionError>,
}

#[derive(Serialize)]
struct PromptTurn<'a> {
    role: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
struct PromptCandidate<'a> {
    kind: &'static str,
    id: &'a str,
    name: &'a str,
    category: &'a str,
}

pub struct ExtractionInvoker {
    client: Arc<dyn LlmClient>,
    settings: ExtractionSettings,
    templates: Tera,
}

impl ExtractionInvoker {
    pub fn new(
        client: Arc<dyn LlmClient>,
        settings: ExtractionSettings,
    ) -> Result<Self, tera::Error> {
        let mut templates = Tera::default();
        templates.add_raw_template(PROMPT_TEMPLATE_NAME, PROMPT_TEMPLATE)?;
        Ok(Self { client, settings, templates })
    }

    pub fn settings(&self) -> ExtractionSettings {
        self.settings
    }

    pub async fn extract(
        &self,
        turns: &[ConversationTurn],
        draft: &[DraftOrderItem],
        candidates: &[MenuCandidate],
    ) -> ExtractionAttempt {
        let user_prompt = match self.render_prompt(turns, draft, candidates) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(
                    event_name = "extraction.prompt.render_failed",
                    error = %error,
                    "could not render extraction prompt"
                );
                return fallback_attempt(0, ExtractionError::Upstream(error.to_string()));
            }
        };

        let allowed = allowed_item_ids(candidates, draft);
        let max_attempts = 1 + self.settings.max_retries.min(1);
        let mut request = LlmRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: user_prompt.clone(),
            schema: output_schema(),
        };
        let mut attempts = 0;
        let mut last_failure = None;

        while attempts < max_attempts {
            attempts += 1;
            let failure = match self.call_model(&request).await {
                Ok(raw) => match validate_response(&raw, &allowed) {
                    Ok(data) => {
                        info!(
                            event_name = "extraction.completed",
                            attempts,
                            items = data.items.len(),
                            confidence = data.confidence,
                            "extraction validated"
                        );
                        return ExtractionAttempt {
                            data,
                            attempts,
                            flagged_for_audit: false,
                            failure: None,
                        };
                    }
                    Err(error) => error,
                },
                Err(error) => error,
            };

            warn!(
                event_name = "extraction.attempt_failed",
                attempt = attempts,
                error = %failure,
                "extraction attempt failed"
            );
            if let ExtractionError::SchemaValidation(reason) = &failure {
                request.user_prompt = format!(
                    "{user_prompt}\n\n{CORRECTIVE_INSTRUCTION}: {reason}. \
                     Reply again with only a JSON document that matches the schema exactly."
                );
            } else {
                request.user_prompt = user_prompt.clone();
            }
            last_failure = Some(failure);
        }

        let failure = last_failure
            .unwrap_or_else(|| ExtractionError::Upstream("no attempt was made".to_string()));
        warn!(
            event_name = "extraction.fallback",
            attempts,
            error = %failure,
            "extraction fell back to a clarification"
        );
        fallback_attempt(attempts, failure)
    }

    async fn call_model(&self, request: &LlmRequest) -> Result<String, ExtractionError> {
        match tokio::time::timeout(self.settings.timeout, self.client.complete(request)).await {
            Err(_) => Err(ExtractionError::UpstreamTimeout(self.settings.timeout)),
            Ok(Err(error)) if error.is_timeout() => {
                Err(ExtractionError::UpstreamTimeout(self.settings.timeout))
            }
            Ok(Err(error)) => Err(ExtractionError::Upstream(error.to_string())),
            Ok(Ok(raw)) => Ok(raw),
        }
    }

    fn render_prompt(
        &self,
        turns: &[ConversationTurn],
        draft: &[DraftOrderItem],
        candidates: &[MenuCandidate],
    ) -> Result<String, tera::Error> {
        let skip = turns.len().saturating_sub(self.settings.max_turns);
        let recent = turns[skip..]
            .iter()
            .map(|turn| PromptTurn { role: turn.role.label(), text: &turn.text })
            .collect::<Vec<_>>();
        let candidates = candidates
            .iter()
            .map(|candidate| PromptCandidate {
                kind: match candidate.target {
                    SynonymTarget::Item(_) => "item",
                    SynonymTarget::Option(_) => "option",
                },
                id: candidate.target.id(),
                name: &candidate.name,
                category: &candidate.category,
            })
            .collect::<Vec<_>>();
        let draft =
            serde_json::to_string(draft).map_err(|error| tera::Error::msg(error.to_string()))?;

        let mut context = Context::new();
        context.insert("turns", &recent);
        context.insert("draft", &draft);
        context.insert("candidates", &candidates);
        self.templates.render(PROMPT_TEMPLATE_NAME, &context)
    }
}

fn fallback_attempt(attempts: u32, failure: ExtractionError) -> ExtractionAttempt {
    ExtractionAttempt {
        data: ExtractedOrderData::fallback(),
        attempts,
        flagged_for_audit: true,
        failure: Some(failure),
    }
}

/// Items the model may reference: ranked candidates plus lines already on the draft.
fn allowed_item_ids(candidates: &[MenuCandidate], draft: &[DraftOrderItem]) -> BTreeSet<String> {
    candidates
        .iter()
        .filter_map(|candidate| candidate.menu_item_id().map(|id| id.0.clone()))
        .chain(draft.iter().map(|line| line.menu_item_id.0.clone()))
        .collect()
}

/// JSON schema the model must answer with.
pub fn output_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["items", "missingFields", "clarificationQuestion", "confidence"],
        "properties": {
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["menuItemId", "qty", "action", "itemConfidence"],
                    "properties": {
                        "menuItemId": {"type": ["string", "null"]},
                        "unresolved": {"type": ["string", "null"]},
                        "qty": {"type": "integer", "minimum": 1},
                        "optionSelections": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["groupName", "optionName"],
                                "properties": {
                                    "groupName": {"type": "string"},
                                    "optionName": {"type": "string"}
                                }
                            }
                        },
                        "extras": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["name", "qty"],
                                "properties": {
                                    "name": {"type": "string"},
                                    "qty": {"type": "integer", "minimum": 1}
                                }
                            }
                        },
                        "notes": {"type": ["string", "null"]},
                        "action": {"type": "string", "enum": ["add", "remove", "keep"]},
                        "itemConfidence": {"type": "number", "minimum": 0, "maximum": 1}
                    }
                }
            },
            "missingFields": {"type": "array", "items": {"type": "string"}},
            "clarificationQuestion": {"type": ["string", "null"]},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "orderNotes": {"type": ["string", "null"]}
        }
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn in_unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
}

/// Parses a raw model reply and checks it against the extraction contract and candidate set.
pub fn validate_response(
    raw: &str,
    allowed_item_ids: &BTreeSet<String>,
) -> Result<ExtractedOrderData, ExtractionError> {
    let mut data: ExtractedOrderData = serde_json::from_str(strip_code_fence(raw))
        .map_err(|error| ExtractionError::SchemaValidation(error.to_string()))?;

    if !in_unit_interval(data.confidence) {
        return Err(ExtractionError::SchemaValidation(format!(
            "confidence {} is outside [0, 1]",
            data.confidence
        )));
    }

    let mut has_unresolved = false;
    for (position, item) in data.items.iter_mut().enumerate() {
        if !in_unit_interval(item.item_confidence) {
            return Err(ExtractionError::SchemaValidation(format!(
                "items[{position}].itemConfidence {} is outside [0, 1]",
                item.item_confidence
            )));
        }
        if item.qty == 0 {
            return Err(ExtractionError::SchemaValidation(format!(
                "items[{position}].qty must be at least 1"
            )));
        }
        if item.extras.iter().any(|extra| extra.qty == 0) {
            return Err(ExtractionError::SchemaValidation(format!(
                "items[{position}] has an extra with qty 0"
            )));
        }

        match &item.menu_item_id {
            Some(id) if !allowed_item_ids.contains(&id.0) => {
                return Err(ExtractionError::SchemaValidation(format!(
                    "items[{position}].menuItemId `{}` is neither a candidate nor on the draft",
                    id.0
                )));
            }
            Some(_) => {}
            None => {
                item.unresolved = non_blank(item.unresolved.take());
                if item.unresolved.is_none() {
                    return Err(ExtractionError::SchemaValidation(format!(
                        "items[{position}] has no menuItemId and no unresolved wording"
                    )));
                }
                has_unresolved = true;
            }
        }

        let mut groups = BTreeSet::new();
        for selection in &item.option_selections {
            if !groups.insert(normalize_text(&selection.group_name)) {
                return Err(ExtractionError::SchemaValidation(format!(
                    "items[{position}] selects option group `{}` more than once",
                    selection.group_name
                )));
            }
        }
        item.notes = non_blank(item.notes.take());
    }

    data.clarification_question = non_blank(data.clarification_question.take());
    data.order_notes = non_blank(data.order_notes.take());

    let mut missing = Vec::with_capacity(data.missing_fields.len() + 1);
    for field in data.missing_fields.drain(..) {
        let field = field.trim().to_string();
        if !field.is_empty() && !missing.contains(&field) {
            missing.push(field);
        }
    }
    if has_unresolved && !missing.iter().any(|field| field == UNRESOLVED_ITEM_FIELD) {
        missing.push(UNRESOLVED_ITEM_FIELD.to_string());
    }
    data.missing_fields = missing;

    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;

    use chatorder_core::domain::conversation::ConversationTurn;
    use chatorder_core::domain::intent::{ItemAction, UNRESOLVED_FIELD, UNRESOLVED_ITEM_FIELD};
    use chatorder_core::domain::menu::{MenuCandidate, MenuItemId, SynonymTarget};
    use chatorder_core::domain::order::DraftOrderItem;

    use super::{
        strip_code_fence, validate_response, ExtractionError, ExtractionInvoker,
        ExtractionSettings, CORRECTIVE_INSTRUCTION,
    };
    use crate::llm::{LlmClient, LlmError, LlmRequest};

    enum Reply {
        Text(String),
        Fail(LlmError),
        Hang,
    }

    #[derive(Default)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedClient {
        fn with(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), requests: Mutex::default() })
        }

        fn requests(&self) -> Vec<LlmRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
            self.requests.lock().expect("requests lock").push(request.clone());
            let reply = self.replies.lock().expect("replies lock").pop_front();
            match reply {
                Some(Reply::Text(text)) => Ok(text),
                Some(Reply::Fail(error)) => Err(error),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(LlmError::InvalidResponse("unreachable".to_string()))
                }
                None => Err(LlmError::InvalidResponse("script exhausted".to_string())),
            }
        }
    }

    fn candidate(id: &str, name: &str) -> MenuCandidate {
        MenuCandidate {
            target: SynonymTarget::Item(MenuItemId(id.to_string())),
            name: name.to_string(),
            category: "Kebaplar".to_string(),
            base_price: Decimal::new(32_000, 2),
            synonyms_matched: vec![id.to_string()],
            score: 1.0,
            winning_phrase_tokens: 1,
        }
    }

    fn allowed() -> BTreeSet<String> {
        ["kebap".to_string(), "ayran".to_string()].into_iter().collect()
    }

    fn valid_reply() -> String {
        json!({
            "items": [{"menuItemId": "kebap", "qty": 1, "action": "add", "itemConfidence": 0.9}],
            "missingFields": [],
            "clarificationQuestion": null,
            "confidence": 0.9
        })
        .to_string()
    }

    fn invoker(client: Arc<ScriptedClient>, timeout: Duration) -> ExtractionInvoker {
        let settings = ExtractionSettings { max_turns: 2, timeout, max_retries: 1 };
        ExtractionInvoker::new(client, settings).expect("template compiles")
    }

    #[test]
    fn strips_markdown_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn rejects_ids_outside_the_candidate_set() {
        let raw = json!({
            "items": [{"menuItemId": "lahmacun", "qty": 1, "action": "add", "itemConfidence": 0.8}],
            "confidence": 0.8
        })
        .to_string();

        let error = validate_response(&raw, &allowed()).expect_err("hallucinated id");
        assert!(matches!(error, ExtractionError::SchemaValidation(message) if message.contains("lahmacun")));
    }

    #[test]
    fn rejects_out_of_range_values_and_repeated_groups() {
        let zero_qty = json!({
            "items": [{"menuItemId": "kebap", "qty": 0, "action": "add", "itemConfidence": 0.8}],
            "confidence": 0.8
        });
        assert!(validate_response(&zero_qty.to_string(), &allowed()).is_err());

        let confidence = json!({"items": [], "confidence": 1.4});
        assert!(validate_response(&confidence.to_string(), &allowed()).is_err());

        let repeated = json!({
            "items": [{
                "menuItemId": "kebap", "qty": 1, "action": "add", "itemConfidence": 0.8,
                "optionSelections": [
                    {"groupName": "Porsiyon", "optionName": "Tam"},
                    {"groupName": "porsiyon", "optionName": "Buçuk"}
                ]
            }],
            "confidence": 0.8
        });
        assert!(validate_response(&repeated.to_string(), &allowed()).is_err());
    }

    #[test]
    fn unresolved_items_force_a_missing_field_and_blank_questions_are_dropped() {
        let raw = json!({
            "items": [
                {"menuItemId": null, "unresolved": " mantı ", "qty": 1, "action": "add", "itemConfidence": 0.3},
                {"menuItemId": "ayran", "qty": 1, "action": "keep", "itemConfidence": 0.9}
            ],
            "missingFields": [],
            "clarificationQuestion": "   ",
            "confidence": 0.7
        })
        .to_string();

        let data = validate_response(&raw, &allowed()).expect("valid");
        assert_eq!(data.items[0].unresolved.as_deref(), Some("mantı"));
        assert_eq!(data.items[1].action, ItemAction::Keep);
        assert_eq!(data.missing_fields, vec![UNRESOLVED_ITEM_FIELD.to_string()]);
        assert_eq!(data.clarification_question, None);
    }

    #[tokio::test]
    async fn valid_reply_is_accepted_on_first_attempt() {
        let client = ScriptedClient::with(vec![Reply::Text(valid_reply())]);
        let invoker = invoker(client.clone(), Duration::from_secs(10));
        let turns = vec![
            ConversationTurn::customer("m-1", "merhaba"),
            ConversationTurn::customer("m-2", "menü var mı"),
            ConversationTurn::customer("m-3", "bir adana kebap"),
        ];

        let attempt = invoker
            .extract(&turns, &[DraftOrderItem::new("ayran", 1)], &[candidate("kebap", "Adana Kebap")])
            .await;

        assert_eq!(attempt.attempts, 1);
        assert!(!attempt.flagged_for_audit);
        assert_eq!(attempt.data.items[0].menu_item_id, Some(MenuItemId("kebap".to_string())));

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].user_prompt;
        assert!(!prompt.contains("merhaba"), "only the last two turns are sent");
        assert!(prompt.contains("[customer] bir adana kebap"));
        assert!(prompt.contains("item `kebap`: Adana Kebap (Kebaplar)"));
        assert!(prompt.contains("\"menuItemId\":\"ayran\""));
    }

    #[tokio::test]
    async fn schema_failure_retries_once_with_a_corrective_instruction() {
        let client = ScriptedClient::with(vec![
            Reply::Text("sure, one kebab".to_string()),
            Reply::Text(valid_reply()),
        ]);
        let invoker = invoker(client.clone(), Duration::from_secs(10));

        let attempt = invoker
            .extract(&[ConversationTurn::customer("m-1", "kebap")], &[], &[candidate("kebap", "Adana Kebap")])
            .await;

        assert_eq!(attempt.attempts, 2);
        assert!(!attempt.flagged_for_audit);
        let requests = client.requests();
        assert!(!requests[0].user_prompt.contains(CORRECTIVE_INSTRUCTION));
        assert!(requests[1].user_prompt.contains(CORRECTIVE_INSTRUCTION));
    }

    #[tokio::test]
    async fn two_failures_fall_back_to_a_flagged_clarification() {
        let client = ScriptedClient::with(vec![
            Reply::Text("{".to_string()),
            Reply::Fail(LlmError::Api { status: 500, message: "boom".to_string() }),
            Reply::Text(valid_reply()),
        ]);
        let invoker = invoker(client.clone(), Duration::from_secs(10));

        let attempt = invoker
            .extract(&[ConversationTurn::customer("m-1", "kebap")], &[], &[candidate("kebap", "Adana Kebap")])
            .await;

        assert_eq!(attempt.attempts, 2);
        assert!(attempt.flagged_for_audit);
        assert!(attempt.data.items.is_empty());
        assert_eq!(attempt.data.missing_fields, vec![UNRESOLVED_FIELD.to_string()]);
        assert!(matches!(attempt.failure, Some(ExtractionError::Upstream(_))));
        assert_eq!(client.requests().len(), 2, "retries are bounded");
    }

    #[tokio::test]
    async fn timeouts_behave_like_validation_failures() {
        let client = ScriptedClient::with(vec![Reply::Hang, Reply::Hang]);
        let invoker = invoker(client.clone(), Duration::from_millis(20));

        let attempt = invoker
            .extract(&[ConversationTurn::customer("m-1", "kebap")], &[], &[candidate("kebap", "Adana Kebap")])
            .await;

        assert!(attempt.flagged_for_audit);
        assert_eq!(attempt.failure, Some(ExtractionError::UpstreamTimeout(Duration::from_millis(20))));
        assert_eq!(client.requests().len(), 2);
    }
}
