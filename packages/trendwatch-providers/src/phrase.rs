use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

const MAX_ATTEMPTS: usize = 3;

/// Asks a chat-completions model for one short phrase capturing the intent of `examples`.
///
/// Responses that are not the expected JSON object are retried up to three times.
pub async fn summarize(
	cfg: &trendwatch_config::PhraseProviderConfig,
	examples: &[String],
	max_words: u32,
) -> Result<String> {
	if examples.is_empty() {
		return Err(Error::InvalidConfig {
			message: "Phrase generation requires at least one example.".to_string(),
		});
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let messages = build_messages(examples, max_words);
	let mut last_err = None;

	for attempt in 1..=MAX_ATTEMPTS {
		let body = serde_json::json!({
			"model": cfg.model,
			"temperature": cfg.temperature,
			"response_format": { "type": "json_object" },
			"messages": messages,
		});
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		match parse_phrase_response(json, max_words) {
			Ok(phrase) => return Ok(phrase),
			Err(err) => {
				tracing::debug!(attempt, error = %err, "Phrase response rejected.");

				last_err = Some(err);
			},
		}
	}

	Err(last_err.unwrap_or_else(|| Error::InvalidResponse {
		message: "Phrase response is not valid JSON.".to_string(),
	}))
}

pub fn build_messages(examples: &[String], max_words: u32) -> Vec<Value> {
	let system = format!(
		"You are given a list of short user search queries that are variations on a theme. \
		 Produce a single, concise representative search phrase of no more than {max_words} \
		 words that captures the intent of the examples. Return only the phrase (no \
		 explanation). Your response must be in strict JSON format: {{\"query\": \"<phrase>\"}}."
	);
	let user = examples.iter().map(|text| format!("- {text}")).collect::<Vec<_>>().join("\n");

	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": user }),
	]
}

fn parse_phrase_response(json: Value, max_words: u32) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Phrase response is missing message content.".to_string(),
		})?;
	let parsed: Value = serde_json::from_str(content)?;
	let phrase = parsed.get("query").and_then(|v| v.as_str()).map(str::trim).unwrap_or_default();

	if phrase.is_empty() {
		return Err(Error::InvalidResponse {
			message: "Phrase response has no query field.".to_string(),
		});
	}

	// Models occasionally overshoot the word budget.
	Ok(phrase.split_whitespace().take(max_words as usize).collect::<Vec<_>>().join(" "))
}
