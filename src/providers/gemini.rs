//! Google Gemini HTTP provider.
//!
//! Generation uses `streamGenerateContent` with server-sent events; each SSE
//! `data:` block is one JSON chunk whose candidate parts carry text deltas.
//! Transcription uses a single `generateContent` call with inline audio.

use async_trait::async_trait;
use base64::Engine;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::provider::{GenerationRequest, Generator, ProviderError, Result, Transcriber};
use crate::config::Gemini;

const TRANSCRIBE_INSTRUCTION: &str = "Transcribe este audio exactamente tal cual se escucha. \
No añadas explicaciones ni texto adicional. Si no se entiende, di '(Audio ininteligible)'.";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(config: &Gemini, timeout: Duration) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ProviderError::NotAvailable("GEMINI_API_KEY not set".to_string()));
        }

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: config.api_key.clone(),
            base_url: format!(
                "{}/{}",
                config.base_url.trim_end_matches('/'),
                config.api_version
            ),
            model: config.model.clone(),
        })
    }

    fn model_url(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }
}

/// Build the `streamGenerateContent` request body.
fn build_generate_body(request: &GenerationRequest) -> Value {
    let contents: Vec<Value> = request
        .turns
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role.to_string(),
                "parts": [{ "text": turn.text }],
            })
        })
        .collect();

    let mut body = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": request.params.temperature,
            "topP": request.params.top_p,
            "maxOutputTokens": request.params.max_output_tokens,
        },
    });

    if !request.system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": request.system }] });
    }

    body
}

/// Join the text parts of the first candidate.
fn extract_text(chunk: &Value) -> Option<String> {
    let parts = chunk["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl Generator for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn stream(&self, request: GenerationRequest) -> BoxStream<'_, Result<String>> {
        Box::pin(async_stream::stream! {
            let body = build_generate_body(&request);
            let url = format!("{}?alt=sse", self.model_url("streamGenerateContent"));

            let response = match self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    yield Err(ProviderError::HttpError(e));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                if status.as_u16() == 400 || status.as_u16() == 404 {
                    tracing::warn!(
                        model = %self.model,
                        "Check that the model exists and the API key may use it"
                    );
                }
                yield Err(ProviderError::ApiError(format!("HTTP {}: {}", status, text)));
                return;
            }

            let mut events = response.bytes_stream().eventsource();

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(EventStreamError::Transport(e)) => {
                        yield Err(ProviderError::HttpError(e));
                        return;
                    }
                    Err(e) => {
                        yield Err(ProviderError::ParseError(format!("SSE stream error: {}", e)));
                        return;
                    }
                };
                if event.data.trim().is_empty() {
                    continue;
                }

                let chunk: Value = match serde_json::from_str(&event.data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!("Skipping malformed SSE chunk: {}", e);
                        continue;
                    }
                };
                if let Some(err) = chunk.get("error") {
                    yield Err(ProviderError::ApiError(err.to_string()));
                    return;
                }
                if let Some(text) = extract_text(&chunk) {
                    yield Ok(text);
                }
            }
        })
    }
}

#[async_trait]
impl Transcriber for GeminiProvider {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String> {
        let data = base64::engine::general_purpose::STANDARD.encode(audio);
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "inlineData": { "mimeType": mime_type, "data": data } },
                    { "text": TRANSCRIBE_INSTRUCTION },
                ],
            }],
        });

        let response = self
            .client
            .post(self.model_url("generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(format!("HTTP {}: {}", status, text)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        extract_text(&value)
            .map(|t| t.trim().to_string())
            .ok_or_else(|| ProviderError::other("transcription response had no text"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::Role;
    use std::io::Write;
    use crate::providers::{ChatTurn, GenerationParams, UNINTELLIGIBLE_SENTINEL};

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "Be brief.".to_string(),
            turns: vec![
                ChatTurn {
                    role: Role::User,
                    text: "hola".to_string(),
                },
                ChatTurn {
                    role: Role::Model,
                    text: "¡Hola!".to_string(),
                },
                ChatTurn {
                    role: Role::User,
                    text: "hours?".to_string(),
                },
            ],
            params: GenerationParams::default(),
        }
    }

    fn provider_for(url: &str) -> GeminiProvider {
        let config = Gemini {
            api_key: "key".to_string(),
            model: "gemini-test".to_string(),
            api_version: "v1beta".to_string(),
            base_url: url.to_string(),
        };
        GeminiProvider::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn body_maps_roles_and_params() {
        let body = build_generate_body(&request());
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "hours?");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 600);
    }

    #[test]
    fn transcription_prompt_names_the_sentinel() {
        assert!(TRANSCRIBE_INSTRUCTION.contains(UNINTELLIGIBLE_SENTINEL));
    }

    #[test]
    fn extract_text_ignores_chunks_without_text() {
        let chunk = json!({ "candidates": [{ "finishReason": "STOP" }] });
        assert!(extract_text(&chunk).is_none());
    }

    #[test]
    fn missing_key_is_not_available() {
        let config = Gemini {
            api_key: String::new(),
            model: "m".to_string(),
            api_version: "v1beta".to_string(),
            base_url: "http://localhost".to_string(),
        };
        let err = GeminiProvider::new(&config, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ProviderError::NotAvailable(_)));
    }

    #[tokio::test]
    async fn stream_yields_fragments_in_order() {
        let mut server = mockito::Server::new_async().await;
        let sse = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Abrimos \"}]}}]}\r\n\r\n\
                   data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"a las 8.\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n";
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-test:streamGenerateContent")
            .match_query(mockito::Matcher::UrlEncoded("alt".into(), "sse".into()))
            .match_header("x-goog-api-key", "key")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse)
            .create_async()
            .await;

        let provider = provider_for(&server.url());
        let fragments: Vec<String> = provider
            .stream(request())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["Abrimos ", "a las 8."]);
    }

    #[tokio::test]
    async fn stream_reassembles_characters_split_across_chunks() {
        let mut server = mockito::Server::new_async().await;
        let event = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"¿Qué?\"}]}}]}\n\n";
        let split = event.find('¿').unwrap() + 1;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-test:streamGenerateContent")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_chunked_body(move |w| {
                w.write_all(&event.as_bytes()[..split])?;
                w.flush()?;
                w.write_all(&event.as_bytes()[split..])
            })
            .create_async()
            .await;

        let provider = provider_for(&server.url());
        let fragments: Vec<String> = provider
            .stream(request())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["¿Qué?"]);
    }

    #[tokio::test]
    async fn stream_stops_on_error_event() {
        let mut server = mockito::Server::new_async().await;
        let sse = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hola\"}]}}]}\r\n\r\n\
                   data: {\"error\":{\"code\":500,\"message\":\"internal\"}}\r\n\r\n\
                   data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"never\"}]}}]}\r\n\r\n";
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-test:streamGenerateContent")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse)
            .create_async()
            .await;

        let provider = provider_for(&server.url());
        let results: Vec<Result<String>> = provider.stream(request()).collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_deref().unwrap(), "Hola");
        assert!(matches!(
            &results[1],
            Err(ProviderError::ApiError(msg)) if msg.contains("internal")
        ));
    }

    #[tokio::test]
    async fn stream_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-test:streamGenerateContent")
            .match_query(mockito::Matcher::Any)
            .with_status(429)
            .with_body("quota")
            .create_async()
            .await;

        let provider = provider_for(&server.url());
        let results: Vec<Result<String>> = provider.stream(request()).collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(&results[0], Err(ProviderError::ApiError(msg)) if msg.contains("quota")));
    }

    #[tokio::test]
    async fn transcribe_returns_trimmed_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .match_body(mockito::Matcher::Regex("inlineData".to_string()))
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"  a qué hora abren \n"}]}}]}"#)
            .create_async()
            .await;

        let provider = provider_for(&server.url());
        let text = provider.transcribe(b"ogg", "audio/ogg").await.unwrap();
        assert_eq!(text, "a qué hora abren");
    }
}
