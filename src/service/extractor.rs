use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::models::ReceiptSummary;
use crate::service::sanitizer;

/// 固定的识别指令, 约定返回的 JSON 结构
pub const RECEIPT_PROMPT: &str = r#"Analyze this receipt image and extract ALL details. Return ONLY a valid JSON object with this structure:

{
  "merchant": {
    "name": "store name or null if not found",
    "address": "address or null if not found",
    "phone": "phone number or null if not found"
  },
  "transaction": {
    "date": "date or null",
    "time": "time or null",
    "receipt_number": "receipt number or null",
    "cashier": "cashier name or null"
  },
  "items": [
    {
      "name": "item name",
      "quantity": 1,
      "price": 0.00,
      "total": 0.00
    }
  ],
  "totals": {
    "subtotal": 0.00,
    "tax_amount": 0.00,
    "tax_rate": 0.00,
    "total": 0.00,
    "discount": 0.00
  },
  "payment": {
    "method": "payment method or null",
    "amount_paid": 0.00,
    "change_given": 0.00
  },
  "additional_info": "any other relevant information"
}

If any information is not available, use null. Return ONLY the JSON, no other text."#;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to analyze receipt: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to analyze receipt: API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response from Gemini API")]
    InvalidResponse,

    #[error("Receipt analysis timed out after {0}s")]
    Timeout(u64),
}

/// 识别服务接口: 输入图片字节与 MIME 类型, 返回模型原始文本
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    async fn extract(&self, image: &[u8], mime_type: &str) -> Result<String, ExtractError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Gemini generateContent 客户端
pub struct GeminiExtractor {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiExtractor {
    pub fn new(cfg: &ExtractionConfig) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl ReceiptExtractor for GeminiExtractor {
    async fn extract(&self, image: &[u8], mime_type: &str) -> Result<String, ExtractError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: RECEIPT_PROMPT },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type,
                            data: STANDARD.encode(image),
                        },
                    },
                ],
            }],
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "Gemini API error: {}", body);
            return Err(ExtractError::Api { status, body });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed.first_text().ok_or(ExtractError::InvalidResponse)?;
        debug!("Raw Gemini response: {}", text);
        Ok(text)
    }
}

/// 去掉文本中所有 ```json / ``` 标记
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// 模型文本 -> 清洗后的摘要; 解析失败时降级为保留原文的摘要
pub fn parse_summary(text: &str) -> ReceiptSummary {
    let body = strip_code_fences(text);
    match serde_json::from_str::<Value>(&body) {
        Ok(value @ Value::Object(_)) => ReceiptSummary::from_value(sanitizer::clean(&value)),
        _ => {
            warn!("Could not parse JSON, using raw response");
            ReceiptSummary::unparsed(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json_is_parsed_and_cleaned() {
        let text = "```json\n{\"merchant\": {\"name\": \"Cafe\", \"phone\": null}, \"totals\": {\"total\": 4.2}}\n```";
        let summary = parse_summary(text);
        assert_eq!(summary.merchant_name().as_deref(), Some("Cafe"));
        assert!(summary.merchant().unwrap().phone.is_none());
        assert_eq!(summary.total_amount(), 4.2);
        assert!(summary.error().is_none());
    }

    #[test]
    fn summary_is_the_cleaned_payload() {
        let payload = json!({
            "merchant": {"name": "Shop", "website": "shop.example", "phone": null},
            "totals": {"total": 12.5, "currency": "USD"},
            "items": [{"name": "Tea", "sku": "T-1", "price": 2}],
            "payment": "cash",
            "loyalty": {"points": 40, "tier": ""}
        });
        let text = format!("```json\n{}\n```", payload);
        let summary = parse_summary(&text);

        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            sanitizer::clean(&payload)
        );
        assert_eq!(summary.merchant_name().as_deref(), Some("Shop"));
        assert_eq!(summary.total_amount(), 12.5);
    }

    #[test]
    fn bare_fences_are_stripped() {
        let summary = parse_summary("```\n{\"additional_info\": \"thanks\"}\n```");
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({"additional_info": "thanks"})
        );
    }

    #[test]
    fn unparseable_text_degrades() {
        let summary = parse_summary("Sorry, I cannot read this receipt.");
        assert_eq!(
            summary.raw_response(),
            Some("Sorry, I cannot read this receipt.")
        );
        assert_eq!(
            summary.error(),
            Some("Could not parse AI response as JSON")
        );
    }

    #[test]
    fn non_object_json_degrades() {
        let summary = parse_summary("[1, 2, 3]");
        assert!(summary.raw_response().is_some());
    }

    #[test]
    fn strip_code_fences_variants() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
        assert_eq!(strip_code_fences("```{}```"), "{}");
    }

    #[test]
    fn request_body_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "prompt" },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: STANDARD.encode(b"img"),
                        },
                    },
                ],
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"contents": [{"parts": [
                {"text": "prompt"},
                {"inline_data": {"mime_type": "image/png", "data": "aW1n"}}
            ]}]})
        );
    }

    #[test]
    fn response_text_is_first_candidate_part() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{}"}, {"text": "ignored"}]}}]
        }))
        .unwrap();
        assert_eq!(response.first_text().as_deref(), Some("{}"));

        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.first_text().is_none());
    }
}
