// src/functions/implementations/fetch_url.rs

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{http_error_kind, FunctionError};
use crate::functions::types::{truncate_at, ChatFunction, FunctionDefinition};
use crate::types::ChatEntry;

pub const NAME: &str = "fetch_url";

const MAX_LINE_WIDTH: usize = 120;

#[derive(Deserialize)]
struct FetchUrlArgs {
    url: String,
}

pub struct FetchUrlFunction {
    client: reqwest::Client,
}

impl FetchUrlFunction {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        debug!(url, content_type = %content_type, "fetched url");

        if content_type.contains("text/html") {
            let html = response.text().await?;
            Ok(html_to_text(&html))
        } else if content_type.contains("text") {
            response.text().await
        } else {
            Ok(format!("Unsupported content type: {}", content_type))
        }
    }
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), MAX_LINE_WIDTH).unwrap_or_else(|_| html.to_string())
}

#[async_trait]
impl ChatFunction for FetchUrlFunction {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: NAME.to_string(),
            description: "Fetch content by URL".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "format": "uri",
                        "description": "URL to fetch"
                    }
                },
                "required": ["url"]
            }),
        }
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn invoke(
        &self,
        arguments: &str,
        remaining_tokens: i64,
    ) -> Result<ChatEntry, FunctionError> {
        // Every failure becomes content so the model can react to it.
        let content = match serde_json::from_str::<FetchUrlArgs>(arguments) {
            Ok(args) => {
                info!(url = %args.url, "fetch_url");
                match self.fetch(&args.url).await {
                    Ok(body) => body,
                    Err(e) => format!("Failed to fetch content: {} {}", http_error_kind(&e), e),
                }
            }
            Err(e) => format!("Failed to fetch content: InvalidArguments {}", e),
        };

        Ok(ChatEntry::function(NAME, truncate_at(&content, remaining_tokens)))
    }
}
