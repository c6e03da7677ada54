// src/functions/implementations/google_search.rs

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::FunctionError;
use crate::functions::types::{truncate_at, ChatFunction, FunctionDefinition};
use crate::settings::GoogleSearchConfig;
use crate::types::ChatEntry;

pub const NAME: &str = "google_search";

const DEFAULT_ENDPOINT: &str = "https://customsearch.googleapis.com/customsearch/v1";

#[derive(Deserialize)]
struct GoogleSearchArgs {
    query: String,
}

#[derive(Deserialize, Debug, Default)]
struct GoogleCustomSearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(default)]
    socialmediaposting: Vec<SocialMediaPosting>,
}

#[derive(Deserialize, Debug)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Deserialize, Debug)]
struct SocialMediaPosting {
    #[serde(default)]
    articlebody: String,
    #[serde(default)]
    url: String,
}

pub struct GoogleSearchFunction {
    client: reqwest::Client,
    config: GoogleSearchConfig,
    endpoint: String,
}

impl GoogleSearchFunction {
    pub fn new(client: reqwest::Client, config: GoogleSearchConfig) -> Self {
        Self {
            client,
            config,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn render(data: &GoogleCustomSearchResponse) -> String {
    let mut output = String::from("# Search results\n\n");
    for item in &data.items {
        output.push_str(&format!("## [{}]({})\n\n{}\n\n", item.title, item.link, item.snippet));
    }

    if !data.socialmediaposting.is_empty() {
        output.push_str("# Social media\n\n");
        let posts: Vec<String> = data
            .socialmediaposting
            .iter()
            .map(|p| format!("{}\n\n{}\n", p.articlebody, p.url))
            .collect();
        output.push_str(&posts.join("\n\n----\n\n"));
    }

    output
}

#[async_trait]
impl ChatFunction for GoogleSearchFunction {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: NAME.to_string(),
            description: "Search the web by google search.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Query for google search engine."
                    }
                },
                "required": ["query"]
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
        let args: GoogleSearchArgs = serde_json::from_str(arguments)?;

        let api_key = match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => {
                return Ok(ChatEntry::function(
                    NAME,
                    "Missing API key for google custom search",
                ))
            }
        };
        let search_engine_id = match self.config.search_engine_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Ok(ChatEntry::function(
                    NAME,
                    "Missing searchEngineId for google custom search",
                ))
            }
        };

        let url = format!(
            "{}?key={}&cx={}&q={}",
            self.endpoint,
            urlencoding::encode(api_key),
            urlencoding::encode(search_engine_id),
            urlencoding::encode(&args.query)
        );
        info!(query = %args.query, "Querying google custom search");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FunctionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data: GoogleCustomSearchResponse = response.json().await?;
        let content = render(&data);

        Ok(ChatEntry::function(NAME, truncate_at(&content, remaining_tokens)))
    }
}
