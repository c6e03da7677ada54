// src/functions/implementations/image_gen.rs

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::info;

use crate::error::FunctionError;
use crate::functions::types::{ChatFunction, FunctionDefinition};
use crate::types::{ChatEntry, ImageGenerationRequest, ImageGenerationResponse};

pub const NAME: &str = "image_gen";

const MAX_IMAGES: u32 = 10;

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ImageSize {
    #[serde(rename = "256x256")]
    Small,
    #[serde(rename = "512x512")]
    Medium,
    #[default]
    #[serde(rename = "1024x1024")]
    Large,
}

impl ImageSize {
    fn as_str(self) -> &'static str {
        match self {
            ImageSize::Small => "256x256",
            ImageSize::Medium => "512x512",
            ImageSize::Large => "1024x1024",
        }
    }
}

#[derive(Deserialize)]
struct ImageGenArgs {
    prompt: String,
    #[serde(default, deserialize_with = "image_count")]
    n: Option<u32>,
    #[serde(default)]
    size: Option<ImageSize>,
}

fn image_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let n = Option::<u32>::deserialize(deserializer)?;
    match n {
        Some(n) if !(1..=MAX_IMAGES).contains(&n) => Err(serde::de::Error::custom(format!(
            "n must be between 1 and {}, got {}",
            MAX_IMAGES, n
        ))),
        n => Ok(n),
    }
}

/// Stores generated images under `<data>/features/imagegen`.
pub struct ImageRepository {
    directory: PathBuf,
}

impl ImageRepository {
    pub fn new(data_directory: &Path) -> Self {
        Self {
            directory: data_directory.join("features/imagegen"),
        }
    }

    /// Write `bytes` to a fresh file and return its name relative to the image directory.
    pub fn save(&self, bytes: &[u8]) -> Result<String, FunctionError> {
        fs::create_dir_all(&self.directory)?;
        let name = Self::file_name();
        fs::write(self.directory.join(&name), bytes)?;
        Ok(name)
    }

    pub fn resolve(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    fn file_name() -> String {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(4).collect();
        format!("{}-{}.jpg", stamp, suffix)
    }
}

pub struct ImageGenFunction {
    client: reqwest::Client,
    api_base_url: String,
    api_token: Option<String>,
    images: ImageRepository,
}

impl ImageGenFunction {
    pub fn new(
        client: reqwest::Client,
        api_base_url: impl Into<String>,
        api_token: Option<String>,
        images: ImageRepository,
    ) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into(),
            api_token,
            images,
        }
    }
}

#[async_trait]
impl ChatFunction for ImageGenFunction {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: NAME.to_string(),
            description: "Generate image using OpenAI's API.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "Prompt to generate image."
                    },
                    "size": {
                        "type": "string",
                        "enum": [
                            ImageSize::Small.as_str(),
                            ImageSize::Medium.as_str(),
                            ImageSize::Large.as_str()
                        ],
                        "description": "Size of images."
                    },
                    "n": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_IMAGES,
                        "description": "Number of images."
                    }
                },
                "required": ["prompt"]
            }),
        }
    }

    fn name(&self) -> &str {
        NAME
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn invoke(&self, arguments: &str, _: i64) -> Result<ChatEntry, FunctionError> {
        let args: ImageGenArgs = serde_json::from_str(arguments)?;
        let token = self
            .api_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(FunctionError::MissingConfig("OpenAI token is not available"))?;

        let request = ImageGenerationRequest {
            prompt: args.prompt,
            n: args.n.unwrap_or(1),
            size: args.size.unwrap_or_default().as_str().to_string(),
            response_format: "b64_json".to_string(),
        };
        info!(n = request.n, size = %request.size, "Generating images");

        let response = self
            .client
            .post(format!(
                "{}/images/generations",
                self.api_base_url.trim_end_matches('/')
            ))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FunctionError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let body: ImageGenerationResponse = response.json().await?;

        let mut saved = Vec::with_capacity(body.data.len());
        for image in &body.data {
            let encoded = image
                .b64_json
                .as_deref()
                .ok_or_else(|| FunctionError::Decode("image response without b64_json".to_string()))?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| FunctionError::Decode(e.to_string()))?;
            saved.push(self.images.save(&bytes)?);
        }

        Ok(ChatEntry::function(NAME, serde_json::to_string(&saved)?))
    }
}
