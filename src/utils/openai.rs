// src/utils/openai.rs

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    config::OpenAiConfig,
    error::{malformed, GenErr},
    pipeline::{Character, CharacterGenerator},
    reels::REEL_COUNT,
    utils::retry::{retry, RetryPolicy},
};

const ROLE_PROMPT: &str = "You are a creator of artistic prompts for image generation.
You are generating a prompt to generate brainrot art.
You will receive: (1) an animal, (2) a fruit, and (3) an object.
Tasks:
1) Generate an Italian-sounding name (no real people) based on the animal, fruit and object. Keep it tasteful, 2-4 words max.
2) Write a vivid, specific image prompt that fuses the animal, fruit and object into a single coherent character with clear materials, textures, shapes, and composition. Describe how the animal and the fruit and object are merged. Avoid story; focus on visual description and style. Only include the character in the image. The background should be a simple color or gradient. The art style is oil painting.
3) Do NOT include brands or copyrighted style names. Keep it PG-13.
Return ONLY valid JSON with keys: italian_name, prompt.";

const JSON_INSTRUCTION: &str = r#"Return ONLY JSON like: {"italian_name":"...", "prompt":"..."}"#;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiGenerator {
    client: Client,
    key:    String,
    cfg:    OpenAiConfig,
    policy: RetryPolicy,
}

impl OpenAiGenerator {
    /// Every request is bounded by `cfg.timeout`, so a stalled upstream
    /// turns into a retryable error.
    pub fn new(cfg: OpenAiConfig, policy: RetryPolicy) -> Result<Self, GenErr> {
        let key = cfg
            .api_key
            .clone()
            .ok_or_else(|| GenErr::Unavailable("OPENAI_API_KEY is not set".into()))?;
        let client = Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self { client, key, cfg, policy })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.cfg.base_url.trim_end_matches('/'))
    }

    async fn name_and_prompt(&self, symbols: &[String; REEL_COUNT]) -> Result<(String, String), GenErr> {
        let [animal, fruit, object] = symbols;
        let body = json!({
            "model": self.cfg.chat_model,
            "messages": [
                { "role": "system", "content": ROLE_PROMPT },
                { "role": "user",   "content": format!("Animal: {animal}\nFruit: {fruit}\nObject: {object}\n") },
                { "role": "system", "content": JSON_INSTRUCTION },
            ],
            "temperature": 0.7,
        });

        #[derive(Deserialize)]
        struct Choice { message: Value }
        #[derive(Deserialize)]
        struct ApiResp { choices: Vec<Choice> }

        let resp = self.client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.key)
            .json(&body)
            .send()
            .await?;
        let api: ApiResp = ok_status(resp).await?.json().await.map_err(malformed)?;

        let content = api
            .choices
            .first()
            .and_then(|c| c.message.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| malformed("no message content"))?;
        parse_name_and_prompt(content)
    }

    async fn image(&self, prompt: &str) -> Result<bytes::Bytes, GenErr> {
        let body = json!({
            "model":   self.cfg.image_model,
            "prompt":  prompt,
            "size":    self.cfg.image_size,
            "quality": self.cfg.image_quality,
            "style":   self.cfg.image_style,
            "n": 1,
        });

        #[derive(Deserialize)]
        struct Datum { url: Option<String> }
        #[derive(Deserialize)]
        struct ApiResp { data: Vec<Datum> }

        let resp = self.client
            .post(self.url("images/generations"))
            .bearer_auth(&self.key)
            .json(&body)
            .send()
            .await?;
        let api: ApiResp = ok_status(resp).await?.json().await.map_err(malformed)?;
        let url = api
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| malformed("no image URL in response"))?;

        let img = self.client.get(&url).timeout(DOWNLOAD_TIMEOUT).send().await?;
        Ok(ok_status(img).await?.bytes().await?)
    }
}

impl CharacterGenerator for OpenAiGenerator {
    fn generate<'a>(&'a self, symbols: &'a [String; REEL_COUNT]) -> BoxFuture<'a, Result<Character, GenErr>> {
        Box::pin(async move {
            let (name, prompt) =
                retry(self.policy, "prompt generation", |_| self.name_and_prompt(symbols)).await?;
            info!(%name, "prompt ready, requesting image");
            let image = retry(self.policy, "image generation", |_| self.image(&prompt)).await?;
            Ok(Character { name, prompt, image })
        })
    }
}

/// Stands in when the client could not be set up; every round reports why.
pub struct Unconfigured(pub String);

impl CharacterGenerator for Unconfigured {
    fn generate<'a>(&'a self, _: &'a [String; REEL_COUNT]) -> BoxFuture<'a, Result<Character, GenErr>> {
        Box::pin(async move { Err(GenErr::Unavailable(self.0.clone())) })
    }
}

// 非 2xx 就把狀態與 body 帶回去
async fn ok_status(resp: Response) -> Result<Response, GenErr> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(GenErr::Status { status, body })
}

/// Cuts chatty model output down to the outermost `{...}`.
pub fn extract_json_object(content: &str) -> &str {
    let content = content.trim();
    if content.starts_with('{') {
        return content;
    }
    match (content.find('{'), content.rfind('}')) {
        (Some(i), Some(j)) if i < j => &content[i..=j],
        _ => content,
    }
}

pub fn parse_name_and_prompt(content: &str) -> Result<(String, String), GenErr> {
    #[derive(Deserialize)]
    struct Answer { italian_name: String, prompt: String }

    let a: Answer = serde_json::from_str(extract_json_object(content)).map_err(malformed)?;
    let (name, prompt) = (a.italian_name.trim(), a.prompt.trim());
    if name.is_empty() || prompt.is_empty() {
        return Err(malformed("missing italian_name or prompt"));
    }
    Ok((name.to_string(), prompt.to_string()))
}
