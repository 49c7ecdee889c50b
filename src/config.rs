use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::{error::{config, AppResult}, reels::REEL_COUNT};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr:    String,
    pub frontend_dir: PathBuf,
    pub openai:       OpenAiConfig,
    pub retries:      u32,
    pub gpio:         GpioConfig,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key:       Option<String>,
    pub base_url:      String,
    pub chat_model:    String,
    pub image_model:   String,
    pub image_size:    String,
    pub image_quality: String,
    pub image_style:   String,
    /// Per-request bound for the chat and image calls.
    pub timeout:       Duration,
}

#[derive(Debug, Clone)]
pub struct GpioConfig {
    pub enabled:  bool,
    /// BCM pin for each reel, index = reel id.
    pub pins:     [u32; REEL_COUNT],
    pub debounce: Duration,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let openai = OpenAiConfig {
            api_key:       env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            base_url:      var_or("OPENAI_API_BASE", "https://api.openai.com/v1"),
            chat_model:    var_or("CHAT_MODEL", "gpt-4o-mini"),
            image_model:   var_or("IMAGE_MODEL", "dall-e-3"),
            image_size:    var_or("IMAGE_SIZE", "1024x1024"),
            image_quality: var_or("IMAGE_QUALITY", "standard"),
            image_style:   var_or("IMAGE_STYLE", "vivid"),
            timeout:       Duration::from_secs(parsed_or("OPENAI_TIMEOUT_SECS", 120)?),
        };
        let gpio = GpioConfig {
            enabled:  parsed_or("GPIO_ENABLED", true)?,
            pins:     parse_pins(&var_or("GPIO_PINS", "23,27,22"))?,
            debounce: Duration::from_millis(parsed_or("GPIO_DEBOUNCE_MS", 100)?),
        };
        let retries: u32 = parsed_or("GEN_RETRIES", 3)?;
        if retries == 0 {
            return Err(config("GEN_RETRIES must be at least 1"));
        }

        Ok(Self {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8000"),
            frontend_dir: PathBuf::from(var_or("FRONTEND_DIR", "frontend")),
            openai,
            retries,
            gpio,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}

fn parsed_or<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e| config(format!("{key}={raw}: {e}"))),
        Err(_)  => Ok(default),
    }
}

fn parse_pins(raw: &str) -> AppResult<[u32; REEL_COUNT]> {
    let pins = raw
        .split(',')
        .map(|p| p.trim().parse::<u32>().map_err(|e| config(format!("GPIO_PINS: {e}"))))
        .collect::<AppResult<Vec<_>>>()?;
    pins.try_into()
        .map_err(|v: Vec<u32>| config(format!("GPIO_PINS needs {REEL_COUNT} pins, got {}", v.len())))
}
