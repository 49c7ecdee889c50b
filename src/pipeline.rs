//! Background generation for a completed round: ask the generator for a
//! character, store the image, append to the result log, tell the viewers.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use chrono::Local;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{error::GenErr, hub::Hub, protocol::ServerMsg, reels::REEL_COUNT};

pub const URL_PREFIX: &str = "/static/generated";

#[derive(Debug)]
pub struct Character {
    pub name:   String,
    pub prompt: String,
    pub image:  Bytes,
}

/// The external two-stage service. Implementations own their retry policy.
pub trait CharacterGenerator: Send + Sync {
    fn generate<'a>(&'a self, symbols: &'a [String; REEL_COUNT]) -> BoxFuture<'a, Result<Character, GenErr>>;
}

/* ------------ 圖片存放 ------------ */
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    /// Writes the image and returns its path plus public URL. Never
    /// overwrites an existing file.
    pub async fn save(&self, name: &str, image: &[u8]) -> std::io::Result<(PathBuf, String)> {
        fs::create_dir_all(&self.dir).await?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let tag = Uuid::new_v4().simple().to_string();
        let fname = format!("{}_{stamp}_{}.png", sanitize_filename(name), &tag[..8]);
        let path = self.dir.join(&fname);
        let mut f = OpenOptions::new().write(true).create_new(true).open(&path).await?;
        f.write_all(image).await?;
        f.flush().await?;
        Ok((path, format!("{URL_PREFIX}/{fname}")))
    }

    pub async fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            warn!("could not remove {}: {e}", path.display());
        }
    }
}

pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '_' | '.' | '-'))
        .collect();
    let joined = kept.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() { "character".into() } else { joined }
}

/* ------------ 結果紀錄 (JSON lines) ------------ */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub url:          String,
    pub italian_name: String,
    pub prompt:       String,
    pub timestamp:    String,
    #[serde(default)]
    pub symbols:      Vec<String>,
    #[serde(default)]
    pub round:        u64,
}

#[derive(Clone)]
pub struct ResultLog {
    path:  Arc<PathBuf>,
    write: Arc<Mutex<()>>,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Arc::new(path.into()), write: Arc::default() }
    }

    pub async fn append(&self, entry: &LogEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write.lock().await;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let mut f = OpenOptions::new().create(true).append(true).open(self.path.as_path()).await?;
        f.write_all(line.as_bytes()).await?;
        f.flush().await
    }

    /// All readable entries; blank or corrupt lines are skipped.
    pub async fn read_all(&self) -> std::io::Result<Vec<LogEntry>> {
        let raw = match fs::read_to_string(self.path.as_path()).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(raw
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }
}

/* ------------ 生成流程 ------------ */
pub struct Pipeline {
    generator: Arc<dyn CharacterGenerator>,
    store:     ImageStore,
    log:       ResultLog,
}

impl Pipeline {
    pub fn new(generator: Arc<dyn CharacterGenerator>, store: ImageStore, log: ResultLog) -> Self {
        Self { generator, store, log }
    }

    pub fn log(&self) -> &ResultLog { &self.log }

    /// Never fails outward: the outcome reaches viewers as a broadcast.
    pub async fn run(&self, symbols: [String; REEL_COUNT], round: u64, hub: &Hub) {
        let msg = match self.materialize(&symbols, round).await {
            Ok(entry) => {
                info!(round, name = %entry.italian_name, url = %entry.url, "image ready");
                ServerMsg::ImageReady { url: entry.url, prompt: entry.prompt, italian_name: entry.italian_name }
            }
            Err(e) => {
                error!(round, "generation failed: {e}");
                ServerMsg::Error { message: e.to_string() }
            }
        };
        hub.broadcast(&msg).await;
    }

    async fn materialize(&self, symbols: &[String; REEL_COUNT], round: u64) -> Result<LogEntry, GenErr> {
        let ch = self.generator.generate(symbols).await?;
        let (path, url) = self.store.save(&ch.name, &ch.image).await?;

        let entry = LogEntry {
            url,
            italian_name: ch.name,
            prompt: ch.prompt,
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            symbols: symbols.to_vec(),
            round,
        };
        if let Err(e) = self.log.append(&entry).await {
            self.store.discard(&path).await;
            return Err(e.into());
        }
        Ok(entry)
    }
}
