use axum::{http::StatusCode, response::IntoResponse};
use std::fmt::Display;

pub type AppResult<T> = Result<T, AppErr>;

#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("Config: {0}")]
    Config(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppErr {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

pub fn config<E: Display>(e: E) -> AppErr { AppErr::Config(e.to_string()) }

/* ── 生成流程的錯誤 ── */
#[derive(thiserror::Error, Debug)]
pub enum GenErr {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("{stage} failed after {attempts} attempts: {last}")]
    Exhausted { stage: &'static str, attempts: u32, last: Box<GenErr> },
}

impl GenErr {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenErr::Request(_) | GenErr::Malformed(_) => true,
            GenErr::Status { status, .. } => *status == 429 || *status >= 500,
            GenErr::Unavailable(_) | GenErr::Io(_) | GenErr::Exhausted { .. } => false,
        }
    }
}

pub fn malformed<E: Display>(e: E) -> GenErr { GenErr::Malformed(e.to_string()) }

/* ── 硬體按鈕 ── */
#[derive(thiserror::Error, Debug)]
pub enum HwErr {
    #[error("GPIO: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("pin {0} is not a valid BCM number")]
    Pin(u32),
}

/* ── 使用者輸入 ── */
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ProtocolErr {
    #[error("unparseable message: {0}")]
    Parse(String),

    #[error("reel index {0} out of range")]
    ReelRange(i64),
}
