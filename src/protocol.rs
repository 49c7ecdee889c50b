//! Text records exchanged with viewers over `/ws`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reels::{CATALOGS, REEL_COUNT};

/* ------------ client → server ------------ */
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    StopReel {
        reel: i64,
        #[serde(default)]
        symbol: Option<String>,
    },
    Reset,
}

/* ------------ server → client ------------ */
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    Init { reels: BTreeMap<usize, &'static [&'static str]> },
    ReelStopped { reel: usize, symbol: String },
    AllStopped { result: [String; REEL_COUNT] },
    ImageReady { url: String, prompt: String, italian_name: String },
    Error { message: String },
    ResetOk,
    Debug { msg: String },
}

impl ServerMsg {
    pub fn init() -> Self {
        ServerMsg::Init { reels: CATALOGS.iter().copied().enumerate().collect() }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn parses_client_messages() {
        let m: ClientMsg = serde_json::from_str(r#"{"type":"stop_reel","reel":2}"#).unwrap();
        assert_eq!(m, ClientMsg::StopReel { reel: 2, symbol: None });

        let m: ClientMsg =
            serde_json::from_str(r#"{"type":"stop_reel","reel":0,"symbol":"Shark"}"#).unwrap();
        assert_eq!(m, ClientMsg::StopReel { reel: 0, symbol: Some("Shark".into()) });

        let m: ClientMsg = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert_eq!(m, ClientMsg::Reset);
    }

    #[test]
    fn rejects_unknown_or_broken() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"spin"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"stop_reel"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>("not json").is_err());
    }

    #[test]
    fn server_messages_have_wire_shape() {
        let v: Value = serde_json::from_str(&ServerMsg::ResetOk.to_text().unwrap()).unwrap();
        assert_eq!(v, json!({"type": "reset_ok"}));

        let msg = ServerMsg::ReelStopped { reel: 1, symbol: "Kiwi".into() };
        let v: Value = serde_json::from_str(&msg.to_text().unwrap()).unwrap();
        assert_eq!(v, json!({"type": "reel_stopped", "reel": 1, "symbol": "Kiwi"}));

        let v: Value = serde_json::from_str(&ServerMsg::init().to_text().unwrap()).unwrap();
        assert_eq!(v["type"], "init");
        assert_eq!(v["reels"]["0"][2], "Shark");
        assert_eq!(v["reels"]["2"].as_array().unwrap().len(), 30);
    }
}
