//! Input dispatcher: the single place where the round changes.
//!
//! Viewer sockets call [`Dispatcher::apply`] directly; the button thread
//! goes through the [`EventTx`] queue drained by [`Dispatcher::run`]. Either
//! way every event runs inside the same round lock, and the notifications it
//! causes are queued to the hub before the lock is released.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::ProtocolErr,
    hub::Hub,
    pipeline::Pipeline,
    protocol::{ClientMsg, ServerMsg},
    reels::REEL_COUNT,
    state::{RoundState, StopOutcome},
};

pub type EventTx = mpsc::UnboundedSender<InputEvent>;
pub type EventRx = mpsc::UnboundedReceiver<InputEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Viewer,
    Button { pin: u32, label: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Stop { reel: usize, symbol: Option<String>, source: Source },
    Reset,
}

impl InputEvent {
    /// A physical press never carries a symbol, so the reel always draws.
    pub fn button(reel: usize, pin: u32, label: &'static str) -> Self {
        InputEvent::Stop { reel, symbol: None, source: Source::Button { pin, label } }
    }

    pub fn parse(raw: &str) -> Result<Self, ProtocolErr> {
        let msg: ClientMsg = serde_json::from_str(raw).map_err(|e| ProtocolErr::Parse(e.to_string()))?;
        Self::from_client(msg)
    }

    pub fn from_client(msg: ClientMsg) -> Result<Self, ProtocolErr> {
        match msg {
            ClientMsg::Reset => Ok(InputEvent::Reset),
            ClientMsg::StopReel { reel, symbol } => {
                let idx = usize::try_from(reel)
                    .ok()
                    .filter(|i| *i < REEL_COUNT)
                    .ok_or(ProtocolErr::ReelRange(reel))?;
                Ok(InputEvent::Stop { reel: idx, symbol, source: Source::Viewer })
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Applied {
    pub outcome:    Option<StopOutcome>,
    /// Background generation started by this event, if it finished the round.
    pub generation: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct Dispatcher {
    round:    Arc<Mutex<RoundState>>,
    hub:      Hub,
    pipeline: Arc<Pipeline>,
}

impl Dispatcher {
    pub fn new(hub: Hub, pipeline: Arc<Pipeline>) -> Self {
        Self { round: Arc::new(Mutex::new(RoundState::new())), hub, pipeline }
    }

    pub fn hub(&self) -> &Hub { &self.hub }

    #[cfg(test)]
    pub async fn with_round<R>(&self, f: impl FnOnce(&RoundState) -> R) -> R {
        f(&*self.round.lock().await)
    }

    /// A new viewer restarts the shared round without telling anyone.
    pub async fn viewer_joined(&self) {
        let mut round = self.round.lock().await;
        round.reset();
        debug!(round = round.round(), "round reinitialised for new viewer");
    }

    pub async fn apply(&self, ev: InputEvent) -> Applied {
        let mut round = self.round.lock().await;

        let (reel, symbol, source) = match ev {
            InputEvent::Reset => {
                debug!(previous = ?round.result(), "resetting");
                round.reset();
                info!(round = round.round(), "round reset");
                self.hub.broadcast(&ServerMsg::ResetOk).await;
                return Applied::default();
            }
            InputEvent::Stop { reel, symbol, source } => (reel, symbol, source),
        };

        if let Source::Button { pin, label } = source {
            let msg = format!("{label} pressed (GPIO{pin})");
            self.hub.broadcast(&ServerMsg::Debug { msg }).await;
        }

        let outcome = round.stop_reel(reel, symbol.as_deref());
        let mut generation = None;
        match &outcome {
            StopOutcome::Stopped { symbol, completed } => {
                info!(reel, symbol, "reel stopped");
                self.hub.broadcast(&ServerMsg::ReelStopped { reel, symbol: symbol.to_string() }).await;

                if let Some(triple) = completed {
                    let result = triple.map(String::from);
                    let round_no = round.round();
                    info!(round = round_no, ?result, "all reels stopped");
                    self.hub.broadcast(&ServerMsg::AllStopped { result: result.clone() }).await;

                    let pipeline = self.pipeline.clone();
                    let hub = self.hub.clone();
                    generation = Some(tokio::spawn(async move {
                        pipeline.run(result, round_no, &hub).await;
                    }));
                }
            }
            StopOutcome::AlreadyStopped => debug!(reel, "reel already stopped, ignoring"),
            StopOutcome::OutOfRange => warn!(reel, "stop for unknown reel, ignoring"),
        }

        debug!(spinning = ?round.spinning(), "round state");
        Applied { outcome: Some(outcome), generation }
    }

    /// Drains the cross-thread queue until every sender is gone.
    pub async fn run(self, mut events: EventRx) {
        while let Some(ev) = events.recv().await {
            self.apply(ev).await;
        }
        info!("event queue closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hub::ViewerRx,
        pipeline::tests::{pipeline_in, scratch_dir, FakeGenerator},
    };
    use serde_json::Value;
    use std::path::PathBuf;

    async fn setup(generator: FakeGenerator) -> (Dispatcher, ViewerRx, PathBuf) {
        let dir = scratch_dir();
        let d = Dispatcher::new(Hub::new(), pipeline_in(&dir, generator));
        let (tx, rx) = mpsc::unbounded_channel();
        d.hub().register(tx).await;
        (d, rx, dir)
    }

    fn drain(rx: &mut ViewerRx) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    fn of_type<'a>(msgs: &'a [Value], ty: &str) -> Vec<&'a Value> {
        msgs.iter().filter(|m| m["type"] == ty).collect()
    }

    fn stop(reel: usize, symbol: &str) -> InputEvent {
        InputEvent::Stop { reel, symbol: Some(symbol.into()), source: Source::Viewer }
    }

    #[test]
    fn normalizes_client_payloads() {
        assert_eq!(
            InputEvent::parse(r#"{"type":"stop_reel","reel":1,"symbol":"Kiwi"}"#).unwrap(),
            stop(1, "Kiwi")
        );
        assert_eq!(InputEvent::parse(r#"{"type":"reset"}"#).unwrap(), InputEvent::Reset);
        assert_eq!(
            InputEvent::parse(r#"{"type":"stop_reel","reel":3}"#),
            Err(ProtocolErr::ReelRange(3))
        );
        assert_eq!(
            InputEvent::parse(r#"{"type":"stop_reel","reel":-1}"#),
            Err(ProtocolErr::ReelRange(-1))
        );
        assert!(matches!(InputEvent::parse(r#"{"type":"pull_lever"}"#), Err(ProtocolErr::Parse(_))));
        assert!(matches!(InputEvent::parse("{"), Err(ProtocolErr::Parse(_))));
    }

    #[tokio::test]
    async fn explicit_symbols_complete_once() {
        let (d, mut rx, dir) = setup(FakeGenerator::ok()).await;

        let mut jobs = Vec::new();
        for (i, s) in ["Shark", "Watermelon", "Sword"].into_iter().enumerate() {
            jobs.extend(d.apply(stop(i, s)).await.generation);
        }
        for i in 0..REEL_COUNT {
            let again = d.apply(stop(i, "Cat")).await;
            assert_eq!(again.outcome, Some(StopOutcome::AlreadyStopped));
            assert!(again.generation.is_none());
        }
        assert_eq!(jobs.len(), 1);
        for j in jobs {
            j.await.unwrap();
        }

        let msgs = drain(&mut rx);
        assert_eq!(of_type(&msgs, "reel_stopped").len(), 3);
        let all = of_type(&msgs, "all_stopped");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["result"], serde_json::json!(["Shark", "Watermelon", "Sword"]));
        assert_eq!(of_type(&msgs, "image_ready").len(), 1);
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn repeated_stop_is_silent() {
        let (d, mut rx, _dir) = setup(FakeGenerator::ok()).await;
        d.apply(InputEvent::Stop { reel: 2, symbol: None, source: Source::Viewer }).await;
        let first = d.with_round(|r| r.result()[2]).await;
        assert_eq!(drain(&mut rx).len(), 1);

        d.apply(InputEvent::Stop { reel: 2, symbol: None, source: Source::Viewer }).await;
        assert_eq!(d.with_round(|r| r.result()[2]).await, first);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn reset_broadcasts_and_restarts() {
        let (d, mut rx, _dir) = setup(FakeGenerator::ok()).await;
        d.apply(stop(0, "Cat")).await;
        d.apply(InputEvent::Reset).await;
        assert_eq!(d.with_round(|r| r.spinning()).await, [true; REEL_COUNT]);
        let msgs = drain(&mut rx);
        assert_eq!(msgs.last().unwrap()["type"], "reset_ok");
    }

    #[tokio::test]
    async fn viewer_join_resets_silently() {
        let (d, mut rx, _dir) = setup(FakeGenerator::ok()).await;
        d.apply(stop(1, "Fig")).await;
        drain(&mut rx);
        d.viewer_joined().await;
        assert_eq!(d.with_round(|r| r.result()).await, [None; REEL_COUNT]);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stops_lose_nothing() {
        let (d, mut rx, dir) = setup(FakeGenerator::ok()).await;
        let tasks: Vec<_> = (0..REEL_COUNT)
            .map(|i| {
                let d = d.clone();
                tokio::spawn(async move {
                    d.apply(InputEvent::Stop { reel: i, symbol: None, source: Source::Viewer }).await
                })
            })
            .collect();

        let mut jobs = Vec::new();
        for t in tasks {
            jobs.extend(t.await.unwrap().generation);
        }
        assert_eq!(jobs.len(), 1);
        for j in jobs {
            j.await.unwrap();
        }

        assert_eq!(d.with_round(|r| r.spinning()).await, [false; REEL_COUNT]);
        let msgs = drain(&mut rx);
        assert_eq!(of_type(&msgs, "all_stopped").len(), 1);
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn failed_generation_reports_error_and_logs_nothing() {
        let (d, mut rx, _dir) = setup(FakeGenerator::broken()).await;
        let mut jobs = Vec::new();
        for i in 0..REEL_COUNT {
            jobs.extend(d.apply(InputEvent::Stop { reel: i, symbol: None, source: Source::Viewer }).await.generation);
        }
        for j in jobs {
            j.await.unwrap();
        }

        let msgs = drain(&mut rx);
        assert_eq!(of_type(&msgs, "error").len(), 1);
        assert!(of_type(&msgs, "image_ready").is_empty());
        assert!(d.pipeline.log().read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_generation_logs_round_result() {
        let (d, _rx, dir) = setup(FakeGenerator::ok()).await;
        let mut jobs = Vec::new();
        for i in 0..REEL_COUNT {
            jobs.extend(d.apply(InputEvent::Stop { reel: i, symbol: None, source: Source::Viewer }).await.generation);
        }
        let result = d.with_round(|r| r.result().map(|s| s.unwrap_or_default().to_string())).await;
        let round = d.with_round(|r| r.round()).await;
        for j in jobs {
            j.await.unwrap();
        }

        let entries = d.pipeline.log().read_all().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].symbols, result.to_vec());
        assert_eq!(entries[0].round, round);
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    // Known race: a reset during generation does not cancel it. The result is
    // still delivered, tagged with the round that started it.
    #[tokio::test]
    async fn reset_during_generation_does_not_corrupt_round() {
        let (d, mut rx, dir) = setup(FakeGenerator::ok()).await;
        let mut jobs = Vec::new();
        for (i, s) in ["Bee", "Plum", "Bell"].into_iter().enumerate() {
            jobs.extend(d.apply(stop(i, s)).await.generation);
        }
        let started = d.with_round(|r| r.round()).await;
        d.apply(InputEvent::Reset).await;
        d.apply(stop(0, "Owl")).await;
        for j in jobs {
            j.await.unwrap();
        }

        assert_eq!(d.with_round(|r| r.result()).await, [Some("Owl"), None, None]);
        assert_eq!(of_type(&drain(&mut rx), "image_ready").len(), 1);
        let entries = d.pipeline.log().read_all().await.unwrap();
        assert_eq!(entries[0].round, started);
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn queue_accepts_events_from_other_threads() {
        let (d, mut rx, _dir) = setup(FakeGenerator::ok()).await;
        let (tx, events) = mpsc::unbounded_channel();
        let worker = tokio::spawn(d.clone().run(events));

        std::thread::spawn(move || {
            tx.send(InputEvent::button(0, 23, "LEFT")).unwrap();
            tx.send(InputEvent::button(0, 23, "LEFT")).unwrap();
        })
        .join()
        .unwrap();
        worker.await.unwrap();

        let msgs = drain(&mut rx);
        assert_eq!(of_type(&msgs, "debug").len(), 2);
        assert_eq!(msgs[0]["msg"], "LEFT pressed (GPIO23)");
        assert_eq!(of_type(&msgs, "reel_stopped").len(), 1);
        assert!(!d.with_round(|r| r.spinning()[0]).await);
    }
}
