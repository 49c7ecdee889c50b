use std::time::{SystemTime, UNIX_EPOCH};

use crate::reels::{self, REEL_COUNT};

/* ------------ 單一捲軸 ------------ */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reel {
    Spinning,
    Stopped(&'static str),
}

impl Reel {
    pub fn is_spinning(&self) -> bool { matches!(self, Reel::Spinning) }

    pub fn symbol(&self) -> Option<&'static str> {
        match self {
            Reel::Stopped(s) => Some(*s),
            Reel::Spinning   => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The reel landed on `symbol`; `completed` carries the full triple when
    /// this stop was the last one of the round.
    Stopped { symbol: &'static str, completed: Option<[&'static str; REEL_COUNT]> },
    AlreadyStopped,
    OutOfRange,
}

/* ------------ 全域回合 ------------ */
/// The one shared round. Only the dispatcher mutates it, under its lock.
#[derive(Debug)]
pub struct RoundState {
    reels:        [Reel; REEL_COUNT],
    session_seed: u64,
    round:        u64,
}

impl RoundState {
    pub fn new() -> Self {
        Self { reels: [Reel::Spinning; REEL_COUNT], session_seed: time_seed(), round: 1 }
    }

    pub fn round(&self) -> u64 { self.round }

    pub fn spinning(&self) -> [bool; REEL_COUNT] { self.reels.map(|r| r.is_spinning()) }
    pub fn result(&self) -> [Option<&'static str>; REEL_COUNT] { self.reels.map(|r| r.symbol()) }

    pub fn reset(&mut self) {
        self.reels = [Reel::Spinning; REEL_COUNT];
        self.session_seed = time_seed();
        self.round += 1;
    }

    pub fn stop_reel(&mut self, index: usize, explicit: Option<&str>) -> StopOutcome {
        self.stop_reel_at(index, explicit, now_nanos())
    }

    /// Same as [`stop_reel`](Self::stop_reel) with the clock supplied by the caller.
    pub fn stop_reel_at(&mut self, index: usize, explicit: Option<&str>, nanos: u128) -> StopOutcome {
        let Some(reel) = self.reels.get(index) else { return StopOutcome::OutOfRange };
        if !reel.is_spinning() {
            return StopOutcome::AlreadyStopped;
        }

        let chosen = explicit.and_then(|name| reels::lookup(index, name));
        let symbol = match chosen {
            Some(s) => s,
            None => {
                let seed = self.session_seed
                    ^ (index as u64 * 7919)
                    ^ (nanos as u64 & 0xFFFF_FFFF);
                match reels::pick(index, seed) {
                    Some(s) => s,
                    None => return StopOutcome::OutOfRange,
                }
            }
        };

        self.reels[index] = Reel::Stopped(symbol);

        // only the transition that stops the last spinning reel reports completion
        let completed = self.full_result();
        StopOutcome::Stopped { symbol, completed }
    }

    fn full_result(&self) -> Option<[&'static str; REEL_COUNT]> {
        let mut out = [""; REEL_COUNT];
        for (slot, reel) in out.iter_mut().zip(self.reels.iter()) {
            *slot = reel.symbol()?;
        }
        Some(out)
    }
}

impl Default for RoundState {
    fn default() -> Self { Self::new() }
}

fn now_nanos() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or_default()
}

fn time_seed() -> u64 {
    (now_nanos() / 1_000_000 % 1_000_000) as u64
}
