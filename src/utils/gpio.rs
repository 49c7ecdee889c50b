//! Physical stop buttons. A plain OS thread polls the pins, debounces them,
//! and hands press events to the dispatcher queue. It never touches the round.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use rppal::gpio::{Gpio, InputPin};
use tracing::{debug, info, warn};

use crate::{
    config::GpioConfig,
    dispatch::{EventTx, InputEvent},
    error::HwErr,
};

const POLL: Duration = Duration::from_millis(5);
const LABELS: [&str; 3] = ["LEFT", "MIDDLE", "RIGHT"];

pub trait PinInput: Send {
    /// `true` while the button is held (pull-up wiring: held reads low).
    fn is_pressed(&mut self) -> io::Result<bool>;
}

/* ------------ BCM 腳位 (內部上拉) ------------ */
/// Button between the pin and GND, internal pull-up enabled.
pub struct PullUpPin(InputPin);

impl PullUpPin {
    pub fn open(gpio: &Gpio, pin: u32) -> Result<Self, HwErr> {
        let bcm = u8::try_from(pin).map_err(|_| HwErr::Pin(pin))?;
        Ok(Self(gpio.get(bcm)?.into_input_pullup()))
    }
}

impl PinInput for PullUpPin {
    fn is_pressed(&mut self) -> io::Result<bool> {
        Ok(self.0.is_low())
    }
}

/* ------------ 去彈跳 ------------ */
/// Reports a press only after the level has held steady for `interval`.
/// Releases are tracked but never reported. The level seen at start-up is
/// the baseline, so a button already held (or a floating pin) is not a press.
#[derive(Debug)]
pub struct Debouncer {
    interval:  Duration,
    stable:    bool,
    candidate: bool,
    since:     Instant,
}

impl Debouncer {
    pub fn new(interval: Duration, initial: bool, now: Instant) -> Self {
        Self { interval, stable: initial, candidate: initial, since: now }
    }

    pub fn update(&mut self, pressed: bool, now: Instant) -> bool {
        if pressed != self.candidate {
            self.candidate = pressed;
            self.since = now;
        }
        if self.candidate != self.stable && now.duration_since(self.since) >= self.interval {
            self.stable = self.candidate;
            return self.stable;
        }
        false
    }
}

struct Button {
    reel:     usize,
    pin:      u32,
    input:    Box<dyn PinInput>,
    debounce: Debouncer,
}

/* ------------ 按鈕面板 ------------ */
pub struct ButtonPanel {
    stop:   Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ButtonPanel {
    /// Opens one pull-up input per reel and starts polling.
    pub fn start(cfg: &GpioConfig, events: EventTx) -> Result<Self, HwErr> {
        let gpio = Gpio::new()?;
        let mut inputs: Vec<(u32, Box<dyn PinInput>)> = Vec::new();
        for pin in cfg.pins {
            let input: Box<dyn PinInput> = Box::new(PullUpPin::open(&gpio, pin)?);
            inputs.push((pin, input));
        }
        let panel = Self::with_inputs(inputs, cfg.debounce, events);
        info!(pins = ?cfg.pins, "[GPIO] buttons active");
        Ok(panel)
    }

    /// Input `i` drives reel `i`.
    pub fn with_inputs(inputs: Vec<(u32, Box<dyn PinInput>)>, debounce: Duration, events: EventTx) -> Self {
        let now = Instant::now();
        let buttons: Vec<Button> = inputs
            .into_iter()
            .enumerate()
            .map(|(reel, (pin, mut input))| {
                let initial = input.is_pressed().unwrap_or(false);
                if initial {
                    warn!(pin, "[GPIO] reads pressed at start-up; waiting for a release");
                }
                Button { reel, pin, input, debounce: Debouncer::new(debounce, initial, now) }
            })
            .collect();

        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::spawn(move || poll_loop(buttons, events, flag));
        Self { stop, handle: Some(handle) }
    }
}

impl Drop for ButtonPanel {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            h.join().ok();
        }
    }
}

fn poll_loop(mut buttons: Vec<Button>, events: EventTx, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        for b in buttons.iter_mut() {
            let pressed = match b.input.is_pressed() {
                Ok(p) => p,
                Err(e) => {
                    debug!(pin = b.pin, "[GPIO] read failed: {e}");
                    continue;
                }
            };
            if !b.debounce.update(pressed, now) {
                continue;
            }
            let label = LABELS.get(b.reel).copied().unwrap_or("EXTRA");
            info!("[GPIO] {label} pressed (GPIO{})", b.pin);
            if events.send(InputEvent::button(b.reel, b.pin, label)).is_err() {
                warn!("[GPIO] dispatcher gone, stopping button thread");
                return;
            }
        }
        thread::sleep(POLL);
    }
}
