#![allow(dead_code)]

use chip8_frontend::display::DummyDisplay;
use chip8_frontend::input::DummyInput;
use chip8_frontend::scheduler::IntervalScheduler;
use chip8_frontend::{
    KeyBridge, KeyMap, LoopController, Machine, MachineError, Palette, PixelState, RomLoader,
    RomSource, Session, HEIGHT, WIDTH,
};
use std::sync::Arc;
use std::time::Duration;

pub const MS: Duration = Duration::from_millis(1);
pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Reset,
    Load(usize),
    Cycle,
    KeyDown(u8),
    KeyUp(u8),
}

/// A machine that remembers every call made on it. It complains loudly if
/// a cycle lands between a reset and the load that should follow it.
pub struct FakeMachine {
    pub calls: Vec<Call>,
    pub pixels: PixelState,
    // lit by the first cycle after a load
    pub lights: Option<usize>,
    loading: bool,
}

impl FakeMachine {
    pub fn new() -> Self {
        FakeMachine {
            calls: Vec::new(),
            pixels: [0; WIDTH * HEIGHT],
            lights: None,
            loading: false,
        }
    }

    pub fn lighting(pixel: usize) -> Self {
        FakeMachine {
            lights: Some(pixel),
            ..FakeMachine::new()
        }
    }

    pub fn key_calls(&self) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::KeyDown(_) | Call::KeyUp(_)))
            .cloned()
            .collect()
    }

    fn record(&mut self, call: Call) {
        self.calls.push(call);
    }
}

impl Machine for FakeMachine {
    fn reset(&mut self) {
        self.record(Call::Reset);
        self.loading = true;
        self.pixels = [0; WIDTH * HEIGHT];
    }

    fn load(&mut self, program: &[u8]) -> Result<(), MachineError> {
        self.record(Call::Load(program.len()));
        self.loading = false;
        Ok(())
    }

    fn cycle(&mut self) -> Result<(), MachineError> {
        assert!(!self.loading, "cycle between reset and load");
        self.record(Call::Cycle);
        if let Some(i) = self.lights {
            self.pixels[i] = 1;
        }
        Ok(())
    }

    fn pixels(&self) -> &PixelState {
        &self.pixels
    }

    fn key_down(&mut self, key: u8) {
        self.record(Call::KeyDown(key));
    }

    fn key_up(&mut self, key: u8) {
        self.record(Call::KeyUp(key));
    }
}

pub type TestSession<M> = Session<M, DummyDisplay, DummyInput>;

/// a session on a 2ms interval, `batch` cycles a tick, green palette
pub fn session<M: Machine>(
    machine: M,
    batch: u32,
    source: impl RomSource + 'static,
) -> TestSession<M> {
    let controller = LoopController::new(
        Box::new(IntervalScheduler::new(2 * MS)),
        batch,
        Palette::GREEN,
    );
    Session::new(
        machine,
        controller,
        KeyBridge::new(KeyMap::qwerty()),
        RomLoader::new(Arc::new(source)),
        DummyDisplay::new(),
        DummyInput::default(),
    )
}
