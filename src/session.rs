//! Ties the pieces together around one machine.
//!
//! The session owns the only machine there is. Everything that touches it
//! (ticks, key edges, ROM installs) is dispatched from `pump`, one thing at
//! a time, so a ROM switch can land while the loop is running but never in
//! the middle of a batch.

use crate::controller::{LoopController, LoopError};
use crate::display::Display;
use crate::input::{Command, Input, InputEvent};
use crate::keys::KeyBridge;
use crate::machine::Machine;
use crate::rom::{self, Rom, RomError, RomLoader};
use std::fmt::Write;
use std::io;
use std::time::{Duration, Instant};
use thiserror::Error;

/// longest the loop waits for input when there are no ticks to run
const IDLE_POLL: Duration = Duration::from_millis(50);
/// how long to wait for input while a ROM is on its way
const FETCH_POLL: Duration = Duration::from_millis(5);
/// longest sleep between ticks, so input stays responsive
const MAX_SLEEP: Duration = Duration::from_millis(4);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("couldn't read input: {0}")]
    Input(#[source] io::Error),

    #[error(transparent)]
    Rom(#[from] RomError),

    #[error(transparent)]
    Loop(#[from] LoopError),
}

pub struct Session<M: Machine, D: Display, I: Input> {
    machine: M,
    controller: LoopController,
    bridge: KeyBridge,
    loader: RomLoader,
    display: D,
    input: I,
    roms: Vec<String>,
    // last name asked for, which may not have arrived yet
    selected: Option<String>,
    current: Option<String>,
    last_error: Option<String>,
    quit: bool,
}

impl<M: Machine, D: Display, I: Input> Session<M, D, I> {
    pub fn new(
        machine: M,
        controller: LoopController,
        bridge: KeyBridge,
        loader: RomLoader,
        display: D,
        input: I,
    ) -> Self {
        let roms = loader.list().unwrap_or_else(|e| {
            log::warn!("couldn't list ROMs: {}", e);
            Vec::new()
        });
        log::debug!("{} ROMs available", roms.len());
        let mut session = Session {
            machine,
            controller,
            bridge,
            loader,
            display,
            input,
            roms,
            selected: None,
            current: None,
            last_error: None,
            quit: false,
        };
        session.refresh_title();
        session
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn controller(&self) -> &LoopController {
        &self.controller
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    /// names that Tab and Shift-Tab step through
    pub fn roms(&self) -> &[String] {
        &self.roms
    }

    /// the ROM currently in the machine
    pub fn current_rom(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_quitting(&self) -> bool {
        self.quit
    }

    /// ask for a ROM; it's installed by a later `pump` once it arrives
    pub fn open(&mut self, name: &str) -> Result<(), RomError> {
        self.selected = Some(name.to_string());
        self.loader.request(name)
    }

    /// open the first listed ROM, if there is one
    pub fn open_first(&mut self) -> Result<bool, RomError> {
        match self.roms.first().cloned() {
            Some(name) => self.open(&name).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn start(&mut self, now: Instant) -> Result<(), LoopError> {
        self.controller.start(now)?;
        self.last_error = None;
        self.refresh_title();
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), LoopError> {
        self.controller.stop()?;
        self.refresh_title();
        self.repaint();
        Ok(())
    }

    /// One turn of the event loop: input, then any ROM that has arrived,
    /// then a tick if one is due. False once the user has asked to quit.
    pub fn pump(&mut self, now: Instant, wait: Duration) -> Result<bool, SessionError> {
        let events = self.input.poll(wait).map_err(SessionError::Input)?;
        for event in events {
            self.handle(event, now);
            if self.quit {
                return Ok(false);
            }
        }

        if let Some(fetched) = self.loader.poll() {
            self.apply(fetched);
        }

        if let Err(e) = self.controller.poll(now, &mut self.machine, &mut self.display) {
            // the controller has already stopped itself
            self.report(e.to_string());
            self.repaint();
        }
        Ok(!self.quit)
    }

    /// Load the named ROM, or the first listed one, waiting up to `timeout`
    /// for it, then start the loop if asked. A ROM that doesn't arrive is
    /// shown in the title rather than treated as fatal.
    pub fn boot(
        &mut self,
        rom: Option<&str>,
        autostart: bool,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let requested = match rom {
            Some(name) => self.open(name).map(|_| true)?,
            None => self.open_first()?,
        };
        if !requested {
            self.report(String::from("no ROMs found, nothing to run"));
            return Ok(());
        }
        if !self.settle(timeout) {
            log::warn!("still waiting for the first ROM after {:?}", timeout);
        }
        if autostart && self.current.is_some() {
            self.start(Instant::now())?;
        }
        Ok(())
    }

    /// block until the pending ROM arrives and install it; false on timeout
    pub fn settle(&mut self, timeout: Duration) -> bool {
        match self.loader.wait(timeout) {
            Some(fetched) => {
                self.apply(fetched);
                true
            }
            None => false,
        }
    }

    /// pump until quit, sleeping between ticks
    pub fn run(&mut self) -> Result<(), SessionError> {
        loop {
            let wait = if self.controller.next_deadline().is_some() {
                Duration::ZERO
            } else if self.loader.is_pending() {
                FETCH_POLL
            } else {
                IDLE_POLL
            };
            if !self.pump(Instant::now(), wait)? {
                return Ok(());
            }
            if let Some(deadline) = self.controller.next_deadline() {
                let now = Instant::now();
                if deadline > now {
                    spin_sleep::sleep((deadline - now).min(MAX_SLEEP));
                }
            }
        }
    }

    pub fn handle(&mut self, event: InputEvent, now: Instant) {
        match event {
            InputEvent::KeyDown(c) => {
                self.bridge.on_key_down(&mut self.machine, c);
            }
            InputEvent::KeyUp(c) => {
                self.bridge.on_key_up(&mut self.machine, c);
            }
            InputEvent::Focus(visible) => self.controller.set_visible(visible),
            InputEvent::Command(Command::Quit) => {
                log::debug!("quitting");
                self.quit = true;
            }
            InputEvent::Command(Command::Toggle) => {
                let toggled = if self.controller.is_running() {
                    self.stop()
                } else {
                    self.start(now)
                };
                if let Err(e) = toggled {
                    self.report(e.to_string());
                }
            }
            InputEvent::Command(Command::NextRom) => self.step(1),
            InputEvent::Command(Command::PrevRom) => self.step(-1),
        }
    }

    fn step(&mut self, by: isize) {
        if self.roms.is_empty() {
            log::warn!("no ROMs to choose from");
            return;
        }
        let count = self.roms.len() as isize;
        let from = self
            .selected
            .as_ref()
            .and_then(|name| self.roms.iter().position(|r| r == name));
        let next = match from {
            Some(i) => (i as isize + by).rem_euclid(count) as usize,
            None if by < 0 => self.roms.len() - 1,
            None => 0,
        };
        let name = self.roms[next].clone();
        if let Err(e) = self.open(&name) {
            self.report(e.to_string());
        }
    }

    fn apply(&mut self, fetched: Result<Rom, RomError>) {
        let installed = fetched.and_then(|rom| {
            rom::install(&mut self.machine, &rom)?;
            Ok(rom.name)
        });
        match installed {
            Ok(name) => {
                self.current = Some(name);
                self.last_error = None;
                self.refresh_title();
                self.repaint();
            }
            Err(e) => self.report(e.to_string()),
        }
    }

    fn report(&mut self, message: String) {
        log::warn!("{}", message);
        self.last_error = Some(message);
        self.refresh_title();
    }

    fn refresh_title(&mut self) {
        let mut title = format!(
            "CHIP-8 | {} | {}",
            self.current.as_deref().unwrap_or("no ROM"),
            if self.controller.is_running() {
                "running"
            } else {
                "stopped"
            }
        );
        if let Some(e) = &self.last_error {
            let _ = write!(title, " | {}", e);
        }
        self.display.set_title(&title);
    }

    // only needed while stopped; a running loop repaints every tick
    fn repaint(&mut self) {
        if self.controller.is_running() {
            return;
        }
        if let Err(e) = self.controller.render(&self.machine, &mut self.display) {
            log::warn!("couldn't repaint: {}", e);
        }
    }
}
