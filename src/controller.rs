//! The execution-and-render loop.
//!
//! ```text
//!            start()
//!   Idle  ----------->  Running(task)
//!    ^                      |
//!    +----------------------+
//!      stop(), or a fault during a tick
//! ```
//!
//! Each tick runs a fixed batch of machine cycles, then decodes and presents
//! exactly one frame. Ticks are only ever run from `poll`, on the caller's
//! thread, so once `stop` returns no further cycle can happen.

use crate::display::Display;
use crate::machine::{Machine, MachineError};
use crate::scheduler::{Scheduler, TaskId};
use crate::video::{decode_into, Framebuffer, Palette};
use std::io;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("the loop is already running")]
    AlreadyRunning,

    #[error("the loop is not running")]
    NotRunning,

    #[error("machine fault: {0}")]
    Machine(#[from] MachineError),

    #[error("couldn't present frame: {0}")]
    Present(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running(TaskId),
}

pub struct LoopController {
    scheduler: Box<dyn Scheduler>,
    batch: u32,
    palette: Palette,
    state: RunState,
    frame: Framebuffer,
    ticks: u64,
}

impl LoopController {
    /// `batch` cycles per rendered frame; zero is treated as one
    pub fn new(scheduler: Box<dyn Scheduler>, batch: u32, palette: Palette) -> Self {
        LoopController {
            scheduler,
            batch: batch.max(1),
            palette,
            state: RunState::Idle,
            frame: Framebuffer::new(),
            ticks: 0,
        }
    }

    pub fn start(&mut self, now: Instant) -> Result<(), LoopError> {
        if let RunState::Running(_) = self.state {
            return Err(LoopError::AlreadyRunning);
        }
        let task = self.scheduler.schedule_recurring(now);
        self.state = RunState::Running(task);
        log::debug!("loop started, {} cycles per tick", self.batch);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), LoopError> {
        match self.state {
            RunState::Idle => Err(LoopError::NotRunning),
            RunState::Running(_) => {
                self.halt();
                log::debug!("loop stopped after {} ticks", self.ticks);
                Ok(())
            }
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running(_))
    }

    pub fn batch(&self) -> u32 {
        self.batch
    }

    /// ticks completed since construction; a tick that fails isn't counted
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// the most recently presented frame
    pub fn frame(&self) -> &Framebuffer {
        &self.frame
    }

    /// when the event loop next needs to call `poll`
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            RunState::Running(_) => self.scheduler.next_deadline(),
            RunState::Idle => None,
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.scheduler.set_visible(visible);
    }

    /// run a tick if one is due; true if it ran
    pub fn poll(
        &mut self,
        now: Instant,
        machine: &mut impl Machine,
        display: &mut dyn Display,
    ) -> Result<bool, LoopError> {
        let task = match self.state {
            RunState::Running(task) => task,
            RunState::Idle => return Ok(false),
        };
        if !self.scheduler.take_due(task, now) {
            return Ok(false);
        }
        self.tick(machine, display)?;
        Ok(true)
    }

    /// one batch of cycles then one frame; a failure stops the loop
    pub fn tick(
        &mut self,
        machine: &mut impl Machine,
        display: &mut dyn Display,
    ) -> Result<(), LoopError> {
        let result = self.run_batch(machine).and_then(|_| self.render(&*machine, display));
        match &result {
            Ok(()) => self.ticks += 1,
            Err(e) => {
                log::error!("halting loop: {}", e);
                self.halt();
            }
        }
        result
    }

    /// decode and present whatever the machine is showing, without cycling
    pub fn render(
        &mut self,
        machine: &impl Machine,
        display: &mut dyn Display,
    ) -> Result<(), LoopError> {
        decode_into(machine.pixels(), &self.palette, &mut self.frame);
        display.draw(&self.frame)?;
        Ok(())
    }

    fn run_batch(&mut self, machine: &mut impl Machine) -> Result<(), LoopError> {
        for _ in 0..self.batch {
            machine.cycle()?;
        }
        Ok(())
    }

    fn halt(&mut self) {
        if let RunState::Running(task) = self.state {
            self.scheduler.cancel(task);
        }
        self.state = RunState::Idle;
    }
}
