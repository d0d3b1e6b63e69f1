use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::{Duration, Instant};

/// things the front end does, as opposed to keys for the program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// start the loop if it's stopped, stop it if it's running
    Toggle,
    NextRom,
    PrevRom,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// a physical key went down (or auto-repeated)
    KeyDown(char),
    KeyUp(char),
    Command(Command),
    /// the terminal gained (true) or lost (false) focus
    Focus(bool),
}

/// reads input events
pub trait Input {
    /// everything that has happened, waiting up to `timeout` for the first
    /// event; an empty list means nothing did
    fn poll(&mut self, timeout: Duration) -> Result<Vec<InputEvent>, io::Error>;
}

/// Turns terminal key events into press/release edges. Terminals that can't
/// report releases only send presses (and auto-repeats), so for those a
/// release is made up once a key has gone quiet for `release_after`.
#[derive(Debug)]
pub struct KeyTracker {
    reports_releases: bool,
    release_after: Duration,
    held: HashMap<char, Instant>,
}

impl KeyTracker {
    pub fn new(reports_releases: bool, release_after: Duration) -> Self {
        KeyTracker {
            reports_releases,
            release_after,
            held: HashMap::new(),
        }
    }

    pub fn translate(&mut self, evt: Event, now: Instant) -> Option<InputEvent> {
        match evt {
            Event::Key(key) => self.translate_key(key, now),
            Event::FocusGained => Some(InputEvent::Focus(true)),
            Event::FocusLost => Some(InputEvent::Focus(false)),
            _ => None,
        }
    }

    fn translate_key(&mut self, key: KeyEvent, now: Instant) -> Option<InputEvent> {
        let pressed = key.kind != KeyEventKind::Release;
        // holding a command key mustn't fire it again on every repeat
        let command = |c| (key.kind == KeyEventKind::Press).then_some(InputEvent::Command(c));
        match key.code {
            KeyCode::Esc => command(Command::Quit),
            // raw mode means nobody else turns ctrl-c into a signal
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                command(Command::Quit)
            }
            KeyCode::Char(' ') => command(Command::Toggle),
            KeyCode::Tab => command(Command::NextRom),
            KeyCode::BackTab => command(Command::PrevRom),
            KeyCode::Char(c) if pressed => {
                self.held.insert(c, now);
                Some(InputEvent::KeyDown(c))
            }
            KeyCode::Char(c) => {
                // the terminal does tell us after all
                self.reports_releases = true;
                self.held.remove(&c);
                Some(InputEvent::KeyUp(c))
            }
            _ => {
                log::trace!("ignoring key event {:?}", key);
                None
            }
        }
    }

    /// releases for keys that have gone quiet, when the terminal won't say
    pub fn expire(&mut self, now: Instant) -> Vec<InputEvent> {
        if self.reports_releases {
            return Vec::new();
        }
        let release_after = self.release_after;
        let mut quiet: Vec<char> = self
            .held
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) >= release_after)
            .map(|(c, _)| *c)
            .collect();
        quiet.sort_unstable();
        for c in &quiet {
            self.held.remove(c);
        }
        quiet.into_iter().map(InputEvent::KeyUp).collect()
    }
}

/// implementation of Input reading crossterm events from the terminal
pub struct TermInput {
    enhanced: bool,
    tracker: KeyTracker,
}

impl TermInput {
    pub fn new(release_after: Duration) -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
        let mut stdout = io::stdout();
        if enhanced {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        } else {
            log::info!("terminal can't report key releases, releasing after {:?}", release_after);
        }
        execute!(stdout, EnableFocusChange)?;
        Ok(TermInput {
            enhanced,
            tracker: KeyTracker::new(enhanced, release_after),
        })
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let mut restore = || -> Result<(), io::Error> {
            if self.enhanced {
                execute!(stdout, PopKeyboardEnhancementFlags)?;
            }
            execute!(stdout, DisableFocusChange)?;
            terminal::disable_raw_mode()
        };
        if let Err(e) = restore() {
            log::warn!("couldn't restore the terminal: {}", e);
        }
    }
}

impl Input for TermInput {
    fn poll(&mut self, timeout: Duration) -> Result<Vec<InputEvent>, io::Error> {
        let mut events = Vec::new();
        let mut wait = timeout;
        while event::poll(wait)? {
            let evt = event::read()?;
            events.extend(self.tracker.translate(evt, Instant::now()));
            wait = Duration::ZERO;
        }
        events.extend(self.tracker.expire(Instant::now()));
        Ok(events)
    }
}

/// dummy Input implementation for testing; hands out one batch per poll
#[derive(Debug, Default)]
pub struct DummyInput {
    batches: VecDeque<Vec<InputEvent>>,
}

impl DummyInput {
    pub fn new(batches: Vec<Vec<InputEvent>>) -> Self {
        DummyInput {
            batches: batches.into(),
        }
    }

    pub fn push(&mut self, batch: Vec<InputEvent>) {
        self.batches.push_back(batch);
    }
}

impl Input for DummyInput {
    fn poll(&mut self, _timeout: Duration) -> Result<Vec<InputEvent>, io::Error> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}
