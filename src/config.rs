use crate::keys::KeyMap;
use crate::scheduler::{FrameScheduler, IntervalScheduler, Scheduler};
use crate::video::{Palette, Rgb};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ROM_DIR: &str = "roms";
pub const DEFAULT_BATCH: u32 = 10;
pub const DEFAULT_REFRESH_HZ: u32 = 60;
pub const DEFAULT_INTERVAL_MS: u64 = 2;
pub const DEFAULT_RELEASE_MS: u64 = 300;

/// how ticks are paced
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Timing {
    /// once per display refresh; pauses while the terminal is unfocused
    Frame,
    /// a fixed period, whether or not anyone is looking
    Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PaletteName {
    Green,
    Amber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyLayout {
    /// 1234/qwer/asdf/zxcv, shaped like the COSMAC VIP keypad
    Qwerty,
    /// 0-9 and a-f, the digit printed on each key
    Hex,
}

#[derive(Parser, Debug)]
#[command(version, about = "Run CHIP-8 programs in a terminal", long_about = None)]
pub struct Args {
    #[arg(long, default_value = DEFAULT_ROM_DIR, help = "Directory of ROM files")]
    pub rom_dir: PathBuf,

    #[arg(short, long, help = "ROM to load at startup (defaults to the first in --rom-dir)")]
    pub rom: Option<String>,

    #[arg(long, value_enum, default_value_t = Timing::Frame, help = "How ticks are paced")]
    pub timing: Timing,

    #[arg(
        short,
        long,
        default_value_t = DEFAULT_BATCH,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Instructions executed per tick"
    )]
    pub batch: u32,

    #[arg(
        long,
        default_value_t = DEFAULT_REFRESH_HZ,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Ticks per second with --timing frame"
    )]
    pub refresh_hz: u32,

    #[arg(
        long,
        default_value_t = DEFAULT_INTERVAL_MS,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Milliseconds between ticks with --timing interval"
    )]
    pub interval_ms: u64,

    #[arg(long, value_enum, default_value_t = PaletteName::Green, help = "Colour scheme")]
    pub palette: PaletteName,

    #[arg(long, help = "Colour of lit pixels as RRGGBB, overrides --palette")]
    pub on_color: Option<Rgb>,

    #[arg(long, help = "Colour of unlit pixels as RRGGBB, overrides --palette")]
    pub off_color: Option<Rgb>,

    #[arg(
        long,
        value_enum,
        default_value_t = KeyLayout::Qwerty,
        help = "Keyboard to keypad mapping"
    )]
    pub keymap: KeyLayout,

    #[arg(
        long,
        default_value_t = DEFAULT_RELEASE_MS,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Quiet milliseconds before a key counts as released, where the terminal can't tell"
    )]
    pub release_ms: u64,

    #[arg(long, help = "Start running as soon as the first ROM is loaded")]
    pub autostart: bool,

    #[arg(
        long,
        help = "Write the log here; without it the log is discarded to keep the screen clean"
    )]
    pub log_file: Option<PathBuf>,
}

/// everything the session needs to know, resolved from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub rom_dir: PathBuf,
    pub rom: Option<String>,
    pub timing: Timing,
    pub batch: u32,
    pub refresh_hz: u32,
    pub interval: Duration,
    pub palette: Palette,
    pub keymap: KeyMap,
    pub release_after: Duration,
    pub autostart: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rom_dir: PathBuf::from(DEFAULT_ROM_DIR),
            rom: None,
            timing: Timing::Frame,
            batch: DEFAULT_BATCH,
            refresh_hz: DEFAULT_REFRESH_HZ,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            palette: Palette::GREEN,
            keymap: KeyMap::qwerty(),
            release_after: Duration::from_millis(DEFAULT_RELEASE_MS),
            autostart: false,
            log_file: None,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let base = match args.palette {
            PaletteName::Green => Palette::GREEN,
            PaletteName::Amber => Palette::AMBER,
        };
        let palette = Palette::new(
            args.on_color.unwrap_or(base.on),
            args.off_color.unwrap_or(base.off),
        );
        let keymap = match args.keymap {
            KeyLayout::Qwerty => KeyMap::qwerty(),
            KeyLayout::Hex => KeyMap::hex(),
        };
        Config {
            rom_dir: args.rom_dir,
            rom: args.rom,
            timing: args.timing,
            batch: args.batch.max(1),
            refresh_hz: args.refresh_hz.max(1),
            interval: Duration::from_millis(args.interval_ms.max(1)),
            palette,
            keymap,
            release_after: Duration::from_millis(args.release_ms.max(1)),
            autostart: args.autostart,
            log_file: args.log_file,
        }
    }
}

impl Config {
    pub fn scheduler(&self) -> Box<dyn Scheduler> {
        match self.timing {
            Timing::Frame => Box::new(FrameScheduler::new(self.refresh_hz)),
            Timing::Interval => Box::new(IntervalScheduler::new(self.interval)),
        }
    }

    /// Where log output goes: the `--log-file` if there is one, otherwise
    /// nowhere. Stderr is the terminal the display has taken over.
    pub fn log_writer(&self) -> Result<Box<dyn Write + Send>, io::Error> {
        match &self.log_file {
            Some(path) => Ok(Box::new(File::create(path)?)),
            None => Ok(Box::new(io::sink())),
        }
    }

    /// cycles between timer decrements, so the timers run at 60Hz
    pub fn timer_divider(&self) -> u32 {
        let ticks_per_sec = match self.timing {
            Timing::Frame => self.refresh_hz as f64,
            Timing::Interval => 1.0 / self.interval.as_secs_f64(),
        };
        let cycles_per_sec = ticks_per_sec * self.batch as f64;
        (cycles_per_sec / 60.0).round().max(1.0) as u32
    }
}
