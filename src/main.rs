use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use env_logger::{Env, Target};

use chip8_frontend::config::{Args, Config};
use chip8_frontend::display::TermDisplay;
use chip8_frontend::input::TermInput;
use chip8_frontend::{
    Chip8Interpreter, DirRomSource, KeyBridge, LoopController, RomLoader, Session, HEIGHT, WIDTH,
};

// how long to hold the first frame back waiting for the startup ROM
const BOOT_WAIT: Duration = Duration::from_secs(2);

fn init_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .target(Target::Pipe(config.log_writer()?))
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let config: Config = Args::parse().into();
    init_logging(&config)?;
    log::info!("starting with {:?}", config);

    let mut machine = Chip8Interpreter::new();
    machine.set_timer_divider(config.timer_divider());
    let controller = LoopController::new(config.scheduler(), config.batch, config.palette);
    let bridge = KeyBridge::new(config.keymap.clone());
    let loader = RomLoader::new(Arc::new(DirRomSource::new(config.rom_dir.clone())));

    // initialise the terminal last, so errors above print normally
    let input = TermInput::new(config.release_after)?;
    let display = TermDisplay::new(WIDTH, HEIGHT)?;

    let mut session = Session::new(machine, controller, bridge, loader, display, input);
    session.boot(config.rom.as_deref(), config.autostart, BOOT_WAIT)?;
    session.run()?;
    Ok(())
}
