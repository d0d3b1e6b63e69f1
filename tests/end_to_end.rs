mod common;

use chip8_frontend::input::InputEvent;
use chip8_frontend::{Chip8Interpreter, MemoryRomSource, Palette, SessionError, WIDTH};
use common::{session, Call, FakeMachine, MS, WAIT};
use std::time::{Duration, Instant};

fn assert_only_lit(frame: &[u8], lit: usize, palette: &Palette) {
    let on = [palette.on.0, palette.on.1, palette.on.2, 255];
    let off = [palette.off.0, palette.off.1, palette.off.2, 255];
    for (i, px) in frame.chunks_exact(4).enumerate() {
        let expected = if i == lit { on } else { off };
        assert_eq!(px, expected, "pixel {}", i);
    }
}

#[test]
fn one_tick_lights_one_pixel() -> Result<(), SessionError> {
    let lit = 3 * WIDTH + 5;
    let mut s = session(
        FakeMachine::lighting(lit),
        1,
        MemoryRomSource::new().with("DOT", &[0x12, 0x00]),
    );
    s.boot(Some("DOT"), false, WAIT)?;
    let t0 = Instant::now();
    s.start(t0)?;
    assert!(s.pump(t0 + 2 * MS, Duration::ZERO)?);

    assert_eq!(s.controller().ticks(), 1);
    let cycles = s.machine().calls.iter().filter(|c| **c == Call::Cycle).count();
    assert_eq!(cycles, 1);
    let frame = s.display().last.clone().expect("a frame was drawn");
    assert_only_lit(frame.as_bytes(), lit, &Palette::GREEN);
    Ok(())
}

#[test]
fn interpreter_draws_a_sprite() -> Result<(), SessionError> {
    // I = 0x20a; v0 = 5; v1 = 3; draw 1 row at (v0, v1); spin; sprite 0x80
    let rom = [
        0xa2, 0x0a, 0x60, 0x05, 0x61, 0x03, 0xd0, 0x11, 0x12, 0x08, 0x80,
    ];
    let mut s = session(
        Chip8Interpreter::with_seed(1),
        4,
        MemoryRomSource::new().with("DOT", &rom),
    );
    s.boot(Some("DOT"), true, WAIT)?;
    let t0 = Instant::now();
    s.pump(t0 + 2 * MS, Duration::ZERO)?;
    // a few more ticks just spin
    s.pump(t0 + 4 * MS, Duration::ZERO)?;

    assert_eq!(s.machine().program_counter(), 0x208);
    let frame = s.display().last.clone().expect("a frame was drawn");
    assert_only_lit(frame.as_bytes(), 3 * WIDTH + 5, &Palette::GREEN);
    Ok(())
}

#[test]
fn keys_pass_through_once_each() -> Result<(), SessionError> {
    let mut s = session(FakeMachine::new(), 1, MemoryRomSource::new());
    s.input_mut().push(vec![
        InputEvent::KeyDown('1'),
        InputEvent::KeyUp('1'),
        InputEvent::KeyDown('g'),
        InputEvent::KeyUp('g'),
    ]);
    s.pump(Instant::now(), Duration::ZERO)?;
    assert_eq!(s.machine().key_calls(), vec![Call::KeyDown(1), Call::KeyUp(1)]);
    Ok(())
}

#[test]
fn nothing_cycles_after_stop() -> Result<(), SessionError> {
    let mut s = session(
        FakeMachine::new(),
        3,
        MemoryRomSource::new().with("SPIN", &[0x12, 0x00]),
    );
    s.boot(Some("SPIN"), true, WAIT)?;
    let t0 = Instant::now();
    for n in 1..=5 {
        s.pump(t0 + 2 * n * MS, Duration::ZERO)?;
    }
    s.stop()?;
    let before = s.machine().calls.len();
    for n in 6..=20 {
        s.pump(t0 + 2 * n * MS, Duration::ZERO)?;
    }
    assert_eq!(s.machine().calls.len(), before);
    assert_eq!(s.controller().ticks(), 5);
    Ok(())
}
