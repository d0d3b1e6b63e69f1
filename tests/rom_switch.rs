mod common;

use chip8_frontend::input::{Command, InputEvent};
use chip8_frontend::{
    Chip8Interpreter, DirRomSource, MemoryRomSource, RomError, RomSource, SessionError,
};
use common::{session, Call, FakeMachine, MS, WAIT};
use std::fs;
use std::thread;
use std::time::{Duration, Instant};

/// hands out ROMs only after a delay, so ticks keep running meanwhile
struct SlowSource {
    inner: MemoryRomSource,
    delay: Duration,
}

impl RomSource for SlowSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, RomError> {
        thread::sleep(self.delay);
        self.inner.fetch(name)
    }

    fn list(&self) -> Result<Vec<String>, RomError> {
        self.inner.list()
    }
}

#[test]
fn switch_lands_between_batches() -> Result<(), SessionError> {
    let batch = 3;
    let source = SlowSource {
        inner: MemoryRomSource::new()
            .with("A", &[0x12, 0x00])
            .with("B", &[0x12, 0x00, 0x00, 0xe0]),
        delay: 20 * MS,
    };
    let mut s = session(FakeMachine::new(), batch, source);
    s.boot(Some("A"), true, WAIT)?;

    let t0 = Instant::now();
    s.input_mut().push(vec![InputEvent::Command(Command::NextRom)]);
    let mut n = 1;
    while s.current_rom() != Some("B") {
        assert!(n < 5000, "B never arrived");
        s.pump(t0 + 2 * n * MS, Duration::ZERO)?;
        thread::sleep(MS);
        n += 1;
    }
    assert!(s.controller().is_running());
    assert!(s.controller().ticks() > 0);

    // every reset sits on a batch boundary, straight before its load
    let calls = &s.machine().calls;
    let mut cycles = 0;
    for (i, call) in calls.iter().enumerate() {
        match call {
            Call::Cycle => cycles += 1,
            Call::Reset => {
                assert_eq!(cycles % batch, 0, "reset after {} cycles", cycles);
                assert!(matches!(calls.get(i + 1), Some(Call::Load(_))));
            }
            _ => {}
        }
    }
    assert_eq!(calls.iter().filter(|c| **c == Call::Load(4)).count(), 1);

    // and it keeps going with the new program
    let before = s.controller().ticks();
    s.pump(t0 + 2 * (n + 1) * MS, Duration::ZERO)?;
    assert_eq!(s.controller().ticks(), before + 1);
    Ok(())
}

#[test]
fn faulting_rom_from_a_directory() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    // 0xffff isn't an instruction
    fs::write(dir.path().join("a_bad.ch8"), [0xffu8, 0xff])?;
    fs::write(dir.path().join("b_good.ch8"), [0x12u8, 0x00])?;
    fs::write(dir.path().join("c_huge.ch8"), vec![0u8; 4000])?;
    let mut s = session(
        Chip8Interpreter::with_seed(3),
        1,
        DirRomSource::new(dir.path()),
    );
    assert_eq!(s.roms(), ["a_bad.ch8", "b_good.ch8", "c_huge.ch8"]);

    s.boot(None, true, WAIT)?;
    assert_eq!(s.current_rom(), Some("a_bad.ch8"));
    let t0 = Instant::now();
    s.pump(t0 + 2 * MS, Duration::ZERO)?;
    assert!(!s.controller().is_running());
    let shown = s.display().title.clone();
    assert!(shown.contains("stopped") && shown.contains("unknown opcode"), "{}", shown);

    // step on to something that works
    s.input_mut().push(vec![InputEvent::Command(Command::NextRom)]);
    s.pump(t0 + 3 * MS, Duration::ZERO)?;
    s.settle(WAIT);
    assert_eq!(s.current_rom(), Some("b_good.ch8"));
    s.input_mut().push(vec![InputEvent::Command(Command::Toggle)]);
    s.pump(t0 + 4 * MS, Duration::ZERO)?;
    s.pump(t0 + 6 * MS, Duration::ZERO)?;
    assert!(s.controller().is_running());
    assert_eq!(s.machine().program_counter(), 0x200);

    // too big to fit: reported, and the running program carries on
    s.input_mut().push(vec![InputEvent::Command(Command::NextRom)]);
    s.pump(t0 + 7 * MS, Duration::ZERO)?;
    s.settle(WAIT);
    assert_eq!(s.current_rom(), Some("b_good.ch8"));
    assert!(s.controller().is_running());
    let shown = s.display().title.clone();
    assert!(shown.contains("only 3584 fit"), "{}", shown);
    Ok(())
}

#[test]
fn unsafe_names_are_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut s = session(FakeMachine::new(), 1, DirRomSource::new(dir.path()));
    s.boot(Some("../etc/passwd"), false, WAIT)?;
    assert_eq!(s.current_rom(), None);
    assert_eq!(s.last_error(), Some("no ROM called '../etc/passwd'"));
    assert!(s.machine().calls.is_empty());
    Ok(())
}
