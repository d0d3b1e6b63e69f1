//! ROM byte sources and the fetch -> reset -> load pipeline.
//!
//! Fetching is the only slow thing the front end does, so it happens on a
//! worker thread. The result comes back over a channel and is installed by
//! the event loop between ticks, which keeps a reset from ever landing in
//! the middle of a batch of cycles.

use crate::machine::{Machine, MachineError};
use crate::memory::CHIP8_MAX_PROGRAM_BYTES;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RomError {
    #[error("no ROM called '{0}'")]
    NotFound(String),

    #[error("couldn't fetch ROM '{name}': {source}")]
    Transport {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("ROM '{name}' is {size} bytes, only {max} fit in memory")]
    TooLarge { name: String, size: usize, max: usize },

    #[error("couldn't load ROM '{name}': {source}")]
    Install {
        name: String,
        #[source]
        source: MachineError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rom {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// somewhere ROM images can be fetched from by name
pub trait RomSource: Send + Sync {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, RomError>;

    /// every name `fetch` would accept, sorted
    fn list(&self) -> Result<Vec<String>, RomError>;
}

/// a directory of ROM files, one per name
#[derive(Debug, Clone)]
pub struct DirRomSource {
    dir: PathBuf,
}

impl DirRomSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirRomSource { dir: dir.into() }
    }
}

/// names are plain file names; anything that could walk out of the
/// directory is treated as missing
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

impl RomSource for DirRomSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, RomError> {
        if !is_plain_name(name) {
            return Err(RomError::NotFound(name.to_string()));
        }
        let path = self.dir.join(name);
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RomError::NotFound(name.to_string()),
            _ => RomError::Transport {
                name: name.to_string(),
                source: e,
            },
        })
    }

    fn list(&self) -> Result<Vec<String>, RomError> {
        let transport = |e| RomError::Transport {
            name: self.dir.display().to_string(),
            source: e,
        };
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(transport)? {
            let entry = entry.map_err(transport)?;
            if !entry.file_type().map_err(transport)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// ROMs held in memory, mostly for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryRomSource {
    roms: HashMap<String, Vec<u8>>,
}

impl MemoryRomSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, bytes: &[u8]) -> Self {
        self.roms.insert(name.to_string(), bytes.to_vec());
        self
    }
}

impl RomSource for MemoryRomSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, RomError> {
        self.roms
            .get(name)
            .cloned()
            .ok_or_else(|| RomError::NotFound(name.to_string()))
    }

    fn list(&self) -> Result<Vec<String>, RomError> {
        let mut names: Vec<String> = self.roms.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// reset the machine and load a ROM into it, or leave it untouched if the
/// ROM can't fit
pub fn install(machine: &mut impl Machine, rom: &Rom) -> Result<(), RomError> {
    if rom.bytes.len() > CHIP8_MAX_PROGRAM_BYTES {
        return Err(RomError::TooLarge {
            name: rom.name.clone(),
            size: rom.bytes.len(),
            max: CHIP8_MAX_PROGRAM_BYTES,
        });
    }
    machine.reset();
    machine.load(&rom.bytes).map_err(|source| RomError::Install {
        name: rom.name.clone(),
        source,
    })?;
    log::info!("loaded {} ({} bytes)", rom.name, rom.bytes.len());
    Ok(())
}

type Fetched = (u64, Result<Rom, RomError>);

/// Runs fetches in the background. Only the newest request counts: results
/// for anything asked for earlier are dropped when they arrive.
pub struct RomLoader {
    source: Arc<dyn RomSource>,
    sender: Sender<Fetched>,
    receiver: Receiver<Fetched>,
    requests: u64,
    pending: Option<u64>,
}

impl RomLoader {
    pub fn new(source: Arc<dyn RomSource>) -> Self {
        let (sender, receiver) = mpsc::channel();
        RomLoader {
            source,
            sender,
            receiver,
            requests: 0,
            pending: None,
        }
    }

    pub fn list(&self) -> Result<Vec<String>, RomError> {
        self.source.list()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// start fetching a ROM; the result turns up in `poll`
    pub fn request(&mut self, name: &str) -> Result<(), RomError> {
        self.requests += 1;
        let id = self.requests;
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        let owned = name.to_string();
        thread::Builder::new()
            .name(format!("rom-fetch-{}", id))
            .spawn(move || {
                let result = source.fetch(&owned).map(|bytes| Rom { name: owned, bytes });
                // the loader may be gone by now; nobody is left to tell
                let _ = sender.send((id, result));
            })
            .map_err(|source| RomError::Transport {
                name: name.to_string(),
                source,
            })?;
        log::debug!("fetching {} (request {})", name, id);
        self.pending = Some(id);
        Ok(())
    }

    /// the outcome of the newest request, once it has arrived
    pub fn poll(&mut self) -> Option<Result<Rom, RomError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(fetched) => {
                    if let Some(result) = self.accept(fetched) {
                        return Some(result);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// as `poll`, but wait up to `timeout` for the result
    pub fn wait(&mut self, timeout: Duration) -> Option<Result<Rom, RomError>> {
        self.pending?;
        loop {
            match self.receiver.recv_timeout(timeout) {
                Ok(fetched) => {
                    if let Some(result) = self.accept(fetched) {
                        return Some(result);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    fn accept(&mut self, (id, result): Fetched) -> Option<Result<Rom, RomError>> {
        if self.pending != Some(id) {
            log::debug!("dropping result of superseded request {}", id);
            return None;
        }
        self.pending = None;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Chip8Interpreter;
    use crate::machine::PixelState;
    use std::io::Write;

    const WAIT: Duration = Duration::from_secs(5);

    /// remembers the order machine calls arrive in
    #[derive(Default)]
    struct CallLog {
        calls: Vec<String>,
    }

    impl Machine for CallLog {
        fn reset(&mut self) {
            self.calls.push("reset".into());
        }
        fn load(&mut self, program: &[u8]) -> Result<(), MachineError> {
            self.calls.push(format!("load {}", program.len()));
            Ok(())
        }
        fn cycle(&mut self) -> Result<(), MachineError> {
            Ok(())
        }
        fn pixels(&self) -> &PixelState {
            unreachable!("pixels aren't read while installing")
        }
        fn key_down(&mut self, _key: u8) {}
        fn key_up(&mut self, _key: u8) {}
    }

    #[test]
    fn test_install_resets_then_loads() -> Result<(), RomError> {
        let mut vm = CallLog::default();
        let rom = Rom {
            name: "PONG".into(),
            bytes: vec![0x12, 0x00],
        };
        install(&mut vm, &rom)?;
        assert_eq!(vm.calls, vec!["reset", "load 2"]);
        Ok(())
    }

    #[test]
    fn test_oversize_rom_leaves_machine_untouched() {
        let mut vm = CallLog::default();
        let rom = Rom {
            name: "HUGE".into(),
            bytes: vec![0; 4000],
        };
        assert!(matches!(
            install(&mut vm, &rom),
            Err(RomError::TooLarge { size: 4000, max: 3584, .. })
        ));
        assert!(vm.calls.is_empty());
    }

    #[test]
    fn test_install_into_interpreter() -> Result<(), RomError> {
        let mut vm = Chip8Interpreter::new();
        let old = Rom {
            name: "A".into(),
            bytes: vec![0x60, 0x05],
        };
        let new = Rom {
            name: "B".into(),
            bytes: vec![0x61, 0x07],
        };
        install(&mut vm, &old)?;
        vm.cycle().unwrap();
        install(&mut vm, &new)?;
        assert_eq!(vm.program_counter(), 0x200);
        assert_eq!(vm.register(0), 0);
        vm.cycle().unwrap();
        assert_eq!(vm.register(1), 7);
        Ok(())
    }

    #[test]
    fn test_dir_source_fetch_and_list() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        fs::File::create(dir.path().join("PONG"))?.write_all(&[0x6a, 0x02])?;
        fs::File::create(dir.path().join("BRIX"))?.write_all(&[0x00, 0xe0])?;
        fs::create_dir(dir.path().join("saves"))?;

        let source = DirRomSource::new(dir.path());
        assert_eq!(source.list()?, vec!["BRIX", "PONG"]);
        assert_eq!(source.fetch("PONG")?, vec![0x6a, 0x02]);
        assert!(matches!(source.fetch("TETRIS"), Err(RomError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_dir_source_rejects_paths() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("roms"))?;
        fs::File::create(dir.path().join("secret"))?.write_all(b"nope")?;

        let source = DirRomSource::new(dir.path().join("roms"));
        for name in ["../secret", "..", ".", "", "a/b", "a\\b"] {
            assert!(matches!(source.fetch(name), Err(RomError::NotFound(_))), "{}", name);
        }
        Ok(())
    }

    #[test]
    fn test_missing_dir_is_a_transport_error() {
        let source = DirRomSource::new("/this/does/not/exist");
        assert!(matches!(source.list(), Err(RomError::Transport { .. })));
    }

    #[test]
    fn test_loader_delivers_in_background() {
        let source = MemoryRomSource::new().with("PONG", &[1, 2, 3]);
        let mut loader = RomLoader::new(Arc::new(source));
        assert!(!loader.is_pending());
        loader.request("PONG").unwrap();
        assert!(loader.is_pending());
        let rom = loader.wait(WAIT).unwrap().unwrap();
        assert_eq!(rom.name, "PONG");
        assert_eq!(rom.bytes, vec![1, 2, 3]);
        assert!(!loader.is_pending());
        assert!(loader.poll().is_none());
    }

    #[test]
    fn test_loader_reports_not_found() {
        let mut loader = RomLoader::new(Arc::new(MemoryRomSource::new()));
        loader.request("UFO").unwrap();
        assert!(matches!(loader.wait(WAIT), Some(Err(RomError::NotFound(n))) if n == "UFO"));
    }

    #[test]
    fn test_newest_request_wins() {
        let source = MemoryRomSource::new().with("A", &[0xa]).with("B", &[0xb]);
        let mut loader = RomLoader::new(Arc::new(source));
        loader.request("A").unwrap();
        loader.request("B").unwrap();
        let rom = loader.wait(WAIT).unwrap().unwrap();
        assert_eq!(rom.name, "B");
        // A's result, if it turns up, is dropped
        assert!(loader.wait(Duration::from_millis(50)).is_none());
    }

    #[test]
    fn test_wait_without_request_returns_at_once() {
        let mut loader = RomLoader::new(Arc::new(MemoryRomSource::new()));
        assert!(loader.wait(WAIT).is_none());
    }
}
