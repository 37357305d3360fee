//! I/O dispatcher: a 16-bit handler id -> handler registry, invoked by a
//! word write to the I/O-request register (spec.md §4.7).
//!
//! Grounded on `original_source/machine/io.go`'s `IODispatcher`. Device state
//! there is reached through a registered handler's own fields (fine — each
//! handler owns only its own parameters) except for the graphics device,
//! whose handlers close over a package-level global (`graphics.go`, flagged
//! in its own comment: "I feel SO DIRTY having a global var"). This port has
//! no such global: every handler lives behind the `IoHandler` trait object
//! stored in the dispatcher's registry, so any state a future handler needs
//! is a field on that handler, owned by the dispatcher that holds it.

use std::collections::HashMap;

use super::memory::RawMemory;

pub const ERR_NO_ERR: u16 = 0;
pub const ERR_INVALID_HANDLER: u16 = 1;
pub const ERR_IO_ERROR: u16 = 2;

pub const STDOUT_DEVICE_ID: u16 = 0x0100;
pub const STDOUT_COMMAND_WRITE: u16 = 1;

/// A single I/O command handler. `addr` is the address of the command's own
/// parameter block (its first field is the handler id itself, already
/// consumed by the dispatcher to look the handler up).
pub trait IoHandler {
    fn handle(&mut self, memory: &mut RawMemory, addr: u16) -> u16;
}

pub struct IoDispatcher {
    handlers: HashMap<u16, Box<dyn IoHandler>>,
    status: u16,
    trace: bool,
}

impl IoDispatcher {
    pub fn new() -> Self {
        IoDispatcher {
            handlers: HashMap::new(),
            status: ERR_NO_ERR,
            trace: false,
        }
    }

    /// The default device set for this release: stdout-write plus whatever
    /// the caller registers. Graphics/audio handlers are out of scope
    /// (spec.md §1's explicit non-goal) and are never wired in here.
    pub fn with_stdout() -> Self {
        let mut d = IoDispatcher::new();
        d.register(STDOUT_DEVICE_ID | STDOUT_COMMAND_WRITE, Box::new(StdoutWriteHandler));
        d
    }

    pub fn register(&mut self, id: u16, handler: Box<dyn IoHandler>) {
        self.handlers.insert(id, handler);
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Dispatches the request whose parameter block starts at `addr`
    /// (`original_source/machine/io.go`'s `execIORequest`).
    pub fn dispatch(&mut self, memory: &mut RawMemory, addr: u16) {
        let id = memory.get_word(addr);
        let Some(handler) = self.handlers.get_mut(&id) else {
            self.status = ERR_INVALID_HANDLER;
            eprintln!("io request to unknown handler ({id:#06x})");
            return;
        };
        let code = handler.handle(memory, addr);
        if self.trace || code != ERR_NO_ERR {
            eprintln!("io request (handler: {id:#06x}, status: {code})");
        }
        self.status = code;
    }
}

impl Default for IoDispatcher {
    fn default() -> Self {
        IoDispatcher::new()
    }
}

/// Writes a NUL-terminated string to stdout. Parameter block:
/// `{ id: u16, pz_string: u16 }` (`original_source/machine/stdout.go`).
pub struct StdoutWriteHandler;

impl IoHandler for StdoutWriteHandler {
    fn handle(&mut self, memory: &mut RawMemory, addr: u16) -> u16 {
        use std::io::Write;
        let pz_string = memory.get_word(addr.wrapping_add(2));
        let text = memory.read_z_string(pz_string);
        let mut stdout = std::io::stdout();
        match stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
            Ok(()) => ERR_NO_ERR,
            Err(_) => ERR_IO_ERROR,
        }
    }
}
