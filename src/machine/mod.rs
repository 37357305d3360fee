//! # Interpreter
//!
//! Fetch-decode-execute loop over a 64 KiB byte image, memory-mapped PC/SP/
//! FP/IO/RNG registers at offsets 0-15, and an assertion mode used by the
//! test runner. Grounded on `original_source/machine/machine.go`'s `Machine`
//! (register layout, `Run`, `fetchOperand`, flag updates) — read in full for
//! the exact pre-advance-PC-before-execute ordering and the `OffsetByte`
//! decode formula, which is the algebraic inverse of the linker's
//! `value - addr + 1` encode formula (`src/linker/mod.rs`).

pub mod io;
pub mod memory;
pub mod rng;


use crate::error::AsmError;
use crate::isa::{self, Mode, Op};
use io::IoDispatcher;
use memory::RawMemory;
use rng::Rng;

// Register layout (spec.md §4.6): offset 0 = PC, 2 = SP, 4 = FP, 6 = IO
// request, 8 = IO status, 10 = RNG, 12-15 reserved. `get_byte`/`get_word`/
// `put_byte`/`put_word` below dispatch on `addr / 2` against this layout.

/// A failed `sea`-armed `cmp`: the PC of that `cmp`, and the operand values
/// it compared (spec.md §4.6: "expected = value₂, actual = value₁").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertionFailure {
    pub pc: u16,
    pub expected: i64,
    pub actual: i64,
}

/// A snapshot of register/flag state (`original_source/machine/machine.go`'s
/// `Flags`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub pc: u16,
    pub sp: u16,
    pub fp: u16,
    pub negative: bool,
    pub zero: bool,
    pub carry: bool,
    pub bytes: bool,
}

/// The interpreter: one 64 KiB memory image, its register/flag state, an I/O
/// dispatcher, and the assertion-mode bookkeeping the test runner reads.
pub struct Machine {
    memory: RawMemory,
    io: IoDispatcher,
    rng: Rng,
    pc: u16,
    sp: u16,
    fp: u16,
    negative: bool,
    zero: bool,
    carry: bool,
    bytes_mode: bool,
    step_mode: bool,
    assertion_pending: bool,
    assertion_failures: Vec<AssertionFailure>,
}

/// The result of resolving one operand: its address, its (possibly
/// bytes-mode-masked) value, and how many instruction-stream bytes it
/// consumed.
struct Fetched {
    address: u16,
    value: i64,
    bytes: u16,
}

fn read_word_or(image: &[u8], addr: u16, default: u16) -> u16 {
    let addr = addr as usize;
    if image.len() > addr + 1 {
        u16::from_le_bytes([image[addr], image[addr + 1]])
    } else {
        default
    }
}

impl Machine {
    /// A machine with the default device set (stdout-write) and an RNG
    /// seeded from the given value. `image` is a linked program's code
    /// (`LinkResult::code`); it may be shorter than 64 KiB.
    pub fn new(image: &[u8], rng_seed: u64) -> Self {
        Machine::with_io(IoDispatcher::with_stdout(), image, rng_seed)
    }

    /// A machine with a caller-supplied I/O dispatcher, for substituting or
    /// instrumenting device handlers (spec.md §4.7: "rewrites may substitute
    /// any library providing the same primitives").
    pub fn with_io(io: IoDispatcher, image: &[u8], rng_seed: u64) -> Self {
        Machine {
            memory: RawMemory::new(image),
            io,
            rng: Rng::new(rng_seed),
            pc: read_word_or(image, 0, 0x100),
            sp: read_word_or(image, 2, 0xFFFF),
            fp: read_word_or(image, 4, 0),
            negative: false,
            zero: false,
            carry: false,
            bytes_mode: false,
            step_mode: false,
            assertion_pending: false,
            assertion_failures: Vec::new(),
        }
    }

    /// Resets stack/frame and assertion state between tests, per spec.md §5:
    /// "the test runner ... must reset SP to 0xFFFF, FP to 0, and the
    /// assertion counters between tests."
    pub fn reset_for_test(&mut self) {
        self.sp = 0xFFFF;
        self.fp = 0;
        self.negative = false;
        self.zero = false;
        self.carry = false;
        self.bytes_mode = false;
        self.assertion_pending = false;
        self.assertion_failures.clear();
    }

    pub fn flags(&self) -> Flags {
        Flags {
            pc: self.pc,
            sp: self.sp,
            fp: self.fp,
            negative: self.negative,
            zero: self.zero,
            carry: self.carry,
            bytes: self.bytes_mode,
        }
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn assertion_failures(&self) -> &[AssertionFailure] {
        &self.assertion_failures
    }

    pub fn io_status(&self) -> u16 {
        self.io.status()
    }

    /// Reads one byte at a raw memory address, bypassing register shadowing
    /// — for host-side inspection of program output (e.g. a test's result
    /// buffer), not used by the fetch-decode-execute loop itself.
    pub fn peek_byte(&self, addr: u16) -> u8 {
        self.memory.get_byte(addr)
    }

    pub fn peek_word(&self, addr: u16) -> u16 {
        self.memory.get_word(addr)
    }

    pub fn poke_byte(&mut self, addr: u16, value: u8) {
        self.memory.put_byte(addr, value);
    }

    pub fn poke_word(&mut self, addr: u16, value: u16) {
        self.memory.put_word(addr, value);
    }

    /// Runs from the current PC until `hlt` (or a guest fault).
    pub fn run(&mut self) -> Result<(), AsmError> {
        self.step_mode = false;
        self.run_loop()
    }

    /// Runs from `pc` until `hlt` (or a guest fault).
    pub fn run_at(&mut self, pc: u16) -> Result<(), AsmError> {
        self.step_mode = false;
        self.pc = pc;
        self.run_loop()
    }

    /// Executes exactly one instruction at `addr` and returns the new PC.
    pub fn step(&mut self, addr: u16) -> Result<u16, AsmError> {
        self.step_mode = true;
        self.pc = addr;
        self.run_loop()?;
        Ok(self.pc)
    }

    /// Calls the function at `pc` as a subroutine, without resetting any
    /// state first (`original_source/test/executor.go`'s `callAddress`):
    /// pushes a sentinel return address of `0x0000` so the callee's closing
    /// `ret`/`rst` lands on guaranteed-zero (halting) memory rather than
    /// undefined stack contents, then runs. Relies on the convention — used
    /// throughout spec.md's own worked examples — that real code is linked
    /// starting at `org 0x100` or later, leaving address 0 permanently zero.
    /// The host CLI test runner uses this directly for `test_setup`/
    /// `test_teardown`, which run between a `reset_for_test` and the test
    /// body itself rather than bracketed by their own reset.
    pub fn call(&mut self, pc: u16) -> Result<(), AsmError> {
        self.push_u16(0);
        self.run_at(pc)
    }

    /// Runs a single test body at `pc` (spec.md §5's test-runner contract):
    /// `reset_for_test` followed by `call`.
    pub fn run_test(&mut self, pc: u16) -> Result<(), AsmError> {
        self.reset_for_test();
        self.call(pc)
    }

    fn run_loop(&mut self) -> Result<(), AsmError> {
        loop {
            let opcode_byte = self.get_byte(self.pc);
            if opcode_byte == 0 {
                return Ok(());
            }
            let encoding = isa::decode(opcode_byte);
            let instruction_pc = self.pc;

            let mut total_bytes: u16 = 0;
            let mut target: u16 = 0;
            let mut value1: i64 = 0;
            let mut value2: i64 = 0;

            if encoding.m1 != Mode::Implied {
                let fetched = self.fetch_operand(encoding.m1, self.pc.wrapping_add(1));
                target = fetched.address;
                value1 = fetched.value;
                total_bytes = fetched.bytes;
            }
            if encoding.m2 != Mode::Implied {
                let operand2_pc = self.pc.wrapping_add(1).wrapping_add(total_bytes);
                let fetched = self.fetch_operand(encoding.m2, operand2_pc);
                value2 = fetched.value;
                total_bytes = total_bytes.wrapping_add(fetched.bytes);
            }

            self.pc = self.pc.wrapping_add(total_bytes).wrapping_add(1);

            self.execute(encoding.op, encoding.m1, target, value1, value2, instruction_pc)?;

            if self.step_mode {
                return Ok(());
            }
        }
    }

    fn execute(
        &mut self,
        op: Op,
        m1: Mode,
        target: u16,
        value1: i64,
        value2: i64,
        instruction_pc: u16,
    ) -> Result<(), AsmError> {
        match op {
            Op::Hlt => {} // unreachable: opcode byte 0 returns before decode
            Op::Add => self.write_target(target, value1.wrapping_add(value2)),
            Op::Sub => self.write_target(target, value1.wrapping_sub(value2)),
            Op::Mul => self.write_target(target, value1.wrapping_mul(value2)),
            Op::Div => {
                if value2 == 0 {
                    return Err(AsmError::guest_fault("division by zero", instruction_pc));
                }
                self.write_target(target, value1 / value2);
            }
            Op::Cmp => {
                if self.assertion_pending {
                    self.assertion_pending = false;
                    if value1 != value2 {
                        self.assertion_failures.push(AssertionFailure {
                            pc: instruction_pc,
                            expected: value2,
                            actual: value1,
                        });
                    }
                }
                // Matches original_source/machine/machine.go literally: Cmp
                // always updates flags word-wide, even in bytes mode.
                self.update_flags_word(value1 - value2);
            }
            Op::And => self.write_target(target, value1 & value2),
            Op::Or => self.write_target(target, value1 | value2),
            Op::Xor => self.write_target(target, value1 ^ value2),
            Op::Cpy => self.write_target(target, value2),
            Op::Inc => self.write_target(target, value1.wrapping_add(1)),
            Op::Dec => self.write_target(target, value1.wrapping_sub(1)),
            Op::Psh => {
                self.sp = if self.bytes_mode { self.sp.wrapping_sub(1) } else { self.sp.wrapping_sub(2) };
                self.write_target(self.sp, value1);
            }
            Op::Pop => {
                if m1 == Mode::ImmediateByte {
                    self.sp = self.sp.wrapping_add(value1 as u16);
                } else {
                    let word = self.get_word(self.sp) as i64;
                    self.write_target(target, word);
                    self.sp = if self.bytes_mode { self.sp.wrapping_add(1) } else { self.sp.wrapping_add(2) };
                }
            }
            Op::Jmp => self.pc = value1 as u16,
            Op::Jeq => {
                if self.zero {
                    self.pc = value1 as u16;
                }
            }
            Op::Jne => {
                if !self.zero {
                    self.pc = value1 as u16;
                }
            }
            Op::Jge => {
                if !self.negative {
                    self.pc = value1 as u16;
                }
            }
            Op::Jlt => {
                if self.negative {
                    self.pc = value1 as u16;
                }
            }
            Op::Jcs => {
                if self.carry {
                    self.pc = value1 as u16;
                }
            }
            Op::Jcc => {
                if !self.carry {
                    self.pc = value1 as u16;
                }
            }
            Op::Jsr => {
                let return_pc = self.pc;
                self.push_u16(return_pc);
                self.pc = value1 as u16;
            }
            Op::Ret => self.pc = self.pop_u16(),
            Op::Sav => {
                let fp = self.fp;
                self.push_u16(fp);
                self.fp = self.sp;
                self.sp = self.sp.wrapping_sub(value1 as u16);
            }
            Op::Rst => {
                self.sp = self.fp;
                self.fp = self.pop_u16();
                self.pc = self.pop_u16();
            }
            Op::Seb => self.bytes_mode = true,
            Op::Clb => self.bytes_mode = false,
            Op::Sec => self.carry = true,
            Op::Clc => self.carry = false,
            Op::Sea => self.assertion_pending = true,
        }
        Ok(())
    }

    fn fetch_operand(&mut self, mode: Mode, pc: u16) -> Fetched {
        match mode {
            Mode::Implied => Fetched { address: 0, value: 0, bytes: 0 },
            Mode::Immediate => Fetched { address: pc, value: self.get_word(pc) as i64, bytes: 2 },
            Mode::ImmediateByte => Fetched { address: pc, value: self.read_i8(pc) as i64, bytes: 1 },
            Mode::OffsetByte => Fetched {
                address: pc,
                value: pc as i64 - 1 + self.read_i8(pc) as i64,
                bytes: 1,
            },
            Mode::Absolute => {
                let address = self.get_word(pc);
                Fetched { address, value: self.read_value_at(address), bytes: 2 }
            }
            Mode::Indirect => {
                let inner = self.get_word(pc);
                let address = self.get_word(inner);
                Fetched { address, value: self.read_value_at(address), bytes: 2 }
            }
            Mode::Relative => {
                let address = (self.fp as i32 + self.read_i8(pc) as i32) as u16;
                Fetched { address, value: self.read_value_at(address), bytes: 1 }
            }
            Mode::RelativeIndirect => {
                let inner = (self.fp as i32 + self.read_i8(pc) as i32) as u16;
                let address = self.get_word(inner);
                Fetched { address, value: self.read_value_at(address), bytes: 1 }
            }
        }
    }

    fn read_value_at(&mut self, address: u16) -> i64 {
        if self.bytes_mode {
            self.get_byte(address) as i64
        } else {
            self.get_word(address) as i64
        }
    }

    fn read_i8(&mut self, addr: u16) -> i8 {
        self.get_byte(addr) as i8
    }

    fn write_target(&mut self, addr: u16, value: i64) {
        if self.bytes_mode {
            self.put_byte(addr, (value & 0xFF) as u8);
            self.update_flags_byte(value);
        } else {
            self.put_word(addr, (value & 0xFFFF) as u16);
            self.update_flags_word(value);
        }
    }

    fn update_flags_byte(&mut self, value: i64) {
        self.negative = value & 0x80 != 0;
        self.zero = value == 0;
    }

    fn update_flags_word(&mut self, value: i64) {
        self.negative = value & 0x8000 != 0;
        self.zero = value == 0;
    }

    fn push_u16(&mut self, value: u16) {
        self.sp = self.sp.wrapping_sub(2);
        self.put_word(self.sp, value);
    }

    fn pop_u16(&mut self) -> u16 {
        let value = self.get_word(self.sp);
        self.sp = self.sp.wrapping_add(2);
        value
    }

    // --- memory-mapped register dispatch (spec.md §4.6's register table) ---

    fn get_byte(&mut self, addr: u16) -> u8 {
        if addr < 16 {
            match addr / 2 {
                0 => reg_get_byte(self.pc, addr),
                1 => reg_get_byte(self.sp, addr),
                2 => reg_get_byte(self.fp, addr),
                4 => reg_get_byte(self.io.status(), addr),
                5 => self.rng.next_byte(),
                // IO-request register (offset 3) is write-only: the dispatch
                // it triggers has no corresponding "last written" readback,
                // matching original_source/machine/io.go (its lastRegister
                // is wired up but never assigned). Offsets 6-7 are reserved.
                _ => 0,
            }
        } else {
            self.memory.get_byte(addr)
        }
    }

    fn get_word(&mut self, addr: u16) -> u16 {
        if addr < 16 {
            match addr / 2 {
                0 => self.pc,
                1 => self.sp,
                2 => self.fp,
                4 => self.io.status(),
                5 => self.rng.next_word(),
                _ => 0,
            }
        } else {
            self.memory.get_word(addr)
        }
    }

    fn put_byte(&mut self, addr: u16, value: u8) {
        if addr < 16 {
            match addr / 2 {
                0 => reg_put_byte(&mut self.pc, addr, value),
                1 => reg_put_byte(&mut self.sp, addr, value),
                2 => reg_put_byte(&mut self.fp, addr, value),
                // Byte-addressing the IO-request register or RNG isn't a
                // shape assembled code ever produces (both are always
                // word-accessed); ignored rather than reproducing the
                // original's hard panic on this path.
                _ => {}
            }
        } else {
            self.memory.put_byte(addr, value);
        }
    }

    fn put_word(&mut self, addr: u16, value: u16) {
        if addr < 16 {
            match addr / 2 {
                0 => self.pc = value,
                1 => self.sp = value,
                2 => self.fp = value,
                3 => self.io.dispatch(&mut self.memory, value),
                _ => {}
            }
        } else {
            self.memory.put_word(addr, value);
        }
    }
}

fn reg_get_byte(value: u16, addr: u16) -> u8 {
    if addr & 1 != 0 {
        (value >> 8) as u8
    } else {
        (value & 0xFF) as u8
    }
}

fn reg_put_byte(value: &mut u16, addr: u16, b: u8) {
    if addr & 1 != 0 {
        *value = (*value & 0x00FF) | ((b as u16) << 8);
    } else {
        *value = (*value & 0xFF00) | (b as u16);
    }
}
