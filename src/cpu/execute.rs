//! CPU execution engine for the Duck Machine.
//!
//! Implements the fetch-decode-execute cycle. Each cycle:
//! 1. fetches the word at the program counter (r15),
//! 2. decodes it,
//! 3. checks the instruction's condition mask against the condition codes,
//! 4. if permitted, runs the operation and updates registers, memory and codes,
//! 5. advances the program counter unless the instruction wrote r15.

use log::{debug, trace, warn};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, MachineConfig};
use crate::cpu::alu;
use crate::cpu::memory::{InputPort, Memory, MemoryError, OutputPort};
use crate::cpu::Registers;
use crate::isa::{decode, Instruction, OpCode, Word, NUM_REGISTERS};

/// CPU execution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CpuState {
    /// Constructed or reset; no instruction executed yet.
    Ready,
    /// Executing instructions.
    Running,
    /// Executed a HALT instruction.
    Halted,
    /// Stopped on an unrecoverable error.
    Faulted(CpuError),
}

impl CpuState {
    /// Halted and Faulted are terminal: no further instructions execute.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CpuState::Halted | CpuState::Faulted(_))
    }
}

/// Outcome of [`Cpu::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// State when the run stopped. `Running` means the budget ran out.
    pub state: CpuState,
    /// Cycles executed by this run.
    pub cycles: u64,
}

/// Serializable view of the CPU for harnesses and debuggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub state: CpuState,
    pub pc: i32,
    pub cond: String,
    pub registers: [i32; NUM_REGISTERS],
    pub cycles: u64,
}

/// Something that happened during a cycle, reported to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CpuEvent {
    /// An instruction was fetched from `pc` and decoded. `executed` is
    /// false when its condition mask skipped it.
    Step {
        pc: i32,
        word: Word,
        instr: Instruction,
        executed: bool,
    },
    /// A LOAD read `value` from `addr` (cell or input port).
    MemoryRead { addr: i32, value: Word },
    /// A STORE wrote `value` to `addr` (cell or output port).
    MemoryWrite { addr: i32, value: Word },
}

/// Receives [`CpuEvent`]s, e.g. to drive a debugger display.
pub trait CpuObserver {
    fn notify(&mut self, event: &CpuEvent);
}

impl<F: FnMut(&CpuEvent)> CpuObserver for F {
    fn notify(&mut self, event: &CpuEvent) {
        self(event)
    }
}

/// The Duck Machine CPU together with the memory it owns.
pub struct Cpu {
    /// CPU registers and condition codes.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Cycles executed since construction or reset.
    pub cycles: u64,
    config: MachineConfig,
    last_instr: Option<Instruction>,
    observers: Vec<Box<dyn CpuObserver>>,
}

impl Cpu {
    /// Create a CPU with the default configuration.
    pub fn new() -> Self {
        Self::build(MachineConfig::default())
    }

    /// Create a CPU with zeroed registers, condition code Z, zeroed
    /// memory of the configured size, and PC at the start address.
    ///
    /// The configuration is validated first.
    pub fn with_config(config: MachineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MachineConfig) -> Self {
        let mut regs = Registers::new();
        regs.jump(config.start_address);
        Self {
            regs,
            mem: Memory::new(config.memory_size),
            state: CpuState::Ready,
            cycles: 0,
            config,
            last_instr: None,
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Reset registers, condition codes and state. Memory contents,
    /// port mappings and observers are kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.regs.jump(self.config.start_address);
        self.state = CpuState::Ready;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Copy `program` into memory starting at `start`.
    pub fn load_program(&mut self, program: &[Word], start: usize) -> Result<(), MemoryError> {
        debug!("Loading {} words at address {}", program.len(), start);
        self.mem.load_program(start, program)
    }

    /// Attach an input source at the configured input port address.
    pub fn attach_input(&mut self, port: impl InputPort + 'static) {
        self.mem.map_input(self.config.input_port, port);
    }

    /// Attach an output sink at the configured output port address.
    pub fn attach_output(&mut self, port: impl OutputPort + 'static) {
        self.mem.map_output(self.config.output_port, port);
    }

    /// Register an observer for every subsequent [`CpuEvent`].
    pub fn add_observer(&mut self, observer: impl CpuObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: CpuEvent) {
        for observer in self.observers.iter_mut() {
            observer.notify(&event);
        }
    }

    /// Execute one cycle and return the resulting state.
    ///
    /// Stepping a halted or faulted CPU does nothing.
    pub fn step(&mut self) -> CpuState {
        match self.state {
            CpuState::Halted | CpuState::Faulted(_) => return self.state.clone(),
            CpuState::Ready => self.state = CpuState::Running,
            CpuState::Running => {}
        }

        if let Err(e) = self.cycle() {
            warn!("CPU fault after {} cycles: {}", self.cycles, e);
            self.state = CpuState::Faulted(e);
        }
        self.cycles += 1;

        self.state.clone()
    }

    /// Run until the CPU halts, faults, or `max_cycles` cycles have
    /// executed.
    pub fn run(&mut self, max_cycles: u64) -> RunSummary {
        let start_cycles = self.cycles;

        while !self.state.is_terminal() && self.cycles - start_cycles < max_cycles {
            self.step();
        }

        RunSummary {
            state: self.state.clone(),
            cycles: self.cycles - start_cycles,
        }
    }

    /// One fetch/decode/execute cycle.
    fn cycle(&mut self) -> Result<(), CpuError> {
        // Fetch
        let pc = self.regs.pc();
        let word = self.mem.read(pc).map_err(|source| CpuError::Memory { pc, source })?;

        // Decode
        let instr = decode(word);
        trace!("{:>5}: {:#010x}  {}", pc, word, instr);
        self.last_instr = Some(instr);

        // Predicate
        let executed = instr.cond.permits(self.regs.cond);
        self.emit(CpuEvent::Step { pc, word, instr, executed });
        if !executed {
            self.regs.advance_pc();
            return Ok(());
        }

        // Execute
        let op = instr.op().map_err(|opcode| CpuError::UnknownOpcode { pc, opcode })?;
        let redirected = self.execute(op, &instr).map_err(|source| CpuError::Memory { pc, source })?;

        if !redirected {
            self.regs.advance_pc();
        }
        Ok(())
    }

    /// Apply a permitted instruction. Returns true if it wrote the PC.
    fn execute(&mut self, op: OpCode, instr: &Instruction) -> Result<bool, MemoryError> {
        let lhs = self.regs.read(instr.src1);
        let rhs = alu::operand2(self.regs.read(instr.src2), instr.disp);

        let redirected = match op {
            OpCode::Halt => {
                debug!("HALT at {}", self.regs.pc());
                self.state = CpuState::Halted;
                false
            }

            OpCode::Load => {
                let addr = alu::effective_address(lhs, rhs as i32);
                let value = self.mem.bus_read(addr)?;
                self.emit(CpuEvent::MemoryRead { addr, value });
                self.regs.write(instr.target, value as i32)
            }

            OpCode::Store => {
                let addr = alu::effective_address(lhs, rhs as i32);
                let value = self.regs.read(instr.target) as Word;
                self.mem.bus_write(addr, value)?;
                self.emit(CpuEvent::MemoryWrite { addr, value });
                false
            }

            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
                let result = alu::exec(op, lhs, rhs);
                self.regs.cond = result.cond;
                match result.value {
                    Some(value) => self.regs.write(instr.target, value),
                    None => {
                        debug!("{} failed at {}: {}, {}", op, self.regs.pc(), lhs, rhs);
                        false
                    }
                }
            }
        };

        Ok(redirected)
    }

    /// The most recently fetched instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU can still execute instructions.
    pub fn is_running(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Serializable copy of the architectural state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            pc: self.regs.pc(),
            cond: self.regs.cond.to_string(),
            registers: self.regs.to_array(),
            cycles: self.cycles,
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Errors that stop the CPU.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum CpuError {
    #[error("memory fault at pc={pc}: {source}")]
    Memory { pc: i32, source: MemoryError },

    #[error("unknown opcode {opcode} at pc={pc}")]
    UnknownOpcode { pc: i32, opcode: u8 },
}
