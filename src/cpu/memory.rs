//! Duck Machine main memory.
//!
//! Memory is a flat array of 32-bit words shared by code and data. Two
//! addresses can be mapped to input and output ports; loads and stores
//! that hit a mapped address are routed to the port instead of the cell.

use log::trace;
use serde::Serialize;
use thiserror::Error;

use crate::isa::Word;

/// Default number of memory cells.
pub const DEFAULT_CAPACITY: usize = 512;

/// Default input port address.
///
/// 510 and 511 are the two highest addresses reachable with a positive
/// 10-bit displacement from r0, so a single instruction can do I/O.
pub const DEFAULT_INPUT_PORT: i32 = 510;

/// Default output port address.
pub const DEFAULT_OUTPUT_PORT: i32 = 511;

/// A source of values for loads from the input port.
///
/// Returning `None` means no more input is available.
pub trait InputPort {
    fn read_port(&mut self) -> Option<i32>;
}

impl<F: FnMut() -> Option<i32>> InputPort for F {
    fn read_port(&mut self) -> Option<i32> {
        self()
    }
}

/// A sink for values stored to the output port.
pub trait OutputPort {
    fn write_port(&mut self, value: i32);
}

impl<F: FnMut(i32)> OutputPort for F {
    fn write_port(&mut self, value: i32) {
        self(value)
    }
}

/// Main memory with optional memory-mapped ports.
pub struct Memory {
    cells: Vec<Word>,
    input: Option<(i32, Box<dyn InputPort>)>,
    output: Option<(i32, Box<dyn OutputPort>)>,
}

impl Memory {
    /// Create a memory of `capacity` zeroed cells with no ports mapped.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![0; capacity],
            input: None,
            output: None,
        }
    }

    /// Number of cells.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    fn index(&self, addr: i32) -> Result<usize, MemoryError> {
        usize::try_from(addr)
            .ok()
            .filter(|&index| index < self.cells.len())
            .ok_or(MemoryError::OutOfBounds {
                addr,
                capacity: self.cells.len(),
            })
    }

    /// Read a cell, bypassing any mapped port.
    pub fn read(&self, addr: i32) -> Result<Word, MemoryError> {
        let index = self.index(addr)?;
        let value = self.cells[index];
        trace!("Memory read: {} -> {:#010x}", addr, value);
        Ok(value)
    }

    /// Write a cell, bypassing any mapped port.
    pub fn write(&mut self, addr: i32, value: Word) -> Result<(), MemoryError> {
        let index = self.index(addr)?;
        trace!("Memory write: {} <- {:#010x}", addr, value);
        self.cells[index] = value;
        Ok(())
    }

    /// Route reads of `addr` to `port`.
    pub fn map_input(&mut self, addr: i32, port: impl InputPort + 'static) {
        self.input = Some((addr, Box::new(port)));
    }

    /// Route writes of `addr` to `port`.
    pub fn map_output(&mut self, addr: i32, port: impl OutputPort + 'static) {
        self.output = Some((addr, Box::new(port)));
    }

    /// Read as seen by a LOAD: the input port if mapped at `addr`,
    /// otherwise the cell.
    pub fn bus_read(&mut self, addr: i32) -> Result<Word, MemoryError> {
        if let Some((port_addr, port)) = self.input.as_mut() {
            if *port_addr == addr {
                let value = port.read_port().ok_or(MemoryError::InputExhausted { addr })?;
                trace!("Input port {}: {}", addr, value);
                return Ok(value as Word);
            }
        }
        self.read(addr)
    }

    /// Write as seen by a STORE: the output port if mapped at `addr`,
    /// otherwise the cell.
    pub fn bus_write(&mut self, addr: i32, value: Word) -> Result<(), MemoryError> {
        if let Some((port_addr, port)) = self.output.as_mut() {
            if *port_addr == addr {
                trace!("Output port {}: {}", addr, value as i32);
                port.write_port(value as i32);
                return Ok(());
            }
        }
        self.write(addr, value)
    }

    /// Copy `program` into consecutive cells starting at `start`.
    pub fn load_program(&mut self, start: usize, program: &[Word]) -> Result<(), MemoryError> {
        let capacity = self.cells.len();
        let end = start
            .checked_add(program.len())
            .filter(|&end| end <= capacity)
            .ok_or(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: capacity.saturating_sub(start),
            })?;

        self.cells[start..end].copy_from_slice(program);
        Ok(())
    }

    /// Contents of `count` cells from `start`, clipped to capacity.
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, Word)> {
        let end = start.saturating_add(count).min(self.cells.len());
        (start..end).map(|i| (i, self.cells[i])).collect()
    }

    /// All cells.
    pub fn cells(&self) -> &[Word] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .field("input_port", &self.input.as_ref().map(|(addr, _)| *addr))
            .field("output_port", &self.output.as_ref().map(|(addr, _)| *addr))
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum MemoryError {
    #[error("memory address {addr} out of bounds (capacity {capacity})")]
    OutOfBounds { addr: i32, capacity: usize },

    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },

    #[error("input port at address {addr} has no more values")]
    InputExhausted { addr: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new(16);
        mem.write(10, 42).unwrap();
        assert_eq!(mem.read(10).unwrap(), 42);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = Memory::new(16);

        assert!(mem.read(0).is_ok());
        assert!(mem.read(15).is_ok());

        assert_eq!(
            mem.read(16),
            Err(MemoryError::OutOfBounds { addr: 16, capacity: 16 })
        );
        assert_eq!(
            mem.read(-1),
            Err(MemoryError::OutOfBounds { addr: -1, capacity: 16 })
        );
        assert!(mem.write(16, 1).is_err());
        assert!(mem.write(-3, 1).is_err());
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new(8);
        mem.load_program(2, &[1, 2, 3]).unwrap();

        assert_eq!(mem.read(1).unwrap(), 0);
        assert_eq!(mem.read(2).unwrap(), 1);
        assert_eq!(mem.read(3).unwrap(), 2);
        assert_eq!(mem.read(4).unwrap(), 3);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut mem = Memory::new(4);
        let err = mem.load_program(2, &[1, 2, 3]).unwrap_err();
        assert_eq!(err, MemoryError::ProgramTooLarge { size: 3, available: 2 });

        let err = mem.load_program(10, &[1]).unwrap_err();
        assert_eq!(err, MemoryError::ProgramTooLarge { size: 1, available: 0 });
    }

    #[test]
    fn test_input_port() {
        let mut mem = Memory::new(4);
        let mut queue: VecDeque<i32> = [7, -3].into_iter().collect();
        mem.map_input(600, move || queue.pop_front());

        assert_eq!(mem.bus_read(600).unwrap(), 7);
        assert_eq!(mem.bus_read(600).unwrap() as i32, -3);
        assert_eq!(mem.bus_read(600), Err(MemoryError::InputExhausted { addr: 600 }));
        // Plain reads ignore the mapping.
        assert!(mem.read(600).is_err());
    }

    #[test]
    fn test_output_port() {
        let mut mem = Memory::new(4);
        let sink = Rc::new(RefCell::new(Vec::new()));
        let captured = Rc::clone(&sink);
        mem.map_output(3, move |value: i32| captured.borrow_mut().push(value));

        mem.bus_write(3, (-5i32) as Word).unwrap();
        mem.bus_write(2, 9).unwrap();

        assert_eq!(*sink.borrow(), vec![-5]);
        assert_eq!(mem.read(3).unwrap(), 0);
        assert_eq!(mem.read(2).unwrap(), 9);
    }

    #[test]
    fn test_dump_clips() {
        let mut mem = Memory::new(4);
        mem.load_program(0, &[5, 6, 7, 8]).unwrap();
        assert_eq!(mem.dump(2, 10), vec![(2, 7), (3, 8)]);
        assert!(mem.dump(9, 2).is_empty());
    }
}
