//! Whole programs, assembled from source and run to completion.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use duck::asm::{assemble_program, parse_object, write_object};
use duck::cpu::{CpuError, MemoryError};
use duck::{assemble, disassemble, CondFlag, Cpu, CpuState, Word};

/// Assemble `source`, load it at 0, feed `input` to the input port and
/// collect what the program writes to the output port.
fn run_source(source: &str, input: &[i32], max_cycles: u64) -> (Cpu, Vec<i32>) {
    let words = assemble(source).unwrap();
    run_words(&words, input, max_cycles)
}

fn run_words(words: &[Word], input: &[i32], max_cycles: u64) -> (Cpu, Vec<i32>) {
    let mut cpu = Cpu::new();
    cpu.load_program(words, 0).unwrap();

    let mut queue: VecDeque<i32> = input.iter().copied().collect();
    cpu.attach_input(move || queue.pop_front());

    let output = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&output);
    cpu.attach_output(move |value: i32| sink.borrow_mut().push(value));

    cpu.run(max_cycles);
    let written = output.borrow().clone();
    (cpu, written)
}

#[test]
fn add_load_store_example() {
    let source = r#"
            ADD     r1,r0,r0[1]
            LOAD    r2,x
            ADD     r3,r1,r2
            STORE   r3,y
            HALT
    x:      DATA    2
    y:      DATA    0
    "#;

    let program = assemble_program(source).unwrap();
    let (cpu, _) = run_words(&program.words, &[], 100);

    assert_eq!(cpu.state, CpuState::Halted);
    assert_eq!(cpu.mem.read(program.symbols["y"]).unwrap(), 3);
    assert_eq!(cpu.regs.cond, CondFlag::P);
}

const COUNTDOWN: &str = r#"
# Read n, then print n, n-1, ..., 1
        LOAD    r1,r0,r0[510]
loop:   STORE   r1,r0,r0[511]
        SUB     r1,r1,r0[1]
        JUMP/P  loop
        HALT
"#;

#[test]
fn countdown_prints_each_value() {
    let (cpu, output) = run_source(COUNTDOWN, &[3], 100);
    assert_eq!(cpu.state, CpuState::Halted);
    assert_eq!(output, vec![3, 2, 1]);
    assert_eq!(cpu.regs.read(1), 0);
}

#[test]
fn countdown_without_input_faults() {
    let (cpu, output) = run_source(COUNTDOWN, &[], 100);
    assert!(output.is_empty());
    assert_eq!(
        cpu.state,
        CpuState::Faulted(CpuError::Memory {
            pc: 0,
            source: MemoryError::InputExhausted { addr: 510 },
        })
    );
}

#[test]
fn factorial_with_memory_operands() {
    let source = r#"
            LOAD    r1,n
            ADD     r2,r0,r0[1]
    loop:   MUL     r2,r2,r1
            SUB     r1,r1,r0[1]
            JUMP/P  loop
            STORE   r2,result
            HALT
    n:      DATA    5
    result: DATA    0
    "#;

    let program = assemble_program(source).unwrap();
    let (cpu, _) = run_words(&program.words, &[], 1000);

    assert_eq!(cpu.state, CpuState::Halted);
    assert_eq!(cpu.mem.read(program.symbols["result"]).unwrap(), 120);
    assert_eq!(cpu.regs.read(2), 120);
}

#[test]
fn overflow_is_caught_by_predicate() {
    let source = r#"
            LOAD    r1,big
            ADD     r2,r1,r1
            JUMP/V  overflow
            HALT
    overflow:
            STORE   r1,r0,r0[511]
            HALT
    big:    DATA    0x7fffffff
    "#;

    let (cpu, output) = run_source(source, &[], 100);
    assert_eq!(cpu.state, CpuState::Halted);
    assert_eq!(output, vec![i32::MAX]);
    // The failed ADD leaves its target untouched.
    assert_eq!(cpu.regs.read(2), 0);
}

#[test]
fn sum_of_two_inputs() {
    let source = r#"
        LOAD    r1,r0,r0[510]
        LOAD    r2,r0,r0[510]
        ADD     r3,r1,r2
        STORE   r3,r0,r0[511]
        HALT
    "#;

    let (cpu, output) = run_source(source, &[-40, 2], 100);
    assert_eq!(output, vec![-38]);
    assert_eq!(cpu.regs.cond, CondFlag::M);
    assert_eq!(cpu.cycles, 5);
}

#[test]
fn self_modifying_program_halts_early() {
    let source = r#"
            LOAD    r1,stop
            STORE   r1,next
    next:   ADD     r2,r0,r0[99]
            HALT
    stop:   HALT
    "#;

    let (cpu, _) = run_source(source, &[], 100);
    assert_eq!(cpu.state, CpuState::Halted);
    assert_eq!(cpu.regs.read(2), 0);
    assert_eq!(cpu.regs.pc(), 3);
    assert_eq!(cpu.cycles, 3);
}

#[test]
fn bad_address_faults_with_pc() {
    let source = "ADD r1,r0,r0[5]\nLOAD r2,r1,r0[-10]\nHALT\n";

    let (cpu, _) = run_source(source, &[], 100);
    assert_eq!(
        cpu.state,
        CpuState::Faulted(CpuError::Memory {
            pc: 1,
            source: MemoryError::OutOfBounds { addr: -5, capacity: 512 },
        })
    );
}

#[test]
fn infinite_loop_exhausts_budget() {
    let source = "spin: JUMP spin\n";

    let words = assemble(source).unwrap();
    let mut cpu = Cpu::new();
    cpu.load_program(&words, 0).unwrap();

    let summary = cpu.run(250);
    assert_eq!(summary.state, CpuState::Running);
    assert_eq!(summary.cycles, 250);

    let summary = cpu.run(5);
    assert_eq!(summary.cycles, 5);
    assert_eq!(cpu.cycles, 255);
}

#[test]
fn object_file_and_listing_preserve_program() {
    let words = assemble(COUNTDOWN).unwrap();

    let mut text = Vec::new();
    write_object(&mut text, &words).unwrap();
    let reloaded = parse_object(std::str::from_utf8(&text).unwrap()).unwrap();
    assert_eq!(reloaded, words);

    let listing = disassemble(&reloaded);
    assert!(listing.contains("003: ADD/P   r15,r0,r15[-2]"));

    let (_, output) = run_words(&reloaded, &[2], 100);
    assert_eq!(output, vec![2, 1]);
}
