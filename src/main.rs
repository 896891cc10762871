//! Duck Machine - CLI Entry Point
//!
//! Commands:
//! - `duck-machine run <program>` - Run an object or ASM file
//! - `duck-machine asm <source>` - Assemble to an object file
//! - `duck-machine disasm <object>` - Disassemble an object file

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::LevelFilter;

use duck::{
    assemble, disassemble, load_object, save_object, Cpu, CpuEvent, CpuState, MachineConfig, RunSummary,
    Word,
};

#[derive(Parser)]
#[command(name = "duck-machine")]
#[command(version)]
#[command(about = "Simulator and assembler for the Duck Machine, a 32-bit instructional computer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the object or ASM file to execute
        program: PathBuf,
        /// Maximum number of cycles to run (default: from config, 10000)
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Log every cycle
        #[arg(short, long)]
        trace: bool,
        /// Pause before each cycle and show the instruction, memory
        /// traffic and registers
        #[arg(short, long)]
        step: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
        /// Machine configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the number of memory cells
        #[arg(long)]
        memory_size: Option<usize>,
        /// Override the address where execution starts
        #[arg(long)]
        start_address: Option<i32>,
    },
    /// Assemble source to an object file
    Asm {
        /// Path to the source file
        source: PathBuf,
        /// Output object file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Disassemble an object file to readable text
    Disasm {
        /// Path to the object file
        object: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let trace = matches!(cli.command, Commands::Run { trace: true, .. });
    env_logger::Builder::new()
        .filter_level(if trace { LevelFilter::Trace } else { LevelFilter::Warn })
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Run { program, max_cycles, step, json, config, memory_size, start_address, .. } => {
            let mut config = match config {
                Some(path) => MachineConfig::from_json_file(&path)
                    .unwrap_or_else(|e| fail(&format!("Failed to load config: {}", e))),
                None => MachineConfig::default(),
            };
            if let Some(size) = memory_size {
                config.memory_size = size;
            }
            if let Some(addr) = start_address {
                config.start_address = addr;
            }
            run_program(&program, config, max_cycles, step, json);
        }
        Commands::Asm { source, output } => {
            assemble_file(&source, output);
        }
        Commands::Disasm { object } => {
            disassemble_file(&object);
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

/// Load object code, assembling first if the file is `.asm` source.
fn load_program_file(path: &Path) -> Vec<Word> {
    if path.extension().is_some_and(|ext| ext == "asm") {
        let source = std::fs::read_to_string(path)
            .unwrap_or_else(|e| fail(&format!("Failed to read file: {}", e)));
        assemble(&source).unwrap_or_else(|e| fail(&format!("Assembly error: {}", e)))
    } else {
        load_object(path).unwrap_or_else(|e| fail(&format!("Failed to load object file: {}", e)))
    }
}

fn run_program(path: &Path, config: MachineConfig, max_cycles: Option<u64>, step: bool, json: bool) {
    let program = load_program_file(path);
    if program.is_empty() {
        fail("No instructions to execute");
    }

    let mut cpu = Cpu::with_config(config).unwrap_or_else(|e| fail(&format!("{}", e)));
    let max_cycles = max_cycles.unwrap_or(cpu.config().max_cycles);
    let start = usize::try_from(cpu.config().start_address)
        .unwrap_or_else(|_| fail(&format!("Invalid start address {}", cpu.config().start_address)));

    if let Err(e) = cpu.load_program(&program, start) {
        fail(&format!("Failed to load program: {}", e));
    }
    cpu.attach_input(console_input);
    cpu.attach_output(|value: i32| println!("Quack!: {}", value));

    if !json {
        println!("🦆 Running: {} ({} words)", path.display(), program.len());
    }

    let summary = if step { step_program(&mut cpu, max_cycles) } else { cpu.run(max_cycles) };

    if json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(&format!("Failed to serialize state: {}", e)),
        }
    } else {
        let regs = cpu.regs.to_array();
        println!();
        println!("━━━ Result ━━━");
        println!("Cycles: {}", summary.cycles);
        println!("State:  {:?}", summary.state);
        println!("Flags:  {}", cpu.regs.cond);
        for (i, chunk) in regs.chunks(4).enumerate() {
            let row: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(j, value)| format!("r{:<2} = {:>11}", i * 4 + j, value))
                .collect();
            println!("{}", row.join("   "));
        }
    }

    match summary.state {
        CpuState::Faulted(e) => fail(&format!("CPU fault: {}", e)),
        CpuState::Halted => {}
        _ => {
            eprintln!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
        }
    }
}

/// Run one cycle at a time, waiting for enter before each and showing
/// what it did.
fn step_program(cpu: &mut Cpu, max_cycles: u64) -> RunSummary {
    cpu.add_observer(|event: &CpuEvent| match event {
        CpuEvent::Step { pc, instr, executed: true, .. } => println!("{:>5}: {}", pc, instr),
        CpuEvent::Step { pc, instr, executed: false, .. } => println!("{:>5}: {}  (skipped)", pc, instr),
        CpuEvent::MemoryRead { addr, value } => println!("       mem[{}] -> {}", addr, *value as i32),
        CpuEvent::MemoryWrite { addr, value } => println!("       mem[{}] <- {}", addr, *value as i32),
    });

    let stdin = std::io::stdin();
    let mut cycles = 0;
    while cpu.is_running() && cycles < max_cycles {
        eprint!("Step {}; press enter ", cpu.cycles);
        std::io::stderr().flush().ok();
        let mut line = String::new();
        stdin.lock().read_line(&mut line).ok();

        cpu.step();
        cycles += 1;
        println!("       flags={}  r1..r15={:?}", cpu.regs.cond, &cpu.regs.to_array()[1..]);
    }

    RunSummary { state: cpu.state.clone(), cycles }
}

/// Read integers from stdin, prompting on stderr. Unparseable lines are
/// re-prompted; end of input ends the run with an input fault.
fn console_input() -> Option<i32> {
    let stdin = std::io::stdin();
    loop {
        eprint!("Quack! Gimme an int! ");
        std::io::stderr().flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        match line.trim().parse() {
            Ok(value) => return Some(value),
            Err(_) => eprintln!("Duh, that's not an integer: {}", line.trim()),
        }
    }
}

fn assemble_file(source_path: &Path, output: Option<PathBuf>) {
    let out_path = output.unwrap_or_else(|| source_path.with_extension("obj"));

    println!("📝 Assembling: {} → {}", source_path.display(), out_path.display());

    let source = std::fs::read_to_string(source_path)
        .unwrap_or_else(|e| fail(&format!("Failed to read file: {}", e)));
    let words = assemble(&source).unwrap_or_else(|e| fail(&format!("Assembly error: {}", e)));

    println!("✓ Assembled {} words", words.len());

    if let Err(e) = save_object(&out_path, &words) {
        fail(&format!("Failed to save object file: {}", e));
    }

    println!("✓ Saved to {}", out_path.display());
}

fn disassemble_file(object_path: &Path) {
    let words = load_object(object_path)
        .unwrap_or_else(|e| fail(&format!("Failed to load object file: {}", e)));
    print!("{}", disassemble(&words));
}
