//! SIC/XE Emulator - CLI Entry Point
//!
//! A thin driver over the library: loads a flat machine-code image
//! (assembler/loader output) into memory and runs it.

use clap::{Parser, Subcommand};
use sicxe::{ControlUnit, Register, Snapshot};

#[derive(Parser)]
#[command(name = "sicxe-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the SIC/XE teaching computer architecture")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a flat machine-code image until it halts
    Run {
        /// Path to the raw binary image
        image: String,
        /// Load/start address (hex accepted with 0x prefix)
        #[arg(short, long, default_value = "0")]
        start: String,
        /// Maximum number of instructions to execute
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Print the execution trace
        #[arg(short, long)]
        trace: bool,
        /// Write a JSON snapshot of the final machine state
        #[arg(long)]
        snapshot: Option<String>,
    },
    /// Restore a JSON snapshot and continue running it
    Resume {
        /// Path to the snapshot file
        snapshot: String,
        /// Maximum number of instructions to execute
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Print the execution trace
        #[arg(short, long)]
        trace: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            image,
            start,
            max_cycles,
            trace,
            snapshot,
        } => {
            let start = match parse_addr(&start) {
                Ok(a) => a,
                Err(e) => {
                    eprintln!("invalid start address: {}", e);
                    std::process::exit(1);
                }
            };
            let bytes = match std::fs::read(&image) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("failed to read {}: {}", image, e);
                    std::process::exit(1);
                }
            };

            let mut cu = ControlUnit::new();
            if let Err(e) = cu.load_image(start, &bytes) {
                eprintln!("failed to load image: {}", e);
                std::process::exit(1);
            }
            println!("loaded {} bytes at {:#08X}", bytes.len(), start);

            drive(&mut cu, max_cycles, trace);

            if let Some(path) = snapshot {
                save_snapshot(&cu, &path);
            }
        }
        Commands::Resume {
            snapshot,
            max_cycles,
            trace,
        } => {
            let data = match std::fs::read_to_string(&snapshot) {
                Ok(d) => d,
                Err(e) => {
                    eprintln!("failed to read {}: {}", snapshot, e);
                    std::process::exit(1);
                }
            };
            let snap: Snapshot = match serde_json::from_str(&data) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("failed to parse snapshot: {}", e);
                    std::process::exit(1);
                }
            };

            let mut cu = ControlUnit::new();
            cu.restore(snap);
            println!("resumed at PC={:06X}", cu.registers().pc());

            drive(&mut cu, max_cycles, trace);
        }
    }
}

fn drive(cu: &mut ControlUnit, max_cycles: u64, trace: bool) {
    let before = cu.execution_history().len();
    match cu.run_until_halted(max_cycles) {
        Ok(executed) => {
            if trace {
                for line in &cu.execution_history()[before..] {
                    println!("{}", line);
                }
            }
            println!();
            println!("instructions executed: {}", executed);
            println!("state: {:?}", cu.state());
            print_registers(cu);
            if !cu.is_halted() && executed == max_cycles {
                println!();
                println!(
                    "reached the {}-cycle budget; use --max-cycles to raise it",
                    max_cycles
                );
            }
        }
        Err(e) => {
            if trace {
                for line in &cu.execution_history()[before..] {
                    println!("{}", line);
                }
            }
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn print_registers(cu: &ControlUnit) {
    let regs = cu.registers();
    for reg in [
        Register::A,
        Register::X,
        Register::L,
        Register::B,
        Register::S,
        Register::T,
    ] {
        if let Ok(v) = regs.get(reg) {
            println!("{:<2} = {:06X}", reg, v);
        }
    }
    if let Ok(f) = regs.get_wide(Register::F) {
        println!("F  = {:012X}", f);
    }
    println!("PC = {:06X}", regs.pc());
    println!("SW = {:06X}", regs.condition());
}

fn save_snapshot(cu: &ControlUnit, path: &str) {
    let snap = cu.snapshot();
    match serde_json::to_string_pretty(&snap) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                eprintln!("failed to write snapshot: {}", e);
                std::process::exit(1);
            }
            println!("snapshot written to {}", path);
        }
        Err(e) => {
            eprintln!("failed to serialize snapshot: {}", e);
            std::process::exit(1);
        }
    }
}

fn parse_addr(s: &str) -> Result<u32, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}
