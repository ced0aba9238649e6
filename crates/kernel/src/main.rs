//! Kernel CLI: load each bytecode image as an independent task and run
//! them cooperatively to completion.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use kernel::Kernel;
use log::LevelFilter;
use stackvm::Vm;

#[derive(Parser)]
#[command(name = "kernel")]
#[command(about = "Cooperative task kernel for stackvm bytecode images", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print a disassembly of each image before running
    #[arg(short = 's', long = "disasm")]
    disasm: bool,

    /// Bytecode image files, one task each
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    let mut kernel = Kernel::new(Kernel::DEFAULT_TIMER_CAPACITY);
    let mut loaded = 0;
    for path in &cli.images {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("error: {}: {}", path.display(), err);
                continue;
            }
        };

        let vm = match Vm::load(&bytes) {
            Ok(vm) => vm,
            Err(err) => {
                eprintln!("error: {}: {}", path.display(), err);
                continue;
            }
        };

        if cli.disasm {
            println!("--- {} ---", path.display());
            print!("{}", vm.disassemble());
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        kernel.spawn_vm(vm, &name);
        loaded += 1;
    }

    if loaded == 0 {
        eprintln!("error: no image loaded");
        process::exit(1);
    }

    let mut failed = false;
    for exit in kernel.run() {
        match exit.outcome {
            Ok(value) => println!("{} ({}) => {}", exit.id, exit.name, value),
            Err(faults) => {
                println!("{} ({}) faulted: {}", exit.id, exit.name, faults);
                failed = true;
            }
        }
    }
    if failed {
        process::exit(1);
    }
}
