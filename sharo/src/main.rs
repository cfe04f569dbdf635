use std::process;

use clap::Parser as ClapParser;
use log::{LevelFilter, warn};

use sharo::demos::{self, DEMOS, DemoFrontend};
use sharo::{HeapSettings, InterpretError, VM, VMCreateInfo, format};

const EXIT_USAGE: i32 = 64;
const EXIT_COMPILE: i32 = 65;
const EXIT_RUNTIME: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(author, version, about = "Runs the built-in Sharo bytecode programs", long_about = None)]
struct Cli {
    /// Program to run
    #[arg(long, default_value = "fib", help = "Name of the demo program to run")]
    demo: String,

    #[arg(long, help = "List the demo programs and exit")]
    list: bool,

    /// Print bytecode and constants instead of executing
    #[arg(long, help = "Dump bytecode + constant pool of the program")]
    disassemble: bool,

    #[arg(long, help = "Log every dispatched instruction")]
    trace: bool,

    #[arg(long, help = "Collect garbage on every allocation")]
    gc_stress: bool,

    #[arg(long, value_name = "BYTES", help = "Allocation volume before the first collection")]
    gc_threshold: Option<usize>,

    #[arg(long, value_name = "N", help = "Maximum call depth")]
    max_frames: Option<usize>,

    #[arg(long, help = "Print heap statistics after the run")]
    stats: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.trace {
        logger.filter_level(LevelFilter::Trace);
    }
    logger.init();

    if cli.list {
        for demo in DEMOS {
            println!("{:<10} {}", demo.name, demo.description);
        }
        return;
    }

    if demos::find(&cli.demo).is_none() {
        eprintln!("Unknown demo '{}'. Use --list to see the available programs.", cli.demo);
        process::exit(EXIT_USAGE);
    }

    let mut heap = HeapSettings {
        stress: cli.gc_stress,
        ..Default::default()
    };
    if let Some(threshold) = cli.gc_threshold {
        heap.initial_threshold = threshold;
        heap.min_threshold = heap.min_threshold.min(threshold);
    }
    let mut info = VMCreateInfo {
        heap,
        ..Default::default()
    };
    if let Some(max_frames) = cli.max_frames {
        info.max_frames = max_frames;
    }

    let mut vm = match VM::new(info) {
        Ok(vm) => vm,
        Err(err) => {
            eprintln!("Error creating VM: {err}");
            process::exit(EXIT_USAGE);
        }
    };
    vm.define_core_natives();
    vm.set_frontend(Box::new(DemoFrontend));

    let function = match vm.compile(&cli.demo) {
        Ok(function) => function,
        Err(err) => {
            eprintln!("Error compiling {}: {err}", cli.demo);
            process::exit(EXIT_COMPILE);
        }
    };

    if cli.disassemble {
        print!("{}", format::disassemble(vm.heap(), function));
        return;
    }

    let result = vm.run(function);

    if cli.stats {
        print_stats(&vm);
    }

    match result {
        Ok(_) => {}
        Err(InterpretError::Runtime(fault)) => {
            warn!("{} faulted", cli.demo);
            eprintln!("{fault}");
            process::exit(EXIT_RUNTIME);
        }
        Err(InterpretError::Compile(err)) => {
            eprintln!("Error compiling {}: {err}", cli.demo);
            process::exit(EXIT_COMPILE);
        }
    }
}

fn print_stats(vm: &VM) {
    let heap = vm.heap();
    let stats = heap.stats();
    eprintln!("collections:     {}", stats.collections);
    eprintln!("objects freed:   {}", stats.objects_freed);
    eprintln!("bytes freed:     {}", stats.bytes_freed);
    eprintln!("live objects:    {}", heap.live_objects());
    eprintln!("bytes allocated: {}", heap.bytes_allocated());
    eprintln!("next collection: {}", heap.next_gc());
    eprintln!("interned:        {}", heap.interned_count());
}
