use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use sjf_scheduler_simulator::config::{
    SimulatorConfig, DEFAULT_CORES, DEFAULT_MEMORY_CAPACITY, DEFAULT_MEMORY_QUOTA,
};
use sjf_scheduler_simulator::io::{loader, ConsoleInput, ConsoleSink, InputProvider, ScriptedInput};
use sjf_scheduler_simulator::kernel::driver::format_stats;
use sjf_scheduler_simulator::kernel::{Driver, SchedulingAlgorithm};

#[derive(Parser, Debug)]
#[command(version, about = "Simulates SJF process scheduling across multiple cores")]
struct Args {
    /// Program files to admit, in arrival order.
    #[arg(default_values = ["data/program_1.txt", "data/program_2.txt", "data/program_3.txt"])]
    programs: Vec<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_CORES)]
    cores: usize,

    /// Address units reserved per process.
    #[arg(long, default_value_t = DEFAULT_MEMORY_QUOTA)]
    memory_quota: usize,

    #[arg(long, default_value_t = DEFAULT_MEMORY_CAPACITY)]
    memory_capacity: usize,

    #[arg(long, value_enum, default_value_t = SchedulingAlgorithm::ShortestJobFirst)]
    algorithm: SchedulingAlgorithm,

    /// Delay after each clock cycle, in milliseconds.
    #[arg(long, default_value_t = 0)]
    tick_ms: u64,

    /// Comma-separated values for `input` assignments. Prompts on stdin if omitted.
    #[arg(long, value_delimiter = ',')]
    inputs: Option<Vec<f64>>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = SimulatorConfig {
        cores: args.cores,
        memory_quota: args.memory_quota,
        memory_capacity: args.memory_capacity,
        algorithm: args.algorithm,
        tick_interval: Duration::from_millis(args.tick_ms),
    };

    let input: Arc<dyn InputProvider> = match args.inputs {
        Some(values) => Arc::new(ScriptedInput::new(values)),
        None => Arc::new(ConsoleInput::stdin()),
    };

    let programs = loader::load_programs(&args.programs).context("Failed to load programs")?;
    for program in &programs {
        println!("Parsed instructions from {}:", program.name);
        for instruction in &program.instructions {
            println!("  {}", instruction);
        }
    }

    let driver = Driver::new(&config, input, Arc::new(ConsoleSink)).context("Failed to start the simulator")?;
    let report = driver.run_programs(programs).context("Simulation aborted")?;

    print!("{}", format_stats(&report));
    Ok(())
}
