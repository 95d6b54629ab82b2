mod classes;
mod instances;
mod simulation;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::Level;

use lifecyclevm::mem::{DEFAULT_PROMOTION_THRESHOLD, DEFAULT_YOUNG_CAPACITY};

const OBJECT_COUNT: usize = 100_000;
// 1 KB objects
const OBJECT_SIZE: usize = 1 << 10;
const REPORT_EVERY: usize = 1000;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// Log every class transition and collection.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Print the final report as json.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Load, link and initialize a class, then access it again.
    Classes,
    /// Allocate many small objects into a bounded young generation.
    MinorGc(simulation::SimulationArgs),
    /// Create instances of a class on the vm heap.
    Instances(instances::InstanceArgs),
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();
    match args.command {
        Command::Classes => {
            let report = classes::run()?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
        }
        Command::Instances(instance_args) => {
            let report = instances::run(&instance_args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
        }
        Command::MinorGc(sim_args) => {
            let report = simulation::run(&sim_args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
        }
    }
    Ok(())
}

fn print_row(name: &str, value: impl std::fmt::Display) {
    println!("{} {}", format!("{name:>22}|").dimmed(), value);
}

fn print_header(title: &str) {
    println!("{}", title.bold());
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn minor_gc_defaults_match_the_allocation_loop() {
        let args = Args::parse_from(["lifecyclec", "minor-gc"]);
        let Command::MinorGc(sim) = args.command else {
            panic!("expected the minor-gc command");
        };
        assert_eq!(sim.objects, OBJECT_COUNT);
        assert_eq!(sim.object_size, OBJECT_SIZE);
        assert_eq!(sim.report_every, REPORT_EVERY);
        assert_eq!(sim.young_capacity, DEFAULT_YOUNG_CAPACITY);
        assert_eq!(sim.promotion_threshold, DEFAULT_PROMOTION_THRESHOLD);
        assert_eq!(sim.retain, None);
    }

    #[test]
    fn instances_command_parses_its_flags() {
        let args = Args::parse_from(["lifecyclec", "instances", "--count", "5", "--release"]);
        let Command::Instances(instances) = args.command else {
            panic!("expected the instances command");
        };
        assert_eq!(instances.count, 5);
        assert!(instances.release);
        assert_eq!(instances.young_capacity, DEFAULT_YOUNG_CAPACITY);
    }
}
