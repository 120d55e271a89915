use clap::Parser;
use stockbt::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
