use std::env;
use std::io;
use std::process;

use colored::Colorize;

use tapesort::error::CliError;
use tapesort::pipeline;

// Ref: https://github.com/medialab/xan/issues/566
#[cfg(not(windows))]
fn set_virtual_terminal() {}

#[cfg(windows)]
fn set_virtual_terminal() {
    colored::control::set_virtual_terminal(true).ok();
}

fn main() {
    set_virtual_terminal();
    env_logger::init();

    let argv: Vec<_> = env::args().collect();
    let argv: Vec<_> = argv.iter().map(|s| &**s).collect();

    match pipeline::run(&argv) {
        Ok(_outcome) => process::exit(0),
        Err(CliError::Help(usage, exit_code)) => {
            println!("{}", usage);
            process::exit(exit_code);
        }
        Err(CliError::Flag(err)) => err.exit(),
        Err(CliError::Io(ref err)) if err.kind() == io::ErrorKind::BrokenPipe => {
            process::exit(0);
        }
        Err(err) => {
            eprintln!("{} {}", "tapesort:".red(), err);
            process::exit(1);
        }
    }
}
