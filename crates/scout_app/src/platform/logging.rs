//! Logger setup for the `scout` binary.
//!
//! Logs go to `./scout.log` unless `--log-file` names another file;
//! `--log-to-terminal` adds the terminal.

use log::LevelFilter;
use scout_logging::{LogDestination, DEFAULT_LOG_FILE};

use super::cli::LoggingArgs;

pub fn initialize(args: &LoggingArgs) {
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    scout_logging::initialize(destination(args), level);
}

fn destination(args: &LoggingArgs) -> LogDestination {
    let file = args
        .log_file
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILE.into());
    if args.log_to_terminal {
        LogDestination::Both(file)
    } else {
        LogDestination::File(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn file_is_the_default_destination() {
        let args = LoggingArgs {
            log_file: None,
            log_to_terminal: false,
            verbose: false,
        };
        assert_eq!(destination(&args), LogDestination::default_file());
    }

    #[test]
    fn terminal_flag_keeps_the_chosen_file() {
        let args = LoggingArgs {
            log_file: Some(PathBuf::from("run.log")),
            log_to_terminal: true,
            verbose: true,
        };
        assert_eq!(destination(&args), LogDestination::Both(PathBuf::from("run.log")));
    }
}
