#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo binary.
//!
//! Parses args manually. `STREAMBLY_DEMO_*` environment variables provide
//! defaults that explicit flags override.

use std::env;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
streambly demo: a counter and a todo list driven by reactive streams

USAGE:
    streambly-demo [OPTIONS]

OPTIONS:
    --ticks=N        Timer ticks delivered to the counter (default: 3)
    --todos=A,B,...  Titles added to the todo list (default: three samples)
    --json           Print the final state as JSON instead of text
    --help, -h       Show this help message
    --version, -V    Show version

ENVIRONMENT VARIABLES:
    STREAMBLY_DEMO_TICKS   Override --ticks
    RUST_LOG               Log filter (default: streambly=debug,streambly_demo=info)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// Ticks fed to the counter's timer.
    pub ticks: u32,
    /// Titles to add to the todo list.
    pub todos: Vec<String>,
    pub json: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            ticks: 3,
            todos: vec!["write docs".into(), "ship it".into(), "celebrate".into()],
            json: false,
        }
    }
}

/// What the binary should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Run(Opts),
    Help,
    Version,
}

impl Opts {
    /// Parse the process arguments and environment.
    ///
    /// # Errors
    ///
    /// A message describing the first malformed argument.
    pub fn parse() -> Result<Action, String> {
        let mut opts = Self::default();
        if let Ok(val) = env::var("STREAMBLY_DEMO_TICKS")
            && let Ok(n) = val.parse()
        {
            opts.ticks = n;
        }
        opts.apply_args(env::args().skip(1))
    }

    /// Apply command-line flags on top of `self`.
    ///
    /// # Errors
    ///
    /// A message describing the first malformed argument.
    pub fn apply_args(mut self, args: impl IntoIterator<Item = String>) -> Result<Action, String> {
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Action::Help),
                "--version" | "-V" => return Ok(Action::Version),
                "--json" => self.json = true,
                other => {
                    if let Some(val) = other.strip_prefix("--ticks=") {
                        self.ticks = val
                            .parse()
                            .map_err(|_| format!("invalid --ticks value: {val}"))?;
                    } else if let Some(val) = other.strip_prefix("--todos=") {
                        self.todos = val
                            .split(',')
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(String::from)
                            .collect();
                    } else {
                        return Err(format!("unknown argument: {other}"));
                    }
                }
            }
        }
        Ok(Action::Run(self))
    }
}

#[must_use]
pub fn version_line() -> String {
    format!("streambly-demo {VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn defaults_without_flags() {
        assert_eq!(
            Opts::default().apply_args(args(&[])),
            Ok(Action::Run(Opts::default()))
        );
    }

    #[test]
    fn flags_override_defaults() {
        let Ok(Action::Run(opts)) =
            Opts::default().apply_args(args(&["--ticks=7", "--todos=a, b,,c", "--json"]))
        else {
            panic!("expected run");
        };
        assert_eq!(opts.ticks, 7);
        assert_eq!(opts.todos, vec!["a", "b", "c"]);
        assert!(opts.json);
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(
            Opts::default().apply_args(args(&["--help", "--bogus"])),
            Ok(Action::Help)
        );
        assert_eq!(Opts::default().apply_args(args(&["-V"])), Ok(Action::Version));
    }

    #[test]
    fn malformed_arguments_are_reported() {
        assert!(Opts::default().apply_args(args(&["--ticks=x"])).is_err());
        assert!(Opts::default().apply_args(args(&["--nope"])).is_err());
    }
}
