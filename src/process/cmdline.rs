//! Command-line parsing for `exec`
//!
//! A command line is split on spaces. The first token names the program
//! (it is both the executable looked up by the loader and the name in the
//! exit line); the rest become its arguments.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::config::KernelConfig;

/// Why a command line was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandLineError {
    /// No program name.
    Empty,
    /// Longer than the configured limit.
    TooLong,
    /// More tokens than the configured limit.
    TooManyArgs,
}

impl fmt::Display for CommandLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command line"),
            Self::TooLong => write!(f, "command line too long"),
            Self::TooManyArgs => write!(f, "too many arguments"),
        }
    }
}

/// A parsed command line. Always has at least the program name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    line: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn parse(line: &str, config: &KernelConfig) -> Result<Self, CommandLineError> {
        if line.len() > config.max_command_line {
            return Err(CommandLineError::TooLong);
        }
        let args: Vec<String> = line
            .split(' ')
            .filter(|token| !token.is_empty())
            .map(String::from)
            .collect();
        if args.is_empty() {
            return Err(CommandLineError::Empty);
        }
        if args.len() > config.max_args {
            return Err(CommandLineError::TooManyArgs);
        }
        Ok(Self {
            line: String::from(line),
            args,
        })
    }

    /// The program name (argv[0]).
    pub fn program(&self) -> &str {
        &self.args[0]
    }

    /// All tokens, program name first.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn argc(&self) -> usize {
        self.args.len()
    }

    /// The command line as the caller passed it.
    pub fn as_str(&self) -> &str {
        &self.line
    }
}
