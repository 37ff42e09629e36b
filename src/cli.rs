use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use denote::{Budget, EnumerateOptions};

/// Parse a sentence against a grammar file and list every reading
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// File containing the grammar
    pub file: PathBuf,

    /// Words of the sentence (arguments are also split on whitespace)
    pub words: Vec<String>,

    /// Start symbol (default: head of the first rule in the file)
    #[arg(short, long, value_name = "SYMBOL")]
    pub start: Option<String>,

    /// Print this many random sentences instead of parsing
    #[arg(short = 'n', long, value_name = "AMOUNT")]
    pub generate: Option<u32>,

    /// Depth after which generated sentences take the shortest way out
    #[arg(long, value_name = "DEPTH", default_value_t = 8)]
    pub depth: usize,

    /// Abort enumeration after this many derivation steps
    #[arg(long, value_name = "STEPS")]
    pub max_steps: Option<u64>,

    /// Abort enumeration after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Compute the cells of each span width on a thread pool
    #[arg(long)]
    pub parallel: bool,

    /// Evaluate every reading by reading the words back
    #[arg(long)]
    pub echo: bool,

    /// More logging on stderr (-v debug, -vv trace). RUST_LOG overrides this
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn tokens(&self) -> Vec<&str> {
        self.words.iter().flat_map(|words| words.split_whitespace()).collect()
    }

    pub fn options(&self) -> EnumerateOptions {
        let mut budget = Budget::unbounded();
        if let Some(steps) = self.max_steps {
            budget = budget.with_max_steps(steps);
        }
        if let Some(ms) = self.timeout_ms {
            budget = budget.with_timeout(Duration::from_millis(ms));
        }

        EnumerateOptions::default()
            .with_budget(budget)
            .parallel(self.parallel)
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "denote=debug",
            _ => "denote=trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_split() {
        let cli = Cli::parse_from(["denote", "english.grammar", "betty ran", "if", "mike  swam"]);
        assert_eq!(cli.tokens(), vec!["betty", "ran", "if", "mike", "swam"]);
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn budget_flags() {
        let cli = Cli::parse_from(["denote", "g", "--max-steps", "40", "--parallel", "-vv"]);
        let options = cli.options();
        assert_eq!(options.budget.max_steps, Some(40));
        assert!(options.budget.deadline.is_none());
        assert!(options.parallel);
        assert_eq!(cli.log_filter(), "denote=trace");
    }
}
