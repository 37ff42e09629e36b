mod cli;

use std::process::ExitCode;

use clap::Parser;
use denote::generator::Generator;
use denote::parser;
use denote::semantics::Echo;
use denote::{enumerate_with, interpret, materialize, Grammar};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn init_logging(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn generate(grammar: &Grammar, start: &str, amount: u32, depth: usize) -> ExitCode {
    let generator = Generator::new(grammar).with_depth(depth);
    let mut rng = rand::thread_rng();

    for _ in 0..amount {
        match generator.generate(start, &mut rng) {
            Ok(sentence) => println!("{}", sentence.join(" ")),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn parse(cli: &Cli, grammar: &Grammar, start: &str) -> ExitCode {
    let tokens = cli.tokens();
    let options = cli.options();

    if cli.echo {
        let result = match interpret(grammar, start, &tokens, &Echo, &options) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        };

        println!("{} reading(s)", result.len());
        for reading in &result.readings {
            match &reading.value {
                Ok(value) => println!("{}\n  = {}", reading.tree, value),
                Err(e) => println!("{}\n  ! {}", reading.tree, e),
            }
        }
        return ExitCode::SUCCESS;
    }

    let forest = match enumerate_with(grammar, start, &tokens, &options) {
        Ok(forest) => forest,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(nodes = forest.len(), applications = forest.application_count(), "forest built");
    println!("{} reading(s)", forest.count_readings(start));
    for tree in materialize(&forest, start) {
        println!("{}", tree);
    }

    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_filter());

    let grammar = match parser::parse_file(&cli.file) {
        Ok(grammar) => grammar,
        Err(errors) => {
            for error in errors {
                eprintln!("{}", error.highlighted());
            }
            return ExitCode::FAILURE;
        }
    };

    let start = cli
        .start
        .clone()
        .unwrap_or_else(|| grammar.start().name().to_string());

    match cli.generate {
        Some(amount) => generate(&grammar, &start, amount, cli.depth),
        None => parse(&cli, &grammar, &start),
    }
}
