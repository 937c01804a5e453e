use clap::Parser;
use gallery::{script, Class, Engine, Options};
use std::fs;
use std::path::PathBuf;

fn main() {
    if let Err(err) = Cli::parse().run() {
        if !err.is_empty() {
            eprintln!("{err}");
        }
        std::process::exit(1);
    }
}

/// Run scripts against the Gallery equation engine.
#[derive(Debug, Parser)]
#[command(
    name = "gallery",
    version = "0.1",
    about,
    long_about,
    max_term_width(100)
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn run(self) -> Result<(), String> {
        match self.command {
            Command::Run(args) => args.run(true),
            Command::Check(args) => args.run(false),
        }
    }
}

#[derive(Clone, Debug, clap::Subcommand)]
enum Command {
    /// Run a script and print the output of its `show` statements.
    Run(Args),

    /// Run a script and only report its diagnostics.
    ///
    /// The exit status is 1 if the script produced any error.
    /// Warnings are printed but do not change the exit status.
    Check(Args),
}

#[derive(Clone, Debug, Parser)]
struct Args {
    /// Path to the script.
    path: PathBuf,

    /// Path to a JSON file containing engine options.
    ///
    /// Missing fields take their default values.
    /// The other flags of this command override values in the file.
    #[arg(long)]
    options: Option<PathBuf>,

    /// Number of significant digits kept on division.
    #[arg(long)]
    precision: Option<u32>,

    /// Make references that cross a group boundary without `save` errors.
    #[arg(long)]
    strict_scopes: bool,

    /// Soft cap on the number of live equations.
    #[arg(long)]
    max_equations: Option<usize>,

    /// Trace equations and capsules to the terminal.
    #[arg(long)]
    tracing: bool,
}

impl Args {
    fn options(&self) -> Result<Options, String> {
        let mut options = match &self.options {
            None => Options::default(),
            Some(path) => {
                let data = read(path)?;
                serde_json::from_str(&data)
                    .map_err(|err| format!("invalid options file {path:?}: {err}"))?
            }
        };
        if let Some(precision) = self.precision {
            options.precision_digits = precision;
        }
        if let Some(max_equations) = self.max_equations {
            options.max_equations = max_equations;
        }
        options.strict_scopes |= self.strict_scopes;
        if self.tracing {
            options.tracing_equations = true;
            options.tracing_capsules = true;
            options.tracing_online = true;
        }
        Ok(options)
    }

    fn run(&self, print_output: bool) -> Result<(), String> {
        let source = read(&self.path)?;
        let mut engine = Engine::new(self.options()?);
        let output = script::run(&mut engine, &source);
        if print_output {
            for line in &output {
                println!("{line}");
            }
        }
        let diagnostics = engine.take_diagnostics();
        let path = self.path.to_string_lossy();
        let cache: (&str, _) = (&path, ariadne::Source::from(source.clone()));
        for diagnostic in &diagnostics {
            diagnostic
                .ariadne_report(&path)
                .eprint(cache.clone())
                .map_err(|err| format!("failed to print a diagnostic: {err}"))?;
        }
        let num_errors = diagnostics
            .iter()
            .filter(|d| d.class() != Class::Limit)
            .count();
        match num_errors {
            0 => Ok(()),
            1 => Err("Script had 1 error".to_string()),
            n => Err(format!("Script had {n} errors")),
        }
    }
}

fn read(path: &PathBuf) -> Result<String, String> {
    fs::read_to_string(path).map_err(|err| format!("failed to open file {path:?}: {err}"))
}
