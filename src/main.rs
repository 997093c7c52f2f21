use clap::{Parser, Subcommand};
use minipar::{
    check_source, diagnostics, formatter, language::lexer::lex, parse_source, run_source,
    runtime::Interpreter, Error,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "minipar")]
#[command(about = "MiniPar interpreter and source tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check and execute a program
    Run { file: PathBuf },
    /// Parse and check a program without running it
    Check { file: PathBuf },
    /// Print the token stream, one token per line
    Tokens { file: PathBuf },
    /// Print the program in canonical layout
    Fmt { file: PathBuf },
}

impl Commands {
    fn file(&self) -> &Path {
        match self {
            Commands::Run { file }
            | Commands::Check { file }
            | Commands::Tokens { file }
            | Commands::Fmt { file } => file,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let path = cli.command.file();
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            diagnostics::report_io_error(path, &err);
            std::process::exit(1);
        }
    };

    let result = match &cli.command {
        Commands::Run { .. } => run_source(&source, &mut Interpreter::new()),
        Commands::Check { .. } => check_source(&source).map(|_| println!("ok")),
        Commands::Tokens { .. } => print_tokens(&source),
        Commands::Fmt { .. } => {
            parse_source(&source).map(|program| print!("{}", formatter::format_program(&program)))
        }
    };

    if let Err(err) = result {
        diagnostics::report_error(path, &source, &err);
        std::process::exit(1);
    }
}

fn print_tokens(source: &str) -> Result<(), Error> {
    for token in lex(source)? {
        let line = format!("{} {} {}", token.line, token.kind, token.lexeme);
        println!("{}", line.trim_end());
    }
    Ok(())
}
