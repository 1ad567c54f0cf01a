use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::io::{self};
use std::path::Path;
use std::path::PathBuf;

use loxwalk as lox;

use clap::Parser as ClapParser;
use clap::Subcommand;

use lox::ast_printer::Ast;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::{Token, TokenType};

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes the provided input from a given valid filepath
    Tokenize { filename: Option<PathBuf> },

    /// Parses the provided input and prints the AST of each statement
    Parse { filename: Option<PathBuf> },

    /// Runs the provided Lox script
    Run { filename: Option<PathBuf> },

    /// Interactive prompt echoing the token stream of each line
    Repl,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.commands {
        None | Some(Commands::Repl) => repl()?,

        Some(Commands::Tokenize { filename }) => match filename {
            Some(filename) => tokenize(&filename)?,

            None => missing_input(),
        },

        Some(Commands::Parse { filename }) => match filename {
            Some(filename) => parse(&filename)?,

            None => missing_input(),
        },

        Some(Commands::Run { filename }) => match filename {
            Some(filename) => run(&filename)?,

            None => missing_input(),
        },
    }

    Ok(())
}

fn missing_input() {
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn read_source(filename: &Path) -> anyhow::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    let mut reader: BufReader<File> = BufReader::new(File::open(filename)?);

    reader.read_to_end(&mut buf)?;

    Ok(buf)
}

/// Reads lines from stdin and echoes every token, comments and illegal
/// tokens included.
fn repl() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut line: String = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();

        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        for token in Scanner::new(line.as_bytes()) {
            if token.token_type == TokenType::EOF {
                break;
            }

            println!("{}", token);
        }
    }

    Ok(())
}

fn tokenize(filename: &Path) -> anyhow::Result<()> {
    let buf: Vec<u8> = read_source(filename)?;

    let mut clean: bool = true;

    for token in Scanner::new(&buf) {
        if token.token_type == TokenType::ILLEGAL {
            clean = false;

            eprintln!("[line {}] Error: Unexpected input: {}", token.line, token.lexeme);
        } else {
            println!("{}", token);
        }
    }

    if !clean {
        std::process::exit(65);
    }

    Ok(())
}

fn parse(filename: &Path) -> anyhow::Result<()> {
    let buf: Vec<u8> = read_source(filename)?;

    let tokens: Vec<Token> = Scanner::new(&buf).collect();
    let mut parser: Parser = Parser::new(tokens);

    match parser.parse() {
        Ok(statements) => {
            let printer: Ast = Ast;

            for stmt in &statements {
                println!("{}", printer.print_stmt(stmt));
            }
        }

        Err(errors) => {
            for e in errors {
                eprintln!("{}", e);
            }

            std::process::exit(65);
        }
    }

    Ok(())
}

fn run(filename: &Path) -> anyhow::Result<()> {
    let buf: Vec<u8> = read_source(filename)?;

    let tokens: Vec<Token> = Scanner::new(&buf).collect();
    let mut parser: Parser = Parser::new(tokens);

    let statements = match parser.parse() {
        Ok(statements) => statements,

        Err(errors) => {
            for e in errors {
                eprintln!("{}", e);
            }

            std::process::exit(65);
        }
    };

    let mut interpreter: Interpreter = Interpreter::new();

    if let Err(e) = Resolver::new(&mut interpreter).resolve(&statements) {
        eprintln!("{}", e);

        std::process::exit(65);
    }

    if let Err(e) = interpreter.interpret(&statements) {
        eprintln!("{}", e);

        std::process::exit(70);
    }

    Ok(())
}
