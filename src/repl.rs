// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL (Read-Eval-Print Loop) for Mica.
//!
//! Lines starting with `def` or `import` extend the session, each in a
//! module of its own that replays the earlier imports; any
//! other input is evaluated as an expression. Input that stops in the
//! middle of a construct continues on the next line.

use mica_vm::lexer::{Scanner, TokenKind};
use mica_vm::parser::Parser;
use mica_vm::{Engine, Value};
use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use std::borrow::Cow;
use std::path::PathBuf;

/// REPL configuration constants
const HISTORY_FILE: &str = ".mica_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// Module that collects definitions typed at the prompt.
const SESSION_MODULE: &str = "repl";

const KEYWORDS: &[&str] = &[
    "and", "def", "do", "else", "end", "if", "import", "not", "or", "return", "then", "throw",
    "val", "var",
];

const LITERALS: &[&str] = &["true", "false", "nothing"];

const BUILTINS: &[&str] = &["print", "toString", "sqrt", "math", "pi", "e", "infinity"];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Load,
    Disassemble,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        let rest = input.strip_prefix('.')?;

        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next();

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "clear" | "cls" => Some((ReplCommand::Clear, arg)),
            "load" | "l" => Some((ReplCommand::Load, arg)),
            "dis" | "disassemble" => Some((ReplCommand::Disassemble, arg)),
            _ => None,
        }
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".load <file>", "Load a module from a file"),
            (".dis", "Disassemble every compiled method"),
        ]
    }
}

/// Completion, hints, highlighting and multi-line validation.
struct MicaHelper {
    words: Vec<&'static str>,
}

impl MicaHelper {
    fn new() -> Self {
        let mut words: Vec<&'static str> = KEYWORDS
            .iter()
            .chain(LITERALS)
            .chain(BUILTINS)
            .copied()
            .collect();
        words.extend([".help", ".exit", ".clear", ".load", ".dis"]);
        Self { words }
    }

    fn word_start(line: &str, pos: usize) -> usize {
        line[..pos]
            .rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

impl Completer for MicaHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[Self::word_start(line, pos)..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.to_string(),
                replacement: w[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for MicaHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        let word = &line[Self::word_start(line, pos)..];
        if word.len() < 2 {
            return None;
        }

        self.words
            .iter()
            .find(|w| w.starts_with(word) && w.len() > word.len())
            .map(|w| (&w[word.len()..]).dimmed().to_string())
    }
}

impl Highlighter for MicaHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut result = String::with_capacity(line.len() * 2);
        let mut current_word = String::new();
        let mut in_string = false;

        for c in line.chars() {
            if in_string {
                result.push_str(&c.to_string().green().to_string());
                if c == '"' {
                    in_string = false;
                }
                continue;
            }

            if c.is_alphanumeric() || c == '_' {
                current_word.push(c);
                continue;
            }

            if !current_word.is_empty() {
                result.push_str(&highlight_word(&current_word));
                current_word.clear();
            }

            let colored = match c {
                '(' | ')' => c.to_string().yellow().to_string(),
                '+' | '-' | '*' | '/' | '=' | '<' => c.to_string().cyan().to_string(),
                ':' => c.to_string().magenta().to_string(),
                '"' => {
                    in_string = true;
                    c.to_string().green().to_string()
                }
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }

        if !current_word.is_empty() {
            result.push_str(&highlight_word(&current_word));
        }

        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    if KEYWORDS.contains(&word) {
        word.magenta().bold().to_string()
    } else if LITERALS.contains(&word) {
        word.blue().to_string()
    } else if BUILTINS.contains(&word) {
        word.cyan().to_string()
    } else if word.chars().all(|c| c.is_ascii_digit()) {
        word.yellow().to_string()
    } else {
        word.to_string()
    }
}

impl Validator for MicaHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        if is_incomplete(ctx.input()) {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

impl Helper for MicaHelper {}

/// Returns true if `input` only fails to parse because it ends too early.
fn is_incomplete(input: &str) -> bool {
    if input.trim_start().starts_with('.') {
        return false;
    }

    let error = if is_definition(input) {
        Parser::new(input)
            .parse_module(SESSION_MODULE)
            .err()
    } else {
        Parser::new(input).parse_standalone_expression().err()
    };
    let Some(error) = error else {
        return false;
    };

    Scanner::new(input)
        .tokenize()
        .last()
        .filter(|token| token.kind == TokenKind::Eof)
        .is_some_and(|eof| eof.span.line == error.line && eof.span.column == error.column)
}

/// The previous imports followed by `input`.
fn session_source(imports: &[String], input: &str) -> String {
    let mut source = imports.join("\n");
    source.push('\n');
    source.push_str(input);
    source
}

fn is_definition(input: &str) -> bool {
    let first = input.split_whitespace().next().unwrap_or("");
    first == "def" || first == "import"
}

/// The interactive REPL
pub struct Repl {
    engine: Engine,
    editor: Editor<MicaHelper, DefaultHistory>,
    history_path: PathBuf,
    /// `import` lines typed so far, replayed with every definition
    imports: Vec<String>,
    /// Definitions loaded so far; each one gets its own module
    definitions: usize,
}

impl Repl {
    /// Create a new REPL around `engine`
    pub fn new(engine: Engine) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(MicaHelper::new()));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mica")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.load_history(&history_path);

        Ok(Self {
            engine,
            editor,
            history_path,
            imports: Vec::new(),
            definitions: 0,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "mica>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    if is_definition(trimmed) {
                        self.define(trimmed);
                    } else {
                        self.eval_and_print(trimmed);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);
        println!();
        Ok(())
    }

    fn print_banner(&self) {
        let version = env!("CARGO_PKG_VERSION");
        println!();
        println!(
            "  {} {} {}",
            "Mica".white().bold(),
            "v".dimmed(),
            version.bright_yellow()
        );
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Load => match arg {
                Some(path) => self.load_file(path),
                None => eprintln!(
                    "{}: {} {}",
                    "Error".red().bold(),
                    ".load".cyan(),
                    "requires a file path".dimmed()
                ),
            },
            ReplCommand::Disassemble => println!("{}", self.engine.disassemble()),
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();
        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:16} {}", cmd.cyan(), desc.dimmed());
        }
        println!();
        println!("{}", "Input:".white().bold());
        println!();
        println!("  {:16} {}", "def / import".yellow(), "Extend the session".dimmed());
        println!("  {:16} {}", "anything else".yellow(), "Evaluate it".dimmed());
        println!();
    }

    fn load_file(&mut self, path: &str) {
        let path = std::path::Path::new(path.trim());
        match self.engine.load_file(path) {
            Ok(_) => println!("{} {}", "loaded".dimmed(), path.display().cyan()),
            Err(e) => print_error(&e),
        }
    }

    /// Compiles a definition into a new session module along with every
    /// import seen so far.
    fn define(&mut self, input: &str) {
        let is_import = input.trim_start().starts_with("import");
        let source = session_source(&self.imports, input);
        let module = format!("{}{}", SESSION_MODULE, self.definitions + 1);

        match self.engine.load(&source, &module) {
            Ok(_) => {
                self.definitions += 1;
                if is_import {
                    self.imports.push(input.to_string());
                }
            }
            Err(e) => print_error(&e),
        }
    }

    fn eval_and_print(&mut self, input: &str) {
        match self.engine.eval(input) {
            Ok(value) => println!("{}", format_value(&self.engine, value)),
            Err(e) => print_error(&e),
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// Format a value for display with syntax coloring
fn format_value(engine: &Engine, value: Value) -> String {
    let text = engine.display(value);
    match value {
        Value::Nothing => text.blue().dimmed().to_string(),
        Value::Bool(_) | Value::Number(_) => text.yellow().to_string(),
        Value::String(_) => format!("{:?}", text).green().to_string(),
        Value::Record(_) => text.cyan().to_string(),
    }
}

/// Print a formatted error message
fn print_error(error: &mica_vm::Error) {
    eprintln!("{}: {}", "Error".red().bold(), error);
}
