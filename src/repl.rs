use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::read::{ReadError, Reader};
use crate::runtime::Interpreter;
use crate::scheme::{Error, Scheme};

const HISTORY_FILE: &str = ".lithp-history";

/// What one line of input amounted to.
#[derive(Debug, PartialEq)]
pub enum Feed {
    /// The buffered input stops inside a form; more lines are needed.
    Incomplete,
    /// Printed value of every form completed by this line, in order.
    Results(Vec<String>),
    /// The buffered input could not be parsed and has been dropped.
    Parse(ReadError),
}

fn read_all(input: &str) -> Result<Vec<Scheme>, ReadError> {
    let mut reader = Reader::new(input);
    let mut forms = Vec::new();
    while let Some(form) = reader.read_expr()? {
        forms.push(form);
    }
    Ok(forms)
}

pub struct Repl {
    interp: Interpreter,
    pending: String,
}

impl Repl {
    pub fn new(interp: Interpreter) -> Self {
        Repl {
            interp,
            pending: String::new(),
        }
    }

    /// Add `line` to the buffered input and evaluate every form in it once
    /// the buffer parses completely. Only fatal errors come back as `Err`.
    pub fn feed(&mut self, line: &str) -> Result<Feed, Error> {
        self.pending.push_str(line);
        self.pending.push('\n');

        let forms = match read_all(&self.pending) {
            Err(ref err) if err.is_incomplete() => return Ok(Feed::Incomplete),
            Err(err) => {
                self.pending.clear();
                return Ok(Feed::Parse(err));
            },
            Ok(forms) => forms,
        };
        self.pending.clear();

        let mut results = Vec::new();
        for form in forms {
            let value = self.interp.eval_toplevel(&form)?;
            results.push(value.to_string());
        }
        Ok(Feed::Results(results))
    }

    pub fn run(&mut self) -> Result<(), Error> {
        let mut rl = DefaultEditor::new()
            .map_err(|err| Error::Output(err.to_string()))?;
        if let Err(err) = rl.load_history(HISTORY_FILE) {
            eprintln!("No previous history: {:?}", err);
        }

        'repl_loop: loop {
            let prompt = if self.pending.is_empty() { "> " } else { "... " };
            match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(err) = rl.add_history_entry(line.as_str()) {
                            eprintln!("Error adding to history: {:?}", err);
                        }
                    }

                    match self.feed(&line)? {
                        Feed::Incomplete => continue 'repl_loop,
                        Feed::Results(results) => {
                            for out in results {
                                println!("{}", out);
                            }
                        },
                        Feed::Parse(err) => println!("ERR: {}", err),
                    }
                },
                Err(ReadlineError::Interrupted) => {
                    self.pending.clear();
                    continue 'repl_loop;
                },
                Err(ReadlineError::Eof) => break 'repl_loop,
                Err(err) => {
                    println!("Error: {:?}", err);
                    break 'repl_loop;
                },
            }
        }

        if let Err(err) = rl.save_history(HISTORY_FILE) {
            eprintln!("Error saving history: {:?}", err);
        }
        Ok(())
    }
}
