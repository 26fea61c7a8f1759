extern crate either;
extern crate gc;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate maplit;
extern crate nom;
extern crate rustyline;

use std::env;
use std::process;

mod builtin;
mod equality;
mod port;
mod read;
mod repl;
mod runtime;
mod scheme;
mod symbol;

use crate::repl::Repl;
use crate::runtime::Interpreter;

const USAGE: &str = "usage: lithp [--load FILE]... [FILE]

With FILE, evaluate it and exit. Otherwise start an interactive session.
  --load FILE   evaluate FILE before the session starts (repeatable)
  -h, --help    print this message";

#[derive(Debug, Default, PartialEq)]
struct Options {
    preload: Vec<String>,
    script: Option<String>,
    help: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) ->
    Result<Options, String> {

    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => options.help = true,
            "--load" => match args.next() {
                Some(path) => options.preload.push(path),
                None => return Err("--load needs a file name".to_string()),
            },
            _ if arg.starts_with('-') =>
                return Err(format!("unknown option {}", arg)),
            _ if options.script.is_some() =>
                return Err(format!("unexpected argument {}", arg)),
            _ => options.script = Some(arg),
        }
    }
    Ok(options)
}

fn load_or_exit(interp: &mut Interpreter, path: &str) {
    if let Err(err) = interp.load_file(path) {
        println!("{}", err);
        process::exit(1);
    }
}

fn main() {
    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("lithp: {}\n{}", msg, USAGE);
            process::exit(2);
        },
    };
    if options.help {
        println!("{}", USAGE);
        return;
    }

    let mut interp = Interpreter::new();
    for path in &options.preload {
        load_or_exit(&mut interp, path);
    }

    match options.script {
        Some(ref path) => load_or_exit(&mut interp, path),
        None => {
            println!("Welcome to Lithp");
            if let Err(err) = Repl::new(interp).run() {
                println!("{}", err);
                process::exit(1);
            }
        },
    }
}
