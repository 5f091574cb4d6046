use std::cell::Cell;
use std::process;
use std::rc::Rc;

use wot::ast::Value;
use wot::core;
use wot::env::Env;
use wot::evaluator;
use wot::printer;
use wot::reader;
use wot::readline::LineReader;
use wot::Error;

fn main() {
    let env = core::default_namespace();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = match args.split_first() {
        Some((path, argv)) => run_file(&env, path, argv),
        None => run_repl(&env),
    };
    process::exit(code);
}

fn run_file(env: &Env, path: &str, argv: &[String]) -> i32 {
    let argv_values = argv.iter().map(|arg| Value::String(arg.clone())).collect();
    env.set("*ARGV*", Value::list(argv_values));
    match rep(env, &format!(r#"(load-file "{path}")"#)) {
        Ok(_) => 0,
        Err(err) => {
            println!("{}", printer::print_error(&err));
            1
        }
    }
}

fn run_repl(env: &Env) -> i32 {
    env.set("*ARGV*", Value::list(Vec::new()));

    let running = Rc::new(Cell::new(true));
    let flag = Rc::clone(&running);
    env.register_builtin("exit", move |_env, _args| {
        flag.set(false);
        Ok(Value::Nil)
    });

    let mut reader = match LineReader::new() {
        Ok(reader) => reader,
        Err(err) => {
            println!("{}", printer::print_error(&err));
            return 1;
        }
    };

    while running.get() {
        match reader.read("user> ") {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match rep(env, &line) {
                    Ok(printed) => println!("{printed}"),
                    Err(err) => println!("{}", printer::print_error(&err)),
                }
            }
            Ok(None) => break,
            Err(err) => {
                println!("{}", printer::print_error(&err));
                break;
            }
        }
    }
    0
}

fn rep(env: &Env, input: &str) -> Result<String, Error> {
    let ast = reader::read_str(input)?;
    let value = evaluator::eval(env, &ast)?;
    Ok(printer::pr_str(&value, true))
}
