use std::io::{self, BufRead, Write};

use anyhow::Result;
use nutlang::{Environment, Object};

const NUT: &str = r#"
      ___
    /     \
   | () () |
    \  ^  /
     |||||
"#;

pub fn start() -> Result<()> {
    let env = Environment::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("Hello! This is the Nut programming language!");
    println!("Feel free to type in commands");

    loop {
        print!(">> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            return Ok(());
        }

        let (result, errors) = nutlang::run(&input, &env);

        match result {
            Object::Error(message) => {
                println!("{}", NUT);
                println!("Woops! That one was a tough nut to crack!");
                println!("eval error: {}", message);
            }
            _ if !errors.is_empty() => {
                println!("{}", NUT);
                println!("Woops! That one was a tough nut to crack!");
                for error in errors {
                    println!("parse error: {}", error);
                }
            }
            result => println!("{}", result),
        }
    }
}
