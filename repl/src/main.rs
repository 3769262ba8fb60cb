use anyhow::Result;
use matlin::{check, compile, link, parse, tokenize, VirtualMachine};
use rustyline::{error::ReadlineError, Editor};

fn main() -> Result<()> {
    println!(
        r"
Welcome to the matlin REPL!
You may type matlin code below for evaluation.
Enter 'exit' or press 'CTRL+C' to exit the REPL.
    "
    );

    let mut rl = Editor::<()>::new();
    if rl.load_history("history.txt").is_err() {
        println!("No previous history.");
    }

    let mut accumulated_code = String::new();

    loop {
        let readline = rl.readline("> ");
        match readline {
            Ok(line) => match line.as_ref() {
                "exit" => break,
                line => {
                    rl.add_history_entry(line);

                    let test_code = format!("{}\n{}", accumulated_code, line);

                    let tokens = match tokenize(&test_code) {
                        Ok(tokens) => tokens,
                        Err(error) => {
                            eprintln!("Error lexing: {}", error);
                            continue;
                        }
                    };

                    let (ast, root) = match parse(&tokens) {
                        Ok(parsed) => parsed,
                        Err(error) => {
                            eprintln!("Error parsing: {}", error);
                            continue;
                        }
                    };

                    let linked = link(&ast, root);
                    if let Err(error) = check(&ast, &linked, root) {
                        eprintln!("Error typechecking: {}", error);
                        continue;
                    }

                    let code = match compile(&ast, root) {
                        Ok(code) => code,
                        Err(error) => {
                            eprintln!("Error compiling: {}", error);
                            continue;
                        }
                    };

                    let mut vm = VirtualMachine::new();
                    vm.load(code);
                    match vm.run() {
                        Ok(result) => {
                            accumulated_code = test_code;
                            if let Some(value) = result {
                                println!("{}", value);
                            }
                        }
                        Err(error) => {
                            eprintln!("Error running: {}", error);
                            continue;
                        }
                    }
                }
            },
            Err(ReadlineError::Interrupted) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history("history.txt")?;
    Ok(())
}
