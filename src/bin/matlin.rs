use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use matlin::{check, compile, disassemble, link, parse, render_tree, tokenize, VirtualMachine};

#[derive(Parser)]
#[command(name = "matlin")]
#[command(about = "A typed numeric scripting language")]
struct Cli {
    file: String,

    /// Print the typed syntax tree before running
    #[arg(long)]
    dump_ast: bool,

    /// Print the compiled instruction listing before running
    #[arg(long)]
    disassemble: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read file: {}", cli.file))?;

    let tokens = tokenize(&source).context("Lexer error")?;
    let (ast, root) = parse(&tokens).context("Parser error")?;
    let linked = link(&ast, root);
    let info = check(&ast, &linked, root).context("Type error")?;

    if cli.dump_ast {
        print!("{}", render_tree(&ast, root, Some(&info)));
    }

    let code = compile(&ast, root).context("Compiler error")?;

    if cli.disassemble {
        print!("{}", disassemble(&code));
    }

    let mut vm = VirtualMachine::new();
    vm.load(code);
    if let Some(result) = vm.run().context("Runtime error")? {
        println!("Process finished with result {}", result);
    }

    Ok(())
}
