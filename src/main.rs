//! Command-line entry point: `litequery DB_PATH COMMAND`.
//!
//! `COMMAND` is one of `.dbinfo`, `.tables`, or a `SELECT` statement.

use anyhow::{Context, Result};

fn run(db_path: &str, command: &str) -> Result<()> {
    let pager = litequery::pager::Pager::open(db_path).with_context(|| format!("opening {}", db_path))?;

    match command {
        ".dbinfo" => {
            let (page_size, num_tables) = litequery::dbinfo(&pager)?;
            println!("database page size: {}", page_size);
            println!("number of tables: {}", num_tables);
        }
        ".tables" => {
            let names = litequery::table_names(&pager)?;
            println!("{}", names.join(" "));
        }
        _ => {
            let rows = litequery::run_select(&pager, command)?;
            for row in rows {
                println!("{}", row.join("|"));
            }
        }
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let result = if args.len() != 3 {
        let prog = args.first().map(String::as_str).unwrap_or("litequery");
        Err(anyhow::anyhow!("Usage: {} DB_PATH COMMAND", prog))
    } else {
        run(&args[1], &args[2])
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
