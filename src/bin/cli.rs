//! FlatDB - CLI Client

use anyhow::{bail, Context};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use flatdb::engine::{Engine, EngineConfig, DEFAULT_CATALOG};
use flatdb::{QueryResult, Value};

/// Print welcome banner
fn print_banner(catalog: &str) {
    println!(
        r#"
 _____ _       _   ____  ____
|  ___| | __ _| |_|  _ \| __ )
| |_  | |/ _` | __| | | |  _ \
|  _| | | (_| | |_| |_| | |_) |
|_|   |_|\__,_|\__|____/|____/

 A single-file relational database engine in Rust
 Catalog: {}
 Type '.help' for help, '.quit' to exit
"#,
        catalog
    );
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help                  Show this help message
  .quit                  Exit FlatDB
  .tables                List all tables
  .schema [table]        Show table schema
  .login <user> <pw>     Log in
  .logout                Log out
  .backup <dir>          Snapshot the database into <dir>
  .restore <dir>         Restore a snapshot directory

SQL Commands:
  CREATE TABLE / CREATE [UNIQUE] INDEX / CREATE USER
  ALTER TABLE ... ADD | DROP | MODIFY | RENAME COLUMN
  DROP TABLE / DROP USER / RENAME TABLE a TO b
  INSERT INTO / UPDATE / DELETE FROM / SELECT
  GRANT ... TO / REVOKE ... FROM
  BEGIN / COMMIT / ROLLBACK

Examples:
  CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(100));
  INSERT INTO users VALUES (1, 'Alice'), (2, 'Bob');
  SELECT * FROM users WHERE id = 1;
"#
    );
}

/// Format query results as a table
fn format_results(columns: &[String], rows: &[Vec<Value>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();

    let rendered: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();

    for row in &rendered {
        for (i, value) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(value.chars().count());
            }
        }
    }

    let mut output = String::new();

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    for row in &rendered {
        let row_str: String = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:<width$} ", v, width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", row_str));
    }

    if !rendered.is_empty() {
        output.push_str(&separator);
    }

    output.push_str(&format!("{} row(s) returned\n", rows.len()));
    output
}

fn print_result(result: &QueryResult) {
    if result.is_query() {
        print!("{}", format_results(&result.columns, &result.rows));
    } else if let Some(msg) = &result.message {
        println!("{}", msg);
    } else if result.affected_rows > 0 {
        println!("{} row(s) affected", result.affected_rows);
    }
}

/// Run every statement in `sql`, printing each outcome
fn execute_sql(sql: &str, engine: &mut Engine) {
    for outcome in engine.execute(sql) {
        match outcome {
            Ok(result) => print_result(&result),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}

/// Handle special dot commands. Returns false when the REPL should stop.
fn handle_special_command(cmd: &str, engine: &mut Engine) -> bool {
    let parts: Vec<&str> = cmd.split_whitespace().collect();

    match parts.first().copied() {
        Some(".help") => print_help(),
        Some(".quit") | Some(".exit") => return false,
        Some(".tables") => {
            let tables = engine.storage().database().table_names();
            if tables.is_empty() {
                println!("No tables found.");
            } else {
                println!("Tables:");
                for table in tables {
                    println!("  {}", table);
                }
            }
        }
        Some(".schema") => {
            let db = engine.storage().database();
            if let Some(table_name) = parts.get(1) {
                match db.require_table(table_name) {
                    Ok(table) => println!("{}", table.describe()),
                    Err(e) => eprintln!("Error: {}", e),
                }
            } else {
                for table in db.tables() {
                    println!("{}", table.describe());
                }
            }
        }
        Some(".login") => match (parts.get(1), parts.get(2)) {
            (Some(user), Some(password)) => match engine.login(user, password) {
                Ok(()) => println!("Logged in as {}", user),
                Err(e) => eprintln!("Error: {}", e),
            },
            _ => eprintln!("Usage: .login <user> <password>"),
        },
        Some(".logout") => {
            engine.logout();
            println!("Logged out");
        }
        Some(".backup") => match parts.get(1) {
            Some(dir) => match engine.backup(dir) {
                Ok(path) => println!("Backup written to {}", path.display()),
                Err(e) => eprintln!("Error: {}", e),
            },
            None => eprintln!("Usage: .backup <dir>"),
        },
        Some(".restore") => match parts.get(1) {
            Some(dir) => match engine.restore(dir) {
                Ok(()) => println!("Restored from {}", dir),
                Err(e) => eprintln!("Error: {}", e),
            },
            None => eprintln!("Usage: .restore <dir>"),
        },
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("Type '.help' for available commands.");
        }
        None => {}
    }
    true
}

struct Args {
    catalog: String,
    user: Option<String>,
    password: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        catalog: DEFAULT_CATALOG.to_string(),
        user: None,
        password: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--user" => args.user = Some(iter.next().context("--user needs a value")?),
            "--password" => {
                args.password = Some(iter.next().context("--password needs a value")?)
            }
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            path => args.catalog = path.to_string(),
        }
    }
    Ok(args)
}

/// Main REPL loop
fn run_repl(engine: &mut Engine, catalog: &str) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new().context("failed to initialise line editor")?;

    print_banner(catalog);

    let mut input_buffer = String::new();

    loop {
        let prompt = if input_buffer.is_empty() { "flatdb> " } else { "   ...> " };

        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                input_buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(trimmed);

        if input_buffer.is_empty() && trimmed.starts_with('.') {
            if !handle_special_command(trimmed, engine) {
                break;
            }
            continue;
        }

        input_buffer.push_str(&line);
        input_buffer.push('\n');

        if trimmed.ends_with(';') {
            let sql = std::mem::take(&mut input_buffer);
            execute_sql(&sql, engine);
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;

    let mut engine = Engine::open(EngineConfig::new(&args.catalog))
        .with_context(|| format!("failed to open catalog {}", args.catalog))?;

    match (&args.user, &args.password) {
        (Some(user), Some(password)) => engine
            .login(user, password)
            .with_context(|| format!("login failed for {}", user))?,
        (Some(_), None) | (None, Some(_)) => bail!("--user and --password go together"),
        (None, None) => {}
    }

    run_repl(&mut engine, &args.catalog)
}
