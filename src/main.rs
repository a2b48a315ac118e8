use std::io::{BufRead, Write};
use std::process;

use alder::schema::Schema;
use alder::Database;

/// Loads the schema named on the command line, then reads SQL statements
/// from standard input until end-of-file, split on semicolons. Statement
/// errors abort only the statement that raised them.
fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let schema_path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: alder schemaFileName");
            process::exit(1);
        }
    };

    let text = match std::fs::read_to_string(&schema_path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(2);
        }
    };
    let schema = match Schema::from_yaml(&text) {
        Ok(schema) => schema,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(2);
        }
    };

    let mut db = Database::new(schema);
    let stdin = std::io::stdin();
    let mut reader = stdin.lock();
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b';', &mut buffer) {
            Ok(0) => process::exit(0),
            Ok(_) => {}
            Err(err) => {
                eprintln!("{}", err);
                process::exit(2);
            }
        }
        let chunk = String::from_utf8_lossy(&buffer);
        let statement = chunk.trim_end_matches(';').trim();
        if statement.is_empty() {
            continue;
        }
        match db.query(statement) {
            Ok(result) => {
                println!("{}", result);
                let _ = std::io::stdout().flush();
            }
            Err(err) => eprintln!("Error: {}", err),
        }
    }
}
