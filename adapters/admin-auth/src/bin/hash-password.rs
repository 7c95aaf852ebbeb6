//! Prompt for a password twice and print its Argon2id hash for use as
//! `ADMIN_HASHED_PASSWORD`.
//!
//! Usage: `hash-password` (interactive, no echo) or `hash-password --stdin`
//! (one line from standard input, for scripts).

use std::io::{self, BufRead, IsTerminal, Write};
use std::process;

fn read_stdin_line() -> Result<String, String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| format!("Failed to read from stdin: {}", e))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn prompt_hidden(label: &str) -> Result<String, String> {
    eprint!("{}", label);
    io::stderr().flush().map_err(|e| e.to_string())?;
    rpassword::read_password().map_err(|e| format!("Failed to read password: {}", e))
}

fn prompt_password_with_confirm() -> Result<String, String> {
    if !io::stdin().is_terminal() {
        return Err(
            "stdin is not a terminal. Use --stdin to read the password from a pipe.".into(),
        );
    }
    let first = prompt_hidden("Type password to hash: ")?;
    let second = prompt_hidden("Confirm: ")?;
    confirmed(first, second)
}

fn confirmed(first: String, second: String) -> Result<String, String> {
    if first != second {
        return Err("Passwords don't match.".into());
    }
    Ok(first)
}

fn run() -> Result<(), String> {
    let from_stdin = match std::env::args().nth(1).as_deref() {
        None => false,
        Some("--stdin") => true,
        Some(other) => return Err(format!("unknown argument {}", other)),
    };
    let password = if from_stdin {
        read_stdin_line()?
    } else {
        prompt_password_with_confirm()?
    };
    if password.is_empty() {
        return Err("Password must not be empty.".into());
    }
    let hash = admin_auth::hash_password(&password).map_err(|e| e.to_string())?;
    println!("Password hash: {}", hash);
    Ok(())
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
