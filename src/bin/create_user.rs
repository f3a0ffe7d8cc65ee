use std::{error::Error, io, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;

use ken_kash::{PasswordHash, ValidatedPassword, create_user, initialize_db};

/// A utility for registering a user, e.g. a teacher who will create a class.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database. Created if it does not exist.
    #[arg(long)]
    db_path: String,

    /// The email address the user logs in with.
    #[arg(long)]
    email: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = Path::new(&args.db_path);
    validate_db_path(db_path);

    let conn = Connection::open(db_path)?;
    initialize_db(&conn)?;

    println!("Creating user {}", args.email);

    let Some(password_hash) = get_new_password_hash(&args.email) else {
        return Ok(());
    };

    match create_user(&args.email, password_hash, &conn) {
        Ok(user) => {
            println!("Created user {} with ID {}", user.email, user.id);
            Ok(())
        }
        Err(error) => {
            print_error(&error);
            exit(1);
        }
    }
}

fn validate_db_path(db_path: &Path) {
    match db_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            print_error("Database path must include a file extension (e.g., 'ken_kash.db').");
            exit(1);
        }
    }
}

fn prompt(message: &str) -> Option<String> {
    match rpassword::prompt_password(message) {
        Ok(string) => Some(string),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(error) => {
            print_error(format!("Could not read password from stdin: {error}"));
            None
        }
    }
}

fn get_new_password_hash(email: &str) -> Option<PasswordHash> {
    loop {
        println!();

        let first_password = prompt("Enter a password: ")?;

        let validated_password = match ValidatedPassword::new(&first_password, &[email]) {
            Ok(password) => password,
            Err(error) => {
                print_error(error);
                continue;
            }
        };

        let second_password = prompt("Enter the same password again: ")?;

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        match PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST) {
            Ok(password_hash) => return Some(password_hash),
            Err(error) => print_error(format!("Could not hash password: {error}. Try again.")),
        }
    }
}

fn print_error(error: impl ToString) {
    eprintln!("\x1b[31;1m{}\x1b[0m", error.to_string());
}
