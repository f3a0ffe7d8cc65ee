use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use ken_kash::{
    PasswordHash, TransferRequest, ValidatedPassword, create_class, create_user, initialize_db,
    join_class, transfer,
};

/// A utility for creating a test database for the Ken Kash server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
///
/// Every user's password is "test".
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test users...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("test"),
        PasswordHash::DEFAULT_COST,
    )?;

    let teacher = create_user("teacher@example.com", password_hash.clone(), &conn)?;
    let alice = create_user("alice@example.com", password_hash.clone(), &conn)?;
    let bob = create_user("bob@example.com", password_hash, &conn)?;

    println!("Creating class...");

    let now = OffsetDateTime::now_utc();
    let room = create_class(teacher.id, "Room 7", now, &conn)?;
    let alices = join_class(alice.id, &room.class.class_code, now, &conn)?;
    let bobs = join_class(bob.id, &room.class.class_code, now, &conn)?;

    println!("Sending lunch money...");

    transfer(
        alice.id,
        &TransferRequest {
            from_account_id: alices.enrollment.checking_account_id,
            to_account_id: bobs.enrollment.checking_account_id,
            amount: Decimal::new(1250, 2),
            note: "Lunch".to_owned(),
        },
        now,
        &conn,
    )?;

    println!("Success! The class code is {}", room.class.class_code);

    Ok(())
}
