//! Small admin CLI: hash a password for manual seeding, or generate a
//! signing secret for `JWT_SECRET`.

use clap::{Arg, Command};
use rand::Rng;
use rand::distributions::Alphanumeric;

use campus_auth::auth::password;

fn main() {
    let matches = Command::new("authctl")
        .about("Admin helpers for the campus auth service")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("hash-password")
                .about("Print the bcrypt hash of a password")
                .arg(Arg::new("password").required(true))
                .arg(
                    Arg::new("cost")
                        .long("cost")
                        .takes_value(true)
                        .help("bcrypt cost factor (defaults to the library default)"),
                ),
        )
        .subcommand(
            Command::new("gen-secret")
                .about("Generate a random value suitable for JWT_SECRET")
                .arg(
                    Arg::new("length")
                        .long("length")
                        .takes_value(true)
                        .default_value("48"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("hash-password", sub)) => {
            let plain = sub
                .get_one::<String>("password")
                .map(String::as_str)
                .unwrap_or_default();
            let result = match sub.get_one::<String>("cost") {
                Some(cost) => match cost.parse::<u32>() {
                    Ok(cost) => password::hash_password_with_cost(plain, cost),
                    Err(_) => {
                        eprintln!("invalid cost {:?}", cost);
                        std::process::exit(1);
                    }
                },
                None => password::hash_password(plain),
            };
            match result {
                Ok(hash) => println!("{}", hash),
                Err(e) => {
                    eprintln!("hashing failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(("gen-secret", sub)) => {
            let length: usize = match sub.get_one::<String>("length") {
                Some(raw) => match raw.parse() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        eprintln!("invalid length {:?}", raw);
                        std::process::exit(1);
                    }
                },
                None => 48,
            };
            let secret: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(length)
                .map(char::from)
                .collect();
            println!("{}", secret);
        }
        _ => unreachable!("subcommand_required is set"),
    }
}
