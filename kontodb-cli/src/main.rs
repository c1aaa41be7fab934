use clap::{Parser, Subcommand, ValueEnum};
use kontodb::bank;
use kontodb::{banking_tables, Entity, Konto, Kunde, Store, StoreConfig};
use serde_json::json;
use std::process;

/// kontodb CLI: manage customers and accounts of a kontodb store
#[derive(Parser)]
#[command(name = "kontodb", version, about)]
struct Cli {
    /// Store location: directory for the file backend, database file for sqlite
    #[arg(long, env = "KONTODB_DATA_DIR")]
    data_dir: Option<String>,

    /// Storage backend: file or sqlite [default: file]
    #[arg(long, env = "KONTODB_BACKEND")]
    backend: Option<String>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new, empty store
    Init,

    /// Remove the store and everything in it
    Destroy,

    /// Show backend, location and record counts
    Status,

    /// Register a new customer
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// First and last name
        #[arg(long)]
        name: String,
        /// Street and house number
        #[arg(long)]
        strasse: String,
        #[arg(long)]
        stadt: String,
        #[arg(long)]
        plz: String,
        /// Birth date as YYYY-MM-DD
        #[arg(long)]
        geb_date: Option<String>,
    },

    /// Check a customer's credentials
    Login {
        username: String,
        password: String,
    },

    /// List customers
    Customers,

    /// Show a customer and their accounts
    Customer {
        /// Customer key
        pk: String,
    },

    /// Delete a customer together with their accounts
    DeleteCustomer {
        /// Customer key
        pk: String,
    },

    /// Open a new account for a customer
    OpenAccount {
        /// Customer key of the owner
        besitzer: String,
    },

    /// List accounts
    Accounts {
        /// Only accounts of this customer
        #[arg(long)]
        besitzer: Option<String>,
    },

    /// Pay money into an account
    Deposit {
        kontonummer: String,
        /// Amount in euros, e.g. 12.34
        amount: String,
    },

    /// Take money from an account
    Withdraw {
        kontonummer: String,
        /// Amount in euros, e.g. 12.34
        amount: String,
    },

    /// Move money between two accounts
    Transfer {
        from: String,
        to: String,
        /// Amount in euros, e.g. 12.34
        amount: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

/// Flags win over the environment; clap resolves both.
fn store_config(cli: &Cli) -> kontodb::Result<StoreConfig> {
    StoreConfig::from_values(cli.backend.as_deref(), cli.data_dir.as_deref())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = store_config(&cli)?;
    log::debug!("Using {} store at {}", config.backend, config.path.display());

    match cli.command {
        Command::Init => {
            let store = Store::create(config, banking_tables())?;
            print_output(&store.status()?, &cli.format)?;
            return Ok(());
        }
        Command::Destroy => {
            Store::destroy(&config)?;
            print_output(
                &json!({ "ok": true, "destroyed": config.path.display().to_string() }),
                &cli.format,
            )?;
            return Ok(());
        }
        _ => {}
    }

    let store = Store::open(config, banking_tables())?;

    match cli.command {
        Command::Init | Command::Destroy => unreachable!("handled before opening the store"),

        Command::Status => {
            print_output(&store.status()?, &cli.format)?;
        }

        Command::Register {
            username,
            password,
            name,
            strasse,
            stadt,
            plz,
            geb_date,
        } => {
            let geb_date = geb_date
                .map(|d| {
                    d.parse::<chrono::NaiveDate>()
                        .map_err(|e| format!("Invalid geb_date '{d}': {e}"))
                })
                .transpose()?;
            let kunde = Kunde {
                password,
                name,
                strasse,
                stadt,
                plz,
                geb_date,
                ..Kunde::new(username)
            };
            let stored = bank::register_customer(&store, kunde)?;
            print_output(&kunde_json(&stored)?, &cli.format)?;
        }

        Command::Login { username, password } => {
            let kunde = bank::login_customer(&store, &username, &password)?
                .ok_or("Invalid username or password")?;
            print_output(&kunde_json(&kunde)?, &cli.format)?;
        }

        Command::Customers => {
            let kunden = Kunde::objects(&store).all()?;
            let list = kunden
                .iter()
                .map(kunde_json)
                .collect::<Result<Vec<_>, _>>()?;
            print_output(&serde_json::Value::Array(list), &cli.format)?;
        }

        Command::Customer { pk } => {
            let kunde = Kunde::objects(&store).get(pk.as_str())?;
            let konten = kunde.konten(&store)?;
            let mut value = kunde_json(&kunde)?;
            value["konten"] = serde_json::Value::Array(konten.iter().map(konto_json).collect());
            print_output(&value, &cli.format)?;
        }

        Command::DeleteCustomer { pk } => {
            let kunde = Kunde::objects(&store).get(pk.as_str())?;
            bank::delete_customer(&store, &kunde)?;
            print_output(&json!({ "ok": true, "deleted": pk }), &cli.format)?;
        }

        Command::OpenAccount { besitzer } => {
            let konto = bank::open_account(&store, &besitzer)?;
            print_output(&konto_json(&konto), &cli.format)?;
        }

        Command::Accounts { besitzer } => {
            let konten = match besitzer {
                Some(besitzer) => Konto::objects(&store).filter([("besitzer", besitzer)])?,
                None => Konto::objects(&store).all()?,
            };
            let list = konten.iter().map(konto_json).collect();
            print_output(&serde_json::Value::Array(list), &cli.format)?;
        }

        Command::Deposit {
            kontonummer,
            amount,
        } => {
            let cents = bank::parse_amount(&amount)?;
            let konto = bank::deposit(&store, &kontonummer, cents)?;
            print_output(&konto_json(&konto), &cli.format)?;
        }

        Command::Withdraw {
            kontonummer,
            amount,
        } => {
            let cents = bank::parse_amount(&amount)?;
            let konto = bank::withdraw(&store, &kontonummer, cents)?;
            print_output(&konto_json(&konto), &cli.format)?;
        }

        Command::Transfer { from, to, amount } => {
            let cents = bank::parse_amount(&amount)?;
            let (source, target) = bank::transfer(&store, &from, &to, cents)?;
            print_output(
                &json!({ "from": konto_json(&source), "to": konto_json(&target) }),
                &cli.format,
            )?;
        }
    }

    Ok(())
}

/// Customer as shown to the user, without the password hash
fn kunde_json(kunde: &Kunde) -> kontodb::Result<serde_json::Value> {
    let mut record = kunde.to_record()?;
    record.remove("password");
    Ok(serde_json::Value::Object(record))
}

fn konto_json(konto: &Konto) -> serde_json::Value {
    json!({
        "kontonummer": konto.kontonummer,
        "kontostand": bank::format_cents(konto.kontostand),
        "waehrung": konto.waehrung,
        "besitzer": konto.besitzer,
    })
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
