mod output;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use ghrs_core::config::GhrsConfig;
use ghrs_core::credentials::{self, CredentialStore, Credentials, FileCredentialStore, Store};
use ghrs_core::export;
use ghrs_core::query::QueryWindow;
use ghrs_core::summary;
use ghrs_core::window::{self, DateRange};
use ghrs_core::GhrsClient;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "ghrs", about = "GHRS timesheet connector", version)]
enum Cli {
    /// Prompt for portal credentials and store them
    Login,
    /// Delete the stored credentials file
    Logout,
    /// Authenticate against the portal and report the outcome
    Auth,
    /// Run the timesheet query and print the records
    Fetch {
        /// Eight weeks either side of the current week (default)
        #[arg(long)]
        recent: bool,
        /// Number of weeks to look back
        #[arg(long)]
        weeks: Option<u32>,
        /// Number of calendar months to look back
        #[arg(long)]
        months: Option<u32>,
        /// Start from this week's date in the given year
        #[arg(long)]
        year: Option<i32>,
        /// Explicit start date (YYYY-MM-DD), requires --to
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        /// Explicit end date (YYYY-MM-DD), requires --from
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
        /// Cost center filter (falls back to [query].cost_center)
        #[arg(long)]
        cost_center: Option<String>,
        /// Company code filter (falls back to [query].company_code)
        #[arg(long)]
        company_code: Option<String>,
        /// Sum hours per person, job and week
        #[arg(long)]
        summarize: bool,
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also keep the raw XML export at this path
        #[arg(long)]
        save_xml: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config,
    /// Normalize a previously downloaded XML export
    Parse {
        /// Path to the XML export
        file: PathBuf,
        #[arg(long)]
        summarize: bool,
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ghrs=info,ghrs_core=info")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let config = GhrsConfig::load(Some(&std::env::current_dir()?)).unwrap_or_else(|e| {
        tracing::warn!("config: {e}, using defaults");
        GhrsConfig::default_config()
    });

    run(cli, &config)
}

fn run(cli: Cli, config: &GhrsConfig) -> Result<()> {
    match cli {
        Cli::Login => cmd_login(config),
        Cli::Logout => cmd_logout(config),
        Cli::Auth => cmd_auth(config),
        Cli::Fetch {
            recent,
            weeks,
            months,
            year,
            from,
            to,
            cost_center,
            company_code,
            summarize,
            format,
            output,
            save_xml,
        } => {
            let range = resolve_range(recent, weeks, months, year, from, to)?;
            let cost_center = cost_center
                .or_else(|| config.query.cost_center.clone())
                .context("no cost center given (use --cost-center or set [query].cost_center)")?;
            let company_code = company_code
                .or_else(|| config.query.company_code.clone())
                .context(
                    "no company code given (use --company-code or set [query].company_code)",
                )?;
            let window = QueryWindow::new(range.start, range.end, cost_center, company_code)?;
            check_output(format, output.as_deref())?;
            cmd_fetch(config, &window, summarize, format, output, save_xml)
        }
        Cli::Config => cmd_config(config),
        Cli::Parse {
            file,
            summarize,
            format,
            output,
        } => {
            check_output(format, output.as_deref())?;
            cmd_parse(&file, summarize, format, output)
        }
    }
}

// -- Credentials --

fn credential_store(config: &GhrsConfig) -> Result<Store> {
    credentials::create_store(&config.credentials, config.credentials_path())
        .context("failed to set up credential store")
}

fn file_store(config: &GhrsConfig) -> Result<FileCredentialStore> {
    match credential_store(config)? {
        Store::File(store) => Ok(store),
        Store::Env(_) => anyhow::bail!(
            "credentials come from ${} and ${} (credentials.store = \"env\")",
            config.credentials.user_env,
            config.credentials.password_env
        ),
    }
}

fn prompt_credentials() -> ghrs_core::Result<Credentials> {
    let stdin = io::stdin();
    let mut lines = stdin.lock();
    let user = prompt_line(&mut lines, "User ID: ")?;
    let password = prompt_line(&mut lines, "Password: ")?;
    Ok(Credentials::new(user, password))
}

fn prompt_line<R: BufRead>(input: &mut R, label: &str) -> io::Result<String> {
    eprint!("{label}");
    io::stderr().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn obtain_credentials(config: &GhrsConfig) -> Result<Credentials> {
    let store = credential_store(config)?;
    let credentials = match store {
        Store::Env(ref env) => env.load()?.with_context(|| {
            format!(
                "set ${} and ${} to authenticate",
                config.credentials.user_env, config.credentials.password_env
            )
        })?,
        Store::File(ref file) => credentials::load_or_capture(file, prompt_credentials)?,
    };
    Ok(credentials)
}

fn cmd_login(config: &GhrsConfig) -> Result<()> {
    let store = file_store(config)?;
    let credentials = prompt_credentials()?;
    if credentials.identifier().is_empty() {
        anyhow::bail!("user id must not be empty");
    }
    store
        .save(&credentials)
        .with_context(|| format!("failed to write {}", store.path().display()))?;
    println!(
        "{} credentials for {} saved to {}",
        "OK:".green(),
        credentials.identifier().cyan(),
        store.path().display().dimmed()
    );
    Ok(())
}

fn cmd_logout(config: &GhrsConfig) -> Result<()> {
    let store = file_store(config)?;
    if store.clear()? {
        println!("{} removed {}", "OK:".green(), store.path().display());
    } else {
        println!("{}", "No stored credentials.".dimmed());
    }
    Ok(())
}

// -- Portal --

fn connect(config: &GhrsConfig) -> Result<GhrsClient> {
    let credentials = obtain_credentials(config)?;
    GhrsClient::connect(&config.portal, credentials).context("portal authentication failed")
}

fn cmd_auth(config: &GhrsConfig) -> Result<()> {
    let client = connect(config)?;
    let session = client.session();
    println!(
        "{} authenticated after {} redirect(s)",
        "OK:".green(),
        session.hops()
    );
    println!("  {} {}", "Landing:".dimmed(), session.landing().url);
    Ok(())
}

fn cmd_fetch(
    config: &GhrsConfig,
    window: &QueryWindow,
    summarize: bool,
    format: OutputFormat,
    output: Option<PathBuf>,
    save_xml: Option<PathBuf>,
) -> Result<()> {
    let client = connect(config)?;
    let result = client.query_with(window, |xml| match &save_xml {
        Some(path) => Ok(fs::write(path, xml)?),
        None => Ok(()),
    });
    let records = match result {
        Ok(records) => records,
        Err(e) if e.is_stale_session() => {
            anyhow::bail!("{e} (the portal session looks stale, run the command again)")
        }
        Err(e) => return Err(e).context("timesheet query failed"),
    };
    emit(&records, summarize, format, output)
}

// -- Offline --

fn cmd_config(config: &GhrsConfig) -> Result<()> {
    let text = toml::to_string_pretty(config).context("failed to serialize config")?;
    print!("{text}");
    Ok(())
}

fn cmd_parse(
    file: &Path,
    summarize: bool,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let xml =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let records =
        export::parse(&xml).with_context(|| format!("failed to parse {}", file.display()))?;
    emit(&records, summarize, format, output)
}

// -- Helpers --

fn resolve_range(
    recent: bool,
    weeks: Option<u32>,
    months: Option<u32>,
    year: Option<i32>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<DateRange> {
    let chosen = [recent, weeks.is_some(), months.is_some(), year.is_some(), from.is_some()]
        .iter()
        .filter(|&&set| set)
        .count();
    if chosen > 1 {
        anyhow::bail!("choose only one of --recent, --weeks, --months, --year, --from/--to");
    }

    let today = Local::now().date_naive();
    let range = match (weeks, months, year, from, to) {
        (Some(n), ..) => window::by_weeks(today, n)?,
        (_, Some(n), ..) => window::by_months(today, n)?,
        (_, _, Some(y), ..) => window::by_year(today, y)?,
        (_, _, _, Some(start), Some(end)) => DateRange::new(start, end)?,
        _ => window::recent(today)?,
    };
    Ok(range)
}

fn check_output(format: OutputFormat, output: Option<&Path>) -> Result<()> {
    if format == OutputFormat::Table && output.is_some() {
        anyhow::bail!("--output needs --format json or --format csv");
    }
    Ok(())
}

fn emit(
    records: &[ghrs_core::model::TimesheetRecord],
    summarize: bool,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    if records.is_empty() && format == OutputFormat::Table {
        println!("{}", "No timesheet rows in range.".dimmed());
        return Ok(());
    }

    let mut buf = Vec::new();
    if summarize {
        let summaries = summary::summarize_by_week(records);
        output::write_summaries(&mut buf, &summaries, format)?;
    } else {
        output::write_records(&mut buf, records, format)?;
    }

    match output {
        Some(path) => {
            fs::write(&path, &buf).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{} {}", "Wrote".green(), path.display());
        }
        None => io::stdout().write_all(&buf)?,
    }
    Ok(())
}
