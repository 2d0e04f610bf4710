use anyhow::{bail, Context, Result};
use birth_chart::{
    export_submissions, get_all_submissions, get_submission_stats, open_database, validate,
    write_chart_csv, write_chart_pdf, BirthChart, RawSubmission, Settings,
};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage:
  birth-chart chart <first> <last> <DD-MM-YYYY> [Male|Female|NA] [--pdf <path>] [--csv <path>]
  birth-chart export <path.csv>
  birth-chart stats
  birth-chart hash-password
  birth-chart [admin]";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let settings = Settings::load(None)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&settings.log_filter))
                .context("Invalid log filter")?,
        )
        .with_writer(io::stderr)
        .init();

    match args.get(1).map(String::as_str) {
        Some("chart") => run_chart(&args[2..])?,
        Some("export") => {
            let path = args.get(2).context(USAGE)?;
            run_export(&settings, Path::new(path))?;
        }
        Some("stats") => run_stats(&settings)?,
        Some("hash-password") => run_hash_password()?,
        Some("admin") | None => run_admin(&settings)?,
        Some("help") | Some("--help") | Some("-h") => println!("{}", USAGE),
        Some(other) => bail!("Unknown command: {}\n{}", other, USAGE),
    }

    Ok(())
}

fn run_chart(args: &[String]) -> Result<()> {
    let mut positional = Vec::new();
    let mut pdf_path: Option<PathBuf> = None;
    let mut csv_path: Option<PathBuf> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--pdf" => pdf_path = Some(iter.next().context("--pdf needs a path")?.into()),
            "--csv" => csv_path = Some(iter.next().context("--csv needs a path")?.into()),
            _ => positional.push(arg.clone()),
        }
    }

    if positional.len() < 3 {
        bail!("{}", USAGE);
    }

    let raw = RawSubmission {
        first_name: positional[0].clone(),
        last_name: positional[1].clone(),
        dob: positional[2].clone(),
        gender: positional.get(3).cloned().unwrap_or_default(),
        ..RawSubmission::default()
    };

    let record = match validate(&raw) {
        Ok(record) => record,
        Err(errors) => {
            for e in &errors {
                eprintln!("❌ {}", e);
            }
            bail!("{} invalid field(s)", errors.len());
        }
    };
    let chart = BirthChart::compute(&record)?;

    print_chart(&chart);

    if let Some(path) = pdf_path {
        write_chart_pdf(&path, &chart)?;
        println!("\n✓ PDF written to {}", path.display());
    }
    if let Some(path) = csv_path {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_chart_csv(file, &chart)?;
        println!("✓ CSV written to {}", path.display());
    }

    Ok(())
}

fn print_chart(chart: &BirthChart) {
    println!("🔮 Birth Chart for {}", chart.full_name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Date of Birth:   {}", chart.date_of_birth);
    println!("Gender:          {}", chart.gender);
    println!("Driver:          {}", chart.driver);
    println!("Conductor:       {}", chart.conductor);
    println!("Kuaa:            {}", chart.kuaa_display());
    println!("Chaldean:        {}", chart.chaldean);

    println!("\nLo Shu Grid");
    for row in chart.grid.rows() {
        let cells: Vec<String> = row
            .iter()
            .map(|(digit, count)| match count {
                0 => "  -  ".to_string(),
                1 => format!("  {}  ", digit),
                n => format!(" {}x{} ", digit, n),
            })
            .collect();
        println!("  |{}|", cells.join("|"));
    }

    let missing = chart.grid.missing();
    if !missing.is_empty() {
        let digits: Vec<String> = missing.iter().map(|d| d.to_string()).collect();
        println!("\nMissing numbers: {}", digits.join(", "));
    }
}

fn run_export(settings: &Settings, path: &Path) -> Result<()> {
    println!("📤 Exporting submissions...");
    let conn = open_database(&settings.database_path)?;
    let submissions = get_all_submissions(&conn)?;
    let written = export_submissions(path, &submissions)?;
    println!("✓ Wrote {} submissions to {}", written, path.display());
    Ok(())
}

fn run_stats(settings: &Settings) -> Result<()> {
    let conn = open_database(&settings.database_path)?;
    let stats = get_submission_stats(&conn)?;

    println!("📊 Submissions: {}", stats.total);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\nBy gender:");
    for (gender, count) in &stats.by_gender {
        println!("  {:<14} {:>5}", gender, count);
    }
    println!("\nBy driver:");
    for (value, count) in &stats.by_driver {
        println!("  {:<14} {:>5}", value, count);
    }
    println!("\nBy conductor:");
    for (value, count) in &stats.by_conductor {
        println!("  {:<14} {:>5}", value, count);
    }
    println!("\nBy kuaa:");
    for (value, count) in &stats.by_kuaa {
        let label = value.map(|k| k.to_string()).unwrap_or_else(|| "Not Available".to_string());
        println!("  {:<14} {:>5}", label, count);
    }
    println!("\nBy chaldean:");
    for (value, count) in &stats.by_chaldean {
        println!("  {:<14} {:>5}", value, count);
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn prompt(label: &str) -> Result<String> {
    use std::io::{BufRead, Write};

    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Check credentials against the configured admin; records the attempt
#[cfg(feature = "tui")]
fn authenticate(settings: &Settings, conn: &rusqlite::Connection) -> Result<String> {
    use birth_chart::admin::{login, SessionStore};
    use birth_chart::ui::read_password;

    if !settings.admin_enabled() {
        bail!("Admin login is disabled: set admin.password_sha256 in the config file");
    }

    let username = prompt("Username: ")?;
    let password = read_password("Password: ")?;

    let mut sessions = SessionStore::new(settings.session_ttl_minutes);
    match login(conn, &settings.admin, &mut sessions, &username, &password) {
        Some(_) => Ok(username.trim().to_string()),
        None => bail!("Invalid username or password"),
    }
}

#[cfg(feature = "tui")]
fn run_hash_password() -> Result<()> {
    use birth_chart::ui::read_password;

    let password = read_password("New admin password: ")?;
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    if read_password("Repeat password: ")? != password {
        bail!("Passwords do not match");
    }

    println!("password_sha256 = \"{}\"", birth_chart::new_password_hash(&password));
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_hash_password() -> Result<()> {
    bail!("hash-password needs the tui feature to read the password without echo")
}

#[cfg(feature = "tui")]
fn run_admin(settings: &Settings) -> Result<()> {
    use birth_chart::ui;

    println!("🖥️  Birth Chart Admin Console\n");
    let conn = open_database(&settings.database_path)?;
    let actor = authenticate(settings, &conn)?;

    let mut app = ui::App::load(&conn, &actor)?;
    println!("✓ Loaded {} submissions", app.submissions.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    ui::run_ui(&mut app, &conn)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_admin(_settings: &Settings) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the web admin: cargo run --bin birth-chart-server --features server");
    std::process::exit(1);
}
