use {anyhow::Result, clap::Subcommand};

use gg_config::Severity;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the resolved config (defaults merged with the config file) as TOML.
    Get,
    /// Write the default config to the user-global config path.
    Set,
    /// Print the path of the config file that would be loaded.
    Edit,
}

pub async fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(verbose),
        ConfigAction::Get => get(),
        ConfigAction::Set => set(),
        ConfigAction::Edit => edit(),
    }
}

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(verbose: bool) -> Result<()> {
    let path = gg_config::find_or_default_config_path();
    let config = gg_config::discover_and_load();
    let result = gg_config::validate(&config);

    if path.exists() {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn get() -> Result<()> {
    let config = gg_config::discover_and_load();
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn set() -> Result<()> {
    let config = gg_config::discover_and_load();
    let path = gg_config::save_config(&config)?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

fn edit() -> Result<()> {
    let path = gg_config::find_or_default_config_path();
    println!("{}", path.display());
    Ok(())
}
