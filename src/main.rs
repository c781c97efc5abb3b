// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use qr_mailer::utils::logging::{
    format_banner, format_error, format_info, format_skip, format_step, format_success,
    format_warning,
};
use qr_mailer::{
    AssignReport, Config, DispatchOptions, DispatchReport, GenerateReport, HealthStatus,
    MailTransport, PipelineCoordinator, PreviewTransport, ProjectStatus, RowStore, SmtpMailer,
    check_configuration, check_prerequisites, open_store,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const ENV_FILE: &str = ".env.local";

#[derive(Parser)]
#[command(name = "qr_mailer")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Assigns ids, renders QR passes and emails them to event participants", long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Give every row without one a unique identifier
    Assign,

    /// Render a QR code image for every identifier
    Generate {
        #[arg(long)]
        force: bool,
    },

    /// Email every participant not yet marked as sent
    Send {
        /// Compose and log messages without sending or marking rows
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long)]
        yes: bool,
    },

    /// Assign, generate and send in order
    Run {
        #[arg(short, long)]
        yes: bool,
    },

    /// Check files, credentials and sender configuration
    Check,

    /// Show generated QR codes and key files
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Create the QR code directory and an env file template
    Setup,

    /// Interactive menu (default)
    Menu,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    qr_mailer::utils::logging::init_logger(cli.color, cli.verbose);

    let config = match cli.config.as_deref() {
        Some(path) if path.exists() => {
            info!("Loading configuration from: {}", path.display());
            Config::load(Some(path)).context("Failed to load configuration")?
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using default configuration",
                path.display()
            );
            Config::load(None).context("Failed to load configuration")?
        }
        None => Config::load(None).context("Failed to load configuration")?,
    };

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Assign => cmd_assign(&config).await,
        Commands::Generate { force } => cmd_generate(&config, force).await,
        Commands::Send { dry_run, yes } => cmd_send(&config, dry_run, yes).await,
        Commands::Run { yes } => cmd_run(&config, yes).await,
        Commands::Check => cmd_check(&config),
        Commands::Status { json } => cmd_status(&config, json),
        Commands::Setup => cmd_setup(&config),
        Commands::Menu => cmd_menu(&config).await,
    }
}

fn open(config: &Config) -> Result<Box<dyn RowStore>> {
    let store = open_store(&config.store).context("Failed to open participant table")?;
    info!("Using {}", store.describe());
    Ok(store)
}

async fn cmd_assign(config: &Config) -> Result<()> {
    let store = open(config)?;
    let report = PipelineCoordinator::new(store.as_ref(), config)
        .assign_ids()
        .await
        .context("Identifier assignment failed")?;
    print_assign(&report);
    Ok(())
}

async fn cmd_generate(config: &Config, force: bool) -> Result<()> {
    let store = open(config)?;
    let report = PipelineCoordinator::new(store.as_ref(), config)
        .generate_artifacts(force)
        .await
        .context("QR code generation failed")?;
    print_generate(&report);
    Ok(())
}

async fn cmd_send(config: &Config, dry_run: bool, yes: bool) -> Result<()> {
    if !dry_run {
        config
            .validate_for_send()
            .context("Email sending is not configured")?;

        if !yes && !confirm_send()? {
            println!("{}", format_skip("Operation cancelled."));
            return Ok(());
        }
    }

    let store = open(config)?;
    let transport = transport(config, dry_run)?;
    let options = DispatchOptions::from_config(&config.mail).dry_run(dry_run);

    let report = PipelineCoordinator::new(store.as_ref(), config)
        .send_deliveries(transport.as_ref(), options)
        .await
        .context("Email sending failed")?;
    print_dispatch(&report);
    Ok(())
}

async fn cmd_run(config: &Config, yes: bool) -> Result<()> {
    config
        .validate_for_send()
        .context("Email sending is not configured")?;

    if !yes && !confirm_send()? {
        println!("{}", format_skip("Complete workflow cancelled."));
        return Ok(());
    }

    let store = open(config)?;
    let transport = transport(config, false)?;
    let options = DispatchOptions::from_config(&config.mail);

    let report = PipelineCoordinator::new(store.as_ref(), config)
        .run_all(transport.as_ref(), options)
        .await
        .context("Pipeline stopped")?;

    if let Some(assign) = &report.assign {
        print_assign(assign);
    }
    if let Some(generate) = &report.generate {
        print_generate(generate);
    }
    if let Some(dispatch) = &report.dispatch {
        print_dispatch(dispatch);
    }
    println!("{}", format_success("Complete workflow finished"));
    Ok(())
}

fn cmd_check(config: &Config) -> Result<()> {
    let report = check_configuration(config);
    println!("{}", report.format());

    match report.overall_status {
        HealthStatus::Healthy => println!("{}", format_success("Ready to use")),
        HealthStatus::Degraded => println!(
            "{}",
            format_warning("Ready, with fallbacks for the items marked above")
        ),
        HealthStatus::Unhealthy => println!(
            "{}",
            format_error("Needs attention: fix the items marked above before proceeding")
        ),
    }
    Ok(())
}

fn cmd_status(config: &Config, json: bool) -> Result<()> {
    let status = ProjectStatus::collect(config);
    if json {
        println!("{}", status.to_json()?);
    } else {
        println!("{}", format_banner("Project Status"));
        println!("{}", status.format());
    }
    Ok(())
}

fn cmd_setup(config: &Config) -> Result<()> {
    println!("{}", format_banner("Setup"));
    let report = qr_mailer::setup::run_setup(config, Path::new(ENV_FILE))
        .context("Setup failed")?;

    if report.artifact_dir_created {
        println!(
            "{}",
            format_success(&format!("Created {}", config.artifacts.output_dir.display()))
        );
    }
    if report.env_file_written {
        println!(
            "{}",
            format_success(&format!("Created {}, edit it with your settings", ENV_FILE))
        );
    } else {
        println!("{}", format_skip(&format!("Kept existing {}", ENV_FILE)));
    }

    let message = report.credentials.message.clone().unwrap_or_default();
    match report.credentials.status {
        HealthStatus::Healthy => println!("{}", format_success(&message)),
        _ => println!("{}", format_error(&message)),
    }
    Ok(())
}

async fn cmd_menu(config: &Config) -> Result<()> {
    loop {
        println!("\n{}", format_banner("QR CODE MAILER"));
        println!("1. Generate unique IDs");
        println!("2. Generate QR codes");
        println!("3. Send emails with QR codes");
        println!("4. Run complete workflow");
        println!("5. Check configuration");
        println!("6. View project status");
        println!("\n0. Exit");

        let choice = prompt("\nEnter your choice (0-6): ")?;
        let result = match choice.as_str() {
            "1" => {
                if preflight(config, false)?
                    && confirm("Add unique identifiers to the table? (y/N): ")?
                {
                    cmd_assign(config).await
                } else {
                    cancelled()
                }
            }
            "2" => {
                if preflight(config, false)?
                    && confirm("Generate QR codes for every identifier? (y/N): ")?
                {
                    cmd_generate(config, false).await
                } else {
                    cancelled()
                }
            }
            "3" => {
                if preflight(config, true)? {
                    println!("{}", format_warning("This will actually send emails."));
                    cmd_send(config, false, false).await
                } else {
                    cancelled()
                }
            }
            "4" => {
                if preflight(config, true)? {
                    println!("{}", format_step(1, 3, "Generate unique IDs"));
                    println!("{}", format_step(2, 3, "Generate QR codes"));
                    println!("{}", format_step(3, 3, "Send emails with QR codes"));
                    cmd_run(config, false).await
                } else {
                    cancelled()
                }
            }
            "5" => cmd_check(config),
            "6" => cmd_status(config, false),
            "0" | "q" => {
                println!("Goodbye!");
                return Ok(());
            }
            _ => {
                println!("{}", format_error("Invalid choice! Enter a number from 0-6."));
                continue;
            }
        };

        if let Err(e) = result {
            println!("{}", format_error(&format!("{:#}", e)));
        }
        prompt("\nPress Enter to continue...")?;
    }
}

fn transport(config: &Config, dry_run: bool) -> Result<Box<dyn MailTransport>> {
    if dry_run {
        info!("Dry run: messages are logged, nothing is sent or marked");
        return Ok(Box::new(PreviewTransport));
    }
    let mailer = SmtpMailer::new(&config.mail).context("Failed to configure SMTP transport")?;
    Ok(Box::new(mailer))
}

/// Lists what is wrong before a menu action. Unhealthy refuses the action;
/// degraded asks first.
fn preflight(config: &Config, sending: bool) -> Result<bool> {
    let report = check_prerequisites(config, sending);
    let issues: Vec<_> = report.issues().collect();
    if !issues.is_empty() {
        println!("{}", format_warning("Configuration issues detected:"));
        for check in issues {
            println!(
                "   {} - {}",
                check.component,
                check.message.as_deref().unwrap_or_default()
            );
        }
    }

    match report.overall_status {
        HealthStatus::Healthy => Ok(true),
        HealthStatus::Degraded => confirm("Continue anyway? (y/N): "),
        HealthStatus::Unhealthy => {
            println!(
                "{}",
                format_error("Cannot proceed. Fix the issues above and try again.")
            );
            Ok(false)
        }
    }
}

fn print_assign(report: &AssignReport) {
    if report.header_created {
        println!("{}", format_info("Created the identifier column"));
    }
    println!(
        "{}",
        format_success(&format!(
            "Identifiers: {} assigned, {} already present, {} rows",
            report.assigned, report.kept, report.rows_total
        ))
    );
}

fn print_generate(report: &GenerateReport) {
    println!(
        "{}",
        format_success(&format!(
            "QR codes: {} ready ({} generated, {} kept)",
            report.ready(),
            report.generated,
            report.existing
        ))
    );
    if report.rows_without_id > 0 {
        println!(
            "{}",
            format_skip(&format!("{} rows without an identifier", report.rows_without_id))
        );
    }
    if report.failed > 0 {
        println!(
            "{}",
            format_error(&format!("{} QR codes failed", report.failed))
        );
    }
    if report.prefix_collisions > 0 {
        println!(
            "{}",
            format_warning(&format!(
                "{} identifiers share a file name with another",
                report.prefix_collisions
            ))
        );
    }
}

fn print_dispatch(report: &DispatchReport) {
    let verb = if report.dry_run { "previewed" } else { "sent" };
    println!(
        "{}",
        format_success(&format!("Emails {}: {}", verb, report.sent))
    );
    if report.skipped_delivered > 0 {
        println!(
            "{}",
            format_skip(&format!("Already sent: {}", report.skipped_delivered))
        );
    }
    if report.skipped_incomplete > 0 {
        println!(
            "{}",
            format_skip(&format!(
                "Incomplete rows skipped: {}",
                report.skipped_incomplete
            ))
        );
    }
    if report.missing_artifacts > 0 {
        println!(
            "{}",
            format_warning(&format!("Sent without QR code: {}", report.missing_artifacts))
        );
    }
    if report.failed > 0 {
        println!(
            "{}",
            format_error(&format!(
                "Failed: {} (left unmarked, rerun to retry)",
                report.failed
            ))
        );
    }
}

/// Sending needs a y/N answer and then the literal word SEND.
fn confirm_send() -> Result<bool> {
    if !confirm("Proceed with sending emails? (y/N): ")? {
        return Ok(false);
    }
    Ok(prompt("Type 'SEND' to confirm: ")? == "SEND")
}

fn confirm(question: &str) -> Result<bool> {
    Ok(prompt(question)?.eq_ignore_ascii_case("y"))
}

fn prompt(question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        anyhow::bail!("Input closed");
    }
    Ok(line.trim().to_string())
}

fn cancelled() -> Result<()> {
    println!("{}", format_skip("Operation cancelled."));
    Ok(())
}
