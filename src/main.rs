use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use ngoconnect_client::api::{ApplicationStatus, CampaignStatus, VolunteerApplication};
use ngoconnect_client::{ClientError, NgoClient, SessionEvent, Settings};
use std::path::PathBuf;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ngoconnect")]
#[command(version)]
#[command(about = "Command-line client for the NGOConnect donation and volunteer platform", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "NGO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Create an account (verify it with `verify` afterwards)
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long, env = "NGO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Confirm an email address with the emailed code
    Verify {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
    /// Send a new verification code
    ResendOtp {
        #[arg(long)]
        email: String,
    },
    /// Change the signed-in user's password
    Password {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    /// Browse and manage campaigns
    #[command(subcommand)]
    Campaigns(CampaignCommand),
    /// List your donations
    Donations,
    /// Volunteer applications and time logs
    #[command(subcommand)]
    Volunteer(VolunteerCommand),
    /// Admin user management
    #[command(subcommand)]
    Users(UserCommand),
}

impl Command {
    /// Commands backed by manager/admin endpoints.
    fn needs_staff(&self) -> bool {
        matches!(
            self,
            Command::Users(_)
                | Command::Campaigns(CampaignCommand::Delete { .. })
                | Command::Volunteer(VolunteerCommand::Applications { .. })
        )
    }
}

#[derive(Subcommand, Debug)]
enum CampaignCommand {
    List {
        /// ACTIVE, PLANNED, COMPLETED or ON_HOLD
        #[arg(long)]
        status: Option<String>,
    },
    Show { slug: String },
    Delete { slug: String },
}

#[derive(Subcommand, Debug)]
enum VolunteerCommand {
    Apply {
        #[arg(long)]
        skills: String,
        #[arg(long)]
        availability: String,
    },
    Logs,
    /// Applications by status (managers only)
    Applications {
        #[arg(long, default_value = "PENDING")]
        status: String,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    List,
}

fn init_logging(level: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { level }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::new(),
    }
    .context("failed to load configuration")?;

    init_logging(&settings.logging.level, cli.verbose);
    debug!(base_url = %settings.api.base_url, "Configuration loaded");

    let client = NgoClient::new(settings)?;
    let mut events = client.session().subscribe();
    let state = client.session().initialize().await?;
    info!(%state, "Session initialized");

    if cli.command.needs_staff() {
        let is_staff = client
            .session()
            .profile()
            .await
            .map_or(false, |profile| profile.role.is_staff());
        if !is_staff {
            anyhow::bail!("This command is only available to managers and admins");
        }
    }

    let outcome = run(&client, cli.command).await;
    react_to_events(&mut events);

    outcome.map_err(|e| anyhow::anyhow!(e.user_message()))
}

async fn run(client: &NgoClient, command: Command) -> Result<(), ClientError> {
    let session = client.session();

    match command {
        Command::Login { email, password } => {
            let profile = session.sign_in(&email, &password).await?;
            println!("Signed in as {} ({})", profile.email, profile.role);
        }
        Command::Logout => {
            session.log_out().await?;
            println!("Signed out");
        }
        Command::Whoami => match session.profile().await {
            Some(profile) => {
                println!("{} <{}>", profile.full_name(), profile.email);
                println!("role: {}", profile.role);
                println!("session: {}", session.state().await);
            }
            None => println!("Not signed in"),
        },
        Command::Register {
            email,
            first_name,
            last_name,
            password,
        } => {
            let result = session
                .register(&email, &first_name, &last_name, &password, &password)
                .await?;
            println!(
                "{}",
                result
                    .message
                    .unwrap_or_else(|| "Registered. Check your email for the verification code.".into())
            );
        }
        Command::Verify { email, otp } => {
            let result = session.verify_email(&email, &otp).await?;
            println!("{}", result.message.unwrap_or_else(|| "Email verified".into()));
        }
        Command::ResendOtp { email } => {
            session.resend_otp(&email).await?;
            println!("Verification code sent to {}", email);
        }
        Command::Password { old, new } => {
            let ack = session.change_password(&old, &new, &new).await?;
            println!("{}", ack.message.unwrap_or_else(|| "Password changed".into()));
        }
        Command::Campaigns(CampaignCommand::List { status }) => {
            let status = status.map(|s| s.parse::<CampaignStatus>()).transpose()?;
            for campaign in client.campaigns().list(status).await? {
                println!(
                    "{:<30} {:<10} goal {}",
                    campaign.slug,
                    campaign.status.map_or("-", |s| s.as_str()),
                    campaign.goal_amount.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Campaigns(CampaignCommand::Show { slug }) => {
            let campaign = client.campaigns().get(&slug).await?;
            println!("{}", campaign.title);
            println!("{}", campaign.description);
            println!(
                "{} to {}",
                campaign.start_date.as_deref().unwrap_or("?"),
                campaign.end_date.as_deref().unwrap_or("?")
            );
        }
        Command::Campaigns(CampaignCommand::Delete { slug }) => {
            client.campaigns().delete(&slug).await?;
            println!("Deleted {}", slug);
        }
        Command::Donations => {
            for donation in client.donations().mine().await? {
                println!(
                    "{:<30} {:>10} {}",
                    donation.campaign_label(),
                    donation.amount.as_deref().unwrap_or("-"),
                    donation.status.as_deref().unwrap_or("Completed")
                );
            }
        }
        Command::Volunteer(VolunteerCommand::Apply { skills, availability }) => {
            let profile = client
                .volunteers()
                .apply(&VolunteerApplication { skills, availability })
                .await?;
            println!("Application {}", profile.application_status.as_str());
        }
        Command::Volunteer(VolunteerCommand::Logs) => {
            for log in client.volunteers().time_logs().await? {
                let start = log.start_time.map(|t| t.to_rfc3339()).unwrap_or_default();
                let end = log.end_time.map(|t| t.to_rfc3339()).unwrap_or_default();
                println!("{} -> {}", start, end);
            }
        }
        Command::Volunteer(VolunteerCommand::Applications { status }) => {
            let status = status.parse::<ApplicationStatus>()?;
            for volunteer in client.volunteers().list_applications(status).await? {
                println!(
                    "{:<6} {:<10} {}",
                    volunteer.id.map(|id| id.to_string()).unwrap_or_default(),
                    volunteer.application_status.as_str(),
                    volunteer.skills
                );
            }
        }
        Command::Users(UserCommand::List) => {
            for user in client.users().list().await? {
                println!(
                    "{:<6} {:<30} {:<13} {}",
                    user.id,
                    user.email,
                    user.role,
                    if user.is_active { "active" } else { "inactive" }
                );
            }
        }
    }

    Ok(())
}

/// Everything buffered on `events`. Lagging skips the overwritten events
/// and keeps reading.
fn pending_events(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut pending = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => pending.push(event),
            Err(TryRecvError::Lagged(skipped)) => debug!(skipped, "Session events dropped"),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return pending,
        }
    }
}

/// The host side of the session contract.
fn react_to_events(events: &mut broadcast::Receiver<SessionEvent>) {
    for event in pending_events(events) {
        match event {
            SessionEvent::LoginRequired { reason } => {
                debug!(?reason, "Session ended by the gateway");
                eprintln!("Your session has expired. Run `ngoconnect login` to sign in again.");
            }
            SessionEvent::Degraded { email } => {
                eprintln!("Could not reach the server to confirm {}; using cached identity.", email);
            }
            other => debug!(?other, "Session event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngoconnect_client::TerminationReason;

    #[test]
    fn test_lagged_receiver_still_sees_login_required() {
        let (sender, mut events) = broadcast::channel(1);
        sender.send(SessionEvent::TokenRefreshed).unwrap();
        sender.send(SessionEvent::SignedOut).unwrap();
        sender
            .send(SessionEvent::LoginRequired {
                reason: TerminationReason::RefreshFailed,
            })
            .unwrap();

        assert_eq!(
            pending_events(&mut events),
            vec![SessionEvent::LoginRequired {
                reason: TerminationReason::RefreshFailed
            }]
        );
    }

    #[test]
    fn test_management_commands_need_staff() {
        let cli = Cli::parse_from(["ngoconnect", "users", "list"]);
        assert!(cli.command.needs_staff());
        let cli = Cli::parse_from(["ngoconnect", "volunteer", "applications"]);
        assert!(cli.command.needs_staff());
        let cli = Cli::parse_from(["ngoconnect", "campaigns", "list"]);
        assert!(!cli.command.needs_staff());
        let cli = Cli::parse_from(["ngoconnect", "donations"]);
        assert!(!cli.command.needs_staff());
    }
}
