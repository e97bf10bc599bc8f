use anyhow::Context;
use clap::{Parser, Subcommand};
use libris_kernel::settings::{Environment, Settings};

const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_USER_PASSWORD: &str = "user123";

#[derive(Parser)]
#[command(name = "libris")]
#[command(about = "LIBRIS book library service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server until SIGINT/SIGTERM
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Create default accounts and sample books on an empty database
    Seed(SeedArgs),
}

#[derive(clap::Args)]
struct SeedArgs {
    /// Password for the `admin` account
    #[arg(long, env = "LIBRIS_SEED_ADMIN_PASSWORD", default_value = DEFAULT_ADMIN_PASSWORD)]
    admin_password: String,
    /// Password for the `user` account
    #[arg(long, env = "LIBRIS_SEED_USER_PASSWORD", default_value = DEFAULT_USER_PASSWORD)]
    user_password: String,
}

impl SeedArgs {
    /// Production accounts may not keep the well-known default passwords.
    fn check(&self, environment: &Environment) -> anyhow::Result<()> {
        if *environment != Environment::Production {
            return Ok(());
        }
        if self.admin_password == DEFAULT_ADMIN_PASSWORD {
            anyhow::bail!(
                "refusing to seed production with the default admin password; \
                 set --admin-password or LIBRIS_SEED_ADMIN_PASSWORD"
            );
        }
        if self.user_password == DEFAULT_USER_PASSWORD {
            anyhow::bail!(
                "refusing to seed production with the default user password; \
                 set --user-password or LIBRIS_SEED_USER_PASSWORD"
            );
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load LIBRIS settings")?;
    libris_telemetry::init(&settings.telemetry);

    match cli.command {
        Command::Serve => libris_app::app::serve(settings).await,
        Command::Migrate => {
            let applied = libris_app::app::migrate(settings).await?;
            tracing::info!(applied, "migrate finished");
            Ok(())
        }
        Command::Seed(args) => {
            args.check(&settings.environment)?;
            let seeded =
                libris_app::app::seed(settings, &args.admin_password, &args.user_password).await?;
            if !seeded {
                tracing::info!("database already has users; nothing seeded");
            }
            Ok(())
        }
    }
}
