//! Cafe Loyalty CLI - terminal front end for the cart, sign-in and loyalty
//! features.
//!
//! # Usage
//!
//! ```bash
//! # Put a customized latte in the cart and show it
//! cafe cart add 3 --name Latte --price 55 --quantity 2 --option "9:Avena:leche:2:Bebidas"
//! cafe cart list
//!
//! # Pick options from the menu instead of spelling them out
//! cafe menu options 3
//! cafe cart add 3 --name Latte --price 55 --pick leche=9
//!
//! # Sign in (password read from stdin)
//! echo "secret123" | cafe auth login --email ana@cafe.mx
//!
//! # Redeem a scanned QR voucher
//! cafe points redeem '{"puntos": 50}'
//!
//! # Edit your profile and browse rewards
//! cafe profile edit --first-name Ana --birth-date 1995-04-12
//! cafe rewards list --balance 250
//! ```
//!
//! # Environment Variables
//!
//! See `cafe_loyalty_client::config` for the full list. Logs go to stderr and
//! are controlled with `RUST_LOG`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use cafe_loyalty_client::{AppState, ClientConfig};
use cafe_loyalty_client::session::OAuthProvider;

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "cafe")]
#[command(author, version, about = "Cafe Loyalty from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Sign in, sign up and sign out
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Browse the menu
    Menu {
        #[command(subcommand)]
        action: MenuAction,
    },
    /// List branches, optionally nearest first
    Branches {
        /// Your position as `latitude,longitude`
        #[arg(long)]
        near: Option<String>,
    },
    /// List upcoming events
    Events,
    /// List your orders
    Orders,
    /// Loyalty points
    Points {
        #[command(subcommand)]
        action: PointsAction,
    },
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Rewards you can buy with points
    Rewards {
        #[command(subcommand)]
        action: RewardsAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    List,
    /// Add a product
    Add {
        /// Product id
        product_id: i32,

        /// Product name shown in the cart
        #[arg(short, long)]
        name: String,

        /// Unit price
        #[arg(short, long)]
        price: Decimal,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Customization as `id:name:kind:category_id:category_name`
        #[arg(long = "option", conflicts_with = "picks")]
        options: Vec<String>,

        /// Menu option as `kind=option_id` (needs a backend)
        #[arg(long = "pick")]
        picks: Vec<String>,
    },
    /// Remove every entry for a product
    Remove { product_id: i32 },
    /// Set the quantity for a product (0 or less removes it)
    Update {
        product_id: i32,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum AuthAction {
    /// Sign in with email and password (password read from stdin)
    Login {
        #[arg(short, long)]
        email: String,
    },
    /// Create an account (password read from stdin)
    Signup {
        #[arg(short, long)]
        email: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Print the URL that starts a third-party sign-in
    OauthUrl {
        /// `google`, `apple` or `github`
        #[arg(short, long, default_value = "google")]
        provider: OAuthProvider,

        /// Where the provider sends the user back to
        #[arg(short, long)]
        redirect_to: Url,
    },
}

#[derive(Subcommand)]
enum MenuAction {
    /// Show the customization options for a product
    Options { product_id: i32 },
}

#[derive(Subcommand)]
enum PointsAction {
    /// Redeem the text of a scanned QR voucher
    Redeem { qr: String },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show your profile
    Show,
    /// Change profile fields; omitted fields keep their value
    Edit {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        /// `masculino`, `femenino`, `otro`, or `none` to clear
        #[arg(long)]
        gender: Option<String>,

        /// `YYYY-MM-DD`, or `none` to clear
        #[arg(long)]
        birth_date: Option<String>,
    },
}

#[derive(Subcommand)]
enum RewardsAction {
    /// List products and discounts
    List {
        /// Your point balance, to mark what you can redeem
        #[arg(short, long)]
        balance: Option<u32>,
    },
    /// Check whether a balance covers one reward
    Check {
        /// Reward id from `cafe rewards list`
        id: i32,

        #[arg(short, long)]
        balance: u32,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let config = ClientConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Logs go to stderr so command output stays clean on stdout
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cafe_loyalty_client=info,cafe_loyalty_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let state = match AppState::start(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(cli, &state).await;

    // Queued cart writes must land before the process exits
    if let Err(e) = state.shutdown().await {
        tracing::error!("Failed to save cart: {e}");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_reportable() {
                let event_id = sentry::capture_error(&e);
                tracing::error!(error = %e, sentry_event_id = %event_id, "Command failed");
            } else {
                tracing::error!("{e}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, state: &AppState) -> Result<(), CliError> {
    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::List => commands::cart::list(state)?,
            CartAction::Add {
                product_id,
                name,
                price,
                quantity,
                options,
                picks,
            } => {
                let item = commands::cart::AddItem {
                    product_id,
                    name,
                    price,
                    quantity,
                    options,
                    picks,
                };
                commands::cart::add(state, item).await?;
            }
            CartAction::Remove { product_id } => commands::cart::remove(state, product_id).await?,
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(state, product_id, quantity).await?,
            CartAction::Clear => commands::cart::clear(state).await?,
        },
        Commands::Auth { action } => match action {
            AuthAction::Login { email } => commands::auth::login(state, &email).await?,
            AuthAction::Signup { email } => commands::auth::signup(state, &email).await?,
            AuthAction::Logout => commands::auth::logout(state).await?,
            AuthAction::Whoami => commands::auth::whoami(state).await?,
            AuthAction::OauthUrl {
                provider,
                redirect_to,
            } => commands::auth::oauth_url(state, provider, &redirect_to)?,
        },
        Commands::Menu { action } => match action {
            MenuAction::Options { product_id } => {
                commands::catalog::options(state, product_id).await?;
            }
        },
        Commands::Branches { near } => commands::catalog::branches(state, near.as_deref()).await?,
        Commands::Events => commands::catalog::events(state).await?,
        Commands::Orders => commands::catalog::orders(state).await?,
        Commands::Points { action } => match action {
            PointsAction::Redeem { qr } => commands::points::redeem(state, &qr).await?,
        },
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::profile::show(state).await?,
            ProfileAction::Edit {
                first_name,
                last_name,
                phone,
                gender,
                birth_date,
            } => {
                let edits = commands::profile::ProfileEdits {
                    first_name,
                    last_name,
                    phone,
                    gender,
                    birth_date,
                };
                commands::profile::edit(state, edits).await?;
            }
        },
        Commands::Rewards { action } => match action {
            RewardsAction::List { balance } => commands::rewards::list(state, balance).await?,
            RewardsAction::Check { id, balance } => {
                commands::rewards::check(state, id, balance).await?;
            }
        },
    }
    Ok(())
}
