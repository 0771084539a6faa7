//! Tradepost CLI - Command-line storefront.
//!
//! # Usage
//!
//! ```bash
//! # Fill the cart
//! tradepost cart add KENTE-01 "Kente Cloth" 100 --qty 2
//! tradepost cart list
//!
//! # Choose where it goes
//! tradepost delivery search tema
//! tradepost delivery select "Greater Accra" Tema
//!
//! # Place the order
//! tradepost checkout --payment cod --name "Ama Mensah" --phone 0241234567
//! tradepost checkout --payment momo --listen
//!
//! # Pick up an interrupted order or payment
//! tradepost resume --listen
//! ```
//!
//! # Commands
//!
//! - `cart` - Add, list, change and clear cart lines
//! - `delivery` - Browse the fee table and choose a delivery address
//! - `profile` - Set the customer profile used for checkout
//! - `checkout` - Place an order
//! - `resume` - Finish an interrupted commit or payment

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use tradepost_core::PaymentMethod;
use tradepost_storefront::config::LocalConfig;
use tradepost_storefront::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "tradepost")]
#[command(author, version, about = "Tradepost command-line storefront")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Choose the delivery address
    Delivery {
        #[command(subcommand)]
        action: DeliveryAction,
    },
    /// Manage the customer profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Place an order for the cart
    Checkout(CheckoutArgs),
    /// Finish an interrupted order commit or payment
    Resume {
        /// Serve the payment return/callback routes while waiting
        #[arg(long)]
        listen: bool,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add a product to the cart
    Add {
        /// Product ID
        product_id: String,
        /// Product name
        name: String,
        /// Unit price in cedis
        price: Decimal,
        /// Quantity
        #[arg(short, long, default_value_t = 1)]
        qty: u32,
        /// Product image path
        #[arg(long)]
        image: Option<String>,
    },
    /// List cart lines and the subtotal
    List,
    /// Change the quantity of a line
    Qty {
        /// Product ID
        product_id: String,
        /// New quantity
        qty: u32,
    },
    /// Remove a line
    Remove {
        /// Product ID
        product_id: String,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum DeliveryAction {
    /// List regions, towns and fees
    Regions,
    /// Search towns and regions
    Search {
        /// Text to look for
        query: String,
    },
    /// Deliver to a town from the fee table
    Select {
        /// Region name
        region: String,
        /// Town name
        town: String,
    },
    /// Deliver to a free-text address
    Manual {
        /// Full delivery address
        address: String,
        /// Delivery fee (agents only)
        #[arg(long)]
        fee: Option<Decimal>,
    },
    /// Show the current delivery selection
    Show,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Save the customer profile
    Set {
        /// Customer ID issued by the order API
        #[arg(long)]
        customer_id: String,
        /// Full name
        #[arg(short, long)]
        name: Option<String>,
        /// Contact number
        #[arg(short, long)]
        phone: Option<String>,
        /// Default delivery address
        #[arg(short, long)]
        address: Option<String>,
        /// Place orders as a sales agent
        #[arg(long)]
        agent: bool,
    },
    /// Show the customer profile
    Show,
}

#[derive(Args)]
struct CheckoutArgs {
    /// Payment method (cod, pickup, agent, momo, card)
    #[arg(long)]
    payment: PaymentMethod,
    /// Recipient name (defaults to the profile name)
    #[arg(short, long)]
    name: Option<String>,
    /// Recipient contact number (defaults to the profile number)
    #[arg(short, long)]
    phone: Option<String>,
    /// Mobile money number or card reference
    #[arg(long)]
    account_number: Option<String>,
    /// Note for the delivery rider
    #[arg(long)]
    note: Option<String>,
    /// "lat,lng" of the delivery location
    #[arg(long)]
    geo: Option<String>,
    /// Serve the payment return/callback routes while waiting
    #[arg(long)]
    listen: bool,
}

#[tokio::main]
async fn main() {
    let local = LocalConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&local);
    telemetry::init_tracing();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, local).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, local: LocalConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = commands::Local::open(&local)?;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Add {
                product_id,
                name,
                price,
                qty,
                image,
            } => commands::cart::add(&ctx, product_id, name, price, qty, image)?,
            CartAction::List => commands::cart::list(&ctx),
            CartAction::Qty { product_id, qty } => commands::cart::set_quantity(&ctx, &product_id, qty)?,
            CartAction::Remove { product_id } => commands::cart::remove(&ctx, &product_id)?,
            CartAction::Clear => commands::cart::clear(&ctx)?,
        },
        Commands::Delivery { action } => match action {
            DeliveryAction::Regions => commands::delivery::regions(&ctx),
            DeliveryAction::Search { query } => commands::delivery::search(&ctx, &query),
            DeliveryAction::Select { region, town } => {
                commands::delivery::select(&ctx, &region, &town)?;
            }
            DeliveryAction::Manual { address, fee } => {
                commands::delivery::manual(&ctx, &address, fee)?;
            }
            DeliveryAction::Show => commands::delivery::show(&ctx),
        },
        Commands::Profile { action } => match action {
            ProfileAction::Set {
                customer_id,
                name,
                phone,
                address,
                agent,
            } => commands::profile::set(&ctx, customer_id, name, phone, address, agent)?,
            ProfileAction::Show => commands::profile::show(&ctx),
        },
        Commands::Checkout(args) => {
            let request = tradepost_storefront::checkout::CheckoutRequest {
                recipient_name: args.name,
                recipient_contact_number: args.phone,
                payment_method: Some(args.payment),
                payment_account_number: args.account_number,
                order_note: args.note,
                geo_location: args.geo,
            };
            commands::checkout::place(ctx, request, args.listen).await?;
        }
        Commands::Resume { listen } => commands::checkout::resume(ctx, listen).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_checkout_parses_payment_aliases() {
        let cli = Cli::try_parse_from(["tradepost", "checkout", "--payment", "momo", "--listen"])
            .unwrap_or_else(|e| panic!("{e}"));
        let Commands::Checkout(args) = cli.command else {
            panic!("expected checkout");
        };
        assert_eq!(args.payment, PaymentMethod::MobileMoney);
        assert!(args.listen);

        assert!(Cli::try_parse_from(["tradepost", "checkout", "--payment", "barter"]).is_err());
    }

    #[test]
    fn test_cart_add_parses_decimal_price() {
        let cli = Cli::try_parse_from(["tradepost", "cart", "add", "SHEA-02", "Shea Butter", "12.50"])
            .unwrap_or_else(|e| panic!("{e}"));
        let Commands::Cart {
            action: CartAction::Add { price, qty, .. },
        } = cli.command
        else {
            panic!("expected cart add");
        };
        assert_eq!(price, Decimal::new(1250, 2));
        assert_eq!(qty, 1);
    }
}
