pub mod commands;

use std::io;
use std::process::ExitCode;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use salesgate_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing::Level;

use commands::policy::{PolicyInput, PolicySelector};
use commands::ActorArgs;

#[derive(Debug, Parser)]
#[command(
    name = "salesgate",
    about = "Sale order confirmation gate operator CLI",
    long_about = "Confirm sale orders behind approval and credit limit checks, drive approval requests, and manage customer credit limits.",
    after_help = "Examples:\n  salesgate migrate\n  salesgate seed\n  salesgate confirm --order order-large\n  salesgate approve --request <id> --role sales_approval_manager"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Load the demo partners, invoices, credit limits and sale orders")]
    Seed,
    #[command(about = "Confirm a sale order through the approval and credit checks")]
    Confirm {
        #[arg(long = "order", help = "Sale order id")]
        order_id: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    #[command(about = "Open a draft approval request for a sale order")]
    Request {
        #[arg(long = "order", help = "Sale order id")]
        order_id: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    #[command(about = "Submit a draft approval request")]
    Submit {
        #[arg(long = "request", help = "Approval request id")]
        request_id: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    #[command(about = "Approve a submitted request and confirm its sale order")]
    Approve {
        #[arg(long = "request", help = "Approval request id")]
        request_id: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    #[command(about = "Reject a submitted approval request")]
    Reject {
        #[arg(long = "request", help = "Approval request id")]
        request_id: String,
        #[arg(long, help = "Why the request is rejected; required")]
        reason: Option<String>,
        #[command(flatten)]
        actor: ActorArgs,
    },
    #[command(subcommand, about = "Manage customer credit limit policies")]
    Policy(PolicyCommand),
    #[command(about = "Show the credit figures of a sale order's customer")]
    OrderCredit {
        #[arg(long = "order", help = "Sale order id")]
        order_id: String,
    },
    #[command(about = "List the approval requests raised for a sale order")]
    Approvals {
        #[arg(long = "order", help = "Sale order id")]
        order_id: String,
    },
}

#[derive(Debug, Subcommand)]
enum PolicyCommand {
    #[command(about = "Create or update the active credit limit of a customer")]
    Set {
        #[arg(long = "partner", help = "Partner id; the limit covers its commercial entity")]
        partner_id: String,
        #[arg(long = "limit", help = "Credit limit amount")]
        credit_limit: Decimal,
        #[arg(long, help = "Currency code; defaults to the company currency")]
        currency: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    #[command(about = "Reactivate a retired credit limit policy")]
    Activate {
        #[arg(long = "id", help = "Credit limit policy id")]
        policy_id: String,
    },
    #[command(about = "Retire a credit limit policy")]
    Deactivate {
        #[arg(long = "id", help = "Credit limit policy id")]
        policy_id: String,
    },
    #[command(about = "Show a policy with its total due and remaining credit")]
    Show(ShowArgs),
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct ShowArgs {
    #[arg(long = "id", help = "Credit limit policy id")]
    policy_id: Option<String>,
    #[arg(long = "partner", help = "Partner whose active policy to show")]
    partner_id: Option<String>,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // A broken config still reaches the command, which reports it as JSON.
    let logging = AppConfig::load(LoadOptions::default()).unwrap_or_default().logging;
    if let Err(error) = init_logging(&logging.level, logging.format) {
        eprintln!("logging disabled: {error}");
    }

    let result = dispatch(cli.command);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn dispatch(command: Command) -> commands::CommandResult {
    match command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Seed => commands::seed::run(),
        Command::Confirm { order_id, actor } => commands::confirm::run(&order_id, &actor),
        Command::Request { order_id, actor } => commands::approval::request(&order_id, &actor),
        Command::Submit { request_id, actor } => commands::approval::submit(&request_id, &actor),
        Command::Approve { request_id, actor } => {
            commands::approval::approve(&request_id, &actor)
        }
        Command::Reject { request_id, reason, actor } => {
            commands::approval::reject(&request_id, reason.as_deref(), &actor)
        }
        Command::Policy(PolicyCommand::Set { partner_id, credit_limit, currency, note }) => {
            commands::policy::set(PolicyInput { partner_id, credit_limit, currency, note })
        }
        Command::Policy(PolicyCommand::Activate { policy_id }) => {
            commands::policy::activate(&policy_id)
        }
        Command::Policy(PolicyCommand::Deactivate { policy_id }) => {
            commands::policy::deactivate(&policy_id)
        }
        Command::Policy(PolicyCommand::Show(ShowArgs { policy_id, partner_id })) => {
            let selector = match (policy_id, partner_id) {
                (Some(id), _) => PolicySelector::Id(id),
                (None, Some(partner)) => PolicySelector::Partner(partner),
                (None, None) => {
                    return commands::CommandResult::failure(
                        "policy-show",
                        "usage",
                        "pass --id or --partner",
                        64,
                    );
                }
            };
            commands::policy::show(selector)
        }
        Command::OrderCredit { order_id } => commands::views::order_credit(&order_id),
        Command::Approvals { order_id } => commands::views::approvals(&order_id),
    }
}

/// Installs the fmt subscriber on stderr so stdout carries only the JSON
/// command result.
pub fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(io::stderr);

    match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|error| anyhow!(error))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command, PolicyCommand, ShowArgs};

    #[test]
    fn approve_collects_repeated_roles() {
        let cli = Cli::try_parse_from([
            "salesgate",
            "approve",
            "--request",
            "req-1",
            "--user",
            "maria",
            "--role",
            "sales_approval_manager",
            "--role",
            "sales_user",
        ])
        .expect("parse");

        let Command::Approve { request_id, actor } = cli.command else {
            panic!("expected approve");
        };
        assert_eq!(request_id, "req-1");
        assert_eq!(actor.user, "maria");
        assert_eq!(actor.roles, vec!["sales_approval_manager", "sales_user"]);
    }

    #[test]
    fn policy_set_parses_a_decimal_limit() {
        let cli = Cli::try_parse_from([
            "salesgate", "policy", "set", "--partner", "partner-acme", "--limit", "20000.50",
        ])
        .expect("parse");

        let Command::Policy(PolicyCommand::Set { credit_limit, currency, .. }) = cli.command
        else {
            panic!("expected policy set");
        };
        assert_eq!(credit_limit.to_string(), "20000.50");
        assert!(currency.is_none());
    }

    #[test]
    fn policy_show_needs_exactly_one_selector() {
        assert!(Cli::try_parse_from(["salesgate", "policy", "show"]).is_err());
        assert!(Cli::try_parse_from([
            "salesgate", "policy", "show", "--id", "p1", "--partner", "acme"
        ])
        .is_err());

        let cli =
            Cli::try_parse_from(["salesgate", "policy", "show", "--partner", "acme"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Policy(PolicyCommand::Show(ShowArgs { policy_id: None, partner_id: Some(_) }))
        ));
    }

    #[test]
    fn actor_defaults_to_operator_without_roles() {
        let cli = Cli::try_parse_from(["salesgate", "confirm", "--order", "order-small"])
            .expect("parse");
        let Command::Confirm { actor, .. } = cli.command else {
            panic!("expected confirm");
        };
        assert_eq!(actor.user, "operator");
        assert!(actor.roles.is_empty());
    }
}
