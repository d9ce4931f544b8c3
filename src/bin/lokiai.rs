use anyhow::{anyhow, Context};
use clap::{App, AppSettings, Arg, ArgMatches};
use serde::Serialize;
use serde_json::json;

use lokiai::config::{ClientOptions, SupabaseConfig};
use lokiai::models::{
    ConversationFilter, ConversationStatus, ConversationSummary, ConversationType,
};
use lokiai::Backend;

fn app() -> App<'static> {
    App::new("lokiai")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect LokiAI conversations, profiles and usage")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::new("service-role")
                .long("service-role")
                .help("Authenticate with SUPABASE_SERVICE_ROLE_KEY instead of the anon key"),
        )
        .subcommand(
            App::new("conversations")
                .about("Conversation records")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    App::new("list")
                        .about("List a user's conversations, newest first")
                        .arg(Arg::new("user").required(true))
                        .arg(Arg::new("status").long("status").takes_value(true))
                        .arg(Arg::new("type").long("type").takes_value(true))
                        .arg(Arg::new("search").long("search").takes_value(true))
                        .arg(
                            Arg::new("templates")
                                .long("templates")
                                .help("Only conversations saved as templates"),
                        ),
                )
                .subcommand(
                    App::new("show")
                        .about("Show one conversation")
                        .arg(Arg::new("id").required(true)),
                )
                .subcommand(
                    App::new("complete")
                        .about("Mark a conversation completed")
                        .arg(Arg::new("id").required(true)),
                )
                .subcommand(
                    App::new("delete")
                        .about("Delete a conversation")
                        .arg(Arg::new("id").required(true)),
                ),
        )
        .subcommand(
            App::new("profile")
                .about("Fetch a user's profile, creating it if missing")
                .arg(Arg::new("user").required(true))
                .arg(Arg::new("email").required(true)),
        )
        .subcommand(
            App::new("usage")
                .about("Usage totals for a user")
                .arg(Arg::new("user").required(true))
                .arg(
                    Arg::new("days")
                        .long("days")
                        .takes_value(true)
                        .default_value("7")
                        .help("Rows of the daily usage view to include"),
                ),
        )
        .subcommand(
            App::new("whoami")
                .about("Sign in with email and password and show the current user")
                .arg(Arg::new("email").required(true))
                .arg(Arg::new("password").required(true)),
        )
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    matches
        .value_of(name)
        .ok_or_else(|| anyhow!("missing argument <{}>", name))
}

async fn conversations(backend: &Backend, matches: &ArgMatches) -> anyhow::Result<()> {
    let queries = backend.conversations();

    match matches.subcommand() {
        Some(("list", sub)) => {
            let user = arg(sub, "user")?;
            let records = if sub.is_present("templates") {
                queries.list_templates(user).await?
            } else {
                let filter = ConversationFilter {
                    status: sub
                        .value_of("status")
                        .map(str::parse::<ConversationStatus>)
                        .transpose()?,
                    conversation_type: sub
                        .value_of("type")
                        .map(str::parse::<ConversationType>)
                        .transpose()?,
                    search: sub.value_of("search").map(str::to_string),
                };
                queries.list(user, &filter).await?
            };
            print(&json!({
                "summary": ConversationSummary::from_records(&records),
                "conversations": records,
            }))
        }
        Some(("show", sub)) => print(&queries.get_by_id(arg(sub, "id")?).await?),
        Some(("complete", sub)) => print(&queries.complete(arg(sub, "id")?).await?),
        Some(("delete", sub)) => {
            let id = arg(sub, "id")?;
            queries.delete(id).await?;
            print(&json!({ "deleted": id }))
        }
        _ => Err(anyhow!("unknown conversations command")),
    }
}

async fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    pretty_env_logger::init();

    let matches = app().get_matches();

    let config = SupabaseConfig::from_env().context("reading backend configuration")?;
    let backend = if matches.is_present("service-role") {
        Backend::service_role(config, ClientOptions::default())?
    } else {
        Backend::new(config)?
    };

    match matches.subcommand() {
        Some(("conversations", sub)) => conversations(&backend, sub).await,
        Some(("profile", sub)) => {
            let profile = backend
                .profiles()
                .get_or_create(arg(sub, "user")?, arg(sub, "email")?)
                .await?;
            print(&profile)
        }
        Some(("usage", sub)) => {
            let user = arg(sub, "user")?;
            let days: u32 = arg(sub, "days")?
                .parse()
                .with_context(|| "--days must be a positive number")?;
            let usage = backend.usage();
            print(&json!({
                "user": usage.user_stats(user).await?,
                "daily": usage.daily(days).await?,
            }))
        }
        Some(("whoami", sub)) => {
            backend
                .auth()
                .sign_in_with_password(arg(sub, "email")?, arg(sub, "password")?)
                .await
                .context("signing in")?;
            let current = backend
                .identity()
                .get_current_user()
                .await
                .ok_or_else(|| anyhow!("no session after sign-in"))?;
            print(&current)
        }
        _ => Err(anyhow!("unknown command")),
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
