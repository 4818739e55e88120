// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use lensgrid_app::{
    CategoryId, ClientId, GridMode, GridSession, Identity, RecordForm, RecordId, RecordKind,
    SphereSign, format_form_date,
};
use lensgrid_tui::RecordScreen;
use runtime::{ApiRuntime, DemoRuntime};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILTER_ENV: &str = "LENSGRID_LOG";
const DEMO_SEED: u64 = 42;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `lensgrid --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    init_logging(&config)?;

    let category = options.category.unwrap_or_else(|| config.default_category());
    if let Some(view) = options.view {
        return run_view(&options, &config, view_session(view, config.default_sign(), category));
    }

    let kind = options.record;
    let session = GridSession::new(kind.grid_mode())
        .with_sign(config.default_sign())
        .with_category(category);

    if options.demo {
        let client_id = options.client_id.unwrap_or(ClientId::new(1));
        let client_name = options.client_name.clone().unwrap_or_else(|| {
            lensgrid_testkit::client_names()
                .first()
                .map_or_else(|| format!("client #{client_id}"), |name| (*name).to_owned())
        });
        let form = new_form(
            kind,
            lensgrid_testkit::demo_identity(),
            client_id,
            client_name,
            category,
        );
        if options.check_only {
            return Ok(());
        }
        tracing::info!(
            kind = kind.label(),
            mode = session.mode().as_str(),
            "starting demo session"
        );
        let mut screen = RecordScreen::new(session, form);
        let mut runtime = DemoRuntime::new(DEMO_SEED);
        return lensgrid_tui::run_app(&mut screen, &mut runtime);
    }

    let (client, identity) = api_client(&options, &config)?;
    let Some(client_id) = options.client_id else {
        bail!("--client <id> is required -- pass the client the record is for and retry");
    };
    let client_name = options
        .client_name
        .clone()
        .unwrap_or_else(|| format!("client #{client_id}"));
    let form = new_form(kind, identity, client_id, client_name, category);
    if options.check_only {
        return Ok(());
    }

    tracing::info!(
        kind = kind.label(),
        mode = session.mode().as_str(),
        base_url = client.base_url(),
        user = %form.identity.username,
        "starting session"
    );
    let mut screen = RecordScreen::new(session, form);
    let mut runtime = ApiRuntime::new(client);
    lensgrid_tui::run_app(&mut screen, &mut runtime)
}

/// Views never submit, so they need no client; outside `--demo` they still
/// need a valid token.
fn run_view(options: &CliOptions, config: &Config, session: GridSession) -> Result<()> {
    if options.demo {
        if options.check_only {
            return Ok(());
        }
        tracing::info!(mode = session.mode().as_str(), "starting demo view");
        let mut screen = RecordScreen::viewer(session);
        let mut runtime = DemoRuntime::new(DEMO_SEED);
        return lensgrid_tui::run_app(&mut screen, &mut runtime);
    }

    let (client, identity) = api_client(options, config)?;
    if options.check_only {
        return Ok(());
    }
    tracing::info!(
        mode = session.mode().as_str(),
        base_url = client.base_url(),
        user = %identity.username,
        "starting view"
    );
    let mut screen = RecordScreen::viewer(session);
    let mut runtime = ApiRuntime::new(client);
    lensgrid_tui::run_app(&mut screen, &mut runtime)
}

fn view_session(view: ViewTarget, sign: SphereSign, category: CategoryId) -> GridSession {
    match view {
        ViewTarget::Stock => GridSession::new(GridMode::StockOverview)
            .with_sign(sign)
            .with_category(category),
        ViewTarget::Record(id) => GridSession::new(GridMode::RecordDetail)
            .with_sign(sign)
            .with_record(id),
    }
}

fn api_client(options: &CliOptions, config: &Config) -> Result<(lensgrid_api::Client, Identity)> {
    let token = config.token().ok_or_else(|| {
        anyhow!("no session token -- set LENSGRID_TOKEN or [api].token and retry")
    })?;
    let identity = session_identity(&token)?;
    let client = lensgrid_api::Client::new(config.base_url(), Some(&token), config.timeout()?)
        .with_context(|| {
            format!(
                "invalid [api] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?;
    Ok((client, identity))
}

fn new_form(
    kind: RecordKind,
    identity: Identity,
    client_id: ClientId,
    client_name: String,
    category: CategoryId,
) -> RecordForm {
    let mut form = RecordForm::new(kind, identity, client_id, client_name);
    form.category_id = category;
    form.date_input = format_form_date(OffsetDateTime::now_utc());
    form
}

/// The identity is decoded once here and handed down explicitly.
fn session_identity(token: &str) -> Result<Identity> {
    let claims = lensgrid_api::decode_claims(token)
        .context("decode session token -- sign in again and update LENSGRID_TOKEN")?;
    if claims.is_expired(OffsetDateTime::now_utc().unix_timestamp()) {
        tracing::warn!(
            user = %claims.username,
            exp = claims.exp,
            "session token is expired; the backend will likely reject requests"
        );
    }
    claims.identity()
}

fn init_logging(config: &Config) -> Result<()> {
    let path = config.log_path()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let filter = match EnvFilter::try_from_env(LOG_FILTER_ENV) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log_level())
            .with_context(|| format!("invalid log level {:?}", config.log_level()))?,
    };
    let writer = Mutex::new(file);

    let result = if config.log_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .try_init()
    };
    result.map_err(|error| anyhow!("install log subscriber: {error}"))
}

/// Read-only screens selected with `--view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewTarget {
    Stock,
    Record(RecordId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    record: RecordKind,
    client_id: Option<ClientId>,
    client_name: Option<String>,
    category: Option<CategoryId>,
    view: Option<ViewTarget>,
    demo: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        record: RecordKind::Income,
        client_id: None,
        client_name: None,
        category: None,
        view: None,
        demo: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--record" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--record requires income, output, or sale"))?;
                options.record = RecordKind::parse(value.as_ref()).ok_or_else(|| {
                    anyhow!(
                        "unknown record kind {:?}; use income, output, or sale",
                        value.as_ref()
                    )
                })?;
            }
            "--client" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--client requires a numeric client id"))?;
                options.client_id = Some(ClientId::new(parse_positive_id(
                    "--client",
                    value.as_ref(),
                )?));
            }
            "--client-name" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--client-name requires a name"))?;
                options.client_name = Some(value.as_ref().to_owned());
            }
            "--category" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--category requires a numeric category id"))?;
                options.category = Some(CategoryId::new(parse_positive_id(
                    "--category",
                    value.as_ref(),
                )?));
            }
            "--view" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--view requires stock or record <id>"))?;
                options.view = Some(match value.as_ref() {
                    "stock" => ViewTarget::Stock,
                    "record" => {
                        let id = iter
                            .next()
                            .ok_or_else(|| anyhow!("--view record requires a numeric record id"))?;
                        ViewTarget::Record(RecordId::new(parse_positive_id(
                            "--view record",
                            id.as_ref(),
                        )?))
                    }
                    other => bail!("unknown view {other:?}; use stock or record <id>"),
                });
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn parse_positive_id(flag: &str, raw: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => bail!("{flag} expects a positive integer id, got {raw:?}"),
    }
}

fn print_help() {
    println!("lensgrid: lens stock entry by sphere and cylinder");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --record <kind>          income (default), output, or sale");
    println!("  --client <id>            Client the record is for (required outside --demo)");
    println!("  --client-name <name>     Display name for the client");
    println!("  --category <id>          Starting material category");
    println!("  --view stock             Browse stock for the category (read-only)");
    println!("  --view record <id>       Show a stored record on the grid (read-only)");
    println!("  --demo                   Launch against built-in demo data");
    println!("  --check                  Validate config, token, and startup options");
    println!("  --help                   Show this help");
}
