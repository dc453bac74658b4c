use anyhow::Result;
use painel_api::{ApiClient, AuthEvent, Session};
use painel_config::PollingRuntimeConfig;
use painel_core::{CoreError, RecordKey, SessionScope};
use painel_sync::{
    diff, exam_overbooking, screens, Filters, ListSynchronizer, ScreenSpec,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

const ENV_PAINEL_EMAIL: &str = "PAINEL_EMAIL";
const ENV_PAINEL_SENHA: &str = "PAINEL_SENHA";
const RONDAS_EXPORT_PATH: &str = "/rondas/export/csv";

#[tokio::main]
async fn main() -> Result<()> {
    let config = painel_config::load_from_env()?;
    init_file_logging(&config.log_path())?;
    let cli = parse_cli_flags()?;

    let api_config = config.api_runtime();
    let polling = config.polling_runtime();
    let protected = parse_protected_scopes(&api_config.protected_scopes)?;
    let session = Arc::new(Session::load_from(config.token_store_path(), protected)?);
    let client = Arc::new(ApiClient::new(
        api_config.base_url.clone(),
        api_config.request_timeout,
        Arc::clone(&session),
    )?);

    let spec = build_screen(&cli, &polling)?;
    ensure_signed_in(&client, spec.scope()).await?;

    if let Some(path) = cli.export.as_deref() {
        if spec.scope() == SessionScope::Rondas {
            return export_rondas(&client, &spec, &cli.filters, path).await;
        }
    }

    let sync = ListSynchronizer::new(spec, client.clone());
    if let Some(path) = cli.export.as_deref() {
        sync.refresh().await?;
        let bytes = sync.export_csv()?;
        sync.close().await;
        return write_export(path, &bytes);
    }
    if !cli.filters.is_empty() {
        sync.set_filters(cli.filters.clone()).await?;
    }

    if cli.once {
        if cli.filters.is_empty() {
            sync.refresh().await?;
        }
        print_screen(&sync, &polling);
        sync.close().await;
        return Ok(());
    }

    run_screen(&sync, &session, &polling).await;
    sync.close().await;
    Ok(())
}

async fn run_screen(sync: &ListSynchronizer, session: &Session, polling: &PollingRuntimeConfig) {
    let mut auth_events = session.subscribe();
    let mut revisions = sync.subscribe();

    if let Err(error) = sync.open().await {
        if error.is_user_visible() {
            eprintln!("{}", error.user_message());
        }
    }
    let mut previous = sync.snapshot().records;
    print_screen(sync, polling);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(screen = sync.spec().name(), "shutdown requested");
                break;
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = sync.snapshot();
                let summary = diff(&previous, &snapshot.records, sync.spec());
                if !summary.is_empty() {
                    tracing::info!(
                        screen = sync.spec().name(),
                        revision = snapshot.revision,
                        added = summary.added.len(),
                        removed = summary.removed.len(),
                        updated = summary.updated.len(),
                        reordered = summary.reordered,
                        "collection changed"
                    );
                    print_screen(sync, polling);
                }
                previous = snapshot.records;
            }
            event = auth_events.recv() => match event {
                Ok(AuthEvent::LoginRequired { scope, login_route }) => {
                    tracing::warn!(scope = %scope, login_route, "session expired");
                    eprintln!("The {scope} session expired. Sign in again ({login_route}).");
                    break;
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }
}

fn print_screen(sync: &ListSynchronizer, polling: &PollingRuntimeConfig) {
    let snapshot = sync.snapshot();
    let spec = sync.spec();
    println!(
        "[{}] {} records (revision {})",
        spec.name(),
        snapshot.records.len(),
        snapshot.revision
    );
    if let Some(error) = snapshot.last_sync_error.as_deref() {
        println!("  last sync failed: {error}");
    }
    if let Some(companion) = snapshot.companion.as_ref() {
        println!("  {companion}");
    }
    if spec.name() == "documentacao" {
        for slot in exam_overbooking(&snapshot.records, "exame", polling.exam_alert_limit) {
            println!(
                "  warning: {} exams scheduled on {} (limit {})",
                slot.total, slot.date, polling.exam_alert_limit
            );
        }
    }
}

async fn ensure_signed_in(client: &ApiClient, scope: SessionScope) -> Result<(), CoreError> {
    if client.session().is_authenticated(scope) {
        return Ok(());
    }
    let email = required_env(ENV_PAINEL_EMAIL)?;
    let senha = required_env(ENV_PAINEL_SENHA)?;
    client.login(scope, &email, &senha).await?;
    Ok(())
}

async fn export_rondas(
    client: &ApiClient,
    spec: &ScreenSpec,
    filters: &Filters,
    path: &Path,
) -> Result<()> {
    filters.validate(spec.recognized_filters())?;
    let bytes = client
        .download(spec.scope(), RONDAS_EXPORT_PATH, filters.to_query())
        .await?;
    write_export(path, &bytes)
}

fn write_export(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "export written");
    println!("Exported {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

fn build_screen(cli: &CliFlags, polling: &PollingRuntimeConfig) -> Result<ScreenSpec, CoreError> {
    let spec = match cli.screen.as_str() {
        "mrhs" => screens::mrhs()?.with_poll_interval(polling.mrhs),
        "documentacao" => screens::documentacao()?.with_poll_interval(polling.documentacao),
        "agendamento" => screens::agendamento()?.with_poll_interval(polling.agendamento),
        "candidatos-registrados" => screens::candidatos_registrados()?
            .with_poll_interval(polling.candidatos_registrados),
        "candidatos" => {
            let mrh = cli.mrh.as_deref().ok_or_else(|| {
                CoreError::Configuration(
                    "The candidatos screen needs --mrh <id>.".to_owned(),
                )
            })?;
            screens::candidatos_mrh(&RecordKey::from(mrh))?
                .with_poll_interval(polling.candidatos_mrh)
        }
        "checkdocs-cpf" => {
            let cpf = cli.cpf.as_deref().ok_or_else(|| {
                CoreError::Configuration(
                    "The checkdocs-cpf screen needs --cpf <cpf>.".to_owned(),
                )
            })?;
            screens::checkdocs_by_cpf(cpf)?
        }
        "rondas" => screens::rondas()?
            .with_poll_interval(polling.rondas)
            .with_page_size(polling.rondas_page_size as usize),
        other => {
            return Err(CoreError::Configuration(format!(
                "Unknown screen '{other}'. Use one of: mrhs, documentacao, agendamento, candidatos-registrados, candidatos, checkdocs-cpf, rondas."
            )))
        }
    };
    Ok(spec)
}

fn parse_protected_scopes(raw: &[String]) -> Result<Vec<SessionScope>, CoreError> {
    raw.iter()
        .map(|value| {
            SessionScope::from_key(value).ok_or_else(|| {
                CoreError::Configuration(format!("Unknown session scope '{value}'."))
            })
        })
        .collect()
}

fn init_file_logging(log_path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CoreError::Configuration(format!(
                    "failed to create painel log directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|error| {
            CoreError::Configuration(format!(
                "failed to open painel log file '{}': {error}",
                log_path.display()
            ))
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}

#[derive(Debug, Clone)]
struct CliFlags {
    screen: String,
    mrh: Option<String>,
    cpf: Option<String>,
    filters: Filters,
    export: Option<PathBuf>,
    once: bool,
}

impl Default for CliFlags {
    fn default() -> Self {
        Self {
            screen: "mrhs".to_owned(),
            mrh: None,
            cpf: None,
            filters: Filters::new(),
            export: None,
            once: false,
        }
    }
}

fn parse_cli_flags() -> Result<CliFlags, CoreError> {
    let mut flags = CliFlags::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--screen" => {
                flags.screen = read_cli_value(&arg, args.next())?.to_ascii_lowercase();
            }
            "--mrh" => {
                flags.mrh = Some(read_cli_value(&arg, args.next())?);
            }
            "--cpf" => {
                flags.cpf = Some(read_cli_value(&arg, args.next())?);
            }
            "--filter" => {
                let raw = read_cli_value(&arg, args.next())?;
                let Some((name, value)) = raw.split_once('=') else {
                    return Err(CoreError::Configuration(format!(
                        "Filter '{raw}' must look like name=value."
                    )));
                };
                flags.filters.set(name.trim(), value);
            }
            "--export" => {
                flags.export = Some(PathBuf::from(read_cli_value(&arg, args.next())?));
            }
            "--once" => flags.once = true,
            "--help" | "-h" => {
                print_cli_help();
                std::process::exit(0);
            }
            value if value.starts_with("--") => {
                return Err(CoreError::Configuration(format!(
                    "Unknown flag '{value}'. Run with --help for valid flags."
                )));
            }
            unknown => {
                return Err(CoreError::Configuration(format!(
                    "Unexpected argument '{unknown}'. Run with --help for valid flags."
                )));
            }
        }
    }

    Ok(flags)
}

fn print_cli_help() {
    println!("Usage: painel [--screen <name>] [--mrh <id>] [--cpf <cpf>] [--filter <name=value>]... [--export <file>] [--once]");
    println!();
    println!("  --screen <name>        mrhs, documentacao, agendamento, candidatos-registrados, candidatos, checkdocs-cpf, rondas");
    println!("  --mrh <id>             MRH whose candidates the candidatos screen lists");
    println!("  --cpf <cpf>            Collaborator whose checklist the checkdocs-cpf screen lists");
    println!("  --filter <name=value>  Query filter (rondas: dataInicio, dataFim, roteiro)");
    println!("  --export <file>        Write the screen's CSV export to <file> and exit");
    println!("  --once                 Load once, print the summary and exit");
    println!("  --help                 Show this help message");
}

fn read_cli_value(flag: &str, value: Option<String>) -> Result<String, CoreError> {
    let value = value
        .ok_or_else(|| CoreError::Configuration(format!("Missing value after {flag}.")))?;
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Err(CoreError::Configuration(format!(
            "Flag '{flag}' requires a non-empty value."
        )));
    }
    Ok(value)
}

fn required_env(name: &str) -> Result<String, CoreError> {
    let value = std::env::var(name).map_err(|_| {
        CoreError::Configuration(format!(
            "{name} is not set and no stored session was found. Export it to sign in."
        ))
    })?;
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Err(CoreError::Configuration(format!(
            "{name} is empty. Provide a non-empty value."
        )));
    }
    Ok(value)
}
