mod credentials;
mod logging;
mod render;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use skywatch_core::{reveal_tab_with, JobType, ScrollBehavior, StreamPhase};
use skywatch_engine::{
    reveal_tab_with_retry, ArtifactsPanel, BackendApi, ClientConfig, ConsoleHandle,
    ConsoleSettings, PanelSync, ReqwestApiClient, ViewStateStore,
};
use skywatch_logging::{sky_info, sky_warn};

use crate::credentials::{CredentialStore, StoredCredentials};
use crate::logging::LogDestination;

/// How long a follow waits for the job list to report the final state.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "skywatch", version, about = "Operator console for the pipeline orchestrator")]
struct Cli {
    /// Backend API root, e.g. http://localhost:8000/api
    #[arg(long, env = "SKYWATCH_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Overrides the stored API key; `login` stores it.
    #[arg(long, env = "SKYWATCH_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Directory holding state.ron (defaults to ~/.skywatch).
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogDestination::File, global = true)]
    log: LogDestination,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Remember the `--api-key` (and optionally the base URL) for later runs.
    Login,
    /// Forget the stored API key.
    Logout,
    /// Show the role the backend grants the current key.
    Whoami,
    /// List jobs, newest first.
    Jobs,
    /// Start a pipeline job.
    Submit {
        job_type: JobType,
        #[arg(short = 'p', long = "param", value_parser = parse_pair)]
        params: Vec<(String, String)>,
        /// On a duplicate, attach to the job already running.
        #[arg(long)]
        attach_existing: bool,
        /// Print the job's log until it finishes.
        #[arg(long)]
        follow: bool,
    },
    /// Print a job's live log until it closes.
    Follow { job_id: String },
    Cancel { job_id: String },
    /// Delete every job record and its artifacts.
    Clear,
    /// Live dashboard refreshed by the poller until Ctrl-C.
    Watch {
        /// Seconds between polls.
        #[arg(long, default_value_t = 3)]
        interval: u64,
        /// Section to bring to the top.
        #[arg(long)]
        tab: Option<String>,
    },
    /// Edit a view-state address and print the permalink.
    Link {
        #[arg(long, default_value = "/")]
        from: String,
        #[arg(long = "set", value_parser = parse_pair)]
        set: Vec<(String, String)>,
        #[arg(long = "unset")]
        unset: Vec<String>,
    },
    /// List a job's artifacts through the artifacts panel.
    Artifacts {
        #[arg(long, default_value = "/")]
        from: String,
        #[arg(long)]
        job: Option<String>,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(cli.log, level);

    let store = match &cli.state_dir {
        Some(dir) => CredentialStore::new(dir.clone()),
        None => CredentialStore::in_home().context("locating the credential store")?,
    };

    match &cli.command {
        Command::Login => return login(&cli, &store).await,
        Command::Logout => {
            if store.clear().context("removing stored credentials")? {
                println!("logged out");
            } else {
                println!("no stored credentials");
            }
            return Ok(());
        }
        _ => {}
    }

    let settings = settings(&cli, &store);
    let api: Arc<dyn BackendApi> = Arc::new(
        ReqwestApiClient::new(&settings.client).context("building the API client")?,
    );

    match cli.command {
        Command::Login | Command::Logout => Ok(()),
        Command::Whoami => whoami(api.as_ref()).await,
        Command::Jobs => {
            let jobs = api.list_jobs().await.context("listing jobs")?;
            for line in render::job_list(&jobs) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Submit {
            job_type,
            params,
            attach_existing,
            follow,
        } => submit(api, job_type, params.into_iter().collect(), attach_existing, follow).await,
        Command::Follow { job_id } => {
            let job = api
                .get_job(&job_id)
                .await
                .with_context(|| format!("looking up job {job_id}"))?;
            println!("{job_id}: {} ({})", job.job_type, job.state);
            let handle = ConsoleHandle::spawn(api);
            handle.select_job(job_id.clone());
            follow_log(&handle, &job_id).await
        }
        Command::Cancel { job_id } => {
            let ack = api.cancel_job(&job_id).await.context("cancelling the job")?;
            println!("{job_id}: {}", ack.status);
            Ok(())
        }
        Command::Clear => {
            let ack = api.clear_all_jobs().await.context("clearing jobs")?;
            println!("{} ({} jobs removed)", ack.status, ack.total.unwrap_or(0));
            Ok(())
        }
        Command::Watch { interval, tab } => {
            watch(api, Duration::from_secs(interval), tab, &settings).await
        }
        Command::Link { from, set, unset } => link(&from, set, unset, &settings).await,
        Command::Artifacts { from, job } => artifacts(api, &from, job).await,
    }
}

/// Flags and environment first, then the stored credentials, then defaults.
fn settings(cli: &Cli, store: &CredentialStore) -> ConsoleSettings {
    let stored = store.load().unwrap_or_else(|err| {
        sky_warn!("ignoring stored credentials: {}", err);
        StoredCredentials::default()
    });
    let defaults = ConsoleSettings::default();
    let base_url = cli
        .base_url
        .clone()
        .or(stored.base_url)
        .unwrap_or(defaults.client.base_url.clone());
    let client = ClientConfig {
        base_url,
        ..defaults.client.clone()
    }
    .with_api_key(cli.api_key.clone().or(stored.api_key));
    ConsoleSettings { client, ..defaults }
}

async fn login(cli: &Cli, store: &CredentialStore) -> Result<()> {
    let key = cli.api_key.as_deref().map(str::trim).unwrap_or_default();
    if key.is_empty() {
        bail!("pass the key with --api-key or SKYWATCH_API_KEY");
    }
    let credentials = StoredCredentials::new(Some(key.to_string()), cli.base_url.clone());
    let path = store.save(&credentials).context("saving credentials")?;
    println!("saved to {}", path.display());

    let settings = settings(cli, store);
    let api = ReqwestApiClient::new(&settings.client).context("building the API client")?;
    if let Err(err) = whoami(&api).await {
        sky_warn!("key saved but not verified: {:#}", err);
        println!("could not verify the key: {err:#}");
    }
    Ok(())
}

async fn whoami(api: &dyn BackendApi) -> Result<()> {
    let identity = api.whoami().await.context("asking the backend who we are")?;
    let access = if identity.can_operate() {
        "may start and cancel jobs"
    } else {
        "read only"
    };
    println!("role: {} ({access})", identity.role);
    Ok(())
}

async fn submit(
    api: Arc<dyn BackendApi>,
    job_type: JobType,
    params: BTreeMap<String, String>,
    attach_existing: bool,
    follow: bool,
) -> Result<()> {
    let handle = ConsoleHandle::spawn(api);
    handle.start(job_type, params);
    let view = handle
        .wait_for(|view| {
            view.active_job.is_some() || view.conflict.is_some() || view.errors.submit.is_some()
        })
        .await;

    let job_id = if let Some(existing) = view.conflict {
        if !attach_existing {
            println!(
                "duplicate job already running: {existing} (rerun with --attach-existing or `skywatch follow {existing}`)"
            );
            return Ok(());
        }
        println!("attaching to running job {existing}");
        handle.select_job(existing.clone());
        existing
    } else if let Some(error) = view.errors.submit {
        bail!("submitting {job_type} failed: {error}");
    } else {
        let job_id = view.active_job.unwrap_or_default();
        println!("started {job_type} as {job_id}");
        job_id
    };

    if follow || attach_existing {
        follow_log(&handle, &job_id).await?;
    }
    Ok(())
}

/// Prints the attached job's log as it arrives; Ctrl-C detaches.
async fn follow_log(handle: &ConsoleHandle, job_id: &str) -> Result<()> {
    let mut views = handle.subscribe();
    let mut printed: Option<u64> = None;
    loop {
        let view = views.borrow_and_update().clone();
        if view.stream.job_id.as_deref() == Some(job_id) {
            for line in &view.stream.lines {
                if printed.map_or(true, |last| line.seq > last) {
                    println!("{}", line.text);
                    printed = Some(line.seq);
                }
            }
            if view.stream.phase == StreamPhase::Closed {
                break;
            }
        }
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.detach_stream();
                println!("detached from {job_id}");
                return Ok(());
            }
        }
    }

    let settled = tokio::time::timeout(
        SETTLE_TIMEOUT,
        handle.wait_for(|view| {
            view.jobs
                .iter()
                .any(|row| row.job_id == job_id && row.state.is_terminal())
        }),
    )
    .await;
    match settled {
        Ok(view) => {
            if let Some(row) = view.jobs.iter().find(|row| row.job_id == job_id) {
                println!("{job_id} finished: {}", row.state);
            }
        }
        Err(_) => println!("log stream for {job_id} closed"),
    }
    Ok(())
}

async fn watch(
    api: Arc<dyn BackendApi>,
    interval: Duration,
    tab: Option<String>,
    settings: &ConsoleSettings,
) -> Result<()> {
    let mut handle = ConsoleHandle::spawn(api);
    handle.start_polling(interval);
    let mut views = handle.subscribe();
    let mut first_render = true;

    loop {
        let view = views.borrow_and_update().clone();
        let mut screen = render::console_screen(&view);
        if let Some(tab) = &tab {
            focus_tab(&mut screen, tab, first_render, settings.reveal_retry_delay).await;
        }
        first_render = false;
        print!("\x1b[2J\x1b[H{}", screen.render());

        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    sky_info!("watch stopped");
    handle.shutdown();
    Ok(())
}

/// Brings `tab` to the top. Only the first render waits for a late section.
async fn focus_tab(
    screen: &mut render::Screen,
    tab: &str,
    first_render: bool,
    retry_delay: Duration,
) -> Option<String> {
    if first_render {
        reveal_tab_with_retry(screen, tab, retry_delay).await
    } else {
        reveal_tab_with(screen, tab, ScrollBehavior::Instant)
    }
}

async fn link(
    from: &str,
    set: Vec<(String, String)>,
    unset: Vec<String>,
    settings: &ConsoleSettings,
) -> Result<()> {
    let store = ViewStateStore::from_href(from);
    let updates = set
        .into_iter()
        .map(|(key, value)| (key, Some(value)))
        .chain(unset.into_iter().map(|key| (key, None)));
    store.write_many(updates);

    let mut screen = render::Screen::default();
    for title in ["Overview", "Jobs", "Reliability"] {
        screen.push_section(title, Vec::new());
    }
    match reveal_tab_with_retry(&mut screen, &store.tab(), settings.reveal_retry_delay).await {
        Some(anchor) => println!("tab: {} (#{anchor})", store.tab()),
        None => println!("tab: {} (no such section)", store.tab()),
    }
    println!("{}", store.permalink());
    Ok(())
}

async fn artifacts(api: Arc<dyn BackendApi>, from: &str, job: Option<String>) -> Result<()> {
    let store = ViewStateStore::from_href(from);
    let panel = PanelSync::new(ArtifactsPanel::new(api), store.clone());
    let selection = match job {
        Some(job_id) => {
            panel
                .select(Some(job_id.clone()))
                .await
                .context("updating the view state")?;
            Some(job_id)
        }
        None => panel.mount().await,
    };

    let view = panel.view();
    if let Some(error) = view.error {
        bail!("loading artifacts failed: {error}");
    }
    match (selection, view.data.flatten()) {
        (Some(job_id), Some(listing)) => {
            println!("{job_id}: {}", listing.root.as_deref().unwrap_or("-"));
            if listing.files.is_empty() {
                println!("  (no files)");
            }
            for file in &listing.files {
                match file.size {
                    Some(size) => println!("  {:<40} {size:>10}", file.path),
                    None => println!("  {}", file.path),
                }
            }
        }
        _ => println!("no job selected; pass --job or a link with job=<id>"),
    }
    println!("{}", store.permalink());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{focus_tab, parse_pair, Cli, Command};
    use crate::render::Screen;
    use clap::Parser;
    use skywatch_core::JobType;
    use std::time::Duration;

    #[test]
    fn pairs_split_on_first_equals() {
        assert_eq!(
            parse_pair("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_pair("empty=").unwrap(), ("empty".to_string(), String::new()));
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=x").is_err());
    }

    #[test]
    fn submit_parses_type_and_params() {
        let cli = Cli::try_parse_from([
            "skywatch",
            "submit",
            "train-kepler-strict",
            "-p",
            "epochs=3",
            "--param",
            "seed=7",
            "--follow",
        ])
        .unwrap();

        match cli.command {
            Command::Submit {
                job_type,
                params,
                attach_existing,
                follow,
            } => {
                assert_eq!(job_type, JobType::TrainKeplerStrict);
                assert_eq!(
                    params,
                    vec![
                        ("epochs".to_string(), "3".to_string()),
                        ("seed".to_string(), "7".to_string())
                    ]
                );
                assert!(!attach_existing);
                assert!(follow);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn login_takes_the_key_as_a_flag() {
        let cli = Cli::try_parse_from(["skywatch", "login", "--api-key", "k-123"]).unwrap();

        assert!(matches!(cli.command, Command::Login));
        assert_eq!(cli.api_key.as_deref(), Some("k-123"));
        assert!(Cli::try_parse_from(["skywatch", "login", "k-123"]).is_err());
    }

    #[tokio::test]
    async fn only_the_first_render_waits_for_a_missing_tab() {
        let mut screen = Screen::default();
        screen.push_section("Jobs", Vec::new());
        let long_retry = Duration::from_secs(60);

        let redraw = tokio::time::timeout(
            Duration::from_secs(1),
            focus_tab(&mut screen, "reliability", false, long_retry),
        )
        .await;
        assert_eq!(redraw, Ok(None));

        let first = focus_tab(&mut screen, "reliability", true, Duration::from_millis(5)).await;
        assert_eq!(first, None);
        assert_eq!(
            focus_tab(&mut screen, "Jobs", false, long_retry).await.as_deref(),
            Some("jobs")
        );
        assert_eq!(screen.focus(), Some("jobs"));
    }

    #[test]
    fn unknown_job_type_is_rejected() {
        assert!(Cli::try_parse_from(["skywatch", "submit", "warp-drive"]).is_err());
    }
}
