//! onvifctl - envoie une requête SOAP à une caméra ONVIF configurée
//!
//! ```text
//! onvifctl cameras [--config DIR]
//! onvifctl send <camera> <body-file|-> [--action URI] [--sync-time] [--config DIR]
//! ```

use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, TimeDelta, Utc};
use onvifconfig::{CameraConfig, Config};
use onvifsoap::clock::{DEVICE_NS_DECLARATION, GET_SYSTEM_DATE_AND_TIME};
use onvifsoap::{SoapClient, SoapRequest, UreqDigestTransport, camera_time};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Cameras,
    Send {
        camera: String,
        body: BodySource,
        action: Option<String>,
        sync_time: bool,
    },
    Help,
}

#[derive(Debug, PartialEq, Eq)]
enum BodySource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, PartialEq, Eq)]
struct Options {
    command: Command,
    config_dir: Option<PathBuf>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Erreur: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_args(env::args().skip(1))?;
    let config = Config::load_config(options.config_dir.as_deref())?;
    init_tracing(&config.get_log_min_level());

    match options.command {
        Command::Help => print_usage(),
        Command::Cameras => {
            for name in config.camera_names() {
                match config.get_camera(&name) {
                    Ok(camera) => println!("{name}\t{}", camera.address),
                    Err(err) => println!("{name}\t<invalid: {err:#}>"),
                }
            }
        }
        Command::Send {
            camera,
            body,
            action,
            sync_time,
        } => {
            let profile = config.get_camera(&camera)?;
            let body = read_body(&body)?;
            let client = client(&config);

            let camera_time = if sync_time {
                fetch_camera_time(&client, &profile)?
            } else {
                None
            };

            let request = build_request(&config, &profile, body, action, camera_time)?;
            info!(camera = %camera, "Sending ONVIF request");
            let tree = client.send(&request, &profile.address)?;
            print!("{tree}");
        }
    }

    Ok(())
}

fn parse_args<I>(args: I) -> Result<Options>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut positional = Vec::new();
    let mut config_dir = None;
    let mut action = None;
    let mut sync_time = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--config requiert un répertoire"))?;
                config_dir = Some(PathBuf::from(value));
            }
            "--action" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--action requiert une URI"))?;
                action = Some(value);
            }
            "--sync-time" => sync_time = true,
            "--help" | "-h" => {
                return Ok(Options {
                    command: Command::Help,
                    config_dir,
                });
            }
            "-" => positional.push(arg),
            other if other.starts_with('-') => {
                bail!("Argument inconnu: {other}. Utilise --help pour l'aide.")
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("cameras") => Command::Cameras,
        Some("send") => {
            let camera = positional
                .next()
                .ok_or_else(|| anyhow!("send: nom de caméra manquant"))?;
            let body = match positional.next().as_deref() {
                Some("-") => BodySource::Stdin,
                Some(path) => BodySource::File(PathBuf::from(path)),
                None => bail!("send: fichier de corps manquant (ou '-' pour stdin)"),
            };
            Command::Send {
                camera,
                body,
                action,
                sync_time,
            }
        }
        Some(other) => bail!("Commande inconnue: {other}"),
        None => Command::Help,
    };

    if let Some(extra) = positional.next() {
        bail!("Argument en trop: {extra}");
    }

    Ok(Options {
        command,
        config_dir,
    })
}

fn print_usage() {
    println!("Usage:");
    println!("  onvifctl cameras [--config DIR]");
    println!(
        "  onvifctl send <camera> <body-file|-> [--action URI] [--sync-time] [--config DIR]"
    );
    println!("Variables d'environnement:");
    println!("  ONVIFSOAP_CONFIG            Répertoire de configuration");
    println!("  ONVIFSOAP_CONFIG__A__B=v    Surcharge la clé a.b de la configuration");
    println!("  RUST_LOG                    Filtrage tracing (ex: onvifsoap=debug)");
}

fn init_tracing(min_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(min_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_body(source: &BodySource) -> Result<String> {
    match source {
        BodySource::Stdin => {
            let mut body = String::new();
            io::stdin()
                .read_to_string(&mut body)
                .context("Lecture du corps sur stdin")?;
            Ok(body)
        }
        BodySource::File(path) => fs::read_to_string(path)
            .with_context(|| format!("Lecture du corps depuis {}", path.display())),
    }
}

fn client(config: &Config) -> SoapClient<UreqDigestTransport> {
    let timeout = config.get_http_timeout_secs();
    let timeout = (timeout > 0).then(|| Duration::from_secs(timeout.unsigned_abs()));
    SoapClient::with_transport(UreqDigestTransport::new(timeout))
}

/// Appel non authentifié à GetSystemDateAndTime
///
/// Une réponse sans date exploitable n'est pas bloquante : l'horloge locale
/// sert alors de référence.
fn fetch_camera_time(
    client: &SoapClient<UreqDigestTransport>,
    profile: &CameraConfig,
) -> Result<Option<DateTime<Utc>>> {
    let mut request =
        SoapRequest::new(GET_SYSTEM_DATE_AND_TIME).with_namespace(DEVICE_NS_DECLARATION);
    request.suppress_debug = profile.quiet;

    let tree = client
        .send(&request, &profile.address)
        .context("GetSystemDateAndTime")?;

    let time = camera_time(&tree);
    match time {
        Some(time) => info!(camera_time = %time, "Camera clock acquired"),
        None => warn!("No usable UTCDateTime in GetSystemDateAndTime response"),
    }
    Ok(time)
}

fn build_request(
    config: &Config,
    profile: &CameraConfig,
    body: String,
    action: Option<String>,
    camera_time: Option<DateTime<Utc>>,
) -> Result<SoapRequest> {
    let age_secs = config.token_age_secs(profile);
    let token_age = TimeDelta::try_seconds(age_secs)
        .ok_or_else(|| anyhow!("token_age_secs hors limites: {age_secs}"))?;

    let mut request = SoapRequest::new(body)
        .with_namespaces(profile.namespaces.iter().cloned())
        .with_credentials(profile.username.as_str(), profile.password.as_str())
        .with_token_age(token_age);

    if let Some(action) = action {
        request = request.with_action(action);
    }
    if let Some(time) = camera_time {
        request = request.with_camera_time(time);
    }
    request.suppress_debug = profile.quiet;
    Ok(request)
}
