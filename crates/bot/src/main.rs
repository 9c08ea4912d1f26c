//! Point d'entrée du bot audio
//!
//! Le binaire parle le protocole de contrôle sur stdin/stdout ; tout le
//! diagnostic libre part sur stderr. Il émet `ready` au démarrage puis
//! sert les commandes jusqu'au `quit`, à la fin du flux d'entrée ou à
//! un signal d'arrêt.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::BufReader;

use audio::SymphoniaDecoder;
use transport::{MediaService, SimulatedConfig, SimulatedService};

use bot::{run_command_loop, EventMessage, EventWriter, LogLevel, Session};

/// Bot de diffusion audio piloté par un protocole JSON ligne à ligne
#[derive(Parser, Debug)]
#[command(name = "audio-bot", version)]
struct Cli {
    /// Répertoire des logs internes du SDK temps réel
    #[arg(long, default_value = "./rtc_log")]
    log_dir: PathBuf,

    /// Latence simulée d'établissement de connexion, en millisecondes
    #[arg(long, default_value_t = 20)]
    connect_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let writer = EventWriter::stdout();

    let sim_config = SimulatedConfig {
        connect_delay: std::time::Duration::from_millis(cli.connect_delay_ms),
        ..SimulatedConfig::default()
    };
    let service: Option<Box<dyn MediaService>> =
        Some(Box::new(SimulatedService::new(sim_config)));

    let mut session = Session::new(
        service,
        None,
        Box::new(SymphoniaDecoder::new()),
        writer.clone(),
    )
    .with_log_dir(cli.log_dir);

    // Le parent attend ready avant d'envoyer la moindre commande
    writer.emit(&EventMessage::Ready {
        sdk_available: session.sdk_available(),
        error: session.sdk_error().map(str::to_string),
    });

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = run_command_loop(stdin, &mut session) => {
            if let Err(e) = result {
                eprintln!("Erreur de la boucle de commandes: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            writer.log(LogLevel::Info, "Signal d'arrêt reçu");
        }
    }

    // Nettoyage final quelle que soit la raison de la sortie
    session.cleanup().await;
    Ok(())
}
