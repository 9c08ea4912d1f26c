//! Pacer de lecture : rythme l'envoi du PCM dans le transport
//!
//! Le décodeur produit un buffer PCM complet ; ce module le découpe en
//! chunks et les pousse dans la connexion au rythme de l'horloge murale,
//! en vérifiant le drainage du buffer interne du SDK entre deux chunks.
//!
//! Chaque lecture est un `PlaybackJob` : une tâche tokio dédiée, un
//! état partagé (progression, drapeau actif) et un token d'annulation.
//! Le job émet ses événements (`progress`, `playback_complete`,
//! `playback_stopped`) directement via le writer verrouillé.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use audio::PcmBuffer;
use transport::MediaConnection;

use crate::protocol::{EventMessage, EventWriter, LogLevel};

/// Paramètres de rythme du pacer
#[derive(Clone, Debug)]
pub struct PacerConfig {
    /// Taille d'un chunk, en secondes d'audio
    pub chunk_seconds: u64,

    /// Période de la boucle d'envoi
    pub tick: Duration,

    /// Période de sondage du drainage final
    pub drain_poll: Duration,

    /// Durée minimale d'un chunk : en dessous, le reliquat est abandonné
    /// plutôt que poussé (le SDK gère mal les chunks trop courts)
    pub min_chunk_ms: u64,

    /// Délai maximal d'attente de la tâche lors d'un stop
    pub stop_timeout: Duration,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            chunk_seconds: 5,
            tick: Duration::from_millis(60),
            drain_poll: Duration::from_millis(100),
            min_chunk_ms: 100,
            stop_timeout: Duration::from_secs(2),
        }
    }
}

impl PacerConfig {
    /// Configuration accélérée pour les tests
    pub fn test_config() -> Self {
        Self {
            chunk_seconds: 1,
            tick: Duration::from_millis(1),
            drain_poll: Duration::from_millis(2),
            min_chunk_ms: 100,
            stop_timeout: Duration::from_millis(200),
        }
    }
}

/// État partagé d'un job de lecture
///
/// Lu par la session (pour `status`) pendant que la tâche du pacer
/// l'écrit : tout passe par des atomiques.
pub struct JobState {
    /// Le job est-il encore actif ?
    playing: AtomicBool,

    /// Position de lecture courante en millisecondes
    progress_ms: AtomicU64,
}

impl JobState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            playing: AtomicBool::new(true),
            progress_ms: AtomicU64::new(0),
        })
    }
}

/// Un job de lecture en cours
///
/// Propriétaire de la tâche tokio qui pousse le PCM. La session n'en
/// détient jamais plus d'un à la fois : lancer une nouvelle lecture
/// arrête d'abord le job courant.
pub struct PlaybackJob {
    /// Chemin du fichier en cours de lecture
    file: String,

    /// Durée totale de l'audio en millisecondes
    duration_ms: u64,

    state: Arc<JobState>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PlaybackJob {
    /// Lance la lecture d'un buffer PCM dans une connexion
    ///
    /// Le job démarre immédiatement dans sa propre tâche. L'appelant a
    /// déjà émis `playback_started` ; le job émettra les `progress`
    /// puis exactement un événement terminal.
    pub fn spawn(
        pcm: PcmBuffer,
        file: impl Into<String>,
        connection: Arc<dyn MediaConnection>,
        writer: EventWriter,
        config: PacerConfig,
    ) -> Self {
        let file = file.into();
        let duration_ms = pcm.duration_ms();
        let state = JobState::new();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_pacer(
            pcm,
            file.clone(),
            duration_ms,
            connection,
            writer,
            config,
            Arc::clone(&state),
            cancel.clone(),
        ));

        Self {
            file,
            duration_ms,
            state,
            cancel,
            handle,
        }
    }

    /// Chemin du fichier en cours de lecture
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Durée totale de l'audio en millisecondes
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Position de lecture courante en millisecondes
    pub fn progress_ms(&self) -> u64 {
        self.state.progress_ms.load(Ordering::SeqCst)
    }

    /// Le job est-il encore actif ?
    pub fn is_active(&self) -> bool {
        self.state.playing.load(Ordering::SeqCst)
    }

    /// Arrête le job et attend sa terminaison, avec délai borné
    ///
    /// Si la tâche ne se termine pas dans le délai, elle est abandonnée
    /// (elle observera l'annulation à son prochain tick) : le stop ne
    /// bloque jamais la boucle de commandes indéfiniment.
    pub async fn stop(self, stop_timeout: Duration) {
        self.cancel.cancel();
        if timeout(stop_timeout, self.handle).await.is_err() {
            self.state.playing.store(false, Ordering::SeqCst);
        }
    }

    /// Attend la fin naturelle du job (tests uniquement)
    #[cfg(test)]
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}

/// Boucle d'envoi d'un job de lecture
#[allow(clippy::too_many_arguments)]
async fn run_pacer(
    pcm: PcmBuffer,
    file: String,
    duration_ms: u64,
    connection: Arc<dyn MediaConnection>,
    writer: EventWriter,
    config: PacerConfig,
    state: Arc<JobState>,
    cancel: CancellationToken,
) {
    let bytes_per_ms = pcm.spec.bytes_per_ms();
    let chunk_budget = bytes_per_ms * config.chunk_seconds as usize * 1000;
    let min_chunk = bytes_per_ms * config.min_chunk_ms as usize;
    let total = pcm.len();

    let mut sent = 0usize;
    let mut aborted = false;

    while sent < total && !cancel.is_cancelled() {
        // Un nouveau chunk ne part que si le précédent est drainé
        let drained = match connection.is_push_completed().await {
            Ok(drained) => drained,
            Err(e) => {
                writer.log(
                    LogLevel::Warning,
                    format!("Vérification du drainage impossible: {}", e),
                );
                true
            }
        };

        if drained {
            let remaining = total - sent;
            let mut read_len = chunk_budget.min(remaining);

            // Reliquat trop court pour le SDK : on le laisse tomber
            if read_len < min_chunk {
                break;
            }

            // Aligné sur une milliseconde entière d'audio
            read_len -= read_len % bytes_per_ms;

            if let Err(e) = connection
                .push_pcm(
                    &pcm.data[sent..sent + read_len],
                    pcm.spec.sample_rate,
                    pcm.spec.channels,
                )
                .await
            {
                writer.log(LogLevel::Error, format!("Envoi PCM échoué: {}", e));
                aborted = true;
                break;
            }

            sent += read_len;

            let current = if total > 0 {
                (sent as u64 * duration_ms) / total as u64
            } else {
                0
            };
            state.progress_ms.store(current, Ordering::SeqCst);

            let percent = if total > 0 {
                ((sent * 100 / total) as u8).min(100)
            } else {
                100
            };
            writer.emit(&EventMessage::Progress {
                current,
                total: duration_ms,
                percent,
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(config.tick) => {}
        }
    }

    // Le dernier chunk est poussé mais pas forcément drainé : on attend
    // qu'il le soit avant de déclarer la lecture terminée
    while !aborted && !cancel.is_cancelled() {
        match connection.is_push_completed().await {
            Ok(true) | Err(_) => break,
            Ok(false) => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(config.drain_poll) => {}
        }
    }

    if aborted || cancel.is_cancelled() {
        writer.log(LogLevel::Info, format!("Lecture interrompue: {}", file));
        writer.emit(&EventMessage::PlaybackStopped { file });
    } else {
        writer.log(LogLevel::Success, format!("Lecture terminée: {}", file));
        writer.emit(&EventMessage::PlaybackComplete { file });
    }

    state.progress_ms.store(0, Ordering::SeqCst);
    state.playing.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::{AudioConfig, PcmSpec};
    use transport::{SimulatedConfig, SimulatedConnection};

    fn pcm_of_ms(ms: usize) -> PcmBuffer {
        let spec = PcmSpec::from_config(&AudioConfig::default());
        PcmBuffer::new(vec![0u8; ms * spec.bytes_per_ms()], spec)
    }

    async fn connected(config: SimulatedConfig) -> Arc<SimulatedConnection> {
        let conn = Arc::new(SimulatedConnection::new(config));
        conn.connect("", "salon", "42").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        conn
    }

    #[tokio::test]
    async fn test_chunks_cover_whole_buffer() {
        let conn = connected(SimulatedConfig::test_config()).await;
        let (writer, captured) = EventWriter::capture();

        // 2050 ms : deux chunks de 1 s, reliquat de 50 ms abandonné
        let job = PlaybackJob::spawn(
            pcm_of_ms(2050),
            "/tmp/a.mp3",
            conn.clone(),
            writer,
            PacerConfig::test_config(),
        );
        job.wait().await;

        assert_eq!(conn.pushed_chunks(), vec![32_000, 32_000]);
        assert_eq!(conn.push_stats().bytes_pushed, 64_000);

        // Reliquat sous le minimum : jamais poussé, mais la lecture se
        // termine quand même naturellement
        let events = captured.events();
        assert!(matches!(
            events.last(),
            Some(EventMessage::PlaybackComplete { .. })
        ));
    }

    #[tokio::test]
    async fn test_progress_is_monotone_then_terminal() {
        let conn = connected(SimulatedConfig::test_config()).await;
        let (writer, captured) = EventWriter::capture();

        let job = PlaybackJob::spawn(
            pcm_of_ms(3000),
            "/tmp/a.mp3",
            conn,
            writer,
            PacerConfig::test_config(),
        );
        job.wait().await;

        let events = captured.events();
        let mut last_percent = 0u8;
        let mut saw_terminal = false;
        for event in &events {
            match event {
                EventMessage::Progress {
                    current,
                    total,
                    percent,
                } => {
                    assert!(!saw_terminal, "progress après l'événement terminal");
                    assert!(*percent >= last_percent);
                    assert!(*percent <= 100);
                    assert!(current <= total);
                    last_percent = *percent;
                }
                EventMessage::PlaybackComplete { file } => {
                    assert!(!saw_terminal, "deux événements terminaux");
                    assert_eq!(file, "/tmp/a.mp3");
                    saw_terminal = true;
                }
                EventMessage::PlaybackStopped { .. } => {
                    panic!("lecture interrompue alors que rien ne l'a arrêtée");
                }
                EventMessage::Log { .. } => {}
                other => panic!("Événement inattendu: {:?}", other),
            }
        }
        assert!(saw_terminal);
        assert_eq!(last_percent, 100);
    }

    #[tokio::test]
    async fn test_stop_emits_playback_stopped() {
        // Drainage temps réel : le job reste actif assez longtemps pour
        // être arrêté en plein vol
        let config = SimulatedConfig {
            drain_speed: 1.0,
            ..SimulatedConfig::test_config()
        };
        let conn = connected(config).await;
        let (writer, captured) = EventWriter::capture();

        let job = PlaybackJob::spawn(
            pcm_of_ms(5000),
            "/tmp/a.mp3",
            conn,
            writer,
            PacerConfig::test_config(),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(job.is_active());

        job.stop(Duration::from_millis(500)).await;

        let events = captured.events();
        assert!(matches!(
            events.last(),
            Some(EventMessage::PlaybackStopped { .. })
        ));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, EventMessage::PlaybackComplete { .. }))
        );
    }

    #[tokio::test]
    async fn test_push_failure_stops_playback() {
        let config = SimulatedConfig {
            fail_push_after: Some(1),
            ..SimulatedConfig::test_config()
        };
        let conn = connected(config).await;
        let (writer, captured) = EventWriter::capture();

        let job = PlaybackJob::spawn(
            pcm_of_ms(3000),
            "/tmp/a.mp3",
            conn.clone(),
            writer,
            PacerConfig::test_config(),
        );
        job.wait().await;

        // Un seul chunk est passé avant la panne
        assert_eq!(conn.pushed_chunks().len(), 1);

        let events = captured.events();
        assert!(matches!(
            events.last(),
            Some(EventMessage::PlaybackStopped { .. })
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            EventMessage::Log {
                level: LogLevel::Error,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_state_resets_after_completion() {
        let conn = connected(SimulatedConfig::test_config()).await;
        let (writer, _captured) = EventWriter::capture();

        let job = PlaybackJob::spawn(
            pcm_of_ms(500),
            "/tmp/a.mp3",
            conn,
            writer,
            PacerConfig::test_config(),
        );
        let state = Arc::clone(&job.state);
        job.wait().await;

        assert!(!state.playing.load(Ordering::SeqCst));
        assert_eq!(state.progress_ms.load(Ordering::SeqCst), 0);
    }
}
