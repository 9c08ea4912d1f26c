//! Machine à états de la session du bot
//!
//! La session détient toutes les ressources vivantes : le service temps
//! réel, la connexion au canal, le job de lecture courant. Elle est la
//! propriété exclusive de la boucle de commandes ; les tâches annexes
//! (pacer, callbacks d'observation) ne touchent que des états partagés
//! atomiques et le writer d'événements.
//!
//! # Cycle de vie
//!
//! ```text
//! Uninitialized --init--> Initialized --join--> Joined --leave--> Left
//!                              ^                                   |
//!                              +----------------join---------------+
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use audio::{AudioConfig, AudioDecoder, AudioError, PcmSpec};
use transport::{
    ConnectionConfig, ConnectionInfo, ConnectionObserver, MediaConnection, MediaService,
    ServiceConfig, TransportError,
};

use crate::pacer::{PacerConfig, PlaybackJob};
use crate::protocol::{ChannelStatus, EventMessage, EventWriter, LogLevel};

/// État du cycle de vie de la session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Processus démarré, service pas encore initialisé
    Uninitialized,
    /// Service initialisé avec un appId
    Initialized,
    /// Connecté (ou en cours de connexion) à un canal
    Joined,
    /// Canal quitté ; un nouveau join reste possible
    Left,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Joined => "joined",
            Self::Left => "left",
        };
        write!(f, "{}", name)
    }
}

/// Erreurs de la session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Le SDK temps réel n'est pas disponible sur cette machine
    #[error("SDK temps réel indisponible: {0}")]
    NotAvailable(String),

    /// Opération refusée dans l'état courant de la session
    #[error("Opération '{operation}' invalide dans l'état '{state}'")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// Opération qui exige une connexion active à un canal
    #[error("Non connecté à un canal")]
    NotConnected,

    /// Erreur de décodage du fichier audio
    #[error("Erreur de décodage: {0}")]
    Decode(#[from] AudioError),

    /// Erreur de la couche transport
    #[error("Erreur transport: {0}")]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Crée une erreur InvalidState
    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }
}

/// Type Result personnalisé pour la session
pub type SessionResult<T> = Result<T, SessionError>;

/// Session du bot : ressources vivantes et machine à états
pub struct Session {
    /// Service temps réel (None si le SDK n'est pas disponible)
    service: Option<Box<dyn MediaService>>,

    /// Raison de l'indisponibilité du SDK, pour l'événement ready
    sdk_error: Option<String>,

    connection: Option<Arc<dyn MediaConnection>>,

    /// Drapeau de connexion, partagé avec l'observateur du transport
    connected: Arc<AtomicBool>,

    state: SessionState,
    channel: Option<String>,
    uid: Option<String>,

    /// Job de lecture courant (au plus un à la fois)
    playback: Option<PlaybackJob>,

    /// Durée du dernier fichier chargé, conservée après la fin du job
    last_duration_ms: u64,

    decoder: Box<dyn AudioDecoder>,
    writer: EventWriter,
    audio_config: AudioConfig,
    pacer_config: PacerConfig,

    /// Répertoire des logs internes du SDK
    log_dir: PathBuf,
}

impl Session {
    /// Crée une session dans l'état Uninitialized
    ///
    /// `service` vaut `None` quand le SDK n'a pas pu être chargé ;
    /// `sdk_error` porte alors la raison, rapportée dans `ready` et
    /// dans les erreurs `NotAvailable`.
    pub fn new(
        service: Option<Box<dyn MediaService>>,
        sdk_error: Option<String>,
        decoder: Box<dyn AudioDecoder>,
        writer: EventWriter,
    ) -> Self {
        Self {
            service,
            sdk_error,
            connection: None,
            connected: Arc::new(AtomicBool::new(false)),
            state: SessionState::Uninitialized,
            channel: None,
            uid: None,
            playback: None,
            last_duration_ms: 0,
            decoder,
            writer,
            audio_config: AudioConfig::default(),
            pacer_config: PacerConfig::default(),
            log_dir: PathBuf::from("./rtc_log"),
        }
    }

    /// Remplace le répertoire de logs du SDK
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Remplace les paramètres du pacer
    pub fn with_pacer_config(mut self, config: PacerConfig) -> Self {
        self.pacer_config = config;
        self
    }

    /// Le SDK temps réel est-il disponible ?
    pub fn sdk_available(&self) -> bool {
        self.service.is_some()
    }

    /// Raison de l'indisponibilité du SDK, le cas échéant
    pub fn sdk_error(&self) -> Option<&str> {
        self.sdk_error.as_deref()
    }

    /// État courant de la session
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Writer d'événements de la session
    pub fn writer(&self) -> &EventWriter {
        &self.writer
    }

    fn not_available(&self) -> SessionError {
        SessionError::NotAvailable(
            self.sdk_error
                .clone()
                .unwrap_or_else(|| "aucun service temps réel".to_string()),
        )
    }

    /// Initialise le service temps réel avec l'appId donné
    ///
    /// Réinitialisable : un second init écrase le précédent.
    ///
    /// # Erreurs
    /// - `SessionError::NotAvailable` : SDK absent
    /// - `SessionError::Transport` : appId refusé
    pub fn initialize(&mut self, app_id: &str) -> SessionResult<()> {
        let config = ServiceConfig::new(app_id).with_log_dir(self.log_dir.clone());

        match self.service.as_mut() {
            Some(service) => service.initialize(&config)?,
            None => return Err(self.not_available()),
        }

        self.state = SessionState::Initialized;
        self.writer
            .log(LogLevel::Success, "Service temps réel initialisé");
        Ok(())
    }

    /// Rejoint un canal vocal
    ///
    /// Crée la connexion, enregistre l'observateur, puis émet l'ordre de
    /// connexion. Le drapeau de connexion est posé de façon optimiste
    /// dès que l'ordre est accepté ; l'observateur le corrige si le
    /// canal tombe ensuite.
    ///
    /// Un join alors qu'un canal est déjà rejoint quitte d'abord
    /// l'ancien canal.
    ///
    /// # Erreurs
    /// - `SessionError::InvalidState` : session non initialisée
    /// - `SessionError::Transport` : ordre de connexion refusé ; la
    ///   session reste dans son état précédent
    pub async fn join(
        &mut self,
        channel: &str,
        uid: &str,
        token: Option<&str>,
    ) -> SessionResult<()> {
        if self.state == SessionState::Uninitialized {
            return Err(SessionError::invalid_state("join", self.state));
        }

        if self.connection.is_some() {
            self.leave().await?;
        }

        let service = self.service.as_ref().ok_or_else(|| self.not_available())?;

        let spec = PcmSpec::from_config(&self.audio_config);
        let connection = service.create_connection(ConnectionConfig::audio_broadcast(spec))?;

        connection.register_observer(Arc::new(SessionObserver {
            connected: Arc::clone(&self.connected),
            writer: self.writer.clone(),
        }));

        if let Err(e) = connection.connect(token.unwrap_or(""), channel, uid).await {
            // Connexion refusée : on nettoie et la session ne change pas
            let _ = connection.disconnect().await;
            return Err(e.into());
        }

        self.connected.store(true, Ordering::SeqCst);
        self.connection = Some(connection);
        self.channel = Some(channel.to_string());
        self.uid = Some(uid.to_string());
        self.state = SessionState::Joined;

        self.writer.log(
            LogLevel::Success,
            format!("Canal rejoint: {} (uid {})", channel, uid),
        );
        self.writer.emit(&EventMessage::Status {
            status: ChannelStatus::Connected,
            channel: Some(channel.to_string()),
            uid: Some(uid.to_string()),
        });

        Ok(())
    }

    /// Quitte le canal courant
    ///
    /// Arrête d'abord la lecture en cours. Sans effet (et sans
    /// événement) si aucun canal n'est rejoint : un second leave ne
    /// produit jamais de `status: disconnected` en double.
    pub async fn leave(&mut self) -> SessionResult<()> {
        if self.connection.is_none() && self.playback.is_none() {
            return Ok(());
        }

        self.stop_playback().await;

        if let Some(connection) = self.connection.take() {
            connection.disconnect().await?;
            self.connected.store(false, Ordering::SeqCst);
            self.channel = None;
            self.uid = None;
            self.state = SessionState::Left;

            self.writer.log(LogLevel::Info, "Canal quitté");
            self.writer.emit(&EventMessage::Status {
                status: ChannelStatus::Disconnected,
                channel: None,
                uid: None,
            });
        }

        Ok(())
    }

    /// Lance la lecture d'un fichier audio dans le canal
    ///
    /// Décode le fichier entier en PCM au format cible, émet
    /// `playback_started`, puis confie le buffer au pacer. Une lecture
    /// déjà en cours est arrêtée d'abord.
    ///
    /// # Erreurs
    /// - `SessionError::NotConnected` : aucun canal rejoint
    /// - `SessionError::Decode` : fichier introuvable ou illisible ; la
    ///   connexion au canal n'est pas affectée
    pub async fn play(&mut self, file: &str) -> SessionResult<()> {
        let connection = match &self.connection {
            Some(connection) if self.connected.load(Ordering::SeqCst) => Arc::clone(connection),
            _ => return Err(SessionError::NotConnected),
        };

        if self.playback.as_ref().is_some_and(|job| job.is_active()) {
            self.writer
                .log(LogLevel::Warning, "Lecture précédente arrêtée");
        }
        self.stop_playback().await;

        let target = PcmSpec::from_config(&self.audio_config);
        let pcm = self.decoder.decode(Path::new(file), &target)?;

        self.last_duration_ms = pcm.duration_ms();
        self.writer.log(
            LogLevel::Info,
            format!("Audio chargé: {} ({} ms)", file, self.last_duration_ms),
        );
        self.writer.emit(&EventMessage::PlaybackStarted {
            file: file.to_string(),
            duration: self.last_duration_ms,
        });

        self.playback = Some(PlaybackJob::spawn(
            pcm,
            file,
            connection,
            self.writer.clone(),
            self.pacer_config.clone(),
        ));

        Ok(())
    }

    /// Arrête la lecture en cours, si lecture il y a
    ///
    /// Retourne `true` si un job actif a été arrêté. L'attente de la
    /// tâche est bornée par le stop_timeout du pacer.
    pub async fn stop_playback(&mut self) -> bool {
        let Some(job) = self.playback.take() else {
            return false;
        };

        let was_active = job.is_active();
        job.stop(self.pacer_config.stop_timeout).await;

        if was_active {
            self.writer.log(LogLevel::Info, "Lecture arrêtée");
        }
        was_active
    }

    /// Instantané de l'état courant, prêt à être émis
    ///
    /// `current_file` n'est renseigné que pendant une lecture active ;
    /// `playback_duration` conserve la durée du dernier fichier chargé.
    pub fn status_snapshot(&self) -> EventMessage {
        let is_playing = self.playback.as_ref().is_some_and(|job| job.is_active());

        EventMessage::StatusResponse {
            is_connected: self.connected.load(Ordering::SeqCst),
            is_playing,
            channel: self.channel.clone(),
            uid: self.uid.clone(),
            current_file: if is_playing {
                self.playback.as_ref().map(|job| job.file().to_string())
            } else {
                None
            },
            playback_progress: self
                .playback
                .as_ref()
                .map(|job| job.progress_ms())
                .unwrap_or(0),
            playback_duration: self.last_duration_ms,
        }
    }

    /// Libère toutes les ressources de la session
    ///
    /// Idempotent : lecture arrêtée, canal quitté, service relâché.
    pub async fn cleanup(&mut self) {
        if self.service.is_none() && self.connection.is_none() && self.playback.is_none() {
            return;
        }

        self.stop_playback().await;

        if let Err(e) = self.leave().await {
            self.writer
                .log(LogLevel::Warning, format!("Erreur en quittant le canal: {}", e));
        }

        if let Some(mut service) = self.service.take() {
            service.release();
        }

        self.writer.log(LogLevel::Info, "Nettoyage terminé");
    }
}

/// Observateur des événements de connexion de la session
///
/// Déclenché depuis les threads internes du transport : se limite à
/// mettre à jour le drapeau atomique et à émettre des logs via le
/// writer verrouillé.
struct SessionObserver {
    connected: Arc<AtomicBool>,
    writer: EventWriter,
}

impl ConnectionObserver for SessionObserver {
    fn on_connected(&self, info: &ConnectionInfo) {
        self.connected.store(true, Ordering::SeqCst);
        self.writer.log(
            LogLevel::Success,
            format!("Connecté au canal {}", info.channel_id),
        );
    }

    fn on_disconnected(&self, info: &ConnectionInfo, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        self.writer.log(
            LogLevel::Info,
            format!("Déconnecté du canal {} ({})", info.channel_id, reason),
        );
    }

    fn on_connection_failure(&self, info: &ConnectionInfo, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        self.writer.log(
            LogLevel::Error,
            format!("Connexion au canal {} échouée: {}", info.channel_id, reason),
        );
    }

    fn on_reconnecting(&self, info: &ConnectionInfo, reason: &str) {
        self.writer.log(
            LogLevel::Warning,
            format!("Reconnexion au canal {} ({})", info.channel_id, reason),
        );
    }

    fn on_reconnected(&self, info: &ConnectionInfo) {
        self.connected.store(true, Ordering::SeqCst);
        self.writer.log(
            LogLevel::Success,
            format!("Reconnecté au canal {}", info.channel_id),
        );
    }

    fn on_user_joined(&self, user_id: &str) {
        self.writer
            .log(LogLevel::Info, format!("Utilisateur {} a rejoint", user_id));
    }

    fn on_user_left(&self, user_id: &str, reason: &str) {
        self.writer.log(
            LogLevel::Info,
            format!("Utilisateur {} est parti ({})", user_id, reason),
        );
    }
}
