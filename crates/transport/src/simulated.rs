//! Implémentation simulée du transport temps réel
//!
//! Cette implémentation permet de développer et tester le bot sans SDK
//! natif : elle reproduit le contrat complet (connexion asynchrone avec
//! callbacks, drainage du buffer interne) et offre des paramètres pour
//! injecter des pannes.
//!
//! Le modèle de drainage est temporel : un chunk poussé de N ms d'audio
//! est considéré drainé après N ms × drain_speed.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::{
    ConnectionConfig, ConnectionInfo, ConnectionObserver, ConnectionState, MediaConnection,
    MediaService, PushStats, ServiceConfig, SimulatedConfig, TransportError, TransportResult,
};

/// Service temps réel simulé
///
/// Fabrique des `SimulatedConnection` partageant la même configuration
/// de simulation.
pub struct SimulatedService {
    /// Paramètres de simulation transmis aux connexions
    sim_config: SimulatedConfig,

    /// Configuration reçue à l'initialisation (None = pas initialisé)
    service_config: Option<ServiceConfig>,
}

impl SimulatedService {
    /// Crée un service simulé avec les paramètres donnés
    pub fn new(sim_config: SimulatedConfig) -> Self {
        Self {
            sim_config,
            service_config: None,
        }
    }

    /// Vérifie si le service a été initialisé
    pub fn is_initialized(&self) -> bool {
        self.service_config.is_some()
    }
}

impl Default for SimulatedService {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

impl MediaService for SimulatedService {
    fn initialize(&mut self, config: &ServiceConfig) -> TransportResult<()> {
        if config.app_id.is_empty() {
            return Err(TransportError::InitializationError(
                "appId vide".to_string(),
            ));
        }

        // Réinitialisable : écrase l'initialisation précédente
        self.service_config = Some(config.clone());
        Ok(())
    }

    fn create_connection(
        &self,
        _config: ConnectionConfig,
    ) -> TransportResult<Arc<dyn MediaConnection>> {
        if self.service_config.is_none() {
            return Err(TransportError::invalid_state(
                "create_connection",
                "service non initialisé",
            ));
        }

        Ok(Arc::new(SimulatedConnection::new(self.sim_config.clone())))
    }

    fn release(&mut self) {
        self.service_config = None;
    }

    fn service_info(&self) -> String {
        "transport simulé".to_string()
    }
}

/// État interne partagé d'une connexion simulée
struct ConnInner {
    state: ConnectionState,
    info: Option<ConnectionInfo>,

    /// Instant où le dernier chunk poussé sera entièrement drainé
    drain_deadline: Option<Instant>,
}

/// Connexion simulée à un canal vocal
///
/// Reproduit le comportement asynchrone du SDK : `connect()` retourne
/// immédiatement et le callback `on_connected` est déclenché plus tard
/// depuis une tâche interne.
pub struct SimulatedConnection {
    config: SimulatedConfig,
    inner: Arc<Mutex<ConnInner>>,
    observer: Arc<Mutex<Option<Arc<dyn ConnectionObserver>>>>,
    stats: Mutex<PushStats>,

    /// Tailles de tous les chunks poussés, pour les assertions de test
    pushed_chunks: Mutex<Vec<usize>>,
}

impl SimulatedConnection {
    /// Crée une connexion simulée déconnectée
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(ConnInner {
                state: ConnectionState::Disconnected,
                info: None,
                drain_deadline: None,
            })),
            observer: Arc::new(Mutex::new(None)),
            stats: Mutex::new(PushStats::default()),
            pushed_chunks: Mutex::new(Vec::new()),
        }
    }

    /// Retourne les tailles de tous les chunks poussés
    pub fn pushed_chunks(&self) -> Vec<usize> {
        self.pushed_chunks.lock().unwrap().clone()
    }

    /// Retourne l'état de connexion actuel
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().unwrap().state
    }
}

#[async_trait]
impl MediaConnection for SimulatedConnection {
    async fn connect(&self, _token: &str, channel: &str, uid: &str) -> TransportResult<()> {
        if self.config.fail_connect {
            return Err(TransportError::connect_failed(channel, "panne simulée"));
        }

        let info = ConnectionInfo {
            channel_id: channel.to_string(),
            local_user_id: uid.to_string(),
        };

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == ConnectionState::Connected {
                return Err(TransportError::invalid_state("connect", "déjà connecté"));
            }
            inner.state = ConnectionState::Connecting;
            inner.info = Some(info.clone());
        }

        if let Some(observer) = self.observer.lock().unwrap().as_ref() {
            observer.on_connecting(&info);
        }

        // L'établissement est asynchrone : le callback on_connected part
        // d'une tâche interne, comme depuis un thread du SDK
        let inner = Arc::clone(&self.inner);
        let observer = Arc::clone(&self.observer);
        let delay = self.config.connect_delay;
        tokio::spawn(async move {
            sleep(delay).await;

            {
                let mut inner = inner.lock().unwrap();
                if inner.state != ConnectionState::Connecting {
                    return; // Déconnecté entre-temps
                }
                inner.state = ConnectionState::Connected;
            }

            let observer = observer.lock().unwrap().clone();
            if let Some(observer) = observer {
                observer.on_connected(&info);
            }
        });

        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        let info = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == ConnectionState::Disconnected {
                return Ok(()); // Déjà coupé : no-op
            }
            inner.state = ConnectionState::Disconnected;
            inner.drain_deadline = None;
            inner.info.take()
        };

        if let Some(info) = info {
            let observer = self.observer.lock().unwrap().clone();
            if let Some(observer) = observer {
                observer.on_disconnected(&info, "leave");
            }
        }

        Ok(())
    }

    fn register_observer(&self, observer: Arc<dyn ConnectionObserver>) {
        *self.observer.lock().unwrap() = Some(observer);
    }

    async fn push_pcm(
        &self,
        data: &[u8],
        sample_rate: u32,
        channels: u16,
    ) -> TransportResult<()> {
        {
            let inner = self.inner.lock().unwrap();
            if inner.state != ConnectionState::Connected
                && inner.state != ConnectionState::Connecting
            {
                return Err(TransportError::invalid_state("push_pcm", "non connecté"));
            }
        }

        // Panne injectée après N pushes réussis
        if let Some(limit) = self.config.fail_push_after {
            if self.stats.lock().unwrap().pushes >= limit {
                return Err(TransportError::PushFailed("panne simulée".to_string()));
            }
        }

        // Modèle de drainage temporel : le chunk est drainé après sa
        // durée audio multipliée par drain_speed
        let bytes_per_ms = (sample_rate as usize * channels as usize * 2) / 1000;
        let audio_ms = if bytes_per_ms > 0 {
            data.len() as f64 / bytes_per_ms as f64
        } else {
            0.0
        };
        let drain_ms = audio_ms * self.config.drain_speed;

        {
            let mut inner = self.inner.lock().unwrap();
            inner.drain_deadline = if drain_ms > 0.0 {
                Some(Instant::now() + std::time::Duration::from_secs_f64(drain_ms / 1000.0))
            } else {
                None
            };
        }

        let mut stats = self.stats.lock().unwrap();
        stats.pushes += 1;
        stats.bytes_pushed += data.len() as u64;
        stats.last_chunk_bytes = data.len();
        self.pushed_chunks.lock().unwrap().push(data.len());

        Ok(())
    }

    async fn is_push_completed(&self) -> TransportResult<bool> {
        let inner = self.inner.lock().unwrap();
        match inner.drain_deadline {
            Some(deadline) => Ok(Instant::now() >= deadline),
            None => Ok(true),
        }
    }

    fn push_stats(&self) -> PushStats {
        self.stats.lock().unwrap().clone()
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().state == ConnectionState::Connected
    }
}
