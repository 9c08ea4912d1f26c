//! Types de données pour la couche transport temps réel
//!
//! Ce module définit les configurations et états utilisés par les
//! connexions : configuration du service, configuration d'une connexion
//! (rôle, profil, abonnement PCM), états et statistiques.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use audio::PcmSpec;

/// Configuration du service temps réel
///
/// Correspond à l'initialisation globale du SDK : identifiant
/// d'application et répertoire où le SDK écrit ses propres logs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Identifiant d'application fourni par la plateforme
    pub app_id: String,

    /// Répertoire des logs internes du SDK
    ///
    /// Configuration locale, pas une partie du protocole de contrôle.
    pub log_dir: PathBuf,

    /// Taille maximale du fichier de log du SDK en kilooctets
    pub log_file_size_kb: u32,
}

impl ServiceConfig {
    /// Crée une configuration de service pour un appId donné
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            log_dir: PathBuf::from("./rtc_log"),
            log_file_size_kb: 1024,
        }
    }

    /// Remplace le répertoire de logs du SDK
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }
}

/// Rôle du client dans le canal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientRole {
    /// Diffuseur : publie de l'audio dans le canal
    Broadcaster,
    /// Spectateur : reçoit uniquement
    Audience,
}

/// Profil du canal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelProfile {
    /// Communication bidirectionnelle classique
    Communication,
    /// Diffusion live : le profil utilisé par le bot
    LiveBroadcasting,
}

/// Options d'abonnement audio de la connexion
///
/// Le bot s'abonne en PCM uniquement, au profil fixe du décodeur :
/// le SDK livre alors des échantillons bruts plutôt que des paquets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSubscription {
    /// Recevoir uniquement du PCM décodé (jamais de paquets encodés)
    pub pcm_data_only: bool,

    /// Format PCM demandé à la réception
    pub spec: PcmSpec,
}

/// Configuration d'une connexion à un canal
///
/// Le bot utilise une configuration audio-only fixe : rôle diffuseur,
/// profil live-broadcast, abonnement audio automatique en PCM,
/// publication PCM sans vidéo.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Rôle du client dans le canal
    pub client_role: ClientRole,

    /// Profil du canal
    pub channel_profile: ChannelProfile,

    /// S'abonner automatiquement à l'audio des autres participants
    pub auto_subscribe_audio: bool,

    /// S'abonner automatiquement à la vidéo (toujours false pour le bot)
    pub auto_subscribe_video: bool,

    /// Options d'abonnement audio
    pub subscription: AudioSubscription,

    /// Publier de l'audio (PCM poussé par le pacer)
    pub publish_audio: bool,

    /// Publier de la vidéo (jamais pour le bot)
    pub publish_video: bool,
}

impl ConnectionConfig {
    /// Configuration audio-only du bot de diffusion
    ///
    /// C'est la seule configuration utilisée en production : elle reprend
    /// champ par champ le profil fixe attendu par le SDK.
    pub fn audio_broadcast(spec: PcmSpec) -> Self {
        Self {
            client_role: ClientRole::Broadcaster,
            channel_profile: ChannelProfile::LiveBroadcasting,
            auto_subscribe_audio: true,
            auto_subscribe_video: false,
            subscription: AudioSubscription {
                pcm_data_only: true,
                spec,
            },
            publish_audio: true,
            publish_video: false,
        }
    }
}

/// État d'une connexion à un canal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Aucune connexion en cours
    Disconnected,
    /// Connexion initiée, en attente du callback on_connected
    Connecting,
    /// Connecté au canal
    Connected,
    /// Reconnexion en cours après une coupure
    Reconnecting,
    /// La connexion a échoué définitivement
    Failed,
}

/// Informations sur une connexion, passées aux callbacks d'observation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Identifiant du canal rejoint
    pub channel_id: String,

    /// Identifiant local de l'utilisateur (uid du bot)
    pub local_user_id: String,
}

/// Statistiques de push d'une connexion
///
/// Utile pour le monitoring et surtout pour vérifier en test que le
/// pacer envoie exactement les bytes attendus.
#[derive(Clone, Debug, Default)]
pub struct PushStats {
    /// Nombre total de chunks poussés
    pub pushes: u64,

    /// Nombre total de bytes poussés
    pub bytes_pushed: u64,

    /// Taille du dernier chunk poussé
    pub last_chunk_bytes: usize,
}

/// Paramètres du transport simulé
///
/// Permet de reproduire en test les conditions réelles : latence de
/// connexion, vitesse de drainage du buffer interne, pannes injectées.
#[derive(Clone, Debug)]
pub struct SimulatedConfig {
    /// Délai avant que le callback on_connected ne soit déclenché
    pub connect_delay: Duration,

    /// Facteur de vitesse de drainage du buffer interne
    ///
    /// 1.0 = temps réel (5s d'audio drainent en 5s)
    /// 0.0 = drainage instantané (is_push_completed toujours vrai)
    pub drain_speed: f64,

    /// Simule un échec systématique de connect()
    pub fail_connect: bool,

    /// Simule un échec de push après N pushes réussis
    pub fail_push_after: Option<u64>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_millis(20),
            drain_speed: 1.0,
            fail_connect: false,
            fail_push_after: None,
        }
    }
}

impl SimulatedConfig {
    /// Configuration optimisée pour les tests : tout est instantané
    pub fn test_config() -> Self {
        Self {
            connect_delay: Duration::ZERO,
            drain_speed: 0.0,
            fail_connect: false,
            fail_push_after: None,
        }
    }
}
