//! Gestion d'erreurs pour la couche transport temps réel
//!
//! Ce module définit tous les types d'erreurs possibles côté connexion.
//! Il suit les mêmes patterns que le crate audio pour la cohérence du code.

use thiserror::Error;

/// Énumération de toutes les erreurs possibles dans la couche transport
///
/// `thiserror::Error` génère automatiquement l'implémentation du trait Error
/// avec des messages d'erreur descriptifs.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Le SDK temps réel n'a pas pu être chargé au démarrage
    #[error("SDK temps réel indisponible: {0}")]
    SdkNotAvailable(String),

    /// Échec de l'initialisation du service (appId invalide, etc.)
    #[error("Échec d'initialisation du service: {0}")]
    InitializationError(String),

    /// Impossible de créer une connexion RTC
    #[error("Impossible de créer la connexion: {0}")]
    ConnectionCreationFailed(String),

    /// La tentative de connexion au canal a échoué
    #[error("Échec de connexion au canal '{channel}': {reason}")]
    ConnectFailed { channel: String, reason: String },

    /// Échec d'un push de frame audio vers le canal
    #[error("Échec d'envoi de frame audio: {0}")]
    PushFailed(String),

    /// Opération tentée alors que la connexion n'est pas dans le bon état
    #[error("Opération {operation} invalide dans l'état {current_state}")]
    InvalidState {
        operation: String,
        current_state: String,
    },
}

/// Type Result personnalisé pour notre crate transport
///
/// Au lieu d'écrire Result<T, TransportError> partout, on peut écrire TransportResult<T>
pub type TransportResult<T> = Result<T, TransportError>;

/// Fonctions utilitaires pour créer des erreurs communes
impl TransportError {
    /// Crée une erreur d'échec de connexion avec contexte
    pub fn connect_failed(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur d'état invalide avec contexte
    pub fn invalid_state(operation: impl Into<String>, state: impl Into<String>) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            current_state: state.into(),
        }
    }

    /// Vérifie si l'erreur est récupérable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::ConnectFailed { .. } => true,
            TransportError::PushFailed(_) => true,
            TransportError::SdkNotAvailable(_) => false,
            TransportError::InitializationError(_) => false,
            TransportError::ConnectionCreationFailed(_) => false,
            TransportError::InvalidState { .. } => false,
        }
    }
}
