//! Gestion d'erreurs pour le système audio
//!
//! Ce module définit tous les types d'erreurs possibles lors de la conversion
//! de fichiers audio en PCM brut. En Rust, nous utilisons le type Result<T, E>
//! pour gérer les erreurs de façon explicite.

use thiserror::Error;

/// Énumération de toutes les erreurs possibles dans le système audio
///
/// `thiserror::Error` génère automatiquement l'implémentation du trait Error
/// et nous permet de définir des messages d'erreur avec `#[error("...")]`
#[derive(Error, Debug)]
pub enum AudioError {
    /// Le fichier audio n'existe pas ou n'est pas lisible
    #[error("Fichier audio introuvable: {path}: {reason}")]
    FileNotFound { path: String, reason: String },

    /// Le format du fichier n'a pas pu être identifié par le probe
    #[error("Format audio non reconnu pour {path}: {reason}")]
    UnsupportedFormat { path: String, reason: String },

    /// Le conteneur ne contient aucune piste audio décodable
    #[error("Aucune piste audio décodable dans {path}")]
    NoAudioTrack { path: String },

    /// Erreur provenant du décodeur symphonia pendant la lecture des paquets
    #[error("Erreur de décodage: {0}")]
    DecodeError(String),

    /// Le fichier a été décodé mais ne contient aucun échantillon
    #[error("Flux audio vide après décodage")]
    EmptyStream,

    /// Erreur de configuration des paramètres audio (sample rate, etc.)
    #[error("Erreur de configuration audio: {0}")]
    ConfigError(String),
}

/// Conversion automatique des erreurs symphonia vers AudioError
///
/// Cela nous permet d'utiliser l'opérateur `?` avec les fonctions symphonia
impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        AudioError::DecodeError(err.to_string())
    }
}

/// Type Result personnalisé pour notre crate
///
/// Au lieu d'écrire Result<T, AudioError> partout, on peut écrire AudioResult<T>
pub type AudioResult<T> = Result<T, AudioError>;

/// Fonctions utilitaires pour créer des erreurs communes
impl AudioError {
    /// Crée une erreur de fichier introuvable avec contexte
    pub fn file_not_found(path: &std::path::Path, cause: std::io::Error) -> Self {
        Self::FileNotFound {
            path: path.display().to_string(),
            reason: cause.to_string(),
        }
    }

    /// Crée une erreur de format non supporté avec contexte
    pub fn unsupported_format(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}
