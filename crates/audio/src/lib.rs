//! Crate audio - Conversion de fichiers audio en PCM pour le bot de diffusion
//!
//! Ce crate gère la partie décodage de la chaîne :
//! - Probe et décodage des conteneurs avec symphonia
//! - Conversion vers le profil PCM fixe du bot (16 kHz mono s16le)
//! - Décodeur factice pour les tests

pub mod config;  // Configuration du profil PCM
pub mod types;   // Types de données (PcmBuffer, PcmSpec)
pub mod traits;  // Trait AudioDecoder
pub mod decoder; // Implémentations symphonia et mock
pub mod error;   // Gestion d'erreurs

// Réexports pour faciliter l'utilisation
pub use config::*;
pub use types::*;
pub use traits::*;
pub use error::*;

// Réexports des implémentations principales
pub use decoder::{MockDecoder, SymphoniaDecoder};
