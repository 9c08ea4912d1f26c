//! Traits abstraits pour le système audio
//!
//! Ce module définit l'interface que doit implémenter un décodeur de
//! fichiers audio. Cela permet d'avoir du code modulaire et testable
//! avec différentes implémentations.

use std::path::Path;

use crate::{AudioResult, PcmBuffer, PcmSpec};

/// Trait pour convertir un fichier audio en PCM brut
///
/// Ce trait abstrait permet d'utiliser différentes implémentations :
/// - SymphoniaDecoder : Implémentation réelle avec la librairie symphonia
/// - MockDecoder : Implémentation factice pour les tests
///
/// `Send + Sync` indique que l'objet peut être partagé entre threads.
pub trait AudioDecoder: Send + Sync {
    /// Décode un fichier audio complet vers le format PCM demandé
    ///
    /// Le fichier peut être dans n'importe quel conteneur/codec supporté
    /// par l'implémentation (wav, mp3, ogg...). La sortie est toujours
    /// conforme au `target` : ré-échantillonnée et réduite au bon nombre
    /// de canaux.
    ///
    /// # Arguments
    /// * `path` - Chemin du fichier à décoder
    /// * `target` - Format PCM attendu en sortie
    ///
    /// # Erreurs
    /// - `AudioError::FileNotFound` : Fichier absent ou illisible
    /// - `AudioError::UnsupportedFormat` : Conteneur/codec non reconnu
    /// - `AudioError::NoAudioTrack` : Aucune piste audio dans le fichier
    /// - `AudioError::DecodeError` : Données corrompues
    /// - `AudioError::EmptyStream` : Fichier valide mais vide
    ///
    /// # Example
    /// ```rust,no_run
    /// use audio::{AudioConfig, AudioDecoder, PcmSpec, SymphoniaDecoder};
    /// use std::path::Path;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let decoder = SymphoniaDecoder::new();
    /// let target = PcmSpec::from_config(&AudioConfig::default());
    ///
    /// let pcm = decoder.decode(Path::new("annonce.mp3"), &target)?;
    /// println!("Audio décodé : {}ms", pcm.duration_ms());
    /// # Ok(())
    /// # }
    /// ```
    fn decode(&self, path: &Path, target: &PcmSpec) -> AudioResult<PcmBuffer>;

    /// Retourne des informations sur le décodeur utilisé
    ///
    /// Utile pour le debug et l'événement `ready` du protocole.
    fn decoder_info(&self) -> String {
        "Décodeur audio inconnu".to_string()
    }
}
