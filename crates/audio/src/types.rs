//! Types de données pour le système audio
//!
//! Ce module définit les structures manipulées par le décodeur :
//! - PcmSpec : description d'un format PCM (rate, canaux, taille d'échantillon)
//! - PcmBuffer : buffer PCM complet, prêt à être envoyé dans un canal

use serde::{Deserialize, Serialize};

use crate::AudioConfig;

/// Description d'un format PCM
///
/// Contrairement à `AudioConfig` (la configuration cible fixe du bot),
/// un `PcmSpec` peut décrire n'importe quel format rencontré dans un
/// fichier source avant conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmSpec {
    /// Fréquence d'échantillonnage en Hz
    pub sample_rate: u32,

    /// Nombre de canaux (1 = mono, 2 = stéréo)
    pub channels: u16,

    /// Taille d'un échantillon en bytes (2 = s16le)
    pub bytes_per_sample: u16,
}

impl PcmSpec {
    /// Crée un spec depuis la configuration cible du bot
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            bytes_per_sample: config.bytes_per_sample,
        }
    }

    /// Nombre de bytes par milliseconde d'audio dans ce format
    pub fn bytes_per_ms(&self) -> usize {
        (self.sample_rate as usize * self.channels as usize * self.bytes_per_sample as usize)
            / 1000
    }
}

/// Buffer PCM complet produit par le décodeur
///
/// Une fois produit, le buffer est immuable : le pacer en devient le
/// propriétaire exclusif pour toute la durée du job de lecture.
#[derive(Clone, Debug, PartialEq)]
pub struct PcmBuffer {
    /// Les échantillons bruts, entrelacés, en little-endian
    pub data: Vec<u8>,

    /// Le format des données
    pub spec: PcmSpec,
}

impl PcmBuffer {
    /// Crée un nouveau buffer PCM
    pub fn new(data: Vec<u8>, spec: PcmSpec) -> Self {
        Self { data, spec }
    }

    /// Taille totale en bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Vérifie si le buffer est vide
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Calcule la durée totale de l'audio en millisecondes
    ///
    /// Formule : bytes / (bytes par milliseconde)
    pub fn duration_ms(&self) -> u64 {
        let per_ms = self.spec.bytes_per_ms();
        if per_ms == 0 {
            return 0;
        }
        (self.data.len() / per_ms) as u64
    }
}
