//! Configuration audio pour le bot de diffusion
//!
//! Ce module définit le profil PCM fixe utilisé par toute la chaîne :
//! le décodeur produit toujours ce format, et la connexion temps réel
//! s'abonne au même format côté réception.

use serde::{Deserialize, Serialize};

/// Configuration du profil PCM cible
///
/// Tout l'audio envoyé dans un canal passe par ce format unique :
/// - 16 kHz mono : suffisant pour la voix, c'est le format attendu
///   par le SDK temps réel en mode PCM
/// - 16 bits signés little-endian (2 bytes par échantillon)
///
/// `#[derive(Clone)]` : Permet de dupliquer facilement cette config
/// `#[derive(Serialize, Deserialize)]` : Permet de la charger depuis un fichier
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Fréquence d'échantillonnage en Hz (échantillons par seconde)
    ///
    /// 16000 Hz = qualité voix, format natif du SDK en abonnement PCM
    pub sample_rate: u32,

    /// Nombre de canaux audio
    ///
    /// 1 = Mono (un seul canal)
    /// Pour la diffusion de voix, mono suffit largement
    pub channels: u16,

    /// Taille d'un échantillon en bytes
    ///
    /// 2 = 16 bits signés (s16le), le seul format poussé vers le SDK
    pub bytes_per_sample: u16,
}

impl Default for AudioConfig {
    /// Configuration par défaut : le profil PCM attendu par le SDK
    fn default() -> Self {
        Self {
            sample_rate: 16_000, // 16 kHz - profil voix du SDK
            channels: 1,         // Mono
            bytes_per_sample: 2, // s16le
        }
    }
}

impl AudioConfig {
    /// Calcule le nombre de bytes par milliseconde d'audio
    ///
    /// Formule : (sample_rate * channels * bytes_per_sample) / 1000
    /// Exemple : (16000 * 1 * 2) / 1000 = 32 bytes/ms
    pub fn bytes_per_ms(&self) -> usize {
        (self.sample_rate as usize * self.channels as usize * self.bytes_per_sample as usize)
            / 1000
    }

    /// Calcule le nombre de bytes pour une durée donnée en millisecondes
    pub fn bytes_for_ms(&self, ms: u64) -> usize {
        self.bytes_per_ms() * ms as usize
    }

    /// Calcule la durée en millisecondes d'un buffer de cette configuration
    pub fn duration_ms(&self, byte_len: usize) -> u64 {
        let per_ms = self.bytes_per_ms();
        if per_ms == 0 {
            return 0;
        }
        (byte_len / per_ms) as u64
    }

    /// Valide que la configuration est cohérente
    ///
    /// Vérifie que tous les paramètres sont dans des plages acceptables
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 48000 {
            return Err(format!(
                "Sample rate invalide: {} (doit être entre 8000 et 48000)",
                self.sample_rate
            ));
        }

        if self.channels == 0 || self.channels > 2 {
            return Err(format!(
                "Nombre de canaux invalide: {} (doit être 1 ou 2)",
                self.channels
            ));
        }

        if self.bytes_per_sample != 2 {
            return Err(format!(
                "Taille d'échantillon invalide: {} (seul s16le est supporté)",
                self.bytes_per_sample
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();

        // Test des calculs
        assert_eq!(config.bytes_per_ms(), 32); // 16000 * 1 * 2 / 1000
        assert_eq!(config.bytes_for_ms(100), 3200);
        assert_eq!(config.duration_ms(32_000), 1000); // 1 seconde

        // Test de validation
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AudioConfig::default();

        config.sample_rate = 1000; // Trop bas
        assert!(config.validate().is_err());

        config.sample_rate = 16000;
        config.channels = 0; // Invalide
        assert!(config.validate().is_err());

        config.channels = 1;
        config.bytes_per_sample = 4; // Seul s16le est supporté
        assert!(config.validate().is_err());
    }
}
