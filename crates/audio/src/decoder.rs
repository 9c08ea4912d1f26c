//! Implémentation du décodage de fichiers avec symphonia
//!
//! Ce module implémente le trait AudioDecoder en utilisant la librairie
//! symphonia pour lire les conteneurs audio (wav, mp3, ogg...) et produire
//! un buffer PCM complet au format cible du bot.
//!
//! La conversion se fait en trois étapes :
//! 1. Décodage de tous les paquets vers des échantillons i16 entrelacés
//! 2. Réduction au mono (moyenne des canaux)
//! 3. Ré-échantillonnage linéaire vers la fréquence cible

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::{AudioDecoder, AudioError, AudioResult, PcmBuffer, PcmSpec};

/// Décodeur de fichiers audio basé sur symphonia
///
/// Cette structure est sans état : chaque appel à `decode()` ouvre le
/// fichier, le décode entièrement et retourne le buffer converti.
///
/// # Example
/// ```rust,no_run
/// use audio::{AudioConfig, AudioDecoder, PcmSpec, SymphoniaDecoder};
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let decoder = SymphoniaDecoder::new();
/// let target = PcmSpec::from_config(&AudioConfig::default());
/// let pcm = decoder.decode(Path::new("jingle.wav"), &target)?;
/// # Ok(())
/// # }
/// ```
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    /// Crée une nouvelle instance du décodeur
    pub fn new() -> Self {
        Self
    }

    /// Décode tous les paquets du fichier en échantillons i16 entrelacés
    ///
    /// Retourne les échantillons avec le format source (rate, canaux).
    fn decode_all(&self, path: &Path) -> AudioResult<(Vec<i16>, u32, usize)> {
        let file = File::open(path).map_err(|e| AudioError::file_not_found(path, e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // L'extension du fichier aide le probe à identifier le conteneur
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::unsupported_format(path, e.to_string()))?;

        let mut format = probed.format;

        // Sélectionne la première piste audio décodable
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::NoAudioTrack {
                path: path.display().to_string(),
            })?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::unsupported_format(path, e.to_string()))?;

        let mut samples: Vec<i16> = Vec::new();
        let mut src_rate: u32 = track.codec_params.sample_rate.unwrap_or(0);
        let mut src_channels: usize = 0;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                // Fin de flux : symphonia signale la fin par une erreur IO
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    src_rate = spec.rate;
                    src_channels = spec.channels.count();

                    let mut buf =
                        SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                // Un paquet corrompu n'interrompt pas tout le fichier
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if samples.is_empty() || src_rate == 0 || src_channels == 0 {
            return Err(AudioError::EmptyStream);
        }

        Ok((samples, src_rate, src_channels))
    }
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path, target: &PcmSpec) -> AudioResult<PcmBuffer> {
        let (samples, src_rate, src_channels) = self.decode_all(path)?;

        // Réduction au mono puis ré-échantillonnage vers la fréquence cible
        let mono = downmix_to_mono(&samples, src_channels);
        let resampled = resample_linear(&mono, src_rate, target.sample_rate);

        if resampled.is_empty() {
            return Err(AudioError::EmptyStream);
        }

        // Sérialisation en s16le, dupliquée si la cible est stéréo
        let mut data = Vec::with_capacity(
            resampled.len() * target.channels as usize * 2,
        );
        for sample in resampled {
            for _ in 0..target.channels {
                data.extend_from_slice(&sample.to_le_bytes());
            }
        }

        Ok(PcmBuffer::new(data, *target))
    }

    fn decoder_info(&self) -> String {
        "symphonia (wav, mp3, ogg, vorbis, flac)".to_string()
    }
}

/// Réduit des échantillons entrelacés à un seul canal (moyenne)
fn downmix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Ré-échantillonnage par interpolation linéaire
///
/// Suffisant pour de la voix : pas de filtre anti-repliement, mais la
/// cible (16 kHz) est presque toujours inférieure ou égale à la source.
fn resample_linear(samples: &[i16], src_rate: u32, dst_rate: u32) -> Vec<i16> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let out_len = (samples.len() as u64 * dst_rate as u64 / src_rate as u64) as usize;
    let ratio = src_rate as f64 / dst_rate as f64;

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;

        let a = samples[idx.min(samples.len() - 1)] as f64;
        let b = samples[(idx + 1).min(samples.len() - 1)] as f64;

        out.push((a + (b - a) * frac).round() as i16);
    }

    out
}

/// Décodeur factice pour les tests
///
/// Permet de tester le pacer et la machine à états sans fichier réel :
/// retourne soit un buffer préparé, soit une erreur configurée.
pub struct MockDecoder {
    /// Buffer retourné par `decode()` quand tout va bien
    buffer: Option<PcmBuffer>,

    /// Erreur simulée (prioritaire sur le buffer)
    fail_with: Option<String>,
}

impl MockDecoder {
    /// Crée un décodeur qui retourne toujours le buffer donné
    pub fn with_buffer(buffer: PcmBuffer) -> Self {
        Self {
            buffer: Some(buffer),
            fail_with: None,
        }
    }

    /// Crée un décodeur qui génère `duration_ms` de silence au format donné
    pub fn with_silence(duration_ms: u64, spec: PcmSpec) -> Self {
        let data = vec![0u8; spec.bytes_per_ms() * duration_ms as usize];
        Self::with_buffer(PcmBuffer::new(data, spec))
    }

    /// Crée un décodeur qui échoue toujours
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            buffer: None,
            fail_with: Some(message.into()),
        }
    }
}

impl AudioDecoder for MockDecoder {
    fn decode(&self, _path: &Path, _target: &PcmSpec) -> AudioResult<PcmBuffer> {
        if let Some(message) = &self.fail_with {
            return Err(AudioError::DecodeError(message.clone()));
        }

        self.buffer.clone().ok_or(AudioError::EmptyStream)
    }

    fn decoder_info(&self) -> String {
        "mock".to_string()
    }
}
