//! Protocole de contrôle JSON ligne à ligne
//!
//! Ce module définit le protocole parlé avec le processus parent :
//! - ControlMessage : commandes entrantes (un objet JSON par ligne)
//! - EventMessage : événements sortants (réponses, progression, logs)
//! - EventWriter : écrivain verrouillé partagé entre tous les producteurs
//!
//! Le flux de contrôle (stdout) et le flux de diagnostic (stderr) sont
//! deux capacités distinctes : aucun texte de debug ne doit jamais
//! apparaître sur le canal de contrôle, sous peine de corrompre le
//! parseur ligne à ligne du parent.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Erreurs du protocole de contrôle
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Ligne reçue qui n'est pas un objet JSON valide ou qui porte une
    /// commande inconnue
    #[error("JSON invalide: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Type Result personnalisé pour le protocole
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Commande entrante envoyée par le processus parent
///
/// Chaque ligne de l'entrée standard porte exactement un objet JSON
/// avec un champ `command` discriminant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Initialise le service temps réel avec l'appId du projet
    Init {
        #[serde(rename = "appId")]
        app_id: String,
    },

    /// Rejoint un canal vocal
    Join {
        channel: String,
        /// Le parent peut envoyer l'uid comme string ou comme nombre
        #[serde(deserialize_with = "string_or_number")]
        uid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Quitte le canal courant
    Leave,

    /// Lance la lecture d'un fichier audio dans le canal
    Play { file: String },

    /// Arrête la lecture en cours
    Stop,

    /// Demande un instantané de l'état du bot
    Status,

    /// Nettoie les ressources et termine le processus
    Quit,
}

/// Niveau d'un événement de log envoyé au parent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// État de connexion rapporté dans les événements `status`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Connected,
    Disconnected,
}

/// Événement sortant envoyé au processus parent
///
/// Aucun ordre n'est garanti entre les types d'événements, sauf pour un
/// job de lecture donné : `playback_started` précède tous les `progress`,
/// qui précèdent exactement un événement terminal (`playback_complete`
/// ou `playback_stopped`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventMessage {
    /// Émis une seule fois au démarrage du processus
    Ready {
        sdk_available: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Ligne de log destinée à l'opérateur, relayée par le parent
    Log {
        level: LogLevel,
        message: String,
        timestamp: f64,
    },

    /// Changement d'état de la connexion au canal
    Status {
        status: ChannelStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uid: Option<String>,
    },

    InitResponse { success: bool },
    JoinResponse { success: bool },
    LeaveResponse { success: bool },
    PlayResponse { success: bool },
    StopResponse { success: bool },
    QuitResponse { success: bool },

    /// Instantané complet de l'état du bot (réponse à `status`)
    StatusResponse {
        is_connected: bool,
        is_playing: bool,
        channel: Option<String>,
        uid: Option<String>,
        current_file: Option<String>,
        playback_progress: u64,
        playback_duration: u64,
    },

    /// Progression d'un job de lecture (durées en millisecondes)
    Progress { current: u64, total: u64, percent: u8 },

    /// Un job de lecture vient de démarrer
    PlaybackStarted { file: String, duration: u64 },

    /// Le job s'est terminé naturellement (flux épuisé)
    PlaybackComplete { file: String },

    /// Le job a été interrompu (stop, leave ou erreur transport)
    PlaybackStopped { file: String },

    /// Erreur de protocole ou de commande, sans changement d'état
    Error { message: String },
}

impl EventMessage {
    /// Construit un événement de log horodaté
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
            timestamp: unix_timestamp(),
        }
    }
}

/// Timestamp Unix en secondes (fractionnaires)
fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Accepte une string JSON ou un nombre, et le coerce en String
///
/// Le parent envoie parfois l'uid comme nombre JSON.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Parse une ligne de l'entrée de contrôle
///
/// - Ligne blanche : `Ok(None)`, ignorée silencieusement
/// - JSON invalide ou commande inconnue : `Err(ProtocolError)`, que le
///   dispatcher convertit en un événement `error` sans tuer la boucle
pub fn parse_command(line: &str) -> ProtocolResult<Option<ControlMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    Ok(Some(serde_json::from_str(line)?))
}

/// Écrivain d'événements verrouillé
///
/// Tous les producteurs (boucle de commandes, tâche du pacer, callbacks
/// d'observation du transport) partagent ce même handle clonable : la
/// sérialisation + newline + flush se font sous un verrou unique, donc
/// deux écritures ne peuvent jamais s'entrelacer.
///
/// Un échec d'écriture (pipe cassé...) est rapporté sur stderr
/// uniquement, jamais propagé : le processus ne doit pas mourir sur un
/// événement perdu.
#[derive(Clone)]
pub struct EventWriter {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl EventWriter {
    /// Crée un writer sur un sink arbitraire
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Crée le writer de production, branché sur stdout
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Crée un writer de test qui capture les événements émis
    pub fn capture() -> (Self, CapturedEvents) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = Self::new(Box::new(CaptureSink {
            buffer: Arc::clone(&buffer),
        }));
        (writer, CapturedEvents { buffer })
    }

    /// Émet exactement un objet JSON suivi d'un newline, sous verrou
    pub fn emit(&self, event: &EventMessage) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Erreur de sérialisation d'événement: {}", e);
                return;
            }
        };

        let mut sink = match self.sink.lock() {
            Ok(sink) => sink,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Err(e) = writeln!(sink, "{}", json).and_then(|_| sink.flush()) {
            // Jamais propagé : stderr uniquement
            eprintln!("Erreur d'envoi d'événement: {}", e);
        }
    }

    /// Raccourci pour émettre un événement de log
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(&EventMessage::log(level, message));
    }
}

/// Sink de capture pour les tests
struct CaptureSink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Vue sur les événements capturés par `EventWriter::capture()`
#[derive(Clone)]
pub struct CapturedEvents {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedEvents {
    /// Re-parse toutes les lignes émises en événements typés
    ///
    /// Panique si une ligne n'est pas un EventMessage valide : c'est
    /// précisément ce qu'on veut détecter en test.
    pub fn events(&self) -> Vec<EventMessage> {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8(buffer.clone())
            .expect("sortie protocole non UTF-8")
            .lines()
            .map(|line| {
                serde_json::from_str(line)
                    .unwrap_or_else(|e| panic!("ligne protocole invalide `{}`: {}", line, e))
            })
            .collect()
    }

    /// Contenu brut émis, pour les assertions textuelles
    pub fn raw(&self) -> String {
        String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cmd = parse_command(r#"{"command": "init", "appId": "app-1"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            cmd,
            ControlMessage::Init {
                app_id: "app-1".to_string()
            }
        );

        let cmd = parse_command(r#"{"command": "play", "file": "/tmp/a.mp3"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            cmd,
            ControlMessage::Play {
                file: "/tmp/a.mp3".to_string()
            }
        );

        assert_eq!(
            parse_command(r#"{"command": "quit"}"#).unwrap().unwrap(),
            ControlMessage::Quit
        );
    }

    #[test]
    fn test_parse_join_with_numeric_uid() {
        // Le parent envoie parfois l'uid comme nombre JSON
        let cmd = parse_command(r#"{"command": "join", "channel": "salon", "uid": 1234}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            cmd,
            ControlMessage::Join {
                channel: "salon".to_string(),
                uid: "1234".to_string(),
                token: None,
            }
        );
    }

    #[test]
    fn test_parse_join_with_token() {
        let cmd = parse_command(
            r#"{"command": "join", "channel": "salon", "uid": "42", "token": "abc"}"#,
        )
        .unwrap()
        .unwrap();
        match cmd {
            ControlMessage::Join { token, .. } => assert_eq!(token.as_deref(), Some("abc")),
            _ => panic!("Wrong command type"),
        }
    }

    #[test]
    fn test_parse_blank_line() {
        assert!(parse_command("").unwrap().is_none());
        assert!(parse_command("   ").unwrap().is_none());
    }

    #[test]
    fn test_parse_malformed_line() {
        assert!(parse_command("{not json").is_err());
        assert!(parse_command(r#"{"command": "warp"}"#).is_err());
    }

    #[test]
    fn test_event_tags_on_wire() {
        // Les tags exacts font partie du contrat avec le parent
        let json = serde_json::to_string(&EventMessage::JoinResponse { success: true }).unwrap();
        assert_eq!(json, r#"{"type":"join_response","success":true}"#);

        let json = serde_json::to_string(&EventMessage::Progress {
            current: 500,
            total: 1000,
            percent: 50,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"progress","current":500,"total":1000,"percent":50}"#
        );

        let json = serde_json::to_string(&EventMessage::Status {
            status: ChannelStatus::Disconnected,
            channel: None,
            uid: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"status","status":"disconnected"}"#);
    }

    #[test]
    fn test_status_response_serializes_nulls() {
        // Le parent attend des null explicites, pas des champs absents
        let json = serde_json::to_string(&EventMessage::StatusResponse {
            is_connected: false,
            is_playing: false,
            channel: None,
            uid: None,
            current_file: None,
            playback_progress: 0,
            playback_duration: 0,
        })
        .unwrap();
        assert!(json.contains(r#""channel":null"#));
        assert!(json.contains(r#""uid":null"#));
        assert!(json.contains(r#""current_file":null"#));
    }

    #[test]
    fn test_event_round_trip() {
        // Stabilité de schéma : sérialiser puis parser reproduit
        // exactement le même événement
        let events = vec![
            EventMessage::Ready {
                sdk_available: true,
                error: None,
            },
            EventMessage::log(LogLevel::Warning, "attention"),
            EventMessage::Status {
                status: ChannelStatus::Connected,
                channel: Some("salon".to_string()),
                uid: Some("42".to_string()),
            },
            EventMessage::InitResponse { success: true },
            EventMessage::JoinResponse { success: false },
            EventMessage::LeaveResponse { success: true },
            EventMessage::PlayResponse { success: true },
            EventMessage::StopResponse { success: true },
            EventMessage::QuitResponse { success: true },
            EventMessage::StatusResponse {
                is_connected: true,
                is_playing: true,
                channel: Some("salon".to_string()),
                uid: Some("42".to_string()),
                current_file: Some("a.mp3".to_string()),
                playback_progress: 1500,
                playback_duration: 3000,
            },
            EventMessage::Progress {
                current: 1500,
                total: 3000,
                percent: 50,
            },
            EventMessage::PlaybackStarted {
                file: "a.mp3".to_string(),
                duration: 3000,
            },
            EventMessage::PlaybackComplete {
                file: "a.mp3".to_string(),
            },
            EventMessage::PlaybackStopped {
                file: "a.mp3".to_string(),
            },
            EventMessage::Error {
                message: "oups".to_string(),
            },
        ];

        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: EventMessage = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event, "round-trip cassé pour {}", json);
        }
    }

    #[test]
    fn test_writer_captures_events() {
        let (writer, captured) = EventWriter::capture();

        writer.emit(&EventMessage::InitResponse { success: true });
        writer.log(LogLevel::Info, "bonjour");

        let events = captured.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], EventMessage::InitResponse { success: true });
        match &events[1] {
            EventMessage::Log { level, message, .. } => {
                assert_eq!(*level, LogLevel::Info);
                assert_eq!(message, "bonjour");
            }
            other => panic!("Événement inattendu: {:?}", other),
        }
    }

    #[test]
    fn test_writer_concurrent_emits_never_interleave() {
        let (writer, captured) = EventWriter::capture();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let writer = writer.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        writer.emit(&EventMessage::Progress {
                            current: j,
                            total: 50,
                            percent: (i * 10) as u8,
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Chaque ligne doit rester un objet JSON complet
        let events = captured.events();
        assert_eq!(events.len(), 8 * 50);
    }
}
