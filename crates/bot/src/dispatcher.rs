//! Boucle de commandes : lit stdin ligne à ligne et pilote la session
//!
//! La boucle est strictement séquentielle : une commande est entièrement
//! traitée (et sa réponse émise) avant de lire la suivante. Le
//! parallélisme vit ailleurs, dans la tâche du pacer et les callbacks
//! du transport.
//!
//! Chaque commande produit exactement une réponse `<commande>_response`,
//! même en cas d'échec : le parent peut corréler sans ambiguïté. Une
//! ligne invalide produit un événement `error` et la boucle continue.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::protocol::{parse_command, ControlMessage, EventMessage, LogLevel};
use crate::session::Session;

/// Suite à donner après une commande
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Boucle principale de lecture des commandes
///
/// Se termine sur `quit`, sur la fin du flux d'entrée (parent disparu),
/// ou sur une erreur d'entrée/sortie. La session n'est pas nettoyée
/// ici : l'appelant fait toujours un `cleanup()` final, quelle que soit
/// la raison de la sortie.
pub async fn run_command_loop<R>(reader: R, session: &mut Session) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(None) => continue,
            Ok(Some(command)) => {
                if dispatch(session, command).await == Flow::Quit {
                    break;
                }
            }
            Err(e) => {
                // Ligne invalide : signalée, jamais fatale
                session.writer().emit(&EventMessage::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Traite une commande et émet sa réponse
async fn dispatch(session: &mut Session, command: ControlMessage) -> Flow {
    let writer = session.writer().clone();

    match command {
        ControlMessage::Init { app_id } => {
            let success = match session.initialize(&app_id) {
                Ok(()) => true,
                Err(e) => {
                    writer.log(LogLevel::Error, format!("Initialisation échouée: {}", e));
                    false
                }
            };
            writer.emit(&EventMessage::InitResponse { success });
            Flow::Continue
        }

        ControlMessage::Join {
            channel,
            uid,
            token,
        } => {
            let success = match session.join(&channel, &uid, token.as_deref()).await {
                Ok(()) => true,
                Err(e) => {
                    writer.log(LogLevel::Error, format!("Join échoué: {}", e));
                    false
                }
            };
            writer.emit(&EventMessage::JoinResponse { success });
            Flow::Continue
        }

        ControlMessage::Leave => {
            let success = match session.leave().await {
                Ok(()) => true,
                Err(e) => {
                    writer.log(LogLevel::Error, format!("Leave échoué: {}", e));
                    false
                }
            };
            writer.emit(&EventMessage::LeaveResponse { success });
            Flow::Continue
        }

        ControlMessage::Play { file } => {
            let success = match session.play(&file).await {
                Ok(()) => true,
                Err(e) => {
                    writer.log(LogLevel::Error, format!("Lecture échouée: {}", e));
                    false
                }
            };
            writer.emit(&EventMessage::PlayResponse { success });
            Flow::Continue
        }

        ControlMessage::Stop => {
            // Arrêter une lecture absente n'est pas une erreur
            session.stop_playback().await;
            writer.emit(&EventMessage::StopResponse { success: true });
            Flow::Continue
        }

        ControlMessage::Status => {
            writer.emit(&session.status_snapshot());
            Flow::Continue
        }

        ControlMessage::Quit => {
            session.cleanup().await;
            writer.emit(&EventMessage::QuitResponse { success: true });
            Flow::Quit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::{AudioConfig, MockDecoder, PcmSpec};
    use tokio::io::BufReader;
    use transport::{SimulatedConfig, SimulatedService};

    use crate::pacer::PacerConfig;
    use crate::protocol::{CapturedEvents, EventWriter};

    fn test_session() -> (Session, CapturedEvents) {
        let (writer, captured) = EventWriter::capture();
        let decoder = MockDecoder::with_silence(500, PcmSpec::from_config(&AudioConfig::default()));
        let session = Session::new(
            Some(Box::new(SimulatedService::new(SimulatedConfig::test_config()))),
            None,
            Box::new(decoder),
            writer,
        )
        .with_pacer_config(PacerConfig::test_config());
        (session, captured)
    }

    async fn run_script(session: &mut Session, script: &str) {
        run_command_loop(BufReader::new(script.as_bytes()), session)
            .await
            .unwrap();
    }

    fn responses(events: &[EventMessage]) -> Vec<&EventMessage> {
        events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    EventMessage::InitResponse { .. }
                        | EventMessage::JoinResponse { .. }
                        | EventMessage::LeaveResponse { .. }
                        | EventMessage::PlayResponse { .. }
                        | EventMessage::StopResponse { .. }
                        | EventMessage::QuitResponse { .. }
                        | EventMessage::StatusResponse { .. }
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_command_script() {
        let (mut session, captured) = test_session();

        let script = concat!(
            r#"{"command": "init", "appId": "app-1"}"#,
            "\n",
            r#"{"command": "join", "channel": "salon", "uid": 42}"#,
            "\n",
            r#"{"command": "play", "file": "/tmp/a.mp3"}"#,
            "\n",
            r#"{"command": "status"}"#,
            "\n",
            r#"{"command": "quit"}"#,
            "\n",
        );
        run_script(&mut session, script).await;

        let events = captured.events();
        let responses = responses(&events);
        assert_eq!(responses.len(), 5);
        assert_eq!(responses[0], &EventMessage::InitResponse { success: true });
        assert_eq!(responses[1], &EventMessage::JoinResponse { success: true });
        assert_eq!(responses[2], &EventMessage::PlayResponse { success: true });
        assert!(matches!(
            responses[3],
            EventMessage::StatusResponse {
                is_connected: true,
                ..
            }
        ));
        assert_eq!(responses[4], &EventMessage::QuitResponse { success: true });
    }

    #[tokio::test]
    async fn test_malformed_line_does_not_kill_loop() {
        let (mut session, captured) = test_session();

        let script = concat!(
            "{pas du json\n",
            r#"{"command": "warp", "vers": "ailleurs"}"#,
            "\n",
            "\n",
            r#"{"command": "status"}"#,
            "\n",
        );
        run_script(&mut session, script).await;

        let events = captured.events();

        // Deux lignes invalides, deux événements error, mais la boucle
        // répond encore au status qui suit
        let errors = events
            .iter()
            .filter(|e| matches!(e, EventMessage::Error { .. }))
            .count();
        assert_eq!(errors, 2);
        assert!(events
            .iter()
            .any(|e| matches!(e, EventMessage::StatusResponse { .. })));
    }

    #[tokio::test]
    async fn test_failed_command_reports_failure_and_continues() {
        let (mut session, captured) = test_session();

        // Join sans init : refusé, mais le processus reste utilisable
        let script = concat!(
            r#"{"command": "join", "channel": "salon", "uid": "42"}"#,
            "\n",
            r#"{"command": "init", "appId": "app-1"}"#,
            "\n",
        );
        run_script(&mut session, script).await;

        let events = captured.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, EventMessage::JoinResponse { success: false })));
        assert!(events
            .iter()
            .any(|e| matches!(e, EventMessage::InitResponse { success: true })));
        assert!(events.iter().any(|e| matches!(
            e,
            EventMessage::Log {
                level: LogLevel::Error,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_stop_without_playback_succeeds() {
        let (mut session, captured) = test_session();

        run_script(&mut session, "{\"command\": \"stop\"}\n").await;

        let events = captured.events();
        assert_eq!(
            events,
            vec![EventMessage::StopResponse { success: true }]
        );
    }

    #[tokio::test]
    async fn test_quit_stops_reading() {
        let (mut session, captured) = test_session();

        // Le status après quit ne doit jamais être lu
        let script = concat!(
            r#"{"command": "quit"}"#,
            "\n",
            r#"{"command": "status"}"#,
            "\n",
        );
        run_script(&mut session, script).await;

        let events = captured.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, EventMessage::QuitResponse { success: true })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, EventMessage::StatusResponse { .. })));
    }

    #[tokio::test]
    async fn test_eof_ends_loop_cleanly() {
        let (mut session, captured) = test_session();

        run_script(&mut session, "{\"command\": \"init\", \"appId\": \"app-1\"}\n").await;

        // Fin de flux sans quit : la boucle sort proprement, le
        // nettoyage appartient à l'appelant
        assert!(captured
            .events()
            .iter()
            .any(|e| matches!(e, EventMessage::InitResponse { success: true })));
    }
}
