//! Crate bot - Bot de diffusion audio piloté par JSON ligne à ligne
//!
//! Le bot rejoint un canal vocal temps réel, décode des fichiers audio
//! en PCM et les diffuse au rythme de l'horloge murale, sous le contrôle
//! d'un processus parent qui lui parle en JSON sur stdin/stdout.
//!
//! # Architecture
//!
//! - `protocol` : codec du protocole de contrôle (commandes, événements,
//!   writer verrouillé)
//! - `session` : machine à états et ressources vivantes du bot
//! - `pacer` : jobs de lecture et rythme d'envoi du PCM
//! - `dispatcher` : boucle de commandes séquentielle
//!
//! # Modèle de concurrence
//!
//! La session appartient à la boucle de commandes. Chaque lecture est
//! une tâche tokio indépendante qui partage seulement des atomiques et
//! le writer d'événements. Tous les producteurs d'événements passent
//! par le même writer verrouillé : jamais deux objets JSON entrelacés
//! sur stdout.

pub mod dispatcher;
pub mod pacer;
pub mod protocol;
pub mod session;

pub use dispatcher::run_command_loop;
pub use pacer::{PacerConfig, PlaybackJob};
pub use protocol::{
    ChannelStatus, ControlMessage, EventMessage, EventWriter, LogLevel, ProtocolError,
};
pub use session::{Session, SessionError, SessionResult, SessionState};
