//! Traits abstraits pour la couche transport temps réel
//!
//! Ce module définit le contrat que le bot consomme : le SDK réel n'est
//! jamais réimplémenté ici, seules ses capacités sont décrites. Cela
//! permet d'avoir du code modulaire et testable avec différentes
//! implémentations (SDK natif ou transport simulé).

use std::sync::Arc;

use async_trait::async_trait;

use crate::{ConnectionConfig, ConnectionInfo, PushStats, ServiceConfig, TransportResult};

/// Trait pour le service temps réel global
///
/// Le service est le point d'entrée du SDK : initialisé une fois avec
/// l'appId, il fabrique ensuite les connexions aux canaux.
///
/// `Send + Sync` indique que l'objet peut être partagé entre threads.
pub trait MediaService: Send + Sync {
    /// Initialise le service avec la configuration donnée
    ///
    /// Réinitialisable : un second appel écrase l'initialisation
    /// précédente.
    ///
    /// # Erreurs
    /// - `TransportError::InitializationError` : appId refusé par le SDK
    fn initialize(&mut self, config: &ServiceConfig) -> TransportResult<()>;

    /// Crée une connexion prête à rejoindre un canal
    ///
    /// La connexion est retournée déconnectée ; l'appelant enregistre
    /// ses observateurs puis appelle `connect()`.
    ///
    /// # Erreurs
    /// - `TransportError::InvalidState` : service non initialisé
    /// - `TransportError::ConnectionCreationFailed` : refus du SDK
    fn create_connection(
        &self,
        config: ConnectionConfig,
    ) -> TransportResult<Arc<dyn MediaConnection>>;

    /// Libère le service et toutes ses ressources
    ///
    /// Après cet appel, le service ne doit plus être utilisé.
    fn release(&mut self);

    /// Retourne des informations sur l'implémentation du service
    ///
    /// Utile pour le debug et l'événement `ready` du protocole.
    fn service_info(&self) -> String {
        "Service temps réel inconnu".to_string()
    }
}

/// Trait pour une connexion à un canal vocal
///
/// Ce trait abstrait la capacité opaque du SDK : connexion, envoi de
/// frames PCM avec vérification de drainage, et callbacks d'événements.
///
/// `#[async_trait]` permet d'avoir des fonctions async dans les traits.
#[async_trait]
pub trait MediaConnection: Send + Sync {
    /// Initie la connexion au canal
    ///
    /// La connexion est asynchrone côté SDK : cette fonction retourne
    /// dès que l'ordre de connexion est émis, pas quand le callback
    /// `on_connected` est déclenché.
    ///
    /// # Arguments
    /// * `token` - Token d'authentification (vide si le projet n'en exige pas)
    /// * `channel` - Nom du canal à rejoindre
    /// * `uid` - Identifiant local du bot dans le canal
    ///
    /// # Erreurs
    /// - `TransportError::ConnectFailed` : l'ordre de connexion a été refusé
    async fn connect(&self, token: &str, channel: &str, uid: &str) -> TransportResult<()>;

    /// Quitte le canal et coupe la connexion
    ///
    /// Sans effet si la connexion est déjà coupée.
    async fn disconnect(&self) -> TransportResult<()>;

    /// Enregistre l'observateur des événements de connexion
    ///
    /// Un seul observateur à la fois : un second appel remplace le
    /// précédent. Les callbacks peuvent être déclenchés depuis des
    /// threads internes du transport et ne doivent jamais bloquer.
    fn register_observer(&self, observer: Arc<dyn ConnectionObserver>);

    /// Pousse un chunk PCM dans le canal
    ///
    /// Le chunk est étiqueté avec son format pour que le SDK puisse le
    /// rejouer correctement. Le SDK le draine ensuite à son rythme :
    /// l'appelant doit vérifier `is_push_completed()` avant de pousser
    /// le chunk suivant.
    ///
    /// # Erreurs
    /// - `TransportError::PushFailed` : le SDK a refusé la frame
    /// - `TransportError::InvalidState` : connexion non établie
    async fn push_pcm(
        &self,
        data: &[u8],
        sample_rate: u32,
        channels: u16,
    ) -> TransportResult<()>;

    /// Vérifie si le dernier push a été entièrement drainé
    ///
    /// Retourne `true` quand le buffer interne du SDK est vide et
    /// qu'un nouveau chunk peut être poussé sans débordement.
    async fn is_push_completed(&self) -> TransportResult<bool>;

    /// Retourne les statistiques de push de cette connexion
    fn push_stats(&self) -> PushStats;

    /// Vérifie si la connexion est actuellement établie
    fn is_connected(&self) -> bool;
}

/// Trait pour observer les événements d'une connexion
///
/// Les callbacks sont déclenchés par le transport, potentiellement
/// depuis ses threads internes. Ils doivent se limiter à des mises à
/// jour d'état simples et à l'émission d'événements via le writer
/// verrouillé — jamais d'opération bloquante, jamais de rappel
/// synchrone vers connect/disconnect (risque de deadlock).
///
/// Toutes les méthodes ont une implémentation par défaut vide : un
/// observateur n'implémente que ce qui l'intéresse.
pub trait ConnectionObserver: Send + Sync {
    /// La connexion au canal est établie
    fn on_connected(&self, _info: &ConnectionInfo) {}

    /// La connexion a été coupée
    fn on_disconnected(&self, _info: &ConnectionInfo, _reason: &str) {}

    /// La connexion est en cours d'établissement
    fn on_connecting(&self, _info: &ConnectionInfo) {}

    /// La connexion a échoué définitivement
    fn on_connection_failure(&self, _info: &ConnectionInfo, _reason: &str) {}

    /// Une reconnexion est en cours après une coupure
    fn on_reconnecting(&self, _info: &ConnectionInfo, _reason: &str) {}

    /// La reconnexion a abouti
    fn on_reconnected(&self, _info: &ConnectionInfo) {}

    /// Un utilisateur a rejoint le canal
    fn on_user_joined(&self, _user_id: &str) {}

    /// Un utilisateur a quitté le canal
    fn on_user_left(&self, _user_id: &str, _reason: &str) {}
}
