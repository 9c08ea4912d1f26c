//! Crate transport - Connexion temps réel aux canaux vocaux
//!
//! Ce crate décrit le contrat du SDK temps réel consommé par le bot et
//! fournit une implémentation simulée complète pour le développement et
//! les tests.
//!
//! # Architecture
//!
//! Le crate est organisé en plusieurs modules :
//!
//! - `error` : Gestion d'erreurs avec types spécialisés transport
//! - `types` : Types de données (configurations, états, statistiques)
//! - `traits` : Traits abstraits (service, connexion, observateur)
//! - `simulated` : Implémentation simulée avec injection de pannes
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transport::{
//!     ConnectionConfig, MediaService, ServiceConfig, SimulatedConfig, SimulatedService,
//! };
//! use audio::{AudioConfig, PcmSpec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut service = SimulatedService::new(SimulatedConfig::default());
//! service.initialize(&ServiceConfig::new("mon-app-id"))?;
//!
//! let spec = PcmSpec::from_config(&AudioConfig::default());
//! let connection = service.create_connection(ConnectionConfig::audio_broadcast(spec))?;
//!
//! connection.connect("", "salon-general", "1234").await?;
//! # Ok(())
//! # }
//! ```

// Modules internes
mod error;
mod types;
mod traits;
mod simulated;

// Re-exports publics
pub use error::{TransportError, TransportResult};

pub use types::{
    AudioSubscription, ChannelProfile, ClientRole, ConnectionConfig, ConnectionInfo,
    ConnectionState, PushStats, ServiceConfig, SimulatedConfig,
};

pub use traits::{ConnectionObserver, MediaConnection, MediaService};

pub use simulated::{SimulatedConnection, SimulatedService};

/// Version du crate transport
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
