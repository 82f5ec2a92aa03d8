//! Headless client runtime for PowWow.
//!
//! Wires the configured backend (Firebase or in-memory) into the bridge,
//! mirrors every emitted event into the state reducer, and logs snapshots
//! until interrupted. A graphical shell plugs into the same
//! [`ClientBridge`] channel pair.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use backend_firestore::{
    CloudinaryConfig, CloudinaryUploader, FirebaseAuth, FirebaseAuthConfig, FirestoreConfig,
    FirestoreStore, InMemoryAuth, InMemoryBackend,
};
use client_core::{AuthGateway, CloudStore, Identity, MediaStore, RetryPolicy};
use client_platform::JsonFilePendingContactStore;
use powwow_client::bridge::{BridgeSettings, ClientBridge};
use powwow_client::config::{BackendSelection, ClientConfig};
use powwow_client::logging;
use powwow_client::state::ClientState;

struct BackendParts {
    auth: Arc<dyn AuthGateway>,
    store: Arc<dyn CloudStore>,
    media: Option<Arc<dyn MediaStore>>,
}

fn build_backend(config: &ClientConfig) -> Result<BackendParts, Box<dyn std::error::Error>> {
    match &config.backend {
        BackendSelection::Memory => {
            info!("running against the in-memory backend");
            let backend = Arc::new(InMemoryBackend::new());
            let auth = Arc::new(InMemoryAuth::new(Identity {
                id: "local-user".to_owned(),
                display_name: Some("Local User".to_owned()),
                avatar_url: None,
            }));
            Ok(BackendParts {
                auth,
                store: backend.clone(),
                media: Some(backend),
            })
        }
        BackendSelection::Firebase {
            project_id,
            api_key,
        } => {
            info!(%project_id, "running against Firebase");
            let auth = Arc::new(FirebaseAuth::new(FirebaseAuthConfig::new(api_key.clone()))?);
            let store = Arc::new(FirestoreStore::new(
                FirestoreConfig::new(project_id.clone()),
                auth.clone(),
            )?);
            let media: Option<Arc<dyn MediaStore>> = match &config.cloudinary {
                Some(settings) => Some(Arc::new(CloudinaryUploader::new(CloudinaryConfig::new(
                    settings.cloud_name.clone(),
                    settings.upload_preset.clone(),
                ))?)),
                None => None,
            };
            Ok(BackendParts { auth, store, media })
        }
    }
}

#[tokio::main]
async fn main() {
    logging::init();
    info!("starting powwow-client");

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "configuration error");
            std::process::exit(1);
        }
    };

    let parts = match build_backend(&config) {
        Ok(parts) => parts,
        Err(err) => {
            error!(error = %err, "backend initialization failed");
            std::process::exit(1);
        }
    };

    let pending_store = Arc::new(JsonFilePendingContactStore::new(
        config.pending_contacts_path(),
    ));
    let settings = BridgeSettings {
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        search_limit: config.search_limit,
        retry: RetryPolicy::default(),
    };
    let bridge = ClientBridge::spawn(
        parts.auth,
        parts.store,
        parts.media,
        pending_store,
        settings,
    );

    let mut events = bridge.channels().subscribe();
    let mut reducer = ClientState::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        reducer.handle_event(event);
                        let snapshot = reducer.snapshot();
                        info!(
                            phase = ?snapshot.phase,
                            rows = snapshot.rows.len(),
                            messages = snapshot.messages.len(),
                            status = %snapshot.status_text,
                            "state updated"
                        );
                    }
                    Err(err) => {
                        error!(error = %err, "event stream ended");
                        break;
                    }
                }
            }
        }
    }

    bridge.shutdown().await;
}
