use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};

pub type ClientBuilder<S> = Arc<dyn Fn(&str) -> Arc<S> + Send + Sync>;

/// Holds one provider client built from the credential currently in effect.
///
/// The client is rebuilt whenever a different credential is requested, and
/// `invalidate` drops it so the next caller picks up rotated settings.
pub struct ClientCache<S: ?Sized> {
    builder: ClientBuilder<S>,
    slot: RwLock<Option<(String, Arc<S>)>>,
}

fn fingerprint(credential: &str) -> String {
    hex::encode(Sha256::digest(credential.as_bytes()))
}

impl<S: ?Sized + Send + Sync> ClientCache<S> {
    pub fn new(builder: ClientBuilder<S>) -> Self {
        Self {
            builder,
            slot: RwLock::new(None),
        }
    }

    /// Cache that always hands out the same client regardless of credential.
    pub fn fixed(client: Arc<S>) -> Self
    where
        S: 'static,
    {
        Self::new(Arc::new(move |_| client.clone()))
    }

    pub fn get(&self, credential: &str) -> Arc<S> {
        let key = fingerprint(credential);
        {
            let guard = self.slot.read().unwrap_or_else(|p| p.into_inner());
            if let Some((cached_key, client)) = guard.as_ref() {
                if *cached_key == key {
                    return client.clone();
                }
            }
        }

        let mut guard = self.slot.write().unwrap_or_else(|p| p.into_inner());
        if let Some((cached_key, client)) = guard.as_ref() {
            if *cached_key == key {
                return client.clone();
            }
        }
        let client = (self.builder)(credential);
        *guard = Some((key, client.clone()));
        client
    }

    pub fn invalidate(&self) {
        let mut guard = self.slot.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }
}
