//! Rotation pools of provider credentials.
//!
//! Each capability class has up to [`POOL_SIZE`] interchangeable secrets,
//! loaded once at startup from `{PREFIX}_01` .. `{PREFIX}_10`. A request's
//! rotation index picks the slot, spreading volume across quota limits.

use std::collections::HashMap;
use std::fmt;

use tracing::{info, warn};

use genbroker_models::CapabilityClass;

use crate::error::{ProviderError, ProviderResult};

/// Number of slots per capability class.
pub const POOL_SIZE: u64 = 10;

/// Env var that fills every empty video slot.
pub const SHARED_VIDEO_CREDENTIAL_VAR: &str = "VERTEX_SERVICE_ACCOUNT_JSON";

/// Process-wide credential pool. Immutable once built.
#[derive(Clone, Default)]
pub struct CredentialPool {
    secrets: HashMap<(CapabilityClass, usize), String>,
}

impl CredentialPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every configured slot from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load slots through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut pool = Self::new();
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for class in CapabilityClass::all() {
            for slot in 0..POOL_SIZE as usize {
                if let Some(secret) = read(&Self::env_var_name(class, slot)) {
                    pool.secrets.insert((class, slot), secret);
                }
            }
        }

        if let Some(shared) = read(SHARED_VIDEO_CREDENTIAL_VAR) {
            for slot in 0..POOL_SIZE as usize {
                pool.secrets
                    .entry((CapabilityClass::Video, slot))
                    .or_insert_with(|| shared.clone());
            }
        }

        for class in CapabilityClass::all() {
            let configured = pool.configured_slots(class);
            if configured == 0 {
                warn!(class = %class, "No credentials configured");
            } else {
                info!(class = %class, slots = configured, "Loaded credential pool");
            }
        }

        pool
    }

    /// Add or replace one slot.
    pub fn with_secret(mut self, class: CapabilityClass, slot: usize, secret: impl Into<String>) -> Self {
        self.secrets.insert((class, slot % POOL_SIZE as usize), secret.into());
        self
    }

    /// Environment variable holding `slot` (0-based) of `class`.
    pub fn env_var_name(class: CapabilityClass, slot: usize) -> String {
        format!("{}_{:02}", class.env_prefix(), slot + 1)
    }

    /// Slot selected by a rotation index.
    pub fn slot(rotation_index: u64) -> usize {
        (rotation_index % POOL_SIZE) as usize
    }

    /// Secret for `class` at `rotation_index mod POOL_SIZE`.
    pub fn get_key(&self, class: CapabilityClass, rotation_index: u64) -> ProviderResult<&str> {
        let slot = Self::slot(rotation_index);
        self.secrets
            .get(&(class, slot))
            .map(String::as_str)
            .ok_or_else(|| {
                ProviderError::configuration(format!(
                    "Missing API key ({})",
                    Self::env_var_name(class, slot)
                ))
            })
    }

    pub fn configured_slots(&self, class: CapabilityClass) -> usize {
        self.secrets.keys().filter(|(c, _)| *c == class).count()
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("CredentialPool");
        for class in CapabilityClass::all() {
            debug.field(class.as_str(), &self.configured_slots(class));
        }
        debug.finish()
    }
}
