//! Caller identity
//!
//! The orchestrator asks the identity provider for the caller's address
//! before every operation. No address means "not authorized".

use std::sync::RwLock;

use log::info;

use crate::record::Address;

pub trait IdentityProvider: Send + Sync {
    /// Authenticated address of the caller, if any
    fn current_address(&self) -> Option<Address>;
}

/// Wallet-style identity that can be connected and disconnected
#[derive(Debug, Default)]
pub struct WalletSession {
    address: RwLock<Option<Address>>,
}

impl WalletSession {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connected(address: Address) -> Self {
        Self {
            address: RwLock::new(Some(address)),
        }
    }

    pub fn connect(&self, address: Address) {
        *self.address.write().unwrap_or_else(|e| e.into_inner()) = Some(address);
        info!("Wallet connected: {}", address);
    }

    pub fn disconnect(&self) {
        *self.address.write().unwrap_or_else(|e| e.into_inner()) = None;
        info!("Wallet disconnected");
    }
}

impl IdentityProvider for WalletSession {
    fn current_address(&self) -> Option<Address> {
        *self.address.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_disconnect() {
        let wallet = WalletSession::disconnected();
        assert_eq!(wallet.current_address(), None);

        wallet.connect(Address([3u8; 20]));
        assert_eq!(wallet.current_address(), Some(Address([3u8; 20])));

        wallet.disconnect();
        assert_eq!(wallet.current_address(), None);
    }
}
