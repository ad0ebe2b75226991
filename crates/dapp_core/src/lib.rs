use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{Address, ChainId, TxHash},
    error::DappError,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod view;
pub use view::{project, RenderState, ViewModel};

const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capability bound to a specific wallet account that can authorize
/// state-changing calls.
#[async_trait]
pub trait SigningHandle: Send + Sync {
    async fn address(&self) -> Result<Address>;
}

#[async_trait]
pub trait WalletSession: Send + Sync + std::fmt::Debug {
    async fn chain_id(&self) -> Result<ChainId>;
    async fn signer(&self) -> Result<Arc<dyn SigningHandle>>;
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn WalletSession>>;
}

/// In-flight write transaction. `wait` resolves once the transaction is
/// confirmed and fails on rejection or revert.
#[async_trait]
pub trait TxHandle: Send + Sync {
    fn hash(&self) -> TxHash;
    async fn wait(&self) -> Result<()>;
}

#[async_trait]
pub trait WhitelistContract: Send + Sync {
    async fn num_addresses_whitelisted(&self) -> Result<u64>;
    async fn is_whitelisted(&self, address: Address) -> Result<bool>;
    async fn add_address_to_whitelist(
        &self,
        signer: Arc<dyn SigningHandle>,
    ) -> Result<Box<dyn TxHandle>>;
}

pub struct MissingWalletProvider;

#[async_trait]
impl WalletProvider for MissingWalletProvider {
    async fn connect(&self) -> Result<Arc<dyn WalletSession>> {
        Err(anyhow!("no wallet provider configured"))
    }
}

pub struct MissingWhitelistContract;

#[async_trait]
impl WhitelistContract for MissingWhitelistContract {
    async fn num_addresses_whitelisted(&self) -> Result<u64> {
        Err(anyhow!("no whitelist contract configured"))
    }

    async fn is_whitelisted(&self, address: Address) -> Result<bool> {
        Err(anyhow!("no whitelist contract configured for {address}"))
    }

    async fn add_address_to_whitelist(
        &self,
        _signer: Arc<dyn SigningHandle>,
    ) -> Result<Box<dyn TxHandle>> {
        Err(anyhow!("no whitelist contract configured"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Join marker. `Submitting` covers the window between the precondition
/// check and the provider accepting the transaction, so single-flight holds
/// across the submission await as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingTx {
    Submitting,
    AwaitingConfirmation(TxHash),
}

#[derive(Debug, Clone)]
pub enum DappEvent {
    ConnectionChanged(ConnectionState),
    WhitelistStatusUpdated(bool),
    WhitelistCountUpdated(u64),
    JoinSubmitted(TxHash),
    JoinConfirmed,
    JoinFailed(String),
}

pub struct DappController {
    wallet: Arc<dyn WalletProvider>,
    contract: Arc<dyn WhitelistContract>,
    expected_chain: ChainId,
    confirmation_timeout: Duration,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<DappEvent>,
}

struct ControllerState {
    connection: ConnectionState,
    session: Option<Arc<dyn WalletSession>>,
    signer_address: Option<Address>,
    whitelist_status: bool,
    whitelist_count: u64,
    pending_tx: Option<PendingTx>,
    last_call_error: Option<String>,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            session: None,
            signer_address: None,
            whitelist_status: false,
            whitelist_count: 0,
            pending_tx: None,
            last_call_error: None,
        }
    }
}

impl DappController {
    pub fn new(expected_chain: ChainId) -> Arc<Self> {
        Self::new_with_dependencies(
            Arc::new(MissingWalletProvider),
            Arc::new(MissingWhitelistContract),
            expected_chain,
        )
    }

    pub fn new_with_dependencies(
        wallet: Arc<dyn WalletProvider>,
        contract: Arc<dyn WhitelistContract>,
        expected_chain: ChainId,
    ) -> Arc<Self> {
        Self::new_with_confirmation_timeout(
            wallet,
            contract,
            expected_chain,
            DEFAULT_CONFIRMATION_TIMEOUT,
        )
    }

    pub fn new_with_confirmation_timeout(
        wallet: Arc<dyn WalletProvider>,
        contract: Arc<dyn WhitelistContract>,
        expected_chain: ChainId,
        confirmation_timeout: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            wallet,
            contract,
            expected_chain,
            confirmation_timeout,
            inner: Mutex::new(ControllerState::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DappEvent> {
        self.events.subscribe()
    }

    /// Requests a wallet session and validates the connected network.
    ///
    /// A chain mismatch is a hard failure: the session is dropped and the
    /// controller reverts to `Disconnected`. On success the whitelist status
    /// and count refreshes run as independent fire-and-forget tasks; their
    /// failures are logged and leave prior cached values in place.
    pub async fn connect(self: &Arc<Self>) -> Result<(), DappError> {
        {
            let mut inner = self.inner.lock().await;
            match inner.connection {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => return Err(DappError::ConnectInProgress),
                ConnectionState::Disconnected => {}
            }
            inner.connection = ConnectionState::Connecting;
        }
        self.emit(DappEvent::ConnectionChanged(ConnectionState::Connecting));

        match self.establish_session().await {
            Ok((session, address)) => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.connection = ConnectionState::Connected;
                    inner.session = Some(session);
                    inner.signer_address = Some(address);
                }
                info!(
                    "wallet connected address={address} chain={}",
                    self.expected_chain
                );
                self.emit(DappEvent::ConnectionChanged(ConnectionState::Connected));

                let client = Arc::clone(self);
                tokio::spawn(async move {
                    client.refresh_whitelist_status().await;
                });
                let client = Arc::clone(self);
                tokio::spawn(async move {
                    client.refresh_whitelist_count().await;
                });
                Ok(())
            }
            Err(err) => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.connection = ConnectionState::Disconnected;
                    inner.session = None;
                    inner.signer_address = None;
                }
                warn!("wallet connect failed: {err}");
                self.emit(DappEvent::ConnectionChanged(ConnectionState::Disconnected));
                Err(err)
            }
        }
    }

    async fn establish_session(
        &self,
    ) -> Result<(Arc<dyn WalletSession>, Address), DappError> {
        let session = self
            .wallet
            .connect()
            .await
            .map_err(|err| DappError::ProviderUnavailable(err.to_string()))?;

        let actual = session
            .chain_id()
            .await
            .map_err(|err| DappError::ProviderUnavailable(err.to_string()))?;
        if actual != self.expected_chain {
            return Err(DappError::NetworkMismatch {
                expected: self.expected_chain,
                actual,
            });
        }

        let signer = session
            .signer()
            .await
            .map_err(|err| DappError::ProviderUnavailable(err.to_string()))?;
        let address = signer
            .address()
            .await
            .map_err(|err| DappError::ProviderUnavailable(err.to_string()))?;

        Ok((session, address))
    }

    /// Read-only refresh of the whitelist member count. Failures keep the
    /// cached value and are recorded, never propagated.
    pub async fn refresh_whitelist_count(&self) {
        match self.contract.num_addresses_whitelisted().await {
            Ok(count) => {
                let mut inner = self.inner.lock().await;
                inner.whitelist_count = count;
                inner.last_call_error = None;
                drop(inner);
                self.emit(DappEvent::WhitelistCountUpdated(count));
            }
            Err(err) => {
                warn!("whitelist count refresh failed: {err:#}");
                let mut inner = self.inner.lock().await;
                inner.last_call_error = Some(err.to_string());
            }
        }
    }

    /// Refreshes whether the connected address is whitelisted. Requires the
    /// signing handle acquired during connect; same failure policy as the
    /// count refresh.
    pub async fn refresh_whitelist_status(&self) {
        let Some(address) = self.inner.lock().await.signer_address else {
            warn!("whitelist status refresh skipped: no connected signer");
            return;
        };

        match self.contract.is_whitelisted(address).await {
            Ok(status) => {
                let mut inner = self.inner.lock().await;
                inner.whitelist_status = status;
                inner.last_call_error = None;
                drop(inner);
                self.emit(DappEvent::WhitelistStatusUpdated(status));
            }
            Err(err) => {
                warn!("whitelist status refresh failed for {address}: {err:#}");
                let mut inner = self.inner.lock().await;
                inner.last_call_error = Some(err.to_string());
            }
        }
    }

    /// Submits the join transaction and waits for confirmation, bounded by
    /// the configured timeout.
    ///
    /// Valid only when connected, not yet whitelisted, and with no join in
    /// flight. Confirmation sets the whitelist status optimistically (no
    /// re-verification read) and refreshes the count. Any failure clears the
    /// pending marker and leaves the cached status untouched; nothing is
    /// retried.
    pub async fn join_whitelist(self: &Arc<Self>) -> Result<(), DappError> {
        let session = {
            let mut inner = self.inner.lock().await;
            if inner.connection != ConnectionState::Connected {
                return Err(DappError::NotConnected);
            }
            if inner.pending_tx.is_some() {
                return Err(DappError::JoinPending);
            }
            if inner.whitelist_status {
                return Err(DappError::AlreadyWhitelisted);
            }
            let session = inner.session.clone().ok_or(DappError::NotConnected)?;
            inner.pending_tx = Some(PendingTx::Submitting);
            session
        };

        let signer = match session.signer().await {
            Ok(signer) => signer,
            Err(err) => {
                self.clear_pending().await;
                warn!("join aborted, signing handle unavailable: {err:#}");
                self.emit(DappEvent::JoinFailed(err.to_string()));
                return Err(DappError::ProviderUnavailable(err.to_string()));
            }
        };

        let tx = match self.contract.add_address_to_whitelist(signer).await {
            Ok(tx) => tx,
            Err(err) => {
                self.clear_pending().await;
                warn!("join submission failed: {err:#}");
                self.emit(DappEvent::JoinFailed(err.to_string()));
                return Err(DappError::TransactionFailed(err.to_string()));
            }
        };

        let hash = tx.hash();
        {
            let mut inner = self.inner.lock().await;
            inner.pending_tx = Some(PendingTx::AwaitingConfirmation(hash));
        }
        info!("join transaction submitted tx={hash}");
        self.emit(DappEvent::JoinSubmitted(hash));

        match tokio::time::timeout(self.confirmation_timeout, tx.wait()).await {
            Ok(Ok(())) => {
                // Status flips before the pending marker clears, in one
                // critical section, so no settled state shows both.
                {
                    let mut inner = self.inner.lock().await;
                    inner.whitelist_status = true;
                    inner.pending_tx = None;
                }
                info!("join transaction confirmed tx={hash}");
                self.emit(DappEvent::WhitelistStatusUpdated(true));
                self.emit(DappEvent::JoinConfirmed);
                self.refresh_whitelist_count().await;
                Ok(())
            }
            Ok(Err(err)) => {
                self.clear_pending().await;
                warn!("join transaction failed tx={hash}: {err:#}");
                self.emit(DappEvent::JoinFailed(err.to_string()));
                Err(DappError::TransactionFailed(err.to_string()))
            }
            Err(_) => {
                self.clear_pending().await;
                let message = format!(
                    "confirmation not received within {:?}",
                    self.confirmation_timeout
                );
                warn!("join transaction timed out tx={hash}");
                self.emit(DappEvent::JoinFailed(message.clone()));
                Err(DappError::TransactionFailed(message))
            }
        }
    }

    async fn clear_pending(&self) {
        let mut inner = self.inner.lock().await;
        inner.pending_tx = None;
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.lock().await.connection
    }

    pub async fn whitelist_status(&self) -> bool {
        self.inner.lock().await.whitelist_status
    }

    pub async fn whitelist_count(&self) -> u64 {
        self.inner.lock().await.whitelist_count
    }

    pub async fn pending_tx(&self) -> Option<PendingTx> {
        self.inner.lock().await.pending_tx
    }

    pub async fn connected_address(&self) -> Option<Address> {
        self.inner.lock().await.signer_address
    }

    /// Render-ready snapshot for the view layer.
    pub async fn view_model(&self) -> ViewModel {
        let inner = self.inner.lock().await;
        ViewModel {
            render_state: project(
                inner.connection,
                inner.whitelist_status,
                inner.pending_tx.is_some(),
            ),
            whitelist_count: inner.whitelist_count,
            connected_address: inner.signer_address,
            last_call_error: inner.last_call_error.clone(),
        }
    }

    fn emit(&self, event: DappEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
