//! Gateway state management

use pagedesk_core::TokenConfig;

use crate::automation::AutomationDelivery;
use crate::events::ChangeBus;
use crate::graph::PlatformClient;
use crate::identity::IdentityProvider;
use crate::limiter::ActionLimiter;
use crate::store::{AuditStore, PageStore, RelationStore, RoleStore, TokenStore};

/// Gateway application state, generic over the store and the two external
/// collaborators so tests can substitute mocks.
pub struct AppState<D, G, I>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    pub store: D,
    pub platform: G,
    pub identity: I,
    pub tokens: TokenConfig,
    pub webhook_allowlist: Vec<String>,
    pub limiter: ActionLimiter,
    pub changes: ChangeBus,
    pub automation: AutomationDelivery,
}

impl<D, G, I> AppState<D, G, I>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    pub fn new(
        store: D,
        platform: G,
        identity: I,
        tokens: TokenConfig,
        webhook_allowlist: Vec<String>,
    ) -> Self {
        Self {
            store,
            platform,
            identity,
            tokens,
            webhook_allowlist,
            limiter: ActionLimiter::new(),
            changes: ChangeBus::new(),
            automation: AutomationDelivery::new(),
        }
    }
}
