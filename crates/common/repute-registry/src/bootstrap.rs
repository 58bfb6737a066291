use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::registry::ReputationRegistry;
use repute_types::Address;
use serde::Serialize;
use tracing::info;

/// What a bootstrap run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub operator: Option<Address>,
    /// Each seeded address with its score after the seed rating.
    pub seeded: Vec<(Address, u64)>,
    pub total_users: usize,
}

/// Registers the configured operator and applies the configured seed ratings.
///
/// Seed ratings are submitted with the operator as caller, or the zero
/// address when no operator is configured. Running it twice applies the
/// seeds twice.
pub async fn run_bootstrap(
    registry: &ReputationRegistry,
    config: &RegistryConfig,
) -> Result<BootstrapReport, RegistryError> {
    if let Some(operator) = &config.operator_address {
        registry.register_self(operator).await?;
        info!(%operator, "Operator registered");
    }

    let caller = config.operator_address.unwrap_or(Address::ZERO);
    let mut seeded = Vec::with_capacity(config.seed.len());
    for seed in &config.seed {
        let score = registry
            .submit_preset(&caller, &seed.address, seed.preset)
            .await?;
        info!(address = %seed.address, preset = %seed.preset, score, "Seed rating applied");
        seeded.push((seed.address, score));
    }

    let total_users = registry.total_users().await;
    info!(total_users, seeds = seeded.len(), "Bootstrap complete");
    Ok(BootstrapReport {
        operator: config.operator_address,
        seeded,
        total_users,
    })
}
