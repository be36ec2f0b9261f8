use crate::{
    cli::actions::Action,
    gardi,
    vault::{
        memory::MemoryVaultStore, postgres::PgVaultStore, SharedVaultStore, VaultPolicy,
    },
};
use anyhow::{anyhow, Result};
use std::{sync::Arc, time::Duration};
use tracing::info;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            cooldown_seconds,
            min_codes,
            max_codes,
        } => {
            let policy = VaultPolicy {
                cooldown: Duration::from_secs(cooldown_seconds),
                min_codes: usize::from(min_codes),
                max_codes: usize::from(max_codes),
            };

            let store: SharedVaultStore = match dsn {
                Some(dsn) => {
                    let url = Url::parse(&dsn)?;
                    if !matches!(url.scheme(), "postgres" | "postgresql") {
                        return Err(anyhow!("unsupported DSN scheme: {}", url.scheme()));
                    }

                    info!("vault store: postgres");
                    Arc::new(PgVaultStore::connect(&dsn, policy).await?)
                }
                None => {
                    info!("vault store: in-memory");
                    Arc::new(MemoryVaultStore::new(policy))
                }
            };

            gardi::new(port, store).await?;
        }
    }

    Ok(())
}
