//! Delivery selection and persistence.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use tradepost_core::{AccountType, CustomerProfile, DeliveryInfo};

use super::table::{DeliveryTable, TownMatch};
use super::DeliveryError;
use crate::storage::{LocalStore, keys};

/// Resolves and persists the current delivery selection.
#[derive(Debug, Clone)]
pub struct DeliveryResolver {
    table: Arc<DeliveryTable>,
    store: LocalStore,
}

impl DeliveryResolver {
    #[must_use]
    pub fn new(table: DeliveryTable, store: LocalStore) -> Self {
        Self {
            table: Arc::new(table),
            store,
        }
    }

    #[must_use]
    pub fn table(&self) -> &DeliveryTable {
        &self.table
    }

    /// Select a town from the fee table and persist the selection.
    ///
    /// Region and town names are canonicalized to the table's spelling.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRegion`/`UnknownTown` if the pair is not in the table.
    #[instrument(skip(self))]
    pub fn select_by_region_town(
        &self,
        region: &str,
        town: &str,
    ) -> Result<DeliveryInfo, DeliveryError> {
        let info = self.lookup(region, town)?;
        self.save(&info)?;
        Ok(info)
    }

    /// Look up a table selection without persisting it.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRegion`/`UnknownTown` if the pair is not in the table.
    pub fn lookup(&self, region: &str, town: &str) -> Result<DeliveryInfo, DeliveryError> {
        if self.table.region(region).is_none() {
            return Err(DeliveryError::UnknownRegion(region.to_string()));
        }

        let (region_entry, town_entry) =
            self.table
                .town(region, town)
                .ok_or_else(|| DeliveryError::UnknownTown {
                    region: region.to_string(),
                    town: town.to_string(),
                })?;

        Ok(DeliveryInfo::RegionTown {
            region: region_entry.name.clone(),
            town: town_entry.town.clone(),
            fee: town_entry.delivery_fee,
        })
    }

    /// Select a free-text address and persist it.
    ///
    /// Only agents may attach a fee; a customer-supplied fee is ignored and a
    /// zero fee from an agent is treated as no fee.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::EmptyAddress` for blank text.
    #[instrument(skip(self, address_text))]
    pub fn select_manual(
        &self,
        address_text: &str,
        fee: Option<Decimal>,
        account_type: AccountType,
    ) -> Result<DeliveryInfo, DeliveryError> {
        let address = address_text.trim();
        if address.is_empty() {
            return Err(DeliveryError::EmptyAddress);
        }

        let info = match fee {
            Some(fee) if account_type.is_agent() && fee > Decimal::ZERO => {
                DeliveryInfo::AgentManual {
                    address: address.to_string(),
                    fee,
                }
            }
            _ => DeliveryInfo::Manual {
                address: address.to_string(),
            },
        };

        self.save(&info)?;
        Ok(info)
    }

    /// Search the fee table.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<TownMatch> {
        self.table.search(query)
    }

    /// The persisted selection, or the profile address with no fee.
    #[must_use]
    pub fn current(&self, profile: Option<&CustomerProfile>) -> Option<DeliveryInfo> {
        if let Some(info) = self.store.get::<DeliveryInfo>(keys::DELIVERY_INFO) {
            return Some(info);
        }

        let address = profile?.address.as_deref()?.trim();
        if address.is_empty() {
            return None;
        }
        debug!("No saved delivery selection, using profile address");
        Some(DeliveryInfo::Manual {
            address: address.to_string(),
        })
    }

    fn save(&self, info: &DeliveryInfo) -> Result<(), DeliveryError> {
        self.store.insert(keys::DELIVERY_INFO, info)?;
        debug!(address = %info.address(), fee = %info.fee_display(), "Saved delivery selection");
        Ok(())
    }
}
