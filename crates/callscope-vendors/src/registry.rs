//! Vendor client construction
//!
//! Builds the right `VendorClient` for an integration's stored credentials
//! or for the process-level vendor configuration, applying the shared
//! timeout and probe-budget knobs.

use crate::client::{VendorClient, VendorError};
use crate::ringba::RingbaClient;
use crate::retreaver::RetreaverClient;
use crate::twilio::TwilioClient;
use callscope_core::config::VendorsConfig;
use callscope_core::models::{IntegrationConfig, VendorKind};
use std::sync::Arc;

/// Seam for constructing vendor clients
///
/// The integration manager consumes this trait, so tests can hand it a
/// factory that returns scripted fakes instead of live HTTP clients.
pub trait VendorClientFactory: Send + Sync {
    /// Build a client for an integration's stored credentials
    fn client_for(
        &self,
        vendor: VendorKind,
        config: &IntegrationConfig,
    ) -> Result<Arc<dyn VendorClient>, VendorError>;
}

/// Factory for vendor clients
#[derive(Debug, Clone)]
pub struct VendorRegistry {
    timeout_secs: u64,
    probe_budget: usize,
}

impl VendorRegistry {
    pub fn new(timeout_secs: u64, probe_budget: usize) -> Self {
        Self {
            timeout_secs,
            probe_budget,
        }
    }

    /// Build a client from the process-level vendor configuration
    ///
    /// Used by request paths (CSV export, probe diagnostics) that are not
    /// tied to a stored integration. An absent section yields
    /// `MissingConfig`, which handlers surface as a structured response.
    pub fn client_from_config(
        &self,
        vendor: VendorKind,
        vendors: &VendorsConfig,
    ) -> Result<Arc<dyn VendorClient>, VendorError> {
        match vendor {
            VendorKind::Ringba => {
                let cfg = vendors.ringba.as_ref().ok_or_else(|| {
                    VendorError::MissingConfig("RINGBA_API_KEY / account not set".to_string())
                })?;
                Ok(Arc::new(RingbaClient::new(
                    &cfg.api_key,
                    &cfg.account_id,
                    self.timeout_secs,
                    self.probe_budget,
                )?))
            }
            VendorKind::Retreaver => {
                let cfg = vendors.retreaver.as_ref().ok_or_else(|| {
                    VendorError::MissingConfig("RETREAVER_API_KEY not set".to_string())
                })?;
                Ok(Arc::new(RetreaverClient::new(
                    &cfg.api_key,
                    cfg.company_id.clone(),
                    self.timeout_secs,
                )?))
            }
            VendorKind::Twilio => {
                let cfg = vendors.twilio.as_ref().ok_or_else(|| {
                    VendorError::MissingConfig("TWILIO_ACCOUNT_SID / auth token not set".to_string())
                })?;
                Ok(Arc::new(TwilioClient::new(
                    &cfg.account_sid,
                    &cfg.auth_token,
                    self.timeout_secs,
                )?))
            }
        }
    }
}

impl VendorClientFactory for VendorRegistry {
    fn client_for(
        &self,
        vendor: VendorKind,
        config: &IntegrationConfig,
    ) -> Result<Arc<dyn VendorClient>, VendorError> {
        match vendor {
            VendorKind::Ringba => {
                let account_id = config.account_id.as_deref().ok_or_else(|| {
                    VendorError::MissingConfig("ringba requires an account_id".to_string())
                })?;
                Ok(Arc::new(RingbaClient::new(
                    &config.api_key,
                    account_id,
                    self.timeout_secs,
                    self.probe_budget,
                )?))
            }
            VendorKind::Retreaver => Ok(Arc::new(RetreaverClient::new(
                &config.api_key,
                config.account_id.clone(),
                self.timeout_secs,
            )?)),
            VendorKind::Twilio => {
                let account_sid = config.account_id.as_deref().ok_or_else(|| {
                    VendorError::MissingConfig("twilio requires an account SID".to_string())
                })?;
                Ok(Arc::new(TwilioClient::new(
                    account_sid,
                    &config.api_key,
                    self.timeout_secs,
                )?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callscope_core::models::FetchFilters;

    fn integration_config(account_id: Option<&str>) -> IntegrationConfig {
        IntegrationConfig {
            api_key: "key".to_string(),
            account_id: account_id.map(String::from),
            sync_interval_minutes: 5,
            auto_transcribe: false,
            filters: FetchFilters::default(),
        }
    }

    #[test]
    fn test_ringba_requires_account_id() {
        let registry = VendorRegistry::new(30, 16);
        let err = registry
            .client_for(VendorKind::Ringba, &integration_config(None))
            .err()
            .unwrap();
        assert!(matches!(err, VendorError::MissingConfig(_)));

        let client = registry
            .client_for(VendorKind::Ringba, &integration_config(Some("RA1")))
            .unwrap();
        assert_eq!(client.vendor(), VendorKind::Ringba);
    }

    #[test]
    fn test_retreaver_without_account_scope() {
        let registry = VendorRegistry::new(30, 16);
        let client = registry
            .client_for(VendorKind::Retreaver, &integration_config(None))
            .unwrap();
        assert_eq!(client.vendor(), VendorKind::Retreaver);
    }

    #[test]
    fn test_unconfigured_vendor_section() {
        let registry = VendorRegistry::new(30, 16);
        let err = registry
            .client_from_config(VendorKind::Twilio, &VendorsConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, VendorError::MissingConfig(_)));
    }
}
