//! Auth0 connector: the set of resource syncers for one tenant.

use std::sync::Arc;

use tracing::info;

use crate::client::Auth0Client;
use crate::config::Auth0Config;
use crate::error::Auth0Result;
use crate::organizations::OrganizationSyncer;
use crate::resource::ResourceType;
use crate::resource_servers::ResourceServerSyncer;
use crate::roles::RoleSyncer;
use crate::scopes::ScopeSyncer;
use crate::syncer::{ResourceProvisioner, ResourceSyncer};
use crate::users::UserSyncer;

/// Auth0 connector.
pub struct Auth0Connector {
    config: Auth0Config,
    syncers: Vec<Box<dyn ResourceSyncer>>,
}

impl Auth0Connector {
    /// Creates a connector for the tenant in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: Auth0Config) -> Auth0Result<Self> {
        config.validate()?;
        let client = Arc::new(Auth0Client::new(&config)?);
        let poll_config = config.job_poll_config();

        let mut users = UserSyncer::new(Arc::clone(&client), poll_config.clone());
        if config.sync_users_by_job {
            users = users.with_export_job(config.sync_users_by_job_limit);
        }

        let syncers: Vec<Box<dyn ResourceSyncer>> = vec![
            Box::new(users),
            Box::new(
                RoleSyncer::new(Arc::clone(&client), poll_config.clone())
                    .with_permissions(config.sync_permissions),
            ),
            Box::new(OrganizationSyncer::new(Arc::clone(&client), poll_config.clone())),
            Box::new(ResourceServerSyncer::new(Arc::clone(&client), poll_config.clone())),
            Box::new(ScopeSyncer::new(Arc::clone(&client), poll_config)),
        ];

        info!(
            base_url = %client.base_url(),
            sync_permissions = config.sync_permissions,
            sync_users_by_job = config.sync_users_by_job,
            "Auth0 connector initialized"
        );

        Ok(Self {
            config,
            syncers,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Auth0Config {
        &self.config
    }

    /// Resource types in sync order.
    pub fn resource_types(&self) -> Vec<&'static ResourceType> {
        self.syncers.iter().map(|s| s.resource_type()).collect()
    }

    /// All syncers, in sync order.
    pub fn syncers(&self) -> &[Box<dyn ResourceSyncer>] {
        &self.syncers
    }

    /// Syncer for a resource type id.
    pub fn syncer(&self, resource_type: &str) -> Option<&dyn ResourceSyncer> {
        self.syncers
            .iter()
            .find(|s| s.resource_type().id == resource_type)
            .map(AsRef::as_ref)
    }

    /// Write-back for a resource type id, if it supports grant and revoke.
    pub fn provisioner(&self, resource_type: &str) -> Option<&dyn ResourceProvisioner> {
        self.syncer(resource_type)?.provisioner()
    }
}
