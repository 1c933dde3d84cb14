//! Seeds storage with the hosts and unix accounts listed in the configuration.

use tracing::{debug, info};

use super::{Host, Storage, UnixAccount};
use crate::config::BootstrapSettings;
use crate::utils::error::StorageError;

/// Insert every configured record whose id is not stored yet. Users listed
/// for an account are associated even when the account already existed.
pub fn seed(storage: &Storage, settings: &BootstrapSettings) -> Result<(), StorageError> {
    for host in &settings.hosts {
        if storage
            .hosts
            .add_host(Host::new(host.id.clone(), host.name.clone()))?
        {
            info!("Added host {} ({})", host.id, host.name);
        } else {
            debug!("Host {} already present", host.id);
        }
    }

    for account in &settings.unix_accounts {
        let mut users = account.associated_users.iter();
        let added = storage.unix_accounts.add_unix_account(
            UnixAccount::new(account.id, account.name.clone()),
            users.next().map(String::as_str),
        )?;
        if added {
            info!("Added unix account {} ({})", account.id, account.name);
        } else {
            // The first user was not stored with the account; associate it too.
            users = account.associated_users.iter();
        }
        for user in users {
            if storage
                .unix_accounts
                .associate_user_to_unix_account(user, account.id)?
            {
                debug!("Associated user {user} to unix account {}", account.id);
            }
        }
    }
    Ok(())
}
