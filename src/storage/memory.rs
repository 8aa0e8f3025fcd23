//! In-memory user store for tests and dry runs

use super::UserStore;
use crate::error::Result;
use crate::types::{UserConfig, UserId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<BTreeMap<UserId, (UserConfig, bool)>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserConfig>) -> Result<Self> {
        let store = Self::new();
        for user in users {
            store.save(user)?;
        }
        Ok(store)
    }

    /// Validate and insert or replace, keeping the active flag of existing users
    pub fn save(&self, config: UserConfig) -> Result<()> {
        config.validate()?;
        let mut users = self.users.write();
        let active = users.get(&config.user_id).map_or(true, |(_, active)| *active);
        users.insert(config.user_id, (config, active));
        Ok(())
    }

    pub fn set_active(&self, user_id: UserId, active: bool) -> bool {
        match self.users.write().get_mut(&user_id) {
            Some(entry) => {
                entry.1 = active;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list_active_users(&self) -> Result<Vec<UserConfig>> {
        Ok(self
            .users
            .read()
            .values()
            .filter(|(_, active)| *active)
            .map(|(config, _)| config.clone())
            .collect())
    }
}
