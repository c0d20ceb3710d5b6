//! Stores and catalog categories.

use chrono::{DateTime, Utc};
use common::{CategoryId, StoreId};
use serde::{Deserialize, Serialize};

/// A tenant-owned sales entity. Products and integrations hang off a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// Creates a new active store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: StoreId::new(),
            name: name.into(),
            description: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// A catalog category; categories form a tree through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub display_order: i32,
    pub is_active: bool,
}

impl Category {
    /// Creates a new top-level category.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CategoryId::new(),
            name: name.into(),
            parent_id: None,
            display_order: 0,
            is_active: true,
        }
    }

    /// Places this category under a parent.
    pub fn with_parent(mut self, parent_id: CategoryId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}
