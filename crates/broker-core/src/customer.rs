//! Customer directory boundary.
//!
//! The core only needs three things from whoever owns customer
//! identities: username -> id resolution, the role of an id, and the
//! authorization predicate built from those two. [`InMemoryDirectory`]
//! is the process-local implementation the server wires in.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use tracing::{info, warn};

use crate::error::{BrokerError, BrokerResult};
use crate::ids::CustomerId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Customer,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => f.write_str("CUSTOMER"),
            Role::Admin => f.write_str("ADMIN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: CustomerId,
    pub username: String,
    /// Opaque; verifying it belongs to the authentication layer.
    pub credential: String,
    pub role: Role,
}

pub trait CustomerDirectory: Send + Sync {
    /// Create a customer; usernames are unique.
    fn register(&self, username: &str, credential: &str, role: Role) -> BrokerResult<CustomerId>;

    fn resolve_customer_id(&self, username: &str) -> BrokerResult<CustomerId>;

    fn role(&self, customer_id: CustomerId) -> BrokerResult<Role>;

    fn username(&self, customer_id: CustomerId) -> BrokerResult<String>;

    /// `actor` is an ADMIN, or `actor` is the owner of `target`.
    /// Unknown actors may do nothing.
    fn may_act(&self, actor: &str, target: CustomerId) -> bool {
        match self.resolve_customer_id(actor) {
            Ok(actor_id) => {
                actor_id == target || matches!(self.role(actor_id), Ok(Role::Admin))
            }
            Err(_) => false,
        }
    }

    fn is_admin(&self, actor: &str) -> bool {
        self.resolve_customer_id(actor)
            .and_then(|id| self.role(id))
            .map_or(false, |role| role == Role::Admin)
    }
}

#[derive(Debug, Default)]
struct Customers {
    by_id: HashMap<CustomerId, Customer>,
    by_username: HashMap<String, CustomerId>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inner: RwLock<Customers>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        InMemoryDirectory::default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CustomerDirectory for InMemoryDirectory {
    fn register(&self, username: &str, credential: &str, role: Role) -> BrokerResult<CustomerId> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BrokerError::invalid("username must not be blank"));
        }
        if credential.trim().is_empty() {
            return Err(BrokerError::invalid("credential must not be blank"));
        }

        let mut customers = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if customers.by_username.contains_key(username) {
            warn!(username, "duplicate username");
            return Err(BrokerError::CustomerExists {
                username: username.to_string(),
            });
        }

        customers.next_id += 1;
        let id = CustomerId(customers.next_id);
        customers.by_username.insert(username.to_string(), id);
        customers.by_id.insert(
            id,
            Customer {
                id,
                username: username.to_string(),
                credential: credential.to_string(),
                role,
            },
        );
        info!(customer_id = %id, username, role = %role, "customer registered");
        Ok(id)
    }

    fn resolve_customer_id(&self, username: &str) -> BrokerResult<CustomerId> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_username
            .get(username)
            .copied()
            .ok_or_else(|| BrokerError::not_found("customer", username))
    }

    fn role(&self, customer_id: CustomerId) -> BrokerResult<Role> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(&customer_id)
            .map(|c| c.role)
            .ok_or_else(|| BrokerError::not_found("customer", customer_id))
    }

    fn username(&self, customer_id: CustomerId) -> BrokerResult<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(&customer_id)
            .map(|c| c.username.clone())
            .ok_or_else(|| BrokerError::not_found("customer", customer_id))
    }
}
