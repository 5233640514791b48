//! In-memory implementation of every repository.
//!
//! Intended for tests and local development. All tables sit behind one
//! `RwLock`, so each version check and its write happen atomically.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use paperback_core::domain::Created;
use paperback_core::{
    Email, Filters, Invoice, InvoiceId, InvoiceSort, Metadata, NewInvoice, NewOrder, NewProduct,
    Order, OrderId, OrderSort, PermissionCode, Permissions, Product, ProductId, ProductSort,
    SortDirection, SortKey, TokenScope, User, UserId,
};

use super::{
    InvoiceFilter, InvoiceRepository, NewUserRecord, OrderFilter, OrderRepository,
    PermissionRepository, ProductFilter, ProductRepository, RepositoryError, StoreHealth,
    TokenRecord, TokenRepository, UserRepository,
};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    tokens: Vec<TokenRecord>,
    grants: BTreeMap<UserId, BTreeSet<&'static str>>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    invoices: BTreeMap<InvoiceId, Invoice>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, RepositoryError> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::DataCorruption("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, RepositoryError> {
        self.tables
            .write()
            .map_err(|_| RepositoryError::DataCorruption("lock poisoned".to_string()))
    }

    /// Removes an account with its tokens, grants and orders.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such account exists.
    pub fn remove_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut tables = self.write()?;
        tables.users.remove(&id).ok_or(RepositoryError::NotFound)?;
        tables.tokens.retain(|t| t.user_id != id);
        tables.grants.remove(&id);
        let orders: Vec<OrderId> = tables
            .orders
            .values()
            .filter(|o| o.user_id == id)
            .map(|o| o.id)
            .collect();
        for order in orders {
            remove_order(&mut tables, order);
        }
        Ok(())
    }

    /// Sets the stored activation flag directly, bumping the version.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such account exists.
    pub fn set_activated(&self, id: UserId, activated: bool) -> Result<(), RepositoryError> {
        let mut tables = self.write()?;
        let user = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.activated = activated;
        user.version += 1;
        Ok(())
    }
}

fn remove_order(tables: &mut Tables, id: OrderId) {
    tables.orders.remove(&id);
    tables.invoices.retain(|_, invoice| invoice.order_id != id);
}

/// Sorts by the requested key and direction, then by ascending id, and
/// returns the requested page with its metadata.
fn paginate<T: Clone, K: SortKey>(
    mut items: Vec<T>,
    filters: &Filters<K>,
    compare: impl Fn(&T, &T, K) -> Ordering,
    id: impl Fn(&T) -> i64,
) -> (Vec<T>, Metadata) {
    items.sort_by(|a, b| {
        let primary = compare(a, b, filters.sort());
        let primary = match filters.direction() {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| id(a).cmp(&id(b)))
    });

    let total = i64::try_from(items.len()).unwrap_or(i64::MAX);
    let offset = usize::try_from(filters.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(filters.limit()).unwrap_or(usize::MAX);
    let page = items.into_iter().skip(offset).take(limit).collect();
    (page, Metadata::for_filters(total, filters))
}

/// Word match approximating `plainto_tsquery('simple', ..)`: every query word
/// must appear as a whole word of the title, ignoring case.
fn title_matches(title: &str, query: &str) -> bool {
    let words: BTreeSet<String> = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .all(|w| words.contains(&w.to_lowercase()))
}

/// Email equality as `citext` sees it.
fn same_email(a: &Email, b: &Email) -> bool {
    a.as_str().to_lowercase() == b.as_str().to_lowercase()
}

fn created<Id>(id: Id, created_at: DateTime<Utc>) -> Created<Id> {
    Created {
        id,
        created_at,
        version: 1,
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert(&self, user: &NewUserRecord) -> Result<User, RepositoryError> {
        let mut tables = self.write()?;
        if tables.users.values().any(|u| same_email(&u.email, &user.email)) {
            return Err(RepositoryError::Duplicate { field: "email" });
        }
        let stored = User {
            id: UserId::new(tables.next_id()),
            created_at: Utc::now(),
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            activated: false,
            version: 1,
        };
        tables.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: UserId) -> Result<User, RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        self.read()?
            .users
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_email(&self, email: &Email) -> Result<User, RepositoryError> {
        self.read()?
            .users
            .values()
            .find(|u| same_email(&u.email, email))
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<i32, RepositoryError> {
        let mut tables = self.write()?;
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && same_email(&u.email, &user.email))
        {
            return Err(RepositoryError::Duplicate { field: "email" });
        }
        let stored = tables
            .users
            .get_mut(&user.id)
            .filter(|u| u.version == user.version)
            .ok_or(RepositoryError::EditConflict)?;
        *stored = User {
            version: user.version + 1,
            created_at: stored.created_at,
            ..user.clone()
        };
        Ok(stored.version)
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn insert(&self, token: &TokenRecord) -> Result<(), RepositoryError> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&token.user_id) {
            return Err(RepositoryError::MissingReference { field: "user_id" });
        }
        tables.tokens.push(token.clone());
        Ok(())
    }

    async fn find_owner(
        &self,
        scope: TokenScope,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<User, RepositoryError> {
        let tables = self.read()?;
        let token = tables
            .tokens
            .iter()
            .find(|t| t.scope == scope && t.hash == hash && t.expiry > now)
            .ok_or(RepositoryError::NotFound)?;
        tables
            .users
            .get(&token.user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        self.write()?
            .tokens
            .retain(|t| !(t.scope == scope && t.user_id == user_id));
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for InMemoryStore {
    async fn all_for_user(&self, user_id: UserId) -> Result<Permissions, RepositoryError> {
        let tables = self.read()?;
        Ok(tables
            .grants
            .get(&user_id)
            .map(|codes| codes.iter().map(|c| (*c).to_string()).collect())
            .unwrap_or_default())
    }

    async fn add_for_user(
        &self,
        user_id: UserId,
        codes: &[PermissionCode],
    ) -> Result<(), RepositoryError> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&user_id) {
            return Err(RepositoryError::MissingReference { field: "user_id" });
        }
        tables
            .grants
            .entry(user_id)
            .or_default()
            .extend(codes.iter().map(PermissionCode::as_str));
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn list(
        &self,
        filter: &ProductFilter,
        filters: &Filters<ProductSort>,
    ) -> Result<(Vec<Product>, Metadata), RepositoryError> {
        let matching: Vec<Product> = self
            .read()?
            .products
            .values()
            .filter(|p| filter.title.is_empty() || title_matches(&p.title, &filter.title))
            .cloned()
            .collect();
        Ok(paginate(
            matching,
            filters,
            |a, b, key| match key {
                ProductSort::Id => a.id.cmp(&b.id),
                ProductSort::Title => a.title.cmp(&b.title),
                ProductSort::Price => a.price.cmp(&b.price),
            },
            |p| p.id.as_i64(),
        ))
    }

    async fn get(&self, id: ProductId) -> Result<Product, RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        self.read()?
            .products
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn insert(&self, product: &NewProduct) -> Result<Created<ProductId>, RepositoryError> {
        let mut tables = self.write()?;
        let id = ProductId::new(tables.next_id());
        let created_at = Utc::now();
        tables.products.insert(
            id,
            Product {
                id,
                created_at,
                title: product.title.clone(),
                description: product.description.clone(),
                price: product.price,
                version: 1,
            },
        );
        Ok(created(id, created_at))
    }

    async fn update(&self, product: &Product) -> Result<i32, RepositoryError> {
        let mut tables = self.write()?;
        let stored = tables
            .products
            .get_mut(&product.id)
            .filter(|p| p.version == product.version)
            .ok_or(RepositoryError::EditConflict)?;
        stored.title.clone_from(&product.title);
        stored.description.clone_from(&product.description);
        stored.price = product.price;
        stored.version += 1;
        Ok(stored.version)
    }

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        self.write()?
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn list(
        &self,
        owner: UserId,
        filter: &OrderFilter,
        filters: &Filters<OrderSort>,
    ) -> Result<(Vec<Order>, Metadata), RepositoryError> {
        let matching: Vec<Order> = self
            .read()?
            .orders
            .values()
            .filter(|o| o.user_id == owner && filter.status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        Ok(paginate(
            matching,
            filters,
            |a, b, key| match key {
                OrderSort::Id => a.id.cmp(&b.id),
                OrderSort::TotalPrice => a.total_price.cmp(&b.total_price),
                OrderSort::Status => a.status.as_str().cmp(b.status.as_str()),
                OrderSort::CreatedAt => a.created_at.cmp(&b.created_at),
            },
            |o| o.id.as_i64(),
        ))
    }

    async fn get(&self, owner: UserId, id: OrderId) -> Result<Order, RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        self.read()?
            .orders
            .get(&id)
            .filter(|o| o.user_id == owner)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn insert(
        &self,
        owner: UserId,
        order: &NewOrder,
    ) -> Result<Created<OrderId>, RepositoryError> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&owner) {
            return Err(RepositoryError::MissingReference { field: "user_id" });
        }
        let id = OrderId::new(tables.next_id());
        let created_at = Utc::now();
        tables.orders.insert(
            id,
            Order {
                id,
                created_at,
                user_id: owner,
                total_price: order.total_price,
                status: order.status,
                version: 1,
            },
        );
        Ok(created(id, created_at))
    }

    async fn update(&self, order: &Order) -> Result<i32, RepositoryError> {
        let mut tables = self.write()?;
        let stored = tables
            .orders
            .get_mut(&order.id)
            .filter(|o| o.user_id == order.user_id && o.version == order.version)
            .ok_or(RepositoryError::EditConflict)?;
        stored.total_price = order.total_price;
        stored.status = order.status;
        stored.version += 1;
        Ok(stored.version)
    }

    async fn delete(&self, owner: UserId, id: OrderId) -> Result<(), RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        let mut tables = self.write()?;
        if !tables.orders.get(&id).is_some_and(|o| o.user_id == owner) {
            return Err(RepositoryError::NotFound);
        }
        remove_order(&mut tables, id);
        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn list(
        &self,
        filter: &InvoiceFilter,
        filters: &Filters<InvoiceSort>,
    ) -> Result<(Vec<Invoice>, Metadata), RepositoryError> {
        let matching: Vec<Invoice> = self
            .read()?
            .invoices
            .values()
            .filter(|i| filter.order_id.is_none_or(|o| i.order_id == o))
            .filter(|i| filter.status.is_none_or(|s| i.status == s))
            .cloned()
            .collect();
        Ok(paginate(
            matching,
            filters,
            |a, b, key| match key {
                InvoiceSort::Id => a.id.cmp(&b.id),
                InvoiceSort::Status => a.status.as_str().cmp(b.status.as_str()),
                InvoiceSort::CreatedAt => a.created_at.cmp(&b.created_at),
            },
            |i| i.id.as_i64(),
        ))
    }

    async fn get(&self, id: InvoiceId) -> Result<Invoice, RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        self.read()?
            .invoices
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn insert(&self, invoice: &NewInvoice) -> Result<Created<InvoiceId>, RepositoryError> {
        let mut tables = self.write()?;
        if !tables.orders.contains_key(&invoice.order_id) {
            return Err(RepositoryError::MissingReference { field: "order_id" });
        }
        let id = InvoiceId::new(tables.next_id());
        let created_at = Utc::now();
        tables.invoices.insert(
            id,
            Invoice {
                id,
                order_id: invoice.order_id,
                created_at,
                status: invoice.status,
                version: 1,
            },
        );
        Ok(created(id, created_at))
    }

    async fn update(&self, invoice: &Invoice) -> Result<i32, RepositoryError> {
        let mut tables = self.write()?;
        if !tables.orders.contains_key(&invoice.order_id) {
            return Err(RepositoryError::MissingReference { field: "order_id" });
        }
        let stored = tables
            .invoices
            .get_mut(&invoice.id)
            .filter(|i| i.version == invoice.version)
            .ok_or(RepositoryError::EditConflict)?;
        stored.order_id = invoice.order_id;
        stored.status = invoice.status;
        stored.version += 1;
        Ok(stored.version)
    }

    async fn delete(&self, id: InvoiceId) -> Result<(), RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        self.write()?
            .invoices
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl StoreHealth for InMemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.read().map(|_| ())
    }
}
