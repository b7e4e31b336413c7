//! Router coordinator
//!
//! Owns the authoritative `id → rule` store and serves lock-free reads
//! from the latest published [`RouteSnapshot`]. Mutations go through
//! `on_add`/`on_delete`, which update the store under the coordinator
//! lock and arm (or push out) a debounce window; when the window runs
//! out, a background waiter rebuilds the snapshot from a clone of the
//! store and publishes it atomically.
//!
//! The timer has three states: idle (no deadline), armed (deadline set,
//! waiter sleeping) and firing (waiter holds the lock and rebuilds).
//! Every mutation in the armed state restarts the full window. A zero
//! window publishes synchronously inside the mutating call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use fluxgate_core::{Error, Result, RouteAction, RouteConfig, RouteRequest, RouteRule};

use crate::key::trie_key;
use crate::snapshot::{RouteSnapshot, SnapshotHolder};

/// Default merge window for coalescing mutation bursts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Coordinator handle; cheap to clone and share across tasks.
#[derive(Clone)]
pub struct RouterCoordinator {
    shared: Arc<Shared>,
}

struct Shared {
    active: SnapshotHolder,
    inner: Mutex<Inner>,
    debounce: Duration,
    dynamic: bool,
}

struct Inner {
    /// Authoritative rule store; duplicate ids overwrite.
    store: HashMap<String, RouteRule>,
    /// Armed debounce deadline; `None` while idle.
    deadline: Option<Instant>,
}

impl RouterCoordinator {
    /// Create a coordinator with the default merge window.
    pub fn new(config: RouteConfig) -> Self {
        Self::with_debounce(config, DEFAULT_DEBOUNCE)
    }

    /// Create a coordinator, build the initial snapshot synchronously and
    /// publish it.
    ///
    /// With a non-zero `debounce`, `on_add`/`on_delete` must be called
    /// from within a Tokio runtime so the waiter task can be spawned.
    pub fn with_debounce(config: RouteConfig, debounce: Duration) -> Self {
        let mut store = HashMap::with_capacity(config.routes.len());
        for rule in config.routes {
            store.insert(rule.id.clone(), rule);
        }

        let shared = Arc::new(Shared {
            active: SnapshotHolder::new(),
            inner: Mutex::new(Inner {
                store,
                deadline: None,
            }),
            debounce,
            dynamic: config.dynamic,
        });

        let mut inner = shared.inner.lock().unwrap();
        shared.publish_locked(&mut inner);
        drop(inner);

        Self { shared }
    }

    /// Resolve a request to its route action.
    ///
    /// Header-only rules are consulted first, in build order; otherwise
    /// the request path is matched against the trie of its method.
    pub fn route(&self, req: &RouteRequest) -> Result<RouteAction> {
        let snapshot = self
            .shared
            .active
            .load()
            .ok_or(Error::ConfigurationEmpty)?;

        if let Some(action) = snapshot.route_by_headers(req) {
            return Ok(action.clone());
        }
        Self::match_trie(&snapshot, req.method(), req.path())
    }

    /// Resolve a `(path, method)` pair against the trie alone, skipping
    /// header-only rules. Intended for administrative inspection.
    pub fn route_by_path_and_name(&self, path: &str, method: &str) -> Result<RouteAction> {
        let snapshot = self
            .shared
            .active
            .load()
            .ok_or(Error::ConfigurationEmpty)?;
        Self::match_trie(&snapshot, method, path)
    }

    fn match_trie(snapshot: &RouteSnapshot, method: &str, path: &str) -> Result<RouteAction> {
        let trie = snapshot.method_trie(method).ok_or(Error::NoRouteMatched)?;
        let key = trie_key(method, path);
        match trie.match_path(&key) {
            Some((node, _)) => node.value().cloned().ok_or(Error::NoRouteMatched),
            None => Err(Error::NoRouteMatched),
        }
    }

    /// Insert or replace a rule. Visible at the next publish.
    pub fn on_add(&self, rule: RouteRule) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.store.insert(rule.id.clone(), rule);
        self.schedule_publish(&mut inner);
    }

    /// Remove a rule by id. Visible at the next publish.
    pub fn on_delete(&self, rule: &RouteRule) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.store.remove(&rule.id);
        self.schedule_publish(&mut inner);
    }

    /// Whether the host declared this router dynamically configured.
    /// Carried from the configuration; no effect on matching.
    pub fn is_dynamic(&self) -> bool {
        self.shared.dynamic
    }

    fn schedule_publish(&self, inner: &mut Inner) {
        if self.shared.debounce.is_zero() {
            self.shared.publish_locked(inner);
            return;
        }

        let deadline = Instant::now() + self.shared.debounce;
        let arm = inner.deadline.is_none();
        // Every mutation restarts the full merge window.
        inner.deadline = Some(deadline);
        if arm {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(await_and_publish(shared, deadline));
        }
    }
}

impl Shared {
    fn publish_locked(&self, inner: &mut Inner) {
        let rules: Vec<RouteRule> = inner.store.values().cloned().collect();
        let count = rules.len();
        let snapshot = RouteSnapshot::build(rules);
        self.active.store(Arc::new(snapshot));
        debug!(routes = count, "published route snapshot");
    }
}

/// Waiter task for one armed period: sleeps out the (possibly moving)
/// deadline, then rebuilds and publishes under the coordinator lock.
async fn await_and_publish(shared: Arc<Shared>, mut deadline: Instant) {
    loop {
        tokio::time::sleep_until(deadline).await;

        // The guard stays inside the loop body so it is never held
        // across an await.
        let mut inner = shared.inner.lock().unwrap();
        match inner.deadline {
            Some(d) if d <= Instant::now() => {
                shared.publish_locked(&mut inner);
                inner.deadline = None;
                return;
            }
            // A mutation pushed the deadline out; wait out the fresh
            // window. Deadlines only ever move forward.
            Some(d) => deadline = d,
            None => return,
        }
    }
}
