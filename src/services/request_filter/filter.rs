use crate::debug_if_enabled;
use crate::error::Result;
use crate::events::{RequestDecision, RequestDetails};
use crate::services::host::{Host, RequestInterceptor, Session};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::list::FilterList;

/// Interceptor installed on a session: cancels every request matching the
/// list it was built with.
pub struct FilterInterceptor {
    list: Arc<FilterList>,
    blocked: Arc<AtomicU64>,
}

impl FilterInterceptor {
    fn new(list: Arc<FilterList>, blocked: Arc<AtomicU64>) -> Self {
        Self { list, blocked }
    }

    pub fn list(&self) -> &FilterList {
        &self.list
    }
}

impl RequestInterceptor for FilterInterceptor {
    fn on_before_request(&self, request: &RequestDetails) -> RequestDecision {
        match self.list.first_match(&request.url) {
            Some(pattern) => {
                self.blocked.fetch_add(1, Ordering::Relaxed);
                debug!("blocked url: {} ({})", request.short_url(), pattern);
                RequestDecision::Cancel
            }
            None => RequestDecision::Proceed,
        }
    }
}

struct Registration {
    session: Arc<dyn Session>,
    list: Arc<FilterList>,
}

/// Owns the active filter list and the set of partitions it applies to.
///
/// `enable`/`disable` are the only entry points that resolve partitions
/// against the host; `register`/`unregister` act on a single session.
pub struct RequestFilter {
    host: Arc<dyn Host>,
    partitions: Vec<String>,
    list: RwLock<Arc<FilterList>>,
    enabled: AtomicBool,
    registrations: DashMap<String, Registration>,
    blocked: Arc<AtomicU64>,
}

impl RequestFilter {
    pub fn new(host: Arc<dyn Host>, partitions: Vec<String>, list: FilterList) -> Self {
        Self {
            host,
            partitions,
            list: RwLock::new(Arc::new(list)),
            enabled: AtomicBool::new(false),
            registrations: DashMap::new(),
            blocked: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn list(&self) -> Arc<FilterList> {
        self.list.read().clone()
    }

    pub fn partitions(&self) -> &[String] {
        &self.partitions
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self, partition: &str) -> bool {
        self.registrations.contains_key(partition)
    }

    /// Requests canceled since startup, over all sessions.
    pub fn blocked_count(&self) -> u64 {
        self.blocked.load(Ordering::Relaxed)
    }

    /// Installs the current list on `session`. A session already holding the
    /// current list is left alone; one holding an older list is replaced.
    pub fn register(&self, session: &Arc<dyn Session>) -> Result<()> {
        let partition = session.partition().to_string();
        let list = self.list();

        if let Some(existing) = self.registrations.get(&partition) {
            if Arc::ptr_eq(&existing.session, session)
                && *existing.list == *list
                && session.has_interceptor()
            {
                debug_if_enabled!("Filter already registered on '{}'", partition);
                return Ok(());
            }
        }

        if self.registrations.contains_key(&partition) {
            self.unregister(session)?;
        }

        let interceptor = FilterInterceptor::new(Arc::clone(&list), Arc::clone(&self.blocked));
        session.set_interceptor(Some(Arc::new(interceptor)))?;
        self.registrations.insert(
            partition.clone(),
            Registration {
                session: Arc::clone(session),
                list,
            },
        );
        debug!("register: '{}'", partition);
        Ok(())
    }

    /// Removes the interceptor from `session`.
    pub fn unregister(&self, session: &Arc<dyn Session>) -> Result<()> {
        let partition = session.partition();
        self.registrations.remove(partition);
        if session.is_alive() {
            session.set_interceptor(None)?;
        }
        debug!("unregister: '{}'", partition);
        Ok(())
    }

    /// Registers on every session, skipping (and logging) those that fail.
    /// Returns how many sessions now carry the filter.
    pub fn register_all(&self, sessions: &[Arc<dyn Session>]) -> usize {
        let mut registered = 0;
        for session in sessions {
            match self.register(session) {
                Ok(()) => registered += 1,
                Err(e) => warn!("Skipping session '{}': {}", session.partition(), e),
            }
        }
        registered
    }

    pub fn unregister_all(&self, sessions: &[Arc<dyn Session>]) -> usize {
        let mut unregistered = 0;
        for session in sessions {
            match self.unregister(session) {
                Ok(()) => unregistered += 1,
                Err(e) => warn!("Skipping session '{}': {}", session.partition(), e),
            }
        }
        unregistered
    }

    /// Configured partitions that currently exist on the host.
    pub fn scoped_sessions(&self) -> Vec<Arc<dyn Session>> {
        self.partitions
            .iter()
            .filter_map(|partition| {
                let session = self.host.session(partition);
                if session.is_none() {
                    debug!("No session for partition '{}'", partition);
                }
                session
            })
            .collect()
    }

    /// Sessions currently carrying the filter plus the configured scope,
    /// one per partition.
    fn known_sessions(&self) -> Vec<Arc<dyn Session>> {
        let mut sessions: Vec<Arc<dyn Session>> = self
            .registrations
            .iter()
            .map(|entry| Arc::clone(&entry.value().session))
            .collect();
        for session in self.scoped_sessions() {
            if !sessions.iter().any(|known| known.partition() == session.partition()) {
                sessions.push(session);
            }
        }
        sessions
    }

    pub fn enable(&self) -> usize {
        self.enabled.store(true, Ordering::SeqCst);
        let registered = self.register_all(&self.scoped_sessions());
        info!("enabled {} url filters on {} session(s)", self.list().len(), registered);
        registered
    }

    pub fn disable(&self) -> usize {
        self.enabled.store(false, Ordering::SeqCst);

        // Also covers sessions registered directly, not only the scope.
        let sessions: Vec<Arc<dyn Session>> = self
            .registrations
            .iter()
            .map(|entry| Arc::clone(&entry.value().session))
            .collect();
        let unregistered = self.unregister_all(&sessions);
        info!("disabled url filters on {} session(s)", unregistered);
        unregistered
    }

    /// Replaces the active list. Returns `false` when `list` equals the
    /// current one and nothing changed. While enabled, the filter is
    /// unregistered and registered again so only `list` stays active.
    pub fn set_filter(&self, list: FilterList) -> bool {
        if **self.list.read() == list {
            debug!("setFilter: list unchanged");
            return false;
        }

        let count = list.len();
        *self.list.write() = Arc::new(list);

        if self.is_enabled() {
            let sessions = self.known_sessions();
            self.unregister_all(&sessions);
            let registered = self.register_all(&sessions);
            info!("enabled {} url filters on {} session(s)", count, registered);
        } else {
            debug!("setFilter: stored {} patterns", count);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Bounds;
    use crate::services::host::HeadlessHost;

    const PARTITION: &str = "persist:player";

    fn setup(patterns: &[&str]) -> (Arc<HeadlessHost>, RequestFilter) {
        let host = Arc::new(HeadlessHost::new(vec![PARTITION.to_string()]));
        host.open_window(Bounds::default());
        let list = FilterList::parse("test", patterns).unwrap();
        let filter = RequestFilter::new(host.clone(), vec![PARTITION.to_string()], list);
        (host, filter)
    }

    #[test]
    fn registered_filter_cancels_matching_requests() {
        let (host, filter) = setup(&["*://*.doubleclick.net/*"]);
        assert_eq!(filter.enable(), 1);

        let session = host.headless_session(PARTITION).unwrap();
        assert!(session.fetch("https://ads.doubleclick.net/track").is_cancel());
        assert_eq!(session.fetch("https://youtube.com/watch"), RequestDecision::Proceed);
        assert_eq!(filter.blocked_count(), 1);
    }

    #[test]
    fn set_filter_while_enabled_leaves_only_new_list() {
        let (host, filter) = setup(&["*://*.doubleclick.net/*"]);
        filter.enable();

        let changed = filter.set_filter(FilterList::parse("new", &["*://*.ads.test/*"]).unwrap());
        assert!(changed);

        let session = host.headless_session(PARTITION).unwrap();
        assert_eq!(
            session.fetch("https://ads.doubleclick.net/x"),
            RequestDecision::Proceed
        );
        assert!(session.fetch("https://cdn.ads.test/banner.js").is_cancel());
        assert!(filter.list().sources().eq(["*://*.ads.test/*"]));
    }

    #[test]
    fn set_filter_keeps_sessions_registered_outside_scope() {
        let (host, filter) = setup(&["*://*.doubleclick.net/*"]);
        filter.enable();
        let stray = host.add_session("persist:stray");
        let stray_dyn: Arc<dyn Session> = stray.clone();
        filter.register(&stray_dyn).unwrap();

        assert!(filter.set_filter(FilterList::parse("new", &["*://*.ads.test/*"]).unwrap()));

        assert!(filter.is_registered("persist:stray"));
        assert!(filter.is_registered(PARTITION));
        assert!(stray.fetch("https://cdn.ads.test/banner.js").is_cancel());
        assert_eq!(
            stray.fetch("https://ads.doubleclick.net/x"),
            RequestDecision::Proceed
        );
        let player = host.headless_session(PARTITION).unwrap();
        assert!(player.fetch("https://cdn.ads.test/banner.js").is_cancel());
    }

    #[test]
    fn set_filter_with_same_list_is_noop() {
        let (host, filter) = setup(&["*://*.doubleclick.net/*"]);
        filter.enable();
        let session = host.headless_session(PARTITION).unwrap();
        let installs = session.install_count();

        let same = FilterList::parse("renamed", &["*://*.doubleclick.net/*"]).unwrap();
        assert!(!filter.set_filter(same));
        assert_eq!(session.install_count(), installs);
    }

    #[test]
    fn set_filter_while_disabled_only_stores() {
        let (host, filter) = setup(&["*://*.doubleclick.net/*"]);
        assert!(filter.set_filter(FilterList::parse("new", &["*tracking*"]).unwrap()));

        let session = host.headless_session(PARTITION).unwrap();
        assert!(!session.has_interceptor());
        assert_eq!(filter.list().len(), 1);
    }

    #[test]
    fn register_twice_is_noop() {
        let (host, filter) = setup(&["*://*.doubleclick.net/*"]);
        let session = host.session(PARTITION).unwrap();

        filter.register(&session).unwrap();
        filter.register(&session).unwrap();
        assert_eq!(host.headless_session(PARTITION).unwrap().install_count(), 1);
    }

    #[test]
    fn disable_removes_interceptors() {
        let (host, filter) = setup(&["*://*.doubleclick.net/*"]);
        filter.enable();
        assert!(filter.is_registered(PARTITION));

        assert_eq!(filter.disable(), 1);
        assert!(!filter.is_enabled());
        assert!(!filter.is_registered(PARTITION));
        assert!(!host.headless_session(PARTITION).unwrap().has_interceptor());
    }

    #[test]
    fn disposed_session_is_skipped_not_fatal() {
        let host = Arc::new(HeadlessHost::new(vec![
            PARTITION.to_string(),
            "persist:other".to_string(),
        ]));
        host.open_window(Bounds::default());
        host.headless_session("persist:other").unwrap().dispose();

        let filter = RequestFilter::new(
            host.clone(),
            vec![PARTITION.to_string(), "persist:other".to_string()],
            FilterList::builtin(),
        );
        assert_eq!(filter.enable(), 1);
        assert!(filter.is_registered(PARTITION));
        assert!(!filter.is_registered("persist:other"));
    }

    #[test]
    fn sessions_outside_scope_are_untouched() {
        let (host, filter) = setup(&["*://*.doubleclick.net/*"]);
        let stray = host.add_session("persist:stray");
        filter.enable();
        assert!(!stray.has_interceptor());
    }

    #[test]
    fn enable_before_window_registers_nothing() {
        let host = Arc::new(HeadlessHost::new(vec![PARTITION.to_string()]));
        let filter = RequestFilter::new(host, vec![PARTITION.to_string()], FilterList::builtin());
        assert_eq!(filter.enable(), 0);
        assert!(filter.is_enabled());
    }
}
