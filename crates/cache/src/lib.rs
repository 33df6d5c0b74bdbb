#![warn(clippy::unwrap_used)]

pub mod key;
pub mod local;

pub use key::ScopeKey;
pub use local::LocalCache;

/// Short-lived resolution cache shared by the settings, feature-flag and
/// module stores. Implementations must be safe to call from many threads.
///
/// Writers call `invalidate*` after committing; readers that populate the
/// cache after a store read use `put_if_current` with the generation they
/// observed before the read, so a value loaded before an invalidation is
/// never stored after it.
pub trait ResolutionCache<V>: Send + Sync {
    /// Fresh value for `key`, or `None` when missing or older than the TTL.
    fn get(&self, key: &ScopeKey) -> Option<V>;

    /// Unconditionally store `value`.
    fn put(&self, key: ScopeKey, value: V);

    /// Counter bumped by every invalidation and `clear`.
    fn generation(&self) -> u64;

    /// Store `value` only if no invalidation happened since `generation`
    /// was read. Returns whether the value was stored.
    fn put_if_current(&self, key: ScopeKey, value: V, generation: u64) -> bool;

    /// Drop the entry for exactly this key and tenant.
    fn invalidate(&self, key: &ScopeKey);

    /// Drop the entries of every tenant for a config key.
    fn invalidate_prefix(&self, config_key: &str);

    /// Drop everything.
    fn clear(&self);
}
