// Application layer - Builder session, scheduling and persistence use cases
pub mod binding_scheduler;
pub mod builder_session;
pub mod dashboard_repository;
pub mod fetch_cache;
pub mod local_store;
pub mod notifier;
pub mod persistence_sync;
pub mod render_dispatcher;
pub mod save_queue;

#[cfg(test)]
pub mod testing;
