//! # Lifecycle Injector - Scoped Dependency Injection with Managed Lifecycles
//!
//! A typed dependency injection container where constructors can declare
//! start and stop hooks, and an [`App`] runs them in order.
//!
//! ## Features
//!
//! - ⚡ **Lock-free registries** - `DashMap` lookups never block each other
//! - 🔒 **Type-safe** - Resolution returns `Arc<T>`; a provider of the wrong type is an error, not a panic
//! - 🏭 **Three provider kinds** - pre-built values, build-once singletons and transient factories
//! - 🔄 **Scoped containers** - Child scopes shadow their parent and fall back to it
//! - 🚦 **Lifecycle hooks** - `on_start` / `on_stop` declared right where a resource is built
//! - ♻️ **Pooled contexts** - Resolution contexts are recycled, not allocated per call
//! - 📊 **Observable** - `tracing` events per scope, with optional JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use lifecycle_injector::prelude::*;
//!
//! struct Config { url: String }
//!
//! struct Repo { config: Arc<Config> }
//!
//! fn new_repo(ctx: &Context) -> Result<Repo, BoxError> {
//!     let config = ctx.inject::<Config>()?;
//!     ctx.on_start(|_| Ok(()));  // open connections
//!     ctx.on_stop(|_| Ok(()));   // close them
//!     Ok(Repo { config })
//! }
//!
//! let app = App::new();
//! provide_value(Config { url: "postgres://localhost".into() }).attach(&app);
//! provide(new_repo).attach(&app);
//!
//! let repo = app.inject::<Repo>().unwrap();
//! assert_eq!(repo.config.url, "postgres://localhost");
//!
//! app.startup().unwrap();
//! app.teardown().unwrap();
//! ```
//!
//! ## Provider Kinds
//!
//! ```rust
//! use lifecycle_injector::prelude::*;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! static COUNTER: AtomicU64 = AtomicU64::new(0);
//!
//! struct Settings { debug: bool }
//! struct RequestId(u64);
//!
//! let app = App::new();
//!
//! // Value - one pre-built instance
//! provide_value(Settings { debug: true }).attach(&app);
//!
//! // Lazy singleton - built on first resolve, then shared
//! provide(|_| Ok(Settings { debug: false })).with_name("fallback").attach(&app);
//!
//! // Factory - a new instance on every resolve
//! provide_factory(|_| Ok(RequestId(COUNTER.fetch_add(1, Ordering::SeqCst)))).attach(&app);
//!
//! let a = app.inject::<RequestId>().unwrap();
//! let b = app.inject::<RequestId>().unwrap();
//! assert_ne!(a.0, b.0);
//! ```
//!
//! ## Scopes
//!
//! ```rust
//! use lifecycle_injector::prelude::*;
//!
//! struct AppName(&'static str);
//! struct Tenant(&'static str);
//!
//! let app = App::new();
//! provide_value(AppName("billing")).attach(&app);
//!
//! let tenant = app.get_scope("tenant-a");
//! provide_value(Tenant("a")).attach(&tenant);
//!
//! // Child sees the root's providers
//! assert!(tenant.contains::<AppName>());
//! assert!(tenant.contains::<Tenant>());
//!
//! // The root never sees a child's
//! assert!(!app.contains::<Tenant>());
//! ```
//!
//! ## Lifecycle
//!
//! [`App::startup`] runs start hooks in registration order (root first, then
//! child scopes in creation order) and stops at the first failure.
//! [`App::teardown`] runs stop hooks in reverse registration order, visits
//! every hook even when some fail, and reports all failures together.
//!
//! A start hook declared after startup (a singleton first resolved later on)
//! runs immediately instead of being queued.

mod app;
mod builder;
mod container;
mod context;
mod error;
mod factory;
mod key;
mod lifecycle;
pub mod logging;
mod provider;
mod resolve;
mod storage;

pub use app::*;
pub use builder::*;
pub use container::*;
pub use context::*;
pub use error::*;
pub use factory::*;
pub use key::*;
pub use lifecycle::*;
pub use provider::*;
pub use resolve::*;

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        App, BoxError, Container, Context, DiError, HookContext, Injectable, LifeState, inject,
        inject_named, invoke, invoke_func, invoke_provide, must_inject, must_inject_named,
        provide, provide_factory, provide_shared, provide_value,
    };
    pub use std::sync::Arc;
}
