//! # ferrous-factory
//!
//! A pluggable, priority-ordered component factory: typed, named components
//! are resolved on demand, built at most once, and memoized in a warehouse.
//!
//! ## Features
//!
//! - **Pluggable machines**: every component comes from a [`FactoryMachine`]; the lowest priority value wins
//! - **Exact typed names**: a [`Name<T>`] is a component type plus a string, trait objects included
//! - **Pull-based resolution**: machines declare a bill of materials that the factory satisfies recursively
//! - **Lifecycle boxes**: boundless (shared) or disposable (single pick) components, closed with the factory
//! - **Overlays**: caller-owned machine lists for scoped substitution, e.g. in tests
//! - **Customizers**: decorate or replace components right after they are built
//! - **Cycle detection**: dependency cycles fail fast with the offending path
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_factory::*;
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let db = Name::<Database>::of("db");
//! let users = Name::<UserService>::of("users");
//! let db_query = Query::by_name(&db);
//!
//! let factory = Factory::builder()
//!     .add_machine(SingletonFactoryMachine::of(
//!         0,
//!         db.clone(),
//!         Database { url: "mongodb://localhost".to_string() },
//!     ))
//!     .add_machine(SingleNameFactoryMachine::from_fn(
//!         0,
//!         users.clone(),
//!         BoxKind::Boundless,
//!         BillOfMaterials::new().with(db_query.clone()),
//!         move |ctx| {
//!             Ok(Arc::new(UserService {
//!                 db: ctx.satisfied().one(&db_query)?,
//!             }))
//!         },
//!     ))
//!     .build()
//!     .unwrap();
//!
//! let service = factory.require(&users).unwrap();
//! assert_eq!(service.db.url, "mongodb://localhost");
//!
//! // built once, then served from the warehouse
//! assert!(Arc::ptr_eq(&service, &factory.require(&users).unwrap()));
//! ```
//!
//! ## Trait components
//!
//! ```rust
//! use ferrous_factory::*;
//! use std::sync::Arc;
//!
//! trait Route: Send + Sync {
//!     fn path(&self) -> &str;
//! }
//!
//! struct Health;
//! impl Route for Health {
//!     fn path(&self) -> &str {
//!         "/health"
//!     }
//! }
//!
//! struct Users;
//! impl Route for Users {
//!     fn path(&self) -> &str {
//!         "/users"
//!     }
//! }
//!
//! let health: Arc<dyn Route> = Arc::new(Health);
//! let users: Arc<dyn Route> = Arc::new(Users);
//! let factory = Factory::builder()
//!     .add_machine(SingletonFactoryMachine::new(0, NamedComponent::new(Name::of("health"), health)))
//!     .add_machine(SingletonFactoryMachine::new(0, NamedComponent::new(Name::of("users"), users)))
//!     .build()
//!     .unwrap();
//!
//! let paths: Vec<String> = factory
//!     .get_components::<dyn Route>()
//!     .unwrap()
//!     .iter()
//!     .map(|r| r.path().to_string())
//!     .collect();
//! assert_eq!(paths, vec!["/health", "/users"]);
//!
//! // two candidates: a unique lookup is ambiguous
//! assert!(matches!(factory.find_unique::<dyn Route>(), Err(FactoryError::Ambiguous { .. })));
//! ```
//!
//! ## Overriding in tests
//!
//! ```rust
//! use ferrous_factory::*;
//!
//! let clock = Name::<u64>::of("clock");
//! let overlay = LocalMachines::new("test");
//! let _fixed = overlay.install(SingletonFactoryMachine::of(-10000, clock.clone(), 42u64));
//!
//! let factory = Factory::builder()
//!     .add_machine(SingletonFactoryMachine::of(0, clock.clone(), 1_700_000_000u64))
//!     .add_local_machines(&overlay)
//!     .build()
//!     .unwrap();
//! assert_eq!(*factory.require(&clock).unwrap(), 42);
//! ```

// Module declarations
pub mod activation;
pub mod component_box;
pub mod customizer;
pub mod error;
pub mod factory;
pub mod lifetime;
pub mod machine;
pub mod metrics;
pub mod name;
pub mod observer;
pub mod overlay;
pub mod query;
pub mod registry;
pub mod traits;
pub mod warehouse;

#[cfg(feature = "config")]
pub mod config;

#[cfg(feature = "graph-export")]
pub mod graph_export;

// Internal modules
mod internal;

// Re-export core types
pub use activation::{activation_key, activation_name, DeactivationFactoryMachine, ACTIVATION_PREFIX, DEACTIVATION_PRIORITY};
pub use component_box::{BoundlessComponentBox, ComponentBox, ComponentBoxWrapper, ComponentTransform, DisposableComponentBox};
pub use customizer::{ComponentCustomizer, ComponentCustomizerEngine, TypedCustomizer};
pub use error::{FactoryError, FactoryResult};
pub use factory::{BoundQuery, BuildContext, Factory, FactoryBuilder};
pub use lifetime::BoxKind;
pub use machine::{
    DefaultFactoryMachine, EnvVarFactoryMachine, FactoryMachine, FactoryMachineWrapper, FactoryMachineWrapperBuilder,
    MachineEngine, MachineRef, SingleNameFactoryMachine, SingletonFactoryMachine, StdMachineEngine,
    WarehouseProvidersMachine, ENV_MACHINE_PRIORITY, WAREHOUSE_PROVIDERS_PRIORITY,
};
pub use metrics::{MetricsObserver, TimingStats};
pub use name::{AnyArc, AnyComponent, AnyName, ComponentType, Name, NamedComponent};
pub use observer::{FactoryObserver, TracingObserver};
pub use overlay::{LocalMachines, MachineSource, OverlayGuard, OverlayRegistry, ThreadLocalMachines};
pub use query::{AnyQuery, BillOfMaterials, Query, QuerySelector, SatisfiedBom};
pub use registry::{MachineRegistration, FACTORY_MACHINES};
pub use traits::{AutoStartable, Dispose, Resolver, ResolverCore};
pub use warehouse::{StoredBox, StoredBoxInfo, Warehouse, WarehouseFilter};
