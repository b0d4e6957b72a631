use ferrous_factory::*;
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_machines_built_by_machines_are_adopted() {
    let greeting = Name::<String>::of("greeting");
    let target = greeting.clone();
    let factory = Factory::builder()
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            Name::<dyn FactoryMachine>::of("generated"),
            BoxKind::Boundless,
            BillOfMaterials::new(),
            move |_| {
                let machine: Arc<dyn FactoryMachine> =
                    Arc::new(SingletonFactoryMachine::of(0, target.clone(), "from a built machine".to_string()));
                Ok(machine)
            },
        ))
        .build()
        .unwrap();

    assert_eq!(*factory.require(&greeting).unwrap(), "from a built machine");
    assert!(factory.dump().contains("MachineFactories"));
}

#[test]
fn test_machine_rounds_reach_a_fixpoint() {
    // round 1 builds "level1", whose machine builds "level2", which serves the string
    let answer = Name::<String>::of("answer");
    let level2_target = answer.clone();
    let level1 = move |_: &BuildContext<'_>| {
        let target = level2_target.clone();
        let level2: Arc<dyn FactoryMachine> = Arc::new(SingleNameFactoryMachine::from_fn(
            0,
            Name::<dyn FactoryMachine>::of("level2"),
            BoxKind::Boundless,
            BillOfMaterials::new(),
            move |_| {
                let leaf: Arc<dyn FactoryMachine> =
                    Arc::new(SingletonFactoryMachine::of(0, target.clone(), "42".to_string()));
                Ok(leaf)
            },
        ));
        Ok(level2)
    };
    let factory = Factory::builder()
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            Name::<dyn FactoryMachine>::of("level1"),
            BoxKind::Boundless,
            BillOfMaterials::new(),
            level1,
        ))
        .build()
        .unwrap();

    assert_eq!(*factory.require(&answer).unwrap(), "42");
}

#[test]
fn test_unsatisfiable_built_machine_fails_the_build() {
    let missing = Name::<String>::of("missing");
    let q = Query::by_name(&missing);
    let result = Factory::builder()
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            Name::<dyn FactoryMachine>::of("needy"),
            BoxKind::Boundless,
            BillOfMaterials::new().with(q),
            |_| -> FactoryResult<Arc<dyn FactoryMachine>> { Err(FactoryError::other("unreachable")) },
        ))
        .build();

    assert!(matches!(result, Err(FactoryError::Unsatisfied { .. })));
}

#[test]
fn test_machine_errors_are_wrapped_with_component_name() {
    let name = Name::<u32>::of("broken");
    let factory = Factory::builder()
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            name.clone(),
            BoxKind::Boundless,
            BillOfMaterials::new(),
            |_| Err(FactoryError::other("database unreachable")),
        ))
        .build()
        .unwrap();

    match factory.get_component(&name) {
        Err(FactoryError::BuildFailed { name, message }) => {
            assert!(name.contains("broken"));
            assert_eq!(message, "database unreachable");
        }
        other => panic!("expected BuildFailed, got {:?}", other.map(|o| o.is_some())),
    }
}

#[test]
fn test_machine_panic_becomes_build_failure() {
    init_tracing();
    let name = Name::<u32>::of("panicky");
    let factory = Factory::builder()
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            name.clone(),
            BoxKind::Boundless,
            BillOfMaterials::new(),
            |_| -> FactoryResult<Arc<u32>> { panic!("machine exploded") },
        ))
        .add_machine(SingletonFactoryMachine::of(0, Name::<u32>::of("fine"), 1u32))
        .build()
        .unwrap();

    match factory.get_component(&name) {
        Err(FactoryError::BuildFailed { message, .. }) => assert!(message.contains("machine exploded")),
        other => panic!("expected BuildFailed, got {:?}", other.map(|o| o.is_some())),
    }
    // the build lock was released
    assert_eq!(*factory.require(&Name::<u32>::of("fine")).unwrap(), 1);
}

struct Liar;

impl FactoryMachine for Liar {
    fn priority(&self) -> i32 {
        0
    }

    fn can_build(&self, name: &AnyName) -> bool {
        name.name() == "asked"
    }

    fn name_buildable_components(&self, _ty: &ComponentType) -> Vec<AnyName> {
        Vec::new()
    }

    fn new_component(&self, _ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        Ok(Some(BoxKind::Boundless.wrap(NamedComponent::new(Name::<u32>::of("delivered"), Arc::new(0u32)))))
    }
}

#[test]
fn test_box_with_wrong_name_is_rejected() {
    let factory = Factory::builder().add_machine(Liar).build().unwrap();
    assert!(matches!(
        factory.get_component(&Name::<u32>::of("asked")),
        Err(FactoryError::NameMismatch { .. })
    ));
    assert!(factory.warehouse().is_empty());
}

#[test]
fn test_machine_returning_nothing_falls_through() {
    struct Declines;
    impl FactoryMachine for Declines {
        fn priority(&self) -> i32 {
            -1
        }
        fn can_build(&self, name: &AnyName) -> bool {
            name.name() == "n"
        }
        fn name_buildable_components(&self, _ty: &ComponentType) -> Vec<AnyName> {
            Vec::new()
        }
        fn new_component(&self, _ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
            Ok(None)
        }
    }

    let n = Name::<u32>::of("n");
    let factory = Factory::builder()
        .add_machine(Declines)
        .add_machine(SingletonFactoryMachine::of(0, n.clone(), 5u32))
        .build()
        .unwrap();
    assert_eq!(*factory.require(&n).unwrap(), 5);
}

#[test]
fn test_metrics_observer_counts_builds_and_failures() {
    init_tracing();
    let metrics = Arc::new(MetricsObserver::new());
    let ok = Name::<u32>::of("ok");
    let bad = Name::<u32>::of("bad");
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, ok.clone(), 1u32))
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            bad.clone(),
            BoxKind::Boundless,
            BillOfMaterials::new(),
            |_| Err(FactoryError::other("nope")),
        ))
        .add_observer(metrics.clone())
        .add_observer(Arc::new(TracingObserver::new()))
        .build()
        .unwrap();

    factory.require(&ok).unwrap();
    factory.require(&ok).unwrap();
    assert!(factory.get_component(&bad).is_err());

    assert_eq!(metrics.build_count(), 1);
    assert_eq!(metrics.failure_count(), 1);
    assert_eq!(metrics.stats(ok.erase()).unwrap().count, 1);
    assert!(metrics.total_build_time() < Duration::from_secs(5));
}

#[test]
fn test_warehouse_records_build_information() {
    let n = Name::<u32>::of("n");
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, n.clone(), 3u32))
        .build()
        .unwrap();
    factory.require(&n).unwrap();

    let info = factory.warehouse().stored_box_info(n.erase()).unwrap();
    assert_eq!(info.name, n.clone().into_any());
    assert!(info.dependencies.is_empty());
    assert!(info.description.contains("Boundless"));
    assert_eq!(factory.warehouse().list_names(), vec![n.into_any()]);
}

struct Pool {
    open: std::sync::atomic::AtomicBool,
}

impl Pool {
    fn is_open(&self) -> bool {
        self.open.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Dispose for Pool {
    fn dispose(&self) -> FactoryResult<()> {
        self.open.store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

struct PoolEngine {
    name: Name<Pool>,
    pool: Arc<Pool>,
}

impl MachineEngine for PoolEngine {
    fn name(&self) -> &AnyName {
        self.name.erase()
    }

    fn bill_of_materials(&self) -> BillOfMaterials {
        BillOfMaterials::new()
    }

    fn new_component(&self, _ctx: &BuildContext<'_>) -> FactoryResult<Box<dyn ComponentBox>> {
        Ok(BoxKind::Boundless.wrap_disposing(NamedComponent::new(self.name.clone(), self.pool.clone())))
    }
}

/// A pool, and a machine-built machine serving the pool's state through it.
fn pool_backed_builder(pool: &Arc<Pool>) -> FactoryBuilder {
    let pool_name = Name::<Pool>::of("pool");
    let q = Query::by_name(&pool_name);
    Factory::builder()
        .add_machine(SingleNameFactoryMachine::new(
            0,
            PoolEngine {
                name: pool_name,
                pool: pool.clone(),
            },
        ))
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            Name::<dyn FactoryMachine>::of("pool-status"),
            BoxKind::Boundless,
            BillOfMaterials::new().with(q.clone()),
            move |ctx| {
                let pool = ctx.satisfied().one(&q)?;
                let machine: Arc<dyn FactoryMachine> = Arc::new(SingleNameFactoryMachine::from_fn(
                    0,
                    Name::<bool>::of("pool.open"),
                    BoxKind::Boundless,
                    BillOfMaterials::new(),
                    move |_| Ok(Arc::new(pool.is_open())),
                ));
                Ok(machine)
            },
        ))
}

#[test]
fn test_adopted_machine_dependencies_outlive_the_build() {
    let pool = Arc::new(Pool {
        open: std::sync::atomic::AtomicBool::new(true),
    });
    let factory = pool_backed_builder(&pool).build().unwrap();

    assert!(pool.is_open());
    assert!(*factory.require(&Name::<bool>::of("pool.open")).unwrap());
    assert!(factory.dump().contains("BOOTSTRAP WAREHOUSE"));

    factory.close().unwrap();
    assert!(!pool.is_open());
}

#[test]
fn test_dropping_the_factory_releases_adopted_machine_dependencies() {
    let pool = Arc::new(Pool {
        open: std::sync::atomic::AtomicBool::new(true),
    });
    let factory = pool_backed_builder(&pool).build().unwrap();
    assert!(pool.is_open());

    drop(factory);
    assert!(!pool.is_open());
}
