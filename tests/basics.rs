use ferrous_factory::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Config {
    port: u16,
}

#[derive(Debug)]
struct Server {
    config: Arc<Config>,
    name: String,
}

fn server_machine(config_name: &Name<Config>, server_name: &Name<Server>) -> SingleNameFactoryMachine {
    let config_query = Query::by_name(config_name);
    SingleNameFactoryMachine::from_fn(
        0,
        server_name.clone(),
        BoxKind::Boundless,
        BillOfMaterials::new().with(config_query.clone()),
        move |ctx| {
            Ok(Arc::new(Server {
                config: ctx.satisfied().one(&config_query)?,
                name: "MyServer".to_string(),
            }))
        },
    )
}

#[test]
fn test_singleton_machine_serves_same_instance() {
    let answer = Name::<usize>::of("answer");
    let greeting = Name::<String>::of("greeting");
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, answer.clone(), 42usize))
        .add_machine(SingletonFactoryMachine::of(0, greeting.clone(), "hello".to_string()))
        .build()
        .unwrap();

    let num1 = factory.require(&answer).unwrap();
    let num2 = factory.require(&answer).unwrap();
    let str1 = factory.require(&greeting).unwrap();

    assert_eq!(*num1, 42);
    assert_eq!(*str1, "hello");
    assert!(Arc::ptr_eq(&num1, &num2));
}

#[test]
fn test_bill_of_materials_is_satisfied_from_same_factory() {
    let config = Name::<Config>::of("config");
    let server = Name::<Server>::of("server");
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, config.clone(), Config { port: 8080 }))
        .add_machine(server_machine(&config, &server))
        .build()
        .unwrap();

    let s = factory.require(&server).unwrap();
    assert_eq!(s.config.port, 8080);
    assert_eq!(s.name, "MyServer");

    // the config was built as a dependency and recorded as such
    assert!(factory.warehouse().contains(config.erase()));
    assert_eq!(factory.warehouse().list_dependencies(server.erase()), vec![config.clone().into_any()]);
}

#[test]
fn test_missing_mandatory_dependency_is_unsatisfied() {
    let config = Name::<Config>::of("config");
    let server = Name::<Server>::of("server");
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, Name::<Config>::of("other-config"), Config { port: 1 }))
        .add_machine(server_machine(&config, &server))
        .build()
        .unwrap();

    match factory.get_component(&server) {
        Err(FactoryError::Unsatisfied { query, required_by, similar }) => {
            assert!(query.contains("config"));
            assert!(required_by.unwrap().contains("server"));
            assert_eq!(similar.len(), 1);
            assert!(similar[0].contains("other-config"));
        }
        other => panic!("expected Unsatisfied, got {:?}", other.map(|o| o.is_some())),
    }
    assert!(!factory.warehouse().contains(server.erase()));
}

#[test]
fn test_lowest_priority_wins() {
    let name = Name::<String>::of("mode");
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, name.clone(), "default".to_string()))
        .add_machine(SingletonFactoryMachine::of(-100, name.clone(), "override".to_string()))
        .add_machine(SingletonFactoryMachine::of(100, name.clone(), "fallback".to_string()))
        .build()
        .unwrap();

    assert_eq!(*factory.require(&name).unwrap(), "override");
    // overridden machines appear as such in the dump
    let dump = factory.dump();
    assert!(dump.contains("OVERRIDING"));
    assert!(dump.contains("= WAREHOUSE"));
}

#[test]
fn test_unregistered_name_is_empty_result() {
    let factory = Factory::builder().build().unwrap();

    assert!(factory.get_named_component(&Name::<u8>::of("x")).unwrap().is_none());
    assert!(factory.get_components::<u8>().unwrap().is_empty());
    assert!(factory.find_unique::<u8>().unwrap().is_none());
    assert!(matches!(factory.require_unique::<u8>(), Err(FactoryError::NotFound(_))));
}

#[test]
fn test_same_type_different_names_and_ambiguity() {
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, Name::<String>::of("first"), "1".to_string()))
        .add_machine(SingletonFactoryMachine::of(0, Name::<String>::of("second"), "2".to_string()))
        .build()
        .unwrap();

    let all = factory.get_named_components::<String>().unwrap();
    let names: Vec<&str> = all.iter().map(|c| c.name().name()).collect();
    assert_eq!(names, vec!["first", "second"]);

    match factory.find_unique::<String>() {
        Err(FactoryError::Ambiguous { candidates, .. }) => {
            assert_eq!(candidates.len(), 2);
            assert!(candidates[0].contains("first"));
            assert!(candidates[1].contains("second"));
            assert!(candidates[0].contains("activation::"));
        }
        other => panic!("expected Ambiguous, got {:?}", other.map(|o| o.is_some())),
    }
}

#[test]
fn test_type_matching_is_exact() {
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, Name::<u32>::of("n"), 1u32))
        .build()
        .unwrap();

    assert!(factory.get_components::<u64>().unwrap().is_empty());
    assert!(factory.get_component(&Name::<u64>::of("n")).unwrap().is_none());
    assert_eq!(factory.get_components::<u32>().unwrap().len(), 1);
}

#[test]
fn test_machine_builds_once_across_lookups() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let name = Name::<String>::of("expensive");
    let factory = Factory::builder()
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            name.clone(),
            BoxKind::Boundless,
            BillOfMaterials::new(),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new("built".to_string()))
            },
        ))
        .build()
        .unwrap();

    factory.require(&name).unwrap();
    factory.get_components::<String>().unwrap();
    factory.query_by_name(&name).find().unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_bound_queries() {
    let a = Name::<i64>::of("a");
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, a.clone(), 1i64))
        .add_machine(SingletonFactoryMachine::of(0, Name::<i64>::of("b"), 2i64))
        .build()
        .unwrap();

    let by_name = factory.query_by_name(&a);
    assert_eq!(by_name.find_names(), vec![a.clone().into_any()]);
    assert_eq!(**by_name.find_one().unwrap().unwrap().component(), 1);

    let by_type = factory.query_by_type::<i64>();
    assert_eq!(by_type.find_names().len(), 2);
    // listing names builds nothing
    assert_eq!(factory.warehouse().len(), 1);
    assert!(matches!(by_type.find_one(), Err(FactoryError::Ambiguous { .. })));

    let none = factory.query_by_type::<u8>().mandatory();
    assert!(matches!(none.find(), Err(FactoryError::Unsatisfied { .. })));
}

#[test]
fn test_check_satisfy_walks_bill_of_materials_without_building() {
    let config = Name::<Config>::of("config");
    let server = Name::<Server>::of("server");
    let factory = Factory::builder()
        .add_machine(server_machine(&config, &server))
        .build()
        .unwrap();

    let err = factory.check_satisfy(server.erase()).unwrap_err();
    assert!(matches!(err, FactoryError::Unsatisfied { .. }));
    assert!(factory.warehouse().is_empty());

    let factory = factory.concat(SingletonFactoryMachine::of(0, config.clone(), Config { port: 1 }));
    factory.check_satisfy(server.erase()).unwrap();
    assert!(factory.warehouse().is_empty());
    assert_eq!(factory.require(&server).unwrap().config.port, 1);
}

#[test]
fn test_concat_uses_fresh_warehouse() {
    let n = Name::<u32>::of("n");
    let base = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, n.clone(), 1u32))
        .build()
        .unwrap();
    base.require(&n).unwrap();

    let extended = base.concat(SingletonFactoryMachine::of(0, Name::<u32>::of("m"), 2u32));
    assert_eq!(extended.machine_count(), base.machine_count() + 1);
    assert!(extended.warehouse().is_empty());
    assert_eq!(extended.get_components::<u32>().unwrap().len(), 2);
    assert_ne!(base.id(), extended.id());
}

#[test]
fn test_build_context_records_ad_hoc_lookups() {
    let base = Name::<u32>::of("base");
    let derived = Name::<u32>::of("derived");
    let lookup = base.clone();
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::of(0, base.clone(), 20u32))
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            derived.clone(),
            BoxKind::Boundless,
            BillOfMaterials::new(),
            move |ctx| Ok(Arc::new(*ctx.require(&lookup)? + 1)),
        ))
        .build()
        .unwrap();

    assert_eq!(*factory.require(&derived).unwrap(), 21);
    assert_eq!(factory.warehouse().list_dependencies(derived.erase()), vec![base.into_any()]);
}

#[test]
fn test_start_runs_auto_startables() {
    struct Service {
        started: AtomicUsize,
    }
    impl AutoStartable for Service {
        fn start(&self) -> FactoryResult<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let service = Arc::new(Service { started: AtomicUsize::new(0) });
    let startable: Arc<dyn AutoStartable> = service.clone();
    let factory = Factory::builder()
        .add_machine(SingletonFactoryMachine::new(
            0,
            NamedComponent::new(Name::<dyn AutoStartable>::of("service"), startable),
        ))
        .build()
        .unwrap();

    factory.start().unwrap();
    assert_eq!(service.started.load(Ordering::SeqCst), 1);
}

#[test]
fn test_default_machine_dispatches_by_name() {
    let a = Name::<String>::of("a");
    let b = Name::<String>::of("b");
    let machine = DefaultFactoryMachine::new(0)
        .with_engine(StdMachineEngine::new(a.clone(), BoxKind::Boundless, BillOfMaterials::new(), |_| {
            Ok(Arc::new("A".to_string()))
        }))
        .with_engine(StdMachineEngine::new(b.clone(), BoxKind::Boundless, BillOfMaterials::new(), |_| {
            Ok(Arc::new("B".to_string()))
        }));
    let factory = Factory::builder().add_machine(machine).build().unwrap();

    assert_eq!(*factory.require(&a).unwrap(), "A");
    assert_eq!(*factory.require(&b).unwrap(), "B");
    assert_eq!(factory.buildable_names(&ComponentType::of::<String>()).len(), 2);
}
