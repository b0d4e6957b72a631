use ferrous_factory::*;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Log(Mutex<Vec<String>>);

impl Log {
    fn push(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_string());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct Connection {
    id: &'static str,
    log: Arc<Log>,
}

impl Dispose for Connection {
    fn dispose(&self) -> FactoryResult<()> {
        self.log.push(self.id);
        Ok(())
    }
}

fn connection_machine(name: &'static str, log: &Arc<Log>, deps: BillOfMaterials) -> SingleNameFactoryMachine {
    let log = log.clone();
    SingleNameFactoryMachine::new(0, ClosingEngine { name: Name::of(name), log, deps })
}

struct ClosingEngine {
    name: Name<Connection>,
    log: Arc<Log>,
    deps: BillOfMaterials,
}

impl MachineEngine for ClosingEngine {
    fn name(&self) -> &AnyName {
        self.name.erase()
    }

    fn bill_of_materials(&self) -> BillOfMaterials {
        self.deps.clone()
    }

    fn new_component(&self, _ctx: &BuildContext<'_>) -> FactoryResult<Box<dyn ComponentBox>> {
        let connection = Connection {
            id: leak(self.name.name()),
            log: self.log.clone(),
        };
        Ok(BoxKind::Boundless.wrap_disposing(NamedComponent::new(self.name.clone(), Arc::new(connection))))
    }
}

fn leak(s: &str) -> &'static str {
    Box::leak(s.to_string().into_boxed_str())
}

#[test]
fn test_disposable_box_is_picked_once() {
    let token = Name::<String>::of("token");
    let factory = Factory::builder()
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            token.clone(),
            BoxKind::Disposable,
            BillOfMaterials::new(),
            |_| Ok(Arc::new("secret".to_string())),
        ))
        .build()
        .unwrap();

    assert_eq!(*factory.require(&token).unwrap(), "secret");
    // exhausted boxes stay in the warehouse and are not rebuilt
    assert!(factory.get_component(&token).unwrap().is_none());
    assert!(factory.get_component(&token).unwrap().is_none());
    assert_eq!(factory.warehouse().len(), 1);
}

#[test]
fn test_close_disposes_in_reverse_build_order() {
    let log = Arc::new(Log::default());
    let pool = Name::<Connection>::of("pool");
    let factory = Factory::builder()
        .add_machine(connection_machine("pool", &log, BillOfMaterials::new()))
        .add_machine(connection_machine(
            "repository",
            &log,
            BillOfMaterials::new().with(Query::by_name(&pool)),
        ))
        .build()
        .unwrap();

    factory.require(&Name::<Connection>::of("repository")).unwrap();
    assert!(log.entries().is_empty());

    factory.close().unwrap();
    assert_eq!(log.entries(), vec!["repository".to_string(), "pool".to_string()]);
}

#[test]
fn test_dropping_last_factory_handle_closes_warehouse() {
    let log = Arc::new(Log::default());
    let factory = Factory::builder()
        .add_machine(connection_machine("pool", &log, BillOfMaterials::new()))
        .build()
        .unwrap();
    let clone = factory.clone();

    factory.require(&Name::<Connection>::of("pool")).unwrap();
    drop(factory);
    assert!(log.entries().is_empty());

    drop(clone);
    assert_eq!(log.entries(), vec!["pool".to_string()]);
}

#[test]
fn test_close_failures_are_aggregated() {
    let a = Name::<u8>::of("a");
    let b = Name::<u8>::of("b");
    let failing = |name: Name<u8>| {
        SingleNameFactoryMachine::new(0, FailingClose { name })
    };
    let factory = Factory::builder()
        .add_machine(failing(a.clone()))
        .add_machine(failing(b.clone()))
        .build()
        .unwrap();
    factory.require(&a).unwrap();
    factory.require(&b).unwrap();

    match factory.close() {
        Err(FactoryError::Close(failures)) => assert_eq!(failures.len(), 2),
        other => panic!("expected Close error, got {:?}", other),
    }
    // everything was released despite the failures
    assert!(factory.warehouse().is_empty());
}

struct FailingClose {
    name: Name<u8>,
}

impl MachineEngine for FailingClose {
    fn name(&self) -> &AnyName {
        self.name.erase()
    }

    fn bill_of_materials(&self) -> BillOfMaterials {
        BillOfMaterials::new()
    }

    fn new_component(&self, _ctx: &BuildContext<'_>) -> FactoryResult<Box<dyn ComponentBox>> {
        let name = self.name.name().to_string();
        Ok(BoxKind::Boundless.wrap_closing(NamedComponent::new(self.name.clone(), Arc::new(0u8)), move || {
            Err(FactoryError::other(format!("{} refused to close", name)))
        }))
    }
}

#[test]
fn test_provider_warehouse_is_not_closed_by_child() {
    let log = Arc::new(Log::default());
    let parent = Factory::builder()
        .add_machine(connection_machine("pool", &log, BillOfMaterials::new()))
        .build()
        .unwrap();
    let pool = Name::<Connection>::of("pool");
    let from_parent = parent.require(&pool).unwrap();

    let child = Factory::builder()
        .add_warehouse_provider(parent.warehouse().clone())
        .build()
        .unwrap();
    let from_child = child.require(&pool).unwrap();
    assert!(Arc::ptr_eq(&from_parent, &from_child));
    assert_eq!(child.get_components::<Connection>().unwrap().len(), 1);

    child.close().unwrap();
    assert!(log.entries().is_empty());

    parent.close().unwrap();
    assert_eq!(log.entries(), vec!["pool".to_string()]);
}
