use ferrous_factory::registry::{list_registrations, registered_machines};
use ferrous_factory::*;
use linkme::distributed_slice;
use std::sync::Arc;

fn motd() -> MachineRef {
    Arc::new(SingletonFactoryMachine::of(
        10,
        Name::<String>::of("motd"),
        "registered at link time".to_string(),
    ))
}

#[distributed_slice(FACTORY_MACHINES)]
static MOTD: MachineRegistration = MachineRegistration {
    name: "tests::motd",
    create: motd,
};

#[test]
fn test_registered_machine_is_listed() {
    assert!(list_registrations().contains(&"tests::motd"));
    assert!(registered_machines().iter().any(|(name, _)| *name == "tests::motd"));
}

#[test]
fn test_registry_machines_join_the_factory() {
    let factory = Factory::builder().add_from_registry().build().unwrap();

    assert_eq!(
        *factory.require(&Name::<String>::of("motd")).unwrap(),
        "registered at link time"
    );
    assert!(factory.dump().contains("Registry"));
}

#[test]
fn test_explicit_machines_override_registry() {
    let factory = Factory::builder()
        .add_from_registry()
        .add_machine(SingletonFactoryMachine::of(0, Name::<String>::of("motd"), "overridden".to_string()))
        .build()
        .unwrap();

    assert_eq!(*factory.require(&Name::<String>::of("motd")).unwrap(), "overridden");
}

#[test]
fn test_each_builder_gets_fresh_machines() {
    let a = Factory::builder().add_from_registry().build().unwrap();
    let b = Factory::builder().add_from_registry().build().unwrap();

    let motd = Name::<String>::of("motd");
    assert!(!Arc::ptr_eq(&a.require(&motd).unwrap(), &b.require(&motd).unwrap()));
}
