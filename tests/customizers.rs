use ferrous_factory::*;
use std::sync::{Arc, Mutex};

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct Plain;

impl Greeter for Plain {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

struct Shouting(Arc<dyn Greeter>);

impl Greeter for Shouting {
    fn greet(&self) -> String {
        self.0.greet().to_uppercase()
    }
}

struct Exclaiming(Arc<dyn Greeter>);

impl Greeter for Exclaiming {
    fn greet(&self) -> String {
        format!("{}!", self.0.greet())
    }
}

fn greeter_machine(name: &str) -> SingletonFactoryMachine {
    let plain: Arc<dyn Greeter> = Arc::new(Plain);
    SingletonFactoryMachine::new(0, NamedComponent::new(Name::<dyn Greeter>::of(name), plain))
}

fn shout() -> TypedCustomizer<dyn Greeter> {
    TypedCustomizer::for_type(10, |c: NamedComponent<dyn Greeter>| {
        let wrapped: Arc<dyn Greeter> = Arc::new(Shouting(c.component().clone()));
        Ok(NamedComponent::new(c.name().clone(), wrapped))
    })
}

fn exclaim(name: &str) -> TypedCustomizer<dyn Greeter> {
    TypedCustomizer::for_name(Name::of(name), 0, |c: NamedComponent<dyn Greeter>| {
        let wrapped: Arc<dyn Greeter> = Arc::new(Exclaiming(c.component().clone()));
        Ok(NamedComponent::new(c.name().clone(), wrapped))
    })
}

#[test]
fn test_customizers_apply_in_priority_order() {
    let factory = Factory::builder()
        .add_machine(greeter_machine("main"))
        .add_machine(greeter_machine("other"))
        .add_customizer_engine(shout())
        .add_customizer_engine(exclaim("main"))
        .build()
        .unwrap();

    // exclaim (priority 0) runs before shout (priority 10)
    let main = factory.require(&Name::<dyn Greeter>::of("main")).unwrap();
    assert_eq!(main.greet(), "HELLO!");

    let other = factory.require(&Name::<dyn Greeter>::of("other")).unwrap();
    assert_eq!(other.greet(), "HELLO");
}

#[test]
fn test_customized_component_is_cached() {
    let factory = Factory::builder()
        .add_machine(greeter_machine("main"))
        .add_customizer_engine(shout())
        .build()
        .unwrap();

    let a = factory.require(&Name::<dyn Greeter>::of("main")).unwrap();
    let b = factory.require(&Name::<dyn Greeter>::of("main")).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_customizer_engines_can_be_components() {
    let engine: Arc<dyn ComponentCustomizerEngine> = Arc::new(shout());
    let factory = Factory::builder()
        .add_machine(greeter_machine("main"))
        .add_machine(SingletonFactoryMachine::new(
            0,
            NamedComponent::new(Name::<dyn ComponentCustomizerEngine>::of("shout"), engine),
        ))
        .build()
        .unwrap();

    assert_eq!(factory.require(&Name::<dyn Greeter>::of("main")).unwrap().greet(), "HELLO");
}

#[test]
fn test_customizer_failure_fails_the_build() {
    let failing = TypedCustomizer::<dyn Greeter>::for_type(0, |_| Err(FactoryError::other("no greeting today")));
    let factory = Factory::builder()
        .add_machine(greeter_machine("main"))
        .add_customizer_engine(failing)
        .build()
        .unwrap();

    assert!(factory.get_component(&Name::<dyn Greeter>::of("main")).is_err());
    assert!(factory.warehouse().is_empty());
}

#[test]
fn test_customizers_see_disposable_boxes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let token = Name::<String>::of("token");
    let factory = Factory::builder()
        .add_machine(SingleNameFactoryMachine::from_fn(
            0,
            token.clone(),
            BoxKind::Disposable,
            BillOfMaterials::new(),
            |_| Ok(Arc::new("t".to_string())),
        ))
        .add_customizer_engine(TypedCustomizer::for_name(token.clone(), 0, move |c: NamedComponent<String>| {
            record.lock().unwrap().push(c.name().name().to_string());
            Ok(NamedComponent::new(c.name().clone(), Arc::new(format!("{}-customized", c.component()))))
        }))
        .build()
        .unwrap();

    assert_eq!(*factory.require(&token).unwrap(), "t-customized");
    assert!(factory.get_component(&token).unwrap().is_none());
    assert_eq!(*seen.lock().unwrap(), vec!["token".to_string()]);
}

#[test]
fn test_machine_wrapper_transforms_and_reprioritizes() {
    let inner: MachineRef = Arc::new(greeter_machine("main"));
    let wrapped = FactoryMachineWrapper::builder(inner)
        .with_priority(-5)
        .transform_components::<dyn Greeter, _>(|c| {
            let wrapped: Arc<dyn Greeter> = Arc::new(Exclaiming(c.component().clone()));
            NamedComponent::new(c.name().clone(), wrapped)
        })
        .build();
    assert_eq!(wrapped.priority(), -5);

    let factory = Factory::builder()
        .add_machine(greeter_machine("main"))
        .add_machine(wrapped)
        .build()
        .unwrap();

    let greeter = factory.require(&Name::<dyn Greeter>::of("main")).unwrap();
    assert_eq!(greeter.greet(), "hello!");
    assert!(Arc::ptr_eq(&greeter, &factory.require(&Name::<dyn Greeter>::of("main")).unwrap()));
}
