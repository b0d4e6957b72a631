#![no_main]

use ferrous_factory::*;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

const NODES: usize = 8;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // Each byte pair is one machine: (node, dependency or none)
    let mut builder = Factory::builder();
    for (i, pair) in data.chunks_exact(2).take(32).enumerate() {
        let node = Name::<u64>::of(format!("n{}", pair[0] as usize % NODES));
        let priority = (i % 3) as i32 - 1;
        let machine = if pair[1] % 3 == 0 {
            SingleNameFactoryMachine::from_fn(priority, node, BoxKind::Boundless, BillOfMaterials::new(), |_| {
                Ok(Arc::new(0u64))
            })
        } else {
            let dep = Query::by_name(&Name::<u64>::of(format!("n{}", pair[1] as usize % NODES)));
            let kind = if pair[1] % 5 == 0 { BoxKind::Disposable } else { BoxKind::Boundless };
            SingleNameFactoryMachine::from_fn(priority, node, kind, BillOfMaterials::new().with(dep.clone()), move |ctx| {
                Ok(Arc::new(*ctx.satisfied().one(&dep)? + 1))
            })
        };
        builder = builder.add_machine(machine);
    }
    let Ok(factory) = builder.build() else {
        return;
    };

    for n in 0..NODES {
        let name = Name::<u64>::of(format!("n{}", n));
        match factory.get_component(&name) {
            Ok(_)
            | Err(FactoryError::Cyclic(_))
            | Err(FactoryError::Unsatisfied { .. })
            | Err(FactoryError::BuildFailed { .. }) => {}
            Err(other) => panic!("unexpected error for {}: {}", name, other),
        }
    }
    let _ = factory.get_components::<u64>();
    let _ = factory.dump();
    let _ = factory.close();
});
