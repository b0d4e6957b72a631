/// Property-based tests for component resolution
///
/// These tests check that priority selection, memoization and name matching
/// hold for arbitrary machine sets.

use ferrous_factory::*;
use proptest::prelude::*;
use std::sync::Arc;

// Property: the machine with the lowest priority value wins; ties go to the first added
proptest! {
    #[test]
    fn lowest_priority_wins(priorities in prop::collection::vec(-50i32..50, 1..12)) {
        let name = Name::<usize>::of("contested");
        let mut builder = Factory::builder();
        for (i, p) in priorities.iter().enumerate() {
            builder = builder.add_machine(SingletonFactoryMachine::of(*p, name.clone(), i));
        }
        let factory = builder.build().unwrap();

        let best = priorities.iter().min().unwrap();
        let expected = priorities.iter().position(|p| p == best).unwrap();
        prop_assert_eq!(*factory.require(&name).unwrap(), expected);
    }
}

// Property: repeated lookups return the same instance and the warehouse holds one box
proptest! {
    #[test]
    fn memoized_resolution(value in "\\PC{0,40}", lookups in 1usize..10) {
        let name = Name::<String>::of("value");
        let factory = Factory::builder()
            .add_machine(SingletonFactoryMachine::of(0, name.clone(), value.clone()))
            .build()
            .unwrap();

        let first = factory.require(&name).unwrap();
        for _ in 0..lookups {
            prop_assert!(Arc::ptr_eq(&first, &factory.require(&name).unwrap()));
        }
        prop_assert_eq!(&*first, &value);
        prop_assert_eq!(factory.warehouse().len(), 1);
    }
}

// Property: names only match exactly
proptest! {
    #[test]
    fn exact_name_matching(registered in "[a-z]{1,8}", asked in "[a-z]{1,8}") {
        let factory = Factory::builder()
            .add_machine(SingletonFactoryMachine::of(0, Name::<u8>::of(registered.clone()), 1u8))
            .build()
            .unwrap();

        let found = factory.get_component(&Name::<u8>::of(asked.clone())).unwrap();
        prop_assert_eq!(found.is_some(), registered == asked);
        prop_assert!(factory.get_component(&Name::<u16>::of(registered)).unwrap().is_none());
    }
}

// Property: a type query returns every distinct name exactly once
proptest! {
    #[test]
    fn type_query_is_deduplicated(names in prop::collection::vec("[a-e]", 0..15)) {
        let mut builder = Factory::builder();
        for (i, n) in names.iter().enumerate() {
            builder = builder.add_machine(SingletonFactoryMachine::of(i as i32, Name::<usize>::of(n.clone()), i));
        }
        let factory = builder.build().unwrap();

        let mut distinct = names.clone();
        distinct.sort();
        distinct.dedup();
        let found = factory.get_named_components::<usize>().unwrap();
        prop_assert_eq!(found.len(), distinct.len());

        let mut found_names: Vec<String> = found.iter().map(|c| c.name().name().to_string()).collect();
        found_names.sort();
        prop_assert_eq!(found_names, distinct);
    }
}
