#![no_main]

use ferrous_factory::config::{
    Config, ConfigSupplier, JsonConfigSupplier, PropertiesConfigSupplier, YamlConfigSupplier,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Parsers may reject input but must never panic
    let parsed: Vec<Vec<_>> = [
        PropertiesConfigSupplier::parse("fuzz", source).map(|s| s.elements()),
        JsonConfigSupplier::parse("fuzz", source).map(|s| s.elements()),
        YamlConfigSupplier::parse("fuzz", source).map(|s| s.elements()),
    ]
    .into_iter()
    .flatten()
    .collect();

    for elements in parsed {
        let config = Config::of(elements.clone());
        assert!(config.len() <= elements.len());
        for element in &elements {
            // the first element for a key wins
            let kept = config.element(&element.key).unwrap();
            let first = elements.iter().find(|e| e.key == element.key).unwrap();
            assert_eq!(kept.value, first.value);
        }
    }
});
