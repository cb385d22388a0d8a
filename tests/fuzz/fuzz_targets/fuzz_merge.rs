#![no_main]
use clover_merge::accumulator::Accumulator;
use clover_merge::model::MergeMode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing and merging must not panic on any input.
    let Ok(document) = clover_merge::xml::parse_document(data) else {
        return;
    };
    for mode in [MergeMode::Inclusive, MergeMode::Exclusive, MergeMode::Additive] {
        let mut acc = Accumulator::new(mode);
        acc.parse_all([&document, &document]);
        let _ = acc.to_xml_at(0);
    }
});
