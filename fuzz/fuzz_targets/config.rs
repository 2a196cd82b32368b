#![no_main]

use libfuzzer_sys::fuzz_target;
use mockscope::RuleSet;

fuzz_target!(|data: &[u8]| {
    let _ = RuleSet::parse(data, 1);
});
