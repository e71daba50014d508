#![no_main]
use libfuzzer_sys::fuzz_target;
use thicket::glr::{GlrConfig, GlrParser};
use thicket::testing::{SumSemantics, ambiguous_sum};

fuzz_target!(|data: &[u8]| {
    let tables = ambiguous_sum();
    let config = GlrConfig {
        max_branches: 64,
        verify_each_token: true,
        ..GlrConfig::default()
    };
    let mut parser = GlrParser::with_config(&tables, SumSemantics, (), config);

    // Low two bits pick the token, the rest is the value.
    for &byte in data {
        let token = usize::from(byte & 0b11) % 3;
        if parser.parse(token, i64::from(byte >> 2)).is_err() {
            break;
        }
    }

    if let Ok(parses) = parser.finish(0) {
        let first = parses[0].value.eval();
        assert!(parses.iter().all(|parse| parse.value.eval() == first));
    }
    assert_eq!(parser.live_pieces(), 0);
});
