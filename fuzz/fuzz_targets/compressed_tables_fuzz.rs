#![no_main]
use libfuzzer_sys::fuzz_target;
use thicket::table::{Action, CompressedTables, DenseTablesBuilder, ParseTables};

fuzz_target!(|data: &[u8]| {
    let [states, tokens, cells @ ..] = data else {
        return;
    };
    let states = usize::from(*states % 8) + 1;
    let tokens = usize::from(*tokens % 6) + 1;

    // The last state is reserved for accepting: only gotos enter it.
    let accepting = states - 1;
    let shift_targets = accepting.max(1);

    let mut builder = DenseTablesBuilder::new(states, tokens, 1).rule(0, 1);
    for (index, &byte) in cells.iter().take(states * tokens).enumerate() {
        let (state, token) = (index / tokens, index % tokens);
        let action = match byte % 4 {
            0 => Action::Error,
            1 if state == accepting && state != 0 => Action::Accept,
            1 | 2 => Action::Reduce(0),
            _ => Action::Shift(usize::from(byte >> 2) % shift_targets),
        };
        builder = builder.action(state, token, action);
    }
    for state in 0..states {
        builder = builder.goto(state, 0, state);
    }
    let Ok(dense) = builder.build() else {
        return;
    };

    let compressed = CompressedTables::from_dense(&dense);
    for state in 0..states {
        for token in 0..tokens {
            assert_eq!(dense.action(state, token), compressed.action(state, token));
        }
        assert_eq!(dense.goto(state, 0), compressed.goto(state, 0));
    }
});
