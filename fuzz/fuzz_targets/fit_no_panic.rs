// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use stasi_core::{CancelToken, Constraints, ExecutionContext, SeriesView};
use stasi_engine::{NoiseScope, Stasi, StasiConfig};

struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn next_u8(&mut self) -> u8 {
        let value = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos = self.pos.saturating_add(1);
        value
    }

    fn next_i16(&mut self) -> i16 {
        i16::from_le_bytes([self.next_u8(), self.next_u8()])
    }
}

fn bounded(seed: u8, lo: usize, hi: usize) -> usize {
    lo + usize::from(seed) % (hi - lo + 1)
}

fn build_value(mode_seed: u8, raw_seed: i16, previous: f64) -> f64 {
    match mode_seed % 6 {
        0 => previous,
        1 => f64::from(raw_seed) / 8.0,
        2 => previous + f64::from(raw_seed % 16) / 64.0,
        3 => f64::from(raw_seed) * 1.0e12,
        4 => f64::from(raw_seed) * 1.0e-12,
        _ => f64::from(raw_seed % 4),
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = ByteCursor::new(data);

    let config = StasiConfig {
        threshold: 0.5 + f64::from(cursor.next_u8()) / 16.0,
        noise_scope: if cursor.next_u8() & 1 == 0 {
            NoiseScope::Global
        } else {
            NoiseScope::PerSegment
        },
        cancel_check_every: bounded(cursor.next_u8(), 0, 8),
    };
    let Ok(detector) = Stasi::new(config) else {
        return;
    };

    let constraints = Constraints {
        max_segments: match cursor.next_u8() % 4 {
            0 => Some(bounded(cursor.next_u8(), 1, 16)),
            _ => None,
        },
        ..Constraints::default()
    };

    let n = bounded(cursor.next_u8(), 0, 255);
    let mut values = Vec::with_capacity(n);
    let mut previous = 0.0;
    for _ in 0..n {
        previous = build_value(cursor.next_u8(), cursor.next_i16(), previous);
        values.push(previous);
    }

    let Ok(view) = SeriesView::new(&values) else {
        return;
    };

    let cancel = CancelToken::new();
    if cursor.next_u8() % 16 == 0 {
        cancel.cancel();
    }
    let ctx = ExecutionContext::new(&constraints).with_cancel(&cancel);

    if let Ok(Some(model)) = detector.analyze(&view, &ctx) {
        for level in 0..model.levels().len() {
            let result = model.result_at(level);
            assert!(result.is_ok(), "every ladder level must materialize");
        }
        let best = model.best();
        assert_eq!(best.fit_function.len(), values.len());
        assert_eq!(best.reconstruct(), best.fit_function);
    }
});
