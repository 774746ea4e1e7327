// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::borrow::Cow;

/// Diagnostics schema version for fit metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Structured diagnostics captured from one fit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostics {
    pub n: usize,
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub runtime_ms: Option<u64>,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
    pub algorithm: Cow<'static, str>,
    pub noise_scope: Cow<'static, str>,
    pub threshold: Option<f64>,
    pub segments: usize,
    pub pooling_levels: usize,
    pub thread_count: Option<usize>,
    #[cfg(feature = "serde")]
    pub params_json: Option<serde_json::Value>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            n: 0,
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            runtime_ms: None,
            notes: vec![],
            warnings: vec![],
            algorithm: Cow::Borrowed(""),
            noise_scope: Cow::Borrowed(""),
            threshold: None,
            segments: 0,
            pooling_levels: 0,
            thread_count: None,
            #[cfg(feature = "serde")]
            params_json: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics};
    use std::borrow::Cow;

    #[test]
    fn diagnostics_default_sets_schema_and_engine_version() {
        let diagnostics = Diagnostics::default();
        assert_eq!(diagnostics.schema_version, DIAGNOSTICS_SCHEMA_VERSION);
        assert_eq!(
            diagnostics.engine_version,
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
        assert_eq!(diagnostics.algorithm, Cow::Borrowed(""));
        assert!(diagnostics.notes.is_empty());
        assert!(diagnostics.warnings.is_empty());
        assert!(diagnostics.threshold.is_none());
        assert!(diagnostics.runtime_ms.is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn diagnostics_serde_roundtrip_preserves_fields() {
        let diagnostics = Diagnostics {
            n: 200,
            runtime_ms: Some(3),
            notes: vec!["sigma=0.5".to_string()],
            warnings: vec!["mdl curve is monotone".to_string()],
            algorithm: Cow::Owned("stasi".to_string()),
            noise_scope: Cow::Owned("global".to_string()),
            threshold: Some(3.174),
            segments: 2,
            pooling_levels: 2,
            thread_count: Some(1),
            params_json: Some(serde_json::json!({ "threshold": 3.174 })),
            ..Diagnostics::default()
        };

        let encoded = serde_json::to_string(&diagnostics).expect("diagnostics should serialize");
        let decoded: Diagnostics =
            serde_json::from_str(&encoded).expect("diagnostics should deserialize");
        assert_eq!(decoded, diagnostics);
    }
}
