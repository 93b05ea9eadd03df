//! Compilation configuration.
//!
//! `CompileOptions` is the configuration surface described for `compile()`:
//! trace mode, the peephole gate, and the two allocator toggles. It can be
//! built programmatically (builder pattern) or loaded from a TOML file for
//! CLI use, mirroring how other tooling in this codebase keeps its knobs in
//! small `serde`-deserializable structs.

use serde::Deserialize;
use std::path::Path;

/// Allocator feature toggles (see the register allocator's coalescing and
/// proactive-splitting behavior).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AllocatorOptions {
    /// Enable PHI coalescing: assign a PHI destination the same register as
    /// one of its incoming sources when safe, eliding the edge copy.
    pub coalesce: bool,
    /// Enable proactive live-range splitting under register pressure.
    pub split: bool,
}

impl Default for AllocatorOptions {
    fn default() -> Self {
        AllocatorOptions {
            coalesce: true,
            split: true,
        }
    }
}

/// Options passed to [`crate::compile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Emit a source-IR comment line before every lowered IR line.
    /// Implicitly disables the peephole pass (trace output must correspond
    /// exactly to unoptimized lowering).
    pub trace: bool,
    /// Gate on the MOV-folding / self-move peephole pass.
    pub enable_peephole: bool,
    pub allocator: AllocatorOptions,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            trace: false,
            enable_peephole: true,
            allocator: AllocatorOptions::default(),
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        CompileOptions::default()
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_peephole(mut self, enable: bool) -> Self {
        self.enable_peephole = enable;
        self
    }

    pub fn with_coalesce(mut self, coalesce: bool) -> Self {
        self.allocator.coalesce = coalesce;
        self
    }

    pub fn with_split(mut self, split: bool) -> Self {
        self.allocator.split = split;
        self
    }

    /// Load options from a TOML config file, e.g.
    /// ```toml
    /// trace = false
    /// enable_peephole = true
    /// [allocator]
    /// coalesce = true
    /// split = false
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse compiler config: {}", e))
    }

    /// The effective peephole setting: trace mode always disables it,
    /// regardless of the explicit flag.
    pub fn peephole_active(&self) -> bool {
        self.enable_peephole && !self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_peephole_and_allocator_features() {
        let opts = CompileOptions::default();
        assert!(opts.enable_peephole);
        assert!(opts.allocator.coalesce);
        assert!(opts.allocator.split);
        assert!(!opts.trace);
    }

    #[test]
    fn trace_disables_peephole_even_when_requested() {
        let opts = CompileOptions::new().with_trace(true).with_peephole(true);
        assert!(!opts.peephole_active());
    }

    #[test]
    fn builder_toggles_allocator_flags() {
        let opts = CompileOptions::new().with_coalesce(false).with_split(false);
        assert!(!opts.allocator.coalesce);
        assert!(!opts.allocator.split);
    }

    #[test]
    fn loads_from_toml() {
        let toml = "trace = true\n[allocator]\nsplit = false\n";
        let opts = CompileOptions::from_toml_str(toml).unwrap();
        assert!(opts.trace);
        assert!(!opts.allocator.split);
        assert!(opts.allocator.coalesce);
    }
}
