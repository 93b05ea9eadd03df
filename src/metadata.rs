//! Structured compilation metadata: per-function allocator metrics, an
//! aggregate summary, and (when debug info was present) the subprogram
//! table, serialized as JSON alongside the assembly text.

use crate::codegen::LoweredFunction;
use crate::ir::Program;
use crate::regalloc::AllocatorMetrics;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FunctionMetadata {
    pub name: String,
    pub used_registers: Vec<&'static str>,
    #[serde(flatten)]
    pub metrics: AllocatorMetrics,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateSummary {
    pub function_count: usize,
    pub total_spill_count: u32,
    pub total_reload_count: u32,
    pub total_stack_bytes: u32,
    pub total_proactive_splits: u32,
    pub max_pressure: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugSubprogramEntry {
    pub function: String,
    pub name: String,
    pub file: String,
    pub line: u32,
    pub scope_line: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub functions: Vec<FunctionMetadata>,
    pub summary: AggregateSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_subprograms: Option<Vec<DebugSubprogramEntry>>,
}

pub fn build(program: &Program, lowered: &[LoweredFunction]) -> Metadata {
    let functions: Vec<FunctionMetadata> = lowered
        .iter()
        .map(|f| FunctionMetadata {
            name: f.name.clone(),
            used_registers: f.used_registers.clone(),
            metrics: f.metrics,
        })
        .collect();

    let summary = functions.iter().fold(
        AggregateSummary {
            function_count: functions.len(),
            ..Default::default()
        },
        |mut acc, f| {
            acc.total_spill_count += f.metrics.spill_count;
            acc.total_reload_count += f.metrics.reload_count;
            acc.total_stack_bytes += f.metrics.stack_bytes;
            acc.total_proactive_splits += f.metrics.proactive_splits;
            acc.max_pressure = acc.max_pressure.max(f.metrics.max_pressure);
            acc
        },
    );

    let debug_subprograms = program.debug.as_ref().map(|debug| {
        program
            .functions
            .iter()
            .filter_map(|function| {
                let tag = function.subprogram.as_ref()?;
                let subprogram = debug.subprograms.get(tag)?;
                let file = debug
                    .files
                    .get(&subprogram.file_tag)
                    .map(|f| f.filename.clone())
                    .unwrap_or_default();
                Some(DebugSubprogramEntry {
                    function: function.name.clone(),
                    name: subprogram.name.clone(),
                    file,
                    line: subprogram.line,
                    scope_line: subprogram.scope_line,
                })
            })
            .collect()
    });

    Metadata {
        functions,
        summary,
        debug_subprograms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regalloc::AllocatorMetrics;

    #[test]
    fn aggregates_spill_and_reload_counts_across_functions() {
        let program = Program::default();
        let lowered = vec![
            LoweredFunction {
                name: "f".to_string(),
                asm: vec![],
                data: vec![],
                metrics: AllocatorMetrics { spill_count: 2, reload_count: 1, ..Default::default() },
                used_registers: vec!["R4"],
            },
            LoweredFunction {
                name: "g".to_string(),
                asm: vec![],
                data: vec![],
                metrics: AllocatorMetrics { spill_count: 3, reload_count: 0, ..Default::default() },
                used_registers: vec!["R5"],
            },
        ];
        let meta = build(&program, &lowered);
        assert_eq!(meta.summary.total_spill_count, 5);
        assert_eq!(meta.summary.total_reload_count, 1);
        assert_eq!(meta.summary.function_count, 2);
    }

    #[test]
    fn omits_debug_subprograms_when_no_debug_info_present() {
        let program = Program::default();
        let meta = build(&program, &[]);
        assert!(meta.debug_subprograms.is_none());
    }
}
