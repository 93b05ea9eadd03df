//! Linear-scan register allocator.
//!
//! The source keeps allocator state as closures and locals captured inside
//! one big per-function lowering routine. Here that state is an explicit
//! `Allocator` value threaded through the instruction selector by mutable
//! reference and dropped at the function boundary, per the "implicit global
//! mutable allocator state -> explicit value" redesign direction.

use crate::config::AllocatorOptions;
use crate::error::CompileError;
use crate::types::Type;
use std::collections::{HashMap, HashSet};

type Result<T> = std::result::Result<T, CompileError>;

pub const RETURN_REG: &str = "R0";
pub const ARG_REGS: [&str; 3] = ["R1", "R2", "R3"];
pub const FRAME_POINTER_REG: &str = "R7";
/// Reserved for the lowerer's own address/constant materialization; the
/// allocator may never assign these to an SSA value.
pub const RESERVED_SCRATCH: [&str; 3] = ["R12", "R13", "R14"];
pub const PHI_SCRATCH_REG: &str = "R13";
pub const AVAILABLE_REGS: [&str; 8] = ["R4", "R5", "R6", "R8", "R9", "R10", "R11", "R15"];

/// Proactive-split heuristic constants (see `DESIGN.md`, "Open questions
/// resolved"): among the candidates a plain LRU spill would already pick,
/// one whose remaining use count exceeds this threshold is additionally
/// counted as a proactive split rather than an ordinary spill.
const SPLIT_DISTANCE_K: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct AllocatorMetrics {
    pub max_pressure: usize,
    pub spill_count: u32,
    pub reload_count: u32,
    pub stack_slots: u32,
    pub stack_bytes: u32,
    pub proactive_splits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SpillSlot {
    /// Frame-relative, only available when the function has no user `alloca`.
    Frame { offset: u32 },
    /// Absolute data-section label, materialized through R14.
    Label { label: String },
}

/// All per-function allocator state, plus the assembly buffer the selector
/// appends to and the data-section lines any label-addressed spill slots
/// need.
pub struct Allocator {
    function_name: String,
    options: AllocatorOptions,
    pub asm: Vec<String>,
    pub data_lines: Vec<String>,

    free_regs: Vec<&'static str>,
    value_to_reg: HashMap<String, &'static str>,
    reg_to_value: HashMap<&'static str, String>,
    value_types: HashMap<String, Type>,
    use_counts: HashMap<String, i64>,
    lru: Vec<String>,
    pinned: HashSet<String>,
    pinned_registers: HashMap<String, &'static str>,
    spill_slots: HashMap<String, (SpillSlot, Type)>,
    float_alias: HashSet<String>,

    frame_pointer_available: bool,
    frame_pointer_claimed: bool,
    stack_bytes_used: u32,
    spill_slot_counter: u32,
    temp_label_counter: u32,
    used_registers: HashSet<&'static str>,
    metrics: AllocatorMetrics,
}

impl Allocator {
    pub fn new(function_name: &str, options: AllocatorOptions, has_alloca: bool) -> Self {
        Allocator {
            function_name: function_name.to_string(),
            options,
            asm: Vec::new(),
            data_lines: Vec::new(),
            free_regs: AVAILABLE_REGS.to_vec(),
            value_to_reg: HashMap::new(),
            reg_to_value: HashMap::new(),
            value_types: HashMap::new(),
            use_counts: HashMap::new(),
            lru: Vec::new(),
            pinned: HashSet::new(),
            pinned_registers: HashMap::new(),
            spill_slots: HashMap::new(),
            float_alias: HashSet::new(),
            frame_pointer_available: !has_alloca,
            frame_pointer_claimed: false,
            stack_bytes_used: 0,
            spill_slot_counter: 0,
            temp_label_counter: 0,
            used_registers: HashSet::new(),
            metrics: AllocatorMetrics::default(),
        }
    }

    pub fn metrics(&self) -> AllocatorMetrics {
        let mut m = self.metrics;
        m.stack_bytes = self.stack_bytes_used.max(m.stack_bytes);
        m
    }

    pub fn used_registers(&self) -> Vec<&'static str> {
        let mut v: Vec<&'static str> = self.used_registers.iter().copied().collect();
        v.sort_unstable();
        v
    }

    pub fn set_use_count(&mut self, name: &str, count: i64) {
        *self.use_counts.entry(name.to_string()).or_insert(0) += count;
    }

    pub fn use_count(&self, name: &str) -> i64 {
        self.use_counts.get(name).copied().unwrap_or(0)
    }

    pub fn value_type(&self, name: &str) -> Option<Type> {
        self.value_types.get(name).copied()
    }

    pub fn set_float_alias(&mut self, name: &str) {
        self.float_alias.insert(name.to_string());
    }

    pub fn clear_float_alias(&mut self, name: &str) {
        self.float_alias.remove(name);
    }

    pub fn has_float_alias(&self, name: &str) -> bool {
        self.float_alias.contains(name)
    }

    pub fn new_label(&mut self, tag: &str) -> String {
        self.temp_label_counter += 1;
        format!("{}__{}_{}", self.function_name, tag, self.temp_label_counter)
    }

    /// Bind a function argument directly to its calling-convention register.
    pub fn bind_argument(&mut self, name: &str, ty: Type, reg: &'static str) {
        self.value_types.insert(name.to_string(), ty);
        self.value_to_reg.insert(name.to_string(), reg);
        self.reg_to_value.insert(reg, name.to_string());
        self.used_registers.insert(reg);
        self.touch(name);
    }

    /// Claim the frame-pointer register for the function's first `alloca`.
    /// Only valid when the function does have a user `alloca` (see
    /// `DESIGN.md`, R7 dual-role addressing).
    pub fn pin_frame_pointer(&mut self, name: &str) {
        self.value_types.insert(name.to_string(), Type::Ptr);
        self.pinned.insert(name.to_string());
        self.pinned_registers.insert(name.to_string(), FRAME_POINTER_REG);
        self.value_to_reg.insert(name.to_string(), FRAME_POINTER_REG);
        self.reg_to_value.insert(FRAME_POINTER_REG, name.to_string());
        self.used_registers.insert(FRAME_POINTER_REG);
        self.frame_pointer_claimed = true;
        self.touch(name);
    }

    pub fn frame_pointer_claimed(&self) -> bool {
        self.frame_pointer_claimed
    }

    pub fn pin(&mut self, name: &str) {
        self.pinned.insert(name.to_string());
    }

    pub fn coalesce_enabled(&self) -> bool {
        self.options.coalesce
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.value_to_reg.contains_key(name)
    }

    /// Bind `name` directly to an already-resident register without
    /// emitting a copy — the PHI-coalescing fast path.
    pub fn alias_register(&mut self, name: &str, reg: &'static str, ty: Type) {
        self.value_types.insert(name.to_string(), ty);
        self.value_to_reg.insert(name.to_string(), reg);
        self.reg_to_value.insert(reg, name.to_string());
        self.used_registers.insert(reg);
        self.touch(name);
    }

    fn touch(&mut self, name: &str) {
        self.lru.retain(|n| n != name);
        self.lru.push(name.to_string());
        let pressure = self.value_to_reg.len();
        if pressure > self.metrics.max_pressure {
            self.metrics.max_pressure = pressure;
        }
    }

    fn add_free_reg(&mut self, reg: &'static str) {
        if self.free_regs.contains(&reg) {
            return;
        }
        let idx = AVAILABLE_REGS.iter().position(|r| *r == reg).unwrap();
        let pos = self
            .free_regs
            .iter()
            .position(|r| AVAILABLE_REGS.iter().position(|x| x == r).unwrap() > idx)
            .unwrap_or(self.free_regs.len());
        self.free_regs.insert(pos, reg);
    }

    fn select_spill_candidate(&self, exclude: &[String]) -> Option<String> {
        self.lru
            .iter()
            .find(|name| {
                !exclude.contains(name)
                    && !self.pinned.contains(*name)
                    && self
                        .value_to_reg
                        .get(*name)
                        .is_some_and(|r| AVAILABLE_REGS.contains(r))
            })
            .cloned()
    }

    fn allocate_spill_slot(&mut self, name: &str, ty: Type) -> SpillSlot {
        if let Some((slot, _)) = self.spill_slots.get(name) {
            return slot.clone();
        }
        let slot = if self.frame_pointer_available {
            let offset = self.stack_bytes_used;
            self.stack_bytes_used += ty.size_bytes();
            SpillSlot::Frame { offset }
        } else {
            let label = format!("__spill_{}_{}", self.function_name, self.spill_slot_counter);
            self.spill_slot_counter += 1;
            self.data_lines.push(format!("{}:", label));
            self.data_lines.push(format!("    {} 0", ty.data_directive()));
            SpillSlot::Label { label }
        };
        self.metrics.stack_slots += 1;
        self.spill_slots.insert(name.to_string(), (slot.clone(), ty));
        slot
    }

    fn spill_value(&mut self, name: &str) {
        let Some(reg) = self.value_to_reg.remove(name) else {
            return;
        };
        self.reg_to_value.remove(reg);
        let ty = self.value_types.get(name).copied().unwrap_or(Type::I32);
        let slot = self.allocate_spill_slot(name, ty);
        match &slot {
            SpillSlot::Frame { offset } => {
                self.asm.push(format!("{} [R7+{}], {}", ty.store_op(), offset, reg));
            }
            SpillSlot::Label { label } => {
                self.asm.push(format!("LDI32 R14, {}", label));
                self.asm.push(format!("{} [R14+0], {}", ty.store_op(), reg));
            }
        }
        self.add_free_reg(reg);
        self.lru.retain(|n| n != name);
        self.float_alias.remove(name);
        self.metrics.spill_count += 1;
    }

    fn ensure_register_available(&mut self, exclude: &[String]) -> Result<()> {
        while self.free_regs.is_empty() {
            let Some(candidate) = self.select_spill_candidate(exclude) else {
                return Err(CompileError::alloc(
                    &self.function_name,
                    "register allocator exhausted; no spillable candidate",
                ));
            };
            if self.use_counts.get(&candidate).copied().unwrap_or(0) <= 0 {
                self.release_reg(&candidate);
                continue;
            }
            let is_split = self.options.split && self.use_counts.get(&candidate).copied().unwrap_or(0) > SPLIT_DISTANCE_K;
            self.spill_value(&candidate);
            if is_split {
                self.metrics.proactive_splits += 1;
            }
        }
        Ok(())
    }

    /// Allocate (or return the already-assigned) register for `name`,
    /// reloading it from its spill slot first if it is currently spilled.
    pub fn alloc_vreg(&mut self, name: &str, ty: Type) -> Result<&'static str> {
        self.value_types.insert(name.to_string(), ty);
        if let Some(&reg) = self.pinned_registers.get(name) {
            self.value_to_reg.insert(name.to_string(), reg);
            self.reg_to_value.insert(reg, name.to_string());
            self.touch(name);
            return Ok(reg);
        }
        if let Some(&reg) = self.value_to_reg.get(name) {
            self.touch(name);
            return Ok(reg);
        }
        let currently_spilled = self.spill_slots.contains_key(name);
        self.ensure_register_available(&[name.to_string()])?;
        let reg = self.free_regs.remove(0);
        self.value_to_reg.insert(name.to_string(), reg);
        self.reg_to_value.insert(reg, name.to_string());
        self.used_registers.insert(reg);
        self.touch(name);
        if currently_spilled {
            let (slot, stored_ty) = self.spill_slots.get(name).unwrap().clone();
            match &slot {
                SpillSlot::Frame { offset } => {
                    self.asm.push(format!("{} {}, [R7+{}]", stored_ty.load_op(), reg, offset));
                }
                SpillSlot::Label { label } => {
                    self.asm.push(format!("LDI32 R14, {}", label));
                    self.asm.push(format!("{} {}, [R14+0]", stored_ty.load_op(), reg));
                }
            }
            self.value_types.insert(name.to_string(), stored_ty);
            self.metrics.reload_count += 1;
        }
        Ok(reg)
    }

    /// Ensure `name` is resident in a register, without allocating a new
    /// logical definition (used for operand resolution).
    pub fn ensure_value_in_reg(&mut self, name: &str) -> Result<&'static str> {
        if let Some(&reg) = self.value_to_reg.get(name) {
            self.touch(name);
            return Ok(reg);
        }
        if let Some((_, ty)) = self.spill_slots.get(name).copied() {
            return self.alloc_vreg(name, ty);
        }
        Err(CompileError::isel(&self.function_name, name, format!("unknown value {}", name)))
    }

    pub fn release_reg(&mut self, name: &str) {
        if let Some(reg) = self.value_to_reg.remove(name) {
            self.reg_to_value.remove(reg);
            if AVAILABLE_REGS.contains(&reg) {
                self.add_free_reg(reg);
            }
        }
        self.lru.retain(|n| n != name);
        self.float_alias.remove(name);
    }

    pub fn consume_use(&mut self, name: &str) {
        if !name.starts_with('%') {
            return;
        }
        if let Some(count) = self.use_counts.get_mut(name) {
            *count -= 1;
            if *count <= 0 {
                self.use_counts.remove(name);
                if !self.pinned.contains(name) {
                    self.release_reg(name);
                }
            }
        }
    }

    pub fn maybe_release(&mut self, name: &str) {
        if !name.starts_with('%') {
            return;
        }
        if self.use_counts.get(name).copied().unwrap_or(0) <= 0 && !self.pinned.contains(name) {
            self.release_reg(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(options: AllocatorOptions) -> Allocator {
        Allocator::new("f", options, false)
    }

    #[test]
    fn allocates_from_preference_ordered_pool() {
        let mut a = alloc(AllocatorOptions { coalesce: true, split: true });
        let r1 = a.alloc_vreg("%a", Type::I32).unwrap();
        assert_eq!(r1, "R4");
        let r2 = a.alloc_vreg("%b", Type::I32).unwrap();
        assert_eq!(r2, "R5");
    }

    #[test]
    fn release_on_zero_use_count_frees_register_for_reuse() {
        let mut a = alloc(AllocatorOptions { coalesce: true, split: true });
        a.alloc_vreg("%a", Type::I32).unwrap();
        a.set_use_count("%a", 1);
        a.consume_use("%a");
        let r = a.alloc_vreg("%b", Type::I32).unwrap();
        assert_eq!(r, "R4");
    }

    #[test]
    fn spills_least_recently_used_when_pool_exhausted() {
        let mut a = alloc(AllocatorOptions { coalesce: true, split: false });
        let names: Vec<String> = (0..8).map(|i| format!("%v{}", i)).collect();
        for n in &names {
            a.alloc_vreg(n, Type::I32).unwrap();
            a.set_use_count(n, 5);
        }
        // pool is now full; allocating a 9th forces a spill of %v0 (LRU).
        a.alloc_vreg("%v8", Type::I32).unwrap();
        assert_eq!(a.metrics().spill_count, 1);
        assert!(a.ensure_value_in_reg("%v0").is_ok());
        assert_eq!(a.metrics().reload_count, 1);
    }

    #[test]
    fn disabling_split_never_increments_proactive_splits() {
        let mut a = alloc(AllocatorOptions { coalesce: true, split: false });
        for i in 0..9 {
            let n = format!("%v{}", i);
            a.alloc_vreg(&n, Type::I32).unwrap();
            a.set_use_count(&n, 20);
        }
        assert_eq!(a.metrics().proactive_splits, 0);
    }

    #[test]
    fn frame_pointer_mode_addresses_spills_relative_to_r7() {
        let mut a = alloc(AllocatorOptions { coalesce: true, split: true });
        for i in 0..9 {
            let n = format!("%v{}", i);
            a.alloc_vreg(&n, Type::I32).unwrap();
            a.set_use_count(&n, 20);
        }
        assert!(a.asm.iter().any(|line| line.contains("[R7+")));
    }

    #[test]
    fn reports_pressure_and_used_registers() {
        let mut a = alloc(AllocatorOptions { coalesce: true, split: true });
        a.alloc_vreg("%a", Type::I32).unwrap();
        a.alloc_vreg("%b", Type::I32).unwrap();
        assert_eq!(a.metrics().max_pressure, 2);
        assert_eq!(a.used_registers(), vec!["R4", "R5"]);
    }
}
