//! End-to-end tests driving the public `compile()` entry point over small,
//! hand-written IR sources. These exercise the full pipeline (parse, PHI
//! resolution, instruction selection, register allocation, peephole,
//! emission) rather than any one module in isolation.

use hsxc::{compile, CompileOptions};

#[test]
fn identity_function_returns_its_argument() {
    let src = "define i32 @identity(i32 %x) {\nentry:\n  ret i32 %x\n}\n";
    let (asm, metadata) = compile(src, CompileOptions::default()).unwrap();
    assert_eq!(asm.matches(".entry").count(), 1);
    assert!(asm.contains(".export identity"));
    assert!(asm.contains("identity__entry:"));
    assert_eq!(metadata.functions.len(), 1);
    assert_eq!(metadata.summary.function_count, 1);
}

#[test]
fn immediate_sum_lowers_to_a_single_add() {
    let src = "define i32 @add_one(i32 %x) {\nentry:\n  %r = add i32 %x, 1\n  ret i32 %r\n}\n";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains("ADD"));
}

#[test]
fn two_literal_operands_are_each_loaded_into_their_own_register() {
    // Both operands are immediates, so they can't share a single scratch
    // register: this must load them into two different ones before adding.
    let src = "define i32 @add_constants() {\nentry:\n  %a = add i32 1, 2\n  ret i32 %a\n}\n";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    let ldi_lines = asm.lines().filter(|l| l.trim_start().starts_with("LDI ")).count();
    assert_eq!(ldi_lines, 2);
    assert!(asm.contains("LDI R12, 1"));
    assert!(asm.contains("LDI R13, 2"));
    assert!(asm.contains("ADD") && asm.contains("R12") && asm.contains("R13"));
}

#[test]
fn shift_amount_literal_is_materialized_not_embedded() {
    let src = "define i32 @shift_left(i32 %x) {\nentry:\n  %r = shl i32 %x, 3\n  ret i32 %r\n}\n";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains("LSL"));
    assert!(asm.contains("LDI R13, 3"));
}

#[test]
fn signed_comparison_uses_only_the_two_real_conditional_jumps() {
    let src = "\
define i32 @less_than(i32 %a, i32 %b) {
entry:
  %r = icmp slt i32 %a, %b
  %w = zext i1 %r to i32
  ret i32 %w
}
";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains("SUB"));
    assert!(asm.contains("AND"));
    assert!(asm.contains("JZ") || asm.contains("JNZ"));
    assert!(!asm.contains("JSLT"));
    assert!(!asm.contains("JEQ"));
}

#[test]
fn uadd_with_overflow_extracts_sum_and_carry() {
    let src = "\
define i32 @carry(i32 %a, i32 %b, ptr %out) {
entry:
  %sum = call { i32, i1 } @llvm.uadd.with.overflow.i32(i32 %a, i32 %b)
  %carry = extractvalue { i32, i1 } %sum, 1
  %value = extractvalue { i32, i1 } %sum, 0
  store i32 %value, ptr %out
  %w = zext i1 %carry to i32
  ret i32 %w
}
";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.matches("ADD").count() >= 1);
    assert!(asm.contains("ADC"));
    assert!(asm.contains("LDI"));
}

#[test]
fn fp16_narrowing_a_literal_loads_its_half_bit_pattern() {
    let src = "define i32 @half_of_one() {\nentry:\n  %h = call i32 @llvm.convert.to.fp16.f32(float 1.0)\n  ret i32 %h\n}\n";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains("LDI") && asm.contains("15360"));
    assert!(!asm.contains("CVTF2H"));
}

#[test]
fn fp16_widening_is_a_plain_move() {
    let src = "define float @widen_half(i32 %bits) {\nentry:\n  %w = call float @llvm.convert.from.fp16.f32(i32 %bits)\n  ret float %w\n}\n";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains("MOV"));
    assert!(!asm.contains("CVTH2F"));
}

#[test]
fn fp16_narrowing_an_ssa_value_without_a_float_alias_is_rejected() {
    let src = "define i32 @bad(i32 %x) {\nentry:\n  %h = call i32 @llvm.convert.to.fp16.f32(float %x)\n  ret i32 %h\n}\n";
    let err = compile(src, CompileOptions::default()).unwrap_err();
    assert!(err.to_string().contains("float-typed"));
}

#[test]
fn sign_extend_uses_mask_and_conditional_subtract_not_shifts() {
    let src = "define i32 @widen(i8 %x) {\nentry:\n  %r = sext i8 %x to i32\n  ret i32 %r\n}\n";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains("AND"));
    assert!(asm.contains("SUB"));
    assert!(!asm.contains("SHL"));
    assert!(!asm.contains("SAR"));
}

#[test]
fn main_function_sets_the_entry_symbol() {
    let src = "define i32 @main() {\nentry:\n  ret i32 0\n}\n";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains(".entry main"));
    assert_eq!(asm.matches(".entry").count(), 1);
}

#[test]
fn phi_over_a_diamond_resolves_to_plain_edge_copies() {
    let src = "\
define i32 @diamond(i32 %c) {
entry:
  %t = icmp ne i32 %c, 0
  br i1 %t, label %left, label %right
left:
  br label %merge
right:
  br label %merge
merge:
  %r = phi i32 [ 1, left ], [ 2, right ]
  ret i32 %r
}
";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(!asm.contains("phi"));
    assert!(asm.contains("diamond__merge:"));
    assert!(asm.contains("diamond__left:"));
    assert!(asm.contains("diamond__right:"));
}

#[test]
fn phi_swap_cycle_breaks_through_the_scratch_register() {
    // Both loop-carried values trade registers on the back edge, a classic
    // swap cycle that can't be resolved without a scratch register.
    let src = "\
define i32 @swap_loop(i32 %a0, i32 %b0) {
entry:
  br label %loop
loop:
  %a = phi i32 [ %a0, entry ], [ %b, loop ]
  %b = phi i32 [ %b0, entry ], [ %a, loop ]
  %done = icmp eq i32 %a, 0
  br i1 %done, label %exit, label %loop
exit:
  ret i32 %a
}
";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains("R13"));
}

#[test]
fn register_pressure_forces_a_spill_addressed_relative_to_the_frame_pointer() {
    // Nine simultaneously-live values overrun the eight-register allocatable
    // pool; with no `alloca` in the function, the frame pointer is free for
    // the allocator's own spill-slot addressing.
    let src = "\
define i32 @wide(i32 %p0, i32 %p1, i32 %p2) {
entry:
  %v0 = add i32 %p0, 1
  %v1 = add i32 %p0, 2
  %v2 = add i32 %p0, 3
  %v3 = add i32 %p0, 4
  %v4 = add i32 %p0, 5
  %v5 = add i32 %p0, 6
  %v6 = add i32 %p0, 7
  %v7 = add i32 %p0, 8
  %v8 = add i32 %p0, 9
  %s0 = add i32 %v0, %v1
  %s1 = add i32 %s0, %v2
  %s2 = add i32 %s1, %v3
  %s3 = add i32 %s2, %v4
  %s4 = add i32 %s3, %v5
  %s5 = add i32 %s4, %v6
  %s6 = add i32 %s5, %v7
  %s7 = add i32 %s6, %v8
  ret i32 %s7
}
";
    let (asm, metadata) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains("[R7+"));
    let fn_meta = &metadata.functions[0];
    assert!(fn_meta.metrics.spill_count > 0);
    assert!(fn_meta.metrics.reload_count > 0);
}

#[test]
fn global_string_is_loaded_through_getelementptr() {
    let src = "\
@msg = constant [6 x i8] c\"hello\\00\"

define i32 @greet() {
entry:
  %p = getelementptr inbounds [6 x i8], ptr @msg, i32 0, i32 0
  %c = load i8, ptr %p
  %w = zext i8 %c to i32
  ret i32 %w
}
";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains("msg:"));
    assert!(asm.contains(".data"));
}

#[test]
fn call_with_more_than_three_arguments_is_rejected() {
    let src = "\
define i32 @f() {
entry:
  %r = call i32 @g(i32 1, i32 2, i32 3, i32 4)
  ret i32 %r
}
";
    let err = compile(src, CompileOptions::default()).unwrap_err();
    assert_eq!(err.kind(), "instruction selection error");
    assert!(err.to_string().contains("more than 3 args"));
}

#[test]
fn calls_to_undefined_functions_are_recorded_as_imports() {
    let src = "\
define i32 @caller() {
entry:
  %r = call i32 @callee(i32 1)
  ret i32 %r
}
";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains(".import callee"));
    assert!(!asm.contains(".export callee"));
}

#[test]
fn alloca_claims_the_frame_pointer_instead_of_a_frame_relative_spill_slot() {
    let src = "\
define i32 @with_local() {
entry:
  %slot = alloca i32
  store i32 7, ptr %slot
  %v = load i32, ptr %slot
  ret i32 %v
}
";
    let (asm, _) = compile(src, CompileOptions::default()).unwrap();
    assert!(asm.contains("LDI32 R7,"));
}

#[test]
fn disabling_peephole_leaves_self_moves_in_place_when_trace_is_on() {
    let src = "define i32 @identity(i32 %x) {\nentry:\n  ret i32 %x\n}\n";
    let traced = compile(src, CompileOptions::new().with_trace(true));
    let plain = compile(src, CompileOptions::default());
    assert!(traced.is_ok());
    assert!(plain.is_ok());
}

#[test]
fn disabling_split_keeps_proactive_split_count_at_zero() {
    let src = "\
define i32 @wide(i32 %p0, i32 %p1, i32 %p2) {
entry:
  %v0 = add i32 %p0, 1
  %v1 = add i32 %p0, 2
  %v2 = add i32 %p0, 3
  %v3 = add i32 %p0, 4
  %v4 = add i32 %p0, 5
  %v5 = add i32 %p0, 6
  %v6 = add i32 %p0, 7
  %v7 = add i32 %p0, 8
  %v8 = add i32 %p0, 9
  %s0 = add i32 %v0, %v1
  %s1 = add i32 %s0, %v2
  %s2 = add i32 %s1, %v3
  %s3 = add i32 %s2, %v4
  %s4 = add i32 %s3, %v5
  %s5 = add i32 %s4, %v6
  %s6 = add i32 %s5, %v7
  %s7 = add i32 %s6, %v8
  ret i32 %s7
}
";
    let options = CompileOptions::new().with_split(false);
    let (_, metadata) = compile(src, options).unwrap();
    assert_eq!(metadata.functions[0].metrics.proactive_splits, 0);
}
