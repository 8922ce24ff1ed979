//! cotlinc-gen - Native x86-64 code generation.
//!
//! Turns a checked program into the raw contents of the `.text`
//! section: a single entry function whose frame is sized once from the
//! analysis metrics, with all control flow resolved through a flat
//! fixup list and all Win32 calls bound to IAT slots from the `.rdata`
//! layout.

mod asm;
mod codegen;
mod frame;

pub use asm::{Asm, Cond, LabelId, Reg};
pub use codegen::generate;
pub use frame::FrameLayout;

use thiserror::Error;

/// Errors raised during code generation. All are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum GenError {
    #[error("string in expression")]
    StringInExpression,

    #[error("lambda in expression")]
    LambdaInExpression,

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("unknown call `{0}`")]
    UnknownCall(String),

    #[error("repeat depth exceeds reserved loop slots")]
    RepeatDepth,

    #[error("label {0} was never placed")]
    UnplacedLabel(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use cotlinc_pe::RdataLayout;
    use cotlinc_sem::Analysis;

    fn compile(src: &str) -> (Vec<u8>, RdataLayout, Analysis) {
        let tokens = cotlinc_lex::tokenize(src).unwrap();
        let program = cotlinc_par::parse(tokens).unwrap();
        let analysis = cotlinc_sem::analyze(&program).unwrap();
        let layout = RdataLayout::compute(&program.strings);
        let code = generate(&program, &analysis, &layout).unwrap();
        (code, layout, analysis)
    }

    fn count_pattern(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| w == &needle).count()
    }

    #[test]
    fn prologue_sets_up_frame_and_console() {
        let (code, layout, _) = compile("исп.команду.print(1)");
        // push rbp; mov rbp, rsp; sub rsp, 112 (frame for 0 locals).
        assert_eq!(&code[..4], &[0x55, 0x48, 0x89, 0xE5]);
        assert_eq!(&code[4..11], &[0x48, 0x81, 0xEC, 112, 0, 0, 0]);
        // lea rbx, [rbp-80] - evaluation stack base.
        assert_eq!(&code[11..15], &[0x48, 0x8D, 0x5D, 0xB0]);
        // mov ecx, 65001; call [rip -> SetConsoleOutputCP].
        assert_eq!(code[15], 0xB9);
        assert_eq!(
            u32::from_le_bytes(code[16..20].try_into().unwrap()),
            65001
        );
        assert_eq!(&code[20..22], &[0xFF, 0x15]);
        let rel = i32::from_le_bytes(code[22..26].try_into().unwrap());
        let next_rva = 0x1000 + 26;
        assert_eq!(
            rel,
            layout.imports.set_console_output_cp as i32 - next_rva
        );
    }

    #[test]
    fn epilogue_tail_calls_exit_process() {
        let (code, layout, _) = compile("исп.команду.print(1)");
        let n = code.len();
        // mov ecx, 0; call [rip -> ExitProcess] ends the program.
        assert_eq!(&code[n - 11..n - 6], &[0xB9, 0, 0, 0, 0]);
        assert_eq!(&code[n - 6..n - 4], &[0xFF, 0x15]);
        let rel = i32::from_le_bytes(code[n - 4..].try_into().unwrap());
        assert_eq!(rel, layout.imports.exit_process as i32 - (0x1000 + n) as i32);
    }

    #[test]
    fn print_string_emits_two_write_file_calls() {
        let (code, _, _) = compile("исп.команду.print(\"привет\")");
        // Three prologue calls, string + newline writes, final exit.
        assert_eq!(count_pattern(&code, &[0xFF, 0x15]), 6);
    }

    #[test]
    fn let_and_set_hit_the_same_slot() {
        let (code, _, _) = compile("пусть x = 7; x = 9");
        // mov [rbp-16], rax - once for the let, once for the set.
        assert_eq!(count_pattern(&code, &[0x48, 0x89, 0x45, 0xF0]), 2);
    }

    #[test]
    fn repeat_compares_signed_against_zero() {
        let (code, _, _) = compile("повторять.раз 3 { исп.команду.print(0) }");
        // cmp rax, 0; jle rel32.
        assert_eq!(
            count_pattern(&code, &[0x48, 0x83, 0xF8, 0x00, 0x0F, 0x8E]),
            1
        );
    }

    #[test]
    fn comparisons_use_signed_setcc() {
        let (code, _, _) = compile("исп.команду.print(1 < 2)");
        // cmp rcx, rax; setl al; movzx rax, al.
        assert_eq!(
            count_pattern(
                &code,
                &[0x48, 0x39, 0xC1, 0x0F, 0x9C, 0xC0, 0x48, 0x0F, 0xB6, 0xC0]
            ),
            1
        );
    }

    #[test]
    fn division_swaps_the_dividend_into_rax() {
        let (code, _, _) = compile("исп.команду.print(7 / 2)");
        // xchg rax, rcx; cqo; idiv rcx.
        assert_eq!(
            count_pattern(&code, &[0x48, 0x91, 0x48, 0x99, 0x48, 0xF7, 0xF9]),
            1
        );
    }

    // Tail of the put.at.index lowering, from the point the value is in
    // RAX: mov r8, rax; pop index into rcx; pop receiver into rdx;
    // scale the index; fetch data; store; return the value.
    const PUT_AT_TAIL: &[u8] = &[
        0x49, 0x89, 0xC0, // mov r8, rax
        0x48, 0x83, 0xEB, 0x08, 0x48, 0x8B, 0x0B, // pop rcx (index)
        0x48, 0x83, 0xEB, 0x08, 0x48, 0x8B, 0x13, // pop rdx (receiver)
        0x48, 0x89, 0xC8, // mov rax, rcx
        0x48, 0xC1, 0xE0, 0x03, // shl rax, 3
        0x4C, 0x8B, 0x4A, 0x10, // mov r9, [rdx+0x10]
        0x4C, 0x01, 0xC8, // add rax, r9
        0x4C, 0x89, 0x00, // mov [rax], r8
        0x4C, 0x89, 0xC0, // mov rax, r8
    ];

    // Tail of the get.at.index lowering, from the point the index is in
    // RAX: pop the receiver into rdx, then the scaled unchecked load.
    const GET_AT_TAIL: &[u8] = &[
        0x48, 0x83, 0xEB, 0x08, 0x48, 0x8B, 0x13, // pop rdx (receiver)
        0x48, 0x8B, 0x4A, 0x10, // mov rcx, [rdx+0x10]
        0x48, 0xC1, 0xE0, 0x03, // shl rax, 3
        0x48, 0x01, 0xC8, // add rax, rcx
        0x48, 0x8B, 0x00, // mov rax, [rax]
    ];

    #[test]
    fn builtin_heavy_program_generates_without_dangling_fixups() {
        let (code, _, analysis) = compile(
            "пусть r = диапазон.от.0.до(4)\n\
             пусть l = создать.лист.цифр()\n\
             пусть m = создать.массив.цифр(3)\n\
             впихни.в.лист(l, 42)\n\
             сунь.по.индексу(m, 1, дай.по.индексу(r, 3))\n\
             исп.команду.print(сколько.внутри(r) + достань.последний(l))\n\
             повторять.раз 2 { повторять.раз 2 { исп.команду.print(дай.по.индексу(m, 1)) } }",
        );
        assert!(!code.is_empty());
        assert_eq!(analysis.max_repeat, 2);
        // The outer put holds its receiver and index on the evaluation
        // stack, so the nested get (plus the loop-body get) cannot
        // disturb them.
        assert_eq!(analysis.max_stack, 3);
        assert_eq!(count_pattern(&code, PUT_AT_TAIL), 1);
        assert_eq!(count_pattern(&code, GET_AT_TAIL), 2);
    }

    #[test]
    fn nested_get_inside_put_keeps_the_outer_operands_pinned() {
        let (code, _, _) = compile(
            "пусть m = создать.массив.цифр(2)\n\
             пусть r = диапазон.от.0.до(4)\n\
             сунь.по.индексу(m, 1, дай.по.индексу(r, 3))",
        );
        // The inner get completes (ending in its unchecked load) and the
        // very next bytes must be the outer put consuming its own two
        // stacked operands - not a reload of clobbered scratch slots.
        let get_end = code
            .windows(GET_AT_TAIL.len())
            .position(|w| w == GET_AT_TAIL)
            .expect("inner get lowering")
            + GET_AT_TAIL.len();
        assert_eq!(&code[get_end..get_end + PUT_AT_TAIL.len()], PUT_AT_TAIL);
    }

    #[test]
    fn short_circuit_guards_the_right_operand() {
        let (code, _, _) = compile("исп.команду.print(0 и.также 1 / 0)");
        // The division is still emitted, guarded by a jz over it.
        assert_eq!(count_pattern(&code, &[0x48, 0xF7, 0xF9]), 1);
        assert!(count_pattern(&code, &[0x0F, 0x84]) >= 1);
    }

    #[test]
    fn repeat_beyond_reserved_slots_is_fatal() {
        let tokens = cotlinc_lex::tokenize("повторять.раз 1 { исп.команду.print(1) }").unwrap();
        let program = cotlinc_par::parse(tokens).unwrap();
        let mut analysis = cotlinc_sem::analyze(&program).unwrap();
        analysis.max_repeat = 0; // no loop slots reserved
        let layout = RdataLayout::compute(&program.strings);
        assert_eq!(
            generate(&program, &analysis, &layout).unwrap_err(),
            GenError::RepeatDepth
        );
    }

    #[test]
    fn string_outside_print_is_fatal() {
        let tokens = cotlinc_lex::tokenize("пусть x = \"hi\"").unwrap();
        let program = cotlinc_par::parse(tokens).unwrap();
        // Bypass sema (which also rejects this) to hit the generator's
        // own guard.
        let mut symbols = cotlinc_sem::SymTab::new();
        symbols.declare("x", cotlinc_sem::Ty::Int).unwrap();
        let analysis = Analysis {
            symbols,
            max_stack: 0,
            max_repeat: 0,
        };
        let layout = RdataLayout::compute(&program.strings);
        assert_eq!(
            generate(&program, &analysis, &layout).unwrap_err(),
            GenError::StringInExpression
        );
    }

    #[test]
    fn string_print_references_the_literal_rva() {
        let (code, layout, _) = compile("исп.команду.print(\"ab\")");
        // lea rdx, [rip+rel] with rel resolving to the literal's RVA.
        let pos = code
            .windows(3)
            .position(|w| w == [0x48, 0x8D, 0x15])
            .expect("lea rdx, [rip+rel32]");
        let rel = i32::from_le_bytes(code[pos + 3..pos + 7].try_into().unwrap());
        let next_rva = 0x1000 as i32 + (pos + 7) as i32;
        assert_eq!((next_rva + rel) as u32, layout.string_rvas[0]);
    }
}
