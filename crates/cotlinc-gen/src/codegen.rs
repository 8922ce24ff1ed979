//! AST-to-machine-code lowering.
//!
//! Every expression leaves its result in RAX. Binary operands and the
//! earlier arguments of multi-argument built-ins spill through the
//! in-frame evaluation stack addressed by RBX, so RSP stays put, Win64
//! shadow-space discipline holds at every call site, and nested
//! built-in calls cannot disturb each other's pinned operands.
//! Built-ins are emitted inline; there is no runtime library. Lists and
//! arrays share a 24-byte heap header `{len, cap, data}`.

use cotlinc_par::{BinOp, Expr, Program, Stmt, StrId, StringTable, UnOp};
use cotlinc_pe::{ImportRvas, RdataLayout, TEXT_RVA};
use cotlinc_sem::{Analysis, Builtin, SymTab};
use rustc_hash::FxHashMap;

use crate::asm::{Asm, Cond, Reg};
use crate::frame::FrameLayout;
use crate::GenError;

const HEAP_ZERO_MEMORY: i32 = 8;
const STD_OUTPUT_HANDLE: u32 = 0xFFFF_FFF5; // -11
const UTF8_CODEPAGE: u32 = 65001;

/// Container header field offsets.
const HDR_LEN: i32 = 0x00;
const HDR_CAP: i32 = 0x08;
const HDR_DATA: i32 = 0x10;
const HDR_SIZE: u64 = 24;

/// Generates the complete `.text` contents for a checked program.
///
/// The returned buffer has every fixup patched against [`TEXT_RVA`] and
/// the `.rdata` RVAs recorded in `layout`.
pub fn generate(
    program: &Program,
    analysis: &Analysis,
    layout: &RdataLayout,
) -> Result<Vec<u8>, GenError> {
    let frame = FrameLayout::compute(
        analysis.symbols.len(),
        analysis.max_repeat,
        analysis.max_stack,
    );
    let mut cg = CodeGen {
        asm: Asm::new(),
        frame,
        symbols: &analysis.symbols,
        strings: &program.strings,
        string_rvas: &layout.string_rvas,
        imports: layout.imports,
        builtins: Builtin::table(),
        loop_depth: 0,
    };

    cg.prologue();
    for stmt in &program.stmts {
        cg.gen_stmt(stmt)?;
    }
    cg.epilogue();
    cg.asm.finish(TEXT_RVA)
}

struct CodeGen<'a> {
    asm: Asm,
    frame: FrameLayout,
    symbols: &'a SymTab,
    strings: &'a StringTable,
    string_rvas: &'a [u32],
    imports: ImportRvas,
    builtins: FxHashMap<&'static str, Builtin>,
    loop_depth: usize,
}

impl<'a> CodeGen<'a> {
    // ---- frame entry and exit ----------------------------------------

    fn prologue(&mut self) {
        self.asm.push_rbp();
        self.asm.mov_rbp_rsp();
        self.asm.sub_rsp_imm32(self.frame.frame_size);
        // RBX is the evaluation-stack pointer for the whole program.
        self.asm.lea(Reg::Rbx, Reg::Rbp, self.frame.vstack_disp);

        self.asm.mov_eri32(Reg::Rcx, UTF8_CODEPAGE);
        self.asm.call_iat(self.imports.set_console_output_cp);

        self.asm.call_iat(self.imports.get_process_heap);
        self.asm.store(Reg::Rbp, self.frame.heap_disp, Reg::Rax);

        self.asm.mov_eri32(Reg::Rcx, STD_OUTPUT_HANDLE);
        self.asm.call_iat(self.imports.get_std_handle);
        self.asm.store(Reg::Rbp, self.frame.stdout_disp, Reg::Rax);
    }

    fn epilogue(&mut self) {
        self.asm.mov_eri32(Reg::Rcx, 0);
        self.asm.call_iat(self.imports.exit_process);
    }

    // ---- evaluation stack --------------------------------------------

    fn vpush_rax(&mut self) {
        self.asm.store(Reg::Rbx, 0, Reg::Rax);
        self.asm.add_ri8(Reg::Rbx, 8);
    }

    fn vpop(&mut self, dst: Reg) {
        self.asm.sub_ri8(Reg::Rbx, 8);
        self.asm.load(dst, Reg::Rbx, 0);
    }

    // ---- statements ---------------------------------------------------

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), GenError> {
        match stmt {
            Stmt::Block(items) => {
                for item in items {
                    self.gen_stmt(item)?;
                }
                Ok(())
            }
            Stmt::Print(expr) => {
                if let Expr::Str(id) = expr {
                    self.gen_print_str(*id);
                } else {
                    self.gen_expr(expr)?;
                    self.gen_print_int();
                }
                self.gen_print_newline();
                Ok(())
            }
            Stmt::Let { name, value } | Stmt::Set { name, value } => {
                let sym = self
                    .symbols
                    .lookup(name)
                    .ok_or_else(|| GenError::UnknownVariable(name.clone()))?;
                self.gen_expr(value)?;
                self.asm
                    .store(Reg::Rbp, FrameLayout::local_disp(sym.index), Reg::Rax);
                Ok(())
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                let l_else = self.asm.new_label();
                let l_end = self.asm.new_label();
                self.gen_expr(cond)?;
                self.asm.test_rr(Reg::Rax, Reg::Rax);
                self.asm.jcc(Cond::E, l_else);
                self.gen_stmt(then_block)?;
                self.asm.jmp(l_end);
                self.asm.place_label(l_else);
                if let Some(else_block) = else_block {
                    self.gen_stmt(else_block)?;
                }
                self.asm.place_label(l_end);
                Ok(())
            }
            Stmt::Repeat { count, body } => {
                let slot = self.loop_depth;
                if slot >= self.frame.loop_slots {
                    return Err(GenError::RepeatDepth);
                }
                self.loop_depth += 1;
                let disp = self.frame.loop_slot_disp(slot);

                let l_start = self.asm.new_label();
                let l_end = self.asm.new_label();
                self.gen_expr(count)?;
                self.asm.store(Reg::Rbp, disp, Reg::Rax);
                self.asm.place_label(l_start);
                self.asm.load(Reg::Rax, Reg::Rbp, disp);
                self.asm.cmp_ri8(Reg::Rax, 0);
                // Signed: a non-positive count runs zero iterations.
                self.asm.jcc(Cond::Le, l_end);
                self.gen_stmt(body)?;
                self.asm.load(Reg::Rax, Reg::Rbp, disp);
                self.asm.dec(Reg::Rax);
                self.asm.store(Reg::Rbp, disp, Reg::Rax);
                self.asm.jmp(l_start);
                self.asm.place_label(l_end);

                self.loop_depth -= 1;
                Ok(())
            }
            Stmt::Expr(expr) => self.gen_expr(expr),
        }
    }

    // ---- expressions --------------------------------------------------

    fn gen_expr(&mut self, expr: &Expr) -> Result<(), GenError> {
        match expr {
            Expr::Num(n) => {
                self.asm.mov_ri64(Reg::Rax, *n as u64);
                Ok(())
            }
            Expr::Bool(b) => {
                self.asm.mov_ri64(Reg::Rax, *b as u64);
                Ok(())
            }
            Expr::Var(name) => {
                let sym = self
                    .symbols
                    .lookup(name)
                    .ok_or_else(|| GenError::UnknownVariable(name.clone()))?;
                self.asm
                    .load(Reg::Rax, Reg::Rbp, FrameLayout::local_disp(sym.index));
                Ok(())
            }
            Expr::Str(_) => Err(GenError::StringInExpression),
            Expr::Lambda { .. } => Err(GenError::LambdaInExpression),
            Expr::Unary { op, expr } => {
                self.gen_expr(expr)?;
                match op {
                    UnOp::Neg => self.asm.neg(Reg::Rax),
                    UnOp::Not => {
                        self.asm.test_rr(Reg::Rax, Reg::Rax);
                        self.asm.set_bool(Cond::E);
                    }
                }
                Ok(())
            }
            Expr::Binary { op, left, right } if op.is_short_circuit() => {
                self.gen_logic(*op, left, right)
            }
            Expr::Binary { op, left, right } => {
                self.gen_expr(left)?;
                self.vpush_rax();
                self.gen_expr(right)?;
                self.vpop(Reg::Rcx);
                self.gen_binop(*op);
                Ok(())
            }
            Expr::Call { name, args } => self.gen_call(name, args),
        }
    }

    /// AND/OR with a guarded right operand. The taken short-circuit
    /// branch materializes the constant; the fall-through normalizes the
    /// right operand to 0/1.
    fn gen_logic(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<(), GenError> {
        let l_short = self.asm.new_label();
        let l_done = self.asm.new_label();

        self.gen_expr(left)?;
        self.asm.test_rr(Reg::Rax, Reg::Rax);
        let (skip_on, short_value) = match op {
            BinOp::And => (Cond::E, 0),
            BinOp::Or => (Cond::Ne, 1),
            _ => unreachable!("only AND/OR short-circuit"),
        };
        self.asm.jcc(skip_on, l_short);

        self.gen_expr(right)?;
        self.asm.test_rr(Reg::Rax, Reg::Rax);
        self.asm.set_bool(Cond::Ne);
        self.asm.jmp(l_done);

        self.asm.place_label(l_short);
        self.asm.mov_ri64(Reg::Rax, short_value);
        self.asm.place_label(l_done);
        Ok(())
    }

    /// Applies a non-short-circuit operator with left in RCX and right
    /// in RAX.
    fn gen_binop(&mut self, op: BinOp) {
        match op {
            BinOp::Add => self.asm.add_rr(Reg::Rax, Reg::Rcx),
            BinOp::Sub => {
                self.asm.sub_rr(Reg::Rcx, Reg::Rax);
                self.asm.mov_rr(Reg::Rax, Reg::Rcx);
            }
            BinOp::Mul => self.asm.imul_rr(Reg::Rax, Reg::Rcx),
            BinOp::Div => {
                // Dividend belongs in RDX:RAX; swap left into place.
                self.asm.xchg_rax(Reg::Rcx);
                self.asm.cqo();
                self.asm.idiv(Reg::Rcx);
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let cond = match op {
                    BinOp::Eq => Cond::E,
                    BinOp::Ne => Cond::Ne,
                    BinOp::Lt => Cond::L,
                    BinOp::Le => Cond::Le,
                    BinOp::Gt => Cond::G,
                    _ => Cond::Ge,
                };
                self.asm.cmp_rr(Reg::Rcx, Reg::Rax);
                self.asm.set_bool(cond);
            }
            BinOp::And | BinOp::Or => unreachable!("lowered by gen_logic"),
        }
    }

    // ---- built-in calls -----------------------------------------------

    fn gen_call(&mut self, name: &str, args: &[Expr]) -> Result<(), GenError> {
        let builtin = *self
            .builtins
            .get(name)
            .ok_or_else(|| GenError::UnknownCall(name.to_owned()))?;
        match builtin {
            Builtin::NewList => self.gen_container_new(args.first(), false),
            Builtin::NewArray => self.gen_container_new(args.first(), true),
            Builtin::Len => {
                self.gen_expr(&args[0])?;
                self.asm.mov_rr(Reg::Rcx, Reg::Rax);
                self.asm.load(Reg::Rax, Reg::Rcx, HDR_LEN);
                Ok(())
            }
            Builtin::GetAt => self.gen_get_at(args),
            Builtin::PutAt => self.gen_put_at(args),
            Builtin::Push => self.gen_push(args),
            Builtin::PopLast => self.gen_pop_last(args),
            Builtin::Range => self.gen_range(args),
        }
    }

    /// `HeapAlloc(heap, HEAP_ZERO_MEMORY, rax)`; result in RAX.
    fn heap_alloc_rax_bytes(&mut self) {
        self.asm.load(Reg::Rcx, Reg::Rbp, self.frame.heap_disp);
        self.asm.mov_ri32s(Reg::Rdx, HEAP_ZERO_MEMORY);
        self.asm.mov_rr(Reg::R8, Reg::Rax);
        self.asm.call_iat(self.imports.heap_alloc);
    }

    /// Shared list/array construction.
    ///
    /// Capacity defaults to 8 when no argument is given (lists only).
    /// Arrays start full: length equals capacity. A zero capacity skips
    /// the data allocation and stores a null pointer.
    fn gen_container_new(
        &mut self,
        cap: Option<&Expr>,
        len_is_cap: bool,
    ) -> Result<(), GenError> {
        let cap_slot = self.frame.temp0_disp;
        let l_zero = self.asm.new_label();
        let l_done = self.asm.new_label();

        match cap {
            Some(expr) => self.gen_expr(expr)?,
            None => self.asm.mov_ri64(Reg::Rax, 8),
        }
        self.asm.store(Reg::Rbp, cap_slot, Reg::Rax);

        self.asm.mov_ri64(Reg::Rax, HDR_SIZE);
        self.heap_alloc_rax_bytes();
        self.asm.mov_rr(Reg::Rdx, Reg::Rax);
        self.asm.mov_rr(Reg::R12, Reg::Rax);

        if len_is_cap {
            self.asm.load(Reg::Rax, Reg::Rbp, cap_slot);
        } else {
            self.asm.mov_ri64(Reg::Rax, 0);
        }
        self.asm.store(Reg::Rdx, HDR_LEN, Reg::Rax);
        self.asm.load(Reg::Rax, Reg::Rbp, cap_slot);
        self.asm.store(Reg::Rdx, HDR_CAP, Reg::Rax);

        self.asm.load(Reg::Rax, Reg::Rbp, cap_slot);
        self.asm.test_rr(Reg::Rax, Reg::Rax);
        self.asm.jcc(Cond::E, l_zero);

        self.asm.load(Reg::Rax, Reg::Rbp, cap_slot);
        self.asm.shl_imm8(Reg::Rax, 3);
        self.heap_alloc_rax_bytes();
        self.asm.mov_rr(Reg::R8, Reg::Rax);
        self.asm.mov_rr(Reg::Rdx, Reg::R12);
        self.asm.mov_rr(Reg::Rax, Reg::R8);
        self.asm.store(Reg::Rdx, HDR_DATA, Reg::Rax);
        self.asm.jmp(l_done);

        self.asm.place_label(l_zero);
        self.asm.mov_ri64(Reg::Rax, 0);
        self.asm.store(Reg::Rdx, HDR_DATA, Reg::Rax);
        self.asm.place_label(l_done);
        self.asm.mov_rr(Reg::Rax, Reg::R12);
        Ok(())
    }

    /// Unchecked `data[i]` load.
    ///
    /// The receiver rides the evaluation stack while the index
    /// evaluates, so a nested built-in in the index cannot disturb it;
    /// the depth analysis reserves the slot.
    fn gen_get_at(&mut self, args: &[Expr]) -> Result<(), GenError> {
        self.gen_expr(&args[0])?;
        self.vpush_rax();
        self.gen_expr(&args[1])?;
        self.vpop(Reg::Rdx);

        self.asm.load(Reg::Rcx, Reg::Rdx, HDR_DATA);
        self.asm.shl_imm8(Reg::Rax, 3);
        self.asm.add_rr(Reg::Rax, Reg::Rcx);
        self.asm.load(Reg::Rax, Reg::Rax, 0);
        Ok(())
    }

    /// Unchecked `data[i] = v` store; the stored value is the result.
    ///
    /// Receiver and index ride the evaluation stack while the later
    /// arguments evaluate.
    fn gen_put_at(&mut self, args: &[Expr]) -> Result<(), GenError> {
        self.gen_expr(&args[0])?;
        self.vpush_rax();
        self.gen_expr(&args[1])?;
        self.vpush_rax();
        self.gen_expr(&args[2])?;
        self.asm.mov_rr(Reg::R8, Reg::Rax);
        self.vpop(Reg::Rcx); // index
        self.vpop(Reg::Rdx); // receiver

        self.asm.mov_rr(Reg::Rax, Reg::Rcx);
        self.asm.shl_imm8(Reg::Rax, 3);
        self.asm.load(Reg::R9, Reg::Rdx, HDR_DATA);
        self.asm.add_rr(Reg::Rax, Reg::R9);
        self.asm.store(Reg::Rax, 0, Reg::R8);
        self.asm.mov_rr(Reg::Rax, Reg::R8);
        Ok(())
    }

    /// Append with no growth: at capacity the push is silently dropped.
    /// Always yields the (unchanged) list pointer.
    fn gen_push(&mut self, args: &[Expr]) -> Result<(), GenError> {
        let l_full = self.asm.new_label();

        self.gen_expr(&args[0])?;
        self.vpush_rax();
        self.gen_expr(&args[1])?;
        self.asm.mov_rr(Reg::R10, Reg::Rax); // value
        self.vpop(Reg::Rdx); // list

        self.asm.load(Reg::Rcx, Reg::Rdx, HDR_LEN);
        self.asm.load(Reg::R8, Reg::Rdx, HDR_CAP);
        self.asm.cmp_rr(Reg::R8, Reg::Rcx);
        self.asm.jcc(Cond::Be, l_full);

        self.asm.load(Reg::R9, Reg::Rdx, HDR_DATA);
        self.asm.mov_rr(Reg::Rax, Reg::Rcx);
        self.asm.shl_imm8(Reg::Rax, 3);
        self.asm.add_rr(Reg::Rax, Reg::R9);
        self.asm.store(Reg::Rax, 0, Reg::R10);
        self.asm.mov_rr(Reg::Rax, Reg::Rcx);
        self.asm.add_ri8(Reg::Rax, 1);
        self.asm.store(Reg::Rdx, HDR_LEN, Reg::Rax);

        self.asm.place_label(l_full);
        self.asm.mov_rr(Reg::Rax, Reg::Rdx);
        Ok(())
    }

    /// Remove and return the last element; an empty list yields 0.
    fn gen_pop_last(&mut self, args: &[Expr]) -> Result<(), GenError> {
        let l_empty = self.asm.new_label();
        let l_done = self.asm.new_label();

        self.gen_expr(&args[0])?;
        self.asm.mov_rr(Reg::Rcx, Reg::Rax);
        self.asm.mov_rr(Reg::Rdx, Reg::Rax);
        self.asm.load(Reg::Rax, Reg::Rcx, HDR_LEN);
        self.asm.test_rr(Reg::Rax, Reg::Rax);
        self.asm.jcc(Cond::E, l_empty);

        self.asm.dec(Reg::Rax);
        self.asm.store(Reg::Rdx, HDR_LEN, Reg::Rax);
        self.asm.load(Reg::R9, Reg::Rdx, HDR_DATA);
        self.asm.shl_imm8(Reg::Rax, 3);
        self.asm.add_rr(Reg::Rax, Reg::R9);
        self.asm.load(Reg::Rax, Reg::Rax, 0);
        self.asm.jmp(l_done);

        self.asm.place_label(l_empty);
        self.asm.mov_ri64(Reg::Rax, 0);
        self.asm.place_label(l_done);
        Ok(())
    }

    /// `range(n)`: a length-n list filled with `data[i] = i` by an
    /// emitted counted loop.
    fn gen_range(&mut self, args: &[Expr]) -> Result<(), GenError> {
        let len_slot = self.frame.temp0_disp;
        let list_slot = self.frame.temp1_disp;
        let l_zero = self.asm.new_label();
        let l_loop = self.asm.new_label();
        let l_loop_done = self.asm.new_label();
        let l_done = self.asm.new_label();

        self.gen_expr(&args[0])?;
        self.asm.store(Reg::Rbp, len_slot, Reg::Rax);

        self.asm.mov_ri64(Reg::Rax, HDR_SIZE);
        self.heap_alloc_rax_bytes();
        self.asm.store(Reg::Rbp, list_slot, Reg::Rax);
        self.asm.mov_rr(Reg::Rdx, Reg::Rax);
        self.asm.mov_rr(Reg::R12, Reg::Rax);

        self.asm.load(Reg::Rax, Reg::Rbp, len_slot);
        self.asm.store(Reg::Rdx, HDR_LEN, Reg::Rax);
        self.asm.load(Reg::Rax, Reg::Rbp, len_slot);
        self.asm.store(Reg::Rdx, HDR_CAP, Reg::Rax);

        self.asm.load(Reg::Rax, Reg::Rbp, len_slot);
        self.asm.test_rr(Reg::Rax, Reg::Rax);
        self.asm.jcc(Cond::E, l_zero);

        self.asm.load(Reg::Rax, Reg::Rbp, len_slot);
        self.asm.shl_imm8(Reg::Rax, 3);
        self.heap_alloc_rax_bytes();
        self.asm.mov_rr(Reg::R8, Reg::Rax);
        self.asm.mov_rr(Reg::Rdx, Reg::R12);
        self.asm.mov_rr(Reg::Rax, Reg::R8);
        self.asm.store(Reg::Rdx, HDR_DATA, Reg::Rax);

        self.asm.mov_rr(Reg::Rdx, Reg::Rax); // rdx = data
        self.asm.mov_ri64(Reg::Rax, 0); // rax = i
        self.asm.place_label(l_loop);
        self.asm.load(Reg::R9, Reg::Rbp, len_slot);
        self.asm.cmp_rr(Reg::R9, Reg::Rax);
        self.asm.jcc(Cond::Be, l_loop_done);
        self.asm.lea_scaled8(Reg::R8, Reg::Rdx, Reg::Rax);
        self.asm.store(Reg::R8, 0, Reg::Rax);
        self.asm.add_ri8(Reg::Rax, 1);
        self.asm.jmp(l_loop);
        self.asm.place_label(l_loop_done);
        self.asm.jmp(l_done);

        self.asm.place_label(l_zero);
        self.asm.mov_ri64(Reg::Rax, 0);
        self.asm.store(Reg::Rdx, HDR_DATA, Reg::Rax);
        self.asm.place_label(l_done);
        self.asm.load(Reg::Rax, Reg::Rbp, list_slot);
        Ok(())
    }

    // ---- print --------------------------------------------------------

    /// `WriteFile(stdout, buf, len, &bytes_written, NULL)`.
    ///
    /// RDX must hold the buffer pointer and R8 the length before the
    /// call. The fifth argument lands at [rsp+0x20]; the evaluation
    /// stack is always empty when a print statement runs, so that slot
    /// is dead space.
    fn call_write_file(&mut self) {
        self.asm.load(Reg::Rcx, Reg::Rbp, self.frame.stdout_disp);
        self.asm
            .lea(Reg::R9, Reg::Rbp, self.frame.bytes_written_disp);
        self.asm.store_stack_qword_zero(0x20);
        self.asm.call_iat(self.imports.write_file);
    }

    fn gen_print_str(&mut self, id: StrId) {
        let rva = self.string_rvas[id.0];
        let len = self.strings.get(id).len() as u32;
        self.asm.lea_rip(Reg::Rdx, rva);
        self.asm.mov_eri32(Reg::R8, len);
        self.call_write_file();
    }

    fn gen_print_newline(&mut self) {
        self.asm
            .store_byte_imm(Reg::Rbp, self.frame.intbuf_disp, b'\n');
        self.asm.lea(Reg::Rdx, Reg::Rbp, self.frame.intbuf_disp);
        self.asm.mov_eri32(Reg::R8, 1);
        self.call_write_file();
    }

    /// Converts RAX to decimal in the scratch buffer and writes it.
    ///
    /// Digits go right-to-left from the buffer end. The negative case
    /// negates and divides unsigned, which makes INT_MIN print itself.
    fn gen_print_int(&mut self) {
        let l_nonzero = self.asm.new_label();
        let l_loop = self.asm.new_label();
        let l_after = self.asm.new_label();
        let l_done = self.asm.new_label();
        let buf_end = self.frame.intbuf_disp + 32;

        self.asm.mov_rr(Reg::Rcx, Reg::Rax);
        self.asm.lea(Reg::Rdx, Reg::Rbp, buf_end);
        self.asm.mov_rr(Reg::R10, Reg::Rdx); // saved end
        self.asm.mov_rr(Reg::R11, Reg::Rdx); // cursor

        self.asm.test_rr(Reg::Rcx, Reg::Rcx);
        self.asm.jcc(Cond::Ne, l_nonzero);
        self.asm.sub_ri8(Reg::R11, 1);
        self.asm.store_byte_imm(Reg::R11, 0, b'0');
        self.asm.jmp(l_done);

        self.asm.place_label(l_nonzero);
        self.asm.xor32_rr(Reg::R8, Reg::R8); // negative flag
        self.asm.test_rr(Reg::Rcx, Reg::Rcx);
        self.asm.jcc(Cond::Ge, l_loop);
        self.asm.neg(Reg::Rcx);
        self.asm.mov_eri32(Reg::R8, 1);

        self.asm.place_label(l_loop);
        self.asm.cmp_ri8(Reg::Rcx, 0);
        self.asm.jcc(Cond::E, l_after);
        self.asm.mov_rr(Reg::Rax, Reg::Rcx);
        self.asm.xor_rr(Reg::Rdx, Reg::Rdx);
        self.asm.mov_ri32s(Reg::R9, 10);
        self.asm.div(Reg::R9);
        self.asm.sub_ri8(Reg::R11, 1);
        self.asm.add8_ri(Reg::Rdx, b'0');
        self.asm.store_byte(Reg::R11, Reg::Rdx);
        self.asm.mov_rr(Reg::Rcx, Reg::Rax);
        self.asm.jmp(l_loop);

        self.asm.place_label(l_after);
        self.asm.test_rr(Reg::R8, Reg::R8);
        self.asm.jcc(Cond::E, l_done);
        self.asm.sub_ri8(Reg::R11, 1);
        self.asm.store_byte_imm(Reg::R11, 0, b'-');

        self.asm.place_label(l_done);
        self.asm.mov_rr(Reg::R8, Reg::R10);
        self.asm.sub_rr(Reg::R8, Reg::R11); // digit count
        self.asm.mov_rr(Reg::Rdx, Reg::R11); // start
        self.call_write_file();
    }
}
