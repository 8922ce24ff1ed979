//! The semantic walk: name resolution, type checking, depth metrics.
//!
//! One pass over the AST does all three jobs. Declaration order drives
//! symbol indices, every expression is typed against the closed builtin
//! set, and the walk records the two frame-sizing metrics: the deepest
//! evaluation-stack use of any expression and the deepest static
//! `Repeat` nesting.

use cotlinc_par::{BinOp, Expr, Program, Stmt};
use rustc_hash::FxHashMap;

use crate::{Builtin, SemError, SymTab, Ty};

/// Everything the back end needs from semantic analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub symbols: SymTab,
    /// Maximum simultaneous pushed operands during expression lowering.
    pub max_stack: usize,
    /// Maximum static `Repeat` nesting depth.
    pub max_repeat: usize,
}

/// Analyzes a program, producing the symbol table and frame metrics.
pub fn analyze(program: &Program) -> Result<Analysis, SemError> {
    let mut analyzer = Analyzer {
        symbols: SymTab::new(),
        builtins: Builtin::table(),
        max_stack: 0,
        max_repeat: 0,
    };
    for stmt in &program.stmts {
        analyzer.check_stmt(stmt, 0)?;
    }
    Ok(Analysis {
        symbols: analyzer.symbols,
        max_stack: analyzer.max_stack,
        max_repeat: analyzer.max_repeat,
    })
}

struct Analyzer {
    symbols: SymTab,
    builtins: FxHashMap<&'static str, Builtin>,
    max_stack: usize,
    max_repeat: usize,
}

impl Analyzer {
    fn check_stmt(&mut self, stmt: &Stmt, repeat_depth: usize) -> Result<(), SemError> {
        match stmt {
            Stmt::Block(items) => {
                for item in items {
                    self.check_stmt(item, repeat_depth)?;
                }
                Ok(())
            }
            Stmt::Print(expr) => {
                let ty = self.type_expr(expr, None)?;
                if !matches!(expr, Expr::Str(_)) && ty != Ty::Int {
                    return Err(SemError::PrintArg);
                }
                self.note_depth(expr);
                Ok(())
            }
            Stmt::Let { name, value } => {
                let ty = self.type_expr(value, None)?;
                if !ty.is_storable() {
                    return Err(SemError::BadLet);
                }
                self.note_depth(value);
                self.symbols.declare(name, ty)?;
                Ok(())
            }
            Stmt::Set { name, value } => {
                let sym = self
                    .symbols
                    .lookup(name)
                    .ok_or_else(|| SemError::UnknownVariable(name.clone()))?;
                let ty = self.type_expr(value, None)?;
                if ty != sym.ty {
                    return Err(SemError::TypeMismatch(name.clone()));
                }
                self.note_depth(value);
                Ok(())
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                if self.type_expr(cond, None)? != Ty::Int {
                    return Err(SemError::BadIfCond);
                }
                self.note_depth(cond);
                self.check_stmt(then_block, repeat_depth)?;
                if let Some(else_block) = else_block {
                    self.check_stmt(else_block, repeat_depth)?;
                }
                Ok(())
            }
            Stmt::Repeat { count, body } => {
                if self.type_expr(count, None)? != Ty::Int {
                    return Err(SemError::BadRepeatCount);
                }
                self.note_depth(count);
                let depth = repeat_depth + 1;
                self.max_repeat = self.max_repeat.max(depth);
                self.check_stmt(body, depth)
            }
            Stmt::Expr(expr) => {
                let ty = self.type_expr(expr, None)?;
                if !ty.is_storable() {
                    return Err(SemError::BadExprStmt);
                }
                self.note_depth(expr);
                Ok(())
            }
        }
    }

    /// Types an expression. `param` is the lambda parameter in scope, if
    /// any; it shadows outer bindings and is always Int.
    fn type_expr(&self, expr: &Expr, param: Option<&str>) -> Result<Ty, SemError> {
        match expr {
            Expr::Num(_) | Expr::Bool(_) => Ok(Ty::Int),
            Expr::Str(_) => Ok(Ty::Invalid),
            Expr::Var(name) => {
                if param == Some(name.as_str()) {
                    return Ok(Ty::Int);
                }
                self.symbols
                    .lookup(name)
                    .map(|sym| sym.ty)
                    .ok_or_else(|| SemError::UnknownVariable(name.clone()))
            }
            Expr::Unary { expr, .. } => {
                if self.type_expr(expr, param)? != Ty::Int {
                    return Err(SemError::BadUnary);
                }
                Ok(Ty::Int)
            }
            Expr::Binary { left, right, .. } => {
                let lt = self.type_expr(left, param)?;
                let rt = self.type_expr(right, param)?;
                if lt != Ty::Int || rt != Ty::Int {
                    return Err(SemError::BadBinary);
                }
                Ok(Ty::Int)
            }
            Expr::Lambda { param: p, body } => {
                if self.type_expr(body, Some(p))? != Ty::Int {
                    return Err(SemError::LambdaBody);
                }
                Ok(Ty::Lambda)
            }
            Expr::Call { name, args } => self.type_call(name, args, param),
        }
    }

    fn type_call(&self, name: &str, args: &[Expr], param: Option<&str>) -> Result<Ty, SemError> {
        let builtin = *self
            .builtins
            .get(name)
            .ok_or_else(|| SemError::UnknownCall(name.to_owned()))?;

        let arg_tys = args
            .iter()
            .map(|a| self.type_expr(a, param))
            .collect::<Result<Vec<_>, _>>()?;

        let ok = match builtin {
            Builtin::NewList => match arg_tys.as_slice() {
                [] => true,
                [cap] => *cap == Ty::Int,
                _ => false,
            },
            Builtin::NewArray => matches!(arg_tys.as_slice(), [n] if *n == Ty::Int),
            Builtin::Len => matches!(arg_tys.as_slice(), [x] if x.is_container()),
            Builtin::PutAt => matches!(
                arg_tys.as_slice(),
                [x, i, v] if x.is_container() && *i == Ty::Int && *v == Ty::Int
            ),
            Builtin::Push => matches!(
                arg_tys.as_slice(),
                [l, v] if *l == Ty::List && *v == Ty::Int
            ),
            Builtin::PopLast => matches!(arg_tys.as_slice(), [l] if *l == Ty::List),
            Builtin::GetAt => matches!(
                arg_tys.as_slice(),
                [x, i] if x.is_container() && *i == Ty::Int
            ),
            Builtin::Range => matches!(arg_tys.as_slice(), [n] if *n == Ty::Int),
        };
        if !ok {
            return Err(SemError::BadCall(builtin.usage()));
        }

        Ok(match builtin {
            Builtin::NewList | Builtin::Push | Builtin::Range => Ty::List,
            Builtin::NewArray => Ty::Array,
            Builtin::Len | Builtin::PutAt | Builtin::PopLast | Builtin::GetAt => Ty::Int,
        })
    }

    fn note_depth(&mut self, expr: &Expr) {
        self.max_stack = self.max_stack.max(expr_depth(expr));
    }
}

/// Evaluation-stack depth of an expression.
///
/// A non-short-circuit binary keeps its left operand pushed while the
/// right one evaluates, hence the `1 +` on the right branch. AND/OR never
/// push: the right side only runs after the left has been consumed.
/// Built-in calls follow the same discipline: every argument before the
/// last stays pushed while the later ones evaluate, so argument `i`
/// contributes `i` held slots on top of its own depth.
pub fn expr_depth(expr: &Expr) -> usize {
    match expr {
        Expr::Num(_) | Expr::Bool(_) | Expr::Var(_) | Expr::Str(_) => 0,
        Expr::Unary { expr, .. } => expr_depth(expr),
        Expr::Binary { op, left, right } => {
            if matches!(op, BinOp::And | BinOp::Or) {
                expr_depth(left).max(expr_depth(right))
            } else {
                expr_depth(left).max(1 + expr_depth(right))
            }
        }
        Expr::Call { args, .. } => args
            .iter()
            .enumerate()
            .map(|(i, a)| i + expr_depth(a))
            .max()
            .unwrap_or(0),
        Expr::Lambda { body, .. } => expr_depth(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Result<Analysis, SemError> {
        let tokens = cotlinc_lex::tokenize(src).unwrap();
        let program = cotlinc_par::parse(tokens).unwrap();
        analyze(&program)
    }

    #[test]
    fn let_records_types_in_declaration_order() {
        let analysis = run(
            "пусть a = 1\n\
             пусть l = создать.лист.цифр()\n\
             пусть m = создать.массив.цифр(3)",
        )
        .unwrap();
        assert_eq!(analysis.symbols.lookup("a").unwrap().ty, Ty::Int);
        assert_eq!(analysis.symbols.lookup("l").unwrap().ty, Ty::List);
        assert_eq!(analysis.symbols.lookup("m").unwrap().ty, Ty::Array);
        assert_eq!(analysis.symbols.lookup("m").unwrap().index, 2);
    }

    #[test]
    fn set_requires_matching_type() {
        assert!(matches!(
            run("пусть l = создать.лист.цифр(); l = 5"),
            Err(SemError::TypeMismatch(_))
        ));
        assert!(run("пусть l = создать.лист.цифр(); l = диапазон.от.0.до(3)").is_ok());
    }

    #[test]
    fn set_of_undeclared_variable_is_fatal() {
        assert!(matches!(
            run("x = 1"),
            Err(SemError::UnknownVariable(_))
        ));
    }

    #[test]
    fn print_accepts_int_and_string_literal_only() {
        assert!(run("исп.команду.print(1 + 2)").is_ok());
        assert!(run("исп.команду.print(\"привет\")").is_ok());
        assert!(matches!(
            run("пусть l = создать.лист.цифр(); исп.команду.print(l)"),
            Err(SemError::PrintArg)
        ));
    }

    #[test]
    fn builtin_arity_and_types_are_checked() {
        assert!(matches!(
            run("создать.массив.цифр()"),
            Err(SemError::BadCall(_))
        ));
        assert!(matches!(
            run("пусть l = создать.лист.цифр(); впихни.в.лист(l)"),
            Err(SemError::BadCall(_))
        ));
        assert!(matches!(
            run("сколько.внутри(5)"),
            Err(SemError::BadCall(_))
        ));
        assert!(matches!(
            run("неизвестный.вызов(1)"),
            Err(SemError::UnknownCall(_))
        ));
    }

    #[test]
    fn pop_requires_a_list_not_an_array() {
        assert!(matches!(
            run("пусть m = создать.массив.цифр(2); достань.последний(m)"),
            Err(SemError::BadCall(_))
        ));
    }

    #[test]
    fn lambda_types_check_but_cannot_be_bound() {
        assert!(matches!(
            run("пусть f = (x) => x + 1"),
            Err(SemError::BadLet)
        ));
        // A lambda whose body uses an unknown name still fails resolution.
        assert!(matches!(
            run("пусть f = (x) => y"),
            Err(SemError::UnknownVariable(_))
        ));
    }

    #[test]
    fn binary_depth_reserves_a_slot_for_the_left_operand() {
        // 1 + 2: left pushed while right evaluates.
        assert_eq!(run("исп.команду.print(1 + 2)").unwrap().max_stack, 1);
        // Left association: (1+2)+3 re-uses the same single slot.
        assert_eq!(run("исп.команду.print(1 + 2 + 3)").unwrap().max_stack, 1);
        // Right-heavy nesting stacks up.
        assert_eq!(
            run("исп.команду.print(1 + (2 + (3 + 4)))").unwrap().max_stack,
            3
        );
    }

    #[test]
    fn short_circuit_does_not_push() {
        let analysis = run("исп.команду.print(1 и.также 2 или.иначе 3)").unwrap();
        assert_eq!(analysis.max_stack, 0);
        // But their operands still contribute their own depth.
        let analysis = run("исп.команду.print(1 + 2 и.также 3 + 4)").unwrap();
        assert_eq!(analysis.max_stack, 1);
    }

    #[test]
    fn call_arguments_before_the_last_hold_stack_slots() {
        // Argument 2 evaluates with arguments 0 and 1 still pushed:
        // max(0+0, 1+1, 2+2) = 4.
        let analysis =
            run("пусть m = создать.массив.цифр(9); сунь.по.индексу(m, 1 + 2, 3 + (4 + 5))").unwrap();
        assert_eq!(analysis.max_stack, 4);
    }

    #[test]
    fn nested_builtin_calls_stack_their_pinned_receivers() {
        // Outer put holds two slots while the inner get holds one more.
        let analysis = run(
            "пусть m = создать.массив.цифр(4)\n\
             пусть r = диапазон.от.0.до(4)\n\
             сунь.по.индексу(m, 1, дай.по.индексу(r, 3))",
        )
        .unwrap();
        assert_eq!(analysis.max_stack, 3);
    }

    #[test]
    fn repeat_depth_counts_static_nesting() {
        let analysis = run(
            "повторять.раз 2 { повторять.раз 2 { исп.команду.print(0) } }\n\
             повторять.раз 2 { исп.команду.print(1) }",
        )
        .unwrap();
        assert_eq!(analysis.max_repeat, 2);
    }

    #[test]
    fn bool_literals_are_integers() {
        let analysis = run("пусть t = истина.ок; исп.команду.print(t)").unwrap();
        assert_eq!(analysis.symbols.lookup("t").unwrap().ty, Ty::Int);
    }
}
