//! Lightweight peephole optimiser for the flattened stack IR.
//!
//! Pass pipeline
//! -------------
//!  1. **fold_consts** – constant propagation, including constant powers.
//!  2. **fuse_fma**    – recognise `a*b+c` and `a*b-c` sequences and emit the
//!                       dedicated `Fma` / `Fmsub` opcode.
//!
//! The optimiser iterates the pipeline until a fix-point is reached. It has no
//! Cranelift dependencies, so its tests run without a JIT.

use crate::expr::{powi_by_squaring, FlattenedExpr, LinearOp};

/// Run all optimisation passes until nothing changes.
pub fn optimize(flattened: FlattenedExpr) -> FlattenedExpr {
    let mut ops = flattened.ops;
    loop {
        let len_before = ops.len();
        ops = fold_consts(ops);
        ops = fuse_fma(ops);
        if ops.len() == len_before {
            break;
        }
    }

    FlattenedExpr { ops, ..flattened }
}

// ────────────────────────────────────────────────────────────────────────────
//  Pass 1 – constant folding
// ────────────────────────────────────────────────────────────────────────────
fn fold_consts(ops: Vec<LinearOp>) -> Vec<LinearOp> {
    use LinearOp::*;

    // Mirrors the instruction stream on a stack of `Option<f64>`: Some when the
    // slot is a compile-time constant. A constant slot is always produced by
    // exactly one trailing `LoadConst` in `out`.
    let mut out: Vec<LinearOp> = Vec::with_capacity(ops.len());
    let mut cstk: Vec<Option<f64>> = Vec::with_capacity(8);

    let push_const = |c: f64, out: &mut Vec<LinearOp>, cstk: &mut Vec<Option<f64>>| {
        out.push(LoadConst(c));
        cstk.push(Some(c));
    };

    for op in ops {
        match op {
            LoadConst(c) => push_const(c, &mut out, &mut cstk),
            LoadInput => {
                out.push(LoadInput);
                cstk.push(None);
            }

            Neg | PowConst(_) | PowFloat(_) => match cstk.pop().flatten() {
                Some(cv) => {
                    let res = match op {
                        Neg => -cv,
                        PowConst(e) => powi_by_squaring(cv, e),
                        PowFloat(e) => cv.powf(e),
                        _ => unreachable!(),
                    };
                    out.pop();
                    push_const(res, &mut out, &mut cstk);
                }
                None => {
                    out.push(op);
                    cstk.push(None);
                }
            },

            Add | Sub | Mul | Div => {
                let rhs = cstk.pop().flatten();
                let lhs = cstk.pop().flatten();
                match (lhs, rhs) {
                    (Some(a), Some(b)) => {
                        let res = match op {
                            Add => a + b,
                            Sub => a - b,
                            Mul => a * b,
                            Div => a / b,
                            _ => unreachable!(),
                        };
                        out.truncate(out.len() - 2);
                        push_const(res, &mut out, &mut cstk);
                    }
                    _ => {
                        out.push(op);
                        cstk.push(None);
                    }
                }
            }

            Fma | Fmsub => {
                let c = cstk.pop().flatten();
                let b = cstk.pop().flatten();
                let a = cstk.pop().flatten();
                if let (Some(aa), Some(bb), Some(cc)) = (a, b, c) {
                    let res = if matches!(op, Fma) {
                        aa.mul_add(bb, cc)
                    } else {
                        aa.mul_add(bb, -cc)
                    };
                    out.truncate(out.len() - 3);
                    push_const(res, &mut out, &mut cstk);
                } else {
                    out.push(op);
                    cstk.push(None);
                }
            }
        }
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
//  Pass 2 – FMA / FMSUB fusion (pattern length = 5 ops)
// ────────────────────────────────────────────────────────────────────────────
fn fuse_fma(ops: Vec<LinearOp>) -> Vec<LinearOp> {
    use LinearOp::*;
    let mut out = Vec::with_capacity(ops.len());
    let mut i = 0;

    while i < ops.len() {
        if i + 4 < ops.len() {
            let window = (&ops[i], &ops[i + 1], &ops[i + 2], &ops[i + 3], &ops[i + 4]);
            let fused = match window {
                (
                    LoadInput | LoadConst(_),
                    LoadInput | LoadConst(_),
                    Mul,
                    LoadInput | LoadConst(_),
                    Add,
                ) => Some(Fma),
                (
                    LoadInput | LoadConst(_),
                    LoadInput | LoadConst(_),
                    Mul,
                    LoadInput | LoadConst(_),
                    Sub,
                ) => Some(Fmsub),
                _ => None,
            };
            if let Some(fused) = fused {
                out.extend_from_slice(&ops[i..i + 2]);
                out.push(ops[i + 3].clone());
                out.push(fused);
                i += 5;
                continue;
            }
        }
        out.push(ops[i].clone());
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use LinearOp::*;

    fn flat(ops: Vec<LinearOp>) -> FlattenedExpr {
        FlattenedExpr {
            ops,
            reads_input: true,
            constant_result: None,
        }
    }

    #[test]
    fn test_folds_constant_subexpressions() {
        // x + (2 * 3)
        let out = optimize(flat(vec![
            LoadInput,
            LoadConst(2.0),
            LoadConst(3.0),
            Mul,
            Add,
        ]));
        assert_eq!(out.ops, vec![LoadInput, LoadConst(6.0), Add]);
    }

    #[test]
    fn test_folds_constant_powers() {
        // 2^3 * x + 4^0.5
        let out = optimize(flat(vec![
            LoadConst(2.0),
            PowConst(3),
            LoadInput,
            Mul,
            LoadConst(4.0),
            PowFloat(0.5),
            Add,
        ]));
        assert_eq!(out.ops, vec![LoadConst(8.0), LoadInput, LoadConst(2.0), Fma]);
    }

    #[test]
    fn test_fuses_multiply_subtract() {
        let out = optimize(flat(vec![LoadConst(3.0), LoadInput, Mul, LoadInput, Sub]));
        assert_eq!(out.ops, vec![LoadConst(3.0), LoadInput, LoadInput, Fmsub]);
    }

    #[test]
    fn test_keeps_non_constant_powers() {
        let ops = vec![LoadInput, PowFloat(0.25), LoadInput, PowConst(-3), Add];
        assert_eq!(optimize(flat(ops.clone())).ops, ops);
    }

    #[test]
    fn test_division_by_zero_folds_to_infinity() {
        let out = optimize(flat(vec![LoadConst(1.0), LoadConst(0.0), Div, LoadInput, Add]));
        assert_eq!(out.ops, vec![LoadConst(f64::INFINITY), LoadInput, Add]);
    }
}
