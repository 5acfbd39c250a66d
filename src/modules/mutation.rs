use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::modules::program::{ACTIONS, COMPARISONS, Expr, Op, OpKind, SENSORS};

const WALK_SPAN: i64 = 20;
const COMPARE_LIMIT: i64 = 100;
const FORK_PERCENT_MIN: i64 = 20;
const FORK_PERCENT_MAX: i64 = 80;
const WRAP_LOOP_COUNT: i64 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Wrap the node in new control flow.
    Complexify,
    /// Rewrite the node in place according to its kind.
    PointMutate,
    /// Repeat the node inside a `begin`.
    Duplicate,
    /// Collapse the node to a simpler descendant or nil.
    Simplify,
}

impl MutationKind {
    pub const ALL: [MutationKind; 4] = [
        MutationKind::Complexify,
        MutationKind::PointMutate,
        MutationKind::Duplicate,
        MutationKind::Simplify,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            MutationKind::Complexify => "complexify",
            MutationKind::PointMutate => "point",
            MutationKind::Duplicate => "duplicate",
            MutationKind::Simplify => "simplify",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Child program with exactly one structural mutation applied.
pub fn mutate<R: Rng>(program: &Expr, rng: &mut R) -> Expr {
    mutate_traced(program, rng).0
}

/// Like [`mutate`], also reporting which operator ran; `None` when the
/// program has no node below the root.
pub fn mutate_traced<R: Rng>(program: &Expr, rng: &mut R) -> (Expr, Option<MutationKind>) {
    let candidates = program.node_count() - 1;
    if candidates == 0 {
        return (program.clone(), None);
    }
    let target = rng.gen_range(0..candidates);
    let Some(path) = nth_path(program, target) else {
        return (program.clone(), None);
    };
    let kind = MutationKind::ALL[rng.gen_range(0..MutationKind::ALL.len())];
    (apply(program, &path, kind, rng), Some(kind))
}

/// Applies `kind` at `path` (non-empty) to a copy of `program`.
pub fn apply<R: Rng>(program: &Expr, path: &[usize], kind: MutationKind, rng: &mut R) -> Expr {
    let mut out = program.clone();
    let Some((&index, parent_path)) = path.split_last() else {
        return out;
    };
    let Some(parent) = out.get_mut(parent_path) else {
        return out;
    };
    let Expr::Form(parent_op, siblings) = parent else {
        return out;
    };
    let Some(node) = siblings.get(index).cloned() else {
        return out;
    };

    match kind {
        MutationKind::Complexify => {
            siblings[index] = if rng.gen_bool(0.5) {
                Expr::form(Op::If, vec![random_comparison(rng), node.clone(), node])
            } else {
                Expr::form(Op::For, vec![Expr::Num(WRAP_LOOP_COUNT), node])
            };
        }
        MutationKind::PointMutate => siblings[index] = point_mutate(node, rng),
        MutationKind::Duplicate => {
            if *parent_op == Op::Begin {
                siblings.insert(index, node);
            } else {
                siblings[index] = Expr::form(Op::Begin, vec![node.clone(), node]);
            }
        }
        MutationKind::Simplify => siblings[index] = simplify(node, rng),
    }
    out
}

/// Path of the `n`-th node below the root in pre-order.
pub fn nth_path(program: &Expr, n: usize) -> Option<Vec<usize>> {
    fn walk(node: &Expr, remaining: &mut usize, path: &mut Vec<usize>) -> bool {
        for (idx, child) in node.args().iter().enumerate() {
            path.push(idx);
            if *remaining == 0 {
                return true;
            }
            *remaining -= 1;
            if walk(child, remaining, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    let mut remaining = n;
    let mut path = Vec::new();
    walk(program, &mut remaining, &mut path).then_some(path)
}

pub fn random_action<R: Rng>(rng: &mut R) -> Expr {
    let op = ACTIONS[rng.gen_range(0..ACTIONS.len())];
    if op == Op::Fork {
        let percent = rng.gen_range(FORK_PERCENT_MIN..FORK_PERCENT_MAX);
        return Expr::form(op, vec![Expr::Num(percent)]);
    }
    Expr::call(op)
}

pub fn random_sensor<R: Rng>(rng: &mut R) -> Expr {
    Expr::call(SENSORS[rng.gen_range(0..SENSORS.len())])
}

/// `(cmp (sensor) n)` with a random comparison, sensor, and threshold.
pub fn random_comparison<R: Rng>(rng: &mut R) -> Expr {
    let sensor = random_sensor(rng);
    let threshold = rng.gen_range(0..COMPARE_LIMIT);
    let op = COMPARISONS[rng.gen_range(0..COMPARISONS.len())];
    Expr::form(op, vec![sensor, Expr::Num(threshold)])
}

fn point_mutate<R: Rng>(node: Expr, rng: &mut R) -> Expr {
    match node {
        Expr::Nil => random_action(rng),
        Expr::Num(n) => Expr::Num((n + rng.gen_range(-WALK_SPAN..WALK_SPAN)).max(0)),
        Expr::Sym(op) => Expr::Sym(op),
        Expr::Form(op, mut args) => match op.kind() {
            OpKind::Sensor => random_sensor(rng),
            OpKind::Action => random_action(rng),
            OpKind::Comparison => {
                let op = COMPARISONS[rng.gen_range(0..COMPARISONS.len())];
                Expr::form(op, args)
            }
            OpKind::Control => match op {
                Op::If => {
                    if args.len() >= 3 {
                        args.swap(1, 2);
                    }
                    Expr::form(op, args)
                }
                Op::For => {
                    let count = match args.first() {
                        Some(Expr::Num(n)) if *n != 0 => *n,
                        _ => WRAP_LOOP_COUNT,
                    };
                    let step = if rng.gen_bool(0.5) { 1 } else { -1 };
                    let body = args.into_iter().nth(1).unwrap_or_default();
                    Expr::form(op, vec![Expr::Num((count + step).max(1)), body])
                }
                _ => {
                    args.shuffle(rng);
                    Expr::form(op, args)
                }
            },
            OpKind::Arithmetic => Expr::form(op, args),
        },
    }
}

fn simplify<R: Rng>(node: Expr, rng: &mut R) -> Expr {
    let Expr::Form(op, args) = node else {
        return Expr::Nil;
    };
    let pick = |index: usize, args: Vec<Expr>| args.into_iter().nth(index).unwrap_or_default();

    match op {
        Op::If => {
            let branch = if rng.gen_bool(0.5) { 1 } else { 2 };
            pick(branch, args)
        }
        Op::For => pick(1, args),
        Op::Begin if !args.is_empty() => {
            let index = rng.gen_range(0..args.len());
            pick(index, args)
        }
        _ => Expr::Nil,
    }
}
