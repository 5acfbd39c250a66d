use std::fmt;

/// Operators that may appear at the head of a form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
    Lt,
    Eq,
    If,
    Begin,
    For,
    FoodHere,
    FoodAhead,
    MyEnergy,
    Move,
    MoveBack,
    TurnLeft,
    TurnRight,
    TurnRandom,
    Eat,
    Fork,
    Hit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Arithmetic,
    Comparison,
    Control,
    Sensor,
    Action,
}

pub const COMPARISONS: [Op; 3] = [Op::Gt, Op::Lt, Op::Eq];
pub const SENSORS: [Op; 3] = [Op::FoodHere, Op::FoodAhead, Op::MyEnergy];
pub const ACTIONS: [Op; 8] = [
    Op::Move,
    Op::MoveBack,
    Op::TurnLeft,
    Op::TurnRight,
    Op::TurnRandom,
    Op::Eat,
    Op::Fork,
    Op::Hit,
];

const ALL_OPS: [Op; 21] = [
    Op::Add,
    Op::Sub,
    Op::Mul,
    Op::Div,
    Op::Gt,
    Op::Lt,
    Op::Eq,
    Op::If,
    Op::Begin,
    Op::For,
    Op::FoodHere,
    Op::FoodAhead,
    Op::MyEnergy,
    Op::Move,
    Op::MoveBack,
    Op::TurnLeft,
    Op::TurnRight,
    Op::TurnRandom,
    Op::Eat,
    Op::Fork,
    Op::Hit,
];

impl Op {
    pub const fn label(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Eq => "=",
            Op::If => "if",
            Op::Begin => "begin",
            Op::For => "for",
            Op::FoodHere => "food-here",
            Op::FoodAhead => "food-ahead",
            Op::MyEnergy => "my-energy",
            Op::Move => "move",
            Op::MoveBack => "move-back",
            Op::TurnLeft => "turn-left",
            Op::TurnRight => "turn-right",
            Op::TurnRandom => "turn-random",
            Op::Eat => "eat",
            Op::Fork => "fork",
            Op::Hit => "hit",
        }
    }

    pub const fn kind(self) -> OpKind {
        match self {
            Op::Add | Op::Sub | Op::Mul | Op::Div => OpKind::Arithmetic,
            Op::Gt | Op::Lt | Op::Eq => OpKind::Comparison,
            Op::If | Op::Begin | Op::For => OpKind::Control,
            Op::FoodHere | Op::FoodAhead | Op::MyEnergy => OpKind::Sensor,
            Op::Move
            | Op::MoveBack
            | Op::TurnLeft
            | Op::TurnRight
            | Op::TurnRandom
            | Op::Eat
            | Op::Fork
            | Op::Hit => OpKind::Action,
        }
    }

    /// Number of arguments a well-formed form carries; `None` for `begin`.
    pub const fn arity(self) -> Option<usize> {
        match self.kind() {
            OpKind::Arithmetic | OpKind::Comparison => Some(2),
            OpKind::Sensor => Some(0),
            OpKind::Action => match self {
                Op::Fork => Some(1),
                _ => Some(0),
            },
            OpKind::Control => match self {
                Op::If => Some(3),
                Op::For => Some(2),
                _ => None,
            },
        }
    }

    pub fn from_name(name: &str) -> Option<Op> {
        ALL_OPS.iter().copied().find(|op| op.label() == name)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}


/// A genetic-programming expression.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Expr {
    #[default]
    Nil,
    Num(i64),
    Sym(Op),
    Form(Op, Vec<Expr>),
}

impl Expr {
    pub fn form(op: Op, args: Vec<Expr>) -> Self {
        Expr::Form(op, args)
    }

    /// Zero-argument form such as `(eat)` or `(food-here)`.
    pub fn call(op: Op) -> Self {
        Expr::Form(op, Vec::new())
    }

    pub fn op(&self) -> Option<Op> {
        match self {
            Expr::Form(op, _) => Some(*op),
            _ => None,
        }
    }

    pub fn args(&self) -> &[Expr] {
        match self {
            Expr::Form(_, args) => args,
            _ => &[],
        }
    }

    /// Child at `index` of a form's argument list.
    pub fn arg(&self, index: usize) -> Option<&Expr> {
        self.args().get(index)
    }

    /// Follows a path of argument indices from this node.
    pub fn get(&self, path: &[usize]) -> Option<&Expr> {
        let mut node = self;
        for &idx in path {
            node = node.arg(idx)?;
        }
        Some(node)
    }

    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Expr> {
        let mut node = self;
        for &idx in path {
            node = match node {
                Expr::Form(_, args) => args.get_mut(idx)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Total number of nodes, the root included.
    pub fn node_count(&self) -> usize {
        1 + self.args().iter().map(Expr::node_count).sum::<usize>()
    }

    /// Checks that every form carries the argument count its operator expects.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Expr::Form(op, args) => {
                let arity_ok = match op.arity() {
                    Some(n) => args.len() == n,
                    None => true,
                };
                arity_ok && args.iter().all(Expr::is_well_formed)
            }
            _ => true,
        }
    }

    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        write_sexp(self, &mut out);
        out
    }

    /// Indented rendering; leaf-only and sensor forms stay on one line.
    pub fn to_pretty(&self) -> String {
        let mut out = String::new();
        write_pretty(self, 0, &mut out);
        out
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Num(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sexp())
    }
}

fn write_atom(expr: &Expr, out: &mut String) -> bool {
    match expr {
        Expr::Nil => out.push_str("nil"),
        Expr::Num(n) => out.push_str(&n.to_string()),
        Expr::Sym(op) => out.push_str(op.label()),
        Expr::Form(..) => return false,
    }
    true
}

fn write_sexp(expr: &Expr, out: &mut String) {
    if write_atom(expr, out) {
        return;
    }
    let Expr::Form(op, args) = expr else {
        return;
    };
    out.push('(');
    out.push_str(op.label());
    for arg in args {
        out.push(' ');
        write_sexp(arg, out);
    }
    out.push(')');
}

fn write_pretty(expr: &Expr, indent: usize, out: &mut String) {
    if write_atom(expr, out) {
        return;
    }
    let Expr::Form(op, args) = expr else {
        return;
    };
    let inline = args.is_empty()
        || op.kind() == OpKind::Sensor
        || args.iter().all(|a| !matches!(a, Expr::Form(..)));
    if inline {
        write_sexp(expr, out);
        return;
    }

    let pad = "  ".repeat(indent + 1);
    out.push('(');
    out.push_str(op.label());
    for arg in args {
        out.push('\n');
        out.push_str(&pad);
        write_pretty(arg, indent + 1, out);
    }
    out.push(')');
}

/// Starting program for spawned agents: graze, breed when rich, search otherwise.
pub fn herbivore() -> Expr {
    use Expr::{Nil, Num};
    let call = Expr::call;
    let gt = |lhs: Expr, rhs: i64| Expr::form(Op::Gt, vec![lhs, Num(rhs)]);

    Expr::form(
        Op::Begin,
        vec![Expr::form(
            Op::If,
            vec![
                gt(call(Op::FoodHere), 0),
                Expr::form(
                    Op::Begin,
                    vec![
                        call(Op::Eat),
                        Expr::form(
                            Op::If,
                            vec![
                                gt(call(Op::MyEnergy), 700),
                                Expr::form(Op::Fork, vec![Num(30)]),
                                Nil,
                            ],
                        ),
                    ],
                ),
                Expr::form(
                    Op::If,
                    vec![
                        gt(call(Op::FoodAhead), 0),
                        call(Op::Move),
                        Expr::form(
                            Op::Begin,
                            vec![
                                Expr::form(
                                    Op::For,
                                    vec![
                                        Num(3),
                                        Expr::form(
                                            Op::Begin,
                                            vec![
                                                call(Op::TurnLeft),
                                                Expr::form(
                                                    Op::If,
                                                    vec![
                                                        gt(call(Op::FoodAhead), 0),
                                                        call(Op::Move),
                                                        Nil,
                                                    ],
                                                ),
                                            ],
                                        ),
                                    ],
                                ),
                                Expr::form(
                                    Op::For,
                                    vec![
                                        Num(4),
                                        Expr::form(
                                            Op::If,
                                            vec![
                                                gt(call(Op::FoodHere), 0),
                                                call(Op::Eat),
                                                call(Op::Move),
                                            ],
                                        ),
                                    ],
                                ),
                            ],
                        ),
                    ],
                ),
            ],
        )],
    )
}
