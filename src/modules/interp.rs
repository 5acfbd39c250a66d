use std::fmt;

use crate::modules::program::{Expr, Op, OpKind};

/// Node visits allowed per resumption before evaluation pauses on its own.
pub const DEFAULT_STEP_BUDGET: usize = 100_000;

static NIL: Expr = Expr::Nil;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value {
    Nil,
    Bool(bool),
    Num(i64),
    Sym(Op),
}

impl Value {
    pub fn is_truthy(self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => b,
            Value::Num(n) => n != 0,
            Value::Sym(_) => true,
        }
    }

    pub fn as_num(self) -> i64 {
        match self {
            Value::Num(n) => n,
            Value::Bool(true) => 1,
            Value::Bool(false) | Value::Nil | Value::Sym(_) => 0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Num(n) => write!(f, "{}", n),
            Value::Sym(op) => write!(f, "{}", op),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sensor {
    FoodHere,
    FoodAhead,
    MyEnergy,
}

impl Sensor {
    pub const fn from_op(op: Op) -> Option<Sensor> {
        match op {
            Op::FoodHere => Some(Sensor::FoodHere),
            Op::FoodAhead => Some(Sensor::FoodAhead),
            Op::MyEnergy => Some(Sensor::MyEnergy),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Move,
    MoveBack,
    TurnLeft,
    TurnRight,
    TurnRandom,
    Eat,
    Fork { percent: i64 },
    Hit,
}

impl Action {
    pub const fn label(&self) -> &'static str {
        match self {
            Action::Move => "move",
            Action::MoveBack => "move-back",
            Action::TurnLeft => "turn-left",
            Action::TurnRight => "turn-right",
            Action::TurnRandom => "turn-random",
            Action::Eat => "eat",
            Action::Fork { .. } => "fork",
            Action::Hit => "hit",
        }
    }

    /// Argument-free actions; `fork` is built once its argument is known.
    const fn simple(op: Op) -> Option<Action> {
        match op {
            Op::Move => Some(Action::Move),
            Op::MoveBack => Some(Action::MoveBack),
            Op::TurnLeft => Some(Action::TurnLeft),
            Op::TurnRight => Some(Action::TurnRight),
            Op::TurnRandom => Some(Action::TurnRandom),
            Op::Eat => Some(Action::Eat),
            Op::Hit => Some(Action::Hit),
            _ => None,
        }
    }
}

/// What the interpreter needs from the agent it drives.
pub trait Host {
    fn sense(&self, sensor: Sensor) -> i64;
    fn act(&mut self, action: Action);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resumption {
    /// Exactly one action ran; the next call continues after it.
    Suspended(Action),
    /// The step budget ran out before reaching an action.
    OutOfSteps,
    /// The root form finished; the next call starts over from the root.
    Completed(Value),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Start,
    Left,
    Right(Value),
    Test,
    Branch,
    Body { next: usize, last: Value },
    Count,
    Repeat { remaining: i64 },
    Argument,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Frame {
    slot: usize,
    stage: Stage,
    received: Option<Value>,
}

impl Frame {
    fn new(slot: usize) -> Self {
        Self {
            slot,
            stage: Stage::Start,
            received: None,
        }
    }
}

enum Flow {
    Push(usize),
    Continue,
    Finish(Value),
    Yield(Action),
}

/// Suspended evaluation state of one program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Execution {
    frames: Vec<Frame>,
}

impl Execution {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no evaluation is in flight.
    pub fn is_idle(&self) -> bool {
        self.frames.is_empty()
    }

    /// Runs `program` until one action executes, the root completes, or
    /// `max_steps` nodes have been visited.
    pub fn resume<H: Host + ?Sized>(
        &mut self,
        program: &Expr,
        host: &mut H,
        max_steps: usize,
    ) -> Resumption {
        if self.frames.is_empty() {
            self.frames.push(Frame::new(0));
        }

        let mut steps = 0usize;
        loop {
            if steps >= max_steps {
                return Resumption::OutOfSteps;
            }
            steps += 1;

            let node = locate(program, &self.frames);
            let Some(frame) = self.frames.last_mut() else {
                return Resumption::Completed(Value::Nil);
            };
            let received = frame.received.take();

            let flow = match node {
                Expr::Nil => Flow::Finish(Value::Bool(false)),
                Expr::Num(n) => Flow::Finish(Value::Num(*n)),
                Expr::Sym(op) => Flow::Finish(Value::Sym(*op)),
                Expr::Form(op, args) => step_form(*op, args.len(), frame, received, host),
            };

            match flow {
                Flow::Push(slot) => self.frames.push(Frame::new(slot)),
                Flow::Continue => {}
                Flow::Yield(action) => return Resumption::Suspended(action),
                Flow::Finish(value) => {
                    self.frames.pop();
                    match self.frames.last_mut() {
                        Some(parent) => parent.received = Some(value),
                        None => return Resumption::Completed(value),
                    }
                }
            }
        }
    }
}

/// Convenience wrapper using [`DEFAULT_STEP_BUDGET`].
pub fn resume<H: Host + ?Sized>(
    program: &Expr,
    execution: &mut Execution,
    host: &mut H,
) -> Resumption {
    execution.resume(program, host, DEFAULT_STEP_BUDGET)
}

fn locate<'p>(program: &'p Expr, frames: &[Frame]) -> &'p Expr {
    let mut node = program;
    for frame in frames.iter().skip(1) {
        node = match node.arg(frame.slot) {
            Some(child) => child,
            None => return &NIL,
        };
    }
    node
}

fn step_form<H: Host + ?Sized>(
    op: Op,
    argc: usize,
    frame: &mut Frame,
    received: Option<Value>,
    host: &mut H,
) -> Flow {
    let incoming = received.unwrap_or(Value::Nil);

    match op.kind() {
        OpKind::Arithmetic | OpKind::Comparison => match frame.stage {
            Stage::Start => {
                frame.stage = Stage::Left;
                Flow::Push(0)
            }
            Stage::Left => {
                frame.stage = Stage::Right(incoming);
                Flow::Push(1)
            }
            // `=` is strict: values of different kinds never compare equal.
            Stage::Right(left) if op == Op::Eq => Flow::Finish(Value::Bool(left == incoming)),
            Stage::Right(left) => Flow::Finish(combine(op, left.as_num(), incoming.as_num())),
            _ => Flow::Finish(Value::Bool(false)),
        },
        OpKind::Sensor => match Sensor::from_op(op) {
            Some(sensor) => Flow::Finish(Value::Num(host.sense(sensor))),
            None => Flow::Finish(Value::Bool(false)),
        },
        OpKind::Control => match op {
            Op::If => match frame.stage {
                Stage::Start => {
                    frame.stage = Stage::Test;
                    Flow::Push(0)
                }
                Stage::Test => {
                    frame.stage = Stage::Branch;
                    Flow::Push(if incoming.is_truthy() { 1 } else { 2 })
                }
                _ => Flow::Finish(incoming),
            },
            Op::Begin => match frame.stage {
                Stage::Start => {
                    frame.stage = Stage::Body {
                        next: 0,
                        last: Value::Nil,
                    };
                    Flow::Continue
                }
                Stage::Body { next, last } => {
                    let last = if received.is_some() { incoming } else { last };
                    if next < argc {
                        frame.stage = Stage::Body {
                            next: next + 1,
                            last,
                        };
                        Flow::Push(next)
                    } else {
                        Flow::Finish(last)
                    }
                }
                _ => Flow::Finish(Value::Nil),
            },
            Op::For => match frame.stage {
                Stage::Start => {
                    frame.stage = Stage::Count;
                    Flow::Push(0)
                }
                Stage::Count => {
                    frame.stage = Stage::Repeat {
                        remaining: incoming.as_num(),
                    };
                    Flow::Continue
                }
                Stage::Repeat { remaining } if remaining > 0 => {
                    frame.stage = Stage::Repeat {
                        remaining: remaining - 1,
                    };
                    Flow::Push(1)
                }
                _ => Flow::Finish(Value::Nil),
            },
            _ => Flow::Finish(Value::Bool(false)),
        },
        OpKind::Action => match frame.stage {
            Stage::Done => Flow::Finish(Value::Nil),
            Stage::Start if op == Op::Fork => {
                frame.stage = Stage::Argument;
                Flow::Push(0)
            }
            Stage::Argument => {
                let action = Action::Fork {
                    percent: incoming.as_num(),
                };
                frame.stage = Stage::Done;
                host.act(action);
                Flow::Yield(action)
            }
            _ => match Action::simple(op) {
                Some(action) => {
                    frame.stage = Stage::Done;
                    host.act(action);
                    Flow::Yield(action)
                }
                None => Flow::Finish(Value::Bool(false)),
            },
        },
    }
}

fn combine(op: Op, left: i64, right: i64) -> Value {
    match op {
        Op::Add => Value::Num(left.wrapping_add(right)),
        Op::Sub => Value::Num(left.wrapping_sub(right)),
        Op::Mul => Value::Num(left.wrapping_mul(right)),
        Op::Div => {
            if right == 0 {
                Value::Num(0)
            } else {
                Value::Num(left.wrapping_div(right))
            }
        }
        Op::Gt => Value::Bool(left > right),
        Op::Lt => Value::Bool(left < right),
        _ => Value::Bool(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::program::herbivore;

    #[derive(Default)]
    struct ScriptedHost {
        food_here: i64,
        food_ahead: i64,
        energy: i64,
        performed: Vec<Action>,
    }

    impl Host for ScriptedHost {
        fn sense(&self, sensor: Sensor) -> i64 {
            match sensor {
                Sensor::FoodHere => self.food_here,
                Sensor::FoodAhead => self.food_ahead,
                Sensor::MyEnergy => self.energy,
            }
        }

        fn act(&mut self, action: Action) {
            if action == Action::Eat {
                self.energy += self.food_here;
                self.food_here = 0;
            }
            self.performed.push(action);
        }
    }

    fn eval_pure(expr: &Expr) -> Value {
        let mut host = ScriptedHost::default();
        let mut exec = Execution::new();
        match resume(expr, &mut exec, &mut host) {
            Resumption::Completed(v) => v,
            other => panic!("expected completion, got {:?}", other),
        }
    }

    fn binary(op: Op, a: i64, b: i64) -> Expr {
        Expr::form(op, vec![Expr::Num(a), Expr::Num(b)])
    }

    #[test]
    fn arithmetic_and_comparison() {
        assert_eq!(eval_pure(&binary(Op::Add, 2, 3)), Value::Num(5));
        assert_eq!(eval_pure(&binary(Op::Sub, 2, 3)), Value::Num(-1));
        assert_eq!(eval_pure(&binary(Op::Mul, 4, 3)), Value::Num(12));
        assert_eq!(eval_pure(&binary(Op::Div, 7, 2)), Value::Num(3));
        assert_eq!(eval_pure(&binary(Op::Div, -7, 2)), Value::Num(-3));
        assert_eq!(eval_pure(&binary(Op::Div, 7, 0)), Value::Num(0));
        assert_eq!(eval_pure(&binary(Op::Gt, 7, 0)), Value::Bool(true));
        assert_eq!(eval_pure(&binary(Op::Lt, 7, 0)), Value::Bool(false));
        assert_eq!(eval_pure(&binary(Op::Eq, 4, 4)), Value::Bool(true));
    }

    #[test]
    fn equality_does_not_coerce() {
        let empty_cell = Expr::form(Op::Eq, vec![Expr::call(Op::FoodHere), Expr::Nil]);
        assert_eq!(eval_pure(&empty_cell), Value::Bool(false));

        let truth_vs_one = Expr::form(Op::Eq, vec![binary(Op::Gt, 2, 1), Expr::Num(1)]);
        assert_eq!(eval_pure(&truth_vs_one), Value::Bool(false));

        let both_false = Expr::form(Op::Eq, vec![binary(Op::Lt, 2, 1), Expr::Nil]);
        assert_eq!(eval_pure(&both_false), Value::Bool(true));

        // Ordering still coerces: false counts as 0.
        let ordered = Expr::form(Op::Lt, vec![Expr::Nil, Expr::Num(1)]);
        assert_eq!(eval_pure(&ordered), Value::Bool(true));
    }

    #[test]
    fn literals_and_nil() {
        assert_eq!(eval_pure(&Expr::Num(9)), Value::Num(9));
        assert_eq!(eval_pure(&Expr::Nil), Value::Bool(false));
        assert_eq!(eval_pure(&Expr::Sym(Op::Eat)), Value::Sym(Op::Eat));
        assert_eq!(eval_pure(&Expr::form(Op::Begin, vec![])), Value::Nil);
    }

    #[test]
    fn if_picks_exactly_one_branch() {
        let expr = Expr::form(
            Op::If,
            vec![binary(Op::Gt, 1, 0), Expr::Num(10), Expr::Num(20)],
        );
        assert_eq!(eval_pure(&expr), Value::Num(10));
        let expr = Expr::form(
            Op::If,
            vec![binary(Op::Gt, 0, 1), Expr::Num(10), Expr::Num(20)],
        );
        assert_eq!(eval_pure(&expr), Value::Num(20));
    }

    #[test]
    fn missing_arguments_evaluate_as_nil() {
        let expr = Expr::form(Op::If, vec![Expr::Num(0)]);
        assert_eq!(eval_pure(&expr), Value::Bool(false));
        let expr = Expr::form(Op::Add, vec![Expr::Num(4)]);
        assert_eq!(eval_pure(&expr), Value::Num(4));
    }

    #[test]
    fn sensors_do_not_suspend() {
        let mut host = ScriptedHost {
            food_here: 12,
            food_ahead: 3,
            energy: 40,
            ..Default::default()
        };
        let expr = Expr::form(
            Op::Add,
            vec![Expr::call(Op::FoodHere), Expr::call(Op::MyEnergy)],
        );
        let mut exec = Execution::new();
        assert_eq!(
            resume(&expr, &mut exec, &mut host),
            Resumption::Completed(Value::Num(52))
        );
        assert!(host.performed.is_empty());
    }

    #[test]
    fn one_action_per_resumption() {
        let program = Expr::form(
            Op::Begin,
            vec![
                Expr::call(Op::Eat),
                Expr::call(Op::Move),
                Expr::call(Op::TurnLeft),
            ],
        );
        let mut host = ScriptedHost::default();
        let mut exec = Execution::new();

        assert_eq!(
            resume(&program, &mut exec, &mut host),
            Resumption::Suspended(Action::Eat)
        );
        assert_eq!(host.performed.len(), 1);
        assert_eq!(
            resume(&program, &mut exec, &mut host),
            Resumption::Suspended(Action::Move)
        );
        assert_eq!(
            resume(&program, &mut exec, &mut host),
            Resumption::Suspended(Action::TurnLeft)
        );
        assert!(!exec.is_idle());
        assert_eq!(
            resume(&program, &mut exec, &mut host),
            Resumption::Completed(Value::Nil)
        );
        assert!(exec.is_idle());
        assert_eq!(host.performed.len(), 3);
    }

    #[test]
    fn loops_suspend_inside_each_iteration() {
        let program = Expr::form(
            Op::For,
            vec![
                Expr::Num(3),
                Expr::form(
                    Op::Begin,
                    vec![Expr::call(Op::TurnRight), Expr::call(Op::Move)],
                ),
            ],
        );
        let mut host = ScriptedHost::default();
        let mut exec = Execution::new();
        let mut suspensions = 0;
        loop {
            match resume(&program, &mut exec, &mut host) {
                Resumption::Suspended(_) => suspensions += 1,
                Resumption::Completed(_) => break,
                Resumption::OutOfSteps => panic!("tiny program exhausted its budget"),
            }
        }
        assert_eq!(suspensions, 6);
        assert_eq!(
            host.performed,
            vec![
                Action::TurnRight,
                Action::Move,
                Action::TurnRight,
                Action::Move,
                Action::TurnRight,
                Action::Move,
            ]
        );
    }

    #[test]
    fn non_positive_loop_count_skips_body() {
        let program = Expr::form(Op::For, vec![Expr::Num(-2), Expr::call(Op::Move)]);
        let mut host = ScriptedHost::default();
        let mut exec = Execution::new();
        assert_eq!(
            resume(&program, &mut exec, &mut host),
            Resumption::Completed(Value::Nil)
        );
        assert!(host.performed.is_empty());
    }

    #[test]
    fn fork_evaluates_its_argument_first() {
        let program = Expr::form(Op::Fork, vec![binary(Op::Add, 20, 5)]);
        let mut host = ScriptedHost::default();
        let mut exec = Execution::new();
        assert_eq!(
            resume(&program, &mut exec, &mut host),
            Resumption::Suspended(Action::Fork { percent: 25 })
        );
    }

    #[test]
    fn herbivore_eats_when_food_is_present() {
        let mut host = ScriptedHost {
            food_here: 50,
            energy: 200,
            ..Default::default()
        };
        let program = herbivore();
        let mut exec = Execution::new();
        assert_eq!(
            resume(&program, &mut exec, &mut host),
            Resumption::Suspended(Action::Eat)
        );
        // energy 250 is below the fork threshold, so the program finishes.
        assert_eq!(
            resume(&program, &mut exec, &mut host),
            Resumption::Completed(Value::Bool(false))
        );
    }

    #[test]
    fn budget_pauses_and_resumes_in_place() {
        let program = Expr::form(
            Op::Begin,
            vec![
                Expr::form(Op::For, vec![Expr::Num(50), Expr::call(Op::MyEnergy)]),
                Expr::call(Op::Eat),
            ],
        );
        let mut host = ScriptedHost::default();
        let mut exec = Execution::new();
        let mut pauses = 0;
        let outcome = loop {
            match exec.resume(&program, &mut host, 16) {
                Resumption::OutOfSteps => pauses += 1,
                other => break other,
            }
        };
        assert!(pauses > 0);
        assert_eq!(outcome, Resumption::Suspended(Action::Eat));
        assert_eq!(host.performed, vec![Action::Eat]);
    }

    #[test]
    fn truthiness_rules() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Num(0).is_truthy());
        assert!(Value::Num(-3).is_truthy());
        assert!(Value::Sym(Op::Move).is_truthy());
        assert_eq!(Value::Bool(true).as_num(), 1);
    }
}
