// ABOUTME: Trampolined CEK evaluator, combiner calling protocol, and operative invocation

use std::collections::HashSet;
use std::rc::Rc;

use crate::builtins;
use crate::cont::{abnormal_pass, ArgState, Continuation, Handler};
use crate::env::Environment;
use crate::error::{Condition, EvalAbort, InterpreterError};
use crate::reader;
use crate::value::{list_metrics, Combiner, Encapsulation, Operative, Pair, Value};

/// One machine state: either evaluate an expression in an environment,
/// or return a value to a continuation. The driver loop advances steps
/// until the root continuation is reached, so user recursion consumes
/// continuation frames instead of host stack.
pub enum Step {
    Eval {
        expr: Value,
        env: Rc<Environment>,
        cont: Rc<Continuation>,
    },
    Return {
        value: Value,
        cont: Rc<Continuation>,
    },
}

impl Step {
    pub fn eval(expr: Value, env: Rc<Environment>, cont: Rc<Continuation>) -> Step {
        Step::Eval { expr, env, cont }
    }

    pub fn ret(value: Value, cont: Rc<Continuation>) -> Step {
        Step::Return { value, cont }
    }
}

/// The interpreter: ground environment, the root and error
/// continuations, and the user environment evaluation happens in.
pub struct Interpreter {
    root: Rc<Continuation>,
    error: Rc<Continuation>,
    ground: Rc<Environment>,
    env: Rc<Environment>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Interpreter {
        let root = Continuation::root();
        let error = Continuation::new(Handler::Passthrough, &root);
        let ground = Environment::new();
        builtins::register(&ground);
        ground.define(
            Rc::from("root-continuation"),
            Value::Continuation(root.clone()),
        );
        ground.define(
            Rc::from("error-continuation"),
            Value::Continuation(error.clone()),
        );
        let env = Environment::with_parent(&ground);
        Interpreter {
            root,
            error,
            ground,
            env,
        }
    }

    /// The environment top-level expressions are evaluated in.
    pub fn env(&self) -> &Rc<Environment> {
        &self.env
    }

    /// Evaluates the prelude in a fresh child of the ground environment
    /// and reseats the user environment as a child of the result.
    pub fn load_prelude(&mut self, source: &str, filename: &str) -> Result<(), InterpreterError> {
        tracing::debug!(filename, "loading prelude");
        let exprs = reader::read_all(source, filename)?;
        let library = Environment::with_parent(&self.ground);
        for expr in &exprs {
            self.eval_in(&library, expr)?;
        }
        self.env = Environment::with_parent(&library);
        Ok(())
    }

    pub fn eval(&self, expr: &Value) -> Result<Value, EvalAbort> {
        self.eval_in(&self.env, expr)
    }

    pub fn eval_in(&self, env: &Rc<Environment>, expr: &Value) -> Result<Value, EvalAbort> {
        let top = Continuation::with_info(Handler::Passthrough, &self.root, expr.clone());
        self.run(Step::eval(expr.clone(), env.clone(), top))
    }

    /// Reads and evaluates every expression in `source`, collecting the
    /// results in order.
    pub fn eval_source(
        &self,
        source: &str,
        filename: &str,
    ) -> Result<Vec<Value>, InterpreterError> {
        let exprs = reader::read_all(source, filename)?;
        let mut results = Vec::with_capacity(exprs.len());
        for expr in &exprs {
            results.push(self.eval(expr)?);
        }
        Ok(results)
    }

    fn run(&self, mut step: Step) -> Result<Value, EvalAbort> {
        loop {
            step = match step {
                Step::Eval { expr, env, cont } => match step_expression(expr, env, &cont) {
                    Ok(next) => next,
                    Err(condition) => self.raise(cont, condition),
                },
                Step::Return { value, cont } => {
                    if Rc::ptr_eq(&cont, &self.root) {
                        return Ok(value);
                    }
                    if Rc::ptr_eq(&cont, &self.error) {
                        return Err(EvalAbort(value));
                    }
                    let parent = cont
                        .parent
                        .clone()
                        .expect("only the root continuation has no parent");
                    match apply_handler(&cont.handler, value, &parent) {
                        Ok(next) => next,
                        Err(condition) => self.raise(parent, condition),
                    }
                }
            };
        }
    }

    /// Converts a condition into an abnormal pass to the error
    /// continuation, carrying the source continuation for the trace.
    fn raise(&self, source: Rc<Continuation>, condition: Condition) -> Step {
        let mut items = vec![
            Value::Continuation(source.clone()),
            Value::string(condition.message),
        ];
        items.extend(condition.irritants);
        abnormal_pass(&source, &self.error, Value::list(items))
    }
}

fn step_expression(
    expr: Value,
    env: Rc<Environment>,
    cont: &Rc<Continuation>,
) -> Result<Step, Condition> {
    match expr {
        Value::Symbol(name) => match env.lookup(&name) {
            Some(value) => Ok(Step::ret(value, cont.clone())),
            None => Err(Condition::with(
                "binding not found",
                vec![Value::Symbol(name)],
            )),
        },
        Value::Pair(pair) => {
            let combiner_expr = pair.car();
            if let Value::Pair(inner) = &combiner_expr {
                if Rc::ptr_eq(inner, &pair) {
                    return Err(Condition::new(
                        "infinite recursive evaluation of combiner",
                    ));
                }
            }
            let frame = Continuation::with_info(
                Handler::Combine {
                    env: env.clone(),
                    operands: pair.cdr(),
                },
                cont,
                Value::Pair(pair.clone()),
            );
            Ok(Step::eval(combiner_expr, env, frame))
        }
        other => Ok(Step::ret(other, cont.clone())),
    }
}

fn apply_handler(
    handler: &Handler,
    value: Value,
    parent: &Rc<Continuation>,
) -> Result<Step, Condition> {
    match handler {
        Handler::Root | Handler::Passthrough => Ok(Step::ret(value, parent.clone())),
        Handler::Jump { target } => Ok(Step::ret(value, target.clone())),
        Handler::Combine { env, operands } => step_combine(value, env, operands, parent),
        Handler::Argument {
            state,
            index,
            wraps_left,
        } => step_argument(value, state, *index, *wraps_left, parent),
        Handler::Branch {
            env,
            consequent,
            alternative,
        } => match value {
            Value::Boolean(true) => Ok(Step::eval(consequent.clone(), env.clone(), parent.clone())),
            Value::Boolean(false) => {
                Ok(Step::eval(alternative.clone(), env.clone(), parent.clone()))
            }
            other => Err(Condition::with("expected boolean condition", vec![other])),
        },
        Handler::Define { env, pattern } => {
            bind_parameter_tree(env, pattern, &value)?;
            Ok(Step::ret(Value::Inert, parent.clone()))
        }
        Handler::Binds { name } => match value {
            Value::Environment(env) => Ok(Step::ret(
                Value::Boolean(env.lookup(name).is_some()),
                parent.clone(),
            )),
            other => Err(Condition::with(
                "second argument must be an environment",
                vec![other],
            )),
        },
        Handler::Sequence { env, rest } => match rest {
            Value::Nil => Ok(Step::ret(Value::Inert, parent.clone())),
            Value::Pair(next) => {
                let frame = Continuation::with_info(
                    Handler::Sequence {
                        env: env.clone(),
                        rest: next.cdr(),
                    },
                    parent,
                    next.car(),
                );
                Ok(Step::eval(next.car(), env.clone(), frame))
            }
            other => Err(Condition::with("unknown expression type", vec![other.clone()])),
        },
        Handler::Invoke { env, operative } => invoke_operative(operative, env, value, parent),
        Handler::Intercept { interceptor, outer } => {
            let divert = Value::Combiner(Combiner::new(
                1,
                Rc::new(Operative::AbnormalPass {
                    target: outer.clone(),
                }),
            ));
            let operand = Value::list(vec![value, divert]);
            invoke_operative(&interceptor.operative, &Environment::new(), operand, parent)
        }
    }
}

fn step_combine(
    value: Value,
    env: &Rc<Environment>,
    operands: &Value,
    parent: &Rc<Continuation>,
) -> Result<Step, Condition> {
    let combiner = match value {
        Value::Combiner(combiner) => combiner,
        other => {
            return Err(Condition::with(
                "combiner call car is not a combiner",
                vec![other],
            ))
        }
    };
    if combiner.num_wraps == 0 || operands.is_nil() {
        return invoke_operative(&combiner.operative, env, operands.clone(), parent);
    }
    let metrics = list_metrics(operands);
    if !metrics.nil_terminated && metrics.cycle == 0 {
        return Err(Condition::with(
            "applicative arguments must be proper list",
            vec![operands.clone()],
        ));
    }
    // Isomorphic copy of the operand list, cycle included, so the
    // destructive car replacement below never touches the caller's
    // structure.
    let mut cars = Vec::with_capacity(metrics.pairs);
    let mut cursor = operands.clone();
    while cars.len() < metrics.pairs {
        let Value::Pair(pair) = cursor else { break };
        cars.push(pair.car());
        cursor = pair.cdr();
    }
    let copies: Vec<Rc<Pair>> = cars
        .into_iter()
        .map(|car| Pair::new(car, Value::Nil))
        .collect();
    for i in 0..copies.len() - 1 {
        copies[i].replace_cdr(Value::Pair(copies[i + 1].clone()));
    }
    if metrics.cycle > 0 {
        copies[copies.len() - 1].replace_cdr(Value::Pair(copies[metrics.acyclic].clone()));
    }
    let state = Rc::new(ArgState {
        env: env.clone(),
        operative: combiner.operative.clone(),
        args: Value::Pair(copies[0].clone()),
        order: copies,
    });
    let first = state.order[0].car();
    let frame = Continuation::with_info(
        Handler::Argument {
            state: state.clone(),
            index: 0,
            wraps_left: combiner.num_wraps,
        },
        parent,
        first.clone(),
    );
    Ok(Step::eval(first, env.clone(), frame))
}

fn step_argument(
    value: Value,
    state: &Rc<ArgState>,
    index: usize,
    wraps_left: u32,
    parent: &Rc<Continuation>,
) -> Result<Step, Condition> {
    state.order[index].replace_car(value);
    let mut index = index + 1;
    let mut wraps_left = wraps_left;
    if index == state.order.len() {
        wraps_left -= 1;
        if wraps_left == 0 {
            return invoke_operative(&state.operative, &state.env, state.args.clone(), parent);
        }
        index = 0;
    }
    let next = state.order[index].car();
    let frame = Continuation::with_info(
        Handler::Argument {
            state: state.clone(),
            index,
            wraps_left,
        },
        parent,
        next.clone(),
    );
    Ok(Step::eval(next, state.env.clone(), frame))
}

/// Applies an operative to an operand tree. `env` is the caller's
/// dynamic environment, except for the stateful variants that carry
/// their own.
pub(crate) fn invoke_operative(
    operative: &Rc<Operative>,
    env: &Rc<Environment>,
    operand: Value,
    parent: &Rc<Continuation>,
) -> Result<Step, Condition> {
    match operative.as_ref() {
        Operative::Primitive { func, .. } => func(env, &operand, parent),
        Operative::UserDefined {
            env: static_env,
            env_param,
            operand_param,
            body,
        } => {
            let call_env = Environment::with_parent(static_env);
            if let Value::Symbol(name) = env_param {
                call_env.define(name.clone(), Value::Environment(env.clone()));
            }
            bind_parameter_tree(&call_env, operand_param, &operand)?;
            Ok(Step::eval(body.clone(), call_env, parent.clone()))
        }
        Operative::AbnormalPass { target } => {
            // A one-argument call delivers that argument; a raw operand
            // tree passes through whole.
            let passed = match &operand {
                Value::Pair(pair) if pair.cdr().is_nil() => pair.car(),
                other => other.clone(),
            };
            Ok(abnormal_pass(parent, target, passed))
        }
        Operative::Encapsulate { token } => {
            let payload = args1(&operand, "expected one argument")?;
            Ok(Step::ret(
                Value::Encapsulation(Rc::new(Encapsulation {
                    token: token.clone(),
                    payload,
                })),
                parent.clone(),
            ))
        }
        Operative::EncapsulationPredicate { token } => {
            let value = args1(&operand, "expected one argument")?;
            let matched = match &value {
                Value::Encapsulation(encap) => encap.token.matches(token),
                _ => false,
            };
            Ok(Step::ret(Value::Boolean(matched), parent.clone()))
        }
        Operative::Decapsulate { token } => {
            let value = args1(&operand, "expected one argument")?;
            match &value {
                Value::Encapsulation(encap) if encap.token.matches(token) => {
                    Ok(Step::ret(encap.payload.clone(), parent.clone()))
                }
                other => Err(Condition::with(
                    "cannot decapsulate object",
                    vec![other.clone()],
                )),
            }
        }
        Operative::DynamicBinder { key } => {
            let (value, combiner) = args2(&operand, "expected two arguments")?;
            let combiner = match combiner {
                Value::Combiner(combiner) => combiner,
                other => {
                    return Err(Condition::with(
                        "second argument must be a combiner",
                        vec![other],
                    ))
                }
            };
            let frame =
                Continuation::with_dynamic(Handler::Passthrough, parent, key.clone(), value);
            invoke_operative(&combiner.operative, &Environment::new(), Value::Nil, &frame)
        }
        Operative::DynamicAccessor { key } => {
            let mut current = Some(parent.clone());
            while let Some(cont) = current {
                if let Some((token, value)) = &cont.dynamic {
                    if token.matches(key) {
                        return Ok(Step::ret(value.clone(), parent.clone()));
                    }
                }
                current = cont.parent.clone();
            }
            Err(Condition::new("no dynamic binding found"))
        }
        Operative::StaticBinder { key } => {
            let (value, environment) = args2(&operand, "expected two arguments")?;
            let environment = match environment {
                Value::Environment(env) => env,
                other => {
                    return Err(Condition::with(
                        "second argument must be an environment",
                        vec![other],
                    ))
                }
            };
            Ok(Step::ret(
                Value::Environment(Environment::with_keyed(&environment, key.clone(), value)),
                parent.clone(),
            ))
        }
        Operative::StaticAccessor { key } => match env.keyed_lookup(key) {
            Some(value) => Ok(Step::ret(value, parent.clone())),
            None => Err(Condition::new("no static binding found")),
        },
    }
}

/// Validates a parameter tree: only symbols, Ignore, Nil, and pairs,
/// with no symbol repeated.
pub(crate) fn check_parameter_tree(pattern: &Value) -> Result<(), Condition> {
    fn walk(
        pattern: &Value,
        names: &mut HashSet<Rc<str>>,
        seen: &mut HashSet<*const Pair>,
    ) -> Result<(), Condition> {
        match pattern {
            Value::Symbol(name) => {
                if names.insert(name.clone()) {
                    Ok(())
                } else {
                    Err(Condition::with(
                        "duplicate symbol in parameter tree",
                        vec![pattern.clone()],
                    ))
                }
            }
            Value::Ignore | Value::Nil => Ok(()),
            Value::Pair(pair) => {
                if !seen.insert(Rc::as_ptr(pair)) {
                    return Ok(());
                }
                walk(&pair.car(), names, seen)?;
                walk(&pair.cdr(), names, seen)
            }
            other => Err(Condition::with(
                "invalid parameter tree",
                vec![other.clone()],
            )),
        }
    }
    walk(pattern, &mut HashSet::new(), &mut HashSet::new())
}

/// Binds a (previously validated) parameter tree against a value.
pub(crate) fn bind_parameter_tree(
    env: &Rc<Environment>,
    pattern: &Value,
    value: &Value,
) -> Result<(), Condition> {
    match pattern {
        Value::Symbol(name) => {
            env.define(name.clone(), value.clone());
            Ok(())
        }
        Value::Ignore => Ok(()),
        Value::Nil => {
            if value.is_nil() {
                Ok(())
            } else {
                Err(Condition::with(
                    "parameter tree mismatch",
                    vec![pattern.clone(), value.clone()],
                ))
            }
        }
        Value::Pair(pattern_pair) => match value {
            Value::Pair(value_pair) => {
                bind_parameter_tree(env, &pattern_pair.car(), &value_pair.car())?;
                bind_parameter_tree(env, &pattern_pair.cdr(), &value_pair.cdr())
            }
            other => Err(Condition::with(
                "parameter tree mismatch",
                vec![pattern.clone(), other.clone()],
            )),
        },
        other => Err(Condition::with(
            "invalid parameter tree",
            vec![other.clone()],
        )),
    }
}

pub(crate) fn args1(operand: &Value, message: &'static str) -> Result<Value, Condition> {
    match operand {
        Value::Pair(pair) if pair.cdr().is_nil() => Ok(pair.car()),
        _ => Err(Condition::with(message, vec![operand.clone()])),
    }
}

pub(crate) fn args2(operand: &Value, message: &'static str) -> Result<(Value, Value), Condition> {
    if let Value::Pair(first) = operand {
        if let Value::Pair(second) = first.cdr() {
            if second.cdr().is_nil() {
                return Ok((first.car(), second.car()));
            }
        }
    }
    Err(Condition::with(message, vec![operand.clone()]))
}

pub(crate) fn args3(
    operand: &Value,
    message: &'static str,
) -> Result<(Value, Value, Value), Condition> {
    if let Value::Pair(first) = operand {
        if let Value::Pair(second) = first.cdr() {
            if let Value::Pair(third) = second.cdr() {
                if third.cdr().is_nil() {
                    return Ok((first.car(), second.car(), third.car()));
                }
            }
        }
    }
    Err(Condition::with(message, vec![operand.clone()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::values_eq;

    fn run(source: &str) -> Result<Vec<Value>, InterpreterError> {
        Interpreter::new().eval_source(source, "<test>")
    }

    fn last(source: &str) -> Value {
        run(source)
            .expect("evaluation failed")
            .pop()
            .expect("no expressions")
    }

    fn shown(source: &str) -> String {
        format!("{}", last(source))
    }

    fn abort_message(source: &str) -> String {
        match run(source) {
            Err(InterpreterError::Abort(abort)) => match abort.message() {
                Value::Pair(pair) => format!("{}", pair.car()),
                other => format!("{}", other),
            },
            other => panic!("expected an abort, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_atoms_self_evaluate() {
        assert_eq!(shown("42"), "42");
        assert_eq!(shown("-7"), "-7");
        assert_eq!(shown("2.5"), "2.5");
        assert_eq!(shown("#t"), "#t");
        assert_eq!(shown("#inert"), "#inert");
        assert_eq!(shown("\"hi\""), "\"hi\"");
        assert_eq!(shown("()"), "()");
    }

    #[test]
    fn test_unbound_symbol_aborts() {
        assert_eq!(abort_message("nosuch"), "\"binding not found\"");
    }

    #[test]
    fn test_nested_addition() {
        assert_eq!(shown("(+ 1 (+ 2 3))"), "6");
    }

    #[test]
    fn test_mixed_arithmetic_promotes() {
        assert_eq!(shown("(+ 1 2.5)"), "3.5");
        assert_eq!(shown("(* 3 4)"), "12");
        assert_eq!(shown("(- 10 4)"), "6");
        assert_eq!(shown("(<=? 3 3)"), "#t");
        assert_eq!(shown("(<=? 4 3)"), "#f");
    }

    #[test]
    fn test_if_requires_boolean() {
        assert_eq!(shown("($if (eq? 3 (+ 1 2)) 1 0)"), "1");
        assert_eq!(shown("($if #f 1 0)"), "0");
        assert_eq!(abort_message("($if 1 2 3)"), "\"expected boolean condition\"");
    }

    #[test]
    fn test_define_binds_symbol() {
        assert_eq!(shown("($define! x 10) x"), "10");
    }

    #[test]
    fn test_define_returns_inert() {
        assert_eq!(shown("($define! x 10)"), "#inert");
    }

    #[test]
    fn test_define_pattern_tree() {
        assert_eq!(shown("($define! (a b) (cons 1 (cons 2 ()))) a"), "1");
        assert_eq!(shown("($define! (a b) (cons 1 (cons 2 ()))) b"), "2");
        assert_eq!(shown("($define! (a . b) (cons 1 2)) b"), "2");
        assert_eq!(
            shown("($define! (#ignore b) (cons 1 (cons 2 ()))) b"),
            "2"
        );
    }

    #[test]
    fn test_define_duplicate_symbol_fails() {
        assert_eq!(
            abort_message("($define! (a a) (cons 1 (cons 2 ())))"),
            "\"duplicate symbol in parameter tree\""
        );
    }

    #[test]
    fn test_define_mismatch_fails() {
        assert_eq!(
            abort_message("($define! (a b) 5)"),
            "\"parameter tree mismatch\""
        );
        assert_eq!(
            abort_message("($define! () 5)"),
            "\"parameter tree mismatch\""
        );
    }

    #[test]
    fn test_vau_with_tree_parameters() {
        let source = "($define! f ($vau (e (a b)) (+ (eval e a) (eval e b)))) (f 4 6)";
        assert_eq!(shown(source), "10");
    }

    #[test]
    fn test_wrapped_vau_evaluates_arguments() {
        let source = "((wrap ($vau (#ignore xs) (car (cdr xs)))) 10 20 30)";
        assert_eq!(shown(source), "20");
    }

    #[test]
    fn test_operative_receives_operands_unevaluated() {
        let source = "($define! op ($vau (#ignore (v)) v)) ($define! app (wrap op)) ((unwrap app) zz)";
        assert_eq!(shown(source), "zz");
    }

    #[test]
    fn test_each_wrap_adds_one_evaluation_pass() {
        let source = "
            ($define! $quote ($vau (#ignore (x)) x))
            ($define! op ($vau (#ignore (v)) v))
            ($define! once (wrap op))
            ($define! twice (wrap once))
            ($define! y 42)
            ($define! x ($quote y))
            (cons (once x) (twice x))";
        assert_eq!(shown(source), "(y . 42)");
    }

    #[test]
    fn test_unwrap_operative_fails() {
        assert_eq!(
            abort_message("(unwrap ($vau (#ignore x) x))"),
            "\"expected (unwrap APPLICATIVE)\""
        );
    }

    #[test]
    fn test_tail_recursion_runs_deep() {
        let source = "
            ($define! loop
              (wrap ($vau (#ignore (n)) ($if (eq? n 0) 0 (loop (+ n -1))))))
            (loop 100000)";
        assert_eq!(shown(source), "0");
    }

    #[test]
    fn test_eval_primitive_is_tail_call() {
        assert_eq!(shown("($define! e (make-environment)) (eval e 5)"), "5");
        assert_eq!(
            abort_message("(eval (make-environment) zz)"),
            "\"binding not found\""
        );
    }

    #[test]
    fn test_applicative_call_with_improper_tail_fails() {
        assert_eq!(
            abort_message("($define! f (wrap ($vau (#ignore x) x))) (eval (make-environment) (cons f (cons 1 2)))"),
            "\"applicative arguments must be proper list\""
        );
    }

    #[test]
    fn test_cyclic_operand_list_is_copied_and_evaluated() {
        let source = "
            ($define! c (cons 1 (cons 2 (cons 3 ()))))
            (set-cdr! (cdr (cdr c)) c)
            ($define! id (wrap ($vau (#ignore xs) xs)))
            (eval (make-environment) (cons id c))";
        let value = last(source);
        let metrics = list_metrics(&value);
        assert_eq!(metrics.pairs, 3);
        assert_eq!(metrics.acyclic, 0);
        assert_eq!(metrics.cycle, 3);
        // Break both cycles so the values can be reclaimed.
        if let Value::Pair(first) = &value {
            first.replace_cdr(Value::Nil);
        }
    }

    #[test]
    fn test_calling_a_non_combiner_fails() {
        assert_eq!(
            abort_message("(5 1 2)"),
            "\"combiner call car is not a combiner\""
        );
    }

    #[test]
    fn test_self_referential_call_guard() {
        let source = "
            ($define! p (cons 1 (cons 2 ())))
            (set-car! p p)
            (eval (make-environment) p)";
        assert_eq!(
            abort_message(source),
            "\"infinite recursive evaluation of combiner\""
        );
    }

    #[test]
    fn test_set_car_on_immutable_pair_fails() {
        let source = "
            ($define! $quote ($vau (#ignore (x)) x))
            (set-car! ($quote (1 2)) 9)";
        assert_eq!(abort_message(source), "\"pair must be mutable\"");
    }

    #[test]
    fn test_set_car_on_mutable_pair() {
        assert_eq!(shown("($define! p (cons 1 2)) (set-car! p 9) (car p)"), "9");
    }

    #[test]
    fn test_abnormal_pass_to_root_discards_context() {
        let source = "(+ 1 ((continuation->applicative root-continuation) 7))";
        assert_eq!(shown(source), "7");
    }

    #[test]
    fn test_direct_pass_to_error_continuation_aborts() {
        let result = run("((continuation->applicative error-continuation) 42)");
        match result {
            Err(InterpreterError::Abort(abort)) => {
                assert!(values_eq(&abort.0, &Value::Int(42)));
            }
            _ => panic!("expected an abort"),
        }
    }

    #[test]
    fn test_abort_payload_carries_source_continuation() {
        let result = run("(car 5)");
        match result {
            Err(InterpreterError::Abort(abort)) => {
                assert!(abort.source_continuation().is_some());
                let message = abort.message();
                let Value::Pair(pair) = &message else {
                    panic!("expected a message list")
                };
                assert!(values_eq(&pair.car(), &Value::string("expected (car PAIR)")));
            }
            _ => panic!("expected an abort"),
        }
    }

    #[test]
    fn test_binds_predicate() {
        let source = "
            ($define! get-env (wrap ($vau (e #ignore) e)))
            ($define! x 1)
            ($binds? (get-env) x)";
        assert_eq!(shown(source), "#t");
        let source = "
            ($define! get-env (wrap ($vau (e #ignore) e)))
            ($binds? (get-env) zz)";
        assert_eq!(shown(source), "#f");
    }

    #[test]
    fn test_environment_constructor_and_predicate() {
        assert_eq!(shown("(environment? (make-environment))"), "#t");
        assert_eq!(shown("(environment? 5)"), "#f");
        let source = "
            ($define! $quote ($vau (#ignore (x)) x))
            ($define! e (make-environment))
            (eval e ($quote ($define! v 3)))
            (eval e ($quote v))";
        assert_eq!(shown(source), "3");
    }

    #[test]
    fn test_child_environment_shadows_parent() {
        let source = "
            ($define! $quote ($vau (#ignore (x)) x))
            ($define! get-env (wrap ($vau (e #ignore) e)))
            ($define! x 1)
            ($define! child (make-environment (get-env)))
            (eval child ($quote ($define! x 2)))
            (cons (eval child ($quote x)) x)";
        assert_eq!(shown(source), "(2 . 1)");
    }
}
