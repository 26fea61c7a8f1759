
use std::collections::HashMap;

use either::{Either, Left, Right};

use crate::equality::SchemeEq;
use crate::runtime::{
    BuiltinKind,
    ComplexBuiltin,
    Environment,
    Interpreter,
    Procedure,
    SimpleBuiltin,
    Task
};
use crate::scheme::{Error, Scheme};
use crate::symbol::SymbolTable;

/// Evaluation rule for a special form. Receives the unevaluated operands.
pub type SpecialForm = fn(&mut Interpreter, Scheme, Environment) ->
    Result<Either<Task, Scheme>, Error>;

lazy_static! {
    static ref SPECIAL_FORMS: HashMap<&'static str, SpecialForm> = {
        fn syntax(f: SpecialForm) -> SpecialForm {
            f
        }

        hashmap! {
            "quote" => syntax(quote),
            "set!" => syntax(set),
            "define" => syntax(define),
            "if" => syntax(syntax_if),
            "and" => syntax(and),
            "or" => syntax(or),
            "lambda" => syntax(lambda),
            "let" => syntax(syntax_let),
            "begin" => syntax(begin),
            "cond" => syntax(cond),
            "apply" => syntax(apply),
            "eval" => syntax(eval),
            "interaction-environment" => syntax(interaction_environment),
        }
    };
}

/// The special form spelled `name`, if there is one.
pub fn special_form(name: &str) -> Option<SpecialForm> {
    SPECIAL_FORMS.get(name).cloned()
}

// Operands of a special form as a vector, checking the count is in
// `min..=max`.
fn operands(form: &'static str, operands: &Scheme, min: usize, max: usize) ->
    Result<Vec<Scheme>, Error> {

    match operands.into_vec() {
        Some(ops) if ops.len() >= min && ops.len() <= max => Ok(ops),
        _ => Err(malformed(form, operands)),
    }
}

fn malformed(form: &'static str, operands: &Scheme) -> Error {
    Error::malformed(form, &Scheme::cons(Scheme::symbol(form), operands.clone()))
}

fn quote(_: &mut Interpreter, ops: Scheme, _: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    let ops = operands("quote", &ops, 1, 1)?;
    Ok(Right(ops[0].clone()))
}

fn set(interp: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    let ops = operands("set!", &ops, 2, 2)?;
    let variable = &ops[0];
    if variable.as_symbol().is_none() {
        return Err(Error::wrong_type("set!", "a symbol", variable));
    }
    let value = interp.eval(&ops[1], &env)?;
    if !env.set(variable, value) {
        interp.report(&Error::SetUnbound(variable.to_string()));
    }
    Ok(Right(interp.intern("ok")))
}

// (define name expr) or (define (name . params) . body)
fn define(interp: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    let (target, rest) = ops.as_pair()
        .ok_or_else(|| malformed("define", &ops))?;

    let (variable, value) = if target.as_symbol().is_some() {
        let rest = operands("define", &rest, 1, 1)
            .map_err(|_| malformed("define", &ops))?;
        let value = interp.eval(&rest[0], &env)?;
        (target, value)
    } else if let Some((name, params)) = target.as_pair() {
        if name.as_symbol().is_none() || !valid_params(&params) {
            return Err(malformed("define", &ops));
        }
        let procc = Procedure::lambda(params, rest, env.clone());
        (name, Scheme::procedure(procc))
    } else {
        return Err(malformed("define", &ops));
    };

    env.define(&variable, value);
    Ok(Right(interp.intern("ok")))
}

fn syntax_if(interp: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    let ops = operands("if", &ops, 2, 3)?;
    let mut iter = ops.into_iter();
    let (pred, conseq, alt) = match (iter.next(), iter.next(), iter.next()) {
        (Some(pred), Some(conseq), alt) => (pred, conseq, alt),
        _ => return Ok(Right(Scheme::null())),
    };

    if interp.eval(&pred, &env)?.truey() {
        Ok(Left(Task::eval(conseq, env)))
    } else {
        match alt {
            Some(alt) => Ok(Left(Task::eval(alt, env))),
            None => Ok(Right(Scheme::boolean(false))),
        }
    }
}

fn and(interp: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    let mut ops = operands("and", &ops, 0, usize::max_value())?;
    let last = match ops.pop() {
        Some(last) => last,
        None => return Ok(Right(Scheme::boolean(true))),
    };
    for op in ops {
        let value = interp.eval(&op, &env)?;
        if !value.truey() {
            return Ok(Right(value));
        }
    }
    Ok(Left(Task::eval(last, env)))
}

fn or(interp: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    let mut ops = operands("or", &ops, 0, usize::max_value())?;
    let last = match ops.pop() {
        Some(last) => last,
        None => return Ok(Right(Scheme::boolean(false))),
    };
    for op in ops {
        let value = interp.eval(&op, &env)?;
        if value.truey() {
            return Ok(Right(value));
        }
    }
    Ok(Left(Task::eval(last, env)))
}

// A parameter list is a single symbol or a proper list of symbols.
fn valid_params(params: &Scheme) -> bool {
    if params.as_symbol().is_some() {
        return true;
    }
    match params.into_vec() {
        Some(vars) => vars.iter().all(|var| var.as_symbol().is_some()),
        None => false,
    }
}

fn lambda(_: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    match ops.as_pair() {
        Some((params, body)) if valid_params(&params) =>
            Ok(Right(Scheme::procedure(Procedure::lambda(params, body, env)))),
        _ => Err(malformed("lambda", &ops)),
    }
}

// (let ((var init) ...) . body) runs body in a new frame, like applying
// (lambda (var ...) . body) to the inits.
fn syntax_let(interp: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    let (bindings, body) = ops.as_pair()
        .ok_or_else(|| malformed("let", &ops))?;
    let bindings = bindings.into_vec()
        .ok_or_else(|| malformed("let", &ops))?;

    let mut variables = Vec::new();
    let mut values = Vec::new();
    for binding in bindings {
        match binding.into_vec() {
            Some(ref pair) if pair.len() == 2 && pair[0].as_symbol().is_some() => {
                variables.push(pair[0].clone());
                values.push(interp.eval(&pair[1], &env)?);
            },
            _ => return Err(malformed("let", &ops)),
        }
    }

    let new_env = env.extend(variables, values)?;
    interp.eval_sequence(&body, new_env)
}

fn begin(interp: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    interp.eval_sequence(&ops, env)
}

fn is_else_clause(clause: &Scheme) -> bool {
    clause.as_pair().map_or(false, |(test, _)| test.as_symbol() == Some("else"))
}

fn cond(interp: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    let clauses = operands("cond", &ops, 0, usize::max_value())?;
    if let Some((_, init)) = clauses.split_last() {
        if init.iter().any(is_else_clause) {
            return Err(Error::ElseNotLast);
        }
    }

    for clause in clauses {
        let (test, body) = clause.as_pair()
            .ok_or_else(|| malformed("cond", &ops))?;
        if is_else_clause(&clause) {
            return interp.eval_sequence(&body, env);
        }
        let value = interp.eval(&test, &env)?;
        if value.truey() {
            if body.is_null() {
                return Ok(Right(value));
            }
            return interp.eval_sequence(&body, env);
        }
    }
    Ok(Right(Scheme::boolean(false)))
}

fn apply(interp: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    let ops = operands("apply", &ops, 2, 2)?;
    let procedure = interp.eval(&ops[0], &env)?;
    let args = interp.eval(&ops[1], &env)?;
    let args = args.into_vec()
        .ok_or_else(|| Error::wrong_type("apply", "a list", &args))?;
    interp.apply(procedure, args)
}

fn eval(interp: &mut Interpreter, ops: Scheme, env: Environment) ->
    Result<Either<Task, Scheme>, Error> {

    let ops = operands("eval", &ops, 1, 2)?;
    let expr = interp.eval(&ops[0], &env)?;
    let expr = interp.intern_tree(&expr);
    let target = match ops.get(1) {
        Some(op) => {
            let value = interp.eval(op, &env)?;
            value.as_environment().cloned()
                .ok_or_else(|| Error::wrong_type("eval", "an environment", &value))?
        },
        None => interp.global_environment(),
    };
    Ok(Left(Task::eval(expr, target)))
}

fn interaction_environment(_: &mut Interpreter, ops: Scheme, env: Environment)
    -> Result<Either<Task, Scheme>, Error> {

    operands("interaction-environment", &ops, 0, 0)?;
    Ok(Right(Scheme::environment(env)))
}

fn arity(procedure: &'static str, expected: &'static str, args: &[Scheme]) ->
    Error {

    Error::Arity {
        procedure,
        expected,
        got: args.len(),
    }
}

fn int_arg(procedure: &'static str, arg: &Scheme) -> Result<i64, Error> {
    arg.as_int().ok_or_else(|| Error::wrong_type(procedure, "a number", arg))
}

fn predicate(procedure: &'static str, args: Vec<Scheme>, test: fn(&Scheme) -> bool)
    -> Result<Scheme, Error> {

    match &args[..] {
        [arg] => Ok(Scheme::boolean(test(arg))),
        _ => Err(arity(procedure, "1", &args)),
    }
}

// Section: pairs and lists

fn length(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [list] => {
            let items = list.into_vec()
                .ok_or_else(|| Error::wrong_type("length", "a list", list))?;
            Ok(Scheme::int(items.len() as i64))
        },
        _ => Err(arity("length", "1", &args)),
    }
}

fn cons(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [a, b] => Ok(Scheme::cons(a.clone(), b.clone())),
        _ => Err(arity("cons", "2", &args)),
    }
}

fn car(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [pair] => pair.car(),
        _ => Err(arity("car", "1", &args)),
    }
}

fn cdr(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [pair] => pair.cdr(),
        _ => Err(arity("cdr", "1", &args)),
    }
}

fn set_car(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [pair, value] => {
            let (car, _) = pair.as_pair_mut()
                .ok_or_else(|| Error::wrong_type("set-car!", "a pair", pair))?;
            *car.borrow_mut() = value.clone();
            Ok(Scheme::null())
        },
        _ => Err(arity("set-car!", "2", &args)),
    }
}

fn set_cdr(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [pair, value] => {
            let (_, cdr) = pair.as_pair_mut()
                .ok_or_else(|| Error::wrong_type("set-cdr!", "a pair", pair))?;
            *cdr.borrow_mut() = value.clone();
            Ok(Scheme::null())
        },
        _ => Err(arity("set-cdr!", "2", &args)),
    }
}

fn list(args: Vec<Scheme>) -> Result<Scheme, Error> {
    Ok(Scheme::list(args))
}

fn append(mut args: Vec<Scheme>) -> Result<Scheme, Error> {
    let mut tail = args.pop().unwrap_or_else(Scheme::null);
    for list in args.iter().rev() {
        let items = list.into_vec()
            .ok_or_else(|| Error::wrong_type("append", "a list", list))?;
        for item in items.into_iter().rev() {
            tail = Scheme::cons(item, tail);
        }
    }
    Ok(tail)
}

fn reverse(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [list] => {
            let items = list.into_vec()
                .ok_or_else(|| Error::wrong_type("reverse", "a list", list))?;
            Ok(Scheme::list(items.into_iter().rev().collect::<Vec<_>>()))
        },
        _ => Err(arity("reverse", "1", &args)),
    }
}

// Section: numbers

fn sum(args: Vec<Scheme>) -> Result<Scheme, Error> {
    let mut total: i64 = 0;
    for arg in &args {
        let n = int_arg("+", arg)?;
        total = total.checked_add(n).ok_or(Error::Overflow("+"))?;
    }
    Ok(Scheme::int(total))
}

fn times(args: Vec<Scheme>) -> Result<Scheme, Error> {
    let mut total: i64 = 1;
    for arg in &args {
        let n = int_arg("*", arg)?;
        total = total.checked_mul(n).ok_or(Error::Overflow("*"))?;
    }
    Ok(Scheme::int(total))
}

fn minus(args: Vec<Scheme>) -> Result<Scheme, Error> {
    let (first, rest) = args.split_first()
        .ok_or_else(|| arity("-", "at least 1", &args))?;
    let first = int_arg("-", first)?;
    if rest.is_empty() {
        return first.checked_neg().map(Scheme::int).ok_or(Error::Overflow("-"));
    }
    let mut total = first;
    for arg in rest {
        let n = int_arg("-", arg)?;
        total = total.checked_sub(n).ok_or(Error::Overflow("-"))?;
    }
    Ok(Scheme::int(total))
}

// Compares adjacent pairs left to right and stops at the first one that
// fails, without looking at the arguments after it.
fn comparison<F>(procedure: &'static str, args: Vec<Scheme>, cmp: F) ->
        Result<Scheme, Error>
    where F: Fn(i64, i64) -> bool {

    if args.len() < 2 {
        return Err(arity(procedure, "at least 2", &args));
    }
    let mut previous = int_arg(procedure, &args[0])?;
    for elem in &args[1..] {
        let next = int_arg(procedure, elem)?;
        if !cmp(previous, next) {
            return Ok(Scheme::boolean(false));
        }
        previous = next;
    }
    Ok(Scheme::boolean(true))
}

fn num_eq(args: Vec<Scheme>) -> Result<Scheme, Error> {
    comparison("=", args, |n, m| n == m)
}

fn less(args: Vec<Scheme>) -> Result<Scheme, Error> {
    comparison("<", args, |n, m| n < m)
}

fn less_equal(args: Vec<Scheme>) -> Result<Scheme, Error> {
    comparison("<=", args, |n, m| n <= m)
}

fn greater(args: Vec<Scheme>) -> Result<Scheme, Error> {
    comparison(">", args, |n, m| n > m)
}

fn greater_equal(args: Vec<Scheme>) -> Result<Scheme, Error> {
    comparison(">=", args, |n, m| n >= m)
}

fn is_zero(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [n] => Ok(Scheme::boolean(int_arg("zero?", n)? == 0)),
        _ => Err(arity("zero?", "1", &args)),
    }
}

// Section: type predicates and equality

fn is_null(args: Vec<Scheme>) -> Result<Scheme, Error> {
    predicate("null?", args, Scheme::is_null)
}

fn is_boolean(args: Vec<Scheme>) -> Result<Scheme, Error> {
    predicate("boolean?", args, |x| x.as_boolean().is_some())
}

fn is_symbol(args: Vec<Scheme>) -> Result<Scheme, Error> {
    predicate("symbol?", args, |x| x.as_symbol().is_some())
}

fn is_integer(args: Vec<Scheme>) -> Result<Scheme, Error> {
    predicate("integer?", args, |x| x.as_int().is_some())
}

fn is_char(args: Vec<Scheme>) -> Result<Scheme, Error> {
    predicate("character?", args, |x| x.as_character().is_some())
}

fn is_pair(args: Vec<Scheme>) -> Result<Scheme, Error> {
    predicate("pair?", args, |x| x.as_pair().is_some())
}

fn is_string(args: Vec<Scheme>) -> Result<Scheme, Error> {
    predicate("string?", args, |x| x.as_string().is_some())
}

fn is_procedure(args: Vec<Scheme>) -> Result<Scheme, Error> {
    predicate("procedure?", args, |x| x.as_procedure().is_some())
}

// `into_vec` rejects improper and cyclic lists.
fn is_list(args: Vec<Scheme>) -> Result<Scheme, Error> {
    predicate("list?", args, |x| x.into_vec().is_some())
}

fn not(args: Vec<Scheme>) -> Result<Scheme, Error> {
    predicate("not", args, |x| !x.truey())
}

fn is_eq(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [a, b] => Ok(Scheme::boolean(a.eqv(b))),
        _ => Err(arity("eq?", "2", &args)),
    }
}

fn is_equal(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [a, b] => Ok(Scheme::boolean(a.equal(b))),
        _ => Err(arity("equal?", "2", &args)),
    }
}

// Section: symbols

fn symbol_to_string(args: Vec<Scheme>) -> Result<Scheme, Error> {
    match &args[..] {
        [symbol] => symbol.as_symbol().map(Scheme::string)
            .ok_or_else(|| Error::wrong_type("symbol->string", "a symbol", symbol)),
        _ => Err(arity("symbol->string", "1", &args)),
    }
}

fn string_to_symbol(args: Vec<Scheme>, interp: &mut Interpreter) ->
    Result<Scheme, Error> {

    match &args[..] {
        [string] => match string.as_string() {
            Some(name) => Ok(interp.intern(name)),
            None => Err(Error::wrong_type("string->symbol", "a string", string)),
        },
        _ => Err(arity("string->symbol", "1", &args)),
    }
}

// Section: input and output

fn load(args: Vec<Scheme>, interp: &mut Interpreter) -> Result<Scheme, Error> {
    match &args[..] {
        [path] => match path.as_string() {
            Some(path) => interp.load_file(path),
            None => Err(Error::wrong_type("load", "a string", path)),
        },
        _ => Err(arity("load", "1", &args)),
    }
}

fn print(args: Vec<Scheme>, interp: &mut Interpreter) -> Result<Scheme, Error> {
    match &args[..] {
        [value] => {
            interp.write_str(&format!("{}\n", value))?;
            Ok(Scheme::null())
        },
        _ => Err(arity("print", "1", &args)),
    }
}

// Like print, but strings go out without quotes and no newline follows.
fn display(args: Vec<Scheme>, interp: &mut Interpreter) -> Result<Scheme, Error> {
    match &args[..] {
        [value] => {
            let text = match value.as_string() {
                Some(s) => s.to_string(),
                None => value.to_string(),
            };
            interp.write_str(&text)?;
            Ok(Scheme::null())
        },
        _ => Err(arity("display", "1", &args)),
    }
}

fn newline(args: Vec<Scheme>, interp: &mut Interpreter) -> Result<Scheme, Error> {
    if !args.is_empty() {
        return Err(arity("newline", "0", &args));
    }
    interp.write_str("\n")?;
    Ok(Scheme::null())
}

/// A fresh global environment holding every primitive, with the names
/// interned in `symbols`.
pub fn initial_environment(symbols: &mut SymbolTable) -> Environment {
    fn simple(f: SimpleBuiltin) -> BuiltinKind {
        BuiltinKind::Simple(f)
    }

    fn complex(f: ComplexBuiltin) -> BuiltinKind {
        BuiltinKind::Complex(f)
    }

    let primitives: HashMap<&'static str, BuiltinKind> = hashmap! {
        "length" => simple(length),
        "cons" => simple(cons),
        "car" => simple(car),
        "cdr" => simple(cdr),
        "set-car!" => simple(set_car),
        "set-cdr!" => simple(set_cdr),
        "list" => simple(list),
        "append" => simple(append),
        "reverse" => simple(reverse),

        "+" => simple(sum),
        "*" => simple(times),
        "-" => simple(minus),
        "=" => simple(num_eq),
        "<" => simple(less),
        "<=" => simple(less_equal),
        ">" => simple(greater),
        ">=" => simple(greater_equal),
        "zero?" => simple(is_zero),

        "null?" => simple(is_null),
        "boolean?" => simple(is_boolean),
        "symbol?" => simple(is_symbol),
        "integer?" => simple(is_integer),
        "character?" => simple(is_char),
        "pair?" => simple(is_pair),
        "string?" => simple(is_string),
        "procedure?" => simple(is_procedure),
        "list?" => simple(is_list),
        "not" => simple(not),
        "eq?" => simple(is_eq),
        "equal?" => simple(is_equal),

        "symbol->string" => simple(symbol_to_string),
        "string->symbol" => complex(string_to_symbol),

        "load" => complex(load),
        "print" => complex(print),
        "display" => complex(display),
        "newline" => complex(newline),
    };

    let env = Environment::new();
    for (name, kind) in primitives {
        let procc = Procedure::builtin(name, kind);
        env.define(&symbols.intern(name), Scheme::procedure(procc));
    }
    env
}
