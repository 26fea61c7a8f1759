
use std::fmt;
use std::io::{self, Write};

use either::{Either, Left, Right};
use gc::{Finalize, Gc, GcCell, Trace};

use crate::builtin;
use crate::port::Port;
use crate::read::Reader;
use crate::scheme::{Error, Scheme};
use crate::symbol::SymbolTable;

// Clone-by-reference environment
#[derive(Clone, Finalize, Trace)]
pub struct Environment(Gc<GcCell<Frame>>);

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<environment {:p}>", &*self.0)
    }
}

// `variables` and `values` are parallel and always the same length.
#[derive(Finalize, Trace)]
struct Frame {
    variables: Vec<Scheme>,
    values: Vec<Scheme>,
    parent: Option<Environment>,
}

impl Frame {
    fn position(&self, variable: &Scheme) -> Option<usize> {
        self.variables.iter().position(|v| v.is(variable))
    }
}

/// The next thing for the trampoline to evaluate: an expression in tail
/// position together with its environment.
#[derive(Clone, Debug)]
pub struct Task {
    expression: Scheme,
    environment: Environment,
}

#[derive(Clone, Debug, Finalize, Trace)]
pub struct Procedure(ProcEnum);

#[derive(Clone, Debug, Finalize, Trace)]
enum ProcEnum {
    Builtin(Builtin),
    Lambda(Lambda),
}

pub type SimpleBuiltin = fn(Vec<Scheme>) -> Result<Scheme, Error>;

/// Builtins that need the interpreter: output, loading, interning.
pub type ComplexBuiltin = fn(Vec<Scheme>, &mut Interpreter) ->
    Result<Scheme, Error>;

#[derive(Clone, Copy)]
pub enum BuiltinKind {
    Simple(SimpleBuiltin),
    Complex(ComplexBuiltin),
}

#[derive(Clone, Copy)]
pub struct Builtin {
    name: &'static str,
    kind: BuiltinKind,
}

impl Finalize for Builtin {}

unsafe impl Trace for Builtin {
    gc::unsafe_empty_trace!();
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<builtin {}>", self.name)
    }
}

#[derive(Debug, Clone, Finalize, Trace)]
pub struct Lambda {
    params: Scheme,
    body: Scheme,
    environment: Environment,
}

impl Task {
    pub fn eval(expr: Scheme, env: Environment) -> Task {
        Task {
            expression: expr,
            environment: env,
        }
    }
}

impl Builtin {
    fn call(&self, args: Vec<Scheme>, interp: &mut Interpreter) ->
        Result<Scheme, Error> {

        match self.kind {
            BuiltinKind::Simple(f) => f(args),
            BuiltinKind::Complex(f) => f(args, interp),
        }
    }

    fn same_function(&self, other: &Builtin) -> bool {
        match (self.kind, other.kind) {
            (BuiltinKind::Simple(f), BuiltinKind::Simple(g)) =>
                f as usize == g as usize,
            (BuiltinKind::Complex(f), BuiltinKind::Complex(g)) =>
                f as usize == g as usize,
            _ => false,
        }
    }
}

impl Procedure {
    pub fn builtin(name: &'static str, kind: BuiltinKind) -> Procedure {
        Procedure(ProcEnum::Builtin(Builtin {name, kind}))
    }

    pub fn lambda(params: Scheme, body: Scheme, environment: Environment) ->
        Procedure {

        Procedure(ProcEnum::Lambda(Lambda {params, body, environment}))
    }

    pub fn as_lambda(&self) -> Option<(&Scheme, &Scheme)> {
        match self.0 {
            ProcEnum::Lambda(ref lam) => Some((&lam.params, &lam.body)),
            ProcEnum::Builtin(_) => None,
        }
    }

    pub fn same_builtin(&self, other: &Procedure) -> bool {
        match (&self.0, &other.0) {
            (ProcEnum::Builtin(a), ProcEnum::Builtin(b)) => a.same_function(b),
            _ => false,
        }
    }

    fn apply(self, args: Vec<Scheme>, interp: &mut Interpreter) ->
        Result<Either<Task, Scheme>, Error> {

        match &self.0 {
            ProcEnum::Builtin(builtin) => builtin.call(args, interp).map(Right),
            ProcEnum::Lambda(lamb) => {
                let new_env = lamb.bind(args)?;
                interp.eval_sequence(&lamb.body, new_env)
            },
        }
    }
}

impl Lambda {
    // A symbol in parameter position collects every argument.
    fn bind(&self, args: Vec<Scheme>) -> Result<Environment, Error> {
        if self.params.as_symbol().is_some() {
            return self.environment.extend(vec![self.params.clone()],
                vec![Scheme::list(args)]);
        }
        let variables = self.params.into_vec()
            .ok_or_else(|| Error::malformed("lambda", &self.params))?;
        self.environment.extend(variables, args)
    }
}

impl Environment {
    fn from_data(data: Frame) -> Environment {
        Environment(Gc::new(GcCell::new(data)))
    }

    pub fn new() -> Environment {
        Environment::from_data(Frame {
            variables: Vec::new(),
            values: Vec::new(),
            parent: None,
        })
    }

    pub fn lookup(&self, variable: &Scheme) -> Result<Scheme, Error> {
        let mut env = self.clone();
        loop {
            let parent = {
                let frame = env.0.borrow();
                if let Some(i) = frame.position(variable) {
                    return Ok(frame.values[i].clone());
                }
                frame.parent.clone()
            };
            match parent {
                Some(p) => env = p,
                None => return Err(Error::UnboundVariable(variable.to_string())),
            }
        }
    }

    /// Overwrite the nearest binding of `variable`. Returns false when no
    /// frame binds it.
    pub fn set(&self, variable: &Scheme, value: Scheme) -> bool {
        let mut env = self.clone();
        loop {
            let parent = {
                let mut frame = env.0.borrow_mut();
                if let Some(i) = frame.position(variable) {
                    frame.values[i] = value;
                    return true;
                }
                frame.parent.clone()
            };
            match parent {
                Some(p) => env = p,
                None => return false,
            }
        }
    }

    pub fn define(&self, variable: &Scheme, value: Scheme) {
        let mut frame = self.0.borrow_mut();
        match frame.position(variable) {
            Some(i) => frame.values[i] = value,
            None => {
                frame.variables.push(variable.clone());
                frame.values.push(value);
            },
        }
    }

    pub fn extend(&self, variables: Vec<Scheme>, values: Vec<Scheme>) ->
        Result<Environment, Error> {

        if variables.len() != values.len() {
            return Err(Error::ArgumentCount {
                variables: Scheme::list(&variables).to_string(),
                values: Scheme::list(&values).to_string(),
            });
        }
        Ok(Environment::from_data(Frame {
            variables,
            values,
            parent: Some(self.clone()),
        }))
    }
}

/// Everything one interpreter session owns: the global environment, the
/// symbol table and the port that `print` and diagnostics go to.
pub struct Interpreter {
    global: Environment,
    symbols: SymbolTable,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(output: Box<dyn Write>) -> Interpreter {
        let mut symbols = SymbolTable::new();
        let global = builtin::initial_environment(&mut symbols);
        Interpreter {global, symbols, output}
    }

    pub fn global_environment(&self) -> Environment {
        self.global.clone()
    }

    pub fn intern(&mut self, name: &str) -> Scheme {
        self.symbols.intern(name)
    }

    pub fn intern_tree(&mut self, expr: &Scheme) -> Scheme {
        self.symbols.intern_tree(expr)
    }

    pub fn write_str(&mut self, text: &str) -> Result<(), Error> {
        self.output.write_all(text.as_bytes())
            .and_then(|_| self.output.flush())
            .map_err(|err| Error::Output(err.to_string()))
    }

    pub fn report(&mut self, err: &Error) {
        // A broken output port leaves nowhere to send the diagnostic.
        let _ = writeln!(self.output, "ERR: {}", err);
        let _ = self.output.flush();
    }

    /// Intern `expr`, evaluate it in the global environment and intern the
    /// result. Only fatal errors come back as `Err`.
    pub fn eval_toplevel(&mut self, expr: &Scheme) -> Result<Scheme, Error> {
        let expr = self.intern_tree(expr);
        let global = self.global_environment();
        let result = self.eval(&expr, &global)?;
        Ok(self.intern_tree(&result))
    }

    pub fn load_file(&mut self, path: &str) -> Result<Scheme, Error> {
        let port = Port::open_input_file(path).map_err(|err| Error::Load {
            path: path.to_string(),
            reason: err.to_string(),
        })?;
        let name = port.name().to_string();
        let program = Reader::from_chars(port).read_program()
            .map_err(|err| Error::Load {
                path: name,
                reason: err.to_string(),
            })?;
        self.eval_toplevel(&program)
    }

    /// Evaluate `expr` in `env`. Recoverable errors are reported here and
    /// evaluate to `()`.
    pub fn eval(&mut self, expr: &Scheme, env: &Environment) ->
        Result<Scheme, Error> {

        let task = Task::eval(expr.clone(), env.clone());
        match self.complete(task) {
            Err(ref err) if !err.is_fatal() => {
                self.report(err);
                Ok(Scheme::null())
            },
            res => res,
        }
    }

    pub fn complete(&mut self, task: Task) -> Result<Scheme, Error> {
        let mut cur_task = task;
        loop {
            match self.step(cur_task)? {
                Left(next_task) => cur_task = next_task,
                Right(result) => return Ok(result),
            }
        }
    }

    pub fn step(&mut self, task: Task) -> Result<Either<Task, Scheme>, Error> {
        let Task {expression: expr, environment: env} = task;

        if expr.is_self_evaluating() {
            Ok(Right(expr))
        } else if expr.as_symbol().is_some() {
            env.lookup(&expr).map(Right)
        } else if let Some((operator, operands)) = expr.as_pair() {
            if let Some(form) = operator.as_symbol()
                .and_then(builtin::special_form) {
                return form(self, operands, env);
            }
            // Procedure call, operator first, then operands left to right
            let procedure = self.eval(&operator, &env)?;
            let mut arguments = Vec::new();
            let mut rest = operands;
            while let Some((operand, next)) = rest.as_pair() {
                arguments.push(self.eval(&operand, &env)?);
                rest = next;
            }
            if !rest.is_null() {
                return Err(Error::malformed("application", &expr));
            }
            self.apply(procedure, arguments)
        } else {
            Err(Error::UnknownExpression(expr.to_string()))
        }
    }

    pub fn apply(&mut self, procedure: Scheme, args: Vec<Scheme>) ->
        Result<Either<Task, Scheme>, Error> {

        match procedure.as_procedure() {
            Some(procc) => procc.clone().apply(args, self),
            None => Err(Error::NotAProcedure(procedure.to_string())),
        }
    }

    /// Evaluate all but the last expression of `body` for effect and hand the
    /// last one back as a tail call. An empty body is `()`.
    pub fn eval_sequence(&mut self, body: &Scheme, env: Environment) ->
        Result<Either<Task, Scheme>, Error> {

        let mut rest = body.clone();
        loop {
            let (expr, next) = match rest.as_pair() {
                Some(pair) => pair,
                None => return Ok(Right(Scheme::null())),
            };
            if next.is_null() {
                return Ok(Left(Task::eval(expr, env)));
            }
            self.eval(&expr, &env)?;
            rest = next;
        }
    }
}


#[cfg(test)]
mod test {
    use std::env;
    use std::fs;
    use std::io::{self, Write};

    use crate::scheme::{Error, Scheme};
    use super::{Environment, Interpreter};
    use super::test_support::{interpreter, run, run_in, run_with_output};

    fn comparison(input: &str, output: &str) {
        assert_eq!(run(input).to_string(), output);
    }

    #[test]
    fn test_environment_define_and_set() {
        let global = Environment::new();
        let x = Scheme::symbol("x");
        let other_x = Scheme::symbol("x");
        global.define(&x, Scheme::int(1));
        assert_eq!(global.lookup(&x).unwrap(), Scheme::int(1));
        // Lookup is by identity, not spelling
        assert!(global.lookup(&other_x).is_err());

        let child = global.extend(vec![x.clone()], vec![Scheme::int(2)])
            .unwrap();
        assert_eq!(child.lookup(&x).unwrap(), Scheme::int(2));
        assert!(child.set(&x, Scheme::int(3)));
        assert_eq!(child.lookup(&x).unwrap(), Scheme::int(3));
        assert_eq!(global.lookup(&x).unwrap(), Scheme::int(1));
        assert!(!child.set(&other_x, Scheme::int(4)));

        child.define(&other_x, Scheme::int(5));
        assert!(global.lookup(&other_x).is_err());
    }

    #[test]
    fn test_extend_length_mismatch() {
        let global = Environment::new();
        let res = global.extend(vec![Scheme::symbol("x")], vec![]);
        match res {
            Err(Error::ArgumentCount {..}) => {},
            other => panic!("expected argument count error, got {:?}", other),
        }
    }

    #[test]
    fn test_self_evaluating() {
        comparison("42", "42");
        comparison("\"str\"", "\"str\"");
        comparison("#f", "#f");
    }

    #[test]
    fn test_lambda_0() {
        comparison("((lambda (x) x) 3)", "3");
    }

    #[test]
    fn test_lambda_1() {
        comparison("(((lambda (x) (lambda (y) x)) 1) 2)", "1");
    }

    #[test]
    fn test_lambda_2() {
        comparison("(((lambda (y) ((lambda (x) (lambda (y) x)) y)) 1) 2)",
            "1");
    }

    #[test]
    fn test_lambda_rest() {
        comparison("((lambda args args) 1 2 3)", "(1 2 3)");
    }

    #[test]
    fn test_shadowing() {
        comparison("(define x 10) (define (f x) (+ x 1)) (list (f 1) x)",
            "(2 10)");
    }

    #[test]
    fn test_closure_counter() {
        comparison("(define (make-counter) \
                      (let ((n 0)) (lambda () (set! n (+ n 1)) n))) \
                    (define c (make-counter)) \
                    (c) (c) (c)", "3");
    }

    #[test]
    fn test_define_sugar() {
        comparison("(define (add1 x) (+ x 1)) (add1 4)", "5");
    }

    #[test]
    fn test_define_returns_ok() {
        comparison("(define x 1)", "ok");
        comparison("(define x 1) (set! x 2)", "ok");
    }

    #[test]
    fn test_tail_recursion() {
        comparison("(define (count i n) (if (= i n) i (count (+ i 1) n))) \
                    (count 0 1000000)", "1000000");
    }

    #[test]
    fn test_tail_recursion_through_cond_and_let() {
        comparison("(define (loop n acc) \
                      (cond ((= n 0) acc) \
                            (else (let ((m (- n 1))) \
                                    (begin (loop m (+ acc 1))))))) \
                    (loop 200000 0)", "200000");
    }

    #[test]
    fn test_unbound_variable_is_fatal() {
        match run_with_output("(+ 1 undefined-thing)").0 {
            Err(Error::UnboundVariable(name)) =>
                assert_eq!(name, "undefined-thing"),
            other => panic!("expected unbound variable, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_non_procedure_is_fatal() {
        match run_with_output("(1 2)").0 {
            Err(Error::NotAProcedure(value)) => assert_eq!(value, "1"),
            other => panic!("expected fatal apply error, got {:?}", other),
        }
    }

    #[test]
    fn test_argument_count_mismatch_is_reported() {
        let (result, output) = run_with_output("((lambda (x y) x) 1)");
        assert!(result.unwrap().is_null());
        assert!(output.starts_with(
            "ERR: Variables and values must be equal in length: (x y) (1)"));
    }

    #[test]
    fn test_unknown_expression() {
        let (result, output) = run_with_output("#\\a");
        assert!(result.unwrap().is_null());
        assert_eq!(output, "ERR: Unknown expression type: #\\a\n");
    }

    #[test]
    fn test_print_compound_procedure() {
        comparison("(lambda (x) (+ x 1))",
            "(compound-procedure (x) ((+ x 1)) '<procedure-env>)");
    }

    #[test]
    fn test_argument_order() {
        let (result, output) = run_with_output(
            "(list (print 1) (print 2) (print 3))");
        result.unwrap();
        assert_eq!(output, "1\n2\n3\n");
    }

    #[test]
    fn test_procedure_values_applied_indirectly() {
        comparison("((lambda (f x) (f x)) car '(1 2))", "1");
        comparison("((lambda (f x) (f x)) (lambda (y) (* y y)) 7)", "49");
        comparison("(define (twice f) (lambda (x) (f (f x)))) ((twice cdr) '(1 2 3))",
            "(3)");
    }

    #[test]
    fn test_load_parse_error_names_file() {
        let path = env::temp_dir().join("lithp-runtime-bad-quote.scm");
        fs::write(&path, "\"abc\"def").unwrap();
        let path = path.to_str().unwrap().to_string();
        let (mut interp, _) = interpreter();
        let result = interp.load_file(&path);
        fs::remove_file(&path).unwrap();
        match result {
            Err(Error::Load {path: failed, reason}) => {
                assert_eq!(failed, path);
                assert!(reason.starts_with("Can't terminate quote here"),
                    "unexpected reason {:?}", reason);
            },
            other => panic!("expected load error, got {:?}", other),
        }
    }

    struct BrokenPort;

    impl Write for BrokenPort {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_report_survives_broken_output() {
        let mut interp = Interpreter::with_output(Box::new(BrokenPort));
        assert!(run_in(&mut interp, "(length 5)").unwrap().is_null());
        assert_eq!(run_in(&mut interp, "(+ 1 2)").unwrap(), Scheme::int(3));
    }
}
