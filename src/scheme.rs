
// For some reason importing std::borrow::Borrow produces a name collision with
// RefCell::borrow but just importing std::borrow doesn't.
use std::borrow;
use std::collections::HashSet;
use std::fmt;
use std::iter::DoubleEndedIterator;

use gc::{Finalize, Gc, GcCell, Trace};

pub use crate::runtime::{Environment, Procedure};

#[derive(Finalize, Trace)]
enum SchemeData {
    Null,
    Boolean(bool),
    Int(i64),
    Character(char),
    String(String),
    Symbol(String),
    Cons(GcCell<Scheme>, GcCell<Scheme>),
    Procedure(Procedure),
    Environment(Environment),
}

/// Handle to a node in the value store. Cloning shares the node; identity
/// (`Scheme::is`) is identity of the underlying allocation.
#[derive(Clone, Finalize, Trace)]
pub struct Scheme(Gc<SchemeData>);

// The gc heap is per-thread, so the canonical singletons are too.
thread_local! {
    static NULL: Scheme = Scheme::from_data(SchemeData::Null);
    static TRUE: Scheme = Scheme::from_data(SchemeData::Boolean(true));
    static FALSE: Scheme = Scheme::from_data(SchemeData::Boolean(false));
}

/// Evaluation errors. Fatal ones end the session; the rest are reported and
/// replaced by `()` where they happened.
#[derive(Clone, Debug)]
pub enum Error {
    UnboundVariable(String),
    NotAPair {
        operation: &'static str,
        value: String,
    },
    NotAProcedure(String),
    Arity {
        procedure: &'static str,
        expected: &'static str,
        got: usize,
    },
    WrongType {
        procedure: &'static str,
        expected: &'static str,
        value: String,
    },
    Overflow(&'static str),
    ArgumentCount {
        variables: String,
        values: String,
    },
    SetUnbound(String),
    ElseNotLast,
    MalformedForm {
        form: &'static str,
        expression: String,
    },
    UnknownExpression(String),
    Load {
        path: String,
        reason: String,
    },
    Output(String),
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        match *self {
            Error::UnboundVariable(_)
            | Error::NotAPair {..}
            | Error::NotAProcedure(_) => true,
            _ => false,
        }
    }

    pub fn wrong_type(procedure: &'static str, expected: &'static str,
        value: &Scheme) -> Error {

        Error::WrongType {
            procedure,
            expected,
            value: value.to_string(),
        }
    }

    pub fn malformed(form: &'static str, expression: &Scheme) -> Error {
        Error::MalformedForm {
            form,
            expression: expression.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::UnboundVariable(ref name) =>
                write!(f, "Unbound variable: {}", name),
            Error::NotAPair {operation, ref value} =>
                write!(f, "Tried to apply {} to non-pair: {}", operation, value),
            Error::NotAProcedure(ref value) =>
                write!(f, "Unknown procedure type in apply: {}", value),
            Error::Arity {procedure, expected, got} =>
                write!(f, "wrong number of arguments to {}, expected {}, got {}",
                    procedure, expected, got),
            Error::WrongType {procedure, expected, ref value} =>
                write!(f, "{} expected {}, got {}", procedure, expected, value),
            Error::Overflow(procedure) =>
                write!(f, "integer overflow in {}", procedure),
            Error::ArgumentCount {ref variables, ref values} =>
                write!(f, "Variables and values must be equal in length: {} {}",
                    variables, values),
            Error::SetUnbound(ref name) =>
                write!(f, "Unable to set unbound variable {}", name),
            Error::ElseNotLast =>
                write!(f, "else clause isn't last in cond clauses"),
            Error::MalformedForm {form, ref expression} =>
                write!(f, "malformed {}: {}", form, expression),
            Error::UnknownExpression(ref expr) =>
                write!(f, "Unknown expression type: {}", expr),
            Error::Load {ref path, ref reason} =>
                write!(f, "unable to load {}: {}", path, reason),
            Error::Output(ref reason) =>
                write!(f, "unable to write output: {}", reason),
        }
    }
}

impl Scheme {
    fn from_data(data: SchemeData) -> Scheme {
        Scheme(Gc::new(data))
    }

    pub fn as_ptr(&self) -> *const () {
        &*self.0 as *const SchemeData as *const ()
    }

    pub fn is(&self, other: &Scheme) -> bool {
        self.as_ptr() == other.as_ptr()
    }

    pub fn boolean(b: bool) -> Scheme {
        if b {
            TRUE.with(Scheme::clone)
        } else {
            FALSE.with(Scheme::clone)
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        if let SchemeData::Boolean(b) = *self.0 {
            Some(b)
        } else {
            None
        }
    }

    pub fn character(c: char) -> Scheme {
        Scheme::from_data(SchemeData::Character(c))
    }

    pub fn as_character(&self) -> Option<char> {
        if let SchemeData::Character(c) = *self.0 {
            Some(c)
        } else {
            None
        }
    }

    pub fn null() -> Scheme {
        NULL.with(Scheme::clone)
    }

    pub fn is_null(&self) -> bool {
        match *self.0 {
            SchemeData::Null => true,
            _ => false,
        }
    }

    pub fn cons(fst: Scheme, snd: Scheme) -> Scheme {
        Scheme::from_data(SchemeData::Cons(GcCell::new(fst), GcCell::new(snd)))
    }

    pub fn as_pair(&self) -> Option<(Scheme, Scheme)> {
        if let SchemeData::Cons(ref x, ref y) = *self.0 {
            Some((x.borrow().clone(), y.borrow().clone()))
        } else {
            None
        }
    }

    pub fn as_pair_mut(&self) -> Option<(&GcCell<Scheme>, &GcCell<Scheme>)> {
        if let SchemeData::Cons(ref x, ref y) = *self.0 {
            Some((x, y))
        } else {
            None
        }
    }

    /// `car` as the evaluator and `car` primitive see it: a non-pair is fatal.
    pub fn car(&self) -> Result<Scheme, Error> {
        self.as_pair().map(|(a, _)| a).ok_or_else(|| Error::NotAPair {
            operation: "car",
            value: self.to_string(),
        })
    }

    pub fn cdr(&self) -> Result<Scheme, Error> {
        self.as_pair().map(|(_, b)| b).ok_or_else(|| Error::NotAPair {
            operation: "cdr",
            value: self.to_string(),
        })
    }

    pub fn procedure(procc: Procedure) -> Scheme {
        Scheme::from_data(SchemeData::Procedure(procc))
    }

    pub fn as_procedure(&self) -> Option<&Procedure> {
        if let SchemeData::Procedure(ref procc) = *self.0 {
            Some(procc)
        } else {
            None
        }
    }

    pub fn symbol<S: ToString>(s: S) -> Scheme {
        Scheme::from_data(SchemeData::Symbol(s.to_string()))
    }

    pub fn as_symbol(&self) -> Option<&str> {
        if let SchemeData::Symbol(ref s) = *self.0 {
            Some(&*s)
        } else {
            None
        }
    }

    pub fn int(n: i64) -> Scheme {
        Scheme::from_data(SchemeData::Int(n))
    }

    pub fn as_int(&self) -> Option<i64> {
        if let SchemeData::Int(n) = *self.0 {
            Some(n)
        } else {
            None
        }
    }

    pub fn string<S: ToString>(s: S) -> Scheme {
        Scheme::from_data(SchemeData::String(s.to_string()))
    }

    pub fn as_string(&self) -> Option<&str> {
        if let SchemeData::String(ref s) = *self.0 {
            Some(&*s)
        } else {
            None
        }
    }

    pub fn environment(env: Environment) -> Scheme {
        Scheme::from_data(SchemeData::Environment(env))
    }

    pub fn as_environment(&self) -> Option<&Environment> {
        if let SchemeData::Environment(ref env) = *self.0 {
            Some(env)
        } else {
            None
        }
    }

    pub fn is_self_evaluating(&self) -> bool {
           self.as_int().is_some()
        || self.as_string().is_some()
        || self.as_boolean().is_some()
    }

    /// Only the canonical `#f` is false.
    pub fn truey(&self) -> bool {
        !self.is(&Scheme::boolean(false))
    }

    /// Elements of a proper list, or `None` for improper and cyclic lists.
    pub fn into_vec(&self) -> Option<Vec<Scheme>> {
        let mut cur_elems = Vec::new();
        let mut head = self.clone();
        let mut lagging = self.clone();

        loop {
            if let Some((car, cdr)) = head.as_pair() {
                cur_elems.push(car);
                head = cdr;
            } else if head.is_null() {
                return Some(cur_elems);
            } else {
                return None;
            }
            if cur_elems.len() % 2 == 0 {
                lagging = lagging.as_pair()?.1;
                if lagging.is(&head) && !head.is_null() {
                    return None;
                }
            }
        }
    }

    pub fn list<E: borrow::Borrow<Scheme>, I: IntoIterator<Item=E>>(iter: I) ->
        Scheme where I::IntoIter : DoubleEndedIterator {

        let mut res = Scheme::null();
        for elem in iter.into_iter().rev() {
            res = Scheme::cons(elem.borrow().clone(), res);
        }
        res
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_scheme(self, f, &mut HashSet::new())
    }
}

impl fmt::Debug for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

// `open` holds the pairs currently being printed; meeting one again means the
// structure loops back on itself.
fn write_scheme(value: &Scheme, f: &mut fmt::Formatter,
    open: &mut HashSet<*const ()>) -> fmt::Result {

    match *value.0 {
        SchemeData::Null => write!(f, "()"),
        SchemeData::Boolean(b) => {
            let c = if b {'t'} else {'f'};
            write!(f, "#{}", c)
        },
        SchemeData::Int(n) => write!(f, "{}", n),
        SchemeData::Character(' ') => write!(f, "#\\space"),
        SchemeData::Character('\n') => write!(f, "#\\newline"),
        SchemeData::Character(c) => write!(f, "#\\{}", c),
        SchemeData::String(ref s) => write!(f, "\"{}\"", s),
        SchemeData::Symbol(ref s) => write!(f, "{}", s),
        SchemeData::Cons(..) => write_list(value, f, open),
        SchemeData::Procedure(ref procc) => match procc.as_lambda() {
            Some((params, body)) => {
                write!(f, "(compound-procedure ")?;
                write_scheme(params, f, open)?;
                write!(f, " ")?;
                write_scheme(body, f, open)?;
                write!(f, " '<procedure-env>)")
            },
            None => write!(f, "#<primitive>"),
        },
        SchemeData::Environment(_) => write!(f, "#<environment>"),
    }
}

fn write_list(value: &Scheme, f: &mut fmt::Formatter,
    open: &mut HashSet<*const ()>) -> fmt::Result {

    if open.contains(&value.as_ptr()) {
        return write!(f, "...");
    }
    let mut spine = Vec::new();
    let mut head = value.clone();
    write!(f, "(")?;
    while let Some((a, b)) = head.as_pair() {
        if open.contains(&head.as_ptr()) {
            write!(f, " . ...")?;
            head = Scheme::null();
            break;
        }
        open.insert(head.as_ptr());
        spine.push(head.as_ptr());
        if spine.len() > 1 {
            write!(f, " ")?;
        }
        write_scheme(&a, f, open)?;
        head = b;
    }
    let result = if head.is_null() {
        write!(f, ")")
    } else {
        write!(f, " . ")
            .and_then(|_| write_scheme(&head, f, open))
            .and_then(|_| write!(f, ")"))
    };
    for ptr in spine {
        open.remove(&ptr);
    }
    result
}

#[cfg(test)]
mod test {
    use crate::read::read;
    use super::Scheme;

    fn reprint(input: &str) -> String {
        read(input).unwrap().to_string()
    }

    #[test]
    fn test_singletons() {
        assert!(Scheme::null().is(&Scheme::null()));
        assert!(Scheme::boolean(false).is(&Scheme::boolean(false)));
        assert!(!Scheme::boolean(true).is(&Scheme::boolean(false)));
        assert!(!Scheme::boolean(false).truey());
        assert!(Scheme::int(0).truey());
        assert!(Scheme::null().truey());
    }

    #[test]
    fn test_print_atoms() {
        assert_eq!(Scheme::int(-42).to_string(), "-42");
        assert_eq!(Scheme::boolean(true).to_string(), "#t");
        assert_eq!(Scheme::character('a').to_string(), "#\\a");
        assert_eq!(Scheme::character(' ').to_string(), "#\\space");
        assert_eq!(Scheme::character('\n').to_string(), "#\\newline");
        assert_eq!(Scheme::string("hi").to_string(), "\"hi\"");
        assert_eq!(Scheme::symbol("foo").to_string(), "foo");
        assert_eq!(Scheme::null().to_string(), "()");
    }

    #[test]
    fn test_print_pairs() {
        let improper = Scheme::cons(Scheme::int(1), Scheme::int(2));
        assert_eq!(improper.to_string(), "(1 . 2)");
        let list = Scheme::list(&[Scheme::int(1), Scheme::int(2),
            Scheme::int(3)]);
        assert_eq!(list.to_string(), "(1 2 3)");
        let nested = Scheme::list(&[Scheme::null(), list]);
        assert_eq!(nested.to_string(), "(() (1 2 3))");
    }

    #[test]
    fn test_print_cycle() {
        let list = Scheme::list(&[Scheme::int(1), Scheme::int(2)]);
        let (_, tail) = list.as_pair().unwrap();
        *tail.as_pair_mut().unwrap().1.borrow_mut() = list.clone();
        assert_eq!(list.to_string(), "(1 2 . ...)");

        let boxed = Scheme::list(&[Scheme::int(1)]);
        *boxed.as_pair_mut().unwrap().0.borrow_mut() = boxed.clone();
        assert_eq!(boxed.to_string(), "(...)");
    }

    #[test]
    fn test_print_idempotent() {
        for literal in &["42", "#t", "#f", "#\\a", "#\\space", "#\\newline",
            "\"hi\\nthere\"", "foo", "()", "(1 2 3)", "(quote (a b))", "'x"] {
            let once = reprint(literal);
            assert_eq!(reprint(&once), once, "literal {}", literal);
        }
    }

    #[test]
    fn test_into_vec() {
        let list = Scheme::list(&[Scheme::int(1), Scheme::int(2)]);
        assert_eq!(list.into_vec().unwrap().len(), 2);
        assert_eq!(Scheme::null().into_vec().unwrap().len(), 0);
        assert!(Scheme::cons(Scheme::int(1), Scheme::int(2)).into_vec()
            .is_none());
        assert!(Scheme::int(1).into_vec().is_none());

        let (_, tail) = list.as_pair().unwrap();
        *tail.as_pair_mut().unwrap().1.borrow_mut() = list.clone();
        assert!(list.into_vec().is_none());
    }
}
