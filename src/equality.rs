
use crate::scheme::Scheme;

pub trait SchemeEq {
    /// `eq?`: atoms by value, everything else by identity.
    fn eqv(&self, other: &Self) -> bool;

    /// `equal?`: like `eqv` but recurses into pairs.
    fn equal(&self, other: &Self) -> bool {
        self.eqv(other)
    }
}

impl SchemeEq for Scheme {
    fn eqv(&self, other: &Scheme) -> bool {
        if self.is(other) {
            true
        } else if let n@Some(_) = self.as_int() {
            n == other.as_int()
        } else if let b@Some(_) = self.as_boolean() {
            b == other.as_boolean()
        } else if let c@Some(_) = self.as_character() {
            c == other.as_character()
        } else if let s@Some(_) = self.as_symbol() {
            s == other.as_symbol()
        } else if let s@Some(_) = self.as_string() {
            s == other.as_string()
        } else if self.is_null() {
            other.is_null()
        } else if let Some(procc) = self.as_procedure() {
            other.as_procedure().map_or(false, |p| procc.same_builtin(p))
        } else {
            false
        }
    }

    // Assumes finite structure along the car direction; cdr chains are
    // walked iteratively.
    fn equal(&self, other: &Scheme) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        loop {
            match (a.as_pair(), b.as_pair()) {
                (Some((x, xs)), Some((y, ys))) => {
                    if a.is(&b) {
                        return true;
                    }
                    if !x.equal(&y) {
                        return false;
                    }
                    a = xs;
                    b = ys;
                },
                (None, None) => return a.eqv(&b),
                _ => return false,
            }
        }
    }
}

impl PartialEq for Scheme {
    fn eq(&self, other: &Scheme) -> bool {
        self.equal(other)
    }
}

#[cfg(test)]
mod test {
    use crate::read::read;
    use crate::scheme::Scheme;
    use super::SchemeEq;

    #[test]
    fn test_eqv_atoms() {
        assert!(Scheme::int(3).eqv(&Scheme::int(3)));
        assert!(!Scheme::int(3).eqv(&Scheme::int(4)));
        assert!(Scheme::symbol("a").eqv(&Scheme::symbol("a")));
        assert!(Scheme::string("s").eqv(&Scheme::string("s")));
        assert!(Scheme::character('c').eqv(&Scheme::character('c')));
        assert!(Scheme::null().eqv(&Scheme::null()));
        assert!(!Scheme::null().eqv(&Scheme::boolean(false)));
        assert!(!Scheme::int(0).eqv(&Scheme::boolean(false)));
        assert!(!Scheme::symbol("a").eqv(&Scheme::string("a")));
    }

    #[test]
    fn test_eqv_pairs_by_identity() {
        let a = read("(1 2)").unwrap();
        let b = read("(1 2)").unwrap();
        assert!(a.eqv(&a));
        assert!(!a.eqv(&b));
        assert!(a.equal(&b));
    }

    #[test]
    fn test_equal() {
        assert!(read("(1 (2 \"x\") #\\c)").unwrap()
            .equal(&read("(1 (2 \"x\") #\\c)").unwrap()));
        assert!(!read("(1 2)").unwrap().equal(&read("(1 2 3)").unwrap()));
        assert!(!read("(1 2)").unwrap().equal(&read("(1 3)").unwrap()));
        assert!(!read("(1)").unwrap().equal(&Scheme::int(1)));
        assert!(Scheme::cons(Scheme::int(1), Scheme::int(2))
            .equal(&Scheme::cons(Scheme::int(1), Scheme::int(2))));
    }
}
