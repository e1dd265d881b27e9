//! The type-string mini-parser (§4.6, §9).
//!
//! Parsed functions carry type information as source-level strings
//! (`[]T`, `archsimd.Float32x8`, `Vec[T]`). Rather than re-parsing those
//! strings at every rewrite site we parse once into `TypeExpr` and keep
//! everything downstream — substitution, specialization, composite-literal
//! element types, conversions — structural. `Display` round-trips back to
//! the same surface syntax so the emitter never sees the difference.

use std::fmt;

/// A structured stand-in for a Go-shaped type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A bare name: `T`, `int`, `Float32x8`.
    Named(String),
    /// A package-qualified name: `archsimd.Float32x8`.
    Qualified(String, String),
    /// `[]T`
    Slice(Box<TypeExpr>),
    /// `*T`
    Pointer(Box<TypeExpr>),
    /// `[N]T`
    Array(u64, Box<TypeExpr>),
    /// `Vec[T]`, `Mask[T]`, or any other bracketed generic instantiation.
    Generic(String, Vec<TypeExpr>),
    /// `func(params...) (results...)`
    Func(Vec<TypeExpr>, Vec<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into())
    }

    pub fn qualified(pkg: impl Into<String>, name: impl Into<String>) -> Self {
        TypeExpr::Qualified(pkg.into(), name.into())
    }

    pub fn slice(elem: TypeExpr) -> Self {
        TypeExpr::Slice(Box::new(elem))
    }

    pub fn pointer(elem: TypeExpr) -> Self {
        TypeExpr::Pointer(Box::new(elem))
    }

    pub fn array(len: u64, elem: TypeExpr) -> Self {
        TypeExpr::Array(len, Box::new(elem))
    }

    /// Returns the innermost named identifier, stripping slice/pointer/array
    /// wrappers and generic instantiation (but not qualification) — used by
    /// the identifier resolver when deciding whether a type mentions a type
    /// parameter.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Named(n) => Some(n),
            TypeExpr::Qualified(_, n) => Some(n),
            TypeExpr::Slice(inner) | TypeExpr::Pointer(inner) | TypeExpr::Array(_, inner) => {
                inner.base_name()
            }
            TypeExpr::Generic(n, _) => Some(n),
            TypeExpr::Func(..) => None,
        }
    }

    /// Substitutes every occurrence of a bare named identifier `from` with
    /// `to`, recursing through slices/pointers/arrays/generics/func types.
    pub fn substitute_named(&self, from: &str, to: &TypeExpr) -> TypeExpr {
        match self {
            TypeExpr::Named(n) if n == from => to.clone(),
            TypeExpr::Named(_) | TypeExpr::Qualified(..) => self.clone(),
            TypeExpr::Slice(inner) => TypeExpr::slice(inner.substitute_named(from, to)),
            TypeExpr::Pointer(inner) => TypeExpr::pointer(inner.substitute_named(from, to)),
            TypeExpr::Array(n, inner) => TypeExpr::array(*n, inner.substitute_named(from, to)),
            TypeExpr::Generic(name, args) => TypeExpr::Generic(
                name.clone(),
                args.iter().map(|a| a.substitute_named(from, to)).collect(),
            ),
            TypeExpr::Func(params, results) => TypeExpr::Func(
                params.iter().map(|a| a.substitute_named(from, to)).collect(),
                results.iter().map(|a| a.substitute_named(from, to)).collect(),
            ),
        }
    }

    /// Parses a type-expression source string. Falls back to `Named` on
    /// anything the mini-grammar does not recognize rather than failing —
    /// unparseable fragments are preserved verbatim by round-tripping through
    /// `Display`, which is what an implementer downgrading to pure
    /// string manipulation would get "for free" anyway (see §9).
    pub fn parse(s: &str) -> TypeExpr {
        let mut p = Parser {
            chars: s.trim().chars().collect(),
            pos: 0,
        };
        p.parse_type().unwrap_or_else(|| TypeExpr::Named(s.trim().to_string()))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(n) => write!(f, "{n}"),
            TypeExpr::Qualified(pkg, n) => write!(f, "{pkg}.{n}"),
            TypeExpr::Slice(inner) => write!(f, "[]{inner}"),
            TypeExpr::Pointer(inner) => write!(f, "*{inner}"),
            TypeExpr::Array(n, inner) => write!(f, "[{n}]{inner}"),
            TypeExpr::Generic(name, args) => {
                write!(f, "{name}[")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, "]")
            }
            TypeExpr::Func(params, results) => {
                write!(f, "func(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")?;
                if !results.is_empty() {
                    write!(f, " (")?;
                    for (i, r) in results.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{r}")?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_type(&mut self) -> Option<TypeExpr> {
        self.skip_ws();
        match self.peek()? {
            '*' => {
                self.bump();
                Some(TypeExpr::pointer(self.parse_type()?))
            }
            '[' => {
                self.bump();
                self.skip_ws();
                if self.eat(']') {
                    return Some(TypeExpr::slice(self.parse_type()?));
                }
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let len: u64 = self.chars[start..self.pos].iter().collect::<String>().parse().ok()?;
                self.skip_ws();
                if !self.eat(']') {
                    return None;
                }
                Some(TypeExpr::array(len, self.parse_type()?))
            }
            'f' if self.matches_keyword("func") => {
                self.pos += 4;
                self.skip_ws();
                if !self.eat('(') {
                    return None;
                }
                let params = self.parse_type_list(')')?;
                self.skip_ws();
                let mut results = Vec::new();
                if self.eat('(') {
                    results = self.parse_type_list(')')?;
                } else if let Some(t) = self.try_parse_bare_result() {
                    results.push(t);
                }
                Some(TypeExpr::Func(params, results))
            }
            c if c.is_alphabetic() || c == '_' => {
                let name = self.parse_ident();
                self.skip_ws();
                if self.eat('.') {
                    let field = self.parse_ident();
                    return Some(TypeExpr::qualified(name, field));
                }
                if self.eat('[') {
                    let args = self.parse_type_list(']')?;
                    return Some(TypeExpr::Generic(name, args));
                }
                Some(TypeExpr::Named(name))
            }
            _ => None,
        }
    }

    fn try_parse_bare_result(&mut self) -> Option<TypeExpr> {
        let save = self.pos;
        self.skip_ws();
        if matches!(self.peek(), Some(c) if c.is_alphabetic() || c == '_' || c == '[' || c == '*') {
            self.parse_type()
        } else {
            self.pos = save;
            None
        }
    }

    fn matches_keyword(&self, kw: &str) -> bool {
        let kw_chars: Vec<char> = kw.chars().collect();
        if self.pos + kw_chars.len() > self.chars.len() {
            return false;
        }
        if self.chars[self.pos..self.pos + kw_chars.len()] != kw_chars[..] {
            return false;
        }
        matches!(
            self.chars.get(self.pos + kw_chars.len()),
            None | Some(' ') | Some('(')
        )
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_type_list(&mut self, close: char) -> Option<Vec<TypeExpr>> {
        let mut out = Vec::new();
        self.skip_ws();
        if self.eat(close) {
            return Some(out);
        }
        loop {
            out.push(self.parse_type()?);
            self.skip_ws();
            if self.eat(',') {
                self.skip_ws();
                continue;
            }
            break;
        }
        self.skip_ws();
        if self.eat(close) { Some(out) } else { None }
    }
}
