//! Parameter plumbing shared by all device families.
//!
//! User-facing parameters are stored as [`Given`] values so that the resolver
//! can tell "left at default" from "explicitly set to the default value".
//! The introspection surface addresses parameters by stable integer id and
//! exchanges them as [`Value`]s.

use indexmap::IndexMap;
use num_complex::Complex64;

/// A parameter value together with whether the user supplied it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Given<T> {
    value: Option<T>,
}

impl<T: Copy> Given<T> {
    /// A parameter the user did not supply.
    pub const fn none() -> Self {
        Self { value: None }
    }

    /// A parameter the user supplied.
    pub const fn new(value: T) -> Self {
        Self { value: Some(value) }
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub fn get(&self) -> Option<T> {
        self.value
    }

    pub fn is_given(&self) -> bool {
        self.value.is_some()
    }

    /// The supplied value, or `default`.
    #[inline]
    pub fn or(&self, default: T) -> T {
        self.value.unwrap_or(default)
    }
}

impl<T: Copy> From<T> for Given<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// Kind of value a parameter holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Real,
    Int,
    Flag,
    Complex,
    Text,
}

/// A value exchanged through ask/set.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Real(f64),
    Int(i64),
    Flag(bool),
    Complex(Complex64),
    Text(&'static str),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Real(_) => ValueKind::Real,
            Value::Int(_) => ValueKind::Int,
            Value::Flag(_) => ValueKind::Flag,
            Value::Complex(_) => ValueKind::Complex,
            Value::Text(_) => ValueKind::Text,
        }
    }

    /// Numeric value; integers are widened.
    pub fn as_real(&self) -> Option<f64> {
        match *self {
            Value::Real(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean value; integers are true when nonzero.
    pub fn as_flag(&self) -> Option<bool> {
        match *self {
            Value::Flag(v) => Some(v),
            Value::Int(v) => Some(v != 0),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<Complex64> {
        match *self {
            Value::Complex(v) => Some(v),
            Value::Real(v) => Some(Complex64::new(v, 0.0)),
            _ => None,
        }
    }
}

/// Whether a parameter can be read, written, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Settable and askable.
    InOut,
    /// Settable only (e.g. type flags).
    Input,
    /// Askable only (operating-point and derived quantities).
    Output,
}

impl Access {
    pub fn settable(self) -> bool {
        matches!(self, Access::InOut | Access::Input)
    }

    pub fn askable(self) -> bool {
        matches!(self, Access::InOut | Access::Output)
    }
}

/// One row of a parameter table.
#[derive(Debug, Clone, Copy)]
pub struct ParamInfo<P: 'static> {
    pub param: P,
    pub id: u32,
    pub name: &'static str,
    pub kind: ValueKind,
    pub access: Access,
    pub description: &'static str,
}

/// Ordered lookup over a static parameter list, by id or by name.
#[derive(Debug)]
pub struct ParamTable<P: 'static> {
    entries: &'static [ParamInfo<P>],
    by_id: IndexMap<u32, usize>,
    by_name: IndexMap<&'static str, usize>,
}

impl<P: Copy> ParamTable<P> {
    pub fn new(entries: &'static [ParamInfo<P>]) -> Self {
        let by_id = entries.iter().enumerate().map(|(i, e)| (e.id, i)).collect();
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name, i))
            .collect();
        Self {
            entries,
            by_id,
            by_name,
        }
    }

    pub fn by_id(&self, id: u32) -> Option<&ParamInfo<P>> {
        self.by_id.get(&id).map(|&i| &self.entries[i])
    }

    /// Case-insensitive name lookup.
    pub fn by_name(&self, name: &str) -> Option<&ParamInfo<P>> {
        self.by_name
            .get(name)
            .or_else(|| self.by_name.get(name.to_ascii_lowercase().as_str()))
            .map(|&i| &self.entries[i])
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ParamInfo<P>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum P {
        A,
        B,
    }

    static ENTRIES: [ParamInfo<P>; 2] = [
        ParamInfo {
            param: P::A,
            id: 101,
            name: "alpha",
            kind: ValueKind::Real,
            access: Access::InOut,
            description: "first",
        },
        ParamInfo {
            param: P::B,
            id: 102,
            name: "beta",
            kind: ValueKind::Flag,
            access: Access::Input,
            description: "second",
        },
    ];

    #[test]
    fn test_given() {
        let mut g: Given<f64> = Given::none();
        assert!(!g.is_given());
        assert_eq!(g.or(2.0), 2.0);
        g.set(0.0);
        assert!(g.is_given());
        assert_eq!(g.or(2.0), 0.0);
        g.clear();
        assert_eq!(g.get(), None);
    }

    #[test]
    fn test_table_lookup() {
        let table = ParamTable::new(&ENTRIES);
        assert_eq!(table.len(), 2);
        assert_eq!(table.by_id(102).map(|e| e.param), Some(P::B));
        assert_eq!(table.by_name("ALPHA").map(|e| e.id), Some(101));
        assert!(table.by_id(7).is_none());
        assert!(table.by_name("gamma").is_none());
        let names: Vec<_> = table.iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Int(3).as_real(), Some(3.0));
        assert_eq!(Value::Int(0).as_flag(), Some(false));
        assert_eq!(Value::Flag(true).as_real(), None);
        assert_eq!(Value::Real(1.5).as_complex(), Some(Complex64::new(1.5, 0.0)));
        assert!(Access::Output.askable());
        assert!(!Access::Output.settable());
    }
}
