use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Cell 0 is the accumulator, so
/// storage starts right after it.
pub const FIRST_ADDRESS: i64 = 1;

/// The scope that owns a name.
/// Procedures don't nest and can't see
/// the main block's variables, so every
/// name lives in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeId<'a> {
    Main,
    Procedure(&'a str),
}

impl<'a> Display for ScopeId<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeId::Main => write!(f, "main"),
            ScopeId::Procedure(name) => write!(f, "{name}"),
        }
    }
}

/// Inclusive bounds of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayBounds {
    pub from: i64,
    pub to: i64,
}

impl ArrayBounds {
    /// Parses bounds as written in a
    /// declaration, rejecting anything that
    /// isn't an integer or where `to < from`.
    pub fn parse(from: &str, to: &str) -> Result<ArrayBounds, SymbolError> {
        let parse_bound = |text: &str| {
            text.parse::<i64>().map_err(|_| SymbolError::InvalidBound {
                text: text.to_string(),
            })
        };

        let from = parse_bound(from)?;
        let to = parse_bound(to)?;

        if to < from {
            return Err(SymbolError::InvertedBounds { from, to });
        }

        Ok(ArrayBounds { from, to })
    }

    /// The number of cells in the array.
    pub fn size(&self) -> i64 {
        self.to - self.from + 1
    }
}

/// What kind of storage a symbol has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// A declared variable.
    Scalar,

    /// A `FOR` loop's counter.
    /// Behaves like a scalar, and stays
    /// visible after the loop.
    Iterator,

    /// A declared array. Its address
    /// is the cell holding `from`.
    Array(ArrayBounds),

    /// A procedure argument.
    /// Its address is a cell holding a
    /// reference to the caller's storage:
    /// the address of a scalar, or the
    /// zero point of an array.
    Argument { array: bool },

    /// A compiler-generated temporary.
    Temporary,
}

/// A declared name and its storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol<'a> {
    pub name: Cow<'a, str>,
    pub kind: SymbolKind,

    /// The first cell of the symbol.
    /// Never reused for another symbol.
    pub address: i64,

    pub scope: ScopeId<'a>,
}

impl<'a> Symbol<'a> {
    /// The number of cells this symbol
    /// occupies.
    pub fn size(&self) -> i64 {
        match self.kind {
            SymbolKind::Array(bounds) => bounds.size(),
            _ => 1,
        }
    }

    /// Is this something that can be indexed?
    pub fn is_array(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Array(_) | SymbolKind::Argument { array: true }
        )
    }

    /// The address that element 0 of an
    /// array would have, if it existed.
    /// Element `i` lives at `zero_point + i`.
    /// For anything but a local array this
    /// is just the address.
    pub fn zero_point(&self) -> i64 {
        match self.kind {
            SymbolKind::Array(bounds) => self.address - bounds.from,
            _ => self.address,
        }
    }
}

/// The signature and storage of
/// a declared procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureInfo<'a> {
    /// Argument names and whether each
    /// one is an array, in order.
    pub args: Vec<(Cow<'a, str>, bool)>,

    /// The cell that holds the position
    /// to return to.
    pub return_cell: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("`{name}` is already declared in {scope}")]
    DuplicateDeclaration { name: String, scope: String },

    #[error("procedure `{name}` is already declared")]
    DuplicateProcedure { name: String },

    #[error("`{name}` is not declared in {scope}")]
    UndeclaredIdentifier { name: String, scope: String },

    #[error("procedure `{name}` is not declared")]
    UndeclaredProcedure { name: String },

    #[error("array bound `{text}` is not an integer")]
    InvalidBound { text: String },

    #[error("array bounds {from}:{to} are inverted")]
    InvertedBounds { from: i64, to: i64 },
}

/// Every symbol of a compilation unit,
/// and the allocator handing out their
/// memory cells.
#[derive(Debug, Clone)]
pub struct SymbolTable<'a> {
    scopes: HashMap<ScopeId<'a>, HashMap<Cow<'a, str>, Symbol<'a>>>,
    procedures: HashMap<&'a str, ProcedureInfo<'a>>,

    /// The next free cell. Only ever grows.
    next_address: i64,
}

impl<'a> Default for SymbolTable<'a> {
    fn default() -> Self {
        SymbolTable {
            scopes: HashMap::new(),
            procedures: HashMap::new(),
            next_address: FIRST_ADDRESS,
        }
    }
}

impl<'a> SymbolTable<'a> {
    pub fn new() -> SymbolTable<'a> {
        Self::default()
    }

    /// Declares a name in a scope, giving it
    /// the next free cells.
    /// Returns the symbol's address.
    pub fn declare(
        &mut self,
        scope: ScopeId<'a>,
        name: impl Into<Cow<'a, str>>,
        kind: SymbolKind,
    ) -> Result<i64, SymbolError> {
        let name = name.into();
        let symbols = self.scopes.entry(scope).or_default();

        if symbols.contains_key(&name) {
            return Err(SymbolError::DuplicateDeclaration {
                name: name.into_owned(),
                scope: scope.to_string(),
            });
        }

        let symbol = Symbol {
            name: name.clone(),
            kind,
            address: self.next_address,
            scope,
        };
        self.next_address += symbol.size();

        log::trace!(
            "Allocated {name} in {scope} at {} ({} cells)",
            symbol.address,
            symbol.size()
        );

        let address = symbol.address;
        symbols.insert(name, symbol);

        Ok(address)
    }

    /// Declares a procedure, allocating its
    /// return cell. The arguments still need to
    /// be declared in the procedure's scope.
    pub fn declare_procedure(
        &mut self,
        name: &'a str,
        args: Vec<(Cow<'a, str>, bool)>,
    ) -> Result<i64, SymbolError> {
        if self.procedures.contains_key(name) {
            return Err(SymbolError::DuplicateProcedure {
                name: name.to_string(),
            });
        }

        let return_cell = self.next_address;
        self.next_address += 1;

        self.procedures
            .insert(name, ProcedureInfo { args, return_cell });

        Ok(return_cell)
    }

    /// Finds a name in a scope.
    /// A procedure only sees its own arguments
    /// and locals; main only sees its own
    /// variables.
    pub fn lookup(&self, scope: ScopeId<'a>, name: &str) -> Result<&Symbol<'a>, SymbolError> {
        self.scopes
            .get(&scope)
            .and_then(|symbols| symbols.get(name))
            .ok_or_else(|| SymbolError::UndeclaredIdentifier {
                name: name.to_string(),
                scope: scope.to_string(),
            })
    }

    pub fn procedure(&self, name: &str) -> Result<&ProcedureInfo<'a>, SymbolError> {
        self.procedures
            .get(name)
            .ok_or_else(|| SymbolError::UndeclaredProcedure {
                name: name.to_string(),
            })
    }

    /// The first cell past every
    /// declared symbol.
    pub fn next_address(&self) -> i64 {
        self.next_address
    }

    /// Every symbol, ordered by address.
    pub fn symbols(&self) -> Vec<&Symbol<'a>> {
        let mut symbols: Vec<_> = self.scopes.values().flat_map(|s| s.values()).collect();
        symbols.sort_by_key(|symbol| symbol.address);

        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_contiguous_cells() {
        let mut table = SymbolTable::new();

        let a = table.declare(ScopeId::Main, "a", SymbolKind::Scalar).unwrap();
        let bounds = ArrayBounds::parse("-2", "5").unwrap();
        let t = table
            .declare(ScopeId::Main, "t", SymbolKind::Array(bounds))
            .unwrap();
        let b = table.declare(ScopeId::Main, "b", SymbolKind::Scalar).unwrap();

        assert_eq!(a, FIRST_ADDRESS);
        assert_eq!(t, a + 1);
        assert_eq!(b, t + 8);
        assert_eq!(table.next_address(), b + 1);
    }

    #[test]
    fn array_elements_are_offset_from_lower_bound() {
        let mut table = SymbolTable::new();
        table.declare(ScopeId::Main, "x", SymbolKind::Scalar).unwrap();

        let bounds = ArrayBounds::parse("-5", "5").unwrap();
        let base = table
            .declare(ScopeId::Main, "t", SymbolKind::Array(bounds))
            .unwrap();
        let t = table.lookup(ScopeId::Main, "t").unwrap();

        for i in bounds.from..=bounds.to {
            assert_eq!(t.zero_point() + i, base + (i - bounds.from));
        }
    }

    #[test]
    fn rejects_duplicates_within_a_scope() {
        let mut table = SymbolTable::new();
        table.declare(ScopeId::Main, "x", SymbolKind::Scalar).unwrap();

        assert!(matches!(
            table.declare(ScopeId::Main, "x", SymbolKind::Scalar),
            Err(SymbolError::DuplicateDeclaration { .. })
        ));

        // A procedure is a separate scope.
        table
            .declare(ScopeId::Procedure("p"), "x", SymbolKind::Scalar)
            .unwrap();
    }

    #[test]
    fn procedures_dont_see_main() {
        let mut table = SymbolTable::new();
        table.declare(ScopeId::Main, "x", SymbolKind::Scalar).unwrap();

        assert!(matches!(
            table.lookup(ScopeId::Procedure("p"), "x"),
            Err(SymbolError::UndeclaredIdentifier { .. })
        ));
    }

    #[test]
    fn rejects_bad_bounds() {
        assert!(matches!(
            ArrayBounds::parse("5", "1"),
            Err(SymbolError::InvertedBounds { from: 5, to: 1 })
        ));
        assert!(matches!(
            ArrayBounds::parse("1", "99999999999999999999"),
            Err(SymbolError::InvalidBound { .. })
        ));
        assert_eq!(ArrayBounds::parse("3", "3").unwrap().size(), 1);
    }

    #[test]
    fn procedures_get_a_return_cell() {
        let mut table = SymbolTable::new();

        let cell = table
            .declare_procedure("p", vec![(Cow::Borrowed("t"), true)])
            .unwrap();
        let arg = table
            .declare(
                ScopeId::Procedure("p"),
                "t",
                SymbolKind::Argument { array: true },
            )
            .unwrap();

        assert_eq!(arg, cell + 1);
        assert_eq!(table.procedure("p").unwrap().return_cell, cell);
        assert!(table.declare_procedure("p", vec![]).is_err());
        assert!(table.procedure("q").is_err());
    }
}
