//! Type tags and built-in call signatures.

use rustc_hash::FxHashMap;

/// The closed set of value types.
///
/// `Invalid` is the type of expressions that never produce a storable
/// value, such as string literals outside a print argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Int,
    List,
    Array,
    Lambda,
    Invalid,
}

impl Ty {
    /// Types a variable may be declared with.
    pub fn is_storable(self) -> bool {
        matches!(self, Ty::Int | Ty::List | Ty::Array)
    }

    /// Types that carry the 24-byte `{len, cap, data}` header.
    pub fn is_container(self) -> bool {
        matches!(self, Ty::List | Ty::Array)
    }
}

/// The built-in callable operations.
///
/// These are the only call targets in the language; every other callee
/// name is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `создать.лист.цифр` - new list, capacity defaults to 8
    NewList,
    /// `создать.массив.цифр` - new array, length == capacity == n
    NewArray,
    /// `сколько.внутри` - element count of a list or array
    Len,
    /// `сунь.по.индексу` - store at index, returns the stored value
    PutAt,
    /// `впихни.в.лист` - append, silently dropped at capacity
    Push,
    /// `достань.последний` - remove and return the last element, 0 if empty
    PopLast,
    /// `дай.по.индексу` - load at index
    GetAt,
    /// `диапазон.от.0.до` - list of 0..n
    Range,
}

/// Callee spellings paired with their built-ins.
pub const BUILTINS: [(&str, Builtin); 8] = [
    ("создать.лист.цифр", Builtin::NewList),
    ("создать.массив.цифр", Builtin::NewArray),
    ("сколько.внутри", Builtin::Len),
    ("сунь.по.индексу", Builtin::PutAt),
    ("впихни.в.лист", Builtin::Push),
    ("достань.последний", Builtin::PopLast),
    ("дай.по.индексу", Builtin::GetAt),
    ("диапазон.от.0.до", Builtin::Range),
];

impl Builtin {
    /// Builds the name-to-builtin lookup table.
    pub fn table() -> FxHashMap<&'static str, Builtin> {
        BUILTINS.iter().copied().collect()
    }

    /// Usage string shown when a call has the wrong shape.
    pub fn usage(self) -> &'static str {
        match self {
            Builtin::NewList => "создать.лист.цифр(capacity?)",
            Builtin::NewArray => "создать.массив.цифр(n)",
            Builtin::Len => "сколько.внутри(x)",
            Builtin::PutAt => "сунь.по.индексу(x, i, v)",
            Builtin::Push => "впихни.в.лист(list, value)",
            Builtin::PopLast => "достань.последний(list)",
            Builtin::GetAt => "дай.по.индексу(x, i)",
            Builtin::Range => "диапазон.от.0.до(n)",
        }
    }
}
