use crate::diag::Pos;
use strum::Display;

/// What a name stands for. The payload type carried next to the kind is
/// chosen by the front end; the back end only dispatches on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SymbolKind {
    Const,
    Var,
    Func,
    Type,
    Struct,
    Field,
    Import,
}

/// A named item. The name and owning package are immutable; they are the
/// identity used for indexing in tables.
#[derive(Debug, Clone)]
pub struct Symbol<T> {
    pkg: String,
    name: String,
    pub kind: SymbolKind,
    pub item: T,
    pub pos: Option<Pos>,
}

impl<T> Symbol<T> {
    pub fn new(
        pkg: impl Into<String>,
        name: impl Into<String>,
        kind: SymbolKind,
        item: T,
        pos: Option<Pos>,
    ) -> Self {
        Symbol {
            pkg: pkg.into(),
            name: name.into(),
            kind,
            item,
            pos,
        }
    }

    /// The symbol name. Immutable: tables index by it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the package that declared this symbol. Cloning keeps it, so
    /// re-homed symbols still point at their origin.
    pub fn pkg(&self) -> &str {
        &self.pkg
    }

    /// A clone of the symbol with a substituted payload. Identity
    /// attributes (package, name, kind, position) are preserved; import
    /// tables use this to re-home a symbol into the importing scope.
    pub fn clone_with<U>(&self, item: U) -> Symbol<U> {
        Symbol {
            pkg: self.pkg.clone(),
            name: self.name.clone(),
            kind: self.kind,
            item,
            pos: self.pos.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_with_substitutes_only_the_payload() {
        let pos = Pos::new("lib.g", 4, 1);
        let sym = Symbol::new("lib", "F", SymbolKind::Func, 7u32, Some(pos));
        let cloned = sym.clone_with("payload");

        assert_eq!(cloned.name(), "F");
        assert_eq!(cloned.pkg(), "lib");
        assert_eq!(cloned.kind, SymbolKind::Func);
        assert_eq!(cloned.item, "payload");
        assert_eq!(cloned.pos, sym.pos);
    }

    #[test]
    fn kinds_display_lowercase() {
        assert_eq!(SymbolKind::Struct.to_string(), "struct");
        assert_eq!(SymbolKind::Import.to_string(), "import");
    }
}
