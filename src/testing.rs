//! Test-function discovery: an external runner links each eligible
//! `TestXxx` function as its own program, with that function as the
//! start symbol.

use crate::sym::{Symbol, SymbolKind, Table};

/// Whether a name is a test entry point: `Test` followed by an uppercase
/// letter, digit or underscore, then word characters only.
pub fn is_test_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("Test") else {
        return false;
    };
    let mut chars = rest.chars();
    let Some(lead) = chars.next() else {
        return false;
    };
    if !(lead.is_ascii_uppercase() || lead.is_ascii_digit() || lead == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Lists the test functions in a top-level symbol table: function
/// symbols with a test name whose signature the caller confirms to be
/// `() → ()`.
pub fn list_tests<'a, T>(
    table: &'a Table<T>,
    mut is_unit_sig: impl FnMut(&Symbol<T>) -> bool,
) -> Vec<&'a Symbol<T>> {
    table
        .list()
        .filter(|s| s.kind == SymbolKind::Func)
        .filter(|s| is_unit_sig(s))
        .filter(|s| is_test_name(s.name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_need_an_uppercase_lead() {
        assert!(is_test_name("TestLink"));
        assert!(is_test_name("Test0"));
        assert!(is_test_name("Test_private"));
        assert!(is_test_name("TestA_b9"));

        assert!(!is_test_name("Test"));
        assert!(!is_test_name("Testlower"));
        assert!(!is_test_name("testLink"));
        assert!(!is_test_name("TestÜber"));
        assert!(!is_test_name("TestA-b"));
    }

    #[test]
    fn listing_filters_kind_name_and_signature() {
        let mut table: Table<bool> = Table::new();
        // the payload marks whether the signature is () → ()
        let sym = |name: &str, kind, unit| {
            Symbol::new("p", name, kind, unit, None)
        };
        table.declare(sym("TestOne", SymbolKind::Func, true));
        table.declare(sym("TestTwo", SymbolKind::Func, false));
        table.declare(sym("TestThree", SymbolKind::Var, true));
        table.declare(sym("helper", SymbolKind::Func, true));

        let tests = list_tests(&table, |s| s.item);
        let names: Vec<_> = tests.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["TestOne"]);
    }
}
