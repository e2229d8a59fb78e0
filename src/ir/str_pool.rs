use super::refs::StrId;
use crate::link;
use indexmap::IndexMap;

/// One interned string constant. The link name is assigned when the pool
/// is declared into a link package.
#[derive(Debug, Clone)]
pub struct StrConst {
    id: StrId,
    lit: String,
    name: String,
}

impl StrConst {
    pub fn id(&self) -> StrId {
        self.id
    }

    pub fn lit(&self) -> &str {
        &self.lit
    }

    /// The assigned `:str_NNN` link name. Empty until the pool is
    /// declared.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A package's deduplicating string pool.
#[derive(Debug, Clone)]
pub struct StrPool {
    pkg: String,
    strs: Vec<StrConst>,
    index: IndexMap<String, StrId>,
}

fn count_digit(mut n: usize) -> usize {
    let mut ret = 1;
    while n > 9 {
        n /= 10;
        ret += 1;
    }
    ret
}

impl StrPool {
    pub(crate) fn new(pkg: impl Into<String>) -> Self {
        StrPool {
            pkg: pkg.into(),
            strs: Vec::new(),
            index: IndexMap::new(),
        }
    }

    /// Interns a literal, returning the existing handle on a repeat.
    pub fn add(&mut self, lit: &str) -> StrId {
        if let Some(id) = self.index.get(lit) {
            return *id;
        }

        let id = StrId(self.strs.len() as u32);
        self.strs.push(StrConst {
            id,
            lit: lit.to_string(),
            name: String::new(),
        });
        self.index.insert(lit.to_string(), id);
        id
    }

    pub fn get(&self, id: StrId) -> &StrConst {
        &self.strs[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strs.is_empty()
    }

    /// Assigns padded names and declares every constant as a byte var in
    /// the link package. The padding width is the digit count of the pool
    /// size, so names sort in id order.
    pub(crate) fn declare(&mut self, lib: &mut link::Pkg) {
        assert_eq!(lib.path(), self.pkg, "package name mismatch");

        let ndigit = count_digit(self.strs.len());
        for (i, s) in self.strs.iter_mut().enumerate() {
            s.name = format!(":str_{i:0ndigit$}");

            let mut v = link::Var::new(0);
            v.write(s.lit.as_bytes());
            lib.declare_var(&s.name);
            lib.define_var(&s.name, v);
        }
    }
}
