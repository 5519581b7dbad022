use super::value::{BindParam, Statement};

/// Accumulates SQL text and the parallel parameter list. Placeholders are
/// numbered `:p1`, `:p2`, ... in the order parameters are pushed, across the
/// entire statement being built.
pub struct SqlBuilder {
    sql: String,
    params: Vec<BindParam>,
    plain: bool, // render column names without the table qualifier (INSERT/SET lists)
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            plain: false,
        }
    }

    pub fn in_plain_mode(&self) -> bool {
        self.plain
    }

    /// Push a string
    pub fn push_str<T: AsRef<str>>(&mut self, s: T) {
        self.sql.push_str(s.as_ref());
    }

    /// Push a character
    pub fn push(&mut self, c: char) {
        self.sql.push(c);
    }

    /// Push a string surrounded by double quotes. Useful for identifiers.
    pub fn push_identifier<T: AsRef<str>>(&mut self, s: T) {
        self.sql.push('"');
        self.sql.push_str(s.as_ref());
        self.sql.push('"');
    }

    /// Push a parameter: the placeholder `:p<n>` goes into the SQL text and
    /// the parameter joins the list at position `n`.
    pub fn push_param(&mut self, param: BindParam) {
        self.params.push(param);
        self.push_str(format!(":p{}", self.params.len()));
    }

    /// Re-emit the placeholder of the most recently pushed parameter without
    /// adding another parameter. Used by comparisons that reference one bound
    /// value twice (e.g. `col & :p1 = :p1`).
    pub fn push_last_placeholder(&mut self) {
        self.push_str(format!(":p{}", self.params.len()));
    }

    /// Push elements of an iterator, separated by `sep`. The `mapping`
    /// function provides the flexibility to map the elements (compared to
    /// [`SqlBuilder::push_elems`], which assumes the elements implement
    /// [`ExpressionBuilder`](super::ExpressionBuilder)).
    pub fn push_iter<T>(
        &mut self,
        iter: impl ExactSizeIterator<Item = T>,
        sep: &str,
        mapping: impl FnMut(&mut Self, T),
    ) {
        let mut mapping = mapping;
        let len = iter.len();
        for (i, item) in iter.enumerate() {
            mapping(self, item);
            if i < len - 1 {
                self.sql.push_str(sep);
            }
        }
    }

    /// Push elements of a slice, separated by `sep`. The elements must
    /// themselves implement `ExpressionBuilder`.
    pub fn push_elems<T: super::ExpressionBuilder>(&mut self, elems: &[T], sep: &str) {
        self.push_iter(elems.iter(), sep, |builder, elem| {
            elem.build(builder);
        });
    }

    /// Execute the given function with the `plain` flag set to true, so that
    /// column names are rendered without the table qualifier. The closure
    /// form restores the previous flag value afterwards.
    pub fn with_plain<F, R>(&mut self, func: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let cur_plain = self.plain;
        self.plain = true;
        let ret = func(self);
        self.plain = cur_plain;
        ret
    }

    /// The number of parameters pushed so far.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Finish building: the SQL text and the ordered parameter list. This
    /// consumes the builder.
    pub fn into_statement(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

impl Default for SqlBuilder {
    fn default() -> Self {
        Self::new()
    }
}
