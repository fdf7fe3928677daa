use std::collections::HashSet;

/// Set of method names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSet {
    methods: HashSet<String>,
}

impl MethodSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        method: impl Into<String>,
    ) -> bool {
        self.methods.insert(method.into())
    }

    pub fn contains(
        &self,
        method: &str,
    ) -> bool {
        self.methods.contains(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Members of `self` that are not in `other`
    pub fn diff(
        &self,
        other: &MethodSet,
    ) -> Vec<String> {
        self.methods
            .iter()
            .filter(|method| !other.methods.contains(*method))
            .cloned()
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for MethodSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            methods: iter.into_iter().map(Into::into).collect(),
        }
    }
}
