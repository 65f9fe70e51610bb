use crate::{ImplementationError, Type, TypeSet};

impl TypeSet {
    /// Validate a format's closed set of types.
    ///
    /// Types sharing an identifier must agree on precedence; the duplicate entry is
    /// dropped so that every identifier appears once.
    pub fn new(types: Vec<Type>) -> Result<Self, ImplementationError> {
        let mut members: Vec<Type> = Vec::with_capacity(types.len());
        for t in types {
            match members.binary_search_by_key(&t.id(), |m| m.id()) {
                Ok(index) => {
                    if members[index].precedence() != t.precedence() {
                        return Err(ImplementationError::new(
                            "TypeSet".into(),
                            format!(
                                "Type '{}' is declared twice with precedences {} and {}.",
                                t.id(),
                                members[index].precedence(),
                                t.precedence()
                            ),
                        ));
                    }
                }
                Err(index) => members.insert(index, t),
            }
        }
        Ok(Self { members })
    }

    pub fn contains(&self, kind: Type) -> bool {
        self.members
            .binary_search_by_key(&kind.id(), |m| m.id())
            .map_or(false, |i| self.members[i] == kind)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
