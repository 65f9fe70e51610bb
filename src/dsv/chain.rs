use super::{Chain, DsvSyntax, Fragment, FragmentKind};

impl Chain {
    pub fn new() -> Self {
        Self {
            fragments: Vec::new(),
            head: None,
            tail: None,
        }
    }

    /// Append a fragment at the end of the chain.
    pub fn push(&mut self, text: String, kind: FragmentKind) {
        let index = self.fragments.len();
        self.fragments.push(Fragment {
            text,
            kind,
            next: None,
        });
        match self.tail {
            Some(tail) => self.fragments[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
    }

    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            chain: self,
            cursor: self.head,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether any fragment came from a quoted section.
    pub fn quoted(&self) -> bool {
        self.iter().any(|f| f.kind == FragmentKind::FieldStart)
    }

    /// The verbatim source of the chain, quotes and escape operators included.
    pub fn raw(&self) -> String {
        let mut out = String::new();
        for fragment in self.iter() {
            out.push_str(&fragment.text);
        }
        out
    }

    /// The chain concatenated with escape resolution; quote marks vanish.
    pub fn text(&self, syntax: &DsvSyntax) -> String {
        let mut out = String::new();
        for fragment in self.iter() {
            match fragment.kind {
                FragmentKind::Plain | FragmentKind::Raw => out.push_str(&fragment.text),
                FragmentKind::Escaped => out.push_str(&syntax.resolve_escape(&fragment.text)),
                FragmentKind::FieldStart | FragmentKind::FieldEnd => {}
            }
        }
        out
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChainIter<'c> {
    chain: &'c Chain,
    cursor: Option<usize>,
}

impl<'c> Iterator for ChainIter<'c> {
    type Item = &'c Fragment;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let fragment = &self.chain.fragments[index];
        self.cursor = fragment.next;
        Some(fragment)
    }
}
