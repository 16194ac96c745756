// Object-scope stack shared by the rewriter and the duplicator.
use crate::core::error::{Error, ErrorKind};

/// Identity of one JSON object within a single pass: nesting depth plus the
/// byte offset of its opening brace. Not comparable across documents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ScopeId {
    pub depth: usize,
    pub offset: u64,
}

#[derive(Debug)]
enum Frame<K> {
    Object { id: ScopeId, keys: K },
    Array,
}

/// Stack of open containers. Objects carry a per-scope key record `K`;
/// arrays only hold a slot so the stack height always equals the depth.
#[derive(Debug)]
pub struct ScopeStack<K> {
    frames: Vec<Frame<K>>,
    max_depth: Option<usize>,
}

impl<K: Default> ScopeStack<K> {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn open_object(&mut self, offset: u64) -> Result<ScopeId, Error> {
        self.check_depth(offset)?;
        let id = ScopeId {
            depth: self.frames.len() + 1,
            offset,
        };
        self.frames.push(Frame::Object {
            id,
            keys: K::default(),
        });
        Ok(id)
    }

    pub fn open_array(&mut self, offset: u64) -> Result<(), Error> {
        self.check_depth(offset)?;
        self.frames.push(Frame::Array);
        Ok(())
    }

    /// Pops the innermost container regardless of bracket kind; unmatched
    /// closers on an empty stack are ignored.
    pub fn close(&mut self) -> Option<ScopeId> {
        match self.frames.pop() {
            Some(Frame::Object { id, .. }) => Some(id),
            _ => None,
        }
    }

    pub fn in_object(&self) -> bool {
        matches!(self.frames.last(), Some(Frame::Object { .. }))
    }

    /// Innermost scope when it is an object.
    pub fn current(&mut self) -> Option<(ScopeId, &mut K)> {
        match self.frames.last_mut() {
            Some(Frame::Object { id, keys }) => Some((*id, keys)),
            _ => None,
        }
    }

    fn check_depth(&self, offset: u64) -> Result<(), Error> {
        match self.max_depth {
            Some(limit) if self.frames.len() >= limit => Err(Error::new(ErrorKind::Limit)
                .with_message(format!("JSON nesting exceeds depth limit of {limit}"))
                .with_offset(offset)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ScopeId, ScopeStack};
    use crate::core::error::ErrorKind;
    use std::collections::HashSet;

    #[test]
    fn arrays_keep_depth_without_key_scope() {
        let mut stack: ScopeStack<HashSet<String>> = ScopeStack::new(None);
        let outer = stack.open_object(0).expect("open");
        assert_eq!(outer, ScopeId { depth: 1, offset: 0 });
        stack.open_array(5).expect("open");
        assert!(!stack.in_object());
        assert!(stack.current().is_none());
        let inner = stack.open_object(6).expect("open");
        assert_eq!(inner.depth, 3);
        assert_eq!(stack.close(), Some(inner));
        assert_eq!(stack.close(), None);
        assert_eq!(stack.current().map(|(id, _)| id), Some(outer));
    }

    #[test]
    fn key_sets_are_local_to_each_object() {
        let mut stack: ScopeStack<HashSet<String>> = ScopeStack::new(None);
        stack.open_object(0).expect("open");
        stack.current().expect("scope").1.insert("a".to_string());
        stack.open_object(3).expect("open");
        assert!(stack.current().expect("scope").1.is_empty());
        stack.close();
        assert!(stack.current().expect("scope").1.contains("a"));
    }

    #[test]
    fn close_on_empty_stack_is_ignored() {
        let mut stack: ScopeStack<()> = ScopeStack::new(None);
        assert_eq!(stack.close(), None);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut stack: ScopeStack<()> = ScopeStack::new(Some(2));
        stack.open_object(0).expect("open");
        stack.open_array(1).expect("open");
        let err = stack.open_object(2).expect_err("limit");
        assert_eq!(err.kind(), ErrorKind::Limit);
        assert_eq!(err.offset(), Some(2));
    }
}
