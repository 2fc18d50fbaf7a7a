//! Ordered n-ary tree container
//!
//! Pure structure: a node exclusively owns its ordered children and keeps no
//! reference to its parent. Validation lives in the flow layer.

/// Ordered list of owned children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode<T> {
    children: Vec<T>,
}

impl<T> Default for TreeNode<T> {
    fn default() -> Self {
        Self {
            children: Vec::new(),
        }
    }
}

impl<T> TreeNode<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_children(children: Vec<T>) -> Self {
        Self { children }
    }

    /// Replace the children wholesale
    pub fn set_children(&mut self, children: Vec<T>) {
        self.children = children;
    }

    /// Append one child
    pub fn add_child(&mut self, child: T) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[T] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.children.iter()
    }
}
