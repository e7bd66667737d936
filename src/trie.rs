//! Prefix trie used to match operators and reserved literals.

use std::collections::HashMap;

use crate::chars;

#[derive(Debug)]
struct Node<T> {
    children: HashMap<char, Node<T>>,
    entry: Option<Entry<T>>,
}

#[derive(Debug)]
struct Entry<T> {
    value: T,
    /// Word-like keys (`contains`, `and`, `true`) must not be followed
    /// by an identifier character.
    needs_boundary: bool,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            entry: None,
        }
    }
}

/// Compiled keyword table. Lookups return the longest key that matches
/// at the start of the input and respects its boundary rule, so `<=`
/// wins over `<` and `contains` does not match inside `containsX`.
#[derive(Debug)]
pub struct Trie<T> {
    root: Node<T>,
}

impl<T: Copy> Trie<T> {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, T)>) -> Self {
        let mut root = Node::default();
        for (key, value) in entries {
            let mut node = &mut root;
            for c in key.chars() {
                node = node.children.entry(c).or_default();
            }
            node.entry = Some(Entry {
                value,
                needs_boundary: key.chars().last().is_some_and(chars::is_word),
            });
        }
        Self { root }
    }

    /// Match at the start of `input`, returning the value and the byte
    /// length consumed.
    pub fn longest_match(&self, input: &str) -> Option<(T, usize)> {
        let mut node = &self.root;
        let mut best = None;
        for (offset, c) in input.char_indices() {
            let Some(next) = node.children.get(&c) else {
                break;
            };
            node = next;
            if let Some(entry) = &node.entry {
                let end = offset + c.len_utf8();
                let bounded = !entry.needs_boundary
                    || input[end..].chars().next().is_none_or(|n| !chars::is_word(n));
                if bounded {
                    best = Some((entry.value, end));
                }
            }
        }
        best
    }
}
