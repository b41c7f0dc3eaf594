//! A binary trie keyed on address bits.
//!
//! Only exact-length insertion and lookup are supported. Nodes live in an
//! arena owned by the trie and refer to their children by index; every
//! walk starts at the root, so no parent links are kept.
use std::slice;
use crate::ip::{AddressFamily, IpPrefix};


//------------ NodeId --------------------------------------------------------

/// Handle to a node in one particular `PrefixTrie`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NodeId(usize);


//------------ Node ----------------------------------------------------------

#[derive(Clone, Debug)]
struct Node<T> {
    children: [Option<usize>; 2],
    /// Set once a prefix ending at this node has been inserted.
    terminal: bool,
    entries: Vec<T>
}

impl<T> Node<T> {
    fn empty() -> Self {
        Node { children: [None, None], terminal: false, entries: Vec::new() }
    }
}


//------------ Insertion -----------------------------------------------------

/// The result of `PrefixTrie::insert_exact`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Insertion {
    pub node: NodeId,
    /// Whether the exact prefix had been inserted before.
    pub existed: bool
}


//------------ PrefixTrie ----------------------------------------------------

#[derive(Clone, Debug)]
pub struct PrefixTrie<T> {
    family: AddressFamily,
    nodes: Vec<Node<T>>
}

impl<T> PrefixTrie<T> {
    pub fn new(family: AddressFamily) -> Self {
        PrefixTrie { family, nodes: vec![Node::empty()] }
    }

    pub fn family(&self) -> AddressFamily { self.family }

    /// Number of nodes, intermediate ones included.
    pub fn node_count(&self) -> usize { self.nodes.len() }

    /// Walks the path for `prefix` from the root, creating missing nodes,
    /// and returns the node at exactly `prefix.length()` bits.
    pub fn insert_exact(
        &mut self,
        prefix: &IpPrefix
    ) -> Result<Insertion, Error> {
        if prefix.family() != self.family {
            return Err(Error::WrongFamily(*prefix, self.family))
        }

        let mut current = 0;
        for pos in 0..prefix.length() {
            let bit = prefix.bit(pos);
            current = match self.nodes[current].children[bit] {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::empty());
                    self.nodes[current].children[bit] = Some(child);
                    child
                }
            };
        }

        let node = &mut self.nodes[current];
        let existed = node.terminal;
        node.terminal = true;
        Ok(Insertion { node: NodeId(current), existed })
    }

    /// Appends an entry to the node's list.
    pub fn attach(&mut self, node: NodeId, entry: T) {
        self.nodes[node.0].entries.push(entry);
    }

    /// Returns the entries attached to exactly this prefix, if it was
    /// ever inserted.
    pub fn get_exact(&self, prefix: &IpPrefix) -> Option<&[T]> {
        if prefix.family() != self.family {
            return None
        }
        let mut current = 0;
        for pos in 0..prefix.length() {
            current = self.nodes[current].children[prefix.bit(pos)]?;
        }
        let node = &self.nodes[current];
        if node.terminal {
            Some(&node.entries)
        } else {
            None
        }
    }

    /// Iterates over all nodes with attached entries in ascending prefix
    /// order.
    pub fn iter(&self) -> Iter<T> {
        Iter { trie: self, stack: vec![(0, 0, 0)] }
    }
}

impl<'a, T> IntoIterator for &'a PrefixTrie<T> {
    type Item = (IpPrefix, &'a [T]);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter { self.iter() }
}


//------------ Iter ----------------------------------------------------------

/// Pre-order walk visiting the 0-branch before the 1-branch.
pub struct Iter<'a, T> {
    trie: &'a PrefixTrie<T>,
    /// Pending nodes as (index, network, depth).
    stack: Vec<(usize, u128, u8)>
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (IpPrefix, &'a [T]);

    fn next(&mut self) -> Option<Self::Item> {
        let width = self.trie.family.bits();

        while let Some((index, network, depth)) = self.stack.pop() {
            let node = &self.trie.nodes[index];

            // Push the 1-branch first so the 0-branch is popped first.
            for bit in [1u128, 0].iter() {
                if let Some(child) = node.children[*bit as usize] {
                    let child_network = network | (*bit << (width - 1 - depth));
                    self.stack.push((child, child_network, depth + 1));
                }
            }

            if !node.entries.is_empty() {
                // The walk only follows paths of inserted prefixes.
                if let Ok(prefix) = IpPrefix::new(self.trie.family, network, depth) {
                    return Some((prefix, &node.entries))
                }
            }
        }
        None
    }
}

/// Flattened entries of a trie, one item per attached entry.
pub struct Entries<'a, T> {
    nodes: Iter<'a, T>,
    current: Option<(IpPrefix, slice::Iter<'a, T>)>
}

impl<'a, T> Entries<'a, T> {
    pub fn new(trie: &'a PrefixTrie<T>) -> Self {
        Entries { nodes: trie.iter(), current: None }
    }
}

impl<'a, T> Iterator for Entries<'a, T> {
    type Item = (IpPrefix, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((prefix, entries)) = self.current.as_mut() {
                if let Some(entry) = entries.next() {
                    return Some((*prefix, entry))
                }
            }
            let (prefix, entries) = self.nodes.next()?;
            self.current = Some((prefix, entries.iter()));
        }
    }
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "cannot insert {} into {} trie", _0, _1)]
    WrongFamily(IpPrefix, AddressFamily),
}


//------------ Tests --------------------------------------------------------
