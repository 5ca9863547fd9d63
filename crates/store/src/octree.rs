//! Recursive 8-way subdivision storing one aspect across a cuboid.
//!
//! A node is either a uniform leaf (one value covers the whole sub-volume) or
//! a branch of 8 children. Homogeneous regions collapse to a single node, so
//! an all-air cuboid costs one leaf per aspect.

use blockfield_common::{ByteReader, ByteWriter, CodecError, LocalCoord, CUBOID_EDGE};
use serde::{Deserialize, Serialize};

/// Value codec for one aspect type, used by the cuboid transfer payload.
pub trait AspectCodec: Sized {
    fn encode(&self, w: &mut ByteWriter);
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node<V> {
    Leaf(V),
    Branch(Box<[Node<V>; 8]>),
}

/// Octree over a fixed 32³ domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Octree<V> {
    root: Node<V>,
}

impl<V: Clone + PartialEq> Octree<V> {
    /// A tree where every coordinate holds `value`, as a single leaf.
    pub fn uniform(value: V) -> Self {
        Self {
            root: Node::Leaf(value),
        }
    }

    /// Point lookup in O(log extent).
    pub fn get(&self, at: LocalCoord) -> &V {
        let mut node = &self.root;
        let mut size = CUBOID_EDGE;
        let (mut x, mut y, mut z) = (at.x as u32, at.y as u32, at.z as u32);
        loop {
            match node {
                Node::Leaf(v) => return v,
                Node::Branch(children) => {
                    let half = size / 2;
                    let idx = child_index(x, y, z, half);
                    x %= half;
                    y %= half;
                    z %= half;
                    size = half;
                    node = &children[idx];
                }
            }
        }
    }

    /// Point update in O(log extent). Coalesces equal siblings back into a
    /// uniform leaf, recursively bottom-up as the recursion unwinds.
    pub fn set(&mut self, at: LocalCoord, value: V) {
        set_node(
            &mut self.root,
            CUBOID_EDGE,
            at.x as u32,
            at.y as u32,
            at.z as u32,
            value,
        );
    }

    /// The single value covering the whole domain, if the tree is one leaf.
    pub fn uniform_value(&self) -> Option<&V> {
        match &self.root {
            Node::Leaf(v) => Some(v),
            Node::Branch(_) => None,
        }
    }

    /// Total node count (leaves + branches), a storage-compactness measure.
    pub fn node_count(&self) -> usize {
        count_nodes(&self.root)
    }

    /// Visit every coordinate with its value. Order is x-fastest scanline
    /// order; used for hashing and tests, not hot paths.
    pub fn for_each(&self, mut f: impl FnMut(LocalCoord, &V)) {
        for z in 0..CUBOID_EDGE as u8 {
            for y in 0..CUBOID_EDGE as u8 {
                for x in 0..CUBOID_EDGE as u8 {
                    let at = LocalCoord::new(x, y, z);
                    f(at, self.get(at));
                }
            }
        }
    }
}

impl<V: AspectCodec + Clone + PartialEq> Octree<V> {
    pub fn encode(&self, w: &mut ByteWriter) {
        encode_node(&self.root, w);
    }

    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            root: decode_node(r, 0)?,
        })
    }
}

fn child_index(x: u32, y: u32, z: u32, half: u32) -> usize {
    ((x >= half) as usize) | (((y >= half) as usize) << 1) | (((z >= half) as usize) << 2)
}

fn set_node<V: Clone + PartialEq>(node: &mut Node<V>, size: u32, x: u32, y: u32, z: u32, value: V) {
    match node {
        Node::Leaf(current) => {
            if *current == value {
                return;
            }
            if size == 1 {
                *current = value;
                return;
            }
            // Split the leaf, then descend into the affected child.
            let children: [Node<V>; 8] = std::array::from_fn(|_| Node::Leaf(current.clone()));
            *node = Node::Branch(Box::new(children));
            set_node(node, size, x, y, z, value);
        }
        Node::Branch(children) => {
            let half = size / 2;
            let idx = child_index(x, y, z, half);
            set_node(&mut children[idx], half, x % half, y % half, z % half, value);
            if let Some(v) = uniform_children(children) {
                let v = v.clone();
                *node = Node::Leaf(v);
            }
        }
    }
}

fn uniform_children<V: PartialEq>(children: &[Node<V>; 8]) -> Option<&V> {
    let Node::Leaf(first) = &children[0] else {
        return None;
    };
    for child in &children[1..] {
        match child {
            Node::Leaf(v) if v == first => {}
            _ => return None,
        }
    }
    Some(first)
}

fn count_nodes<V>(node: &Node<V>) -> usize {
    match node {
        Node::Leaf(_) => 1,
        Node::Branch(children) => 1 + children.iter().map(count_nodes).sum::<usize>(),
    }
}

const NODE_LEAF: u8 = 0;
const NODE_BRANCH: u8 = 1;

// 32³ is 5 subdivision levels; anything deeper in a payload is corrupt.
const MAX_DEPTH: u32 = 5;

fn encode_node<V: AspectCodec>(node: &Node<V>, w: &mut ByteWriter) {
    match node {
        Node::Leaf(v) => {
            w.put_u8(NODE_LEAF);
            v.encode(w);
        }
        Node::Branch(children) => {
            w.put_u8(NODE_BRANCH);
            for child in children.iter() {
                encode_node(child, w);
            }
        }
    }
}

fn decode_node<V: AspectCodec>(r: &mut ByteReader<'_>, depth: u32) -> Result<Node<V>, CodecError> {
    match r.get_u8()? {
        NODE_LEAF => Ok(Node::Leaf(V::decode(r)?)),
        NODE_BRANCH => {
            if depth >= MAX_DEPTH {
                return Err(CodecError::Invalid(format!(
                    "octree branch below minimum cell size (depth {depth})"
                )));
            }
            let mut children = Vec::with_capacity(8);
            for _ in 0..8 {
                children.push(decode_node(r, depth + 1)?);
            }
            let children: [Node<V>; 8] = children
                .try_into()
                .map_err(|_| CodecError::Invalid("octree branch arity".into()))?;
            Ok(Node::Branch(Box::new(children)))
        }
        tag => Err(CodecError::UnknownTag {
            kind: "octree node",
            tag,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockfield_common::BlockType;

    #[test]
    fn uniform_tree_is_one_node() {
        let tree = Octree::uniform(BlockType::AIR);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(*tree.get(LocalCoord::new(17, 3, 30)), BlockType::AIR);
    }

    #[test]
    fn set_and_get_single_point() {
        let mut tree = Octree::uniform(BlockType::AIR);
        let at = LocalCoord::new(5, 9, 21);
        tree.set(at, BlockType::STONE);
        assert_eq!(*tree.get(at), BlockType::STONE);
        assert_eq!(*tree.get(LocalCoord::new(5, 9, 22)), BlockType::AIR);
        // 5 levels of branches plus leaves along one path.
        assert!(tree.node_count() > 1);
    }

    #[test]
    fn reverting_a_point_coalesces_back_to_one_leaf() {
        let mut tree = Octree::uniform(BlockType::AIR);
        let at = LocalCoord::new(0, 0, 0);
        tree.set(at, BlockType::STONE);
        assert!(tree.uniform_value().is_none());
        tree.set(at, BlockType::AIR);
        assert_eq!(tree.uniform_value(), Some(&BlockType::AIR));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn filling_a_full_octant_coalesces_recursively() {
        let mut tree = Octree::uniform(BlockType::AIR);
        // Fill the whole 32³ with stone one block at a time; the final write
        // must collapse the entire tree into a single leaf.
        for z in 0..32u8 {
            for y in 0..32u8 {
                for x in 0..32u8 {
                    tree.set(LocalCoord::new(x, y, z), BlockType::STONE);
                }
            }
        }
        assert_eq!(tree.uniform_value(), Some(&BlockType::STONE));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn redundant_set_is_a_no_op() {
        let mut tree = Octree::uniform(BlockType::AIR);
        tree.set(LocalCoord::new(1, 1, 1), BlockType::AIR);
        assert_eq!(tree.node_count(), 1);
    }
}
