//! Arena-backed expression tree used as the genotype.
//!
//! Nodes live in one flat vector per tree and refer to their children by
//! index. Variation operators never edit a tree in place: they rebuild a
//! fresh arena by walking the parent, so the arena always holds exactly the
//! reachable nodes, in preorder, with the root at index 0.

use crate::config::TreeConfig;
use crate::error::{GpError, Result};
use crate::types::{GrowthMode, NodeValue, Operator};
use log::warn;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type NodeId = usize;

/// Rejection-sampling attempts before depth-limited crossover falls back to
/// drawing from the valid donors only
const MAX_DONOR_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub value: NodeValue,
    pub depth: usize,
    /// Longest path to a leaf below this node, 0 for terminals
    pub height: usize,
    children: Option<[NodeId; 2]>,
}

impl Node {
    fn new(value: NodeValue, depth: usize) -> Self {
        Self {
            value,
            depth,
            height: 0,
            children: None,
        }
    }

    pub fn children(&self) -> Option<[NodeId; 2]> {
        self.children
    }

    pub fn is_terminal(&self) -> bool {
        self.children.is_none()
    }
}

/// Terminal alphabet a tree samples its leaves from
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSet {
    sensors: Vec<String>,
    constant_range: Option<(f64, f64)>,
}

impl PrimitiveSet {
    pub fn new(sensors: Vec<String>, constant_range: Option<(f64, f64)>) -> Self {
        Self {
            sensors,
            constant_range,
        }
    }

    pub fn from_config(config: &TreeConfig) -> Self {
        Self::new(config.sensors.clone(), config.constant_range)
    }

    pub fn sensors(&self) -> &[String] {
        &self.sensors
    }

    /// Uniform over sensors plus one slot for a constant, which then draws its value.
    pub fn sample_terminal<R: Rng>(&self, rng: &mut R) -> NodeValue {
        let slots = self.sensors.len() + usize::from(self.constant_range.is_some());
        let slot = rng.gen_range(0..slots.max(1));
        match (self.sensors.get(slot), self.constant_range) {
            (Some(name), _) => NodeValue::Sensor(name.clone()),
            (None, Some((low, high))) if low < high => NodeValue::Constant(rng.gen_range(low..high)),
            (None, Some((low, _))) => NodeValue::Constant(low),
            (None, None) => NodeValue::Constant(0.0),
        }
    }

    pub fn sample_operator<R: Rng>(&self, rng: &mut R) -> NodeValue {
        let op = Operator::ALL[rng.gen_range(0..Operator::ALL.len())];
        NodeValue::Operator(op)
    }

    /// Pick a value for a node created at `depth`.
    ///
    /// Terminals only once the depth limit is reached. Above it the root and
    /// `Full` trees always take an operator, `Grow` trees flip a coin.
    pub fn sample_value<R: Rng>(
        &self,
        depth: usize,
        max_depth: usize,
        mode: GrowthMode,
        rng: &mut R,
    ) -> NodeValue {
        if depth >= max_depth {
            return self.sample_terminal(rng);
        }
        if mode == GrowthMode::Full || depth == 0 || rng.gen_bool(0.5) {
            self.sample_operator(rng)
        } else {
            self.sample_terminal(rng)
        }
    }
}

/// Sensor readings a tree is evaluated against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorBindings {
    values: HashMap<String, f64>,
}

impl SensorBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for SensorBindings {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TreeArena")]
pub struct Tree {
    nodes: Vec<Node>,
    max_depth: usize,
    mode: GrowthMode,
}

/// Serialized shape of a tree, checked before it becomes a `Tree`
#[derive(Deserialize)]
struct TreeArena {
    nodes: Vec<Node>,
    max_depth: usize,
    mode: GrowthMode,
}

impl TryFrom<TreeArena> for Tree {
    type Error = GpError;

    fn try_from(arena: TreeArena) -> Result<Self> {
        let tree = Tree {
            nodes: arena.nodes,
            max_depth: arena.max_depth,
            mode: arena.mode,
        };
        tree.check_arena()?;
        Ok(tree)
    }
}

impl Tree {
    pub const ROOT: NodeId = 0;

    fn empty(max_depth: usize, mode: GrowthMode) -> Self {
        Self {
            nodes: Vec::new(),
            max_depth,
            mode,
        }
    }

    /// Single-node tree holding a terminal value.
    pub fn leaf(value: NodeValue, max_depth: usize) -> Result<Self> {
        if value.is_operator() {
            return Err(GpError::Genotype(format!(
                "Operator {} cannot be a leaf",
                value
            )));
        }
        let mut tree = Self::empty(max_depth, GrowthMode::Grow);
        tree.push(value, 0);
        Ok(tree)
    }

    /// Build a random tree: sample the root value, then grow it.
    pub fn random<R: Rng>(
        primitives: &PrimitiveSet,
        max_depth: usize,
        mode: GrowthMode,
        rng: &mut R,
    ) -> Result<Self> {
        let mut tree = Self::empty(max_depth, mode);
        let value = primitives.sample_value(0, max_depth, mode, rng);
        let root = tree.push(value, 0);
        tree.grow(root, primitives, rng)?;
        Ok(tree)
    }

    fn push(&mut self, value: NodeValue, depth: usize) -> NodeId {
        self.nodes.push(Node::new(value, depth));
        self.nodes.len() - 1
    }

    fn attach(&mut self, parent: NodeId, children: [NodeId; 2]) {
        let height = children.iter().map(|&c| self.nodes[c].height).max().unwrap_or(0) + 1;
        let node = &mut self.nodes[parent];
        node.children = Some(children);
        node.height = height;
    }

    /// Give an operator node its two children, growing them recursively.
    ///
    /// Terminals are left alone. Growing a node that already has children is
    /// a contract violation.
    pub fn grow<R: Rng>(
        &mut self,
        id: NodeId,
        primitives: &PrimitiveSet,
        rng: &mut R,
    ) -> Result<()> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GpError::Genotype(format!("Node {} does not exist", id)))?;
        if node.children.is_some() {
            return Err(GpError::Genotype(format!(
                "Grow called twice on node {}",
                id
            )));
        }
        if !node.value.is_operator() {
            return Ok(());
        }

        let depth = node.depth + 1;
        let mut children = [0; 2];
        for slot in children.iter_mut() {
            let value = primitives.sample_value(depth, self.max_depth, self.mode, rng);
            let child = self.push(value, depth);
            self.grow(child, primitives, rng)?;
            *slot = child;
        }
        self.attach(id, children);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root(&self) -> &Node {
        &self.nodes[Self::ROOT]
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn mode(&self) -> GrowthMode {
        self.mode
    }

    pub fn height(&self) -> usize {
        self.root().height
    }

    /// Total node count. The arena holds only reachable nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Evaluate the tree against sensor readings.
    pub fn evaluate<R: Rng>(&self, bindings: &SensorBindings, rng: &mut R) -> Result<f64> {
        self.evaluate_node(Self::ROOT, bindings, rng)
    }

    fn evaluate_node<R: Rng>(
        &self,
        id: NodeId,
        bindings: &SensorBindings,
        rng: &mut R,
    ) -> Result<f64> {
        let node = &self.nodes[id];
        match (&node.value, node.children) {
            (NodeValue::Operator(op), Some([left, right])) => {
                let a = self.evaluate_node(left, bindings, rng)?;
                let b = self.evaluate_node(right, bindings, rng)?;
                Ok(op.apply(a, b, rng))
            }
            (NodeValue::Sensor(name), None) => bindings
                .get(name)
                .ok_or_else(|| GpError::UnboundSensor(name.clone())),
            (NodeValue::Constant(value), None) => Ok(*value),
            (value, _) => Err(GpError::Genotype(format!(
                "Node {} ({}) breaks the terminal/operator invariant",
                id, value
            ))),
        }
    }

    /// Node ids grouped by depth, one level per depth from the root down.
    pub fn flatten_by_depth(&self) -> Vec<Vec<NodeId>> {
        let mut levels: Vec<Vec<NodeId>> = vec![Vec::new(); self.height() + 1];
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            levels[node.depth].push(id);
            if let Some([left, right]) = node.children {
                stack.push(right);
                stack.push(left);
            }
        }
        levels
    }

    /// Pick a level uniformly, then a node within it.
    ///
    /// Shallow levels carry more weight than under a uniform draw over all
    /// nodes; variation relies on exactly this distribution.
    pub fn pick_node<R: Rng>(&self, rng: &mut R) -> NodeId {
        let levels = self.flatten_by_depth();
        levels
            .choose(rng)
            .and_then(|level| level.choose(rng))
            .copied()
            .unwrap_or(Self::ROOT)
    }

    /// Offspring where a random subtree is discarded, resampled and regrown.
    pub fn mutate<R: Rng>(&self, primitives: &PrimitiveSet, rng: &mut R) -> Result<Tree> {
        let target = self.pick_node(rng);
        let (max_depth, mode) = (self.max_depth, self.mode);
        let mut out = Self::empty(max_depth, mode);
        self.rebuild(&mut out, Self::ROOT, 0, target, &mut |out: &mut Tree, depth: usize| {
            let value = primitives.sample_value(depth, max_depth, mode, rng);
            let id = out.push(value, depth);
            out.grow(id, primitives, rng)?;
            Ok(id)
        })?;
        Ok(out)
    }

    /// Offspring of `self` with one random subtree replaced by a random subtree
    /// of `donor`. Donor picks whose height would push the graft past
    /// `max_depth` are rejected and redrawn.
    pub fn crossover<R: Rng>(&self, donor: &Tree, rng: &mut R) -> Result<Tree> {
        let target = self.pick_node(rng);
        let room = self.max_depth.saturating_sub(self.nodes[target].depth);

        let mut graft = None;
        for _ in 0..MAX_DONOR_ATTEMPTS {
            let candidate = donor.pick_node(rng);
            if donor.nodes[candidate].height <= room {
                graft = Some(candidate);
                break;
            }
        }
        let graft = match graft {
            Some(id) => id,
            None => {
                warn!("Crossover rejection sampling exhausted, drawing from valid donors only");
                let levels: Vec<Vec<NodeId>> = donor
                    .flatten_by_depth()
                    .into_iter()
                    .map(|level| {
                        level
                            .into_iter()
                            .filter(|&id| donor.nodes[id].height <= room)
                            .collect::<Vec<_>>()
                    })
                    .filter(|level| !level.is_empty())
                    .collect();
                levels
                    .choose(rng)
                    .and_then(|level| level.choose(rng))
                    .copied()
                    .ok_or_else(|| GpError::Genotype("Donor tree has no nodes".to_string()))?
            }
        };
        self.graft(donor, target, graft)
    }

    /// Subtree crossover without the depth check; the result may exceed `max_depth`.
    pub fn crossover_unbounded<R: Rng>(&self, donor: &Tree, rng: &mut R) -> Result<Tree> {
        let target = self.pick_node(rng);
        let graft = donor.pick_node(rng);
        self.graft(donor, target, graft)
    }

    fn graft(&self, donor: &Tree, target: NodeId, source: NodeId) -> Result<Tree> {
        let mut out = Self::empty(self.max_depth, self.mode);
        self.rebuild(&mut out, Self::ROOT, 0, target, &mut |out: &mut Tree, depth: usize| {
            Ok(donor.copy_subtree(out, source, depth))
        })?;
        Ok(out)
    }

    fn copy_subtree(&self, out: &mut Tree, src: NodeId, depth: usize) -> NodeId {
        let node = &self.nodes[src];
        let id = out.push(node.value.clone(), depth);
        if let Some([left, right]) = node.children {
            let left = self.copy_subtree(out, left, depth + 1);
            let right = self.copy_subtree(out, right, depth + 1);
            out.attach(id, [left, right]);
        }
        id
    }

    /// Copy `src` into `out`, handing the subtree at `target` to `replace` instead.
    fn rebuild<F>(
        &self,
        out: &mut Tree,
        src: NodeId,
        depth: usize,
        target: NodeId,
        replace: &mut F,
    ) -> Result<NodeId>
    where
        F: FnMut(&mut Tree, usize) -> Result<NodeId>,
    {
        if src == target {
            return replace(out, depth);
        }
        let node = &self.nodes[src];
        let id = out.push(node.value.clone(), depth);
        if let Some([left, right]) = node.children {
            let left = self.rebuild(out, left, depth + 1, target, replace)?;
            let right = self.rebuild(out, right, depth + 1, target, replace)?;
            out.attach(id, [left, right]);
        }
        Ok(id)
    }

    /// Verify the arena layout: root at index 0 with depth 0, every node
    /// reachable in preorder, operators with two children and terminals
    /// with none, depths and heights consistent with the links.
    pub fn check_arena(&self) -> Result<()> {
        let root = self
            .nodes
            .first()
            .ok_or_else(|| GpError::Genotype("Tree has no nodes".to_string()))?;
        if root.depth != 0 {
            return Err(GpError::Genotype(format!("Root has depth {}", root.depth)));
        }
        let mut next = Self::ROOT + 1;
        self.check_subtree(Self::ROOT, &mut next)?;
        if next != self.nodes.len() {
            return Err(GpError::Genotype(format!(
                "{} nodes are not reachable from the root",
                self.nodes.len() - next
            )));
        }
        Ok(())
    }

    /// Returns the checked height of `id`, which the caller has bounds-checked.
    fn check_subtree(&self, id: NodeId, next: &mut NodeId) -> Result<usize> {
        let node = &self.nodes[id];
        let height = match (node.children, node.value.is_operator()) {
            (None, false) => 0,
            (Some(children), true) => {
                let mut height = 0;
                for child in children {
                    if child != *next || child >= self.nodes.len() {
                        return Err(GpError::Genotype(format!(
                            "Node {} links to {}, expected node {}",
                            id, child, next
                        )));
                    }
                    *next += 1;
                    if self.nodes[child].depth != node.depth + 1 {
                        return Err(GpError::Genotype(format!(
                            "Node {} has depth {}, expected {}",
                            child,
                            self.nodes[child].depth,
                            node.depth + 1
                        )));
                    }
                    height = height.max(self.check_subtree(child, next)? + 1);
                }
                height
            }
            (Some(_), false) => {
                return Err(GpError::Genotype(format!("Terminal {} has children", id)));
            }
            (None, true) => {
                return Err(GpError::Genotype(format!("Operator {} has no children", id)));
            }
        };
        if node.height != height {
            return Err(GpError::Genotype(format!(
                "Node {} records height {}, actual {}",
                id, node.height, height
            )));
        }
        Ok(height)
    }

    /// Depth-indented text form, one node per line as `'|' * depth + value`.
    pub fn to_indented_string(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            out.push_str(&"|".repeat(node.depth));
            out.push_str(&node.value.to_string());
            out.push('\n');
        }
        out
    }

    /// Rebuild a tree from its depth-indented text form.
    pub fn from_indented(text: &str, max_depth: usize) -> Result<Tree> {
        let lines: Vec<(usize, NodeValue)> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let body = line.trim_start_matches('|');
                (line.len() - body.len(), NodeValue::parse(body.trim()))
            })
            .collect();
        if lines.is_empty() {
            return Err(GpError::Genotype("Empty tree text".to_string()));
        }

        let mut tree = Self::empty(max_depth, GrowthMode::Grow);
        let mut cursor = 0;
        tree.parse_node(&lines, &mut cursor, 0)?;
        if cursor != lines.len() {
            return Err(GpError::Genotype(format!(
                "Unexpected node at line {}",
                cursor + 1
            )));
        }
        Ok(tree)
    }

    fn parse_node(
        &mut self,
        lines: &[(usize, NodeValue)],
        cursor: &mut usize,
        depth: usize,
    ) -> Result<NodeId> {
        let (line_depth, value) = lines.get(*cursor).ok_or_else(|| {
            GpError::Genotype(format!("Missing child at depth {}", depth))
        })?;
        if *line_depth != depth {
            return Err(GpError::Genotype(format!(
                "Line {} has depth {}, expected {}",
                *cursor + 1,
                line_depth,
                depth
            )));
        }
        *cursor += 1;
        let id = self.push(value.clone(), depth);
        if value.is_operator() {
            let left = self.parse_node(lines, cursor, depth + 1)?;
            let right = self.parse_node(lines, cursor, depth + 1)?;
            self.attach(id, [left, right]);
        }
        Ok(id)
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_indented_string())
    }
}

/// Depth of every line of an indented tree, read from its leading `'|'` count.
pub fn indentation_depths(text: &str) -> Vec<usize> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|&c| c == '|').count())
        .collect()
}
