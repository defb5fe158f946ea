//! Operation tree for one arithmetic expression.
//!
//! The tree lives in a petgraph arena: nodes are addressed by `NodeIndex`
//! and edges point from an operation to its two operands, tagged with the
//! side they sit on. Traversals use an explicit stack, so tree depth is not
//! bounded by the call stack.

use crate::core::operator::Operator;
use crate::error::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// Which operand of the parent an edge leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Left,
    Right,
}

/// One node of the operation tree.
///
/// A node is either a leaf (resolved, holding a literal or a fed-back
/// result) or an operation awaiting its task result. Resolution happens
/// once and is never undone.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    operator: Option<Operator>,
    value: Option<f64>,
    task_in_flight: bool,
}

impl AstNode {
    fn literal(value: f64) -> Self {
        Self {
            operator: None,
            value: Some(value),
            task_in_flight: false,
        }
    }

    fn operation(operator: Operator) -> Self {
        Self {
            operator: Some(operator),
            value: None,
            task_in_flight: false,
        }
    }

    /// Operator of an operation node; `None` for literals.
    pub fn operator(&self) -> Option<Operator> {
        self.operator
    }

    /// Value of a resolved node.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    /// Whether a task has already been generated for this node.
    pub fn task_in_flight(&self) -> bool {
        self.task_in_flight
    }
}

/// Incrementally assembles an [`Ast`] bottom-up.
#[derive(Debug, Default)]
pub struct AstBuilder {
    graph: DiGraph<AstNode, Branch>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn literal(&mut self, value: f64) -> NodeIndex {
        self.graph.add_node(AstNode::literal(value))
    }

    pub fn operation(&mut self, operator: Operator, left: NodeIndex, right: NodeIndex) -> NodeIndex {
        let index = self.graph.add_node(AstNode::operation(operator));
        self.graph.add_edge(index, left, Branch::Left);
        self.graph.add_edge(index, right, Branch::Right);
        index
    }

    pub fn finish(self, root: NodeIndex) -> Ast {
        Ast {
            graph: self.graph,
            root,
        }
    }
}

/// The operation tree of one expression, exclusively owned by it.
#[derive(Clone)]
pub struct Ast {
    graph: DiGraph<AstNode, Branch>,
    root: NodeIndex,
}

impl Ast {
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node(&self, index: NodeIndex) -> Option<&AstNode> {
        self.graph.node_weight(index)
    }

    /// `(left, right)` operands of an operation node.
    pub fn children(&self, index: NodeIndex) -> Option<(NodeIndex, NodeIndex)> {
        let mut left = None;
        let mut right = None;
        for edge in self.graph.edges_directed(index, Direction::Outgoing) {
            match edge.weight() {
                Branch::Left => left = Some(edge.target()),
                Branch::Right => right = Some(edge.target()),
            }
        }
        Some((left?, right?))
    }

    /// Whether the whole expression has been computed.
    pub fn is_resolved(&self) -> bool {
        self.value().is_some()
    }

    /// Final value, once the root is resolved.
    pub fn value(&self) -> Option<f64> {
        self.node(self.root).and_then(AstNode::value)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of operation nodes, i.e. tasks the expression needs over its lifetime.
    pub fn operation_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|node| node.operator.is_some())
            .count()
    }

    /// Unresolved operation nodes whose operands are both resolved.
    ///
    /// Nodes come back in post-order, left subtree before right. Resolved
    /// subtrees are not descended into.
    pub fn ready_nodes(&self) -> Vec<NodeIndex> {
        let mut ready = Vec::new();
        let mut stack = vec![(self.root, false)];

        while let Some((index, expanded)) = stack.pop() {
            let Some(node) = self.node(index) else {
                continue;
            };
            if node.is_resolved() {
                continue;
            }
            let Some((left, right)) = self.children(index) else {
                continue;
            };

            if expanded {
                if self.is_resolved_at(left) && self.is_resolved_at(right) {
                    ready.push(index);
                }
            } else {
                stack.push((index, true));
                stack.push((right, false));
                stack.push((left, false));
            }
        }

        ready
    }

    /// Operand values of a ready node.
    pub fn operands(&self, index: NodeIndex) -> Option<(f64, f64)> {
        let (left, right) = self.children(index)?;
        Some((self.node(left)?.value?, self.node(right)?.value?))
    }

    /// Record that a task exists for `index`.
    ///
    /// Returns `false` if a task was already generated; the flag is sticky.
    pub fn claim(&mut self, index: NodeIndex) -> bool {
        match self.graph.node_weight_mut(index) {
            Some(node) if !node.task_in_flight && !node.is_resolved() => {
                node.task_in_flight = true;
                true
            }
            _ => false,
        }
    }

    /// Turn an operation node into a resolved leaf holding `value`.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or is already resolved.
    pub fn resolve(&mut self, index: NodeIndex, value: f64) -> Result<()> {
        let node = self
            .graph
            .node_weight_mut(index)
            .ok_or_else(|| Error::Validation(format!("node {} not in tree", index.index())))?;
        if node.is_resolved() {
            return Err(Error::Validation(format!(
                "node {} already resolved",
                index.index()
            )));
        }
        node.value = Some(value);
        Ok(())
    }

    fn is_resolved_at(&self, index: NodeIndex) -> bool {
        self.node(index).map(AstNode::is_resolved).unwrap_or(false)
    }

    fn render(&self, out: &mut String) {
        enum Step {
            Visit(NodeIndex),
            Emit(&'static str),
            Operator(Operator),
        }

        let mut stack = vec![Step::Visit(self.root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Emit(s) => out.push_str(s),
                Step::Operator(op) => {
                    out.push(' ');
                    out.push(op.symbol());
                    out.push(' ');
                }
                Step::Visit(index) => {
                    let Some(node) = self.node(index) else {
                        continue;
                    };
                    match (node.value, node.operator, self.children(index)) {
                        (Some(value), _, _) => out.push_str(&value.to_string()),
                        (None, Some(op), Some((left, right))) => {
                            stack.push(Step::Emit(")"));
                            stack.push(Step::Visit(right));
                            stack.push(Step::Operator(op));
                            stack.push(Step::Visit(left));
                            stack.push(Step::Emit("("));
                        }
                        _ => out.push('?'),
                    }
                }
            }
        }
    }
}

/// Renders the current state of the tree, with resolved operations shown as values.
impl std::fmt::Display for Ast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        self.render(&mut out);
        f.write_str(&out)
    }
}

impl std::fmt::Debug for Ast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ast")
            .field("tree", &self.to_string())
            .field("nodes", &self.node_count())
            .finish()
    }
}
