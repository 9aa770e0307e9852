//! Load-time checks run before a blueprint becomes a field.

use std::collections::{HashMap, HashSet};

use crate::error::{GraphError, Result};
use crate::runtime::blueprint::{Blueprint, NodeIndex};
use crate::runtime::node::{ImpulseRole, NodeDescriptor};

pub fn validate(blueprint: &Blueprint, descriptors: &[&NodeDescriptor]) -> Result<()> {
    check_ids(blueprint)?;
    check_links(blueprint, descriptors)?;
    check_flows(blueprint, descriptors)?;
    check_value_cycles(blueprint, descriptors)?;
    check_impulses(descriptors)?;
    Ok(())
}

pub fn check_node_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains('.') {
        return Err(GraphError::InvalidNodeId(id.to_string()));
    }
    Ok(())
}

fn check_ids(blueprint: &Blueprint) -> Result<()> {
    let mut seen = HashSet::new();
    for node in &blueprint.nodes {
        check_node_id(&node.id)?;
        if !seen.insert(node.id.as_str()) {
            return Err(GraphError::DuplicateNode(node.id.clone()));
        }
    }
    Ok(())
}

fn node_id(blueprint: &Blueprint, index: NodeIndex) -> Result<&str> {
    blueprint
        .nodes
        .get(index)
        .map(|n| n.id.as_str())
        .ok_or_else(|| GraphError::UnknownNode(format!("#{}", index)))
}

fn check_links(blueprint: &Blueprint, descriptors: &[&NodeDescriptor]) -> Result<()> {
    let mut linked_inputs = HashSet::new();

    for link in &blueprint.links {
        let source_id = node_id(blueprint, link.source.node)?;
        let target_id = node_id(blueprint, link.target.node)?;

        let output = descriptors[link.source.node]
            .outputs
            .get(link.source.port)
            .ok_or_else(|| GraphError::UnknownPort {
                node: source_id.to_string(),
                port: format!("#{}", link.source.port),
                direction: "output",
            })?;
        let input = descriptors[link.target.node]
            .inputs
            .get(link.target.port)
            .ok_or_else(|| GraphError::UnknownPort {
                node: target_id.to_string(),
                port: format!("#{}", link.target.port),
                direction: "input",
            })?;

        if !output.ty.links_to(input.ty) {
            return Err(GraphError::LinkTypeMismatch {
                source_port: format!("{}.{}", source_id, output.name),
                source_type: output.ty,
                target_port: format!("{}.{}", target_id, input.name),
                target_type: input.ty,
            });
        }

        // Update hooks read their inputs in a fresh pulse, which never holds
        // flow-node outputs.
        if descriptors[link.target.node].update.is_some() && !descriptors[link.source.node].is_value_node() {
            return Err(GraphError::TickInputFromFlow(format!(
                "{}.{}",
                target_id, input.name
            )));
        }

        if !linked_inputs.insert(link.target) {
            return Err(GraphError::InputLinkedTwice(format!(
                "{}.{}",
                target_id, input.name
            )));
        }
    }
    Ok(())
}

fn check_flows(blueprint: &Blueprint, descriptors: &[&NodeDescriptor]) -> Result<()> {
    let mut linked_slots = HashSet::new();

    for flow in &blueprint.flows {
        let source_id = node_id(blueprint, flow.source.node)?;
        let target_id = node_id(blueprint, flow.target)?;

        let slot = descriptors[flow.source.node]
            .flows
            .get(flow.source.port)
            .ok_or_else(|| GraphError::UnknownFlowSlot {
                node: source_id.to_string(),
                slot: format!("#{}", flow.source.port),
            })?;

        if !descriptors[flow.target].flow_input {
            return Err(GraphError::NotFlowTarget(target_id.to_string()));
        }

        if !linked_slots.insert(flow.source) {
            return Err(GraphError::FlowLinkedTwice(format!(
                "{}.{}",
                source_id, slot.name
            )));
        }
    }
    Ok(())
}

/// Value nodes evaluate their sources on demand, so a cycle made only of
/// value nodes would never terminate.
fn check_value_cycles(blueprint: &Blueprint, descriptors: &[&NodeDescriptor]) -> Result<()> {
    let mut depends_on: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
    for link in &blueprint.links {
        let (from, to) = (link.target.node, link.source.node);
        if descriptors[from].is_value_node() && descriptors[to].is_value_node() {
            depends_on.entry(from).or_default().push(to);
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; descriptors.len()];
    for start in 0..descriptors.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        // Iterative DFS: (node, next child position)
        let mut stack = vec![(start, 0usize)];
        marks[start] = Mark::Visiting;
        while let Some((node, child)) = stack.pop() {
            let children = depends_on.get(&node).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(&next) = children.get(child) {
                stack.push((node, child + 1));
                match marks[next] {
                    Mark::Visiting => {
                        return Err(GraphError::Cycle(blueprint.nodes[next].id.clone()));
                    }
                    Mark::Unvisited => {
                        marks[next] = Mark::Visiting;
                        stack.push((next, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
            }
        }
    }
    Ok(())
}

fn check_impulses(descriptors: &[&NodeDescriptor]) -> Result<()> {
    let mut senders = Vec::new();
    let mut receivers: HashMap<&str, Vec<_>> = HashMap::new();
    for binding in descriptors.iter().filter_map(|d| d.impulse.as_ref()) {
        match binding.role {
            ImpulseRole::Send => senders.push(binding),
            ImpulseRole::Receive => receivers
                .entry(binding.name.as_str())
                .or_default()
                .push(binding),
        }
    }

    for sender in senders {
        for receiver in receivers.get(sender.name.as_str()).into_iter().flatten() {
            let compatible = sender.types.len() == receiver.types.len()
                && sender
                    .types
                    .iter()
                    .zip(&receiver.types)
                    .all(|(s, r)| s.links_to(*r));
            if !compatible {
                return Err(GraphError::ImpulseMismatch {
                    name: sender.name.clone(),
                    expected: receiver.types.clone(),
                    actual: sender.types.clone(),
                });
            }
        }
    }
    Ok(())
}
