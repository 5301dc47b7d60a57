// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{
    push_u64_le, push_uvarint, Fst, Output, ARCS_FOR_BINARY_SEARCH, ARCS_FOR_CONTINUOUS,
    ARCS_FOR_DIRECT_ADDRESSING, ARCS_FOR_LINEAR_SCAN,
};
use crate::Bytes;
use rustc_hash::FxHashMap;

const FLAG_FINAL: u8 = 1;

#[derive(Default)]
struct BuildNode {
    arcs: Vec<BuildArc>,
    is_final: bool,
    final_output: u64,
}

struct BuildArc {
    label: u8,
    output: u64,
    target: usize,
}

/// Incremental [`Fst`] construction
///
/// Inputs must be inserted in strictly ascending byte order; the empty input
/// is valid only as the first insertion. Outputs are factored forward onto
/// shared prefix arcs so that every stored input accumulates to exactly its
/// inserted output.
pub struct FstBuilder {
    nodes: Vec<BuildNode>,
    last_input: Option<Vec<u8>>,
    entries: Vec<(Bytes, Output)>,
}

impl Default for FstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FstBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![BuildNode::default()],
            last_input: None,
            entries: Vec::new(),
        }
    }

    /// Number of inserted inputs so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was inserted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds an `input -> output` mapping.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `output` is negative, or if `input` is not
    /// strictly greater than the previously inserted input (duplicates
    /// included).
    pub fn insert(&mut self, input: &[u8], output: Output) -> crate::Result<()> {
        if output < 0 {
            return Err(crate::Error::InvalidInput("fst outputs must be non-negative"));
        }

        if let Some(last) = &self.last_input {
            if input <= last.as_slice() {
                return Err(crate::Error::InvalidInput(
                    "fst inputs must be inserted in strictly ascending order",
                ));
            }
        }

        #[allow(clippy::cast_sign_loss)]
        let mut remaining = output as u64;

        if input.is_empty() {
            self.nodes[0].is_final = true;
            self.nodes[0].final_output = remaining;
        } else {
            let mut node = 0usize;

            for &label in input {
                if let Some(pos) = self.nodes[node].arcs.iter().position(|a| a.label == label) {
                    // Shared prefix arc: keep the common output on the arc,
                    // push the excess down into the target node
                    let arc_output = self.nodes[node].arcs[pos].output;
                    let target = self.nodes[node].arcs[pos].target;

                    let common = arc_output.min(remaining);
                    let push_down = arc_output - common;

                    if push_down > 0 {
                        for child_arc in &mut self.nodes[target].arcs {
                            child_arc.output += push_down;
                        }
                        if self.nodes[target].is_final {
                            self.nodes[target].final_output += push_down;
                        }
                    }

                    self.nodes[node].arcs[pos].output = common;
                    remaining -= common;
                    node = target;
                } else {
                    let target = self.nodes.len();
                    self.nodes.push(BuildNode::default());
                    self.nodes[node].arcs.push(BuildArc {
                        label,
                        output: remaining,
                        target,
                    });
                    remaining = 0;
                    node = target;
                }
            }

            self.nodes[node].is_final = true;
            self.nodes[node].final_output = remaining;
        }

        self.last_input = Some(input.to_vec());
        self.entries.push((Bytes::from(input), output));

        Ok(())
    }

    /// Finishes construction and packs the FST into its byte representation.
    ///
    /// Identical packed nodes are deduplicated, so shared suffixes collapse
    /// into shared states.
    ///
    /// # Errors
    ///
    /// Currently infallible for builder-produced state; kept fallible for
    /// parity with the deserializing constructors.
    pub fn finish(self) -> crate::Result<Fst> {
        let mut packed = Vec::new();
        let mut memo: FxHashMap<Vec<u8>, usize> = FxHashMap::default();

        let root = pack_node(&self.nodes, 0, &mut packed, &mut memo);

        Ok(Fst::from_parts(packed, Some(root), self.entries))
    }
}

fn pack_node(
    nodes: &[BuildNode],
    idx: usize,
    packed: &mut Vec<u8>,
    memo: &mut FxHashMap<Vec<u8>, usize>,
) -> usize {
    let node = &nodes[idx];

    // Children first so arc targets are known offsets
    let mut arcs: Vec<(u8, u64, u64)> = Vec::with_capacity(node.arcs.len());
    for arc in &node.arcs {
        let target = pack_node(nodes, arc.target, packed, memo);
        arcs.push((arc.label, arc.output, target as u64));
    }

    let mut bytes = Vec::new();
    write_node(&mut bytes, node.is_final, node.final_output, &arcs);

    if let Some(&offset) = memo.get(&bytes) {
        return offset;
    }

    let offset = packed.len();
    packed.extend_from_slice(&bytes);
    memo.insert(bytes, offset);
    offset
}

fn choose_encoding(arcs: &[(u8, u64, u64)]) -> u8 {
    let count = arcs.len();
    if count == 0 {
        return ARCS_FOR_LINEAR_SCAN;
    }

    let range = (arcs[count - 1].0 - arcs[0].0) as usize + 1;

    if range == count {
        ARCS_FOR_CONTINUOUS
    } else if range <= 64 && count * 4 >= range {
        ARCS_FOR_DIRECT_ADDRESSING
    } else if count >= 6 {
        ARCS_FOR_BINARY_SEARCH
    } else {
        ARCS_FOR_LINEAR_SCAN
    }
}

fn write_node(out: &mut Vec<u8>, is_final: bool, final_output: u64, arcs: &[(u8, u64, u64)]) {
    let encoding = choose_encoding(arcs);

    out.push(encoding);
    out.push(if is_final { FLAG_FINAL } else { 0 });
    if is_final {
        push_uvarint(out, final_output);
    }

    match encoding {
        ARCS_FOR_CONTINUOUS => {
            push_uvarint(out, arcs.len() as u64);
            out.push(arcs[0].0);
            for &(_, output, target) in arcs {
                push_u64_le(out, output);
                push_u64_le(out, target);
            }
        }

        ARCS_FOR_DIRECT_ADDRESSING => {
            let first = arcs[0].0;
            let range = (arcs[arcs.len() - 1].0 - first) as usize + 1;

            out.push(first);
            #[allow(clippy::cast_possible_truncation)]
            out.push(range as u8);

            let mut bit_table = vec![0u8; range.div_ceil(8)];
            for &(label, _, _) in arcs {
                let bit = (label - first) as usize;
                bit_table[bit / 8] |= 1 << (bit % 8);
            }
            out.extend_from_slice(&bit_table);

            for &(_, output, target) in arcs {
                push_u64_le(out, output);
                push_u64_le(out, target);
            }
        }

        ARCS_FOR_BINARY_SEARCH => {
            push_uvarint(out, arcs.len() as u64);
            for &(label, output, target) in arcs {
                out.push(label);
                push_u64_le(out, output);
                push_u64_le(out, target);
            }
        }

        _ => {
            push_uvarint(out, arcs.len() as u64);
            for &(label, output, target) in arcs {
                out.push(label);
                push_uvarint(out, output);
                push_uvarint(out, target);
            }
        }
    }
}
