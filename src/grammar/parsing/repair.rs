//! Tree validation and repair
//!
//!     Runs after every element-building pass and normalizes whatever the builder produced.
//!     The steps always run in this order:
//!         1. overlap correction: elements adjacent in `(start_line, -end_line)` order where
//!            the first contains the second become parent and child
//!         2. link validation: a child whose range leaves its parent's range is cut loose
//!         3. orphan adoption: a parentless element not starting on line 1 is attached to
//!            the smallest element containing it
//!         4. method coercion: a function whose parent is a class-like element becomes a
//!            method
//!
//!     Elements with identical ranges never adopt each other (several imports on one line
//!     stay siblings). No step creates a cycle, since `Outline::attach` refuses those links.
//!     Children lists are sorted by position at the end.

use crate::grammar::ast::{CodeElement, ElementId, ElementType, Outline};
use std::cmp::Reverse;
use tracing::debug;

/// How many changes each repair step made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub linked: usize,
    pub severed: usize,
    pub adopted: usize,
    pub coerced: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

fn same_range(a: &CodeElement, b: &CodeElement) -> bool {
    a.start_line == b.start_line && a.end_line == b.end_line
}

/// Run every repair step over `outline`.
pub fn repair(outline: &mut Outline) -> RepairReport {
    let mut report = RepairReport::default();
    correct_overlaps(outline, &mut report);
    validate_links(outline, &mut report);
    adopt_orphans(outline, &mut report);
    coerce_methods(outline, &mut report);
    outline.sort_children();
    report
}

/// Step 1. Containers sort before what they contain, so each adjacent pair is a candidate
/// (container, contained). An existing parent that already contains the element at least
/// as tightly is kept.
pub fn correct_overlaps(outline: &mut Outline, report: &mut RepairReport) {
    let mut order: Vec<ElementId> = outline.ids().collect();
    order.sort_by_key(|&id| {
        let e = &outline[id];
        (e.start_line, Reverse(e.end_line), id)
    });

    for pair in order.windows(2) {
        let (outer, inner) = (pair[0], pair[1]);
        if outline.parent(inner) == Some(outer) || outline.parent(outer) == Some(inner) {
            continue;
        }
        let (a, b) = (&outline[outer], &outline[inner]);
        if !a.contains(b) || same_range(a, b) {
            continue;
        }
        if let Some(current) = outline.parent(inner) {
            let p = &outline[current];
            if p.contains(b) && p.span() <= a.span() {
                continue;
            }
        }
        if outline.attach(inner, outer) {
            debug!(child = %outline[inner], parent = %outline[outer], "linked overlapping element");
            report.linked += 1;
        }
    }
}

/// Step 2.
pub fn validate_links(outline: &mut Outline, report: &mut RepairReport) {
    let ids: Vec<ElementId> = outline.ids().collect();
    for id in ids {
        let Some(parent) = outline.parent(id) else {
            continue;
        };
        if outline[parent].contains(&outline[id]) {
            continue;
        }
        debug!(child = %outline[id], parent = %outline[parent], "severed link outside parent range");
        outline.detach(id);
        report.severed += 1;
    }
}

/// Step 3.
pub fn adopt_orphans(outline: &mut Outline, report: &mut RepairReport) {
    let ids: Vec<ElementId> = outline.ids().collect();
    for id in ids {
        if outline.parent(id).is_some() || outline[id].start_line == 1 {
            continue;
        }
        let orphan = &outline[id];
        let host = outline
            .iter()
            .filter(|&(candidate, e)| {
                candidate != id
                    && e.contains(orphan)
                    && !same_range(e, orphan)
                    && !outline.is_descendant(candidate, id)
            })
            .min_by_key(|&(candidate, e)| (e.span(), Reverse(outline.depth(candidate)), candidate))
            .map(|(candidate, _)| candidate);

        if let Some(host) = host {
            if outline.attach(id, host) {
                debug!(child = %outline[id], parent = %outline[host], "adopted orphan");
                report.adopted += 1;
            }
        }
    }
}

/// Step 4.
pub fn coerce_methods(outline: &mut Outline, report: &mut RepairReport) {
    let ids: Vec<ElementId> = outline.ids().collect();
    for id in ids {
        if outline[id].element_type != ElementType::Function {
            continue;
        }
        let Some(parent) = outline.parent(id) else {
            continue;
        };
        if !outline[parent].element_type.has_methods() {
            continue;
        }
        if let Some(element) = outline.get_mut(id) {
            element.element_type = ElementType::Method;
            debug!(element = %element, "coerced function to method");
            report.coerced += 1;
        }
    }
}
