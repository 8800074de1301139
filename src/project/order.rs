//! Page hierarchy reconstruction.
//!
//! Pages carry flat parent pointers; navigation wants a depth-first
//! linearization. `linearize` derives the order from the pointers (the
//! normal read path — pointers are authoritative). `reconcile` goes the
//! other way and is used only when an explicit order list is the
//! authoritative input, i.e. bulk reorder writes.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::model::Page;

/// Pre-order depth-first linearization of the page tree.
///
/// - roots (no parent) are emitted in input order, which is directory
///   listing order on the read path;
/// - a page's whole subtree is contiguous immediately after the page;
/// - a parent id that matches no page in the set is treated as absent, so
///   the page becomes a root rather than a failure;
/// - cycles cannot be expressed through a valid tree, but if the input
///   contains one its members are still emitted exactly once, appended in
///   input order.
pub fn linearize(pages: &[Page]) -> Vec<String> {
    linearize_with(pages, &[])
}

/// Like [`linearize`], biased by a previously recorded order.
///
/// Parent pointers stay authoritative for *structure*; `preferred` only
/// decides the order of siblings, so a manually arranged navigation
/// survives unrelated page writes. Pages absent from `preferred` sort
/// after the remembered ones, in input order.
pub fn linearize_with(pages: &[Page], preferred: &[String]) -> Vec<String> {
    let ids: HashSet<&str> = pages.iter().map(|p| p.id.as_str()).collect();
    let rank: HashMap<&str, usize> = preferred
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    // Children grouped by effective parent, preserving input order.
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut roots: Vec<&str> = Vec::new();
    for page in pages {
        match effective_parent(page, &ids) {
            Some(parent) => children.entry(parent).or_default().push(&page.id),
            None => roots.push(&page.id),
        }
    }
    let by_rank = |id: &&str| rank.get(*id).copied().unwrap_or(usize::MAX);
    roots.sort_by_key(by_rank);
    for group in children.values_mut() {
        group.sort_by_key(by_rank);
    }

    let mut order: Vec<String> = Vec::with_capacity(pages.len());
    let mut visited: HashSet<&str> = HashSet::new();
    for root in roots {
        visit(root, &children, &mut visited, &mut order);
    }
    // Cycle members are reachable from no root; emit them anyway.
    for page in pages {
        visit(&page.id, &children, &mut visited, &mut order);
    }
    order
}

fn effective_parent<'a>(page: &'a Page, ids: &HashSet<&str>) -> Option<&'a str> {
    page.parent
        .as_deref()
        .filter(|p| ids.contains(p) && *p != page.id)
}

fn visit<'a>(
    id: &'a str,
    children: &BTreeMap<&str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    order: &mut Vec<String>,
) {
    if !visited.insert(id) {
        return;
    }
    order.push(id.to_string());
    if let Some(kids) = children.get(id) {
        for kid in kids {
            visit(kid, children, visited, order);
        }
    }
}

/// Result of reconciling an authoritative order list against the page set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reordered {
    /// Normalized order: submitted ids that exist, in submitted order,
    /// followed by any pages the submission omitted.
    pub order: Vec<String>,
    /// Effective parent per page id after reconciliation. Only entries
    /// that differ from the stored parent need rewriting.
    pub parents: BTreeMap<String, Option<String>>,
}

/// Inverse direction: take an explicit order list as the source of truth
/// and derive each page's effective parent from it.
///
/// A page keeps its declared parent only if that parent appears earlier in
/// the submitted order — otherwise the order could not be a pre-order
/// traversal, so the page is lifted to a root. Ids in the submission that
/// match no page are dropped; pages the submission omits are appended at
/// the end as roots.
pub fn reconcile(pages: &[Page], submitted: &[String]) -> Reordered {
    let declared: BTreeMap<&str, Option<&str>> = pages
        .iter()
        .map(|p| (p.id.as_str(), p.parent.as_deref()))
        .collect();

    let mut order: Vec<String> = Vec::with_capacity(pages.len());
    let mut seen: HashSet<&str> = HashSet::new();
    for id in submitted {
        if let Some((known, _)) = declared.get_key_value(id.as_str()) {
            if seen.insert(known) {
                order.push((*known).to_string());
            }
        }
    }
    for page in pages {
        if seen.insert(&page.id) {
            order.push(page.id.clone());
        }
    }

    let position: BTreeMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut parents: BTreeMap<String, Option<String>> = BTreeMap::new();
    for id in &order {
        let parent = declared
            .get(id.as_str())
            .copied()
            .flatten()
            .filter(|p| match (position.get(p), position.get(id.as_str())) {
                (Some(pi), Some(ci)) => pi < ci,
                _ => false,
            })
            .map(str::to_string);
        parents.insert(id.clone(), parent);
    }

    Reordered { order, parents }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    fn page(id: &str, parent: Option<&str>) -> Page {
        Page {
            id: id.to_string(),
            title: id.to_string(),
            content: Value::Null,
            parent: parent.map(str::to_string),
            created_at: None,
            updated_at: None,
            created_by: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn roots_in_listing_order_subtrees_contiguous() {
        let pages = vec![
            page("about", None),
            page("credits", Some("about")),
            page("intro", None),
            page("methods", Some("intro")),
            page("sources", Some("methods")),
        ];
        assert_eq!(
            linearize(&pages),
            vec!["about", "credits", "intro", "methods", "sources"]
        );
    }

    #[test]
    fn dangling_parent_is_a_root() {
        let pages = vec![page("a", Some("ghost")), page("b", None)];
        assert_eq!(linearize(&pages), vec!["a", "b"]);
    }

    #[test]
    fn self_parent_is_a_root() {
        let pages = vec![page("a", Some("a"))];
        assert_eq!(linearize(&pages), vec!["a"]);
    }

    #[test]
    fn cycle_members_emitted_once() {
        let pages = vec![page("a", Some("b")), page("b", Some("a")), page("r", None)];
        let order = linearize(&pages);
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], "r");
        assert!(order.contains(&"a".to_string()));
        assert!(order.contains(&"b".to_string()));
    }

    #[test]
    fn preferred_order_decides_sibling_order_only() {
        let pages = vec![
            page("a", None),
            page("b", None),
            page("c", Some("a")),
            page("d", Some("a")),
        ];
        // Remembered order puts b first and flips a's children.
        let preferred: Vec<String> = ["b", "a", "d", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(linearize_with(&pages, &preferred), vec!["b", "a", "d", "c"]);

        // A page the remembered order never saw sorts after its siblings.
        let pages = vec![page("new", None), page("a", None), page("b", None)];
        let preferred: Vec<String> = ["b", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(linearize_with(&pages, &preferred), vec!["b", "a", "new"]);
    }

    #[test]
    fn preferred_order_cannot_override_structure() {
        let pages = vec![page("a", None), page("b", Some("a"))];
        // The index claims the child comes first; pointers win.
        let preferred: Vec<String> = ["b", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(linearize_with(&pages, &preferred), vec!["a", "b"]);
    }

    #[test]
    fn reconcile_keeps_parent_only_when_it_precedes() {
        let pages = vec![
            page("intro", None),
            page("methods", Some("intro")),
            page("about", None),
        ];
        // "methods" moved before its parent: it becomes a root.
        let out = reconcile(
            &pages,
            &["methods".into(), "intro".into(), "about".into()],
        );
        assert_eq!(out.order, vec!["methods", "intro", "about"]);
        assert_eq!(out.parents["methods"], None);
        assert_eq!(out.parents["intro"], None);

        // Parent kept when it still precedes the child.
        let out = reconcile(&pages, &["intro".into(), "methods".into(), "about".into()]);
        assert_eq!(out.parents["methods"], Some("intro".to_string()));
    }

    #[test]
    fn reconcile_drops_unknown_and_appends_missing() {
        let pages = vec![page("a", None), page("b", None)];
        let out = reconcile(&pages, &["ghost".into(), "b".into()]);
        assert_eq!(out.order, vec!["b", "a"]);
        assert_eq!(out.parents["a"], None);
    }

    // Arbitrary forests: each page's parent is one of the earlier pages or
    // none, so the pointer graph is always acyclic.
    fn arb_forest() -> impl Strategy<Value = Vec<Page>> {
        prop::collection::vec(prop::option::of(0usize..8), 1..24).prop_map(|raw| {
            raw.iter()
                .enumerate()
                .map(|(i, parent)| {
                    let parent = parent
                        .filter(|p| *p < i)
                        .map(|p| format!("p{p}"));
                    page(&format!("p{i}"), parent.as_deref())
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn every_id_exactly_once(pages in arb_forest()) {
            let order = linearize(&pages);
            prop_assert_eq!(order.len(), pages.len());
            let mut sorted: Vec<_> = order.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), pages.len());
        }

        #[test]
        fn no_child_precedes_its_parent(pages in arb_forest()) {
            let order = linearize(&pages);
            let pos: std::collections::HashMap<&str, usize> =
                order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
            for p in &pages {
                if let Some(parent) = p.parent.as_deref() {
                    prop_assert!(pos[parent] < pos[p.id.as_str()]);
                }
            }
        }

        #[test]
        fn subtrees_are_contiguous(pages in arb_forest()) {
            let order = linearize(&pages);
            let pos: std::collections::HashMap<&str, usize> =
                order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
            // Every page's ancestor chain must be positioned before it with
            // no gap jumping outside the subtree: equivalent check — for
            // each parent, the set of its descendants occupies a contiguous
            // range starting right after the parent.
            let mut children: std::collections::HashMap<&str, Vec<&str>> = Default::default();
            for p in &pages {
                if let Some(parent) = p.parent.as_deref() {
                    children.entry(parent).or_default().push(&p.id);
                }
            }
            fn subtree_size(
                id: &str,
                children: &std::collections::HashMap<&str, Vec<&str>>,
            ) -> usize {
                1 + children
                    .get(id)
                    .map(|kids| kids.iter().map(|k| subtree_size(k, children)).sum())
                    .unwrap_or(0)
            }
            for p in &pages {
                let size = subtree_size(&p.id, &children);
                let start = pos[p.id.as_str()];
                // All members of the subtree fall inside [start, start+size).
                let mut stack = vec![p.id.as_str()];
                while let Some(id) = stack.pop() {
                    let at = pos[id];
                    prop_assert!(at >= start && at < start + size);
                    if let Some(kids) = children.get(id) {
                        stack.extend(kids.iter().copied());
                    }
                }
            }
        }

        #[test]
        fn reconcile_round_trips_linearized_order(pages in arb_forest()) {
            let order = linearize(&pages);
            let out = reconcile(&pages, &order);
            // Feeding a derived order back in changes nothing.
            prop_assert_eq!(&out.order, &order);
            for p in &pages {
                prop_assert_eq!(&out.parents[p.id.as_str()], &p.parent);
            }
        }
    }
}
