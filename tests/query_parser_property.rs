//! Property tests for query input parsing

use proptest::prelude::*;

use commerce_core::query::input::{normalize, FieldTree, QueryInput};

fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}".prop_map(|s| s)
}

fn field_path() -> impl Strategy<Value = String> {
    prop::collection::vec(identifier(), 1..4).prop_map(|segments| segments.join("."))
}

proptest! {
    /// Formatting an entry point and field list into the text form and
    /// parsing it back preserves both.
    #[test]
    fn text_form_round_trips(
        entry in identifier(),
        fields in prop::collection::vec(field_path(), 1..6),
    ) {
        let text = format!("{entry}:{}", fields.join(","));
        let query = normalize(QueryInput::Text(text), None).unwrap();

        prop_assert_eq!(&query.entry_point, &entry);
        for field in &fields {
            prop_assert!(query.fields.contains(field));
        }
    }

    /// The field tree covers every requested path: each dotted path can be
    /// walked from the root to a leaf.
    #[test]
    fn field_tree_covers_all_paths(fields in prop::collection::vec(field_path(), 1..8)) {
        let tree = FieldTree::from_fields(&fields);

        for field in &fields {
            let mut node = &tree;
            let segments: Vec<&str> = field.split('.').collect();
            for (i, segment) in segments.iter().enumerate() {
                if i + 1 == segments.len() {
                    // Last segment: either a leaf here or a child that some
                    // longer sibling path created.
                    prop_assert!(
                        node.leaves.iter().any(|l| l == segment)
                            || node.children.contains_key(*segment),
                        "missing terminal segment {} of {}", segment, field
                    );
                } else {
                    match node.children.get(*segment) {
                        Some(child) => node = child,
                        None => return Err(TestCaseError::fail(
                            format!("missing intermediate segment {segment} of {field}"),
                        )),
                    }
                }
            }
        }
    }

    /// A bare entry point always selects all fields.
    #[test]
    fn bare_entry_selects_all(entry in identifier()) {
        let query = normalize(QueryInput::Text(entry), None).unwrap();
        prop_assert_eq!(query.fields, vec!["*".to_string()]);
    }
}
