//! Directive tree construction tests

use super::*;
use crate::value::Value;

fn nodes(text: &str) -> Vec<Node> {
    parse(text).unwrap().nodes().to_vec()
}

#[test]
fn test_parse_plain_text_is_single_literal() {
    assert_eq!(nodes("<p>hi</p>"), vec![Node::Literal("<p>hi</p>".into())]);
}

#[test]
fn test_parse_empty_template() {
    assert!(nodes("").is_empty());
}

#[test]
fn test_parse_output_kinds() {
    let parsed = nodes("<?= $a ?><?! $b ?><?php echo $c; ?>");
    assert_eq!(
        parsed,
        vec![
            Node::Output {
                expr: Expr::Var("a".into()),
                escape: Escape::Html,
                at: Location::new(1, 1)
            },
            Node::Output {
                expr: Expr::Var("b".into()),
                escape: Escape::Raw,
                at: Location::new(1, 10)
            },
            Node::Output {
                expr: Expr::Var("c".into()),
                escape: Escape::Html,
                at: Location::new(1, 19)
            },
        ]
    );
}

#[test]
fn test_parse_include_is_distinct_from_output() {
    let parsed = nodes(r#"<?= include("components.header") ?><?= print($x) ?>"#);
    assert!(matches!(
        &parsed[0],
        Node::Include { target: Expr::Literal(Value::String(id)), bindings: None, .. } if id == "components.header"
    ));
    assert!(matches!(&parsed[1], Node::Output { .. }));
}

#[test]
fn test_parse_include_statement_with_bindings() {
    let parsed = nodes(r#"<?php include("components.header", ["Title" => $Name]); ?>"#);
    let Node::Include { bindings: Some(Expr::Map(entries)), .. } = &parsed[0] else {
        panic!("expected include with bindings, got {:?}", parsed);
    };
    assert_eq!(entries[0].0, "Title");
}

#[test]
fn test_parse_foreach_with_key() {
    let parsed = nodes("<?php foreach ($$Items as $i => $Item): ?>x<?php endforeach; ?>");
    assert_eq!(
        parsed,
        vec![Node::Loop {
            sequence: Expr::IndirectRef("Items".into()),
            item: "Item".into(),
            key: Some("i".into()),
            body: vec![Node::Literal("x".into())],
            at: Location::new(1, 1),
        }]
    );
}

#[test]
fn test_parse_elseif_desugars_to_nested_conditional() {
    let parsed = nodes("<?php if ($a): ?>A<?php elseif ($b): ?>B<?php else: ?>C<?php endif ?>");
    let Node::Conditional { then_branch, else_branch: Some(else_branch), .. } = &parsed[0] else {
        panic!("expected conditional");
    };
    assert_eq!(then_branch, &vec![Node::Literal("A".into())]);
    assert_eq!(else_branch.len(), 1);
    let Node::Conditional {
        predicate,
        then_branch: inner_then,
        else_branch: Some(inner_else),
        ..
    } = &else_branch[0]
    else {
        panic!("expected nested conditional");
    };
    assert_eq!(predicate, &Expr::Var("b".into()));
    assert_eq!(inner_then, &vec![Node::Literal("B".into())]);
    assert_eq!(inner_else, &vec![Node::Literal("C".into())]);
}

#[test]
fn test_parse_else_if_two_words() {
    let parsed = nodes("<?php if ($a): ?>A<?php else if ($b): ?>B<?php endif ?>");
    assert_eq!(parsed.len(), 1);
}

#[test]
fn test_parse_comment_directive_produces_nothing() {
    assert_eq!(
        nodes("a<?php /* header include */ ?>b<?php // note ?>c"),
        vec![Node::Literal("abc".into())]
    );
}

#[test]
fn test_parse_escaped_directive_is_literal() {
    assert_eq!(
        nodes(r"\<?= $x ?>"),
        vec![Node::Literal("<?= $x ?>".into())]
    );
}

#[test]
fn test_parse_nested_blocks() {
    let text = "<?php foreach ($a as $x): ?><?php if ($x): ?><?php foreach ($x as $y): ?>\
                <?= $y ?><?php endforeach ?><?php endif ?><?php endforeach ?>";
    let parsed = nodes(text);
    assert_eq!(parsed.len(), 1);
    assert!(matches!(&parsed[0], Node::Loop { body, .. } if body.len() == 1));
}

#[test]
fn test_parse_is_pure() {
    let text = r#"<ul><?php foreach ($NavItems as $Item): ?><li><?= $Item->Name ?></li><?php endforeach ?></ul>"#;
    assert_eq!(parse(text).unwrap(), parse(text).unwrap());
}
