//! Conditional block filtering (§4.2), the only pass that runs before the
//! body is cloned — it decides which statements survive into the clone in
//! the first place.

use simd_ir::parsed_func::ConditionalBlock;
use simd_ir::{Block, Stmt, StmtNode, SwitchCase};
use simd_target::{ElementType, Target};

/// Drops statements whose source line falls inside a non-matching arm of a
/// `//hwy:if/else/endif` range. Nesting is resolved by the innermost
/// enclosing block (smallest line span). A statement with no line info
/// passes through untouched — the "failure mode" in §4.2: filtering
/// degrades to a no-op rather than a hard error when line positions are
/// unavailable.
pub fn filter_block(
    body: &Block,
    blocks: &[ConditionalBlock],
    target: Target,
    element_type: ElementType,
) -> Block {
    if blocks.is_empty() {
        return body.clone();
    }
    filter_stmts(body, blocks, target, element_type)
}

fn enclosing<'a>(blocks: &'a [ConditionalBlock], line: u32) -> Option<&'a ConditionalBlock> {
    blocks
        .iter()
        .filter(|b| b.start_line <= line && line <= b.end_line)
        .min_by_key(|b| b.end_line - b.start_line)
}

fn keeps(node: &StmtNode, blocks: &[ConditionalBlock], target: Target, element_type: ElementType) -> bool {
    let Some(line) = node.line else {
        return true;
    };
    let Some(block) = enclosing(blocks, line) else {
        return true;
    };
    let matches = block
        .predicate
        .matches(target.suffix(), element_type.suffix());
    let in_if_arm = match block.else_line {
        Some(else_line) => line < else_line,
        None => true,
    };
    if in_if_arm { matches } else { !matches }
}

fn filter_stmts(block: &Block, blocks: &[ConditionalBlock], target: Target, element_type: ElementType) -> Block {
    block
        .iter()
        .filter(|node| keeps(node, blocks, target, element_type))
        .map(|node| StmtNode {
            line: node.line,
            node: filter_stmt(&node.node, blocks, target, element_type),
        })
        .collect()
}

fn filter_stmt(stmt: &Stmt, blocks: &[ConditionalBlock], target: Target, element_type: ElementType) -> Stmt {
    match stmt {
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => Stmt::If {
            cond: cond.clone(),
            then_block: filter_stmts(then_block, blocks, target, element_type),
            else_block: else_block
                .as_ref()
                .map(|b| filter_stmts(b, blocks, target, element_type)),
        },
        Stmt::For { init, cond, post, body } => Stmt::For {
            init: init.clone(),
            cond: cond.clone(),
            post: post.clone(),
            body: filter_stmts(body, blocks, target, element_type),
        },
        Stmt::Range { key, value, expr, body } => Stmt::Range {
            key: key.clone(),
            value: value.clone(),
            expr: expr.clone(),
            body: filter_stmts(body, blocks, target, element_type),
        },
        Stmt::Switch { tag, cases } => Stmt::Switch {
            tag: tag.clone(),
            cases: cases
                .iter()
                .map(|c| SwitchCase {
                    values: c.values.clone(),
                    body: filter_stmts(&c.body, blocks, target, element_type),
                })
                .collect(),
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simd_ir::parsed_func::ConditionalPredicate;
    use simd_ir::Expr;

    fn block_at(line: u32, body: Stmt) -> StmtNode {
        StmtNode::at(line, body)
    }

    #[test]
    fn avx512_predicate_keeps_only_if_arm_on_avx512() {
        let blocks = vec![ConditionalBlock {
            start_line: 1,
            else_line: Some(2),
            end_line: 3,
            predicate: ConditionalPredicate::Target("AVX512".into()),
        }];
        let body: Block = vec![
            block_at(1, Stmt::expr(Expr::ident("if_arm"))),
            block_at(2, Stmt::expr(Expr::ident("else_arm"))),
        ];

        let avx512 = filter_block(&body, &blocks, Target::Avx512, ElementType::F32);
        assert_eq!(avx512.len(), 1);
        assert!(matches!(&avx512[0].node, Stmt::Expr(Expr::Ident(n)) if n == "if_arm"));

        let avx2 = filter_block(&body, &blocks, Target::Avx2, ElementType::F32);
        assert_eq!(avx2.len(), 1);
        assert!(matches!(&avx2[0].node, Stmt::Expr(Expr::Ident(n)) if n == "else_arm"));
    }

    #[test]
    fn missing_line_info_is_a_no_op() {
        let blocks = vec![ConditionalBlock {
            start_line: 1,
            else_line: None,
            end_line: 3,
            predicate: ConditionalPredicate::Target("AVX512".into()),
        }];
        let body: Block = vec![StmtNode::new(Stmt::expr(Expr::ident("untouched")))];
        let out = filter_block(&body, &blocks, Target::Avx2, ElementType::F32);
        assert_eq!(out, body);
    }

    #[test]
    fn recurses_into_if_bodies() {
        let blocks = vec![ConditionalBlock {
            start_line: 2,
            else_line: None,
            end_line: 2,
            predicate: ConditionalPredicate::ElementType("f64".into()),
        }];
        let body: Block = vec![StmtNode::new(Stmt::If {
            cond: Expr::Bool(true),
            then_block: vec![block_at(2, Stmt::expr(Expr::ident("f64_only")))],
            else_block: None,
        })];
        let out = filter_block(&body, &blocks, Target::Avx2, ElementType::F32);
        match &out[0].node {
            Stmt::If { then_block, .. } => assert!(then_block.is_empty()),
            _ => panic!("expected if"),
        }
    }
}
