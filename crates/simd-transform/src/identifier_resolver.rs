//! The identifier resolver (§4.4): two rewrite patterns on plain
//! identifiers (type-specific-constant base-name lookup, and type-suffix
//! swap), plus type-parameter substitution and the ambient math-package
//! rename. Runs once, right after the conditional-filtered body is cloned,
//! before the helper inliner and operation lowerer ever see it — both of
//! those rely on identifiers already referring to the concrete element
//! type (§3 invariant: "every identifier that refers to a type parameter
//! of the base function has been replaced by a concrete element-type
//! identifier after identifier resolution").

use ahash::AHashMap;

use simd_ir::tree::map_block_exprs;
use simd_ir::{Block, Expr, ParsedFunc, Stmt, StmtNode, TypeExpr, UnaryOp};
use simd_target::{ElementType, TargetDescriptor};

/// The ambient Go `math` package base functions are written against. §4.4:
/// "references to the ambient math-package selector are renamed to an
/// alias so the generated code can live in a package of the same short
/// name without shadowing."
const AMBIENT_MATH_PACKAGE: &str = "math";
const AMBIENT_MATH_ALIAS: &str = "stdmath";

/// A package-level named constant a base function may reference by a
/// type-agnostic base name (e.g. `Epsilon`), resolved per element type by
/// formulaic suffixing (`Epsilon_f32`, `Epsilon_f64`, ...). Entries record
/// which element-type variants actually exist; a half-precision request
/// against a name with no half-precision variant falls back to the f32
/// variant (§4.4 "compute-in-float32 convention"), matching
/// `ElementType::f32_fallback`.
struct ConstantRegistry {
    /// base name -> variants that exist (omission from the map entirely
    /// means "not a registry name", not "no variants").
    variants: AHashMap<&'static str, &'static [ElementType]>,
}

const FULL_WIDTH_ONLY: &[ElementType] = &[
    ElementType::F32,
    ElementType::F64,
    ElementType::I32,
    ElementType::I64,
    ElementType::U32,
    ElementType::U64,
];

impl ConstantRegistry {
    /// The constants known to the generator itself. A real deployment would
    /// receive this table from the front-end alongside `ParsedFunc` (§6
    /// lists no such input, so it is treated as generator-internal data,
    /// the same way the target descriptor tables are).
    fn default_table() -> Self {
        let mut variants: AHashMap<&'static str, &'static [ElementType]> = AHashMap::new();
        for name in ["Epsilon", "MaxValue", "MinValue", "SmallestNormal"] {
            variants.insert(name, FULL_WIDTH_ONLY);
        }
        Self { variants }
    }

    fn resolve(&self, name: &str, element_type: ElementType) -> Option<String> {
        let variants = self.variants.get(name)?;
        let effective = if variants.contains(&element_type) {
            element_type
        } else if element_type.is_half_precision() {
            element_type.f32_fallback()
        } else {
            return None;
        };
        if !variants.contains(&effective) {
            return None;
        }
        Some(format!("{name}_{}", effective.suffix()))
    }
}

const KNOWN_SUFFIXES: [ElementType; 8] = ElementType::ALL;

/// §4.4 "Suffix swap": if `name` already carries a recognized type suffix
/// and the current element type's suffix differs, swap it. Longer suffixes
/// (`_bf16`) are tried before their prefixes would otherwise mismatch
/// (`_f16`/`_bf16` never collide since both are checked by exact `_<tag>`
/// match, not a prefix scan).
fn swap_suffix(name: &str, element_type: ElementType) -> Option<String> {
    for candidate in KNOWN_SUFFIXES {
        let suffix = format!("_{}", candidate.suffix());
        if let Some(stem) = name.strip_suffix(&suffix) {
            if candidate == element_type {
                return None;
            }
            return Some(format!("{stem}_{}", element_type.suffix()));
        }
    }
    None
}

/// Substitutes every type-parameter identifier in `ty` with the concrete
/// scalar type name for `element_type` (e.g. `T` -> `float32`, `[]T` ->
/// `[]float32`). Abstract vector generics (`Vec[T]`, `Mask[T]`) are left
/// with their substituted scalar argument here; lowering them to concrete
/// backend vector types is the operation lowerer's job (§4.6).
pub(crate) fn resolve_type(ty: &TypeExpr, parsed: &ParsedFunc, td: &TargetDescriptor, element_type: ElementType) -> TypeExpr {
    let mut resolved = ty.clone();
    for tp in &parsed.type_params {
        let scalar = TypeExpr::parse(td.scalar_type_name(element_type));
        resolved = resolved.substitute_named(&tp.name, &scalar);
    }
    resolved
}

/// The top-level entry point (§4.4).
pub fn resolve_identifiers(
    body: Block,
    parsed: &ParsedFunc,
    td: &TargetDescriptor,
    element_type: ElementType,
) -> Block {
    let registry = ConstantRegistry::default_table();
    resolve_block(body, parsed, &registry, td, element_type)
}

fn resolve_ident(name: &str, registry: &ConstantRegistry, parsed: &ParsedFunc, td: &TargetDescriptor, element_type: ElementType) -> Expr {
    if parsed.is_type_param(name) {
        return Expr::ident(td.scalar_type_name(element_type));
    }
    if let Some(resolved) = registry.resolve(name, element_type) {
        return Expr::ident(resolved);
    }
    if let Some(swapped) = swap_suffix(name, element_type) {
        return Expr::ident(swapped);
    }
    Expr::ident(name)
}

fn resolve_block(
    body: Block,
    parsed: &ParsedFunc,
    registry: &ConstantRegistry,
    td: &TargetDescriptor,
    element_type: ElementType,
) -> Block {
    let renamed = map_block_exprs(body, &mut |e| match e {
        Expr::Ident(name) => resolve_ident(&name, registry, parsed, td, element_type),
        Expr::Selector { base, field } if matches!(base.as_ref(), Expr::Ident(n) if n == AMBIENT_MATH_PACKAGE) => {
            Expr::selector(Expr::ident(AMBIENT_MATH_ALIAS), field)
        }
        Expr::Conversion { ty, expr } => Expr::Conversion {
            ty: resolve_type(&ty, parsed, td, element_type),
            expr,
        },
        Expr::StarCast { ty, expr } => Expr::StarCast {
            ty: resolve_type(&ty, parsed, td, element_type),
            expr,
        },
        Expr::CompositeLit { ty, elems } => Expr::CompositeLit {
            ty: resolve_type(&ty, parsed, td, element_type),
            elems,
        },
        Expr::Call { callee, type_args, args } => Expr::Call {
            callee,
            type_args: type_args
                .into_iter()
                .map(|t| resolve_type(&t, parsed, td, element_type))
                .collect(),
            args,
        },
        other => other,
    });
    resolve_decl_types(renamed, parsed, td, element_type)
}

/// `map_block_exprs` only rewrites `Expr` nodes; `VarDecl.ty` and
/// `FuncLit`'s params/results carry bare `TypeExpr`s that need the same
/// type-parameter substitution. A second, purely structural pass handles
/// those.
fn resolve_decl_types(block: Block, parsed: &ParsedFunc, td: &TargetDescriptor, element_type: ElementType) -> Block {
    block
        .into_iter()
        .map(|node| StmtNode {
            line: node.line,
            node: resolve_decl_types_stmt(node.node, parsed, td, element_type),
        })
        .collect()
}

fn resolve_decl_types_stmt(stmt: Stmt, parsed: &ParsedFunc, td: &TargetDescriptor, element_type: ElementType) -> Stmt {
    match stmt {
        Stmt::VarDecl { name, ty, value } => Stmt::VarDecl {
            name,
            ty: ty.map(|t| resolve_type(&t, parsed, td, element_type)),
            value,
        },
        Stmt::If { cond, then_block, else_block } => Stmt::If {
            cond,
            then_block: resolve_decl_types(then_block, parsed, td, element_type),
            else_block: else_block.map(|b| resolve_decl_types(b, parsed, td, element_type)),
        },
        Stmt::For { init, cond, post, body } => Stmt::For {
            init: init.map(|s| Box::new(resolve_decl_types_stmt(*s, parsed, td, element_type))),
            cond,
            post,
            body: resolve_decl_types(body, parsed, td, element_type),
        },
        Stmt::Range { key, value, expr, body } => Stmt::Range {
            key,
            value,
            expr,
            body: resolve_decl_types(body, parsed, td, element_type),
        },
        Stmt::Switch { tag, cases } => Stmt::Switch {
            tag,
            cases: cases
                .into_iter()
                .map(|c| simd_ir::SwitchCase {
                    values: c.values,
                    body: resolve_decl_types(c.body, parsed, td, element_type),
                })
                .collect(),
        },
        Stmt::Block(b) => Stmt::Block(resolve_decl_types(b, parsed, td, element_type)),
        other => other,
    }
}
