//! Semantics preserving rewrites of Yul code.
//!
//! Every pass assumes its input analyses without errors. Most of them also
//! assume the [`Disambiguator`] ran first, which [`OptimiserSuite`] takes
//! care of.

pub mod ast_walker;
pub mod block_flattener;
pub mod common_subexpression_eliminator;
pub mod data_flow_analyzer;
pub mod disambiguator;
pub mod expression_simplifier;
pub mod for_loop_condition_into_body;
pub mod for_loop_init_rewriter;
pub mod metrics;
pub mod name_collector;
pub mod name_dispenser;
pub mod rematerialiser;
pub mod semantics;
pub mod simplification_rules;
pub mod structural_simplifier;
pub mod suite;
pub mod var_decl_initializer;

pub use block_flattener::BlockFlattener;
pub use common_subexpression_eliminator::CommonSubexpressionEliminator;
pub use disambiguator::Disambiguator;
pub use expression_simplifier::ExpressionSimplifier;
pub use for_loop_condition_into_body::ForLoopConditionIntoBody;
pub use for_loop_init_rewriter::ForLoopInitRewriter;
pub use name_dispenser::NameDispenser;
pub use rematerialiser::Rematerialiser;
pub use structural_simplifier::StructuralSimplifier;
pub use suite::{OptimiserSuite, Step};
pub use var_decl_initializer::VarDeclInitializer;
