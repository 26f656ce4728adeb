//! The optimization passes run over lifted programs.
//!
//! Every pass is a peephole-style rewrite driven by a cursor walk; together
//! they fold the stack-machine artifacts of the serialization format back
//! into readable operations. [default_pipeline] registers them in the order
//! the tool runs them.

mod builtins;
mod constant_fold;
mod dead_code;
mod eval;

pub use self::builtins::{
    GlobalCallPass, GlobalReductionPass, ImportToGlobalPass, InstanceDunderPass, LocalsPass,
};
pub use self::constant_fold::{
    ConstantGetItemPass, ConstantGlobalPass, ConstantValuePass, InlineMutableConstantPass,
};
pub use self::dead_code::DeadCodePass;
pub use self::eval::{fold_binary, py_cmp, py_eq};

use peekle_analysis::Analyzer;
use peekle_pass::PassManager;

/// The default pipeline, in registration order.
pub fn default_pipeline<'a>(analyzer: &'a Analyzer<'a>) -> PassManager<'a> {
    let mut manager = PassManager::new();
    manager.add(ConstantValuePass);
    manager.add(ConstantGlobalPass);
    manager.add(ConstantGetItemPass);
    manager.add(InlineMutableConstantPass);
    manager.add(DeadCodePass::new(analyzer));
    manager.add(GlobalCallPass::new(analyzer));
    manager.add(InstanceDunderPass);
    manager.add(ImportToGlobalPass::new(analyzer));
    manager.add(GlobalReductionPass);
    manager.add(LocalsPass::new(analyzer));
    manager
}
