//! LIR optimizations. Each pass rewrites a single function in place and
//! reports whether it changed anything. Promotion of stack slots to registers
//! has already happened by the time these run.
//!
//! The passes always run in the same order: dead code elimination, control
//! flow simplification, then strength reduction.

pub mod dce;
pub mod simplify_cfg;
pub mod strength_reduction;

use dce::DeadCodeElimination;
use simplify_cfg::SimplifyCfg;
use strength_reduction::StrengthReduction;

use crate::middle::lir;

/// A rewrite over a single LIR function
pub trait FunctionPass {
    fn name(&self) -> &'static str;

    /// Returns true if the function was changed
    fn run(&mut self, function: &mut lir::Function) -> bool;
}

/// Selects which passes of the fixed pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPipelineConfig {
    pub dead_code_elimination: bool,
    pub simplify_cfg: bool,
    pub strength_reduction: bool,
}

impl Default for PassPipelineConfig {
    fn default() -> Self {
        Self {
            dead_code_elimination: true,
            simplify_cfg: true,
            strength_reduction: true,
        }
    }
}

pub struct PassManager {
    passes: Vec<Box<dyn FunctionPass>>,
}

impl core::fmt::Debug for PassManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.passes.iter().map(|pass| pass.name()))
            .finish()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::with_config(PassPipelineConfig::default())
    }
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PassPipelineConfig) -> Self {
        let mut passes: Vec<Box<dyn FunctionPass>> = Vec::new();

        if config.dead_code_elimination {
            passes.push(Box::new(DeadCodeElimination));
        }

        if config.simplify_cfg {
            passes.push(Box::new(SimplifyCfg));
        }

        if config.strength_reduction {
            passes.push(Box::new(StrengthReduction));
        }

        Self { passes }
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Runs every pass once, in order. Returns true if any of them changed
    /// the function.
    pub fn run(&mut self, function: &mut lir::Function) -> bool {
        let mut changed = false;

        for pass in &mut self.passes {
            let pass_changed = pass.run(function);

            log::debug!(
                "{} on `{}`: {}",
                pass.name(),
                function.name,
                if pass_changed { "changed" } else { "unchanged" }
            );

            changed |= pass_changed;
        }

        changed
    }

    /// Optimizes every function of a module independently
    pub fn run_module(&mut self, module: &mut lir::Module) -> bool {
        module
            .functions
            .iter_mut()
            .fold(false, |changed, function| self.run(function) | changed)
    }
}

/// Runs the default pipeline over a function
pub fn optimize_function(function: &mut lir::Function) -> bool {
    PassManager::new().run(function)
}

/// Runs the default pipeline over every function in a module
pub fn optimize_module(module: &mut lir::Module) -> bool {
    PassManager::new().run_module(module)
}
