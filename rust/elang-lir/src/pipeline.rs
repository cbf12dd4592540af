//! The backend pipeline: lowering, critical-edge removal, register
//! assignment, cleanup, then emission. Queued errors stop the run
//! before the next pass.

use crate::editor::Editor;
use crate::emitters::code_emitter::CodeEmitter;
use crate::emitters::MachineCodeBuilder;
use crate::factory::Factory;
use crate::function::Function;
use crate::transforms::allocation_pass::RegisterAssignmentsPass;
use crate::transforms::clean::CleanPass;
use crate::transforms::critical_edges::RemoveCriticalEdgesPass;
use crate::transforms::lowering_x64::LoweringX64Pass;
use tracing::debug;

pub struct Pipeline<'a> {
    factory: &'a mut Factory,
    function: &'a mut Function,
}

impl<'a> Pipeline<'a> {
    pub fn new(factory: &'a mut Factory, function: &'a mut Function) -> Self {
        Self { factory, function }
    }

    /// Run every pass in order, then emit. Returns false when a pass
    /// queued errors.
    pub fn run(self, builder: &mut dyn MachineCodeBuilder) -> bool {
        {
            let mut editor = Editor::new(self.factory, self.function);
            // Strict SSA holds only until lowering introduces the
            // destructive two-address form; validate globally first.
            // Later passes validate block-locally on every commit.
            if !editor.validate() {
                return false;
            }

            debug!("pass: lowering_x64");
            LoweringX64Pass::new(&mut editor).run();
            if editor.factory_mut().has_errors() {
                return false;
            }

            debug!("pass: remove_critical_edges");
            RemoveCriticalEdgesPass::new(&mut editor).run();
            if editor.factory_mut().has_errors() {
                return false;
            }

            debug!("pass: register_assignments");
            RegisterAssignmentsPass::new(&mut editor).run();

            debug!("pass: clean");
            CleanPass::new(&mut editor).run();
        }
        if self.factory.has_errors() {
            return false;
        }

        debug!("emitting");
        CodeEmitter::new(self.factory, builder).process(self.function);
        true
    }
}
