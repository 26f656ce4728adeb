use peekle_analysis::Analyzer;
use peekle_il::Program;
use peekle_pass::Pass;

/// Removes instructions whose value is unused and whose execution has no
/// observable effect. An unused definition that does have an effect (a call
/// of an unknown callee, say) keeps the effect but sheds its name, becoming a
/// plain instruction.
pub struct DeadCodePass<'a> {
    analyzer: &'a Analyzer<'a>,
}

impl<'a> DeadCodePass<'a> {
    pub fn new(analyzer: &'a Analyzer<'a>) -> Self {
        Self { analyzer }
    }
}

impl Pass for DeadCodePass<'_> {
    fn name(&self) -> &str {
        "Dead Code Elimination"
    }

    fn run(&mut self, program: &mut Program) -> bool {
        let mut modified = false;
        let mut cursor = program.cursor();
        while let Some(inst) = cursor.advance(program) {
            if program.has_uses(inst) {
                continue;
            }
            let data = program.insn(inst);
            if !self.analyzer.has_side_effects(data) {
                cursor
                    .remove(program)
                    .expect("the instruction has no uses");
                modified = true;
                continue;
            }
            if data.result().is_some() {
                let op = data.op();
                let args: Vec<_> = data.args().to_vec();
                let plain = program.create_insn(op, args);
                cursor
                    .replace(program, plain)
                    .expect("a plain instruction may replace an unused definition");
                modified = true;
            }
        }
        modified
    }
}
