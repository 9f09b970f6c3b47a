use crate::kernel::Instruction;

/// A parsed program ready for admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub name: String,
    pub instructions: Vec<Instruction>,
}
