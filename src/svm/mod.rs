//! The SVM backend: instruction set, dialects, assemblies and code
//! generation.

pub mod abstract_assembly;
pub mod code_transform;
pub mod dialect;
pub mod instruction;
pub mod no_output_assembly;
pub mod object_compiler;
pub mod svm_assembly;

pub use abstract_assembly::{AbstractAssembly, LabelId, SubId};
pub use code_transform::{BuiltinContext, CodeTransform, CodeTransformOptions};
pub use dialect::{AsmFlavour, BuiltinCode, BuiltinFunction, Dialect, SvmDialect, YulDialect};
pub use instruction::Instruction;
pub use no_output_assembly::NoOutputAssembly;
pub use object_compiler::ObjectCompiler;
pub use svm_assembly::SvmAssembly;
