//! Generator configuration.
//!
//! Both structs have defaults matching the layout the runtime crate and the
//! bundled splice template expect; the CLI overrides individual fields.

/// The four textual markers the splicer looks for, in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchors {
    pub enum_open: String,
    pub enum_close: String,
    pub codegen_begin: String,
    pub codegen_end: String,
}

impl Default for Anchors {
    fn default() -> Self {
        Self {
            enum_open: "pub enum InstrKind {".to_string(),
            enum_close: "}".to_string(),
            codegen_begin: "// @codegen".to_string(),
            codegen_end: "// @end".to_string(),
        }
    }
}

/// Options for the emitted Rust code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenConfig {
    /// Module path the generated code imports runtime types from.
    pub runtime_path: String,
    /// Indentation level (four spaces each) of the outermost emitted statement.
    pub indent: usize,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            runtime_path: "crate".to_string(),
            indent: 1,
        }
    }
}

/// Four spaces per level.
pub(crate) fn indent_str(level: usize) -> String {
    "    ".repeat(level)
}
