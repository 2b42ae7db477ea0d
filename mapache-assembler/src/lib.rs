//! # MapacheSIM Assembler
//!
//! Assemble single-file programs with one `.data` and one `.text` segment for
//! any ISA that implements [`mapache_spec::IsaDescription`].
//!
//! ## Example
//!
//! ```ignore
//! use mapache_assembler::assemble;
//!
//! let source = r#"
//!     .text
//!     main: addi $t0 $t0 4
//!     loop: j loop
//! "#;
//!
//! let program = assemble(&isa, source)?;
//! assert_eq!(program.label("loop"), Some(0x10004));
//! ```

pub mod assembler;
pub mod data;
pub mod encoder;
pub mod error;
pub mod lexer;
pub mod parser;

pub use assembler::{assemble, assemble_at};
pub use encoder::{encode, Resolver};
pub use error::{AssemblerError, Result};
pub use lexer::{tokenize, Token};
