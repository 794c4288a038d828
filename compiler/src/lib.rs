// skfuse — Super-kernel fusion pass
//
// Library root. Front end (lexer, parser, build), graph model, fusion
// stages, and the pipeline that runs them.

pub mod ast;
pub mod attr;
pub mod build;
pub mod collect;
pub mod diag;
pub mod dot;
pub mod eligibility;
pub mod error;
pub mod fuse;
pub mod graph;
pub mod id;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod split;
pub mod sync;
pub mod topo;
pub mod verify;
