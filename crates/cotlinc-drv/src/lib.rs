//! cotlinc-drv - Compiler driver.
//!
//! Orchestrates the pipeline: read source, lex, parse, analyze, lay out
//! `.rdata`, generate code, write the image. Each stage consumes the
//! previous stage's output exactly once; any stage error aborts the
//! whole compilation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use cotlinc_pe::RdataLayout;
use tracing::debug;

/// A single compiler invocation.
#[derive(Debug, Clone)]
pub struct Options {
    pub input: PathBuf,
    /// Defaults to the input path with an `.exe` extension.
    pub output: Option<PathBuf>,
}

/// Compiles `options.input` into a Windows executable.
///
/// Returns the path of the written image.
pub fn compile(options: &Options) -> Result<PathBuf> {
    let source = cotlinc_util::read_source(&options.input)?;
    debug!(bytes = source.len(), input = %options.input.display(), "read source");

    let tokens = cotlinc_lex::tokenize(&source)?;
    debug!(tokens = tokens.len(), "lexed");

    let program = cotlinc_par::parse(tokens)?;
    debug!(
        statements = program.stmts.len(),
        strings = program.strings.len(),
        "parsed"
    );

    let analysis = cotlinc_sem::analyze(&program)?;
    debug!(
        symbols = analysis.symbols.len(),
        max_stack = analysis.max_stack,
        max_repeat = analysis.max_repeat,
        "analyzed"
    );

    let layout = RdataLayout::compute(&program.strings);
    let code = cotlinc_gen::generate(&program, &analysis, &layout)?;
    debug!(code = code.len(), rdata = layout.size, "generated");

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| cotlinc_util::default_output(&options.input));
    cotlinc_pe::write_image_file(&output, &code, &program.strings, &layout)?;
    debug!(output = %output.display(), "wrote image");

    Ok(output)
}

/// Convenience for tests: compile a source string to a given path.
pub fn compile_source_to(source: &str, output: &Path) -> Result<()> {
    let tokens = cotlinc_lex::tokenize(source)?;
    let program = cotlinc_par::parse(tokens)?;
    let analysis = cotlinc_sem::analyze(&program)?;
    let layout = RdataLayout::compute(&program.strings);
    let code = cotlinc_gen::generate(&program, &analysis, &layout)?;
    cotlinc_pe::write_image_file(output, &code, &program.strings, &layout)?;
    Ok(())
}
